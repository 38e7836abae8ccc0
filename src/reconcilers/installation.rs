// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Installation reconciler - converges the cluster towards a running, synced ArgoCD.

use crate::constants::{application, crd, installation, labels, namespaces, repository};
use crate::error::{OperatorError, ResourceContext, Result};
use crate::kubernetes::{ensure_namespace, patch_on_conflict, update_on_conflict, wait_for_crd};
use crate::kubernetes::{ControlPlane, Managed, ObjectKey};
use crate::reconcilers::diff::{application_needs_update, secret_needs_update};
use crate::types::application::desired_application;
use crate::types::olm::{desired_operator_group, desired_subscription};
use crate::types::{Application, GitopsInstallation};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Destination repository secret for ArgoCD, carrying `token` as password
pub fn desired_repository_secret(token: &[u8]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(repository::SECRET_NAME.to_string()),
            namespace: Some(namespaces::AGENT.to_string()),
            labels: Some(BTreeMap::from([(
                labels::SECRET_TYPE.to_string(),
                labels::SECRET_TYPE_REPOSITORY.to_string(),
            )])),
            ..Default::default()
        },
        data: Some(BTreeMap::from([
            (
                repository::URL_KEY.to_string(),
                ByteString(repository::URL.as_bytes().to_vec()),
            ),
            (
                repository::PASSWORD_KEY.to_string(),
                ByteString(token.to_vec()),
            ),
        ])),
        type_: Some(repository::SECRET_TYPE.to_string()),
        ..Default::default()
    }
}

/// Token from the source secret; a missing key and an empty value are both rejected
fn repository_token(source: &Secret) -> Result<&[u8]> {
    source
        .data
        .as_ref()
        .and_then(|data| data.get(repository::TOKEN_KEY))
        .map(|token| token.0.as_slice())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            OperatorError::Validation(format!(
                "key {} in secret {} is missing or empty",
                repository::TOKEN_KEY,
                ObjectKey::of(source)
            ))
        })
}

/// Merge patch that sets the owned spec fields and replaces the label set.
///
/// Spec fields the operator does not model, status and the `operation` field
/// belong to ArgoCD and are left out of the patch.
fn application_patch(current: &Application, desired: &Application) -> Result<Value> {
    let mut labels: Map<String, Value> = current
        .labels()
        .keys()
        .map(|k| (k.clone(), Value::Null))
        .collect();
    for (k, v) in desired.labels() {
        labels.insert(k.clone(), Value::String(v.clone()));
    }

    Ok(json!({
        "metadata": { "labels": labels },
        "spec": serde_json::to_value(&desired.spec)?,
    }))
}

/// Drives one installation record through the bootstrap sequence
pub struct Reconciler<C: ControlPlane> {
    client: C,
    source_namespace: String,
    crd_poll_interval: Duration,
}

impl<C: ControlPlane> Reconciler<C> {
    pub fn new(client: C, source_namespace: &str) -> Self {
        Self {
            client,
            source_namespace: source_namespace.to_string(),
            crd_poll_interval: Duration::from_secs(crd::POLL_INTERVAL_SECS),
        }
    }

    /// The single key every watch maps to
    pub fn installation_key(&self) -> ObjectKey {
        ObjectKey::namespaced(&self.source_namespace, installation::NAME)
    }

    /// Run the convergence sequence for `key`, stopping at the first failing stage
    #[instrument(skip(self, key, cancel), fields(installation = %key))]
    pub async fn reconcile(&self, key: &ObjectKey, cancel: &CancellationToken) -> Result<Action> {
        let installation = self
            .client
            .get::<GitopsInstallation>(key)
            .await
            .for_resource("GitopsInstallation", key.namespace.as_deref(), &key.name)?;

        let Some(installation) = installation else {
            debug!("Installation {} not found, nothing to do", key);
            return Ok(Action::await_change());
        };

        for namespace in [namespaces::OPERATOR, namespaces::AGENT] {
            ensure_namespace(&self.client, namespace)
                .await
                .for_resource("Namespace", None, namespace)?;
        }

        self.ensure_exists(desired_operator_group()).await?;
        self.ensure_exists(desired_subscription()).await?;

        self.ensure_repository_secret()
            .await
            .for_resource("Secret", Some(namespaces::AGENT), repository::SECRET_NAME)?;

        wait_for_crd::<Application, _>(
            &self.client,
            namespaces::AGENT,
            self.crd_poll_interval,
            cancel,
        )
        .await
        .for_resource("Application", Some(namespaces::AGENT), application::NAME)?;

        self.ensure_application(&installation)
            .await
            .for_resource("Application", Some(namespaces::AGENT), application::NAME)?;

        info!("Installation {} reconciled", key);
        Ok(Action::await_change())
    }

    /// Create `desired` when absent; an existing object is never touched
    async fn ensure_exists<K: Managed>(&self, desired: K) -> Result<()> {
        let kind = K::kind(&());
        let key = ObjectKey::of(&desired);

        let result = async {
            match self.client.get::<K>(&key).await? {
                Some(_) => debug!("{} {} already exists", kind, key),
                None => {
                    info!("Creating {} {}", kind, key);
                    self.client.create(&desired).await?;
                }
            }
            Ok::<(), OperatorError>(())
        }
        .await;

        result.for_resource(&kind, key.namespace.as_deref(), &key.name)
    }

    #[instrument(skip(self))]
    async fn ensure_repository_secret(&self) -> Result<()> {
        let source_key = ObjectKey::namespaced(&self.source_namespace, repository::SECRET_NAME);
        let source = self
            .client
            .get::<Secret>(&source_key)
            .await?
            .ok_or_else(|| {
                OperatorError::MissingPrerequisite(format!("source secret {} not found", source_key))
            })?;

        let desired = desired_repository_secret(repository_token(&source)?);
        let key = ObjectKey::of(&desired);

        match self.client.get::<Secret>(&key).await? {
            None => {
                info!("Creating repository secret {}", key);
                self.client.create(&desired).await?;
            }
            Some(current) if !secret_needs_update(&current, &desired) => {
                debug!("Repository secret {} is up to date", key);
            }
            Some(_) => {
                info!("Updating repository secret {}", key);
                update_on_conflict(&self.client, &key, |secret: &mut Secret| {
                    secret.data = desired.data.clone();
                    secret.metadata.labels = desired.metadata.labels.clone();
                    secret.type_ = desired.type_.clone();
                })
                .await?;
            }
        }

        Ok(())
    }

    #[instrument(skip(self, installation))]
    async fn ensure_application(&self, installation: &GitopsInstallation) -> Result<()> {
        let desired = desired_application(installation);
        let key = ObjectKey::of(&desired);

        match self.client.get::<Application>(&key).await? {
            None => {
                info!(
                    "Creating application {} for path {}",
                    key,
                    installation.bootstrap_path()
                );
                self.client.create(&desired).await?;
            }
            Some(current) if !application_needs_update(&current, &desired) => {
                debug!("Application {} is up to date", key);
            }
            Some(_) => {
                info!("Updating application {}", key);
                patch_on_conflict(&self.client, &key, |current: &Application| {
                    application_patch(current, &desired)
                })
                .await?;
            }
        }

        Ok(())
    }
}
