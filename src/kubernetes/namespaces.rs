// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace management utilities

use crate::constants::{labels, namespaces};
use crate::error::Result;
use crate::kubernetes::client::{ControlPlane, ObjectKey};
use crate::kubernetes::retry::update_on_conflict;
use k8s_openapi::api::core::v1::Namespace;
use kube::{api::ObjectMeta, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Namespace carrying the managed-by label
pub fn desired_namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                labels::MANAGED_BY.to_string(),
                namespaces::OPERATOR.to_string(),
            )])),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn has_managed_by_label(namespace: &Namespace) -> bool {
    namespace
        .labels()
        .get(labels::MANAGED_BY)
        .is_some_and(|v| v == namespaces::OPERATOR)
}

/// Ensure a namespace exists and carries the managed-by label.
///
/// Only the managed-by key is owned; any other labels are left alone.
#[instrument(skip(client))]
pub async fn ensure_namespace<C: ControlPlane>(client: &C, name: &str) -> Result<()> {
    let key = ObjectKey::cluster(name);

    match client.get::<Namespace>(&key).await? {
        None => {
            info!("Creating namespace {}", name);
            client.create(&desired_namespace(name)).await?;
            info!("Namespace {} created successfully", name);
        }
        Some(existing) if has_managed_by_label(&existing) => {
            debug!("Namespace {} already exists", name);
        }
        Some(_) => {
            info!("Setting {} label on namespace {}", labels::MANAGED_BY, name);
            update_on_conflict(client, &key, |ns: &mut Namespace| {
                ns.labels_mut().insert(
                    labels::MANAGED_BY.to_string(),
                    namespaces::OPERATOR.to_string(),
                );
            })
            .await?;
        }
    }

    Ok(())
}
