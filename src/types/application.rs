// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ArgoCD Application, reduced to the fields the bootstrap sets.

use kube::api::ObjectMeta;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{application, labels, namespaces, repository, OPERATOR_NAME};
use crate::types::installation::GitopsInstallation;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(group = "argoproj.io", version = "v1alpha1", kind = "Application")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub project: String,
    pub source: ApplicationSource,
    pub destination: ApplicationDestination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_policy: Option<SyncPolicy>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_revision: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
pub struct ApplicationDestination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
pub struct SyncPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automated: Option<SyncPolicyAutomated>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryStrategy>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicyAutomated {
    #[serde(default)]
    pub prune: bool,
    #[serde(default)]
    pub self_heal: bool,
    #[serde(default)]
    pub allow_empty: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
pub struct RetryStrategy {
    /// Attempts before giving up, negative for unlimited
    #[serde(default)]
    pub limit: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff: Option<Backoff>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Backoff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<String>,
}

/// Labels the operator owns on the bootstrap application
pub fn desired_application_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(
        labels::APP_MANAGED_BY.to_string(),
        OPERATOR_NAME.to_string(),
    )])
}

/// Project the installation spec onto the bootstrap application
pub fn desired_application(installation: &GitopsInstallation) -> Application {
    Application {
        metadata: ObjectMeta {
            name: Some(application::NAME.to_string()),
            namespace: Some(namespaces::AGENT.to_string()),
            labels: Some(desired_application_labels()),
            ..Default::default()
        },
        spec: ApplicationSpec {
            project: application::PROJECT.to_string(),
            source: ApplicationSource {
                repo_url: repository::URL.to_string(),
                path: Some(installation.bootstrap_path()),
                target_revision: Some(installation.spec.target_revision.clone()),
            },
            destination: ApplicationDestination {
                server: Some(application::DESTINATION_SERVER.to_string()),
                namespace: Some(namespaces::AGENT.to_string()),
            },
            sync_policy: Some(SyncPolicy {
                automated: Some(SyncPolicyAutomated {
                    prune: true,
                    self_heal: true,
                    allow_empty: true,
                }),
                retry: Some(RetryStrategy {
                    limit: application::RETRY_LIMIT,
                    backoff: Some(Backoff {
                        duration: Some(application::RETRY_BACKOFF_DURATION.to_string()),
                        factor: Some(application::RETRY_BACKOFF_FACTOR),
                        max_duration: Some(application::RETRY_BACKOFF_MAX_DURATION.to_string()),
                    }),
                }),
            }),
        },
    }
}
