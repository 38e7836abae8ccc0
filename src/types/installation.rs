// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::api::ObjectMeta;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

use crate::constants::installation;

/// Declarative input for the bootstrap: which cluster sub-path to sync and at which revision.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(
    group = "rhacs.redhat.com",
    version = "v1alpha1",
    kind = "GitopsInstallation",
    shortname = "gitopsinstall"
)]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct GitopsInstallationSpec {
    /// Selects `bootstrap/<clusterName>` in the manifest repository
    pub cluster_name: String,
    /// Branch, tag or commit the bootstrap application tracks
    pub target_revision: String,
}

impl GitopsInstallation {
    /// The default installation seeded from the cluster identity
    pub fn seeded(namespace: &str, cluster_name: &str) -> Self {
        GitopsInstallation {
            metadata: ObjectMeta {
                name: Some(installation::NAME.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: GitopsInstallationSpec {
                cluster_name: cluster_name.to_string(),
                target_revision: installation::DEFAULT_TARGET_REVISION.to_string(),
            },
        }
    }

    /// Path of the cluster-specific root manifests
    pub fn bootstrap_path(&self) -> String {
        format!(
            "{}{}",
            crate::constants::application::PATH_PREFIX,
            self.spec.cluster_name
        )
    }
}
