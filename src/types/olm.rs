// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Operator lifecycle records that install the GitOps operator.

use kube::api::ObjectMeta;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

use crate::constants::{namespaces, olm};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "operators.coreos.com", version = "v1", kind = "OperatorGroup")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct OperatorGroupSpec {
    /// Empty or absent selects the all-namespaces install mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespaces: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_strategy: Option<UpgradeStrategy>,
}

#[derive(Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
pub struct UpgradeStrategy {
    pub name: String,
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "operators.coreos.com", version = "v1alpha1", kind = "Subscription")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    /// Package name in the catalog
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub source: String,
    pub source_namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_plan_approval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_csv: Option<String>,
}

/// Operator group for the GitOps operator namespace
pub fn desired_operator_group() -> OperatorGroup {
    OperatorGroup {
        metadata: ObjectMeta {
            name: Some(olm::OPERATOR_GROUP_NAME.to_string()),
            namespace: Some(namespaces::OPERATOR.to_string()),
            ..Default::default()
        },
        spec: OperatorGroupSpec {
            target_namespaces: None,
            upgrade_strategy: Some(UpgradeStrategy {
                name: "Default".to_string(),
            }),
        },
    }
}

/// Subscription to the GitOps operator package
pub fn desired_subscription() -> Subscription {
    Subscription {
        metadata: ObjectMeta {
            name: Some(olm::SUBSCRIPTION_NAME.to_string()),
            namespace: Some(namespaces::OPERATOR.to_string()),
            ..Default::default()
        },
        spec: SubscriptionSpec {
            name: olm::PACKAGE.to_string(),
            channel: Some(olm::CHANNEL.to_string()),
            source: olm::CATALOG_SOURCE.to_string(),
            source_namespace: olm::CATALOG_SOURCE_NAMESPACE.to_string(),
            install_plan_approval: Some(olm::INSTALL_PLAN_APPROVAL.to_string()),
            starting_csv: None,
        },
    }
}
