// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// The operator name used as field manager and in managed-by labels
pub const OPERATOR_NAME: &str = "rhacs-gitops-operator";

/// Installation record coordinates (namespace comes from configuration)
pub mod installation {
    pub const NAME: &str = "rhacs-gitops";
    /// Revision used when seeding the default installation
    pub const DEFAULT_TARGET_REVISION: &str = "HEAD";
}

/// Cluster identity record
pub mod infrastructure {
    pub const NAME: &str = "cluster";
}

/// Kubernetes label keys and values owned by the operator
pub mod labels {
    pub const MANAGED_BY: &str = "argocd.argoproj.io/managed-by";
    pub const SECRET_TYPE: &str = "argocd.argoproj.io/secret-type";
    pub const SECRET_TYPE_REPOSITORY: &str = "repository";
    pub const APP_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
}

/// Namespaces the bootstrap converges
pub mod namespaces {
    /// Namespace the GitOps operator is installed into
    pub const OPERATOR: &str = "openshift-gitops-operator";
    /// Namespace ArgoCD runs in
    pub const AGENT: &str = "openshift-gitops";
}

/// Operator lifecycle records installing the GitOps operator
pub mod olm {
    pub const OPERATOR_GROUP_NAME: &str = "openshift-gitops-operator";
    pub const SUBSCRIPTION_NAME: &str = "openshift-gitops-operator";
    pub const PACKAGE: &str = "openshift-gitops-operator";
    pub const CHANNEL: &str = "latest";
    pub const CATALOG_SOURCE: &str = "redhat-operators";
    pub const CATALOG_SOURCE_NAMESPACE: &str = "openshift-marketplace";
    pub const INSTALL_PLAN_APPROVAL: &str = "Automatic";
}

/// Manifest repository credential
pub mod repository {
    /// Name of both the source and the destination secret
    pub const SECRET_NAME: &str = "acscs-manifests-repo";
    /// Key holding the token in the source secret
    pub const TOKEN_KEY: &str = "github-token";
    pub const URL_KEY: &str = "url";
    pub const PASSWORD_KEY: &str = "password";
    pub const URL: &str = "https://github.com/stackrox/acscs-manifests";
    pub const SECRET_TYPE: &str = "Opaque";
}

/// Bootstrap application
pub mod application {
    pub const NAME: &str = "rhacs-bootstrap";
    pub const PROJECT: &str = "default";
    pub const PATH_PREFIX: &str = "bootstrap/";
    pub const DESTINATION_SERVER: &str = "https://kubernetes.default.svc";
    /// Negative limit means ArgoCD retries forever
    pub const RETRY_LIMIT: i64 = -1;
    pub const RETRY_BACKOFF_DURATION: &str = "5s";
    pub const RETRY_BACKOFF_FACTOR: i64 = 2;
    pub const RETRY_BACKOFF_MAX_DURATION: &str = "3m";
}

/// CRD polling configuration
pub mod crd {
    /// Polling interval in seconds when waiting for the Application CRD
    pub const POLL_INTERVAL_SECS: u64 = 5;
}

/// Requeue delay after a failed reconcile
pub const ERROR_REQUEUE_SECS: u64 = 60;
