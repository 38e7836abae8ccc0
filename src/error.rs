// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Seeding failed: {0}")]
    Seed(String),

    #[error("{0} was deleted while being updated")]
    Vanished(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Leadership lost: {0}")]
    LeadershipLost(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<OperatorError>,
    },
}

pub type Result<T> = std::result::Result<T, OperatorError>;

impl OperatorError {
    /// Innermost error, looking through any context wrappers
    pub fn root(&self) -> &OperatorError {
        match self {
            OperatorError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Source data present but unusable, or a prerequisite is not there yet
    pub fn is_validation(&self) -> bool {
        matches!(
            self.root(),
            OperatorError::Validation(_)
                | OperatorError::MissingPrerequisite(_)
                | OperatorError::Seed(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.api_status().is_some_and(|(code, _)| code == 404)
    }

    /// Optimistic concurrency failure on update
    pub fn is_conflict(&self) -> bool {
        self.api_status()
            .is_some_and(|(code, reason)| code == 409 && reason != "AlreadyExists")
    }

    pub fn is_already_exists(&self) -> bool {
        self.api_status()
            .is_some_and(|(code, reason)| code == 409 && reason == "AlreadyExists")
    }

    fn api_status(&self) -> Option<(u16, &str)> {
        match self.root() {
            OperatorError::KubeError(kube::Error::Api(err)) => Some((err.code, err.reason.as_str())),
            _ => None,
        }
    }
}

/// Prefix errors with the resource that was being worked on
pub trait ResourceContext<T> {
    fn for_resource(self, kind: &str, namespace: Option<&str>, name: &str) -> Result<T>;
}

impl<T> ResourceContext<T> for Result<T> {
    fn for_resource(self, kind: &str, namespace: Option<&str>, name: &str) -> Result<T> {
        self.map_err(|e| {
            let target = match namespace {
                Some(ns) => format!("{}/{}", ns, name),
                None => name.to_string(),
            };
            OperatorError::Context {
                context: format!("ensuring {} {}", kind, target),
                source: Box::new(e),
            }
        })
    }
}
