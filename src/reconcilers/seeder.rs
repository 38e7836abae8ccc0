// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Seeds the default installation record from the cluster identity.

use crate::constants::infrastructure;
use crate::error::{OperatorError, Result};
use crate::kubernetes::{ControlPlane, ObjectKey};
use crate::types::{GitopsInstallation, Infrastructure};
use kube::ResourceExt;
use tracing::{info, instrument};

/// Drop the last dash-delimited segment: `acs-dev-dp-01-x7k2p` becomes
/// `acs-dev-dp-01`. A name without a dash is returned unchanged.
pub fn trim_suffix(name: &str) -> &str {
    match name.rfind('-') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Create the installation for this cluster unless one already exists.
///
/// Fails when the cluster identity is missing; the caller treats that as fatal.
#[instrument(skip(client))]
pub async fn seed_installation<C: ControlPlane>(client: &C, source_namespace: &str) -> Result<()> {
    let infra = client
        .get::<Infrastructure>(&ObjectKey::cluster(infrastructure::NAME))
        .await?
        .ok_or_else(|| {
            OperatorError::Seed(format!("infrastructure {} not found", infrastructure::NAME))
        })?;

    let infrastructure_name = infra.infrastructure_name().ok_or_else(|| {
        OperatorError::Seed(format!(
            "infrastructure {} has no status.infrastructureName",
            infra.name_any()
        ))
    })?;

    let cluster_name = trim_suffix(infrastructure_name);
    let installation = GitopsInstallation::seeded(source_namespace, cluster_name);
    let key = ObjectKey::of(&installation);

    match client.create(&installation).await {
        Ok(_) => {
            info!("Created installation {} for cluster {}", key, cluster_name);
            Ok(())
        }
        Err(e) if e.is_already_exists() => {
            info!("Installation {} already exists", key);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
