// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Leader election on a `coordination.k8s.io/v1` Lease.
//!
//! Acquisition and renewal are compare-and-swap writes on the lease's
//! resourceVersion: when two replicas race, one of them gets a 409 and backs
//! off. A replica that cannot renew before its lease expires gives up
//! leadership and the process exits so a fresh pod can compete again.

use crate::constants::OPERATOR_NAME;
use crate::error::{OperatorError, Result};
use crate::kubernetes::{ControlPlane, ObjectKey};
use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use rand::Rng;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const LEASE_NAME: &str = "rhacs-gitops-operator-leader";

const LEASE_DURATION: Duration = Duration::from_secs(30);
const RENEW_INTERVAL: Duration = Duration::from_secs(10);
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Pod name when running in-cluster, a random identity otherwise
pub fn default_identity() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| format!("{}-{:08x}", OPERATOR_NAME, rand::thread_rng().gen::<u32>()))
}

pub struct LeaderElector<C: ControlPlane> {
    client: C,
    key: ObjectKey,
    identity: String,
    lease_duration: Duration,
    renew_interval: Duration,
    retry_interval: Duration,
}

impl<C: ControlPlane> LeaderElector<C> {
    /// Elector with default timing (30s lease, 10s renew, 5s retry)
    pub fn new(client: C, namespace: &str, identity: &str) -> Self {
        Self {
            client,
            key: ObjectKey::namespaced(namespace, LEASE_NAME),
            identity: identity.to_string(),
            lease_duration: LEASE_DURATION,
            renew_interval: RENEW_INTERVAL,
            retry_interval: RETRY_INTERVAL,
        }
    }

    /// Block until the lease is ours or `cancel` fires
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        info!(identity = %self.identity, lease = %self.key, "Waiting for leadership...");

        loop {
            match self.try_acquire_or_renew().await {
                Ok(true) => {
                    info!(identity = %self.identity, "Leadership acquired");
                    return Ok(());
                }
                Ok(false) => {
                    debug!(identity = %self.identity, "Lease held by another, waiting...");
                }
                Err(e) => {
                    warn!(identity = %self.identity, error = %e, "Failed to acquire lease, retrying...");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(OperatorError::Cancelled),
                _ = sleep(self.retry_interval) => {}
            }
        }
    }

    /// Keep renewing until `cancel` fires (`Ok`) or the lease runs out (`LeadershipLost`).
    ///
    /// Must be called right after [`acquire`](Self::acquire). Failed renewals are
    /// retried every `retry_interval` while the last successful renewal is still
    /// within `lease_duration`.
    pub async fn hold(&self, cancel: &CancellationToken) -> Result<()> {
        let mut deadline = Instant::now() + self.lease_duration;
        let mut wait = self.renew_interval;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = sleep(wait) => {}
            }

            let failure = match self.try_acquire_or_renew().await {
                Ok(true) => {
                    debug!(identity = %self.identity, "Lease renewed");
                    deadline = Instant::now() + self.lease_duration;
                    wait = self.renew_interval;
                    continue;
                }
                Ok(false) => format!("lease {} not renewed", self.key),
                Err(e) => e.to_string(),
            };

            if Instant::now() >= deadline {
                warn!(identity = %self.identity, reason = %failure, "Leadership lost");
                return Err(OperatorError::LeadershipLost(format!(
                    "{} before the lease expired",
                    failure
                )));
            }
            warn!(identity = %self.identity, reason = %failure, "Lease renewal failed, retrying...");
            wait = self.retry_interval;
        }
    }

    /// Clear the holder so another replica can take over without waiting for expiry
    pub async fn release(&self) -> Result<()> {
        let Some(mut lease) = self.client.get::<Lease>(&self.key).await? else {
            return Ok(());
        };
        if holder(&lease) != Some(self.identity.as_str()) {
            debug!(identity = %self.identity, "Not the lease holder, nothing to release");
            return Ok(());
        }
        if let Some(spec) = lease.spec.as_mut() {
            spec.holder_identity = None;
        }
        match self.client.update(&lease).await {
            Ok(_) => {
                info!(identity = %self.identity, "Lease released");
                Ok(())
            }
            Err(e) if e.is_conflict() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// One compare-and-swap round; `Ok(false)` when someone else holds a live lease
    pub async fn try_acquire_or_renew(&self) -> Result<bool> {
        let now = Utc::now();

        let Some(existing) = self.client.get::<Lease>(&self.key).await? else {
            return self.create_lease(now).await;
        };

        let spec = existing.spec.clone().unwrap_or_default();
        let ours = holder(&existing) == Some(self.identity.as_str());

        if !ours && !is_expired(&spec, now) {
            return Ok(false);
        }

        let mut updated = existing.clone();
        updated.spec = Some(if ours {
            LeaseSpec {
                renew_time: Some(MicroTime(now)),
                ..spec
            }
        } else {
            LeaseSpec {
                holder_identity: Some(self.identity.clone()),
                lease_duration_seconds: Some(self.lease_duration.as_secs() as i32),
                acquire_time: Some(MicroTime(now)),
                renew_time: Some(MicroTime(now)),
                lease_transitions: Some(spec.lease_transitions.unwrap_or(0) + 1),
                ..spec
            }
        });

        match self.client.update(&updated).await {
            Ok(_) => {
                if !ours {
                    info!(identity = %self.identity, "Took over expired lease");
                }
                Ok(true)
            }
            Err(e) if e.is_conflict() => {
                debug!(identity = %self.identity, "Lease changed underneath us");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_lease(&self, now: DateTime<Utc>) -> Result<bool> {
        let lease = Lease {
            metadata: ObjectMeta {
                name: Some(self.key.name.clone()),
                namespace: self.key.namespace.clone(),
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some(self.identity.clone()),
                lease_duration_seconds: Some(self.lease_duration.as_secs() as i32),
                acquire_time: Some(MicroTime(now)),
                renew_time: Some(MicroTime(now)),
                lease_transitions: Some(0),
                ..Default::default()
            }),
        };

        match self.client.create(&lease).await {
            Ok(_) => {
                info!(identity = %self.identity, "Created new lease");
                Ok(true)
            }
            Err(e) if e.is_already_exists() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn holder(lease: &Lease) -> Option<&str> {
    lease.spec.as_ref()?.holder_identity.as_deref()
}

/// A lease without holder or timing information is free to take
fn is_expired(spec: &LeaseSpec, now: DateTime<Utc>) -> bool {
    if spec.holder_identity.as_deref().unwrap_or_default().is_empty() {
        return true;
    }
    match (&spec.renew_time, spec.lease_duration_seconds) {
        (Some(renewed), Some(secs)) => now > renewed.0 + chrono::Duration::seconds(secs as i64),
        _ => true,
    }
}
