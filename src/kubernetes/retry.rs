// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Refetch-and-retry for optimistic concurrency conflicts

use crate::error::{OperatorError, Result};
use crate::kubernetes::client::{ControlPlane, Managed, ObjectKey};
use kube::ResourceExt;
use rand::Rng;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Bounded exponential backoff for update conflicts
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}

/// Run `operation` until it succeeds, fails with anything but a conflict, or
/// runs out of attempts. The closure must refetch the object on every call so
/// each attempt works on the latest resourceVersion.
pub async fn retry_on_conflict<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_conflict() && attempt < config.max_attempts => {
                // Jitter between 0.5x and 1.5x spreads out competing writers
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let jittered = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

                debug!(
                    operation = %operation_name,
                    attempt,
                    delay_ms = jittered.as_millis() as u64,
                    "Conflict, refetching and retrying"
                );

                sleep(jittered).await;

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.backoff_multiplier)
                        .min(config.max_delay.as_secs_f64()),
                );
            }
            Err(e) => {
                if e.is_conflict() {
                    warn!(
                        operation = %operation_name,
                        attempt,
                        "Still conflicting after max retries"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Refetch `key`, apply `mutate` and write it back, retrying on conflict
pub async fn update_on_conflict<K, C, F>(client: &C, key: &ObjectKey, mutate: F) -> Result<K>
where
    K: Managed,
    C: ControlPlane,
    F: Fn(&mut K) + Send + Sync,
{
    let mutate = &mutate;
    let operation_name = format!("update {} {}", K::kind(&()), key);

    retry_on_conflict(&RetryConfig::default(), &operation_name, || async move {
        let mut current: K = client
            .get(key)
            .await?
            .ok_or_else(|| OperatorError::Vanished(format!("{} {}", K::kind(&()), key)))?;
        mutate(&mut current);
        client.update(&current).await
    })
    .await
}

/// Refetch `key`, build a merge patch from it and apply it, retrying on conflict.
///
/// The patch is pinned to the refetched resourceVersion, so a concurrent write
/// surfaces as a conflict instead of being merged over.
pub async fn patch_on_conflict<K, C, F>(client: &C, key: &ObjectKey, build: F) -> Result<K>
where
    K: Managed,
    C: ControlPlane,
    F: Fn(&K) -> Result<Value> + Send + Sync,
{
    let build = &build;
    let operation_name = format!("patch {} {}", K::kind(&()), key);

    retry_on_conflict(&RetryConfig::default(), &operation_name, || async move {
        let current: K = client
            .get(key)
            .await?
            .ok_or_else(|| OperatorError::Vanished(format!("{} {}", K::kind(&()), key)))?;
        let mut patch = build(&current)?;
        if let Some(version) = current.resource_version() {
            patch["metadata"]["resourceVersion"] = Value::String(version);
        }
        client.patch(key, &patch).await
    })
    .await
}
