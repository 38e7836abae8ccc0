// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::error::{OperatorError, Result};
use crate::kubernetes::client::{ControlPlane, Managed};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Wait until kind `K` is served in `namespace`.
///
/// Lists at most one object every `interval`. A 404 means the kind is not
/// registered yet; any other error ends the wait. Polls until the token is
/// cancelled.
pub async fn wait_for_crd<K: Managed, C: ControlPlane>(
    client: &C,
    namespace: &str,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let kind = K::kind(&());

    loop {
        if cancel.is_cancelled() {
            return Err(OperatorError::Cancelled);
        }

        match client.list::<K>(namespace, 1).await {
            Ok(_) => {
                debug!("{} CRD is available", kind);
                return Ok(());
            }
            Err(e) if e.is_not_found() => {
                info!(
                    "{} CRD not yet available, waiting {} seconds...",
                    kind,
                    interval.as_secs()
                );
            }
            Err(e) => return Err(e),
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(OperatorError::Cancelled),
            _ = sleep(interval) => {}
        }
    }
}
