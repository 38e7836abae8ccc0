// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics for the reconcile loop.

use crate::error::{OperatorError, Result};
use kube::runtime::controller::Action;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, error, info};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub mod names {
    pub const RECONCILE_TOTAL: &str = "rhacs_gitops_reconcile_total";
    pub const RECONCILE_ERRORS_TOTAL: &str = "rhacs_gitops_reconcile_errors_total";
    pub const RECONCILE_DURATION_SECONDS: &str = "rhacs_gitops_reconcile_duration_seconds";
}

/// Install the Prometheus recorder; `false` if it was already installed or failed
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        debug!("Prometheus metrics already initialized");
        return false;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                return false;
            }
            info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Text exposition of every recorded metric, `None` before [`init_metrics`]
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Low-cardinality label for a failed reconcile
pub fn error_class(error: &OperatorError) -> &'static str {
    match error.root() {
        OperatorError::Cancelled => "cancelled",
        e if e.is_validation() => "validation",
        e if e.is_conflict() => "conflict",
        OperatorError::KubeError(_) => "api",
        _ => "other",
    }
}

pub fn record_reconcile(outcome: &Result<Action>, duration: Duration) {
    let result = if outcome.is_ok() { "success" } else { "error" };
    counter!(names::RECONCILE_TOTAL, "result" => result).increment(1);
    histogram!(names::RECONCILE_DURATION_SECONDS).record(duration.as_secs_f64());

    if let Err(e) = outcome {
        counter!(names::RECONCILE_ERRORS_TOTAL, "class" => error_class(e)).increment(1);
    }
}
