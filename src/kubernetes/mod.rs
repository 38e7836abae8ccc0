// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for the control-plane capability, CRD readiness,
//! namespace management and conflict retries.

pub mod client;
pub mod crd;
pub mod namespaces;
pub mod retry;

pub use client::{ControlPlane, KubeControlPlane, Managed, ObjectKey};
pub use crd::wait_for_crd;
pub use namespaces::ensure_namespace;
pub use retry::{patch_on_conflict, retry_on_conflict, update_on_conflict, RetryConfig};
