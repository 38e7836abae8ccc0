// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Drift detection between observed and desired objects.
//!
//! Only the attributes the operator owns are compared; annotations, status,
//! owner references and server-populated metadata never count as drift.

use crate::types::Application;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Data, labels or type differ; absent and empty data are the same
pub fn secret_needs_update(current: &Secret, desired: &Secret) -> bool {
    let empty = BTreeMap::new();
    current.data.as_ref().unwrap_or(&empty) != desired.data.as_ref().unwrap_or(&empty)
        || current.labels() != desired.labels()
        || current.type_ != desired.type_
}

/// Spec or labels differ
pub fn application_needs_update(current: &Application, desired: &Application) -> bool {
    current.spec != desired.spec || current.labels() != desired.labels()
}
