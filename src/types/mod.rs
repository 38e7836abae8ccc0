// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed records for every kind the operator reads or writes.

pub mod application;
pub mod infrastructure;
pub mod installation;
pub mod olm;

pub use application::Application;
pub use infrastructure::Infrastructure;
pub use installation::{GitopsInstallation, GitopsInstallationSpec};
pub use olm::{OperatorGroup, Subscription};
