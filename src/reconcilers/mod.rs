// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconciliation logic: drift detection, the convergence sequence, watch
//! predicates and the startup seeder.

pub mod diff;
pub mod installation;
pub mod seeder;
pub mod watches;

pub use installation::Reconciler;
pub use seeder::seed_installation;
