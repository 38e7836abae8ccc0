// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;

/// Operator configuration loaded from flags or environment variables
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Address the metrics endpoint binds to, "0" disables it
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = "0")]
    pub metrics_bind_address: String,

    /// Address the liveness and readiness probes bind to, "0" disables them
    #[arg(long, env = "HEALTH_PROBE_BIND_ADDRESS", default_value = "0.0.0.0:8081")]
    pub health_probe_bind_address: String,

    /// Acquire a lease before running so only one replica is active
    #[arg(long, env = "LEADER_ELECT", default_value_t = false)]
    pub leader_elect: bool,

    /// Serve HTTP/2 on the probe and metrics endpoints
    #[arg(long, env = "ENABLE_HTTP2", default_value_t = false)]
    pub enable_http2: bool,

    /// Namespace holding the installation record and the repository credential
    #[arg(long, env = "SOURCE_NAMESPACE", default_value = "rhacs")]
    pub source_namespace: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            metrics_bind_address: "0".to_string(),
            health_probe_bind_address: "0.0.0.0:8081".to_string(),
            leader_elect: false,
            enable_http2: false,
            source_namespace: "rhacs".to_string(),
        }
    }
}

impl Config {
    pub fn metrics_addr(&self) -> Result<Option<SocketAddr>> {
        parse_bind_address(&self.metrics_bind_address).context("invalid --metrics-bind-address")
    }

    pub fn health_probe_addr(&self) -> Result<Option<SocketAddr>> {
        parse_bind_address(&self.health_probe_bind_address)
            .context("invalid --health-probe-bind-address")
    }
}

/// "0" or an empty value disables a listener; ":8080" binds all interfaces
fn parse_bind_address(value: &str) -> Result<Option<SocketAddr>> {
    let value = value.trim();
    if value.is_empty() || value == "0" {
        return Ok(None);
    }
    let full = if value.starts_with(':') {
        format!("0.0.0.0{}", value)
    } else {
        value.to_string()
    };
    let addr = full
        .parse()
        .with_context(|| format!("{} is not a socket address", value))?;
    Ok(Some(addr))
}
