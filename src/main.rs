// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kube::{Client, CustomResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rhacs_gitops_operator::config::Config;
use rhacs_gitops_operator::constants::OPERATOR_NAME;
use rhacs_gitops_operator::error::OperatorError;
use rhacs_gitops_operator::kubernetes::KubeControlPlane;
use rhacs_gitops_operator::leader::{default_identity, LeaderElector};
use rhacs_gitops_operator::reconcilers::seed_installation;
use rhacs_gitops_operator::server::{self, Endpoints};
use rhacs_gitops_operator::types::GitopsInstallation;
use rhacs_gitops_operator::{controller, metrics, telemetry};

#[derive(Parser)]
#[command(name = OPERATOR_NAME, version, about = "Bootstraps ArgoCD and the RHACS bootstrap application")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    config: Config,
}

#[derive(Subcommand)]
enum Command {
    /// Print the GitopsInstallation CustomResourceDefinition as YAML
    Crd,
}

/// Cancel `token` on SIGINT or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut term =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(term) => term,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    let _ = ctrl_c.await;
                    token.cancel();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    let _ = ctrl_c.await;

    info!("Shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Crd) = cli.command {
        print!("{}", serde_yaml::to_string(&GitopsInstallation::crd())?);
        return Ok(());
    }

    telemetry::init();

    info!("Starting {}", OPERATOR_NAME);

    let config = cli.config;
    info!(
        "Configuration loaded: source_namespace={}, leader_elect={}",
        config.source_namespace, config.leader_elect
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    if let Some(addr) = config.health_probe_addr()? {
        let listener = server::bind(addr).await?;
        tokio::spawn(server::serve(
            listener,
            Endpoints::Probes,
            config.enable_http2,
            shutdown.clone(),
        ));
    }

    if let Some(addr) = config.metrics_addr()? {
        metrics::init_metrics();
        let listener = server::bind(addr).await?;
        tokio::spawn(server::serve(
            listener,
            Endpoints::Metrics,
            config.enable_http2,
            shutdown.clone(),
        ));
    }

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;
    info!("Connected to Kubernetes cluster");

    let plane = KubeControlPlane::new(client.clone());

    let elector = if config.leader_elect {
        let elector = LeaderElector::new(plane.clone(), &config.source_namespace, &default_identity());
        match elector.acquire(&shutdown).await {
            Ok(()) => Some(elector),
            Err(OperatorError::Cancelled) => return Ok(()),
            Err(e) => return Err(e).context("leader election failed"),
        }
    } else {
        None
    };

    seed_installation(&plane, &config.source_namespace)
        .await
        .context("failed to seed the installation record")?;

    let controller = controller::run(client, &config.source_namespace, shutdown.clone());

    let outcome = match &elector {
        Some(elector) => {
            tokio::pin!(controller);
            tokio::select! {
                _ = &mut controller => Ok(()),
                held = elector.hold(&shutdown) => match held {
                    Ok(()) => {
                        controller.await;
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
            }
        }
        None => {
            controller.await;
            Ok(())
        }
    };

    shutdown.cancel();

    if let Some(elector) = &elector {
        if let Err(e) = elector.release().await {
            warn!("Failed to release lease: {}", e);
        }
    }

    outcome.context("operator stopped")?;

    info!("{} stopped", OPERATOR_NAME);
    Ok(())
}
