// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Runs the installation reconciler under a kube-runtime controller.
//!
//! Every watched source goes through a [`Dispatcher`] and every admitted event
//! maps to the one installation key; the controller queue takes care of
//! deduplication and serialises reconciles.

use crate::constants::{application, installation, namespaces, repository, ERROR_REQUEUE_SECS};
use crate::error::{OperatorError, Result};
use crate::kubernetes::KubeControlPlane;
use crate::metrics::record_reconcile;
use crate::reconcilers::watches::{
    application_watch, installation_watch, repository_secret_watch, source_secret_watch,
    Dispatcher,
};
use crate::reconcilers::Reconciler;
use crate::types::{Application, GitopsInstallation};
use futures::{future, stream, Stream, StreamExt};
use k8s_openapi::api::core::v1::Secret;
use kube::{
    runtime::{
        controller::Action,
        reflector::{self, ObjectRef},
        watcher::{self, watcher, Event},
        Controller, WatchStreamExt,
    },
    Api, Client, Resource,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct Context {
    reconciler: Reconciler<KubeControlPlane>,
    cancel: CancellationToken,
}

/// Keep only the objects `dispatcher` admits; watch errors pass through
fn admitted<K, S>(
    events: S,
    dispatcher: Dispatcher,
) -> impl Stream<Item = std::result::Result<K, watcher::Error>> + Send
where
    K: Resource + Send + 'static,
    S: Stream<Item = std::result::Result<Event<K>, watcher::Error>> + Send,
{
    events.filter_map(move |event| {
        let admitted = match event {
            Ok(event) => dispatcher.admit(event).map(Ok),
            Err(e) => Some(Err(e)),
        };
        future::ready(admitted)
    })
}

/// Mapper sending any watched object to the installation key
fn to_target<K>(
    target: ObjectRef<GitopsInstallation>,
) -> impl Fn(K) -> Option<ObjectRef<GitopsInstallation>> + Send + Sync + 'static {
    move |_| Some(target.clone())
}

/// Server-side filter on the object name
fn named(name: &str) -> WatcherConfig {
    WatcherConfig::default().fields(&format!("metadata.name={}", name))
}

/// Watch installations, both repository secrets and the bootstrap application
/// until a shutdown signal arrives.
///
/// `cancel` aborts in-flight reconciles (the CRD wait in particular) so that
/// shutdown does not block on a missing Application kind.
pub async fn run(client: Client, source_namespace: &str, cancel: CancellationToken) {
    let target = ObjectRef::<GitopsInstallation>::new(installation::NAME).within(source_namespace);

    let (reader, writer) = reflector::store();
    let installations = admitted(
        watcher(Api::<GitopsInstallation>::all(client.clone()), WatcherConfig::default())
            .default_backoff()
            .reflect(writer),
        Dispatcher::new(installation_watch()),
    );

    let source_secrets = admitted(
        watcher(
            Api::<Secret>::namespaced(client.clone(), source_namespace),
            named(repository::SECRET_NAME),
        )
        .default_backoff(),
        Dispatcher::new(source_secret_watch(source_namespace)),
    );

    let repository_secrets = admitted(
        watcher(
            Api::<Secret>::namespaced(client.clone(), namespaces::AGENT),
            named(repository::SECRET_NAME),
        )
        .default_backoff(),
        Dispatcher::new(repository_secret_watch()),
    );

    // Errors until the GitOps operator registers the kind; the backoff keeps retrying
    let applications = admitted(
        watcher(
            Api::<Application>::namespaced(client.clone(), namespaces::AGENT),
            named(application::NAME),
        )
        .default_backoff(),
        Dispatcher::new(application_watch()),
    );

    let context = Arc::new(Context {
        reconciler: Reconciler::new(KubeControlPlane::new(client), source_namespace),
        cancel,
    });

    info!("Starting installation controller for {}", target);

    // The primary stream stays empty: installation events are mapped like every
    // other source so that all triggers share the one queue entry.
    Controller::for_stream(stream::pending(), reader)
        .watches_stream(installations, to_target(target.clone()))
        .watches_stream(source_secrets, to_target(target.clone()))
        .watches_stream(repository_secrets, to_target(target.clone()))
        .watches_stream(applications, to_target(target))
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|res| async move {
            match res {
                Ok(o) => debug!("Reconciled installation: {:?}", o),
                Err(e) => warn!("Reconciliation error: {:?}", e),
            }
        })
        .await;

    info!("Installation controller stopped");
}

/// Whatever triggered, the fixed installation key is what gets converged
async fn reconcile(_installation: Arc<GitopsInstallation>, ctx: Arc<Context>) -> Result<Action> {
    let key = ctx.reconciler.installation_key();
    let started = Instant::now();

    let outcome = ctx.reconciler.reconcile(&key, &ctx.cancel).await;

    record_reconcile(&outcome, started.elapsed());
    outcome
}

fn error_policy(
    _installation: Arc<GitopsInstallation>,
    error: &OperatorError,
    _ctx: Arc<Context>,
) -> Action {
    if error.is_validation() {
        warn!("Installation not ready: {}", error);
    } else {
        error!("Reconciliation error: {}", error);
    }
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_SECS))
}
