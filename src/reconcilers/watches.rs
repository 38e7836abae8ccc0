// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watch predicates - decide which events on watched objects trigger a reconcile.

use crate::constants::{application, namespaces, repository};
use kube::api::ObjectMeta;
use kube::runtime::watcher::Event;
use kube::Resource;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::trace;

/// Which metadata field counts as a change for update events
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventFilter {
    /// Spec changes only (`metadata.generation`)
    GenerationChanged,
    /// Any write (`metadata.resourceVersion`)
    VersionChanged,
}

impl EventFilter {
    fn token(&self, meta: &ObjectMeta) -> Option<String> {
        match self {
            EventFilter::GenerationChanged => meta.generation.map(|g| g.to_string()),
            EventFilter::VersionChanged => meta.resource_version.clone(),
        }
    }
}

/// One watched kind: namespace and name predicates plus the event filter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchSpec {
    pub kind: &'static str,
    /// `None` matches every namespace
    pub namespace: Option<String>,
    /// `None` matches every name
    pub name: Option<String>,
    pub filter: EventFilter,
}

impl WatchSpec {
    pub fn matches(&self, meta: &ObjectMeta) -> bool {
        let namespace_ok = match &self.namespace {
            Some(ns) => meta.namespace.as_deref() == Some(ns.as_str()),
            None => true,
        };
        let name_ok = match &self.name {
            Some(name) => meta.name.as_deref() == Some(name.as_str()),
            None => true,
        };
        namespace_ok && name_ok
    }
}

pub fn installation_watch() -> WatchSpec {
    WatchSpec {
        kind: "GitopsInstallation",
        namespace: None,
        name: None,
        filter: EventFilter::GenerationChanged,
    }
}

pub fn source_secret_watch(source_namespace: &str) -> WatchSpec {
    WatchSpec {
        kind: "Secret",
        namespace: Some(source_namespace.to_string()),
        name: Some(repository::SECRET_NAME.to_string()),
        filter: EventFilter::VersionChanged,
    }
}

pub fn repository_secret_watch() -> WatchSpec {
    WatchSpec {
        kind: "Secret",
        namespace: Some(namespaces::AGENT.to_string()),
        name: Some(repository::SECRET_NAME.to_string()),
        filter: EventFilter::VersionChanged,
    }
}

pub fn application_watch() -> WatchSpec {
    WatchSpec {
        kind: "Application",
        namespace: Some(namespaces::AGENT.to_string()),
        name: Some(application::NAME.to_string()),
        filter: EventFilter::VersionChanged,
    }
}

/// Evaluates a [`WatchSpec`] against a watch stream.
///
/// Remembers the last token per object so that relists and status-only
/// writes are suppressed. First sightings and deletions always pass.
pub struct Dispatcher {
    spec: WatchSpec,
    seen: Mutex<HashMap<(Option<String>, String), Option<String>>>,
}

impl Dispatcher {
    pub fn new(spec: WatchSpec) -> Self {
        Self {
            spec,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// The object behind `event` if it should trigger a reconcile
    pub fn admit<K: Resource>(&self, event: Event<K>) -> Option<K> {
        match event {
            Event::Apply(obj) | Event::InitApply(obj) => {
                self.admit_applied(obj.meta()).then_some(obj)
            }
            Event::Delete(obj) => self.admit_deleted(obj.meta()).then_some(obj),
            Event::Init | Event::InitDone => None,
        }
    }

    fn admit_applied(&self, meta: &ObjectMeta) -> bool {
        if !self.spec.matches(meta) {
            return false;
        }
        let key = object_key(meta);
        let token = self.spec.filter.token(meta);
        let mut seen = match self.seen.lock() {
            Ok(seen) => seen,
            Err(poisoned) => poisoned.into_inner(),
        };

        match seen.insert(key, token.clone()) {
            None => true,
            Some(previous) if previous != token => true,
            Some(_) => {
                trace!(
                    "Suppressing unchanged {} {}/{}",
                    self.spec.kind,
                    meta.namespace.as_deref().unwrap_or_default(),
                    meta.name.as_deref().unwrap_or_default()
                );
                false
            }
        }
    }

    fn admit_deleted(&self, meta: &ObjectMeta) -> bool {
        if !self.spec.matches(meta) {
            return false;
        }
        let mut seen = match self.seen.lock() {
            Ok(seen) => seen,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.remove(&object_key(meta));
        true
    }
}

fn object_key(meta: &ObjectMeta) -> (Option<String>, String) {
    (meta.namespace.clone(), meta.name.clone().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GitopsInstallation;
    use k8s_openapi::api::core::v1::Secret;

    fn secret(namespace: &str, name: &str, version: &str) -> Secret {
        let mut s = Secret::default();
        s.metadata.namespace = Some(namespace.to_string());
        s.metadata.name = Some(name.to_string());
        s.metadata.resource_version = Some(version.to_string());
        s
    }

    fn installation(generation: i64, version: &str) -> GitopsInstallation {
        let mut install = GitopsInstallation::seeded("rhacs", "c1");
        install.metadata.generation = Some(generation);
        install.metadata.resource_version = Some(version.to_string());
        install
    }

    #[test]
    fn test_first_sighting_passes() {
        let d = Dispatcher::new(source_secret_watch("rhacs"));
        assert!(d
            .admit(Event::Apply(secret("rhacs", "acscs-manifests-repo", "1")))
            .is_some());
    }

    #[test]
    fn test_unchanged_version_is_suppressed() {
        let d = Dispatcher::new(source_secret_watch("rhacs"));
        d.admit(Event::InitApply(secret("rhacs", "acscs-manifests-repo", "1")));

        assert!(d
            .admit(Event::Apply(secret("rhacs", "acscs-manifests-repo", "1")))
            .is_none());
        assert!(d
            .admit(Event::Apply(secret("rhacs", "acscs-manifests-repo", "2")))
            .is_some());
    }

    #[test]
    fn test_delete_passes_and_resets() {
        let d = Dispatcher::new(repository_secret_watch());
        let s = secret("openshift-gitops", "acscs-manifests-repo", "5");
        d.admit(Event::Apply(s.clone()));

        assert!(d.admit(Event::Delete(s.clone())).is_some());
        // Recreated with the same version counts as a new sighting
        assert!(d.admit(Event::Apply(s)).is_some());
    }

    #[test]
    fn test_namespace_and_name_predicates() {
        let d = Dispatcher::new(source_secret_watch("rhacs"));

        assert!(d
            .admit(Event::Apply(secret("other", "acscs-manifests-repo", "1")))
            .is_none());
        assert!(d.admit(Event::Apply(secret("rhacs", "unrelated", "1"))).is_none());
        assert!(d
            .admit(Event::Delete(secret("rhacs", "unrelated", "1")))
            .is_none());
    }

    #[test]
    fn test_generation_filter_ignores_status_writes() {
        let d = Dispatcher::new(installation_watch());
        assert!(d.admit(Event::Apply(installation(1, "10"))).is_some());

        // Status or metadata write: new resourceVersion, same generation
        assert!(d.admit(Event::Apply(installation(1, "11"))).is_none());
        assert!(d.admit(Event::Apply(installation(2, "12"))).is_some());
    }

    #[test]
    fn test_installation_watch_spans_namespaces() {
        let d = Dispatcher::new(installation_watch());
        let mut elsewhere = installation(1, "1");
        elsewhere.metadata.namespace = Some("elsewhere".to_string());

        assert!(d.admit(Event::Apply(elsewhere)).is_some());
    }

    #[test]
    fn test_bookkeeping_events_are_ignored() {
        let d = Dispatcher::new(application_watch());
        assert!(d.admit::<Secret>(Event::Init).is_none());
        assert!(d.admit::<Secret>(Event::InitDone).is_none());
    }

    #[test]
    fn test_application_watch_coordinates() {
        let spec = application_watch();
        assert_eq!(spec.namespace.as_deref(), Some("openshift-gitops"));
        assert_eq!(spec.name.as_deref(), Some("rhacs-bootstrap"));
        assert_eq!(spec.filter, EventFilter::VersionChanged);
    }
}
