// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::{Handler, HandlerId, JoinSpec, WorkflowContext};
use crate::errors::WorkflowError;
use crate::events::{EventKind, KindId};

/// A set of join-specs plus engine configuration.
///
/// A workflow is cheap to clone and is shared by every context created from
/// it. Each event kind used in a join-spec gets a stable counter, assigned in
/// registration order; counters are what snapshots store instead of kinds.
///
/// # Example
/// ```
/// use the_junction::engine::{Handler, Workflow};
/// use the_junction::events::define_event;
///
/// let start = define_event("start");
/// let stop = define_event("stop");
///
/// let workflow = Workflow::new();
/// let stop_kind = stop.clone();
/// workflow
///     .handle(&[start.clone()], Handler::new("finish", move |_, _| Ok(Some(stop_kind.make(())))))
///     .unwrap();
///
/// assert_eq!(workflow.kind_counter(&start), Some(0));
/// assert_eq!(workflow.kind_counter(&stop), None);
/// ```
#[derive(Clone, Default)]
pub struct Workflow {
    inner: Arc<WorkflowInner>,
}

#[derive(Default)]
struct WorkflowInner {
    registry: RwLock<Registry>,
    config: EngineConfig,
}

#[derive(Default)]
struct Registry {
    specs: Vec<Arc<JoinSpec>>,
    kinds: Vec<EventKind>,
    counters: HashMap<KindId, u32>,
    names: HashMap<String, HandlerId>,
}

impl Registry {
    fn register_kind(&mut self, kind: &EventKind) {
        if !self.counters.contains_key(&kind.id()) {
            let counter = self.kinds.len() as u32;
            self.counters.insert(kind.id(), counter);
            self.kinds.push(kind.clone());
        }
        for member in kind.members() {
            self.register_kind(member);
        }
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(WorkflowInner {
                registry: RwLock::new(Registry::default()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Register `handler` to fire when one event per listed kind is queued.
    ///
    /// # Errors
    /// * `EmptyJoinSpec` - `kinds` is empty
    /// * `DuplicateRegistration` - the same handler is already registered for
    ///   exactly these kinds
    /// * `DuplicateHandlerName` - a different handler already uses this name
    pub fn handle(&self, kinds: &[EventKind], handler: Handler) -> Result<HandlerId, WorkflowError> {
        if kinds.is_empty() {
            return Err(WorkflowError::EmptyJoinSpec {
                handler: handler.name().to_string(),
            });
        }

        let mut registry = self.inner.registry.write();

        if let Some(existing) = registry.names.get(handler.name()) {
            if *existing != handler.id() {
                return Err(WorkflowError::DuplicateHandlerName {
                    handler: handler.name().to_string(),
                });
            }
        }

        let duplicate = registry
            .specs
            .iter()
            .any(|spec| spec.handler().id() == handler.id() && spec.kinds() == kinds);
        if duplicate {
            return Err(WorkflowError::DuplicateRegistration {
                handler: handler.name().to_string(),
                kinds: kinds
                    .iter()
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        for kind in kinds {
            registry.register_kind(kind);
        }
        let id = handler.id();
        registry.names.insert(handler.name().to_string(), id);
        registry
            .specs
            .push(Arc::new(JoinSpec::new(kinds.to_vec(), handler)));
        Ok(id)
    }

    /// Create a fresh context with an empty queue and a root node.
    pub fn create_context(&self) -> WorkflowContext {
        WorkflowContext::new(self.clone())
    }

    /// The registered join-specs, in registration order.
    pub fn join_specs(&self) -> Vec<Arc<JoinSpec>> {
        self.inner.registry.read().specs.clone()
    }

    /// The stable counter of a kind used by any join-spec, if any.
    pub fn kind_counter(&self, kind: &EventKind) -> Option<u32> {
        self.inner.registry.read().counters.get(&kind.id()).copied()
    }

    pub fn kind_for_counter(&self, counter: u32) -> Option<EventKind> {
        self.inner
            .registry
            .read()
            .kinds
            .get(counter as usize)
            .cloned()
    }

    /// Number of kinds with a counter.
    pub fn kind_count(&self) -> u32 {
        self.inner.registry.read().kinds.len() as u32
    }

    /// Content hash over every (required kind counters, handler name) pair.
    pub fn version(&self) -> String {
        let registry = self.inner.registry.read();
        let mut hasher = Sha256::new();
        for spec in &registry.specs {
            let counters = spec
                .kinds()
                .iter()
                .filter_map(|k| registry.counters.get(&k.id()))
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(",");
            hasher.update(counters.as_bytes());
            hasher.update(b":");
            hasher.update(spec.handler().name().as_bytes());
            hasher.update(b";");
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{any_of, define_event};

    fn noop(name: &str) -> Handler {
        Handler::new(name.to_string(), |_, _| Ok(None))
    }

    #[test]
    fn test_empty_join_spec_rejected() {
        let workflow = Workflow::new();
        let result = workflow.handle(&[], noop("empty"));
        assert_eq!(
            result,
            Err(WorkflowError::EmptyJoinSpec {
                handler: "empty".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let a = define_event("a");
        let b = define_event("b");
        let workflow = Workflow::new();
        let handler = noop("h");

        workflow.handle(&[a.clone()], handler.clone()).unwrap();
        // Same handler on different kinds is a separate join-spec
        workflow.handle(&[b.clone()], handler.clone()).unwrap();

        let result = workflow.handle(&[a.clone()], handler);
        assert!(matches!(
            result,
            Err(WorkflowError::DuplicateRegistration { .. })
        ));
        assert_eq!(workflow.join_specs().len(), 2);
    }

    #[test]
    fn test_handler_names_must_be_unique() {
        let a = define_event("a");
        let workflow = Workflow::new();

        workflow.handle(&[a.clone()], noop("same")).unwrap();
        let result = workflow.handle(&[a], noop("same"));
        assert!(matches!(
            result,
            Err(WorkflowError::DuplicateHandlerName { .. })
        ));
    }

    #[test]
    fn test_identical_kind_lists_stay_independent() {
        let a = define_event("a");
        let workflow = Workflow::new();

        workflow.handle(&[a.clone()], noop("first")).unwrap();
        workflow.handle(&[a.clone()], noop("second")).unwrap();

        assert_eq!(workflow.join_specs().len(), 2);
        assert_eq!(workflow.kind_count(), 1);
    }

    #[test]
    fn test_counters_follow_registration_order_and_include_members() {
        let a = define_event("a");
        let b = define_event("b");
        let c = define_event("c");
        let either = any_of([b.clone(), c.clone()]);
        let workflow = Workflow::new();

        workflow.handle(&[a.clone(), either.clone()], noop("h")).unwrap();

        assert_eq!(workflow.kind_counter(&a), Some(0));
        assert_eq!(workflow.kind_counter(&either), Some(1));
        assert_eq!(workflow.kind_counter(&b), Some(2));
        assert_eq!(workflow.kind_counter(&c), Some(3));
        assert_eq!(workflow.kind_for_counter(2), Some(b));
        assert_eq!(workflow.kind_for_counter(9), None);
    }

    #[test]
    fn test_version_is_stable_and_tracks_definition() {
        let build = |names: &[&str]| {
            let a = define_event("a");
            let workflow = Workflow::new();
            for name in names {
                workflow.handle(&[a.clone()], noop(name)).unwrap();
            }
            workflow.version()
        };

        assert_eq!(build(&["x", "y"]), build(&["x", "y"]));
        assert_ne!(build(&["x", "y"]), build(&["x", "z"]));
        assert_eq!(build(&["x"]).len(), 64);
    }

    #[test]
    fn test_with_config_is_visible() {
        let cfg = EngineConfig::from_yaml_str("dispatch:\n  max_cascade_rounds: 3\n").unwrap();
        let workflow = Workflow::with_config(cfg);
        assert_eq!(workflow.config().dispatch.get_max_cascade_rounds(), 3);
    }
}
