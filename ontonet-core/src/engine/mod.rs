//! The decision network engine
//!
//! [`Engine`] is the explicit context every operation goes through. It
//! owns the object store, rule set, action registry and resource
//! scheduler, and runs the event-condition-action loop:
//!
//! 1. `update_attribute` writes into the store and emits one event
//! 2. the event is queued; if nobody is draining, the caller drains,
//!    otherwise it waits for the draining thread to reach the event
//! 3. state-change listeners observe the event, then every enabled rule
//!    whose condition matches fires, in descending priority (ties in
//!    registration order)
//! 4. each effect resolves its target, looks up its action and runs it;
//!    writes made by effects queue further events instead of recursing
//!
//! Nothing raised while processing an event escapes the drain loop. Not
//! found, rejected and faulted effects are logged and journaled, then
//! skipped.

mod config;
mod dispatch;
mod journal;
mod listener;

pub use config::{EngineConfig, CONFIG_FILE};
pub use journal::Notice;
pub use listener::StateChangeListener;

use crate::action::{Action, ActionRegistry, ActionSummary, EffectContext};
use crate::error::{EngineError, Result, SchedulerError};
use crate::event::StateChangeEvent;
use crate::object::{Link, OntologyObject};
use crate::rule::{DecisionRule, RuleEffect, RuleSet, RuleSummary};
use crate::store::ObjectStore;
use crate::scheduler::{Allocation, Project, ProjectStatus, ResourceScheduler, SharedResource};
use crate::types::{EventId, ListenerId, ObjectId, ProjectId, ResourceId, RuleId};
use crate::value::{AttributeValue, Params};
use dispatch::{Delivery, Dispatcher, Phase};
use journal::Journal;
use listener::Listeners;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};

#[derive(Default)]
struct Counters {
    events_processed: AtomicU64,
    events_ignored: AtomicU64,
    events_dropped: AtomicU64,
    rules_fired: AtomicU64,
    effects_executed: AtomicU64,
    effects_skipped: AtomicU64,
    effects_failed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Engine statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub running: bool,
    pub objects: usize,
    pub rules: usize,
    pub actions: usize,
    pub listeners: usize,
    pub resources: usize,
    pub projects: usize,
    pub events_processed: u64,
    pub events_ignored: u64,
    pub events_dropped: u64,
    pub rules_fired: u64,
    pub effects_executed: u64,
    pub effects_skipped: u64,
    pub effects_failed: u64,
    /// Deepest nesting of event processing seen; 1 once anything has run
    pub max_dispatch_depth: usize,
}

/// Decision network plus resource scheduler
pub struct Engine {
    config: EngineConfig,
    store: ObjectStore,
    rules: RuleSet,
    actions: ActionRegistry,
    scheduler: ResourceScheduler,
    dispatcher: Dispatcher,
    listeners: Listeners,
    journal: Journal,
    running: AtomicBool,
    counters: Counters,
}

impl Engine {
    /// Create a running engine with the built-in actions registered
    pub fn new(config: EngineConfig) -> Self {
        Self {
            journal: Journal::new(config.journal_capacity),
            config,
            store: ObjectStore::new(),
            rules: RuleSet::new(),
            actions: ActionRegistry::with_builtins(),
            scheduler: ResourceScheduler::new(),
            dispatcher: Dispatcher::new(),
            listeners: Listeners::default(),
            running: AtomicBool::new(true),
            counters: Counters::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    pub fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            info!("engine started");
        }
    }

    /// Stop evaluating rules. Attribute writes still land in the store.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether some caller is currently draining the event queue
    pub fn is_draining(&self) -> bool {
        self.dispatcher.phase() == Phase::Draining
    }

    // ---------------------------------------------------------------------
    // Objects
    // ---------------------------------------------------------------------

    /// Insert or wholesale-replace an object. Returns true when replacing.
    pub fn register_object(&self, object: OntologyObject) -> bool {
        debug!(object = %object.id, object_type = %object.object_type, "object registered");
        self.store.register(object).is_some()
    }

    pub fn remove_object(&self, id: &str) -> Option<OntologyObject> {
        let removed = self.store.remove(id);
        if removed.is_some() {
            debug!(object = id, "object removed");
        }
        removed
    }

    pub fn object(&self, id: &str) -> Option<OntologyObject> {
        self.store.get(id)
    }

    /// All objects sorted by id
    pub fn objects(&self) -> Vec<OntologyObject> {
        self.store.list()
    }

    pub fn add_link(&self, link: Link) -> Result<()> {
        debug!(source = %link.source, target = %link.target, relation = %link.relation, "link added");
        self.store.add_link(link)
    }

    pub fn remove_link(&self, object: &str, link_id: &str) -> Option<Link> {
        self.store.remove_link(object, link_id)
    }

    pub fn linked_objects(&self, id: &str, relation: Option<&str>) -> Vec<OntologyObject> {
        self.store.linked_objects(id, relation)
    }

    /// Write an attribute and hand the resulting event to the dispatcher
    ///
    /// Returns once the event has been processed. When this call starts the
    /// drain, every event it cascades into is processed too. Called from
    /// inside an effect, the event is queued and the call returns
    /// immediately.
    pub fn update_attribute(
        &self,
        id: &str,
        attribute: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<EventId> {
        let event = self
            .store
            .write_attribute(id, attribute, value.into())
            .inspect_err(|_| warn!(object = id, attribute, "update on unknown object"))?;
        let event_id = event.id();
        debug!(event_id = %event_id, object = id, attribute, "attribute updated");
        self.emit(event);
        Ok(event_id)
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Queue an event and see it processed
    ///
    /// From outside an effect this returns after the event and its cascade
    /// have been evaluated, waiting for another thread's drain if needed.
    /// From inside an effect the event is queued behind the current one.
    pub fn emit(&self, event: StateChangeEvent) {
        if !self.store.contains(event.object_id().as_str()) {
            warn!(event_id = %event.id(), object = %event.object_id(), "event for unknown object dropped");
            Counters::bump(&self.counters.events_dropped);
            self.journal.record(Notice::EventDropped {
                event: event.id(),
                object: event.object_id().clone(),
            });
            return;
        }
        if !self.is_running() {
            debug!(event_id = %event.id(), "engine stopped, event ignored");
            Counters::bump(&self.counters.events_ignored);
            self.journal.record(Notice::EventIgnored { event: event.id() });
            return;
        }

        let event_id = event.id();
        match self.dispatcher.dispatch(event, |event| self.process(&event)) {
            Delivery::Cascaded => {
                debug!(event_id = %event_id, pending = self.dispatcher.pending(), "event queued behind active drain")
            }
            Delivery::Awaited => debug!(event_id = %event_id, "event processed by concurrent drain"),
            Delivery::Drained => {}
        }
    }

    /// Rules that would fire for `event`, in firing order, without running them
    pub fn evaluate(&self, event: &StateChangeEvent) -> Vec<RuleId> {
        self.rules
            .firing_order()
            .into_iter()
            .filter(|rule| self.rules.is_enabled(rule.id().as_str()))
            .filter(|rule| matches!(catch_unwind(AssertUnwindSafe(|| rule.matches(event))), Ok(true)))
            .map(|rule| rule.id().clone())
            .collect()
    }

    fn process(&self, event: &StateChangeEvent) {
        Counters::bump(&self.counters.events_processed);
        debug!(event_id = %event.id(), object = %event.object_id(), attribute = event.attribute(), "processing event");
        self.notify_listeners(event);

        for rule in self.rules.firing_order() {
            // Earlier rules for this event may have toggled later ones
            if !self.rules.is_enabled(rule.id().as_str()) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| rule.matches(event))) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(payload) => {
                    let reason = panic_message(payload);
                    warn!(event_id = %event.id(), rule = %rule.id(), %reason, "condition panicked");
                    self.journal.record(Notice::ConditionFault {
                        event: event.id(),
                        rule: rule.id().clone(),
                        reason,
                    });
                    continue;
                }
            }

            info!(event_id = %event.id(), rule = %rule.id(), "rule fired");
            Counters::bump(&self.counters.rules_fired);
            self.journal.record(Notice::RuleFired {
                event: event.id(),
                rule: rule.id().clone(),
            });

            for effect in rule.effects() {
                self.run_effect(&rule, effect, event);
            }
        }
    }

    fn notify_listeners(&self, event: &StateChangeEvent) {
        for (id, listener) in self.listeners.snapshot() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener.on_state_change(event))) {
                let reason = panic_message(payload);
                warn!(event_id = %event.id(), listener = %id, %reason, "listener panicked");
                self.journal.record(Notice::ListenerFault {
                    event: event.id(),
                    listener: id,
                    reason,
                });
            }
        }
    }

    fn run_effect(&self, rule: &DecisionRule, effect: &RuleEffect, event: &StateChangeEvent) {
        let target_id = effect.target.resolve(event);

        let Some(target) = self.store.get(target_id.as_str()) else {
            warn!(event_id = %event.id(), rule = %rule.id(), action = %effect.action, object = %target_id, "effect target not found");
            Counters::bump(&self.counters.effects_skipped);
            self.journal.record(Notice::TargetNotFound {
                event: event.id(),
                rule: rule.id().clone(),
                action: effect.action.clone(),
                object: target_id.clone(),
            });
            return;
        };

        let Some(action) = self.actions.get(&effect.action) else {
            warn!(event_id = %event.id(), rule = %rule.id(), action = %effect.action, "action not found");
            Counters::bump(&self.counters.effects_skipped);
            self.journal.record(Notice::ActionNotFound {
                event: event.id(),
                rule: rule.id().clone(),
                action: effect.action.clone(),
            });
            return;
        };

        if let Err(err) = self.check_invocation(&action, &target, &effect.params) {
            warn!(event_id = %event.id(), rule = %rule.id(), action = action.name(), error = %err, "action rejected");
            Counters::bump(&self.counters.effects_skipped);
            self.journal.record(Notice::ActionRejected {
                event: event.id(),
                rule: rule.id().clone(),
                action: effect.action.clone(),
                reason: err.to_string(),
            });
            return;
        }

        let object = target.id.clone();
        match self.apply(&action, target, &effect.params, Some(event)) {
            Ok(()) => {
                info!(event_id = %event.id(), rule = %rule.id(), action = action.name(), object = %object, "action executed");
                Counters::bump(&self.counters.effects_executed);
                self.journal.record(Notice::ActionExecuted {
                    event: event.id(),
                    rule: rule.id().clone(),
                    action: effect.action.clone(),
                    object,
                });
            }
            Err(reason) => {
                warn!(event_id = %event.id(), rule = %rule.id(), action = action.name(), %reason, "effect failed");
                Counters::bump(&self.counters.effects_failed);
                self.journal.record(Notice::EffectFault {
                    event: event.id(),
                    rule: rule.id().clone(),
                    action: effect.action.clone(),
                    reason,
                });
            }
        }
    }

    fn check_invocation(&self, action: &Action, target: &OntologyObject, params: &Params) -> Result<()> {
        action.check(target, params)?;
        if self.config.enforce_permitted_actions && !target.permits(action.name()) {
            return Err(EngineError::ActionNotPermitted {
                object: target.id.to_string(),
                action: action.name().to_string(),
            });
        }
        Ok(())
    }

    /// Run an effect with panics and errors folded into a reason string
    fn apply(
        &self,
        action: &Action,
        target: OntologyObject,
        params: &Params,
        event: Option<&StateChangeEvent>,
    ) -> std::result::Result<(), String> {
        let mut ctx = EffectContext::new(self, action.name(), target, event);
        match catch_unwind(AssertUnwindSafe(|| action.effect().apply(&mut ctx, params))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(payload) => Err(panic_message(payload)),
        }
    }

    /// Invoke an action directly against an object, outside any rule
    ///
    /// Runs the same checks as rule-driven invocation. Attribute writes made
    /// by the effect are dispatched as usual.
    pub fn invoke_action(&self, action: &str, object: &str, params: &Params) -> Result<()> {
        let target = self
            .store
            .get(object)
            .ok_or_else(|| EngineError::ObjectNotFound(object.to_string()))?;
        let action = self
            .actions
            .get(action)
            .ok_or_else(|| EngineError::ActionNotFound(action.to_string()))?;
        self.check_invocation(&action, &target, params)?;

        self.apply(&action, target, params, None)
            .map_err(|reason| EngineError::EffectFault {
                action: action.name().to_string(),
                reason,
            })?;
        info!(action = action.name(), object, "action invoked");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Listeners
    // ---------------------------------------------------------------------

    /// Observe every processed event, before rules are evaluated against it
    pub fn add_listener(&self, listener: impl StateChangeListener + 'static) -> ListenerId {
        let id = self.listeners.add(Arc::new(listener));
        debug!(listener = %id, "listener added");
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // ---------------------------------------------------------------------
    // Rules and actions
    // ---------------------------------------------------------------------

    /// Register a rule, replacing any rule with the same id
    pub fn register_rule(&self, rule: DecisionRule) -> Result<bool> {
        let id = rule.id().clone();
        let replaced = self.rules.register(rule)?;
        debug!(rule = %id, replaced, "rule registered");
        Ok(replaced)
    }

    pub fn remove_rule(&self, id: &str) -> bool {
        self.rules.remove(id)
    }

    pub fn set_rule_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.rules.set_enabled(id, enabled)?;
        debug!(rule = id, enabled, "rule toggled");
        Ok(())
    }

    pub fn set_rule_priority(&self, id: &str, priority: i32) -> Result<()> {
        self.rules.set_priority(id, priority)?;
        debug!(rule = id, priority, "rule priority changed");
        Ok(())
    }

    /// Rules in firing order
    pub fn rules(&self) -> Vec<RuleSummary> {
        self.rules.summaries()
    }

    pub fn register_action(&self, action: Action) -> Result<bool> {
        let name = action.name().to_string();
        let replaced = self.actions.register(action)?;
        debug!(action = %name, replaced, "action registered");
        Ok(replaced)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains(name)
    }

    /// Actions sorted by name
    pub fn actions(&self) -> Vec<ActionSummary> {
        self.actions.summaries()
    }

    // ---------------------------------------------------------------------
    // Resources and projects
    // ---------------------------------------------------------------------

    pub fn add_resource(
        &self,
        id: impl Into<ResourceId>,
        name: impl Into<String>,
    ) -> std::result::Result<(), SchedulerError> {
        self.scheduler.add_resource(id, name)
    }

    /// Request a resource for a project, journaling the outcome
    pub fn request_resource(&self, resource: &str, project: &str) -> Allocation {
        let allocation = self.scheduler.request(resource, project);
        match &allocation {
            Allocation::Granted {
                resource,
                project,
                preempted,
            } => {
                if let Some(from) = preempted {
                    self.journal.record(Notice::ResourcePreempted {
                        resource: resource.clone(),
                        from: from.clone(),
                        to: project.clone(),
                    });
                }
                self.journal.record(Notice::ResourceGranted {
                    resource: resource.clone(),
                    project: project.clone(),
                });
            }
            Allocation::Denied {
                resource,
                project,
                denial,
            } => {
                self.journal.record(Notice::ResourceDenied {
                    resource: resource.clone(),
                    project: project.clone(),
                    reason: denial.to_string(),
                });
            }
        }
        allocation
    }

    /// Release a resource. Returns its former owner, if it had one.
    pub fn release_resource(&self, resource: &str) -> std::result::Result<Option<ProjectId>, SchedulerError> {
        let former = self.scheduler.release(resource)?;
        if let Some(project) = &former {
            self.journal.record(Notice::ResourceReleased {
                resource: ResourceId::new(resource),
                project: project.clone(),
            });
        }
        Ok(former)
    }

    pub fn register_project(&self, project: Project) -> std::result::Result<(), SchedulerError> {
        self.scheduler.register_project(project)
    }

    /// Remove a project and release everything it holds
    pub fn remove_project(&self, id: &str) -> std::result::Result<Vec<ResourceId>, SchedulerError> {
        let released = self.scheduler.remove_project(id)?;
        for resource in &released {
            self.journal.record(Notice::ResourceReleased {
                resource: resource.clone(),
                project: ProjectId::new(id),
            });
        }
        Ok(released)
    }

    pub fn set_project_status(
        &self,
        id: &str,
        status: ProjectStatus,
    ) -> std::result::Result<(), SchedulerError> {
        self.scheduler.set_project_status(id, status)
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.scheduler.project(id)
    }

    pub fn projects(&self) -> Vec<Project> {
        self.scheduler.projects()
    }

    pub fn resource(&self, id: &str) -> Option<SharedResource> {
        self.scheduler.resource(id)
    }

    pub fn resources(&self) -> Vec<SharedResource> {
        self.scheduler.resources()
    }

    pub fn allocations(&self) -> Vec<(ResourceId, ProjectId)> {
        self.scheduler.allocations()
    }

    // ---------------------------------------------------------------------
    // Notifications and inspection
    // ---------------------------------------------------------------------

    /// Publish a message about an object
    pub fn notify(&self, object: &ObjectId, message: String) {
        info!(object = %object, "{}", message);
        self.journal.record(Notice::Notification {
            object: object.clone(),
            message,
        });
    }

    /// Journal contents, oldest first
    pub fn notices(&self) -> Vec<Notice> {
        self.journal.snapshot()
    }

    pub fn clear_notices(&self) {
        self.journal.clear();
    }

    pub fn stats(&self) -> EngineStats {
        let c = &self.counters;
        EngineStats {
            running: self.is_running(),
            objects: self.store.len(),
            rules: self.rules.len(),
            actions: self.actions.len(),
            listeners: self.listeners.len(),
            resources: self.scheduler.resources().len(),
            projects: self.scheduler.projects().len(),
            events_processed: Counters::get(&c.events_processed),
            events_ignored: Counters::get(&c.events_ignored),
            events_dropped: Counters::get(&c.events_dropped),
            rules_fired: Counters::get(&c.rules_fired),
            effects_executed: Counters::get(&c.effects_executed),
            effects_skipped: Counters::get(&c.effects_skipped),
            effects_failed: Counters::get(&c.effects_failed),
            max_dispatch_depth: self.dispatcher.max_depth(),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("running", &self.is_running())
            .field("objects", &self.store.len())
            .field("rules", &self.rules.len())
            .field("actions", &self.actions.len())
            .field("listeners", &self.listeners.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
