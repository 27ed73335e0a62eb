//! Ontonet - decision network and resource arbitration engine
//!
//! This crate models software-development artifacts (requirements,
//! defects, code changes, test platforms) as ontology objects whose
//! attribute changes drive a prioritized event-condition-action loop, and
//! arbitrates exclusively-owned shared resources between projects.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Engine                            │
//! │                                                              │
//! │  update_attribute ──► ObjectStore ──► StateChangeEvent       │
//! │                                            │                 │
//! │                                            ▼                 │
//! │                              ┌──────────────────────────┐    │
//! │                              │ Dispatcher (idle/drain)  │    │
//! │                              │   FIFO event queue       │    │
//! │                              └────────────┬─────────────┘    │
//! │                                           │                  │
//! │                    RuleSet (priority desc, stable ties)      │
//! │                                           │                  │
//! │                                           ▼                  │
//! │                      ActionRegistry ──► Effect::apply        │
//! │                                           │                  │
//! │             ┌─────────────────────────────┴──────────┐       │
//! │             ▼                                        ▼       │
//! │   update_attribute (queued,             ResourceScheduler    │
//! │   never recursive)                      (priority preemption)│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! ## Events
//!
//! Every attribute write produces exactly one [`StateChangeEvent`]. Events
//! written from inside an effect are queued behind the event being
//! processed, so cascades never deepen the call stack.
//!
//! ## Rules and effects
//!
//! A [`DecisionRule`] pairs a [`Condition`] with an ordered list of
//! [`RuleEffect`]s. Effects name an [`Action`] and a target, either a
//! literal object id or `$source` for the event's own object.
//!
//! ## Resources
//!
//! The [`ResourceScheduler`] grants each [`SharedResource`] to at most one
//! [`Project`]. A strictly higher-priority request preempts the owner,
//! which is suspended; anything else is denied.
//!
//! # Example
//!
//! ```rust
//! use ontonet_core::{AttributeCondition, DecisionRule, Engine, OntologyObject, Operator, RuleEffect};
//!
//! let engine = Engine::with_defaults();
//! engine.register_object(
//!     OntologyObject::new("req_1", "requirement").with_attribute("security_level", "B"),
//! );
//! engine
//!     .register_rule(
//!         DecisionRule::new("strict_review", "Strict review")
//!             .with_priority(10)
//!             .with_condition(
//!                 AttributeCondition::new()
//!                     .on_attribute("security_level")
//!                     .compare(Operator::Equals, "A"),
//!             )
//!             .then(RuleEffect::new("enable_review", "$source")),
//!     )
//!     .unwrap();
//!
//! engine.update_attribute("req_1", "security_level", "A").unwrap();
//! let req = engine.object("req_1").unwrap();
//! assert_eq!(req.attribute("review_level").and_then(|v| v.as_str()), Some("strict"));
//! ```

pub mod action;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod event;
pub mod lift;
pub mod object;
pub mod rule;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod value;

pub use action::{Action, ActionRegistry, BuiltinEffect, Effect, EffectContext, ParamType};
pub use catalog::{Catalog, CatalogSummary};
pub use engine::{Engine, EngineConfig, EngineStats, Notice, StateChangeListener};
pub use error::{CatalogError, EffectError, EngineError, LiftError, SchedulerError};
pub use event::StateChangeEvent;
pub use lift::{DataMapper, SemanticLifter};
pub use object::{Link, OntologyObject};
pub use rule::{AttributeCondition, Condition, DecisionRule, Operator, RuleEffect, Target};
pub use scheduler::{Allocation, Denial, Project, ProjectStatus, ResourceScheduler, SharedResource};
pub use store::ObjectStore;
pub use types::{EventId, ListenerId, ObjectId, ProjectId, ResourceId, RuleId};
pub use value::{AttributeValue, Params};
