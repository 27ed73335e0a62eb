//! Notification side channel
//!
//! Every meaningful transition in the engine is recorded as a [`Notice`]
//! in a bounded journal, next to the `tracing` event emitted for it.

use crate::types::{EventId, ListenerId, ObjectId, ProjectId, ResourceId, RuleId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    RuleFired {
        event: EventId,
        rule: RuleId,
    },
    ActionExecuted {
        event: EventId,
        rule: RuleId,
        action: String,
        object: ObjectId,
    },
    /// Effect target did not resolve in the store
    TargetNotFound {
        event: EventId,
        rule: RuleId,
        action: String,
        object: ObjectId,
    },
    ActionNotFound {
        event: EventId,
        rule: RuleId,
        action: String,
    },
    /// Type, permission or parameter check refused the invocation
    ActionRejected {
        event: EventId,
        rule: RuleId,
        action: String,
        reason: String,
    },
    EffectFault {
        event: EventId,
        rule: RuleId,
        action: String,
        reason: String,
    },
    ConditionFault {
        event: EventId,
        rule: RuleId,
        reason: String,
    },
    /// A state-change listener panicked
    ListenerFault {
        event: EventId,
        listener: ListenerId,
        reason: String,
    },
    /// Emitted while the engine was stopped
    EventIgnored {
        event: EventId,
    },
    /// Object no longer resolved when the event was emitted
    EventDropped {
        event: EventId,
        object: ObjectId,
    },
    ResourceGranted {
        resource: ResourceId,
        project: ProjectId,
    },
    ResourcePreempted {
        resource: ResourceId,
        from: ProjectId,
        to: ProjectId,
    },
    ResourceDenied {
        resource: ResourceId,
        project: ProjectId,
        reason: String,
    },
    ResourceReleased {
        resource: ResourceId,
        project: ProjectId,
    },
    /// Free-form message published by an effect
    Notification {
        object: ObjectId,
        message: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::RuleFired { event, rule } => write!(f, "[{}] rule {} fired", event, rule),
            Notice::ActionExecuted {
                event,
                rule,
                action,
                object,
            } => write!(f, "[{}] {} executed {} on {}", event, rule, action, object),
            Notice::TargetNotFound {
                event,
                rule,
                action,
                object,
            } => write!(
                f,
                "[{}] {} skipped {}: target {} not found",
                event, rule, action, object
            ),
            Notice::ActionNotFound {
                event,
                rule,
                action,
            } => write!(f, "[{}] {} skipped unknown action {}", event, rule, action),
            Notice::ActionRejected {
                event,
                rule,
                action,
                reason,
            } => write!(f, "[{}] {} skipped {}: {}", event, rule, action, reason),
            Notice::EffectFault {
                event,
                rule,
                action,
                reason,
            } => write!(f, "[{}] {} fault in {}: {}", event, rule, action, reason),
            Notice::ConditionFault {
                event,
                rule,
                reason,
            } => write!(f, "[{}] {} condition fault: {}", event, rule, reason),
            Notice::ListenerFault {
                event,
                listener,
                reason,
            } => write!(f, "[{}] {} fault: {}", event, listener, reason),
            Notice::EventIgnored { event } => write!(f, "[{}] ignored, engine stopped", event),
            Notice::EventDropped { event, object } => {
                write!(f, "[{}] dropped, object {} not found", event, object)
            }
            Notice::ResourceGranted { resource, project } => {
                write!(f, "{} granted to {}", resource, project)
            }
            Notice::ResourcePreempted { resource, from, to } => {
                write!(f, "{} preempted from {} by {}", resource, from, to)
            }
            Notice::ResourceDenied {
                resource,
                project,
                reason,
            } => write!(f, "{} denied to {}: {}", resource, project, reason),
            Notice::ResourceReleased { resource, project } => {
                write!(f, "{} released by {}", resource, project)
            }
            Notice::Notification { object, message } => write!(f, "{}: {}", object, message),
        }
    }
}

/// Bounded notice buffer; the oldest entry is evicted first
pub(crate) struct Journal {
    capacity: usize,
    notices: Mutex<VecDeque<Notice>>,
}

impl Journal {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            notices: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    pub(crate) fn record(&self, notice: Notice) {
        if self.capacity == 0 {
            return;
        }
        let mut notices = self.notices.lock();
        while notices.len() >= self.capacity {
            notices.pop_front();
        }
        notices.push_back(notice);
    }

    pub(crate) fn snapshot(&self) -> Vec<Notice> {
        self.notices.lock().iter().cloned().collect()
    }

    pub(crate) fn clear(&self) {
        self.notices.lock().clear();
    }
}
