//! Ordered rule storage
//!
//! Rules are kept in registration order. The firing order is derived on
//! demand with a stable sort on descending priority, so rules of equal
//! priority fire in the order they were registered.

use super::{DecisionRule, RuleEffect};
use crate::error::{EngineError, Result};
use crate::types::RuleId;
use parking_lot::RwLock;
use serde::Serialize;
use std::cmp::Reverse;
use std::sync::Arc;

struct RuleEntry {
    priority: i32,
    enabled: bool,
    rule: Arc<DecisionRule>,
}

/// Read-only view of a registered rule, for display layers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSummary {
    pub id: RuleId,
    pub name: String,
    pub description: String,
    pub priority: i32,
    pub enabled: bool,
    pub condition: String,
    pub effects: Vec<RuleEffect>,
}

/// Registered decision rules
///
/// Priority and the enabled flag are the only fields that change after
/// registration.
#[derive(Default)]
pub struct RuleSet {
    entries: RwLock<Vec<RuleEntry>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule, replacing any rule with the same id
    ///
    /// A replaced rule loses its old position and is ordered as if newly
    /// registered. Returns true when a rule was replaced.
    pub fn register(&self, rule: DecisionRule) -> Result<bool> {
        rule.validate()?;

        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.rule.id != rule.id);
        let replaced = entries.len() != before;
        entries.push(RuleEntry {
            priority: rule.priority,
            enabled: rule.enabled,
            rule: Arc::new(rule),
        });
        Ok(replaced)
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.rule.id.as_str() != id);
        entries.len() != before
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.update(id, |entry| entry.enabled = enabled)
    }

    pub fn set_priority(&self, id: &str, priority: i32) -> Result<()> {
        self.update(id, |entry| entry.priority = priority)
    }

    /// Current enabled flag; unknown rules read as disabled
    pub fn is_enabled(&self, id: &str) -> bool {
        self.entries
            .read()
            .iter()
            .find(|e| e.rule.id.as_str() == id)
            .is_some_and(|e| e.enabled)
    }

    /// All rules in firing order: descending priority, ties by registration
    pub fn firing_order(&self) -> Vec<Arc<DecisionRule>> {
        let entries = self.entries.read();
        let mut ordered: Vec<(i32, Arc<DecisionRule>)> = entries
            .iter()
            .map(|e| (e.priority, Arc::clone(&e.rule)))
            .collect();
        ordered.sort_by_key(|(priority, _)| Reverse(*priority));
        ordered.into_iter().map(|(_, rule)| rule).collect()
    }

    /// Summaries in firing order
    pub fn summaries(&self) -> Vec<RuleSummary> {
        let entries = self.entries.read();
        let mut summaries: Vec<RuleSummary> = entries
            .iter()
            .map(|e| RuleSummary {
                id: e.rule.id.clone(),
                name: e.rule.name.clone(),
                description: e.rule.description.clone(),
                priority: e.priority,
                enabled: e.enabled,
                condition: e.rule.describe_condition(),
                effects: e.rule.effects.clone(),
            })
            .collect();
        summaries.sort_by_key(|s| Reverse(s.priority));
        summaries
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut RuleEntry)) -> Result<()> {
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.rule.id.as_str() == id)
            .ok_or_else(|| EngineError::RuleNotFound(id.to_string()))?;
        f(entry);
        Ok(())
    }
}
