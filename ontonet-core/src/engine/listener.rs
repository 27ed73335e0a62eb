//! Observers of processed state changes
//!
//! Listeners see every event the dispatcher processes, before the rule set
//! is evaluated against it. They observe only; writes go through effects.

use crate::event::StateChangeEvent;
use crate::types::ListenerId;
use parking_lot::RwLock;
use std::sync::Arc;

/// Callback invoked for each processed [`StateChangeEvent`]
pub trait StateChangeListener: Send + Sync {
    fn on_state_change(&self, event: &StateChangeEvent);
}

impl<F> StateChangeListener for F
where
    F: Fn(&StateChangeEvent) + Send + Sync,
{
    fn on_state_change(&self, event: &StateChangeEvent) {
        self(event)
    }
}

/// Listeners in registration order
#[derive(Default)]
pub(crate) struct Listeners {
    entries: RwLock<Vec<(ListenerId, Arc<dyn StateChangeListener>)>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Arc<dyn StateChangeListener>) -> ListenerId {
        let id = ListenerId::new();
        self.entries.write().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Copy of the current list; listeners may add or remove others while
    /// being called
    pub(crate) fn snapshot(&self) -> Vec<(ListenerId, Arc<dyn StateChangeListener>)> {
        self.entries.read().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove() {
        let listeners = Listeners::default();
        let first = listeners.add(Arc::new(|_: &StateChangeEvent| {}));
        let second = listeners.add(Arc::new(|_: &StateChangeEvent| {}));
        assert_ne!(first, second);
        assert_eq!(listeners.len(), 2);

        assert!(listeners.remove(first));
        assert!(!listeners.remove(first));
        let remaining: Vec<ListenerId> = listeners.snapshot().into_iter().map(|(id, _)| id).collect();
        assert_eq!(remaining, vec![second]);
    }
}
