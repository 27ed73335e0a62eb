//! Non-reentrant event queue
//!
//! The dispatcher is either idle or draining. Whoever moves it from idle
//! to draining owns the drain loop until the queue is empty. Events emitted
//! on the draining thread (writes made by effects) are appended and picked
//! up by the running loop, so rule evaluation never recurses. Events from
//! any other thread are appended too, but their emitter blocks until the
//! drainer has processed them.

use crate::event::StateChangeEvent;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    Draining,
}

/// How an event handed to [`Dispatcher::dispatch`] was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// The caller drained the queue itself
    Drained,
    /// Queued behind the event being processed on this same thread
    Cascaded,
    /// Processed by another thread's drain while the caller waited
    Awaited,
}

struct DispatchState {
    queue: VecDeque<(u64, StateChangeEvent)>,
    phase: Phase,
    drainer: Option<ThreadId>,
    next_seq: u64,
    /// Highest sequence number whose processing has finished
    completed: u64,
}

pub(crate) struct Dispatcher {
    state: Mutex<DispatchState>,
    processed: Condvar,
    depth: AtomicUsize,
    max_depth: AtomicUsize,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(DispatchState {
                queue: VecDeque::new(),
                phase: Phase::Idle,
                drainer: None,
                next_seq: 1,
                completed: 0,
            }),
            processed: Condvar::new(),
            depth: AtomicUsize::new(0),
            max_depth: AtomicUsize::new(0),
        }
    }

    /// Queue an event and see it processed
    ///
    /// Returns once `process` has run for the event, except when called from
    /// inside `process` on the draining thread: then the event is only
    /// queued. A waiting thread takes over the drain if the drainer stops
    /// before reaching its event.
    pub(crate) fn dispatch(
        &self,
        event: StateChangeEvent,
        mut process: impl FnMut(StateChangeEvent),
    ) -> Delivery {
        let me = thread::current().id();
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push_back((seq, event));

        loop {
            if state.completed >= seq {
                return Delivery::Awaited;
            }
            let phase = state.phase;
            match phase {
                Phase::Idle => {
                    state.phase = Phase::Draining;
                    state.drainer = Some(me);
                    drop(state);
                    self.drain(&mut process);
                    return Delivery::Drained;
                }
                Phase::Draining if state.drainer == Some(me) => return Delivery::Cascaded,
                Phase::Draining => self.processed.wait(&mut state),
            }
        }
    }

    /// Pop the head event, or go idle when there is none
    ///
    /// Both happen under the same lock so an event appended concurrently is
    /// either returned here or finds the dispatcher idle.
    fn next(&self) -> Option<(u64, StateChangeEvent)> {
        let mut state = self.state.lock();
        let next = state.queue.pop_front();
        if next.is_none() {
            state.phase = Phase::Idle;
            state.drainer = None;
            self.processed.notify_all();
        }
        next
    }

    fn finish(&self, seq: u64) {
        let mut state = self.state.lock();
        state.completed = state.completed.max(seq);
        self.processed.notify_all();
    }

    fn drain(&self, process: &mut impl FnMut(StateChangeEvent)) {
        let mut guard = DrainGuard {
            dispatcher: self,
            in_flight: None,
        };
        while let Some((seq, event)) = self.next() {
            guard.in_flight = Some(seq);
            let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_depth.fetch_max(depth, Ordering::SeqCst);
            process(event);
            self.depth.fetch_sub(1, Ordering::SeqCst);
            self.finish(seq);
            guard.in_flight = None;
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub(crate) fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Deepest nesting of event processing observed so far
    pub(crate) fn max_depth(&self) -> usize {
        self.max_depth.load(Ordering::SeqCst)
    }
}

/// Returns the dispatcher to idle if the drain loop unwinds
///
/// The event being processed counts as finished; anything still queued is
/// left for a waiting emitter to drain.
struct DrainGuard<'a> {
    dispatcher: &'a Dispatcher,
    in_flight: Option<u64>,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.dispatcher.depth.store(0, Ordering::SeqCst);
            let mut state = self.dispatcher.state.lock();
            if let Some(seq) = self.in_flight {
                state.completed = state.completed.max(seq);
            }
            state.phase = Phase::Idle;
            state.drainer = None;
            self.dispatcher.processed.notify_all();
        }
    }
}
