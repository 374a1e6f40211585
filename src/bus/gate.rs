//! Reentrant exclusive section serializing all dispatch of one hub.
//!
//! A thread entering the gate owns it until its outermost guard drops; the
//! same thread may re-enter (nested publishes), other threads wait. The gate
//! also tracks nesting depth so runaway publish chains are cut off before
//! they exhaust the stack.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use super::BusError;

/// Default bound on nested publishes per thread.
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Default)]
struct GateState {
    owner: Option<ThreadId>,
    depth: usize,
}

#[derive(Debug)]
pub struct DispatchGate {
    state: Mutex<GateState>,
    released: Condvar,
    max_depth: AtomicUsize,
}

impl Default for DispatchGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl DispatchGate {
    pub fn new(max_depth: usize) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            released: Condvar::new(),
            max_depth: AtomicUsize::new(max_depth.max(1)),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth.load(Ordering::Relaxed)
    }

    pub fn set_max_depth(&self, max_depth: usize) {
        self.max_depth.store(max_depth.max(1), Ordering::Relaxed);
    }

    /// Enter the gate, waiting while another thread holds it.
    pub fn enter(&self) -> Result<GateGuard<'_>, BusError> {
        let me = thread::current().id();
        let mut state = self
            .state
            .lock()
            .map_err(|_| BusError::LockPoisoned("gate enter"))?;
        while state.owner.is_some_and(|owner| owner != me) {
            state = self
                .released
                .wait(state)
                .map_err(|_| BusError::LockPoisoned("gate wait"))?;
        }
        state.owner = Some(me);
        state.depth += 1;
        Ok(GateGuard {
            gate: self,
            depth: state.depth,
        })
    }

    /// Current nesting depth (0 when nobody is inside).
    pub fn depth(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.depth)
            .unwrap_or_else(|poisoned| poisoned.into_inner().depth)
    }

    fn leave(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_all();
        }
    }
}

/// Held while inside the gate; leaving happens on drop, including on unwind.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a DispatchGate,
    depth: usize,
}

impl GateGuard<'_> {
    /// Nesting depth of this entry (1 for the outermost).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn exceeds_limit(&self) -> bool {
        self.depth > self.gate.max_depth()
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.leave();
    }
}
