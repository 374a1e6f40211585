//! Pending command/event correlations.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::event::Event;
use crate::message::MessageId;

static NEXT_OBSERVATION: AtomicU64 = AtomicU64::new(1);

/// Callback run with the first event answering an observed command.
pub type CorrelationCallback = Box<dyn FnOnce(&Event) + Send>;

/// Identifies one pending correlation; used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationId(u64);

impl ObservationId {
    fn next() -> Self {
        Self(NEXT_OBSERVATION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

pub(crate) struct PendingCorrelation {
    pub(crate) id: ObservationId,
    pub(crate) command_id: MessageId,
    pub(crate) callback: CorrelationCallback,
    pub(crate) expires_at: Option<Instant>,
}

impl fmt::Debug for PendingCorrelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCorrelation")
            .field("id", &self.id)
            .field("command_id", &self.command_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Watches in registration order.
#[derive(Debug, Default)]
pub(crate) struct Correlations {
    pending: Vec<PendingCorrelation>,
}

impl Correlations {
    pub(crate) fn push(
        &mut self,
        command_id: MessageId,
        callback: CorrelationCallback,
        expires_at: Option<Instant>,
    ) -> ObservationId {
        let id = ObservationId::next();
        self.pending.push(PendingCorrelation {
            id,
            command_id,
            callback,
            expires_at,
        });
        id
    }

    /// Remove and return the oldest watch for `command_id`.
    pub(crate) fn take_match(&mut self, command_id: &MessageId) -> Option<PendingCorrelation> {
        let index = self
            .pending
            .iter()
            .position(|pending| &pending.command_id == command_id)?;
        Some(self.pending.remove(index))
    }

    pub(crate) fn cancel(&mut self, id: ObservationId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|pending| pending.id != id);
        self.pending.len() != before
    }

    pub(crate) fn take_expired(&mut self, now: Instant) -> Vec<PendingCorrelation> {
        if self.pending.iter().all(|p| p.expires_at.is_none()) {
            return Vec::new();
        }
        let (expired, live): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|p| p.expires_at.is_some_and(|deadline| deadline <= now));
        self.pending = live;
        expired
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
