//! Table of in-flight calls and their cancellation tokens.
//!
//! Entries are keyed by `(session, call id)`. Registering an id that is
//! already present shadows the earlier entry (last write wins): the earlier
//! call keeps running but can no longer be cancelled by id. Each entry
//! carries a ticket so that a finishing call only ever removes its own
//! entry, never one that shadowed it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use super::CallId;
use crate::domain::SessionId;

type Key = (SessionId, CallId);

#[derive(Debug, Default)]
struct Entries {
    next_ticket: u64,
    calls: HashMap<Key, (u64, CancellationToken)>,
}

/// Shared table of active calls. Every access holds one exclusive lock,
/// only for the duration of a lookup or mutation.
#[derive(Debug, Default)]
pub struct ActiveCallTable {
    entries: Mutex<Entries>,
}

impl ActiveCallTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a call; the returned guard removes the entry when dropped.
    #[must_use]
    pub fn track(
        self: &Arc<Self>,
        session: SessionId,
        id: CallId,
        token: CancellationToken,
    ) -> TrackedCall {
        let mut entries = self.lock();
        let ticket = entries.next_ticket;
        entries.next_ticket = entries.next_ticket.wrapping_add(1);
        let key = (session, id);
        if entries.calls.insert(key.clone(), (ticket, token)).is_some() {
            tracing::debug!(call_id = %key.1, "call id reused, earlier call shadowed");
        }
        TrackedCall {
            table: Arc::clone(self),
            key,
            ticket,
        }
    }

    /// Cancels and removes a tracked call. Returns `false` if no call with
    /// that id is active.
    pub fn cancel(&self, session: SessionId, id: &CallId) -> bool {
        let mut entries = self.lock();
        match entries.calls.remove(&(session, id.clone())) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Returns `true` if a call with that id is tracked.
    #[must_use]
    pub fn contains(&self, session: SessionId, id: &CallId) -> bool {
        self.lock().calls.contains_key(&(session, id.clone()))
    }

    /// Number of tracked calls across all sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().calls.len()
    }

    /// Returns `true` if no call is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().calls.is_empty()
    }

    fn release(&self, key: &Key, ticket: u64) {
        let mut entries = self.lock();
        if entries
            .calls
            .get(key)
            .is_some_and(|(current, _)| *current == ticket)
        {
            entries.calls.remove(key);
        }
    }
}

/// Removes its call from the [`ActiveCallTable`] on drop, whether the
/// handler returned, failed, panicked or was cancelled.
#[derive(Debug)]
pub struct TrackedCall {
    table: Arc<ActiveCallTable>,
    key: Key,
    ticket: u64,
}

impl Drop for TrackedCall {
    fn drop(&mut self) {
        self.table.release(&self.key, self.ticket);
    }
}
