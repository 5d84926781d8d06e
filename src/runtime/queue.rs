//! Ordered store of pending timer and alarm registrations.

use std::collections::BTreeMap;

use crate::schedule::timers::{TimerToken, WakeKind};

/// One registration waiting in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedWake {
    pub due_ms: u64,
    pub kind: WakeKind,
    pub token: TimerToken,
}

/// Registrations ordered by due time, then by insertion order.
#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: BTreeMap<(u64, u64), QueuedWake>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, due_ms: u64, kind: WakeKind, token: TimerToken) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            (due_ms, seq),
            QueuedWake {
                due_ms,
                kind,
                token,
            },
        );
    }

    /// Remove every registration of `kind` for `token`. Returns how many were removed.
    pub fn cancel(&mut self, kind: WakeKind, token: TimerToken) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !(entry.kind == kind && entry.token == token));
        before - self.entries.len()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.entries.keys().next().map(|&(due_ms, _)| due_ms)
    }

    /// Take the earliest registration if it is due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<QueuedWake> {
        let (&key, _) = self.entries.first_key_value()?;
        if key.0 > now_ms {
            return None;
        }
        self.entries.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registrations currently held for `token`, of any kind.
    pub fn outstanding(&self, token: TimerToken) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.token == token)
            .count()
    }

    pub fn outstanding_kind(&self, kind: WakeKind, token: TimerToken) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.kind == kind && entry.token == token)
            .count()
    }
}
