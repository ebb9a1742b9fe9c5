//! Per-side Pending Registry: an ordered, collision-checked list of
//! commands awaiting a response on one physical side.

use crate::command::{CommandCompletion, CommandId, DecoderFn};
use crate::error::EngineError;
use bytes::Bytes;
use std::sync::{Arc, Mutex};

/// An admitted command, owned by the registry until it resolves, times
/// out, or is cancelled.
pub struct PendingEntry {
    pub id: CommandId,
    pub response_prefix: Bytes,
    pub decoder: DecoderFn,
    pub completion: Arc<CommandCompletion>,
}

/// Byte-wise prefix check used both by admission (collision) and dispatch
/// (match): does `prefix` appear as the leading bytes of `data`?
fn is_prefix_of(prefix: &[u8], data: &[u8]) -> bool {
    data.len() >= prefix.len() && data[..prefix.len()] == *prefix
}

/// Do `a` and `b` conflict under I1 — is either a byte-wise prefix of the
/// other, compared over `min(len_a, len_b)` bytes?
fn prefixes_conflict(a: &[u8], b: &[u8]) -> bool {
    let n = a.len().min(b.len());
    a[..n] == b[..n]
}

/// The per-side ordered command list. Safe for interleaved access by a
/// submitter (insert, cancel) and a receiver (match, remove on timeout).
#[derive(Default)]
pub struct PendingRegistry {
    entries: Mutex<Vec<PendingEntry>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `prefix` does not conflict (I1) with any entry
    /// currently admitted.
    pub fn admit(&self, prefix: &[u8]) -> bool {
        let entries = self.entries.lock().expect("registry mutex poisoned");
        !entries.iter().any(|e| prefixes_conflict(&e.response_prefix, prefix))
    }

    /// Appends `entry` unconditionally. Callers must have previously
    /// confirmed `admit` — use [`PendingRegistry::try_insert`] for the
    /// race-free combination of the two.
    pub fn insert(&self, entry: PendingEntry) {
        self.entries.lock().expect("registry mutex poisoned").push(entry);
    }

    /// Atomically checks admission and inserts under a single lock
    /// acquisition, closing the race window between separate `admit` and
    /// `insert` calls under concurrent submitters.
    pub fn try_insert(&self, entry: PendingEntry) -> Result<(), PendingEntry> {
        let mut entries = self.entries.lock().expect("registry mutex poisoned");
        if entries
            .iter()
            .any(|e| prefixes_conflict(&e.response_prefix, &entry.response_prefix))
        {
            return Err(entry);
        }
        entries.push(entry);
        Ok(())
    }

    /// Ids of every entry, in insertion order, whose response prefix is a
    /// byte-wise prefix of `data`. Does not remove anything.
    pub fn matches(&self, data: &[u8]) -> Vec<CommandId> {
        let entries = self.entries.lock().expect("registry mutex poisoned");
        entries
            .iter()
            .filter(|e| is_prefix_of(&e.response_prefix, data))
            .map(|e| e.id)
            .collect()
    }

    /// Removes and returns the entry with the given id, if still present.
    /// Idempotent: a concurrent match and timeout racing for the same id
    /// simply means the second caller sees `None`.
    pub fn take(&self, id: CommandId) -> Option<PendingEntry> {
        let mut entries = self.entries.lock().expect("registry mutex poisoned");
        let idx = entries.iter().position(|e| e.id == id)?;
        Some(entries.remove(idx))
    }

    /// Removes every entry currently held (used when a side disconnects).
    pub fn drain(&self) -> Vec<PendingEntry> {
        std::mem::take(&mut *self.entries.lock().expect("registry mutex poisoned"))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry mutex poisoned").len()
    }
}
