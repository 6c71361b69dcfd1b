//! Pending-request table: correlation id to continuation mapping

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

/// What a pending request settles with: `Ok` carries the response data,
/// `Err` carries the raw value from the envelope's `error` field.
pub(crate) type Outcome = std::result::Result<Value, Value>;

/// The map from correlation id to the continuation awaiting that request's
/// outcome. Entries retire on the first of: success, error, or timeout
/// discard; a later frame for the same id finds nothing and is a no-op.
#[derive(Default)]
pub(crate) struct PendingRequests {
    entries: DashMap<String, oneshot::Sender<Outcome>>,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a new pending request, before its envelope is written to the
    /// transport so a fast response can never beat the registration. The
    /// returned guard removes the entry if the requester is dropped before it
    /// settles.
    pub(crate) fn register(&self, id: &str) -> (oneshot::Receiver<Outcome>, PendingGuard<'_>) {
        let (tx, rx) = oneshot::channel();
        if self.entries.insert(id.to_string(), tx).is_some() {
            tracing::warn!(id, "correlation id reused while still pending");
        }
        let guard = PendingGuard {
            table: self,
            id: id.to_string(),
        };
        (rx, guard)
    }

    /// Deliver an outcome to the pending entry, retiring it. Returns false
    /// when no entry exists (orphan or duplicate response).
    pub(crate) fn settle(&self, id: &str, outcome: Outcome) -> bool {
        match self.entries.remove(id) {
            Some((_, tx)) => {
                if tx.send(outcome).is_err() {
                    tracing::debug!(id, "requester gone before response delivery");
                }
                true
            }
            None => false,
        }
    }

    /// Drop a pending entry without delivering anything
    pub(crate) fn discard(&self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Discards its entry when dropped, so a requester abandoned by its caller
/// (an outer timeout, a select, task abort) cannot strand an entry in the
/// table. Settled and discarded entries are already gone and the extra
/// discard is a no-op.
pub(crate) struct PendingGuard<'a> {
    table: &'a PendingRequests,
    id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.discard(&self.id);
    }
}
