//! Pairs responses with the requests that preceded them.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Identifier handed out when a response arrives with nothing pending.
pub const NO_REQUEST_SEEN: &str = "<no-request-seen>";

/// Per-connection FIFO of request identifiers.
///
/// The request loop pushes, the response loop pops. Both run concurrently, so
/// every operation takes the lock for its whole duration; an identifier is
/// delivered at most once and never out of push order.
#[derive(Debug, Default)]
pub struct Correlator {
    pending: Mutex<VecDeque<String>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, id: impl Into<String>) {
        self.pending.lock().push_back(id.into());
    }

    /// Removes the oldest identifier, or returns [`NO_REQUEST_SEEN`].
    ///
    /// Never waits for a request to show up.
    pub fn pop(&self) -> String {
        self.try_pop().unwrap_or_else(|| NO_REQUEST_SEEN.to_owned())
    }

    pub fn try_pop(&self) -> Option<String> {
        self.pending.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Snapshot of the identifiers still waiting, oldest first.
    pub fn pending(&self) -> Vec<String> {
        self.pending.lock().iter().cloned().collect()
    }
}
