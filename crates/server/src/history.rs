use std::collections::VecDeque;
use std::sync::Arc;

use chathub_protocol::Message;

/// Append-only log of accepted messages.
///
/// Unbounded unless a limit is given, in which case it behaves as a ring
/// buffer: the oldest entry is dropped on each push past the limit.
/// [`total`](History::total) counts every append regardless of the limit.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: VecDeque<Arc<Message>>,
    limit: Option<usize>,
    total: u64,
}

impl History {
    /// Creates an empty history.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is `Some(0)`.
    pub fn new(limit: Option<usize>) -> Self {
        assert!(limit != Some(0), "history limit must be > 0");
        Self {
            entries: VecDeque::new(),
            limit,
            total: 0,
        }
    }

    /// Appends a message, dropping the oldest one when at the limit.
    pub fn push(&mut self, message: Arc<Message>) {
        if self.limit.is_some_and(|limit| self.entries.len() == limit) {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
        self.total += 1;
    }

    /// Iterates from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<Message>> + ExactSizeIterator {
        self.entries.iter()
    }

    /// The `n` most recent entries, oldest first.
    pub fn newest(&self, n: usize) -> impl Iterator<Item = &Arc<Message>> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of messages ever appended.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}
