use std::collections::VecDeque;

use thiserror::Error;

use crate::PushRequest;

/// Backpressure policy for one destination's inbound queue.
#[derive(Clone, Copy, Debug)]
pub struct QueueConfig {
    /// Entries held before the queue starts declining.
    pub capacity: usize,
    /// Effective-priority boost an entry gains for every later submission it
    /// is passed over by. Any positive step bounds aging: an entry can be
    /// superseded at most (max priority spread / age_step) times.
    pub age_step: f32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 32,
            age_step: 0.05,
        }
    }
}

/// Errors that can occur enqueueing into a `PushQueue`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Destination queue is at capacity
    #[error("push queue saturated at {capacity} entries; the push must be declined")]
    Saturated { capacity: usize },
}

/// A request handed back by a queue that refused it.
pub struct Rejected {
    pub request: PushRequest,
    pub error: QueueError,
}

struct Entry {
    seq: u64,
    request: PushRequest,
}

/// Per-destination inbound queue: capacity-bounded, priority-ordered with
/// bounded aging.
///
/// Priority is advisory. When several pushes are pending the highest
/// effective priority leaves first, where effective priority grows with the
/// number of newer submissions, so no entry starves. Ties break toward the
/// earliest submission, which preserves per-origin FIFO order for pushes of
/// equal priority.
pub struct PushQueue {
    entries: VecDeque<Entry>,
    next_seq: u64,
    config: QueueConfig,
}

impl PushQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            next_seq: 0,
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.config.capacity
    }

    /// Accepts the request, or hands it back when saturated so the caller
    /// can decline it.
    pub fn enqueue(&mut self, request: PushRequest) -> Result<(), Rejected> {
        if self.is_full() {
            return Err(Rejected {
                request,
                error: QueueError::Saturated {
                    capacity: self.config.capacity,
                },
            });
        }
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.entries.push_back(Entry { seq, request });
        Ok(())
    }

    /// Removes and returns the entry with the highest effective priority.
    pub fn dequeue(&mut self) -> Option<PushRequest> {
        if self.entries.is_empty() {
            return None;
        }
        let newest = self.next_seq.wrapping_sub(1);
        let mut best_index = 0;
        let mut best_score = f32::MIN;
        for (index, entry) in self.entries.iter().enumerate() {
            let age = newest.wrapping_sub(entry.seq) as f32;
            let score = entry.request.priority() + age * self.config.age_step;
            // Strict comparison keeps the earliest submission on ties.
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }
        self.entries.remove(best_index).map(|entry| entry.request)
    }
}
