// =============================================================================
// CandleWindow — bounded rolling window of OHLCV bars
// =============================================================================
//
// The window is the single source of truth for one (symbol, timeframe)
// subscription. Insertion order equals chronological order:
//
//   * equal tail timestamp   -> replace the tail bar (in-progress update);
//                               field-for-field duplicates are a no-op
//   * strictly greater       -> append, evicting the oldest bar past capacity
//   * strictly less          -> rejected, the window never reorders history
//
// Nothing outside this type mutates the ring; downstream consumers only ever
// see cloned snapshots.

use std::collections::VecDeque;

use crate::error::MergeError;
use crate::market_data::Candle;

/// Outcome of a successful merge. `Appended` and `Replaced` change the
/// window and must be followed by exactly one "window changed" notification;
/// `Unchanged` must not trigger a recompute or a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Appended,
    Replaced,
    Unchanged,
}

/// Capacity-bounded, chronologically sorted candle ring.
pub struct CandleWindow {
    ring: VecDeque<Candle>,
    capacity: usize,
}

impl CandleWindow {
    /// Create an empty window retaining at most `capacity` bars. A zero
    /// capacity is clamped to 1 so the window can always hold the live bar.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Fold one incoming candle into the window.
    pub fn merge(&mut self, incoming: Candle) -> Result<MergeOutcome, MergeError> {
        let outcome = match self.ring.back() {
            None => {
                self.ring.push_back(incoming);
                MergeOutcome::Appended
            }
            Some(tail) if incoming.timestamp == tail.timestamp => {
                if *tail == incoming {
                    // Same-tick duplicate: skip the downstream recompute.
                    return Ok(MergeOutcome::Unchanged);
                }
                *self.ring.back_mut().expect("tail checked above") = incoming;
                MergeOutcome::Replaced
            }
            Some(tail) if incoming.timestamp > tail.timestamp => {
                self.ring.push_back(incoming);
                while self.ring.len() > self.capacity {
                    self.ring.pop_front();
                }
                MergeOutcome::Appended
            }
            Some(tail) => {
                return Err(MergeError::OutOfOrderCandle {
                    incoming: incoming.timestamp,
                    tail: tail.timestamp,
                });
            }
        };

        // Defensive: should be unreachable given the trim loop above.
        if self.ring.len() > self.capacity {
            return Err(MergeError::CapacityInvariant {
                len: self.ring.len(),
                capacity: self.capacity,
            });
        }

        Ok(outcome)
    }

    /// Cloned snapshot of all bars, oldest first.
    pub fn snapshot(&self) -> Vec<Candle> {
        self.ring.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.ring.back()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
