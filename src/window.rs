//! Sliding window of recent readings.

use crate::reading::Reading;
use std::collections::{vec_deque, VecDeque};

/// Fixed-capacity FIFO of the most recent readings, oldest first.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl SlidingWindow {
    /// Create an empty window. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest one when at capacity.
    pub fn push(&mut self, reading: Reading) {
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    /// Scoring is only defined once this returns true.
    pub fn is_full(&self) -> bool {
        self.readings.len() == self.capacity
    }

    /// Current contents, oldest to newest.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }

    /// Iterate oldest to newest without copying.
    pub fn iter(&self) -> vec_deque::Iter<'_, Reading> {
        self.readings.iter()
    }

    /// Most recent reading.
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fill progress in `[0, 1]`.
    pub fn fill_ratio(&self) -> f64 {
        self.readings.len() as f64 / self.capacity as f64
    }

    /// Drop all readings. Only used when a new session starts.
    pub fn clear(&mut self) {
        self.readings.clear();
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new(100)
    }
}
