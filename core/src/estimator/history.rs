//! Fixed-capacity FIFO history

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Ring buffer keeping the most recent `capacity` entries in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundedHistory<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    /// Capacity must be non-zero; the estimator validates this before construction.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: T) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> BoundedHistory<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_on_overflow() {
        let mut history = BoundedHistory::new(3);
        for value in 1..=5 {
            history.push(value);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.to_vec(), vec![3, 4, 5]);
    }
}
