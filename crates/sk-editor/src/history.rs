//! Time-travel history.
//!
//! Every playing tick appends the state it produced together with the
//! events that produced it. The ring is bounded: once it holds
//! `max_len + 1` entries the oldest ones fall off the front. `idx` points at
//! the entry being shown; it is always in `0..len`.

use crate::input::InputEvent;
use sk_core::Value;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Entry {
    pub state: Value,
    /// Events consumed to produce `state` (empty for the initial state).
    pub events: Vec<InputEvent>,
}

#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Entry>,
    idx: usize,
    max_len: usize,
}

impl History {
    /// History holding just `initial`.
    pub fn new(initial: Value, max_len: usize) -> Self {
        let mut entries = VecDeque::with_capacity(max_len.min(1024) + 1);
        entries.push_back(Entry {
            state: initial,
            events: Vec::new(),
        });
        Self {
            entries,
            idx: 0,
            max_len,
        }
    }

    /// Back to `[initial]` at index 0.
    pub fn reset(&mut self, initial: Value) {
        self.entries.clear();
        self.entries.push_back(Entry {
            state: initial,
            events: Vec::new(),
        });
        self.idx = 0;
    }

    /// Append a step and point at it, evicting from the front past the
    /// bound.
    pub fn push(&mut self, state: Value, events: Vec<InputEvent>) {
        self.entries.push_back(Entry { state, events });
        while self.entries.len() > self.max_len + 1 {
            self.entries.pop_front();
        }
        self.idx = self.entries.len() - 1;
    }

    /// Drop every entry after `idx`. Returns how many were dropped.
    pub fn truncate_after_current(&mut self) -> usize {
        let dropped = self.entries.len() - (self.idx + 1);
        self.entries.truncate(self.idx + 1);
        dropped
    }

    /// Move to `idx`, clamped into range.
    pub fn seek(&mut self, idx: usize) -> usize {
        self.idx = idx.min(self.entries.len() - 1);
        self.idx
    }

    pub fn step_back(&mut self) -> usize {
        self.seek(self.idx.saturating_sub(1))
    }

    pub fn step_forward(&mut self) -> usize {
        self.seek(self.idx + 1)
    }

    pub fn current(&self) -> &Entry {
        &self.entries[self.idx]
    }

    pub fn get(&self, idx: usize) -> Option<&Entry> {
        self.entries.get(idx)
    }

    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_at_end(&self) -> bool {
        self.idx + 1 == self.entries.len()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn n(history: &History, idx: usize) -> f64 {
        history.get(idx).unwrap().state.as_number().unwrap()
    }

    #[test]
    fn push_moves_to_the_end() {
        let mut history = History::new(Value::Number(0.0), 10);
        history.push(Value::Number(1.0), vec![]);
        history.push(Value::Number(2.0), vec![]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.idx(), 2);
        assert!(history.is_at_end());
        assert_eq!(history.current().state.as_number(), Some(2.0));
    }

    #[test]
    fn bounded_ring_evicts_oldest() {
        let mut history = History::new(Value::Number(0.0), 3);
        for i in 1..=10 {
            history.push(Value::Number(i as f64), vec![]);
        }
        assert_eq!(history.len(), 4);
        assert_eq!(history.idx(), 3);
        assert_eq!(n(&history, 0), 7.0);
        assert_eq!(n(&history, 3), 10.0);
    }

    #[test]
    fn seek_is_clamped() {
        let mut history = History::new(Value::Number(0.0), 10);
        history.push(Value::Number(1.0), vec![]);
        assert_eq!(history.seek(99), 1);
        assert_eq!(history.step_forward(), 1);
        assert_eq!(history.step_back(), 0);
        assert_eq!(history.step_back(), 0);
    }

    #[test]
    fn truncate_discards_the_future() {
        let mut history = History::new(Value::Number(0.0), 10);
        for i in 1..=4 {
            history.push(Value::Number(i as f64), vec![]);
        }
        history.seek(2);
        assert_eq!(history.truncate_after_current(), 2);
        assert_eq!(history.len(), 3);
        assert!(history.is_at_end());
        assert_eq!(history.truncate_after_current(), 0);
    }

    #[test]
    fn reset_keeps_only_initial() {
        let mut history = History::new(Value::Number(0.0), 10);
        history.push(Value::Number(1.0), vec![InputEvent::Click { pos: [0.0, 0.0] }]);
        history.reset(Value::Number(5.0));
        assert_eq!(history.len(), 1);
        assert_eq!(history.idx(), 0);
        assert_eq!(n(&history, 0), 5.0);
        assert!(history.current().events.is_empty());
    }
}
