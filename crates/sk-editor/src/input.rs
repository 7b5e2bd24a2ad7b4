//! Input events and the per-frame event queue.
//!
//! Pointer and keyboard events are normalized into [`InputEvent`] and
//! accumulate in an [`EventQueue`] until the next playing tick drains them
//! into one batch for `update`. The sketch sees each event as a record
//! tagged by `source`:
//!
//! ```text
//! { source: "mousemove", pos: [x, y] }
//! { source: "keydown", key: "a", code: "KeyA", ctrlKey: false, ... }
//! ```

use serde::{Deserialize, Serialize};
use sk_core::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A normalized input event, in canvas coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum InputEvent {
    MouseMove { pos: [f64; 2] },
    MouseDown { pos: [f64; 2] },
    MouseUp { pos: [f64; 2] },
    Click { pos: [f64; 2] },
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyEvent {
    /// Printed value of the key (`"a"`, `"ArrowLeft"`).
    pub key: String,
    /// Physical key (`"KeyA"`).
    pub code: String,
    pub ctrl_key: bool,
    pub shift_key: bool,
    pub alt_key: bool,
    pub meta_key: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            code: code.into(),
            ..Self::default()
        }
    }
}

impl InputEvent {
    /// Pointer position, for pointer events.
    pub fn pos(&self) -> Option<(f64, f64)> {
        match self {
            Self::MouseMove { pos }
            | Self::MouseDown { pos }
            | Self::MouseUp { pos }
            | Self::Click { pos } => Some((pos[0], pos[1])),
            Self::KeyDown(_) | Self::KeyUp(_) => None,
        }
    }

    /// The record handed to the sketch's `update`.
    pub fn to_value(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(json) => Value::from_json(&json),
            Err(err) => {
                log::warn!("dropping unserializable event {self:?}: {err}");
                Value::Null
            }
        }
    }
}

/// One tick's worth of events as a sketch array.
pub fn batch_value(events: &[InputEvent]) -> Value {
    Value::array(events.iter().map(InputEvent::to_value).collect())
}

// ─── Event queue ─────────────────────────────────────────────────────────

/// Shared accumulator between input listeners and the frame tick.
///
/// Clones share the same buffer. A detached queue drops everything pushed
/// into it; detaching also discards what was already queued.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Rc<RefCell<Vec<InputEvent>>>,
    detached: Rc<Cell<bool>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: InputEvent) {
        if self.detached.get() {
            log::trace!("queue detached, dropping {event:?}");
            return;
        }
        self.events.borrow_mut().push(event);
    }

    /// Take every queued event, leaving the queue empty.
    pub fn drain(&self) -> Vec<InputEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn detach(&self) {
        self.detached.set(true);
        self.events.borrow_mut().clear();
    }

    pub fn attach(&self) {
        self.detached.set(false);
    }

    pub fn is_attached(&self) -> bool {
        !self.detached.get()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn events_are_tagged_by_source() {
        let json = serde_json::to_value(InputEvent::MouseMove { pos: [3.0, 4.0] }).unwrap();
        assert_eq!(json, serde_json::json!({ "source": "mousemove", "pos": [3.0, 4.0] }));

        let key = InputEvent::KeyDown(KeyEvent {
            shift_key: true,
            ..KeyEvent::new("A", "KeyA")
        });
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["source"], "keydown");
        assert_eq!(json["shiftKey"], true);
        assert_eq!(json["code"], "KeyA");
    }

    #[test]
    fn parses_host_events() {
        let event: InputEvent =
            serde_json::from_str(r#"{ "source": "keyup", "key": "Escape" }"#).unwrap();
        assert_eq!(event, InputEvent::KeyUp(KeyEvent::new("Escape", "")));
        let event: InputEvent =
            serde_json::from_str(r#"{ "source": "click", "pos": [1, 2] }"#).unwrap();
        assert_eq!(event.pos(), Some((1.0, 2.0)));
    }

    #[test]
    fn sketch_sees_records() {
        let value = InputEvent::MouseDown { pos: [5.0, 6.0] }.to_value();
        assert_eq!(value.get("source").unwrap().as_str(), Some("mousedown"));
        assert_eq!(value.get("pos").unwrap().as_point(), Some((5.0, 6.0)));
        let batch = batch_value(&[InputEvent::Click { pos: [0.0, 0.0] }]);
        assert_eq!(batch.as_array().map(|items| items.len()), Some(1));
    }

    #[test]
    fn queue_is_shared_and_drained_once() {
        let queue = EventQueue::new();
        let listener = queue.clone();
        listener.push(InputEvent::MouseMove { pos: [1.0, 1.0] });
        listener.push(InputEvent::MouseUp { pos: [1.0, 1.0] });
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn detached_queue_drops_events() {
        let queue = EventQueue::new();
        queue.push(InputEvent::Click { pos: [0.0, 0.0] });
        queue.detach();
        assert!(queue.is_empty());
        queue.push(InputEvent::Click { pos: [0.0, 0.0] });
        assert!(queue.is_empty());
        queue.attach();
        queue.push(InputEvent::Click { pos: [0.0, 0.0] });
        assert_eq!(queue.len(), 1);
    }
}
