//! Canvas interactions while paused: dragging shapes and picking numbers.
//!
//! A pointer-down on a shape grabs it. The grab remembers the offset
//! between the pointer and the shape's anchor so the shape does not jump;
//! every move then asks the optimizer for constants that put
//! `anchor + delta` under the pointer. Pointer-up releases.

use crate::input::InputEvent;
use crate::optimize::DragTarget;
use kurbo::Point;
use sk_render::{Inspector, Registry};

// ─── Drag tool ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct DragTool {
    active: Option<DragTarget>,
}

impl DragTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a pointer event. Returns the drag to solve for, if this event
    /// started or moved one.
    pub fn handle(
        &mut self,
        event: &InputEvent,
        inspector: &Inspector,
        registry: &Registry,
    ) -> Option<DragTarget> {
        match event {
            InputEvent::MouseDown { pos } => self.pointer_down(inspector, registry, pos[0], pos[1]),
            InputEvent::MouseMove { pos } => self.pointer_move(pos[0], pos[1]),
            InputEvent::MouseUp { .. } => {
                self.pointer_up();
                None
            }
            InputEvent::Click { .. } | InputEvent::KeyDown(_) | InputEvent::KeyUp(_) => None,
        }
    }

    /// Grab the topmost shape under the pointer. Shapes without an anchor
    /// (the background) cannot be dragged.
    pub fn pointer_down(
        &mut self,
        inspector: &Inspector,
        registry: &Registry,
        x: f64,
        y: f64,
    ) -> Option<DragTarget> {
        let pointer = Point::new(x.floor(), y.floor());
        let id = inspector.on_hover(pointer.x, pointer.y)?;
        let cmd = inspector.meta_for_id(id)?;
        let Some(anchor) = registry.anchor(cmd) else {
            log::trace!("`{}` #{id} has no anchor, not dragging", cmd.name);
            return None;
        };
        let grab = DragTarget {
            id,
            delta: pointer - anchor,
            target: pointer,
        };
        self.active = Some(grab);
        Some(grab)
    }

    /// Re-target the active drag.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Option<DragTarget> {
        let drag = self.active.as_mut()?;
        drag.target = Point::new(x.floor(), y.floor());
        Some(*drag)
    }

    pub fn pointer_up(&mut self) -> Option<DragTarget> {
        self.active.take()
    }

    pub fn active(&self) -> Option<&DragTarget> {
        self.active.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }
}

// ─── Number picker ───────────────────────────────────────────────────────

pub fn clamp(v: f64, min: f64, max: f64) -> f64 {
    min.max(v.min(max))
}

/// Map `val` linearly from `[in_min, in_max]` to `[out_min, out_max]`.
pub fn scale(val: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    (out_max - out_min) * ((val - in_min) / (in_max - in_min)) + out_min
}

/// Slider over a number literal: `0` to the next power of ten above the
/// value's magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberPicker {
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl NumberPicker {
    pub fn for_value(value: f64) -> Self {
        let max = if value == 0.0 || !value.is_finite() {
            1.0
        } else {
            10f64.powi(value.abs().log10().round() as i32 + 1)
        };
        Self {
            value,
            min: 0.0,
            max,
        }
    }

    /// Slider position of the current value, in `[0, 1]`.
    pub fn position(&self) -> f64 {
        clamp(scale(self.value, self.min, self.max, 0.0, 1.0), 0.0, 1.0)
    }

    /// Move the slider; returns the new value.
    pub fn slide(&mut self, position: f64) -> f64 {
        self.value = scale(clamp(position, 0.0, 1.0), 0.0, 1.0, self.min, self.max);
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Vec2;
    use pretty_assertions::assert_eq;
    use sk_core::{DrawCommand, Value};

    fn inspector() -> (Inspector, Registry) {
        let registry = Registry::builtin();
        let commands = vec![
            DrawCommand {
                name: "background".into(),
                args: Value::record([("fill", Value::str("#fff"))]),
            },
            DrawCommand {
                name: "rect".into(),
                args: Value::record([
                    ("pos", Value::numbers(&[50.0, 50.0])),
                    ("size", Value::numbers(&[20.0, 20.0])),
                ]),
            },
        ];
        (Inspector::build(&registry, (100, 100), commands), registry)
    }

    #[test]
    fn grab_move_release() {
        let (inspector, registry) = inspector();
        let mut tool = DragTool::new();
        let grab = tool
            .handle(&InputEvent::MouseDown { pos: [60.7, 55.2] }, &inspector, &registry)
            .unwrap();
        assert_eq!(grab.id, 1);
        assert_eq!(grab.delta, Vec2::new(10.0, 5.0));
        assert_eq!(grab.target, Point::new(60.0, 55.0));

        let moved = tool
            .handle(&InputEvent::MouseMove { pos: [80.0, 90.0] }, &inspector, &registry)
            .unwrap();
        assert_eq!(moved.target, Point::new(80.0, 90.0));
        assert_eq!(moved.delta, grab.delta);

        assert!(tool.handle(&InputEvent::MouseUp { pos: [0.0, 0.0] }, &inspector, &registry).is_none());
        assert!(!tool.is_dragging());
        assert!(tool.pointer_move(1.0, 1.0).is_none());
    }

    #[test]
    fn background_and_empty_space_are_not_draggable() {
        let (inspector, registry) = inspector();
        let mut tool = DragTool::new();
        assert!(tool.pointer_down(&inspector, &registry, 5.0, 5.0).is_none());
        assert!(tool.pointer_down(&inspector, &registry, 500.0, 5.0).is_none());
        assert!(!tool.is_dragging());
    }

    #[test]
    fn helpers() {
        assert_eq!(clamp(5.0, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-5.0, 0.0, 1.0), 0.0);
        assert_eq!(scale(5.0, 0.0, 10.0, 100.0, 200.0), 150.0);
    }

    #[test]
    fn number_picker_range() {
        let mut picker = NumberPicker::for_value(30.0);
        assert_eq!(picker.max, 100.0);
        assert_eq!(picker.position(), 0.3);
        assert_eq!(picker.slide(0.5), 50.0);
        assert_eq!(picker.slide(2.0), 100.0);
        assert_eq!(NumberPicker::for_value(0.0).max, 1.0);
        assert_eq!(NumberPicker::for_value(-4.0).max, 100.0);
        assert_eq!(NumberPicker::for_value(2.5).max, 10.0);
    }
}
