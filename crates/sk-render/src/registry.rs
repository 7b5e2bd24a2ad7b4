//! Command registry: name → renderer, pickability, drag anchor.

use crate::paint::{self, Canvas, Ink, PaintError};
use crate::surface::Surface;
use kurbo::Point;
use sk_core::{CommandVocabulary, DrawCommand};
use std::collections::HashMap;

pub type Renderer = fn(&mut Surface, &DrawCommand, Ink, Canvas) -> Result<(), PaintError>;

/// The point of a command that follows the pointer while it is dragged.
pub type Anchor = fn(&DrawCommand) -> Option<Point>;

#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub render: Renderer,
    /// Painted into the inspector's id map.
    pub inspectable: bool,
    pub anchor: Anchor,
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("inspectable", &self.inspectable)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    commands: HashMap<String, CommandSpec>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// `background`, `line`, `path`, `ellipse` and `rect`.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("background", CommandSpec {
            render: paint::paint_background,
            inspectable: true,
            anchor: |_| None,
        });
        registry.register("line", CommandSpec {
            render: paint::paint_line,
            inspectable: true,
            anchor: |cmd| cmd.point("a").map(Point::from),
        });
        registry.register("path", CommandSpec {
            render: paint::paint_path,
            inspectable: true,
            anchor: |cmd| {
                let points = cmd.arg("points")?.as_array()?;
                points.first()?.as_point().map(Point::from)
            },
        });
        registry.register("ellipse", CommandSpec {
            render: paint::paint_ellipse,
            inspectable: true,
            anchor: |cmd| cmd.point("pos").map(Point::from),
        });
        registry.register("rect", CommandSpec {
            render: paint::paint_rect,
            inspectable: true,
            anchor: |cmd| cmd.point("pos").map(Point::from),
        });
        registry
    }

    /// Add or replace a command.
    pub fn register(&mut self, name: impl Into<String>, spec: CommandSpec) {
        self.commands.insert(name.into(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn anchor(&self, cmd: &DrawCommand) -> Option<Point> {
        (self.get(&cmd.name)?.anchor)(cmd)
    }

    /// Paint `commands` in order. Unknown commands and commands with
    /// malformed arguments are skipped; returns how many were painted.
    pub fn render(&self, surface: &mut Surface, commands: &[DrawCommand]) -> usize {
        let canvas = Canvas::of(surface);
        let mut painted = 0;
        for cmd in commands {
            let Some(spec) = self.get(&cmd.name) else {
                log::trace!("skipping unknown command `{}`", cmd.name);
                continue;
            };
            match (spec.render)(surface, cmd, Ink::Styled, canvas) {
                Ok(()) => painted += 1,
                Err(err) => log::debug!("skipping `{}`: {err}", cmd.name),
            }
        }
        painted
    }
}

impl CommandVocabulary for Registry {
    fn is_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;
    use pretty_assertions::assert_eq;
    use sk_core::Value;

    fn cmd(name: &str, args: Vec<(&str, Value)>) -> DrawCommand {
        DrawCommand {
            name: name.to_string(),
            args: Value::record(args),
        }
    }

    #[test]
    fn unknown_commands_are_skipped() {
        let registry = Registry::builtin();
        let mut surface = Surface::new(8, 8);
        let painted = registry.render(
            &mut surface,
            &[
                cmd("doesNotExist", vec![]),
                cmd("background", vec![("fill", Value::str("#fff"))]),
            ],
        );
        assert_eq!(painted, 1);
        assert_eq!(surface.pixel(7, 7), Some(Rgba::WHITE));
    }

    #[test]
    fn malformed_command_does_not_stop_the_rest() {
        let registry = Registry::builtin();
        let mut surface = Surface::new(8, 8);
        let painted = registry.render(
            &mut surface,
            &[
                cmd("rect", vec![("pos", Value::Number(1.0)), ("fill", Value::str("#000"))]),
                cmd("rect", vec![
                    ("size", Value::numbers(&[2.0, 2.0])),
                    ("fill", Value::str("#000")),
                ]),
            ],
        );
        assert_eq!(painted, 1);
        assert_eq!(surface.pixel(1, 1), Some(Rgba::BLACK));
    }

    #[test]
    fn anchors() {
        let registry = Registry::builtin();
        let rect = cmd("rect", vec![("pos", Value::numbers(&[3.0, 4.0]))]);
        assert_eq!(registry.anchor(&rect), Some(Point::new(3.0, 4.0)));
        let path = cmd(
            "path",
            vec![("points", Value::array(vec![Value::numbers(&[1.0, 2.0])]))],
        );
        assert_eq!(registry.anchor(&path), Some(Point::new(1.0, 2.0)));
        assert_eq!(registry.anchor(&cmd("background", vec![])), None);
        assert_eq!(registry.anchor(&cmd("blob", vec![])), None);
    }

    #[test]
    fn vocabulary_follows_registrations() {
        let mut registry = Registry::builtin();
        assert!(registry.is_command("path"));
        assert!(!registry.is_command("star"));
        registry.register("star", CommandSpec {
            render: paint::paint_ellipse,
            inspectable: false,
            anchor: |_| None,
        });
        assert!(registry.is_command("star"));
        assert_eq!(registry.names().count(), 6);
    }
}
