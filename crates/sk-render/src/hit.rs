//! Hit testing: pixel → draw command lookup.
//!
//! The inspector re-paints a frame off-screen with every inspectable
//! command in a flat colour that spells its index in the draw list. A pick
//! is then a single pixel read; later commands paint over earlier ones, so
//! the topmost shape wins.

use crate::color::Rgba;
use crate::paint::{Canvas, Ink};
use crate::registry::Registry;
use crate::surface::Surface;
use sk_core::{DrawCommand, Meta};

#[derive(Debug, Clone)]
pub struct Inspector {
    surface: Surface,
    commands: Vec<DrawCommand>,
}

impl Inspector {
    /// Paint the id map for one frame of draw output.
    pub fn build(registry: &Registry, size: (u32, u32), commands: Vec<DrawCommand>) -> Self {
        let mut surface = Surface::new(size.0, size.1);
        let canvas = Canvas::of(&surface);
        for (id, cmd) in commands.iter().enumerate() {
            let Some(spec) = registry.get(&cmd.name).filter(|s| s.inspectable) else {
                continue;
            };
            let Some(color) = Rgba::from_index(id) else {
                log::warn!("inspector: more than {} commands, ignoring the rest", id);
                break;
            };
            if let Err(err) = (spec.render)(&mut surface, cmd, Ink::Flat(color), canvas) {
                log::debug!("inspector: skipping `{}` #{id}: {err}", cmd.name);
            }
        }
        Self { surface, commands }
    }

    /// Index of the topmost inspectable command under `(x, y)`.
    pub fn on_hover(&self, x: f64, y: f64) -> Option<usize> {
        if !(x.is_finite() && y.is_finite()) || x < 0.0 || y < 0.0 {
            return None;
        }
        let id = self
            .surface
            .pixel(x.floor() as u32, y.floor() as u32)?
            .to_index()?;
        (id < self.commands.len()).then_some(id)
    }

    /// The command painted as `id`, with its original arguments.
    pub fn meta_for_id(&self, id: usize) -> Option<&DrawCommand> {
        self.commands.get(id)
    }

    /// Source lines of the command under `(x, y)`.
    pub fn meta_at(&self, x: f64, y: f64) -> Option<Meta> {
        self.meta_for_id(self.on_hover(x, y)?)?.meta()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sk_core::Value;

    fn rect(pos: [f64; 2], size: [f64; 2], fill: &str) -> DrawCommand {
        DrawCommand {
            name: "rect".into(),
            args: Value::record([
                ("pos", Value::numbers(&pos)),
                ("size", Value::numbers(&size)),
                ("fill", Value::str(fill)),
            ]),
        }
    }

    #[test]
    fn picks_single_rect() {
        let cmd = rect([50.0, 50.0], [20.0, 20.0], "#123456");
        let inspector = Inspector::build(&Registry::builtin(), (100, 100), vec![cmd]);
        assert_eq!(inspector.on_hover(60.0, 60.0), Some(0));
        assert_eq!(inspector.on_hover(10.0, 10.0), None);
        assert_eq!(inspector.on_hover(-1.0, 60.0), None);
        assert_eq!(inspector.on_hover(500.0, 60.0), None);
        let picked = inspector.meta_for_id(0).unwrap();
        assert_eq!(picked.arg("fill").unwrap().as_str(), Some("#123456"));
    }

    #[test]
    fn topmost_wins_and_background_is_pickable() {
        let background = DrawCommand {
            name: "background".into(),
            args: Value::record([("fill", Value::str("#fff"))]),
        };
        let commands = vec![
            background,
            rect([0.0, 0.0], [50.0, 50.0], "#f00"),
            rect([25.0, 25.0], [50.0, 50.0], "#0f0"),
        ];
        let inspector = Inspector::build(&Registry::builtin(), (100, 100), commands);
        assert_eq!(inspector.on_hover(90.0, 90.0), Some(0));
        assert_eq!(inspector.on_hover(10.0, 10.0), Some(1));
        assert_eq!(inspector.on_hover(30.0, 30.0), Some(2));
    }

    #[test]
    fn unknown_and_malformed_commands_are_not_pickable() {
        let commands = vec![
            DrawCommand {
                name: "blob".into(),
                args: Value::object([]),
            },
            DrawCommand {
                name: "rect".into(),
                args: Value::record([("pos", Value::str("nowhere"))]),
            },
            rect([0.0, 0.0], [10.0, 10.0], "#000"),
        ];
        let inspector = Inspector::build(&Registry::builtin(), (20, 20), commands);
        assert_eq!(inspector.on_hover(5.0, 5.0), Some(2));
        assert_eq!(inspector.on_hover(15.0, 15.0), None);
    }

    #[test]
    fn meta_lines_under_pointer() {
        let mut cmd = rect([0.0, 0.0], [10.0, 10.0], "#000");
        cmd.args.set(
            sk_core::Name::intern("__meta"),
            Value::record([
                ("lineStart", Value::Number(3.0)),
                ("lineEnd", Value::Number(5.0)),
            ]),
        );
        let inspector = Inspector::build(&Registry::builtin(), (20, 20), vec![cmd]);
        assert_eq!(
            inspector.meta_at(2.0, 2.0),
            Some(Meta {
                line_start: 3,
                line_end: 5
            })
        );
        assert_eq!(inspector.meta_at(15.0, 15.0), None);
    }
}
