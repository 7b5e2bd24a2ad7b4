//! Draw command → surface paint operations.
//!
//! One painter per built-in command. Painters read their arguments through
//! [`DrawCommand`] accessors and fail with a [`PaintError`] on malformed
//! input so the caller can skip that command alone.

use crate::color::Rgba;
use crate::surface::Surface;
use kurbo::{BezPath, Ellipse, Line, Rect, Shape};
use sk_core::{DrawCommand, Value};
use thiserror::Error;

pub const DEFAULT_LINE_WIDTH: f64 = 1.0;

/// Dimensions of the sketch canvas, handed to every painter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Canvas {
    pub fn of(surface: &Surface) -> Self {
        Self {
            width: surface.width() as f64,
            height: surface.height() as f64,
        }
    }
}

/// Where paint colours come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ink {
    /// The command's own `fill` / `stroke`.
    Styled,
    /// One flat colour for the whole pickable area of the shape.
    Flat(Rgba),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaintError {
    #[error("`{0}` must be an [x, y] pair of numbers")]
    BadPoint(&'static str),

    #[error("`{0}` must be a list of [x, y] pairs")]
    BadPoints(&'static str),

    #[error("`{key}` is not a colour: {value}")]
    BadColor { key: &'static str, value: String },
}

struct Style {
    fill: Option<Rgba>,
    stroke: Option<Rgba>,
    line_width: f64,
}

impl Style {
    /// `area` shapes (rects, ellipses) are pickable over their interior,
    /// outline shapes (lines, paths) along their stroke.
    fn resolve(cmd: &DrawCommand, ink: Ink, area: bool) -> Result<Self, PaintError> {
        let fill = color_arg(cmd, "fill")?;
        let stroke = color_arg(cmd, "stroke")?;
        let line_width = cmd
            .number("lineWidth")
            .filter(|w| *w > 0.0)
            .unwrap_or(DEFAULT_LINE_WIDTH);
        Ok(match ink {
            Ink::Styled => Self {
                fill,
                stroke,
                line_width,
            },
            Ink::Flat(color) => Self {
                fill: (area || fill.is_some()).then_some(color),
                stroke: (!area || stroke.is_some()).then_some(color),
                line_width,
            },
        })
    }

    fn paint<S: Shape>(&self, surface: &mut Surface, shape: &S) {
        if let Some(fill) = self.fill {
            surface.fill(shape, fill);
        }
        if let Some(stroke) = self.stroke {
            surface.stroke(shape, self.line_width, stroke);
        }
    }
}

// ─── Argument access ─────────────────────────────────────────────────────

fn is_absent(value: &Option<Value>) -> bool {
    matches!(value, None | Some(Value::Undefined | Value::Null))
}

fn color_arg(cmd: &DrawCommand, key: &'static str) -> Result<Option<Rgba>, PaintError> {
    let value = cmd.arg(key);
    if is_absent(&value) {
        return Ok(None);
    }
    let value = value.unwrap_or_default();
    match value.as_str().and_then(Rgba::parse) {
        Some(color) => Ok(Some(color)),
        None => Err(PaintError::BadColor {
            key,
            value: value.to_string(),
        }),
    }
}

fn point(cmd: &DrawCommand, key: &'static str) -> Result<(f64, f64), PaintError> {
    cmd.point(key).ok_or(PaintError::BadPoint(key))
}

/// Like [`point`], but a missing argument reads as the origin.
fn point_or_origin(cmd: &DrawCommand, key: &'static str) -> Result<(f64, f64), PaintError> {
    if is_absent(&cmd.arg(key)) {
        return Ok((0.0, 0.0));
    }
    point(cmd, key)
}

fn points(cmd: &DrawCommand, key: &'static str) -> Result<Vec<(f64, f64)>, PaintError> {
    let items = cmd
        .arg(key)
        .and_then(|v| v.as_array())
        .filter(|items| !items.is_empty())
        .ok_or(PaintError::BadPoints(key))?;
    items
        .iter()
        .map(|p| p.as_point().ok_or(PaintError::BadPoints(key)))
        .collect()
}

// ─── Painters ────────────────────────────────────────────────────────────

/// `background { fill }`: the whole canvas.
pub fn paint_background(
    surface: &mut Surface,
    cmd: &DrawCommand,
    ink: Ink,
    canvas: Canvas,
) -> Result<(), PaintError> {
    let fill = match ink {
        Ink::Flat(color) => {
            color_arg(cmd, "fill")?;
            Some(color)
        }
        Ink::Styled => color_arg(cmd, "fill")?,
    };
    if let Some(fill) = fill {
        surface.fill(&Rect::new(0.0, 0.0, canvas.width, canvas.height), fill);
    }
    Ok(())
}

/// `rect { pos, size, fill, stroke }`: `pos` is the top-left corner.
pub fn paint_rect(
    surface: &mut Surface,
    cmd: &DrawCommand,
    ink: Ink,
    _canvas: Canvas,
) -> Result<(), PaintError> {
    let style = Style::resolve(cmd, ink, true)?;
    let (x, y) = point_or_origin(cmd, "pos")?;
    let (w, h) = point_or_origin(cmd, "size")?;
    style.paint(surface, &Rect::new(x, y, x + w, y + h).abs());
    Ok(())
}

/// `ellipse { pos, size, fill, stroke }`: `pos` is the centre, `size` the
/// two radii.
pub fn paint_ellipse(
    surface: &mut Surface,
    cmd: &DrawCommand,
    ink: Ink,
    _canvas: Canvas,
) -> Result<(), PaintError> {
    let style = Style::resolve(cmd, ink, true)?;
    let center = point_or_origin(cmd, "pos")?;
    let (rx, ry) = point_or_origin(cmd, "size")?;
    style.paint(surface, &Ellipse::new(center, (rx.abs(), ry.abs()), 0.0));
    Ok(())
}

/// `line { a, b, stroke }`: invisible without a stroke.
pub fn paint_line(
    surface: &mut Surface,
    cmd: &DrawCommand,
    ink: Ink,
    _canvas: Canvas,
) -> Result<(), PaintError> {
    let style = Style::resolve(cmd, ink, false)?;
    let line = Line::new(point(cmd, "a")?, point(cmd, "b")?);
    if let Some(stroke) = style.stroke {
        surface.stroke(&line, style.line_width, stroke);
    }
    Ok(())
}

/// `path { points, stroke, fill }`: an open polyline through `points`.
pub fn paint_path(
    surface: &mut Surface,
    cmd: &DrawCommand,
    ink: Ink,
    _canvas: Canvas,
) -> Result<(), PaintError> {
    let style = Style::resolve(cmd, ink, false)?;
    let points = points(cmd, "points")?;
    let mut path = BezPath::new();
    path.move_to(points[0]);
    for p in &points[1..] {
        path.line_to(*p);
    }
    if let Some(fill) = style.fill {
        let mut closed = path.clone();
        closed.close_path();
        surface.fill(&closed, fill);
    }
    if let Some(stroke) = style.stroke {
        surface.stroke(&path, style.line_width, stroke);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CANVAS: Canvas = Canvas {
        width: 20.0,
        height: 20.0,
    };

    fn cmd(name: &str, args: Vec<(&str, Value)>) -> DrawCommand {
        DrawCommand {
            name: name.to_string(),
            args: Value::record(args),
        }
    }

    #[test]
    fn rect_uses_fill_and_top_left_pos() {
        let mut s = Surface::new(20, 20);
        let rect = cmd(
            "rect",
            vec![
                ("pos", Value::numbers(&[5.0, 5.0])),
                ("size", Value::numbers(&[4.0, 4.0])),
                ("fill", Value::str("#f00")),
            ],
        );
        paint_rect(&mut s, &rect, Ink::Styled, CANVAS).unwrap();
        assert_eq!(s.pixel(5, 5), Some(Rgba::rgb(255, 0, 0)));
        assert_eq!(s.pixel(8, 8), Some(Rgba::rgb(255, 0, 0)));
        assert_eq!(s.pixel(9, 9), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn ellipse_is_centred_on_pos() {
        let mut s = Surface::new(20, 20);
        let ellipse = cmd(
            "ellipse",
            vec![
                ("pos", Value::numbers(&[10.0, 10.0])),
                ("size", Value::numbers(&[3.0, 3.0])),
                ("fill", Value::str("black")),
            ],
        );
        paint_ellipse(&mut s, &ellipse, Ink::Styled, CANVAS).unwrap();
        assert_eq!(s.pixel(9, 9), Some(Rgba::BLACK));
        assert_eq!(s.pixel(13, 13), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn unfilled_rect_is_still_pickable() {
        let mut s = Surface::new(20, 20);
        let rect = cmd(
            "rect",
            vec![
                ("pos", Value::numbers(&[0.0, 0.0])),
                ("size", Value::numbers(&[4.0, 4.0])),
            ],
        );
        paint_rect(&mut s, &rect, Ink::Styled, CANVAS).unwrap();
        assert_eq!(s.pixel(1, 1), Some(Rgba::TRANSPARENT));
        let id = Rgba::from_index(3).unwrap();
        paint_rect(&mut s, &rect, Ink::Flat(id), CANVAS).unwrap();
        assert_eq!(s.pixel(1, 1), Some(id));
    }

    #[test]
    fn line_needs_a_stroke() {
        let mut s = Surface::new(20, 20);
        let mut args = vec![
            ("a", Value::numbers(&[0.0, 10.0])),
            ("b", Value::numbers(&[20.0, 10.0])),
        ];
        paint_line(&mut s, &cmd("line", args.clone()), Ink::Styled, CANVAS).unwrap();
        assert_eq!(s.pixel(5, 10), Some(Rgba::TRANSPARENT));
        args.push(("stroke", Value::str("#00f")));
        paint_line(&mut s, &cmd("line", args), Ink::Styled, CANVAS).unwrap();
        assert_eq!(s.pixel(5, 10), Some(Rgba::rgb(0, 0, 255)));
    }

    #[test]
    fn path_fills_its_polygon() {
        let mut s = Surface::new(20, 20);
        let path = cmd(
            "path",
            vec![
                ("points", Value::array(vec![
                    Value::numbers(&[0.0, 0.0]),
                    Value::numbers(&[10.0, 0.0]),
                    Value::numbers(&[10.0, 10.0]),
                    Value::numbers(&[0.0, 10.0]),
                ])),
                ("fill", Value::str("rgb(0, 255, 0)")),
            ],
        );
        paint_path(&mut s, &path, Ink::Styled, CANVAS).unwrap();
        assert_eq!(s.pixel(5, 5), Some(Rgba::rgb(0, 255, 0)));
        assert_eq!(s.pixel(15, 15), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn malformed_arguments_are_errors() {
        let mut s = Surface::new(20, 20);
        let bad_pos = cmd("rect", vec![("pos", Value::str("here"))]);
        assert_eq!(
            paint_rect(&mut s, &bad_pos, Ink::Styled, CANVAS),
            Err(PaintError::BadPoint("pos"))
        );
        let bad_fill = cmd("background", vec![("fill", Value::Number(3.0))]);
        assert!(matches!(
            paint_background(&mut s, &bad_fill, Ink::Styled, CANVAS),
            Err(PaintError::BadColor { key: "fill", .. })
        ));
        let no_points = cmd("path", vec![("points", Value::array(vec![]))]);
        assert_eq!(
            paint_path(&mut s, &no_points, Ink::Styled, CANVAS),
            Err(PaintError::BadPoints("points"))
        );
        let line = cmd("line", vec![("a", Value::numbers(&[0.0, 0.0]))]);
        assert_eq!(
            paint_line(&mut s, &line, Ink::Styled, CANVAS),
            Err(PaintError::BadPoint("b"))
        );
    }
}
