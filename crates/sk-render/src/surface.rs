//! CPU raster target.
//!
//! Pixels are sampled at their centres against `kurbo` shapes: a pixel is
//! covered by a fill when the shape contains its centre, and by a stroke
//! when its centre is within half the line width of the outline. No
//! anti-aliasing, so every covered pixel gets exactly the paint colour
//! (which the inspector relies on).

use crate::color::Rgba;
use kurbo::{ParamCurveNearest, Point, Rect, Shape};
use std::ops::Range;

/// Flattening tolerance for curved outlines.
const TOLERANCE: f64 = 0.1;

#[derive(Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Surface({}x{})", self.width, self.height)
    }
}

impl Surface {
    /// A fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba::TRANSPARENT; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f64, self.height as f64)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    pub fn clear(&mut self) {
        self.pixels.fill(Rgba::TRANSPARENT);
    }

    /// Paint every pixel.
    pub fn fill_all(&mut self, color: Rgba) {
        for px in &mut self.pixels {
            *px = color.over(*px);
        }
    }

    pub fn fill<S: Shape>(&mut self, shape: &S, color: Rgba) {
        let (xs, ys) = self.pixel_range(shape.bounding_box());
        for y in ys {
            for x in xs.clone() {
                if shape.contains(center(x, y)) {
                    self.blend(x, y, color);
                }
            }
        }
    }

    pub fn stroke<S: Shape>(&mut self, shape: &S, width: f64, color: Rgba) {
        let half = (width / 2.0).max(0.5);
        let segments: Vec<_> = shape.path_segments(TOLERANCE).collect();
        if segments.is_empty() {
            return;
        }
        let limit = half * half;
        let (xs, ys) = self.pixel_range(shape.bounding_box().inflate(half, half));
        for y in ys {
            for x in xs.clone() {
                let p = center(x, y);
                if segments
                    .iter()
                    .any(|seg| seg.nearest(p, 1e-6).distance_sq <= limit)
                {
                    self.blend(x, y, color);
                }
            }
        }
    }

    /// Row-major RGBA bytes, for image encoders.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|px| [px.r, px.g, px.b, px.a])
            .collect()
    }

    fn blend(&mut self, x: u32, y: u32, color: Rgba) {
        let i = y as usize * self.width as usize + x as usize;
        if let Some(px) = self.pixels.get_mut(i) {
            *px = color.over(*px);
        }
    }

    /// Pixel indices whose centres may fall inside `rect`, clipped to the
    /// surface.
    fn pixel_range(&self, rect: Rect) -> (Range<u32>, Range<u32>) {
        let clip = |lo: f64, hi: f64, max: u32| -> Range<u32> {
            if !(lo.is_finite() && hi.is_finite()) {
                return 0..0;
            }
            let start = (lo - 0.5).ceil().clamp(0.0, max as f64) as u32;
            let end = ((hi - 0.5).floor() + 1.0).clamp(0.0, max as f64) as u32;
            start..end.max(start)
        };
        let rect = rect.abs();
        (
            clip(rect.x0, rect.x1, self.width),
            clip(rect.y0, rect.y1, self.height),
        )
    }
}

fn center(x: u32, y: u32) -> Point {
    Point::new(x as f64 + 0.5, y as f64 + 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Ellipse, Line};
    use pretty_assertions::assert_eq;

    const RED: Rgba = Rgba::rgb(255, 0, 0);

    fn covered(surface: &Surface) -> usize {
        surface
            .to_rgba8()
            .chunks(4)
            .filter(|px| px[3] != 0)
            .count()
    }

    #[test]
    fn rect_fill_covers_exact_pixels() {
        let mut s = Surface::new(10, 10);
        s.fill(&Rect::new(2.0, 3.0, 5.0, 5.0), RED);
        assert_eq!(covered(&s), 3 * 2);
        assert_eq!(s.pixel(2, 3), Some(RED));
        assert_eq!(s.pixel(5, 3), Some(Rgba::TRANSPARENT));
        assert_eq!(s.pixel(10, 0), None);
    }

    #[test]
    fn shapes_are_clipped() {
        let mut s = Surface::new(4, 4);
        s.fill(&Rect::new(-10.0, -10.0, 100.0, 2.0), RED);
        assert_eq!(covered(&s), 4 * 2);
    }

    #[test]
    fn ellipse_fill_contains_center() {
        let mut s = Surface::new(20, 20);
        s.fill(&Ellipse::new((10.0, 10.0), (5.0, 3.0), 0.0), RED);
        assert_eq!(s.pixel(10, 10), Some(RED));
        assert_eq!(s.pixel(10, 14), Some(Rgba::TRANSPARENT));
        assert_eq!(s.pixel(14, 10), Some(RED));
    }

    #[test]
    fn stroke_follows_outline() {
        let mut s = Surface::new(10, 10);
        s.stroke(&Line::new((0.0, 5.0), (10.0, 5.0)), 2.0, RED);
        assert_eq!(s.pixel(3, 4), Some(RED));
        assert_eq!(s.pixel(3, 5), Some(RED));
        assert_eq!(s.pixel(3, 7), Some(Rgba::TRANSPARENT));
        assert_eq!(covered(&s), 20);
    }

    #[test]
    fn fill_all_blends() {
        let mut s = Surface::new(2, 2);
        s.fill_all(Rgba::WHITE);
        s.fill_all(Rgba::rgba(0, 0, 0, 0));
        assert_eq!(s.pixel(1, 1), Some(Rgba::WHITE));
        s.clear();
        assert_eq!(covered(&s), 0);
    }
}
