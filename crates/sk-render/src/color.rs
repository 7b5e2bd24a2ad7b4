//! Colours: CSS-style strings from command arguments, and the id colours
//! the inspector paints with.

use std::fmt;

/// 8-bit straight-alpha RGBA.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Largest index an id colour can carry (`#FFFFFF`).
pub const MAX_INDEX: usize = 0xFF_FFFF;

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Rgba {
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()`,
    /// `hsl()`, `hsla()` or a basic colour name.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Some(hex) = input.strip_prefix('#') {
            return Self::from_hex(hex);
        }
        let lower = input.to_ascii_lowercase();
        if let Some((func, rest)) = lower.split_once('(') {
            let body = rest.strip_suffix(')')?;
            return Self::from_function(func.trim(), body);
        }
        Self::named(&lower)
    }

    fn from_hex(hex: &str) -> Option<Self> {
        let bytes = hex.as_bytes();
        let short = |i: usize| hex_val(bytes[i]).map(|v| v * 17);
        let long = |i: usize| Some(hex_val(bytes[i])? << 4 | hex_val(bytes[i + 1])?);
        match bytes.len() {
            3 => Some(Self::rgb(short(0)?, short(1)?, short(2)?)),
            4 => Some(Self::rgba(short(0)?, short(1)?, short(2)?, short(3)?)),
            6 => Some(Self::rgb(long(0)?, long(2)?, long(4)?)),
            8 => Some(Self::rgba(long(0)?, long(2)?, long(4)?, long(6)?)),
            _ => None,
        }
    }

    fn from_function(func: &str, body: &str) -> Option<Self> {
        let parts: Vec<&str> = body
            .split([',', ' ', '/'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        let alpha = match parts.get(3) {
            Some(a) => unit(a)?,
            None => 1.0,
        };
        let a = channel(alpha * 255.0);
        match (func, parts.len()) {
            ("rgb" | "rgba", 3 | 4) => {
                let c = |i: usize| -> Option<u8> {
                    let part = parts[i];
                    Some(match part.strip_suffix('%') {
                        Some(p) => channel(p.parse::<f64>().ok()? * 2.55),
                        None => channel(part.parse().ok()?),
                    })
                };
                Some(Self::rgba(c(0)?, c(1)?, c(2)?, a))
            }
            ("hsl" | "hsla", 3 | 4) => {
                let h = parts[0].trim_end_matches("deg").parse::<f64>().ok()?;
                let s = parts[1].strip_suffix('%')?.parse::<f64>().ok()? / 100.0;
                let l = parts[2].strip_suffix('%')?.parse::<f64>().ok()? / 100.0;
                let (r, g, b) = hsl_to_rgb(h, s.clamp(0.0, 1.0), l.clamp(0.0, 1.0));
                Some(Self::rgba(channel(r * 255.0), channel(g * 255.0), channel(b * 255.0), a))
            }
            _ => None,
        }
    }

    fn named(name: &str) -> Option<Self> {
        Some(match name {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::rgb(255, 0, 0),
            "green" => Self::rgb(0, 128, 0),
            "lime" => Self::rgb(0, 255, 0),
            "blue" => Self::rgb(0, 0, 255),
            "yellow" => Self::rgb(255, 255, 0),
            "cyan" | "aqua" => Self::rgb(0, 255, 255),
            "magenta" | "fuchsia" => Self::rgb(255, 0, 255),
            "orange" => Self::rgb(255, 165, 0),
            "purple" => Self::rgb(128, 0, 128),
            "gray" | "grey" => Self::rgb(128, 128, 128),
            "transparent" => Self::TRANSPARENT,
            _ => return None,
        })
    }

    /// Opaque colour whose `#RRGGBB` spells `index` in hex.
    pub fn from_index(index: usize) -> Option<Self> {
        if index > MAX_INDEX {
            return None;
        }
        Some(Self::rgb((index >> 16) as u8, (index >> 8) as u8, index as u8))
    }

    /// Inverse of [`Rgba::from_index`]. Anything not fully opaque is "no
    /// shape".
    pub fn to_index(self) -> Option<usize> {
        (self.a == 255)
            .then(|| (self.r as usize) << 16 | (self.g as usize) << 8 | self.b as usize)
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    /// Source-over composite of `self` onto `dst`.
    pub fn over(self, dst: Rgba) -> Rgba {
        match self.a {
            255 => self,
            0 => dst,
            _ => {
                let sa = self.a as f64 / 255.0;
                let da = dst.a as f64 / 255.0;
                let out_a = sa + da * (1.0 - sa);
                let mix = |s: u8, d: u8| {
                    channel((s as f64 * sa + d as f64 * da * (1.0 - sa)) / out_a)
                };
                Rgba::rgba(
                    mix(self.r, dst.r),
                    mix(self.g, dst.g),
                    mix(self.b, dst.b),
                    channel(out_a * 255.0),
                )
            }
        }
    }
}

impl fmt::Debug for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// `0.5` or `50%` as a fraction.
fn unit(s: &str) -> Option<f64> {
    let v = match s.strip_suffix('%') {
        Some(p) => p.parse::<f64>().ok()? / 100.0,
        None => s.parse::<f64>().ok()?,
    };
    Some(v.clamp(0.0, 1.0))
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (f64, f64, f64) {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    (r + m, g + m, b + m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hex_forms() {
        assert_eq!(Rgba::parse("#fff"), Some(Rgba::WHITE));
        assert_eq!(Rgba::parse("#d2d2d2"), Some(Rgba::rgb(0xd2, 0xd2, 0xd2)));
        assert_eq!(Rgba::parse("#0000ff80"), Some(Rgba::rgba(0, 0, 255, 0x80)));
        assert_eq!(Rgba::parse("#f008"), Some(Rgba::rgba(255, 0, 0, 0x88)));
        assert_eq!(Rgba::parse("#12345"), None);
    }

    #[test]
    fn functional_forms() {
        assert_eq!(Rgba::parse("rgb(10, 20, 30)"), Some(Rgba::rgb(10, 20, 30)));
        assert_eq!(
            Rgba::parse("rgba(255, 0, 0, 0.5)"),
            Some(Rgba::rgba(255, 0, 0, 128))
        );
        assert_eq!(Rgba::parse("hsl(120, 100%, 50%)"), Some(Rgba::rgb(0, 255, 0)));
        assert_eq!(Rgba::parse("hsla(0, 0%, 100%, 1)"), Some(Rgba::WHITE));
        assert_eq!(Rgba::parse("hsl(120, 100, 50)"), None);
    }

    #[test]
    fn names() {
        assert_eq!(Rgba::parse("Red"), Some(Rgba::rgb(255, 0, 0)));
        assert_eq!(Rgba::parse("transparent"), Some(Rgba::TRANSPARENT));
        assert_eq!(Rgba::parse("not-a-colour"), None);
    }

    #[test]
    fn index_colours() {
        let c = Rgba::from_index(0x01_02_0A).unwrap();
        assert_eq!(c.to_hex(), "#01020A");
        assert_eq!(c.to_index(), Some(0x01_02_0A));
        assert_eq!(Rgba::from_index(0).unwrap().to_index(), Some(0));
        assert_eq!(Rgba::TRANSPARENT.to_index(), None);
        assert_eq!(Rgba::from_index(MAX_INDEX + 1), None);
    }

    #[test]
    fn blending() {
        let half_red = Rgba::rgba(255, 0, 0, 128);
        assert_eq!(half_red.over(Rgba::WHITE), Rgba::rgb(255, 127, 127));
        assert_eq!(half_red.over(Rgba::TRANSPARENT), half_red);
        assert_eq!(Rgba::BLACK.over(Rgba::WHITE), Rgba::BLACK);
    }
}
