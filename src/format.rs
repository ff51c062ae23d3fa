// Run formatting derived from inline styles and emphasis tags.

use crate::error::{ConvertError, Result};
use crate::style::StyleMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parses `#RRGGBB` (the `#` is optional).
    pub fn parse_hex(value: &str) -> Result<Self> {
        let v = value.trim();
        let hex = v.strip_prefix('#').unwrap_or(v);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ConvertError::InvalidColorFormat(value.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| ConvertError::InvalidColorFormat(value.to_string()))
        };
        Ok(Self(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Formatting flags contributed by `b`/`strong`, `i`/`em` and `u` ancestors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Emphasis {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Emphasis {
    pub fn union(self, other: Emphasis) -> Emphasis {
        Emphasis {
            bold: self.bold || other.bold,
            italic: self.italic || other.italic,
            underline: self.underline || other.underline,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    /// Points.
    pub size: Option<f32>,
    pub color: Option<Rgb>,
}

impl RunFormat {
    pub fn is_plain(&self) -> bool {
        *self == RunFormat::default()
    }
}

/// Derives run formatting from a style map. Unknown properties are ignored;
/// malformed `font-size` and `color` values fail the conversion.
pub fn format_run(style: &StyleMap, emphasis: Emphasis) -> Result<RunFormat> {
    let mut fmt = RunFormat {
        bold: emphasis.bold,
        italic: emphasis.italic,
        underline: emphasis.underline,
        ..RunFormat::default()
    };
    if let Some(size) = style.get("font-size") {
        fmt.size = Some(parse_point_size(size)?);
    }
    if style
        .get("font-weight")
        .is_some_and(|v| v.eq_ignore_ascii_case("bold"))
    {
        fmt.bold = true;
    }
    if style
        .get("font-style")
        .is_some_and(|v| v.eq_ignore_ascii_case("italic"))
    {
        fmt.italic = true;
    }
    if let Some(color) = style.get("color") {
        fmt.color = Some(Rgb::parse_hex(color)?);
    }
    Ok(fmt)
}

fn parse_point_size(value: &str) -> Result<f32> {
    let v = value.trim();
    let split = v.len().saturating_sub(2);
    let number = match v.get(split..) {
        Some(suffix) if suffix.eq_ignore_ascii_case("pt") => &v[..split],
        _ => v,
    };
    match number.trim().parse::<f32>() {
        Ok(n) if n.is_finite() && n > 0.0 => Ok(n),
        _ => Err(ConvertError::InvalidFontSize(value.to_string())),
    }
}
