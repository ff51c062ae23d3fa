// Inline CSS `style` attribute parsing.

use std::collections::BTreeMap;

/// Property name (lower-cased) to trimmed value, for one element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleMap(BTreeMap<String, String>);

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.0.get(property).map(String::as_str)
    }

    pub fn insert(&mut self, property: &str, value: &str) {
        self.0.insert(property.to_ascii_lowercase(), value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// A copy of `self` with every declaration of `own` applied on top.
    pub fn overlay(&self, own: &StyleMap) -> StyleMap {
        let mut out = self.clone();
        for (k, v) in &own.0 {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }
}

/// Parses a declaration list such as `"color: #FF0000; font-weight:bold"`.
///
/// Segments without a colon or with an empty property name are skipped and a
/// repeated property keeps its last value.
pub fn parse_style(input: Option<&str>) -> StyleMap {
    let mut map = StyleMap::new();
    let Some(input) = input else { return map };
    for segment in input.split(';') {
        let Some((key, value)) = segment.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        map.insert(key, value.trim());
    }
    map
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    /// Reads a `text-align` value; anything unrecognized is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim();
        if v.eq_ignore_ascii_case("left") {
            Some(Self::Left)
        } else if v.eq_ignore_ascii_case("center") {
            Some(Self::Center)
        } else if v.eq_ignore_ascii_case("right") {
            Some(Self::Right)
        } else if v.eq_ignore_ascii_case("justify") {
            Some(Self::Justify)
        } else {
            None
        }
    }

    /// Block alignment from a style map, falling back to left.
    pub fn from_style(style: &StyleMap) -> Self {
        style
            .get("text-align")
            .and_then(Self::parse)
            .unwrap_or_default()
    }
}
