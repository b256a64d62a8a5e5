use crate::error::ChoroplethError;
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 24-bit RGB color, written as `#RRGGBB` in config and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pixel value with the given fill opacity in [0, 1].
    pub fn to_rgba(self, opacity: f64) -> image::Rgba<u8> {
        let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        image::Rgba([self.r, self.g, self.b, alpha])
    }
}

impl FromStr for Color {
    type Err = ChoroplethError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ChoroplethError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Color {
    type Error = ChoroplethError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// A named inclusive age interval and the dataset field holding its count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBucket {
    pub label: String,
    pub field: String,
    pub min_age: u32,
    pub max_age: u32,
}

impl AgeBucket {
    pub fn new(label: &str, field: &str, min_age: u32, max_age: u32) -> Self {
        Self {
            label: label.to_string(),
            field: field.to_string(),
            min_age,
            max_age,
        }
    }

    /// True when any age of the bucket lies inside `range`.
    pub fn overlaps(&self, range: SelectedRange) -> bool {
        let overlap_min = range.min_age.max(self.min_age);
        let overlap_max = range.max_age.min(self.max_age);
        overlap_min <= overlap_max
    }
}

/// User-chosen closed age interval. Not validated: an inverted range selects nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedRange {
    pub min_age: u32,
    pub max_age: u32,
}

impl SelectedRange {
    pub const fn new(min_age: u32, max_age: u32) -> Self {
        Self { min_age, max_age }
    }
}

impl fmt::Display for SelectedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min_age, self.max_age)
    }
}

#[derive(Debug, Clone)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub total: u64,
    // Positional, in the dataset's bucket order
    pub counts: Vec<u64>,
    pub geometry: MultiPolygon<f64>,
}

/// Loaded regions plus the bucket set their counts were resolved against.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub buckets: Vec<AgeBucket>,
    pub regions: Vec<Region>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shade {
    /// Total population is zero; the consumer picks the no-data color.
    NoData,
    Fill(Color),
}

impl Shade {
    pub fn color_or(self, no_data: Color) -> Color {
        match self {
            Shade::NoData => no_data,
            Shade::Fill(color) => color,
        }
    }
}

/// Result of one render pass for a single region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionStats {
    pub id: String,
    pub name: String,
    pub total: u64,
    pub selected: u64,
    pub ratio: Option<f64>,
    pub shade: Shade,
    pub buckets: Vec<String>,
}

impl RegionStats {
    pub fn percentage_text(&self) -> String {
        match self.ratio {
            Some(ratio) => format!("{:.1}", ratio * 100.0),
            None => "n/a".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_parses_and_prints_hex() {
        let color: Color = "#bd0026".parse().unwrap();
        assert_eq!(color, Color::rgb(0xBD, 0x00, 0x26));
        assert_eq!(color.to_string(), "#BD0026");
    }

    #[test]
    fn color_rejects_malformed_input() {
        for bad in ["800026", "#80002", "#80002G", "#8000261", ""] {
            assert!(bad.parse::<Color>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn rgba_uses_fill_opacity() {
        assert_eq!(Color::rgb(1, 2, 3).to_rgba(1.0), image::Rgba([1, 2, 3, 255]));
        assert_eq!(Color::rgb(1, 2, 3).to_rgba(2.0), image::Rgba([1, 2, 3, 255]));
        assert_eq!(Color::rgb(1, 2, 3).to_rgba(0.0), image::Rgba([1, 2, 3, 0]));
    }

    #[test]
    fn bucket_overlap_is_inclusive_at_both_ends() {
        let bucket = AgeBucket::new("20-24", "20 to 24 years", 20, 24);
        assert!(bucket.overlaps(SelectedRange::new(24, 30)));
        assert!(bucket.overlaps(SelectedRange::new(10, 20)));
        assert!(bucket.overlaps(SelectedRange::new(21, 22)));
        assert!(!bucket.overlaps(SelectedRange::new(25, 30)));
        assert!(!bucket.overlaps(SelectedRange::new(24, 20)));
    }

    #[test]
    fn percentage_text_has_one_decimal() {
        let mut stats = RegionStats {
            id: "1".into(),
            name: "A".into(),
            total: 8,
            selected: 1,
            ratio: Some(0.125),
            shade: Shade::NoData,
            buckets: vec![],
        };
        assert_eq!(stats.percentage_text(), "12.5");
        stats.ratio = None;
        assert_eq!(stats.percentage_text(), "n/a");
    }
}
