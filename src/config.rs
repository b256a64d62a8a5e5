use crate::types::{AgeBucket, Color, SelectedRange};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Deepest zoom level tiles are rendered for.
pub const MAX_ZOOM: u8 = 24;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default = "default_buckets")]
    pub buckets: Vec<AgeBucket>,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub geojson: PathBuf,
    #[serde(default)]
    pub id_field: Option<String>,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    #[serde(default = "default_total_field")]
    pub total_field: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassificationConfig {
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<ThresholdConfig>,
    #[serde(default = "default_zero_color")]
    pub zero_color: Color,
    #[serde(default = "default_low_color")]
    pub low_color: Color,
    #[serde(default = "default_no_data_color")]
    pub no_data_color: Color,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ThresholdConfig {
    pub bound: f64, // Lower bound of the ratio, inclusive
    pub color: Color,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SelectionConfig {
    pub min_age: u32,
    pub max_age: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_tile_dir")]
    pub tile_dir: PathBuf,
    #[serde(default = "default_layer")]
    pub layer: PathBuf,
    #[serde(default = "default_min_zoom")]
    pub min_zoom: u8,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let output = &self.output;
        if output.max_zoom > MAX_ZOOM {
            bail!("output.max_zoom {} exceeds the supported maximum of {}", output.max_zoom, MAX_ZOOM);
        }
        if output.min_zoom > output.max_zoom {
            bail!("output.min_zoom {} is greater than max_zoom {}", output.min_zoom, output.max_zoom);
        }
        Ok(())
    }

    /// The configured default range, with either end overridden from the command line.
    pub fn selected_range(&self, min_age: Option<u32>, max_age: Option<u32>) -> SelectedRange {
        SelectedRange::new(
            min_age.unwrap_or(self.selection.min_age),
            max_age.unwrap_or(self.selection.max_age),
        )
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            thresholds: default_thresholds(),
            zero_color: default_zero_color(),
            low_color: default_low_color(),
            no_data_color: default_no_data_color(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { min_age: 20, max_age: 29 }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tile_dir: default_tile_dir(),
            layer: default_layer(),
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// Age bucket fields of the county population table.
pub fn default_buckets() -> Vec<AgeBucket> {
    vec![
        AgeBucket::new("18-19", "18 and 19 years", 18, 19),
        AgeBucket::new("20-24", "20 to 24 years", 20, 24),
        AgeBucket::new("25-29", "25 to 29 years", 25, 29),
        AgeBucket::new("30-34", "30 to 34 years", 30, 34),
        AgeBucket::new("35-44", "35 to 44 years", 35, 44),
        AgeBucket::new("45-54", "45 to 54 years", 45, 54),
        AgeBucket::new("55-64", "55 to 64 years", 55, 64),
    ]
}

pub fn default_thresholds() -> Vec<ThresholdConfig> {
    [
        (0.12, Color::rgb(0x80, 0x00, 0x26)),
        (0.09, Color::rgb(0xBD, 0x00, 0x26)),
        (0.06, Color::rgb(0xE3, 0x1A, 0x1C)),
        (0.03, Color::rgb(0xFC, 0x4E, 0x2A)),
    ]
    .into_iter()
    .map(|(bound, color)| ThresholdConfig { bound, color })
    .collect()
}

fn default_zero_color() -> Color {
    Color::rgb(0xFF, 0xFF, 0xFF)
}

fn default_low_color() -> Color {
    Color::rgb(0xFD, 0x8D, 0x3C)
}

fn default_no_data_color() -> Color {
    Color::rgb(0xCC, 0xCC, 0xCC)
}

fn default_name_field() -> String {
    "NAME".to_string()
}

fn default_total_field() -> String {
    "total".to_string()
}

fn default_tile_dir() -> PathBuf {
    PathBuf::from("tiles")
}

fn default_layer() -> PathBuf {
    PathBuf::from("choropleth.geojson")
}

fn default_min_zoom() -> u8 {
    3
}

fn default_max_zoom() -> u8 {
    6
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from(".")
}
