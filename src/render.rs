use crate::config::AppConfig;
use crate::spatial::RegionIndex;
use crate::types::{Color, Dataset, RegionStats, SelectedRange};
use anyhow::{Context, Result};
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject};
use image::{ImageBuffer, RgbaImage};
use rayon::prelude::*;
use serde_json::json;
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

// Constants for Web Mercator
const TILE_SIZE: u32 = 256;
const MAX_LATITUDE: f64 = 85.051_128_78;

pub const FILL_OPACITY: f64 = 0.7;
pub const STROKE_COLOR: Color = Color::rgb(0x44, 0x44, 0x44);
pub const STROKE_WIDTH: f64 = 0.5;

/// Input geometry with the render pass attached as simplestyle properties.
///
/// `stats` must be in dataset order, as returned by `compute_stats`.
pub fn build_layer(
    dataset: &Dataset,
    stats: &[RegionStats],
    range: SelectedRange,
    no_data: Color,
) -> FeatureCollection {
    let features = dataset
        .regions
        .iter()
        .zip(stats)
        .map(|(region, stat)| Feature {
            bbox: None,
            geometry: Some(Geometry::new(geojson::Value::from(&region.geometry))),
            id: Some(Id::String(region.id.clone())),
            properties: Some(layer_properties(stat, range, no_data)),
            foreign_members: None,
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn layer_properties(stat: &RegionStats, range: SelectedRange, no_data: Color) -> JsonObject {
    let properties = json!({
        "id": stat.id,
        "name": stat.name,
        "total": stat.total,
        "selected": stat.selected,
        "percentage": stat.percentage_text(),
        "buckets": stat.buckets,
        "min_age": range.min_age,
        "max_age": range.max_age,
        "fill": stat.shade.color_or(no_data).to_string(),
        "fill-opacity": FILL_OPACITY,
        "stroke": STROKE_COLOR.to_string(),
        "stroke-width": STROKE_WIDTH,
    });
    match properties {
        serde_json::Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

pub fn write_layer(path: &Path, layer: &FeatureCollection) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create layer directory: {:?}", parent))?;
    }
    let body = serde_json::to_string(layer).context("Failed to serialize layer")?;
    fs::write(path, body).with_context(|| format!("Failed to write layer: {:?}", path))?;
    info!("Wrote styled layer to {:?}", path);
    Ok(())
}

/// Directory holding the tiles of one selected range.
pub fn tile_root(config: &AppConfig, range: SelectedRange) -> PathBuf {
    config.output.tile_dir.join(range.to_string())
}

/// Rasterizes region fills into `{tile_dir}/{min}-{max}/{z}/{x}/{y}.png`.
///
/// Returns the number of tiles written; tiles with no region pixel are skipped.
pub fn generate_tiles(
    config: &AppConfig,
    dataset: &Dataset,
    index: &RegionIndex,
    stats: &[RegionStats],
    range: SelectedRange,
) -> Result<usize> {
    info!(
        "Generating tiles from min_zoom {} to max_zoom {}...",
        config.output.min_zoom, config.output.max_zoom
    );

    let Some((min, max)) = index.bounds() else {
        warn!("No region geometry to render");
        return Ok(0);
    };

    let colors: Vec<image::Rgba<u8>> = stats
        .iter()
        .map(|s| s.shade.color_or(config.classification.no_data_color).to_rgba(FILL_OPACITY))
        .collect();

    let root = tile_root(config, range);
    let written = AtomicUsize::new(0);

    for zoom in config.output.min_zoom..=config.output.max_zoom {
        let (x_range, y_range) = tile_span(min, max, zoom);
        let z_dir = root.join(zoom.to_string());
        fs::create_dir_all(&z_dir).context("Failed to create zoom directory")?;

        let tiles: Vec<(u32, u32)> = x_range
            .flat_map(|x| y_range.clone().map(move |y| (x, y)))
            .collect();

        tiles.par_iter().for_each(|&(x, y)| {
            let Some(img) = render_tile(dataset, index, &colors, zoom, x, y) else {
                return;
            };

            let x_dir = z_dir.join(x.to_string());
            if let Err(e) = fs::create_dir_all(&x_dir) {
                warn!("Failed to create tile directory {:?}: {}", x_dir, e);
                return;
            }
            let path = x_dir.join(format!("{}.png", y));
            match img.save(&path) {
                Ok(()) => {
                    written.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => warn!("Failed to save tile {:?}: {:?}", path, e),
            }
        });
    }

    let written = written.into_inner();
    info!("Wrote {} tiles to {:?}", written, root);
    Ok(written)
}

fn render_tile(
    dataset: &Dataset,
    index: &RegionIndex,
    colors: &[image::Rgba<u8>],
    zoom: u8,
    tx: u32,
    ty: u32,
) -> Option<RgbaImage> {
    // North-west and south-east corners
    let (west, north) = tile_pixel_to_lon_lat(tx, ty, 0.0, 0.0, zoom);
    let (east, south) = tile_pixel_to_lon_lat(tx, ty, TILE_SIZE as f64, TILE_SIZE as f64, zoom);
    if !index.intersects_box([west, south], [east, north]) {
        return None;
    }

    let mut img: RgbaImage = ImageBuffer::new(TILE_SIZE, TILE_SIZE);
    let mut painted = false;

    for py in 0..TILE_SIZE {
        for px in 0..TILE_SIZE {
            let (lon, lat) = tile_pixel_to_lon_lat(tx, ty, px as f64 + 0.5, py as f64 + 0.5, zoom);
            if let Some(color) = index.locate(&dataset.regions, lon, lat).and_then(|i| colors.get(i)) {
                img.put_pixel(px, py, *color);
                painted = true;
            }
        }
    }

    painted.then_some(img)
}

/// Tile columns and rows covering a lon/lat box at `zoom`.
fn tile_span(min: [f64; 2], max: [f64; 2], zoom: u8) -> (std::ops::RangeInclusive<u32>, std::ops::RangeInclusive<u32>) {
    // y grows southward
    let (x0, y0, _, _) = lat_lon_to_tile_pixel(max[1], min[0], zoom);
    let (x1, y1, _, _) = lat_lon_to_tile_pixel(min[1], max[0], zoom);
    (x0..=x1, y0..=y1)
}

/// Highest tile column/row index at `zoom`.
fn last_tile(zoom: u8) -> u32 {
    1u32.checked_shl(zoom.into()).map_or(u32::MAX, |n| n - 1)
}

// Coordinate conversions
fn lat_lon_to_tile_pixel(lat: f64, lon: f64, zoom: u8) -> (u32, u32, u32, u32) {
    let n = 2.0_f64.powi(zoom as i32);
    let last = last_tile(zoom);
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x_t = ((lon + 180.0) / 360.0 * n).clamp(0.0, n);
    let lat_rad = lat.to_radians();
    let y_t = ((1.0 - (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() / PI) / 2.0 * n).clamp(0.0, n);

    // The east and south edges belong to the last tile
    let tx = (x_t as u32).min(last);
    let ty = (y_t as u32).min(last);

    let px = (((x_t - tx as f64) * TILE_SIZE as f64) as u32).min(TILE_SIZE - 1);
    let py = (((y_t - ty as f64) * TILE_SIZE as f64) as u32).min(TILE_SIZE - 1);

    (tx, ty, px, py)
}

/// Lon/lat of a (fractional) pixel position within a tile.
fn tile_pixel_to_lon_lat(tx: u32, ty: u32, px: f64, py: f64, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32);
    let x_t = tx as f64 + px / TILE_SIZE as f64;
    let y_t = ty as f64 + py / TILE_SIZE as f64;

    let lon = x_t / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y_t / n)).sinh().atan().to_degrees();
    (lon, lat)
}
