use crate::config::AppConfig;
use crate::error::ChoroplethError;
use crate::types::{AgeBucket, Dataset, Region};
use anyhow::{anyhow, Context, Result};
use geo::MultiPolygon;
use geojson::{GeoJson, JsonObject};
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use tracing::{debug, info, warn};

pub fn load_data(config: &AppConfig) -> Result<Dataset> {
    info!("Loading GeoJSON from {:?}...", config.input.geojson);
    let file = File::open(&config.input.geojson)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", config.input.geojson))?;
    let reader = BufReader::new(file);

    // Loads the whole file into memory.
    let geojson = GeoJson::from_reader(reader).context("Failed to parse GeoJSON")?;
    let dataset = dataset_from_geojson(geojson, config)?;
    debug!("Bucket fields: {:?}", bucket_fields(&dataset.buckets));

    info!(
        "Loaded {} regions with {} age buckets",
        dataset.regions.len(),
        dataset.buckets.len()
    );
    Ok(dataset)
}

/// Builds the dataset, resolving every bucket field once per feature.
///
/// A feature lacking the total field or any bucket field fails the load.
pub fn dataset_from_geojson(geojson: GeoJson, config: &AppConfig) -> Result<Dataset> {
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(ChoroplethError::NotFeatureCollection.into()),
    };

    let buckets = config.buckets.clone();
    let empty = JsonObject::new();
    let mut regions = Vec::with_capacity(collection.features.len());

    for (index, feature) in collection.features.into_iter().enumerate() {
        let props = feature.properties.as_ref().unwrap_or(&empty);

        let id = config
            .input
            .id_field
            .as_ref()
            .and_then(|field| props.get(field))
            .and_then(|value| match value {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| index.to_string());

        let total = required_count(props, &config.input.total_field, &id)?;
        let counts = buckets
            .iter()
            .map(|bucket| required_count(props, &bucket.field, &id))
            .collect::<Result<Vec<u64>, ChoroplethError>>()?;

        let name = match props.get(&config.input.name_field) {
            Some(Value::String(s)) => s.clone(),
            _ => id.clone(),
        };

        let geometry = match feature.geometry {
            Some(geo) => {
                let valid_geo: geo::Geometry<f64> = geo
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geometry of feature {}: {:?}", id, e))?;

                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => {
                        warn!("Skipping feature {}: geometry is not polygonal", id);
                        continue;
                    }
                }
            }
            None => {
                warn!("Skipping feature {}: no geometry", id);
                continue;
            }
        };

        regions.push(Region { id, name, total, counts, geometry });
    }

    Ok(Dataset { buckets, regions })
}

fn required_count(props: &JsonObject, field: &str, feature: &str) -> Result<u64, ChoroplethError> {
    let value = props.get(field).ok_or_else(|| ChoroplethError::MissingField {
        feature: feature.to_string(),
        field: field.to_string(),
    })?;
    Ok(count_value(value).unwrap_or_else(|| {
        debug!("Feature {}: non-numeric '{}' value {} counted as 0", feature, field, value);
        0
    }))
}

/// Population count from a property value; `None` when it is not numeric.
///
/// Numeric strings are accepted, fractions rounded, negatives clamped to zero.
pub fn count_value(value: &Value) -> Option<u64> {
    let n = match value {
        Value::Number(n) => match n.as_u64() {
            Some(u) => return Some(u),
            None => n.as_f64()?,
        },
        Value::String(s) => {
            let s = s.trim().replace(',', "");
            match s.parse::<u64>() {
                Ok(u) => return Some(u),
                Err(_) => s.parse::<f64>().ok()?,
            }
        }
        _ => return None,
    };
    if n.is_finite() {
        Some(n.max(0.0).round() as u64)
    } else {
        None
    }
}

/// Bucket fields the dataset was loaded against, for diagnostics.
pub fn bucket_fields(buckets: &[AgeBucket]) -> Vec<&str> {
    buckets.iter().map(|b| b.field.as_str()).collect()
}
