//! Choropleth of U.S. counties by the population share of a selected age range.
//!
//! Regions are loaded once from GeoJSON; each render pass sums the age buckets
//! overlapping the selected range, divides by the region total and classifies
//! the ratio against a descending threshold table.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod data;
pub mod error;
pub mod processing;
pub mod render;
pub mod report;
pub mod server;
pub mod spatial;
pub mod types;
