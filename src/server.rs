use crate::classify::{LegendEntry, ThresholdTable};
use crate::config::AppConfig;
use crate::processing::{compute_stats, region_stats, summarize, Summary};
use crate::render::build_layer;
use crate::spatial::RegionIndex;
use crate::types::{Color, Dataset, RegionStats, SelectedRange};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

/// Result of one render pass, as currently displayed.
#[derive(Debug)]
pub struct Layer {
    pub range: SelectedRange,
    pub stats: Vec<RegionStats>,
}

pub struct AppState {
    pub dataset: Dataset,
    pub table: ThresholdTable,
    pub index: RegionIndex,
    pub config: AppConfig,
    // Only mutable value; replaced whole on recompute
    current: RwLock<Arc<Layer>>,
}

impl AppState {
    pub fn new(config: AppConfig, dataset: Dataset) -> Result<Self> {
        let table = ThresholdTable::from_config(&config.classification)
            .context("Invalid classification thresholds")?;

        info!("Building spatial index for API...");
        let index = RegionIndex::build(&dataset.regions);
        info!("Spatial index built ({} regions).", index.len());

        let range = config.selected_range(None, None);
        let stats = compute_stats(&dataset, &table, range);

        Ok(Self {
            dataset,
            table,
            index,
            config,
            current: RwLock::new(Arc::new(Layer { range, stats })),
        })
    }

    pub async fn current_layer(&self) -> Arc<Layer> {
        self.current.read().await.clone()
    }

    /// Computes a layer for `range` and makes it the current one.
    ///
    /// The pass runs on the blocking pool; the lock is only taken for the swap.
    pub async fn recompute(self: &Arc<Self>, range: SelectedRange) -> Result<Arc<Layer>> {
        let state = Arc::clone(self);
        let stats = tokio::task::spawn_blocking(move || compute_stats(&state.dataset, &state.table, range))
            .await
            .context("Render pass failed")?;
        let layer = Arc::new(Layer { range, stats });
        *self.current.write().await = layer.clone();
        Ok(layer)
    }

    fn no_data_color(&self) -> Color {
        self.config.classification.no_data_color
    }

    fn layer_geojson(&self, layer: &Layer) -> FeatureCollection {
        build_layer(&self.dataset, &layer.stats, layer.range, self.no_data_color())
    }
}

#[derive(Deserialize)]
pub struct QueryParams {
    lat: f64,
    lon: f64,
    min_age: Option<u32>,
    max_age: Option<u32>,
}

#[derive(Deserialize)]
pub struct RangeParams {
    min_age: u32,
    max_age: u32,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    id: String,
    name: String,
    total: u64,
    selected: u64,
    percentage: String,
    fill: Color,
    min_age: u32,
    max_age: u32,
    buckets: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LegendResponse {
    entries: Vec<LegendEntry>,
    no_data: Color,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    min_age: u32,
    max_age: u32,
    #[serde(flatten)]
    summary: Summary,
}

pub fn router(state: Arc<AppState>) -> Router {
    let tile_service = ServeDir::new(&state.config.output.tile_dir);
    let static_service = ServeDir::new(&state.config.server.static_dir);

    Router::new()
        .route("/api/layer", get(layer_handler))
        .route("/api/recompute", post(recompute_handler))
        .route("/api/query", get(query_handler))
        .route("/api/legend", get(legend_handler))
        .route("/api/summary", get(summary_handler))
        .nest_service("/tiles", tile_service)
        .fallback_service(static_service)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, dataset: Dataset) -> Result<()> {
    let port = config.server.port;
    let state = Arc::new(AppState::new(config, dataset)?);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn layer_handler(State(state): State<Arc<AppState>>) -> Json<FeatureCollection> {
    let layer = state.current_layer().await;
    Json(state.layer_geojson(&layer))
}

async fn recompute_handler(
    State(state): State<Arc<AppState>>,
    Json(params): Json<RangeParams>,
) -> Result<Json<FeatureCollection>, StatusCode> {
    let range = SelectedRange::new(params.min_age, params.max_age);
    info!("Recomputing layer for ages {}", range);
    let layer = state.recompute(range).await.map_err(|e| {
        error!("Recompute for ages {} failed: {:#}", range, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(state.layer_geojson(&layer)))
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<QueryResponse>> {
    let Some(i) = state.index.locate(&state.dataset.regions, params.lon, params.lat) else {
        return Json(None);
    };

    let layer = state.current_layer().await;
    let range = SelectedRange::new(
        params.min_age.unwrap_or(layer.range.min_age),
        params.max_age.unwrap_or(layer.range.max_age),
    );

    let stats = if range == layer.range {
        layer.stats.get(i).cloned()
    } else {
        state
            .dataset
            .regions
            .get(i)
            .map(|region| region_stats(&state.dataset.buckets, region, &state.table, range))
    };

    Json(stats.map(|s| QueryResponse {
        percentage: s.percentage_text(),
        fill: s.shade.color_or(state.no_data_color()),
        id: s.id,
        name: s.name,
        total: s.total,
        selected: s.selected,
        min_age: range.min_age,
        max_age: range.max_age,
        buckets: s.buckets,
    }))
}

async fn legend_handler(State(state): State<Arc<AppState>>) -> Json<LegendResponse> {
    Json(LegendResponse {
        entries: state.table.legend(),
        no_data: state.no_data_color(),
    })
}

async fn summary_handler(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    let layer = state.current_layer().await;
    Json(SummaryResponse {
        min_age: layer.range.min_age,
        max_age: layer.range.max_age,
        summary: summarize(&layer.stats),
    })
}
