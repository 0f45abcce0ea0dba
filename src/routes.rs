use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::FeedConfig;
use crate::ingest::Ingestor;
use crate::query::NewsQuery;

pub struct AppState {
    pub query: NewsQuery,
    pub ingestor: Arc<Ingestor>,
    pub feeds: Vec<FeedConfig>,
    pub fetch_limit: usize,
}

#[derive(Deserialize)]
pub struct NewsParams {
    #[serde(default = "default_news_limit")]
    pub limit: usize,
}

fn default_news_limit() -> usize {
    20
}

#[derive(Serialize)]
pub struct RefreshStatus {
    pub running: bool,
}

// Route handlers

/// Aggregated feed across all sources; per-source failures degrade to a
/// partial result, never a 5xx.
pub async fn news(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NewsParams>,
) -> impl IntoResponse {
    Json(state.query.get_news(params.limit).await)
}

/// Kicks off an ingest run out-of-band and reports back immediately.
pub async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ingestor = state.ingestor.clone();
    let feeds = state.feeds.clone();
    let limit = state.fetch_limit;
    tokio::spawn(async move {
        let _ = ingestor.ingest_all(&feeds, limit).await;
    });

    Json(RefreshStatus { running: true })
}

pub async fn refresh_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(RefreshStatus {
        running: state.ingestor.is_running().await,
    })
}

pub async fn health() -> impl IntoResponse {
    "OK"
}
