mod config;
mod db;
mod domain;
mod embedding;
mod fetcher;
mod grouping;
mod ingest;
mod query;
mod repository;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Strategy};
use crate::db::Database;
use crate::embedding::OpenAiEmbeddings;
use crate::fetcher::HttpFeedFetcher;
use crate::grouping::{HashResolver, SimilarityResolver, TopicResolver};
use crate::ingest::{start_background_ingest, Ingestor};
use crate::query::NewsQuery;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contrast_news=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load("feeds.toml")?;
    info!("Loaded {} feeds from configuration", config.feeds.len());

    // Initialize database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:contrast_news.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    info!("Database initialized");

    let db = Arc::new(db);

    // Pick the topic matching strategy
    let resolver: Arc<dyn TopicResolver> = match config.grouping.strategy {
        Strategy::Hash => Arc::new(HashResolver::new(db.clone())),
        Strategy::Similarity => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .context("similarity grouping requires OPENAI_API_KEY")?;
            let embeddings = Arc::new(OpenAiEmbeddings::new(&config.embedding, api_key));
            Arc::new(SimilarityResolver::new(
                db.clone(),
                embeddings,
                config.grouping.similarity_threshold,
            ))
        }
    };
    info!("Topic grouping strategy: {:?}", config.grouping.strategy);

    // Create the ingestor
    let ingestor = Arc::new(Ingestor::new(
        db.clone(),
        db.clone(),
        Arc::new(HttpFeedFetcher::new()),
        resolver,
    ));

    // Start background ingest task
    let bg_ingestor = ingestor.clone();
    let bg_feeds = config.feeds.clone();
    let fetch_limit = config.fetch_limit;
    let refresh_interval = config.refresh_interval;
    tokio::spawn(async move {
        start_background_ingest(bg_ingestor, bg_feeds, fetch_limit, refresh_interval).await;
    });

    // Create app state
    let state = Arc::new(AppState {
        query: NewsQuery::new(db.clone(), db.clone()),
        ingestor: ingestor.clone(),
        feeds: config.feeds.clone(),
        fetch_limit,
    });

    // Build router
    let app = Router::new()
        .route("/news", get(routes::news))
        .route("/refresh", post(routes::refresh))
        .route("/refresh/status", get(routes::refresh_status))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Server starting on http://localhost:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
