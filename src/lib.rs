//! Contrast News - a bias-aware RSS news aggregator
//!
//! This crate ingests articles from outlets across the political spectrum,
//! deduplicates them by link, groups related coverage by topic (exact title
//! hash or embedding similarity), and serves the aggregated feed as JSON.

pub mod config;
pub mod db;
pub mod domain;
pub mod embedding;
pub mod fetcher;
pub mod grouping;
pub mod ingest;
pub mod query;
pub mod repository;
pub mod routes;
