//! linkpulse - analytics event ingestion and aggregation engine
//!
//! The write path accepts view and click events from shared link pages,
//! filters bots, rate-limits by source address, enriches with geography and
//! device data, appends to a durable event log and bumps denormalized
//! counters. The read path serves reconciled dashboard aggregates where the
//! log and the counters may disagree.
//!
//! # Modules
//!
//! - `api`: HTTP endpoints (ingestion, aggregates, health)
//! - `config`: layered application configuration
//! - `enrich`: geo + device enrichment pipeline
//! - `errors`: crate-wide error type
//! - `filter`: bot signature classification
//! - `ingest`: the ingestion gateway orchestrating the write path
//! - `ratelimit`: sliding-window rate limiter
//! - `reader`: reconciliation reader for dashboard queries
//! - `storage`: SeaORM storage over SQLite/MySQL/PostgreSQL

pub mod api;
pub mod config;
pub mod enrich;
pub mod errors;
pub mod filter;
pub mod ingest;
pub mod logging;
pub mod ratelimit;
pub mod reader;
pub mod server;
pub mod storage;
pub mod utils;
