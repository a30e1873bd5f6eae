//! BigQuery REST client and wire types
//!
//! Covers the synchronous jobs.query endpoint, including dry runs.

pub mod client;
pub mod types;

pub use client::BigQueryClient;
pub use types::*;
