//! # fhirlens GCP clients
//!
//! Thin REST clients for the two Google Cloud services fhirlens talks to:
//! Vertex AI (text generation) and BigQuery (warehouse queries). Both use
//! a caller-supplied OAuth2 bearer token; minting and refreshing tokens is
//! the operator's concern.
//!
//! ## Vertex example
//!
//! ```rust,no_run
//! use fhirlens_gcp::vertex::VertexClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = VertexClient::new("my-project", "us-central1", "ya29.token")?;
//!     let response = client
//!         .message_builder()
//!         .model("gemini-2.0-flash")
//!         .user_message("Write a SQL query that counts patients.")
//!         .temperature(0.1)
//!         .max_output_tokens(1024)
//!         .send()
//!         .await?;
//!
//!     println!("{}", response.first_text().unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## BigQuery example
//!
//! ```rust,no_run
//! use fhirlens_gcp::bigquery::{BigQueryClient, QueryRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = BigQueryClient::new("my-project", "ya29.token")?;
//!     let bytes = client.dry_run("SELECT COUNT(*) FROM dataset.patient").await?;
//!     println!("would scan {} bytes", bytes);
//!
//!     let response = client
//!         .query(QueryRequest::new("SELECT COUNT(*) AS count FROM dataset.patient"))
//!         .await?;
//!     for row in response.typed_rows() {
//!         println!("{:?}", row);
//!     }
//!     Ok(())
//! }
//! ```

pub mod bigquery;
pub mod error;
pub mod models;
pub mod vertex;
