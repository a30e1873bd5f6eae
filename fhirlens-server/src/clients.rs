use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::{ColumnInfo, QueryResult};
use async_trait::async_trait;
use fhirlens_gcp::bigquery::{BigQueryClient, DatasetReference, QueryRequest};
use fhirlens_gcp::error::GcpError;
use fhirlens_gcp::vertex::VertexClient;
use std::time::{Duration, Instant};

/// Per-call generation parameters
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_output_tokens: u32,
}

/// Text generation seam; the pipeline never talks to Vertex directly
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        params: GenerationParams,
    ) -> AppResult<String>;
}

/// Warehouse seam; dry-run cost estimation and bounded execution
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn estimate_cost(&self, sql: &str) -> AppResult<u64>;

    async fn run(&self, sql: &str, row_limit: u32) -> AppResult<QueryResult>;
}

/// Vertex AI adapter for the `TextModel` seam
pub struct VertexTextModel {
    client: VertexClient,
    model: String,
}

impl VertexTextModel {
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let token = config
            .access_token()
            .ok_or_else(|| AppError::Internal("GCP access token is not configured".to_string()))?;

        let client = VertexClient::new(&config.gcp.project_id, &config.gcp.region, token)
            .and_then(|c| c.with_timeout(Duration::from_secs(config.query.model_timeout_secs)))
            .map_err(|e| AppError::Internal(format!("Failed to build Vertex client: {e}")))?;

        Ok(Self {
            client,
            model: config.gcp.model.clone(),
        })
    }
}

#[async_trait]
impl TextModel for VertexTextModel {
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        params: GenerationParams,
    ) -> AppResult<String> {
        let mut builder = self
            .client
            .message_builder()
            .model(&self.model)
            .user_message(prompt)
            .temperature(params.temperature)
            .max_output_tokens(params.max_output_tokens);

        if let Some(system) = system {
            builder = builder.system(system);
        }
        if let Some(top_p) = params.top_p {
            builder = builder.top_p(top_p);
        }
        if let Some(top_k) = params.top_k {
            builder = builder.top_k(top_k);
        }

        let response = builder.send().await.map_err(map_model_error)?;

        response
            .first_text()
            .ok_or_else(|| AppError::Extraction("Model returned no text".to_string()))
    }
}

/// BigQuery adapter for the `Warehouse` seam
pub struct BigQueryWarehouse {
    client: BigQueryClient,
    default_dataset: Option<DatasetReference>,
    timeout_ms: u64,
}

impl BigQueryWarehouse {
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let token = config
            .access_token()
            .ok_or_else(|| AppError::Internal("GCP access token is not configured".to_string()))?;

        let client = BigQueryClient::new(&config.gcp.project_id, token)
            .and_then(|c| c.with_timeout(Duration::from_secs(config.query.query_timeout_secs)))
            .map_err(|e| AppError::Internal(format!("Failed to build BigQuery client: {e}")))?;

        Ok(Self {
            client,
            default_dataset: parse_dataset(&config.gcp.dataset),
            timeout_ms: config.query.query_timeout_secs.saturating_mul(1000),
        })
    }

    fn request(&self, sql: impl Into<String>) -> QueryRequest {
        QueryRequest {
            timeout_ms: Some(self.timeout_ms),
            default_dataset: self.default_dataset.clone(),
            ..QueryRequest::new(sql)
        }
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn estimate_cost(&self, sql: &str) -> AppResult<u64> {
        let request = QueryRequest {
            dry_run: Some(true),
            ..self.request(sql)
        };

        let response = self.client.query(request).await.map_err(map_warehouse_error)?;
        Ok(response.total_bytes())
    }

    async fn run(&self, sql: &str, row_limit: u32) -> AppResult<QueryResult> {
        let bounded_sql = ensure_limit(sql, row_limit);
        let request = QueryRequest {
            max_results: Some(row_limit),
            ..self.request(bounded_sql)
        };

        let started = Instant::now();
        let response = self.client.query(request).await.map_err(map_warehouse_error)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let columns = response
            .schema
            .as_ref()
            .map(|schema| {
                schema
                    .fields
                    .iter()
                    .map(|field| ColumnInfo {
                        name: field.name.clone(),
                        column_type: field.field_type.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut rows = response.typed_rows();
        rows.truncate(row_limit as usize);

        Ok(QueryResult {
            columns,
            rows,
            bytes_scanned: response.total_bytes(),
            elapsed_ms,
        })
    }
}

/// Appends a defensive LIMIT when the statement has none
pub fn ensure_limit(sql: &str, row_limit: u32) -> String {
    let trimmed = sql.trim().trim_end_matches(';').trim_end();
    let limit_pattern = regex::Regex::new(r"\bLIMIT\s+\d+").unwrap();

    if limit_pattern.is_match(&trimmed.to_uppercase()) {
        trimmed.to_string()
    } else {
        format!("{} LIMIT {}", trimmed, row_limit)
    }
}

fn parse_dataset(dataset: &str) -> Option<DatasetReference> {
    let (project_id, dataset_id) = dataset.rsplit_once('.')?;
    Some(DatasetReference {
        project_id: project_id.to_string(),
        dataset_id: dataset_id.to_string(),
    })
}

fn map_model_error(err: GcpError) -> AppError {
    if err.is_timeout() {
        return AppError::Timeout(err.to_string());
    }
    match err {
        GcpError::RateLimit { .. } => AppError::ModelQuota(err.to_string()),
        _ => AppError::ModelUnavailable(err.to_string()),
    }
}

fn map_warehouse_error(err: GcpError) -> AppError {
    if err.is_timeout() {
        return AppError::Timeout(err.to_string());
    }
    AppError::Execution(err.to_string())
}
