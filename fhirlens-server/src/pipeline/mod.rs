//! Request pipeline: question in, structured answer out.
//!
//! Stages run synchronously per request: Received, Generating, Extracting,
//! Validating, Executing, Formatting, then Completed or Failed. A failure
//! at any stage fails the whole request; there are no retries and no
//! partial results. Requests share nothing but the immutable schema,
//! configuration, and the network client handles.

pub mod extract;
pub mod format;
pub mod validate;

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clients::{GenerationParams, TextModel, Warehouse};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::{AskRequest, AskResponse, QueryResult, ValidationReport};
use crate::prompts;
use crate::schema::SchemaContext;
use self::validate::SqlGuard;

const SQL_GENERATION_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.1,
    top_p: Some(0.8),
    top_k: Some(40),
    max_output_tokens: 1024,
};

const SUMMARY_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.3,
    top_p: Some(0.8),
    top_k: Some(40),
    max_output_tokens: 512,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    Generating,
    Extracting,
    Validating,
    Executing,
    Formatting,
    Completed,
    Failed,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Generating => "generating",
            Stage::Extracting => "extracting",
            Stage::Validating => "validating",
            Stage::Executing => "executing",
            Stage::Formatting => "formatting",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        }
    }
}

/// Sequences generation, extraction, validation, execution and formatting
/// for one question at a time.
pub struct QueryProcessor {
    model: Arc<dyn TextModel>,
    warehouse: Arc<dyn Warehouse>,
    schema: Arc<SchemaContext>,
    guard: SqlGuard,
    config: Arc<AppConfig>,
}

impl QueryProcessor {
    pub fn new(
        model: Arc<dyn TextModel>,
        warehouse: Arc<dyn Warehouse>,
        schema: Arc<SchemaContext>,
        config: Arc<AppConfig>,
    ) -> Self {
        let guard = SqlGuard::new(&schema);
        Self {
            model,
            warehouse,
            schema,
            guard,
            config,
        }
    }

    pub async fn process(&self, request: AskRequest) -> AppResult<AskResponse> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        info!(
            %request_id,
            stage = Stage::Received.as_str(),
            question = %request.question,
            "Accepted analytics question"
        );

        match self.run(request_id, request, started).await {
            Ok(response) => {
                info!(
                    %request_id,
                    stage = Stage::Completed.as_str(),
                    rows = response.row_count,
                    elapsed_ms = response.elapsed_ms,
                    "Request completed"
                );
                Ok(response)
            }
            Err(err) => {
                error!(
                    %request_id,
                    stage = Stage::Failed.as_str(),
                    kind = %err.error_type(),
                    error = %err,
                    "Request failed"
                );
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        request_id: Uuid,
        request: AskRequest,
        started: Instant,
    ) -> AppResult<AskResponse> {
        let question = request.question.trim().to_string();
        if question.is_empty() {
            return Err(AppError::InvalidRequest(
                "Question must not be empty".to_string(),
            ));
        }
        if request.limit == Some(0) {
            return Err(AppError::InvalidRequest(
                "Row limit must be greater than zero".to_string(),
            ));
        }
        let row_limit = request
            .limit
            .unwrap_or(self.config.query.default_row_limit)
            .min(self.config.query.default_row_limit);

        info!(
            %request_id,
            stage = Stage::Generating.as_str(),
            model = %self.config.gcp.model,
            "Generating SQL"
        );
        let prompt = prompts::sql_generation_prompt(&question, &self.schema);
        let raw = self
            .model
            .generate(
                Some(prompts::ANALYST_SYSTEM_PROMPT),
                &prompt,
                SQL_GENERATION_PARAMS,
            )
            .await?;

        info!(%request_id, stage = Stage::Extracting.as_str(), "Extracting SQL");
        let statement = extract::extract_sql(&raw)?;
        let statement = extract::normalize_table_names(&statement);

        info!(
            %request_id,
            stage = Stage::Validating.as_str(),
            sql = %statement,
            "Validating statement"
        );
        let report = self.validate(&statement).await?;

        info!(
            %request_id,
            stage = Stage::Executing.as_str(),
            estimated_bytes = report.estimated_bytes_scanned,
            "Running query"
        );
        let result = self.warehouse.run(&statement, row_limit).await?;

        info!(
            %request_id,
            stage = Stage::Formatting.as_str(),
            rows = result.rows.len(),
            "Formatting result"
        );
        let visualization = if request.include_visualization.unwrap_or(true) {
            format::select_visualization(&result)
        } else {
            None
        };

        let answer_summary = self
            .summarize(request_id, &question, &statement, &result)
            .await;

        let row_count = result.rows.len();
        Ok(AskResponse {
            sql: statement,
            answer_summary,
            columns: result.columns,
            rows: result.rows,
            row_count,
            bytes_scanned: result.bytes_scanned,
            estimated_cost_usd: report.estimated_cost_usd,
            elapsed_ms: started.elapsed().as_millis() as u64,
            visualization,
        })
    }

    /// Write and allow-list checks run before the dry run, so a rejected
    /// statement never spends a cost estimate.
    async fn validate(&self, statement: &str) -> AppResult<ValidationReport> {
        self.guard.check(statement)?;

        let estimated_bytes_scanned = self.warehouse.estimate_cost(statement).await?;
        let estimated_cost_usd = validate::estimated_cost_usd(estimated_bytes_scanned);
        let ceiling = self.config.query.max_bytes_scanned;
        if estimated_bytes_scanned > ceiling {
            return Err(AppError::CostLimitExceeded(format!(
                "Query would scan {:.2} GiB (about ${:.2}), above the {:.2} GiB limit",
                gib(estimated_bytes_scanned),
                estimated_cost_usd,
                gib(ceiling)
            )));
        }
        Ok(ValidationReport {
            estimated_bytes_scanned,
            estimated_cost_usd,
        })
    }

    /// Summary generation is best effort; a model failure here must not
    /// fail a request that already has rows.
    async fn summarize(
        &self,
        request_id: Uuid,
        question: &str,
        statement: &str,
        result: &QueryResult,
    ) -> String {
        let prompt =
            prompts::summary_prompt(question, statement, &result.rows, result.rows.len());
        match self.model.generate(None, &prompt, SUMMARY_PARAMS).await {
            Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
            Ok(_) => prompts::SUMMARY_FALLBACK.to_string(),
            Err(err) => {
                warn!(%request_id, error = %err, "Summary generation failed");
                prompts::SUMMARY_FALLBACK.to_string()
            }
        }
    }
}

fn gib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}
