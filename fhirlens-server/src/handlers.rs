//! HTTP handlers for the analytics API.

use std::sync::Arc;
use std::time::SystemTime;

use actix_web::{web, HttpResponse};

use crate::clients::Warehouse;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{AskRequest, DatasetsResponse, HealthResponse, ServiceInfo};
use crate::pipeline::QueryProcessor;
use crate::schema::SchemaContext;

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub schema: Arc<SchemaContext>,
    pub processor: Arc<QueryProcessor>,
    pub warehouse: Arc<dyn Warehouse>,
    pub start_time: SystemTime,
}

pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(ServiceInfo {
        name: "fhirlens-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "healthy".to_string(),
    })
}

pub async fn ask_question(
    data: web::Data<AppState>,
    request: web::Json<AskRequest>,
) -> Result<HttpResponse, AppError> {
    let response = data.processor.process(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Health check with a warehouse connectivity probe. The probe is a dry
/// run, so it costs nothing against the query quota.
pub async fn health_check(data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let uptime_secs = data
        .start_time
        .elapsed()
        .map_err(|e| AppError::Internal(format!("Failed to calculate uptime: {e}")))?
        .as_secs();

    let probe = match data.schema.tables.first() {
        Some(table) => format!(
            "SELECT COUNT(*) FROM `{}.{}`",
            data.config.gcp.dataset, table.name
        ),
        None => "SELECT 1".to_string(),
    };
    data.warehouse
        .estimate_cost(&probe)
        .await
        .map_err(|e| AppError::Internal(format!("Service unhealthy: {e}")))?;

    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        warehouse_connected: true,
        project_id: data.config.gcp.project_id.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs,
    }))
}

pub async fn list_datasets(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(DatasetsResponse {
        dataset: data.schema.dataset.clone(),
        tables: data.schema.tables.clone(),
    })
}
