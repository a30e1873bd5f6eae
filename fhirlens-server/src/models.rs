use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of POST /ask
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub limit: Option<u32>,
    pub include_visualization: Option<bool>,
}

/// Response of POST /ask
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub sql: String,
    pub answer_summary: String,
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Map<String, Value>>,
    pub row_count: usize,
    pub bytes_scanned: u64,
    pub estimated_cost_usd: f64,
    pub elapsed_ms: u64,
    pub visualization: Option<VisualizationSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: String,
}

/// Result of a warehouse query, scoped to one request
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Map<String, Value>>,
    pub bytes_scanned: u64,
    pub elapsed_ms: u64,
}

/// Outcome of a successful validation pass
#[derive(Debug, Clone, Copy)]
pub struct ValidationReport {
    pub estimated_bytes_scanned: u64,
    pub estimated_cost_usd: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Scatter,
    Table,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChartOptions {
    pub title: Option<String>,
    pub x_title: Option<String>,
    pub y_title: Option<String>,
}

/// Chart suggestion derived from result column shapes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisualizationSpec {
    pub chart: ChartKind,
    pub x_field: Option<String>,
    pub y_field: Option<String>,
    pub options: ChartOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub warehouse_connected: bool,
    pub project_id: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetsResponse {
    pub dataset: String,
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub status: String,
}
