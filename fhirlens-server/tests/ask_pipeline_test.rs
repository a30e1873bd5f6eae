//! End-to-end tests for the ask pipeline over the HTTP surface.
//!
//! The language model and the warehouse are replaced with scripted fakes;
//! everything between the HTTP boundary and those two seams is real:
//! extraction, validation, cost gating, formatting and error mapping.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use actix_web::{test, web, App};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use fhirlens_server::clients::{GenerationParams, TextModel, Warehouse};
use fhirlens_server::config::AppConfig;
use fhirlens_server::error::{AppError, AppResult, ErrorResponse};
use fhirlens_server::handlers::AppState;
use fhirlens_server::models::{
    AskResponse, ChartKind, ColumnInfo, DatasetsResponse, HealthResponse, QueryResult,
};
use fhirlens_server::pipeline::QueryProcessor;
use fhirlens_server::routes::configure_routes;
use fhirlens_server::schema::SchemaContext;

struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedModel {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
        })
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    async fn generate(
        &self,
        _system: Option<&str>,
        _prompt: &str,
        _params: GenerationParams,
    ) -> AppResult<String> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::ModelUnavailable("no scripted response".to_string()))
    }
}

struct QuotaModel;

#[async_trait]
impl TextModel for QuotaModel {
    async fn generate(
        &self,
        _system: Option<&str>,
        _prompt: &str,
        _params: GenerationParams,
    ) -> AppResult<String> {
        Err(AppError::ModelQuota("429 from provider".to_string()))
    }
}

struct FakeWarehouse {
    estimate_bytes: u64,
    columns: Vec<ColumnInfo>,
    rows: Vec<Map<String, Value>>,
    fail: bool,
    estimate_calls: AtomicUsize,
    run_calls: AtomicUsize,
}

impl FakeWarehouse {
    fn new(estimate_bytes: u64, columns: &[(&str, &str)], rows: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            estimate_bytes,
            columns: columns
                .iter()
                .map(|(name, column_type)| ColumnInfo {
                    name: name.to_string(),
                    column_type: column_type.to_string(),
                })
                .collect(),
            rows: rows
                .into_iter()
                .map(|row| row.as_object().cloned().unwrap())
                .collect(),
            fail: false,
            estimate_calls: AtomicUsize::new(0),
            run_calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            estimate_bytes: 0,
            columns: Vec::new(),
            rows: Vec::new(),
            fail: true,
            estimate_calls: AtomicUsize::new(0),
            run_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    async fn estimate_cost(&self, _sql: &str) -> AppResult<u64> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Execution("warehouse unreachable".to_string()));
        }
        Ok(self.estimate_bytes)
    }

    async fn run(&self, _sql: &str, _row_limit: u32) -> AppResult<QueryResult> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Execution("warehouse unreachable".to_string()));
        }
        Ok(QueryResult {
            columns: self.columns.clone(),
            rows: self.rows.clone(),
            bytes_scanned: 5_242_880,
            elapsed_ms: 42,
        })
    }
}

fn app_state(model: Arc<dyn TextModel>, warehouse: Arc<FakeWarehouse>) -> web::Data<AppState> {
    let config = Arc::new(AppConfig::default());
    let schema = Arc::new(SchemaContext::fhir_synthea(&config.gcp.dataset));
    let processor = Arc::new(QueryProcessor::new(
        model,
        warehouse.clone(),
        schema.clone(),
        config.clone(),
    ));
    web::Data::new(AppState {
        config,
        schema,
        processor,
        warehouse,
        start_time: SystemTime::now(),
    })
}

#[actix_rt::test]
async fn test_count_question_end_to_end() {
    let model = ScriptedModel::new(&[
        "```sql\nSELECT COUNT(*) FROM patient\n```",
        "There are 1,176,837 patients in the dataset.",
    ]);
    let warehouse = FakeWarehouse::new(
        1_048_576,
        &[("count", "INT64")],
        vec![json!({"count": 1176837})],
    );
    let state = app_state(model, warehouse.clone());

    let service =
        test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/ask")
        .set_json(json!({"question": "How many patients are there?"}))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), 200, "happy path should succeed");

    let body: AskResponse = test::read_body_json(resp).await;
    assert_eq!(body.sql, "SELECT COUNT(*) FROM patient");
    assert_eq!(body.answer_summary, "There are 1,176,837 patients in the dataset.");
    assert_eq!(body.row_count, 1);
    assert_eq!(body.rows[0]["count"], json!(1176837));
    assert_eq!(body.bytes_scanned, 5_242_880);

    // A single scalar gets a plain table, no chart
    let viz = body.visualization.expect("visualization expected");
    assert_eq!(viz.chart, ChartKind::Table);
    assert_eq!(viz.x_field, None);

    assert_eq!(warehouse.estimate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(warehouse.run_calls.load(Ordering::SeqCst), 1);
}

#[actix_rt::test]
async fn test_write_statement_is_rejected() {
    let model = ScriptedModel::new(&["```sql\nUPDATE patient SET gender = 'other'\n```"]);
    let warehouse = FakeWarehouse::new(1024, &[("count", "INT64")], vec![json!({"count": 1})]);
    let state = app_state(model, warehouse.clone());

    let service =
        test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/ask")
        .set_json(json!({"question": "Set everyone to other"}))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), 400, "writes must be rejected");

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "write_operation_rejected");
    assert!(!body.message.is_empty());

    // Rejected before any warehouse traffic
    assert_eq!(warehouse.estimate_calls.load(Ordering::SeqCst), 0);
    assert_eq!(warehouse.run_calls.load(Ordering::SeqCst), 0);
}

#[actix_rt::test]
async fn test_unknown_table_is_rejected() {
    let model = ScriptedModel::new(&["```sql\nSELECT * FROM audit_log\n```"]);
    let warehouse = FakeWarehouse::new(1024, &[("count", "INT64")], vec![json!({"count": 1})]);
    let state = app_state(model, warehouse.clone());

    let service =
        test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/ask")
        .set_json(json!({"question": "Show the audit log"}))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), 400);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "unknown_table");
    assert_eq!(warehouse.estimate_calls.load(Ordering::SeqCst), 0);
}

#[actix_rt::test]
async fn test_cost_above_ceiling_is_rejected() {
    let model = ScriptedModel::new(&["```sql\nSELECT * FROM observation\n```"]);
    // Default ceiling is 10 GiB, estimate 64 GiB
    let warehouse = FakeWarehouse::new(
        64 * 1024 * 1024 * 1024,
        &[("id", "STRING")],
        vec![json!({"id": "obs-1"})],
    );
    let state = app_state(model, warehouse.clone());

    let service =
        test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/ask")
        .set_json(json!({"question": "Show me every observation"}))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), 400);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "cost_limit_exceeded");
    assert_eq!(warehouse.estimate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(warehouse.run_calls.load(Ordering::SeqCst), 0);
}

#[actix_rt::test]
async fn test_model_quota_maps_to_429() {
    let warehouse = FakeWarehouse::new(1024, &[("count", "INT64")], vec![json!({"count": 1})]);
    let state = app_state(Arc::new(QuotaModel), warehouse);

    let service =
        test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/ask")
        .set_json(json!({"question": "How many patients are there?"}))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), 429);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "model_quota_exceeded");
}

#[actix_rt::test]
async fn test_time_series_selects_line_chart() {
    let model = ScriptedModel::new(&[
        "```sql\nSELECT period_start AS visit_date, COUNT(*) AS count FROM `bigquery-public-data.fhir_synthea.encounter` GROUP BY visit_date ORDER BY visit_date\n```",
        "Encounters rose steadily over the period.",
    ]);
    let warehouse = FakeWarehouse::new(
        2_097_152,
        &[("visit_date", "DATE"), ("count", "INT64")],
        vec![
            json!({"visit_date": "2019-01-01", "count": 110}),
            json!({"visit_date": "2019-02-01", "count": 132}),
        ],
    );
    let state = app_state(model, warehouse);

    let service =
        test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/ask")
        .set_json(json!({"question": "How did encounters trend by month?"}))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), 200);

    let body: AskResponse = test::read_body_json(resp).await;
    let viz = body.visualization.expect("visualization expected");
    assert_eq!(viz.chart, ChartKind::Line);
    assert_eq!(viz.x_field.as_deref(), Some("visit_date"));
    assert_eq!(viz.y_field.as_deref(), Some("count"));
}

#[actix_rt::test]
async fn test_category_breakdown_selects_bar_chart() {
    let model = ScriptedModel::new(&[
        "```sql\nSELECT code.text AS condition_name, COUNT(*) AS patient_count FROM `bigquery-public-data.fhir_synthea.condition` GROUP BY condition_name\n```",
        "Hypertension is the most common condition.",
    ]);
    let warehouse = FakeWarehouse::new(
        2_097_152,
        &[("condition_name", "STRING"), ("patient_count", "INTEGER")],
        vec![
            json!({"condition_name": "Hypertension", "patient_count": 431}),
            json!({"condition_name": "Diabetes", "patient_count": 220}),
        ],
    );
    let state = app_state(model, warehouse);

    let service =
        test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/ask")
        .set_json(json!({"question": "Which conditions are most common?"}))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), 200);

    let body: AskResponse = test::read_body_json(resp).await;
    let viz = body.visualization.expect("visualization expected");
    assert_eq!(viz.chart, ChartKind::Bar);
    assert_eq!(viz.x_field.as_deref(), Some("condition_name"));
    assert_eq!(viz.y_field.as_deref(), Some("patient_count"));
}

#[actix_rt::test]
async fn test_visualization_can_be_disabled() {
    let model = ScriptedModel::new(&[
        "```sql\nSELECT COUNT(*) FROM patient\n```",
        "There are 42 patients.",
    ]);
    let warehouse = FakeWarehouse::new(1024, &[("count", "INT64")], vec![json!({"count": 42})]);
    let state = app_state(model, warehouse);

    let service =
        test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/ask")
        .set_json(json!({
            "question": "How many patients are there?",
            "include_visualization": false
        }))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), 200);

    let body: AskResponse = test::read_body_json(resp).await;
    assert!(body.visualization.is_none());
}

#[actix_rt::test]
async fn test_empty_question_is_invalid() {
    let model = ScriptedModel::new(&[]);
    let warehouse = FakeWarehouse::new(1024, &[("count", "INT64")], vec![json!({"count": 1})]);
    let state = app_state(model, warehouse);

    let service =
        test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::post()
        .uri("/ask")
        .set_json(json!({"question": "   "}))
        .to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), 400);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "invalid_request");
}

#[actix_rt::test]
async fn test_health_reports_warehouse_connectivity() {
    let model = ScriptedModel::new(&[]);
    let warehouse = FakeWarehouse::new(1024, &[("count", "INT64")], vec![json!({"count": 1})]);
    let state = app_state(model, warehouse.clone());

    let service =
        test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), 200);

    let body: HealthResponse = test::read_body_json(resp).await;
    assert_eq!(body.status, "healthy");
    assert!(body.warehouse_connected);
    assert_eq!(warehouse.estimate_calls.load(Ordering::SeqCst), 1);
}

#[actix_rt::test]
async fn test_health_fails_when_warehouse_is_down() {
    let model = ScriptedModel::new(&[]);
    let state = app_state(model, FakeWarehouse::failing());

    let service =
        test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), 500);
}

#[actix_rt::test]
async fn test_datasets_lists_schema_tables() {
    let model = ScriptedModel::new(&[]);
    let warehouse = FakeWarehouse::new(1024, &[("count", "INT64")], vec![json!({"count": 1})]);
    let state = app_state(model, warehouse);

    let service =
        test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::get().uri("/datasets").to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), 200);

    let body: DatasetsResponse = test::read_body_json(resp).await;
    assert_eq!(body.dataset, "bigquery-public-data.fhir_synthea");
    assert_eq!(body.tables.len(), 8);
    assert!(body.tables.iter().any(|table| table.name == "patient"));
}

#[actix_rt::test]
async fn test_index_reports_service_info() {
    let model = ScriptedModel::new(&[]);
    let warehouse = FakeWarehouse::new(1024, &[("count", "INT64")], vec![json!({"count": 1})]);
    let state = app_state(model, warehouse);

    let service =
        test::init_service(App::new().app_data(state).configure(configure_routes)).await;

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), 200);
}
