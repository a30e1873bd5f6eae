use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request body for the synchronous jobs.query endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,

    pub use_legacy_sql: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_dataset: Option<DatasetReference>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            use_legacy_sql: false,
            dry_run: None,
            max_results: None,
            timeout_ms: None,
            default_dataset: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    pub project_id: String,
    pub dataset_id: String,
}

/// One field of a result schema
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableFieldSchema {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<TableFieldSchema>,
}

/// A result cell; BigQuery encodes every scalar as a JSON string
#[derive(Debug, Clone, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub v: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub f: Vec<TableCell>,
}

/// Response body of jobs.query (both live and dry-run forms)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub schema: Option<TableSchema>,

    #[serde(default)]
    pub rows: Vec<TableRow>,

    #[serde(default)]
    pub total_rows: Option<String>,

    #[serde(default)]
    pub total_bytes_processed: Option<String>,

    #[serde(default)]
    pub job_complete: Option<bool>,

    #[serde(default)]
    pub cache_hit: Option<bool>,
}

impl QueryResponse {
    /// Bytes the query processed (or would process, for a dry run)
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes_processed
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    /// Decode `rows[].f[].v` into name-keyed maps, coercing cells by schema type.
    ///
    /// Cells that fail to parse keep their raw string form.
    pub fn typed_rows(&self) -> Vec<Map<String, Value>> {
        let fields = match &self.schema {
            Some(schema) => &schema.fields,
            None => return Vec::new(),
        };

        self.rows
            .iter()
            .map(|row| {
                let mut record = Map::new();
                for (field, cell) in fields.iter().zip(row.f.iter()) {
                    record.insert(field.name.clone(), coerce_cell(&field.field_type, &cell.v));
                }
                record
            })
            .collect()
    }
}

fn coerce_cell(field_type: &str, v: &Value) -> Value {
    let raw = match v {
        Value::Null => return Value::Null,
        Value::String(s) => s.as_str(),
        other => return other.clone(),
    };

    match field_type.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT64" => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => raw
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        "BOOLEAN" | "BOOL" => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}

/// Error response structure
#[derive(Debug, Clone, Deserialize)]
pub struct BigQueryError {
    pub code: u16,
    pub message: String,

    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BigQueryErrorResponse {
    pub error: BigQueryError,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> QueryResponse {
        serde_json::from_str(
            r#"{
                "schema": {"fields": [
                    {"name": "count", "type": "INTEGER"},
                    {"name": "city", "type": "STRING"},
                    {"name": "rate", "type": "FLOAT"}
                ]},
                "rows": [
                    {"f": [{"v": "1176837"}, {"v": "Boston"}, {"v": "0.25"}]},
                    {"f": [{"v": "42"}, {"v": null}, {"v": "1.5"}]}
                ],
                "totalRows": "2",
                "totalBytesProcessed": "65536",
                "jobComplete": true
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_typed_rows_coerces_scalars() {
        let rows = sample_response().typed_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["count"], serde_json::json!(1176837));
        assert_eq!(rows[0]["city"], serde_json::json!("Boston"));
        assert_eq!(rows[0]["rate"], serde_json::json!(0.25));
        assert_eq!(rows[1]["city"], Value::Null);
    }

    #[test]
    fn test_total_bytes_parses_string() {
        assert_eq!(sample_response().total_bytes(), 65536);
    }

    #[test]
    fn test_unparseable_cell_keeps_raw_string() {
        assert_eq!(
            coerce_cell("INTEGER", &Value::String("NaN".to_string())),
            Value::String("NaN".to_string())
        );
    }

    #[test]
    fn test_dry_run_response_has_no_rows() {
        let response: QueryResponse = serde_json::from_str(
            r#"{"totalBytesProcessed": "12582912", "jobComplete": true}"#,
        )
        .unwrap();
        assert_eq!(response.total_bytes(), 12582912);
        assert!(response.typed_rows().is_empty());
    }
}
