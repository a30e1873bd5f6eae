//! Chart selection from result column shapes.
//!
//! The heuristic is deterministic and order-sensitive: time series beats
//! bar, bar beats scatter, anything else falls back to a plain table.
//! Ties are broken by column declaration order in the result schema. The
//! spec carries field references only; callers render from the response
//! rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::models::{ChartKind, ChartOptions, ColumnInfo, QueryResult, VisualizationSpec};

/// Column names that mark STRING columns as temporal. FHIR Synthea keeps
/// most dates as STRING, so the declared type alone is not enough.
const TEMPORAL_NAME_HINTS: [&str; 5] = ["date", "time", "created", "updated", "birth"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Temporal,
    Numeric,
    Categorical,
    Other,
}

/// Proposes a chart for a query result, or `None` when there are no rows.
pub fn select_visualization(result: &QueryResult) -> Option<VisualizationSpec> {
    if result.rows.is_empty() {
        return None;
    }

    let mut temporal = Vec::new();
    let mut numeric = Vec::new();
    let mut categorical = Vec::new();
    for column in &result.columns {
        match classify_column(column, &result.rows) {
            ColumnKind::Temporal => temporal.push(column.name.as_str()),
            ColumnKind::Numeric => numeric.push(column.name.as_str()),
            ColumnKind::Categorical => categorical.push(column.name.as_str()),
            ColumnKind::Other => {}
        }
    }

    let spec = if let (Some(x), Some(y)) = (temporal.first(), numeric.first()) {
        VisualizationSpec {
            chart: ChartKind::Line,
            x_field: Some(x.to_string()),
            y_field: Some(y.to_string()),
            options: ChartOptions {
                title: Some(format!("Trend Analysis: {} over Time", y)),
                x_title: Some(title_case(x)),
                y_title: Some(title_case(y)),
            },
        }
    } else if categorical.len() == 1 && !numeric.is_empty() {
        let x = categorical[0];
        let y = numeric[0];
        VisualizationSpec {
            chart: ChartKind::Bar,
            x_field: Some(x.to_string()),
            y_field: Some(y.to_string()),
            options: ChartOptions {
                title: Some(format!("Distribution: {} by {}", y, x)),
                x_title: Some(title_case(x)),
                y_title: Some(title_case(y)),
            },
        }
    } else if numeric.len() >= 2 && categorical.is_empty() && temporal.is_empty() {
        let x = numeric[0];
        let y = numeric[1];
        VisualizationSpec {
            chart: ChartKind::Scatter,
            x_field: Some(x.to_string()),
            y_field: Some(y.to_string()),
            options: ChartOptions {
                title: Some(format!("Correlation: {} vs {}", x, y)),
                x_title: Some(title_case(x)),
                y_title: Some(title_case(y)),
            },
        }
    } else {
        VisualizationSpec {
            chart: ChartKind::Table,
            x_field: None,
            y_field: None,
            options: ChartOptions {
                title: Some("Query Results".to_string()),
                x_title: None,
                y_title: None,
            },
        }
    };

    Some(spec)
}

fn classify_column(column: &ColumnInfo, rows: &[Map<String, Value>]) -> ColumnKind {
    match column.column_type.to_uppercase().as_str() {
        "DATE" | "DATETIME" | "TIMESTAMP" | "TIME" => ColumnKind::Temporal,
        "INTEGER" | "INT64" | "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => {
            ColumnKind::Numeric
        }
        "BOOLEAN" | "BOOL" => ColumnKind::Categorical,
        "STRING" => {
            let name_lower = column.name.to_lowercase();
            if TEMPORAL_NAME_HINTS
                .iter()
                .any(|hint| name_lower.contains(hint))
            {
                return ColumnKind::Temporal;
            }
            if first_value(rows, &column.name)
                .and_then(Value::as_str)
                .map(looks_like_date)
                .unwrap_or(false)
            {
                return ColumnKind::Temporal;
            }
            ColumnKind::Categorical
        }
        _ => ColumnKind::Other,
    }
}

fn first_value<'a>(rows: &'a [Map<String, Value>], name: &str) -> Option<&'a Value> {
    rows.iter()
        .find_map(|row| row.get(name).filter(|value| !value.is_null()))
}

fn looks_like_date(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
}

/// "visit_date" -> "Visit Date"
fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
