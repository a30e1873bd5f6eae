//! Prompt templates for SQL generation and result summarization.

use crate::schema::SchemaContext;
use serde_json::{Map, Value};

/// System role for both model calls
pub const ANALYST_SYSTEM_PROMPT: &str =
    "You are a healthcare data analyst expert working with the FHIR Synthea dataset on BigQuery.";

/// Fixed fallback when summary generation fails
pub const SUMMARY_FALLBACK: &str = "Unable to generate summary at this time.";

/// Number of result rows shown to the summary model
pub const SUMMARY_SAMPLE_ROWS: usize = 5;

/// Prompt asking the model to translate a question into BigQuery SQL
pub fn sql_generation_prompt(question: &str, schema: &SchemaContext) -> String {
    format!(
        r#"Convert the following natural language question into a BigQuery SQL query.

Available dataset: {dataset}

Tables, their purposes, and their columns (use EXACT table names as shown):
{schema_block}
Table name requirements:
- Use exact lowercase table names: patient, observation, condition, procedure, medication_request, encounter, organization, practitioner
- Do NOT use PascalCase (MedicationRequest) or camelCase (medicationRequest)

Data type notes:
- Date fields in this dataset are stored as STRING, not DATE
- When using EXTRACT() on a date field, first convert it with PARSE_DATE('%Y-%m-%d', field)
- For date comparisons, use PARSE_DATE('%Y-%m-%d', field) >= DATE('2020-01-01')

Guidelines:
1. Use proper BigQuery SQL syntax
2. Always include a LIMIT clause (use LIMIT 1000 if the question does not specify one)
3. Use appropriate JOINs when needed
4. Use descriptive column aliases
5. Return ONLY the SQL query itself, no explanations or additional text
6. Ensure there is only ONE LIMIT clause in the entire query

Natural language question: {question}

SQL Query:
"#,
        dataset = schema.dataset,
        schema_block = schema.prompt_block(),
        question = question,
    )
}

/// Prompt asking the model to summarize query results in plain language
pub fn summary_prompt(
    question: &str,
    sql: &str,
    rows: &[Map<String, Value>],
    row_count: usize,
) -> String {
    let sample: Vec<&Map<String, Value>> = rows.iter().take(SUMMARY_SAMPLE_ROWS).collect();
    let sample_json = serde_json::to_string(&sample).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"Provide a clear, concise summary of the query results.

Original question: {question}
SQL query used: {sql}
Number of results: {row_count}

Sample data:
{sample_json}

Provide a 2-3 sentence summary that:
1. Answers the original question
2. Highlights key findings or patterns
3. Uses healthcare terminology appropriately

Summary:
"#,
    )
}
