//! SQL extraction from raw model output.
//!
//! The model is prompted to answer with a single fenced ```sql block, but
//! responses drift: bare fences, prose around the statement, or no fence
//! at all. Extraction is pure text transformation; the result is handed
//! to validation untouched.

use regex::Regex;

use crate::error::{AppError, AppResult};

/// Table spellings the model produces that do not exist in the dataset.
const TABLE_NAME_FIXES: [(&str, &str); 9] = [
    ("Patient", "patient"),
    ("Observation", "observation"),
    ("Condition", "condition"),
    ("Procedure", "procedure"),
    ("MedicationRequest", "medication_request"),
    ("medicationRequest", "medication_request"),
    ("Encounter", "encounter"),
    ("Organization", "organization"),
    ("Practitioner", "practitioner"),
];

/// Pulls the SQL statement out of a raw model response.
///
/// The first fenced code block wins and its content is returned exactly
/// as written, trimmed. Without fences, the statement starts at the first
/// line beginning with SELECT or WITH and runs to the statement's
/// semicolon, or the end of the text.
pub fn extract_sql(raw: &str) -> AppResult<String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(AppError::Extraction(
            "Model response was empty".to_string(),
        ));
    }

    let sql_fence = Regex::new(r"(?is)```sql\s*(.*?)```").unwrap();
    let any_fence = Regex::new(r"(?s)```(.*?)```").unwrap();

    let fenced = sql_fence
        .captures(text)
        .or_else(|| any_fence.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim());

    let statement = match fenced {
        Some(block) => block.to_string(),
        None => unfenced_statement(text)?,
    };

    if statement.is_empty() {
        return Err(AppError::Extraction(
            "Model response contained no SQL statement".to_string(),
        ));
    }
    Ok(statement)
}

/// Fallback for responses without code fences: find the first line that
/// starts a statement, drop anything after its terminating semicolon.
fn unfenced_statement(text: &str) -> AppResult<String> {
    let prefix = Regex::new(r"(?i)^(SQL\s*Query:|Query:|SQL:)\s*").unwrap();

    let mut lines = text.lines();
    let first = lines.by_ref().find_map(|line| {
        let candidate = prefix.replace(line.trim_start(), "");
        let upper = candidate.to_uppercase();
        if upper.starts_with("SELECT") || upper.starts_with("WITH") {
            Some(candidate.into_owned())
        } else {
            None
        }
    });

    let first = first.ok_or_else(|| {
        AppError::Extraction("Model response contained no SQL statement".to_string())
    })?;

    let mut statement = first;
    for line in lines {
        statement.push('\n');
        statement.push_str(line);
    }
    let statement = match statement.find(';') {
        Some(pos) => &statement[..=pos],
        None => statement.as_str(),
    };
    Ok(statement.trim().to_string())
}

/// Rewrites qualified table references that use the FHIR resource spelling
/// (`fhir_synthea.Patient`) into the dataset's snake_case table names. Bare
/// references are left alone.
pub fn normalize_table_names(sql: &str) -> String {
    let mut fixed = sql.to_string();
    for (incorrect, correct) in &TABLE_NAME_FIXES {
        let backticked =
            Regex::new(&format!(r"`([^`]*\.){}`", regex::escape(incorrect))).unwrap();
        fixed = backticked
            .replace_all(&fixed, format!("`${{1}}{}`", correct))
            .into_owned();

        let dotted = Regex::new(&format!(
            r"([^`\s]*\.){}([\s,;]|$)",
            regex::escape(incorrect)
        ))
        .unwrap();
        fixed = dotted
            .replace_all(&fixed, format!("${{1}}{}${{2}}", correct))
            .into_owned();
    }
    fixed
}
