//! Read-only SQL validation.
//!
//! Generated statements are untrusted input: the model can hallucinate
//! tables, emit DML, or chain statements. Validation layers several
//! complementary techniques before anything reaches the warehouse:
//!
//! 1. **AST parsing**: full statement parsing with the BigQuery dialect;
//!    anything that does not parse as a single SELECT is rejected.
//! 2. **Recursive body validation**: subqueries, joins, CTEs and set
//!    operations are walked so a write cannot hide inside a read.
//! 3. **Table allow-listing**: every referenced table must belong to the
//!    configured dataset's published table set. References are collected
//!    with the parser's generic AST visitor, so a subquery cannot smuggle
//!    a table in from an expression position (function arguments, CASE
//!    arms, ORDER BY and the like).
//! 4. **Keyword scanning**: a final word-boundary sweep for dangerous
//!    keywords, in case a parser gap lets one through.
//!
//! Ambiguous statements are rejected rather than allowed. The cost gate
//! (dry-run bytes against the configured ceiling) runs in the orchestrator
//! after these checks pass, so a rejected write never costs an estimate.

use std::collections::HashSet;
use std::ops::ControlFlow;

use sqlparser::ast::{Expr, ObjectName, Query, SetExpr, Statement, TableFactor, Visit, Visitor};
use sqlparser::dialect::BigQueryDialect;
use sqlparser::parser::Parser;

use crate::error::{AppError, AppResult};
use crate::schema::SchemaContext;

/// On-demand pricing, USD per TiB scanned.
const USD_PER_TIB: f64 = 5.0;

const DANGEROUS_KEYWORDS: [&str; 14] = [
    "DROP",
    "DELETE",
    "UPDATE",
    "INSERT",
    "CREATE",
    "ALTER",
    "TRUNCATE",
    "EXEC",
    "EXECUTE",
    "MERGE",
    "CALL",
    "COPY",
    "GRANT",
    "REVOKE",
];

/// Converts a dry-run byte count into an on-demand dollar estimate.
pub fn estimated_cost_usd(bytes: u64) -> f64 {
    bytes as f64 / (1024f64 * 1024.0 * 1024.0 * 1024.0) * USD_PER_TIB
}

/// Validates generated SQL against the read-only and allow-list rules.
pub struct SqlGuard {
    dataset: String,
    allowed_tables: Vec<String>,
}

impl SqlGuard {
    pub fn new(schema: &SchemaContext) -> Self {
        Self {
            dataset: schema.dataset.clone(),
            allowed_tables: schema.table_names(),
        }
    }

    /// Checks that a statement is a single read-only SELECT touching only
    /// allowed tables. Write checks run before table checks so a
    /// `DROP TABLE nonsense` reports the write, not the unknown table.
    pub fn check(&self, sql: &str) -> AppResult<()> {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return Err(AppError::WriteOperationRejected(
                "The generated statement was empty".to_string(),
            ));
        }

        // Fast pre-parse check for chained statements
        if trimmed.trim_end_matches(';').contains(';') {
            return Err(AppError::WriteOperationRejected(
                "Multiple SQL statements are not allowed".to_string(),
            ));
        }

        let dialect = BigQueryDialect {};
        let statements = Parser::parse_sql(&dialect, trimmed).map_err(|e| {
            AppError::WriteOperationRejected(format!(
                "The generated statement could not be verified as read-only: {}",
                e
            ))
        })?;

        if statements.is_empty() {
            return Err(AppError::WriteOperationRejected(
                "The generated statement was empty".to_string(),
            ));
        }
        if statements.len() > 1 {
            return Err(AppError::WriteOperationRejected(
                "Multiple SQL statements are not allowed".to_string(),
            ));
        }

        let query = match &statements[0] {
            Statement::Query(query) => query,
            _ => {
                return Err(AppError::WriteOperationRejected(
                    "Only read-only SELECT queries are allowed".to_string(),
                ))
            }
        };
        self.validate_query_body(&query.body)?;

        // Final dangerous keyword sweep
        for keyword in &DANGEROUS_KEYWORDS {
            if !is_safe_context(trimmed, keyword) {
                return Err(AppError::WriteOperationRejected(format!(
                    "Use of '{}' is not allowed in queries",
                    keyword
                )));
            }
        }

        self.check_table_references(query)?;

        Ok(())
    }

    /// Recursively validates the query body (subqueries, joins, set ops).
    fn validate_query_body(&self, set_expr: &SetExpr) -> AppResult<()> {
        match set_expr {
            SetExpr::Select(select) => {
                for table_with_joins in &select.from {
                    self.validate_table_factor(&table_with_joins.relation)?;
                    for join in &table_with_joins.joins {
                        self.validate_table_factor(&join.relation)?;
                    }
                }
                if let Some(where_clause) = &select.selection {
                    self.validate_expr(where_clause)?;
                }
            }
            SetExpr::Query(query) => {
                self.validate_query_body(&query.body)?;
            }
            SetExpr::SetOperation { left, right, .. } => {
                self.validate_query_body(left)?;
                self.validate_query_body(right)?;
            }
            _ => {
                return Err(AppError::WriteOperationRejected(
                    "Only read-only SELECT queries are allowed".to_string(),
                ))
            }
        }
        Ok(())
    }

    fn validate_table_factor(&self, table_factor: &TableFactor) -> AppResult<()> {
        match table_factor {
            TableFactor::Table { .. } => {}
            TableFactor::Derived { subquery, .. } => {
                self.validate_query_body(&subquery.body)?;
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => {
                self.validate_table_factor(&table_with_joins.relation)?;
                for join in &table_with_joins.joins {
                    self.validate_table_factor(&join.relation)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Validates expressions that can carry subqueries (WHERE, IN, EXISTS).
    fn validate_expr(&self, expr: &Expr) -> AppResult<()> {
        match expr {
            Expr::Subquery(subquery) => {
                self.validate_query_body(&subquery.body)?;
            }
            Expr::InSubquery { subquery, .. } => {
                self.validate_query_body(&subquery.body)?;
            }
            Expr::Exists { subquery, .. } => {
                self.validate_query_body(&subquery.body)?;
            }
            Expr::BinaryOp { left, right, .. } => {
                self.validate_expr(left)?;
                self.validate_expr(right)?;
            }
            Expr::UnaryOp { expr, .. } => {
                self.validate_expr(expr)?;
            }
            Expr::Nested(inner) => {
                self.validate_expr(inner)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Checks every referenced table against the allow-list. CTE names
    /// introduced by the statement itself are legitimate references.
    fn check_table_references(&self, query: &Query) -> AppResult<()> {
        let mut collector = RelationCollector::default();
        let _ = query.visit(&mut collector);

        for parts in &collector.tables {
            self.check_reference(parts, &collector.local_names)?;
        }
        Ok(())
    }

    /// A reference is either a bare table name checked against the
    /// allow-list, or a qualified `project.dataset.table` path whose
    /// prefix must match the configured dataset.
    fn check_reference(&self, parts: &[String], local_names: &HashSet<String>) -> AppResult<()> {
        let (table, prefix) = match parts.split_last() {
            Some((table, prefix)) => (table, prefix),
            None => return Ok(()),
        };
        let table_lower = table.to_lowercase();

        if prefix.is_empty() {
            if local_names.contains(&table_lower) {
                return Ok(());
            }
            if !self
                .allowed_tables
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(table))
            {
                return Err(AppError::UnknownTableRejected(format!(
                    "Table '{}' is not part of the {} dataset",
                    table, self.dataset
                )));
            }
            return Ok(());
        }

        let qualifier = prefix.join(".");
        let dataset_id = self
            .dataset
            .rsplit_once('.')
            .map(|(_, id)| id)
            .unwrap_or(&self.dataset);
        let qualifier_ok = qualifier.eq_ignore_ascii_case(&self.dataset)
            || qualifier.eq_ignore_ascii_case(dataset_id);
        if !qualifier_ok {
            return Err(AppError::UnknownTableRejected(format!(
                "Table '{}.{}' is outside the {} dataset",
                qualifier, table, self.dataset
            )));
        }
        if !self
            .allowed_tables
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&table_lower))
        {
            return Err(AppError::UnknownTableRejected(format!(
                "Table '{}' is not part of the {} dataset",
                table, self.dataset
            )));
        }
        Ok(())
    }
}

/// Collects every table reference in a statement via the parser's AST
/// visitor. The visitor reaches relations anywhere in the tree, including
/// subqueries buried in function arguments, CASE arms, IN lists and
/// ORDER BY expressions. CTE alias names land in `local_names` so
/// references to them resolve locally instead of against the allow-list.
#[derive(Default)]
struct RelationCollector {
    tables: Vec<Vec<String>>,
    local_names: HashSet<String>,
}

impl Visitor for RelationCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<()> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.local_names.insert(cte.alias.name.value.to_lowercase());
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<()> {
        // Backtick-quoted BigQuery paths keep their dots inside a
        // single identifier, so split every part again.
        let parts: Vec<String> = relation
            .0
            .iter()
            .flat_map(|ident| ident.value.split('.'))
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect();
        if !parts.is_empty() {
            self.tables.push(parts);
        }
        ControlFlow::Continue(())
    }
}

/// Checks whether a keyword appears only in a safe context, e.g. inside
/// an identifier like `created_at` rather than as a statement keyword.
fn is_safe_context(query: &str, keyword: &str) -> bool {
    let query_upper = query.to_uppercase();
    let keyword_pattern =
        regex::Regex::new(&format!(r"\b{}\b", regex::escape(keyword))).unwrap();
    !keyword_pattern.is_match(&query_upper)
}
