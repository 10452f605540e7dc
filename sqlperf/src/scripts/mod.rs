use crate::config::EnvConfig;
use anyhow::Context as _;
use sqlperf_helper::executor::database::ConnectionTrait;
use sqlperf_helper::executor::outcome::ExecutionOutcome;
use sqlperf_helper::executor::query::QueryResult;
use sqlperf_helper::report::{format_count, format_ms, MarkdownTable};
use sqlperf_helper::Print;
use std::path::Path;

pub mod cross_db;
pub mod db_info;
pub mod insert_analysis;
pub mod insert_perf;
pub mod procedure;

/// Everything a script needs: the open session, the loaded configuration and
/// where its report goes.
pub struct Context<'a> {
    pub conn: &'a dyn ConnectionTrait,
    pub config: &'a EnvConfig,
    pub database: &'a str,
    pub output: &'a Path,
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("database", &self.database)
            .field("output", &self.output)
            .finish()
    }
}

impl Context<'_> {
    /// Run a diagnostic query and echo its rows to stdout.
    pub fn show(&self, title: &str, sql: &str, params: &[&str]) -> anyhow::Result<QueryResult> {
        section(title);
        let result = self
            .conn
            .query(sql, params)
            .with_context(|| format!("query `{}`", title))?;
        if result.is_empty() {
            println!("  (no rows)");
        } else {
            result.clone().print_all_tables()?;
        }
        Ok(result)
    }
}

pub fn banner(title: &str) {
    println!("{}", "=".repeat(80));
    println!("{}", title);
    println!("{}", "=".repeat(80));
}

pub fn section(title: &str) {
    println!();
    println!("[{}]", title);
    println!("{}", "-".repeat(80));
}

pub fn print_outcome(label: &str, outcome: &ExecutionOutcome) {
    if outcome.succeeded() {
        println!("  [ok] {}", label);
        println!(
            "    elapsed: {} ({:.3} s)",
            format_ms(outcome.elapsed_ms()),
            outcome.elapsed_secs()
        );
        if let Some(rows) = outcome.row_count() {
            println!("    rows: {}", format_count(rows));
        }
    } else {
        println!("  [failed] {} after {}", label, format_ms(outcome.elapsed_ms()));
        println!("    error: {}", outcome.error_message().unwrap_or_default());
    }
}

/// Copy a query result into a report table, `NULL` for SQL NULL.
pub fn markdown_table(result: &QueryResult) -> MarkdownTable {
    let mut table = MarkdownTable::new(result.columns.iter().map(String::as_str));
    for row in &result.rows {
        table.row(row.iter().map(|v| v.as_deref().unwrap_or("NULL")));
    }
    table
}

pub fn rows_cell(outcome: &ExecutionOutcome) -> String {
    outcome
        .row_count()
        .map(format_count)
        .unwrap_or_else(|| "-".to_string())
}
