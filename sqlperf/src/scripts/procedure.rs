use super::{banner, markdown_table, section, Context};
use anyhow::Context as _;
use sqlperf_helper::executor::query::QueryResult;
use sqlperf_helper::executor::rounds::{RoundOptions, Rounds};
use sqlperf_helper::report::{format_ms, MarkdownReport, MarkdownTable};
use std::fs;

const DEFINITION_SQL: &str = "SELECT OBJECT_DEFINITION(OBJECT_ID(?)) AS definition";

const STATS_SQL: &str = "
SELECT
    OBJECT_NAME(d.object_id) AS procedure_name,
    CONVERT(VARCHAR(19), d.cached_time, 120) AS cached_time,
    CONVERT(VARCHAR(19), d.last_execution_time, 120) AS last_execution_time,
    d.execution_count,
    d.total_worker_time / 1000 AS total_cpu_ms,
    d.total_elapsed_time / 1000 AS total_elapsed_ms,
    d.total_logical_reads,
    d.total_logical_writes,
    CASE WHEN d.execution_count > 0
        THEN d.total_worker_time / d.execution_count / 1000
        ELSE 0
    END AS avg_cpu_ms,
    CASE WHEN d.execution_count > 0
        THEN d.total_elapsed_time / d.execution_count / 1000
        ELSE 0
    END AS avg_elapsed_ms,
    CASE WHEN d.execution_count > 0
        THEN d.total_logical_reads / d.execution_count
        ELSE 0
    END AS avg_logical_reads
FROM sys.dm_exec_procedure_stats d
WHERE d.database_id = DB_ID()
  AND OBJECT_NAME(d.object_id) = ?";

/// `dbo.usp_X` -> `usp_X`
pub fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name).trim_matches(&['[', ']'][..])
}

pub fn report_file(name: &str) -> String {
    format!("{}_performance.md", short_name(name))
}

pub fn definition_file(name: &str) -> String {
    format!("{}_definition.sql", short_name(name))
}

// NOCOUNT is inherited by the procedure, so its DML leaves no row-count results behind.
pub fn benchmark_sql(name: &str) -> String {
    format!("SET NOCOUNT ON;\nEXEC {};", name)
}

/// Definition, cached statistics and a timed benchmark of one stored procedure.
pub fn run(ctx: &Context, name: &str, options: RoundOptions) -> anyhow::Result<()> {
    banner(&format!("Stored procedure analysis: {}", name));

    section("1. Definition");
    let definition = ctx
        .conn
        .query(DEFINITION_SQL, &[name])
        .with_context(|| format!("read definition of {}", name))?;
    let Some(definition) = definition.first_value() else {
        println!("  [failed] procedure {} not found", name);
        return Ok(());
    };
    fs::create_dir_all(ctx.output)?;
    let definition_path = ctx.output.join(definition_file(name));
    fs::write(&definition_path, definition)
        .with_context(|| format!("write {}", definition_path.display()))?;
    println!(
        "  [ok] {} characters saved to {}",
        definition.chars().count(),
        definition_path.display()
    );

    let stats = ctx.show("2. Cached execution statistics", STATS_SQL, &[short_name(name)])?;
    if stats.is_empty() {
        println!("  no cached statistics, the procedure has not run since the plan was cached");
    }

    section(&format!("3. Benchmark, {} rounds", options.rounds));
    let sql = benchmark_sql(name);
    let rounds = Rounds::run(ctx.conn, &sql, options, |round, outcome| {
        if outcome.succeeded() {
            println!(
                "  round {}/{}: {}",
                round,
                options.rounds,
                format_ms(outcome.elapsed_ms())
            );
        } else {
            println!(
                "  round {}/{}: failed, {}",
                round,
                options.rounds,
                outcome.error_message().unwrap_or_default()
            );
        }
    });
    match rounds.average_ms() {
        Some(average) => println!("\n  average: {}", format_ms(average)),
        None => println!("\n  every round failed"),
    }

    let report = build_report(name, &definition_path.display().to_string(), &stats, &rounds);
    let path = report.write_to(ctx.output, &report_file(name))?;
    println!();
    println!("report saved: {}", path.display());
    Ok(())
}

fn build_report(
    name: &str,
    definition_path: &str,
    stats: &QueryResult,
    rounds: &Rounds,
) -> MarkdownReport {
    let mut report = MarkdownReport::new(format!("Stored procedure analysis: {}", name));
    report
        .meta("Procedure", name)
        .meta("Definition", format!("`{}`", definition_path))
        .rule();

    report.heading(2, "Cached execution statistics");
    if stats.is_empty() {
        report.paragraph("No entry in sys.dm_exec_procedure_stats.");
    } else {
        report.table(&markdown_table(stats));
    }

    let mut table = MarkdownTable::new(["Round", "Result", "Elapsed", "Rows"]);
    for (index, outcome) in rounds.outcomes().iter().enumerate() {
        let (result, rows) = match (outcome.succeeded(), outcome.row_count()) {
            (true, Some(rows)) => ("ok".to_string(), rows.to_string()),
            (true, None) => ("ok".to_string(), "-".to_string()),
            (false, _) => (
                format!("failed: {}", outcome.error_message().unwrap_or_default()),
                "-".to_string(),
            ),
        };
        table.row([
            (index + 1).to_string(),
            result,
            format_ms(outcome.elapsed_ms()),
            rows,
        ]);
    }
    report.heading(2, "Benchmark").table(&table);

    match (rounds.average_ms(), rounds.min_ms(), rounds.max_ms()) {
        (Some(average), Some(min), Some(max)) => {
            report
                .bullet(&format!(
                    "Successful rounds: {}/{}",
                    rounds.success_count(),
                    rounds.outcomes().len()
                ))
                .bullet(&format!("Average: **{}**", format_ms(average)))
                .bullet(&format!("Min: {}", format_ms(min)))
                .bullet(&format!("Max: {}", format_ms(max)));
        }
        _ => {
            report.paragraph("Every round failed.");
        }
    }
    report
}
