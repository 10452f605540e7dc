use super::{banner, markdown_table, Context};
use sqlperf_helper::report::MarkdownReport;

pub const REPORT_FILE: &str = "database_info.md";

const DATABASES_SQL: &str = "
SELECT
    name,
    database_id,
    CONVERT(VARCHAR(19), create_date, 120) AS create_date,
    compatibility_level,
    state_desc,
    recovery_model_desc,
    collation_name
FROM sys.databases
ORDER BY name";

const VERSION_SQL: &str = "SELECT @@VERSION AS version";

const SERVER_PROPERTIES_SQL: &str = "
SELECT
    CAST(SERVERPROPERTY('ProductVersion') AS NVARCHAR(128)) AS product_version,
    CAST(SERVERPROPERTY('ProductLevel') AS NVARCHAR(128)) AS product_level,
    CAST(SERVERPROPERTY('Edition') AS NVARCHAR(128)) AS edition,
    CAST(SERVERPROPERTY('ServerName') AS NVARCHAR(128)) AS server_name";

const SIZES_SQL: &str = "
SELECT
    DB_NAME(database_id) AS database_name,
    CAST(SUM(size) * 8.0 / 1024 AS DECIMAL(10,2)) AS size_mb
FROM sys.master_files
WHERE DB_NAME(database_id) IS NOT NULL
GROUP BY database_id
ORDER BY SUM(size) DESC";

const SESSION_SQL: &str = "
SELECT
    session_id,
    login_name,
    host_name,
    program_name,
    CONVERT(VARCHAR(19), login_time, 120) AS login_time
FROM sys.dm_exec_sessions
WHERE session_id = @@SPID";

/// Server overview: databases, version, properties, sizes and the current session.
pub fn run(ctx: &Context) -> anyhow::Result<()> {
    banner("SQL Server information");

    let mut report = MarkdownReport::new("SQL Server information");
    report.meta("Connected database", ctx.database).rule();

    let databases = ctx.show("1. Databases", DATABASES_SQL, &[])?;
    report
        .heading(2, "1. Databases")
        .table(&markdown_table(&databases));

    let version = ctx.show("2. Version", VERSION_SQL, &[])?;
    report
        .heading(2, "2. Version")
        .code_block("text", version.first_value().unwrap_or("unknown"));

    let properties = ctx.show("3. Server properties", SERVER_PROPERTIES_SQL, &[])?;
    report.heading(2, "3. Server properties");
    for (index, column) in properties.columns.iter().enumerate() {
        let value = properties
            .rows
            .first()
            .and_then(|row| row.get(index))
            .and_then(|v| v.as_deref())
            .unwrap_or("NULL");
        report.bullet(&format!("{}: {}", column, value));
    }

    let sizes = ctx.show("4. Database sizes", SIZES_SQL, &[])?;
    report
        .heading(2, "4. Database sizes")
        .table(&markdown_table(&sizes));

    let session = ctx.show("5. Current session", SESSION_SQL, &[])?;
    report
        .heading(2, "5. Current session")
        .table(&markdown_table(&session));

    let path = report.write_to(ctx.output, REPORT_FILE)?;
    println!();
    println!("report saved: {}", path.display());
    Ok(())
}
