use super::{banner, section, Context};
use sqlperf_helper::executor::database::ConnectionTrait;
use sqlperf_helper::executor::query::QueryResult;
use sqlperf_helper::extension::compare::share;
use sqlperf_helper::report::{format_count, MarkdownReport, MarkdownTable};

pub const REPORT_FILE: &str = "insert_production_details_analysis.md";

const PRODUCTION_COUNT_SQL: &str = "
SELECT COUNT(*) AS row_count
FROM [logistics-test].dbo.[ProductDetailsDino-mt] mt WITH (NOLOCK)
INNER JOIN dbo.Stations WITH (NOLOCK)
    ON Stations.StationID_ProductionSys = mt.SiteId AND Stations.isDeleted = 0
INNER JOIN ProductionDailyReports r WITH (NOLOCK)
    ON r.StationID = Stations.ID
       AND r.isDeleted = 0
       AND r.ReportDate = @ReportDate
LEFT JOIN dbo.ProductCategories pc WITH (NOLOCK)
    ON pc.CategoryName = ISNULL(mt.ConcreteCategory, @DefaultProductCategory)
WHERE mt.TenantId = @TenantID
  AND mt.SiteDate >= @ReportDate
  AND mt.SiteDate < DATEADD(DAY, 1, @ReportDate)";

const WEIGHBRIDGE_COUNT_SQL: &str = "
SELECT COUNT(*) AS row_count
FROM [Weighbridge].dbo.Shipping Shipping WITH (NOLOCK)
LEFT JOIN [Weighbridge].dbo.Delivering Delivering WITH (NOLOCK)
    ON Shipping.DeliveringID = Delivering.ID
LEFT JOIN [logistics-test].dbo.UserPlans up WITH (NOLOCK)
    ON Delivering.UserPlanID = up.id
LEFT JOIN [logistics-test].dbo.Plans p WITH (NOLOCK)
    ON up.PlanId = p.id
LEFT JOIN dbo.Project WITH (NOLOCK)
    ON Shipping.ProjectID = Project.ID
INNER JOIN dbo.Stations WITH (NOLOCK)
    ON Stations.StationID_WeighbridgeSys = Shipping.StationID
       AND Stations.isDeleted = 0
INNER JOIN ProductionDailyReports r WITH (NOLOCK)
    ON r.StationID = Stations.ID
       AND r.isDeleted = 0
       AND r.ReportDate = @ReportDate
WHERE Shipping.isDeleted = 0
  AND Delivering.GrossTime >= DATEADD(HOUR, @DefaultFinancialTime, @ReportDate)
  AND Delivering.GrossTime < DATEADD(DAY, 1, DATEADD(HOUR, @DefaultFinancialTime, @ReportDate))
  AND Delivering.isDeleted = 0";

const INDEX_SQL: &str = "
SELECT
    i.name AS index_name,
    STRING_AGG(c.name, ', ') WITHIN GROUP (ORDER BY ic.key_ordinal) AS columns,
    i.type_desc AS index_type
FROM sys.indexes i
INNER JOIN sys.index_columns ic ON i.object_id = ic.object_id AND i.index_id = ic.index_id
INNER JOIN sys.columns c ON ic.object_id = c.object_id AND ic.column_id = c.column_id
WHERE i.object_id = OBJECT_ID(?)
  AND i.index_id > 0
GROUP BY i.name, i.type_desc, i.index_id
ORDER BY i.index_id";

/// Tables joined by the INSERT and the columns their joins filter on.
pub const CHECKED_TABLES: [(&str, &[&str]); 4] = [
    (
        "dbo.Stations",
        &["StationID_ProductionSys", "StationID_WeighbridgeSys", "isDeleted"],
    ),
    ("dbo.ProductionDailyReports", &["StationID", "ReportDate", "isDeleted"]),
    ("dbo.ProductCategories", &["CategoryName"]),
    ("dbo.Project", &["ID", "SalesDepartment"]),
];

const FINDINGS: [(&str, &str); 7] = [
    (
        "Cross-database joins",
        "[logistics-test] and [Weighbridge] are joined from Statistics-CT-test; remote rows cannot use local plans and the INSERT needs a distributed transaction",
    ),
    (
        "NOLOCK in an INSERT source",
        "dirty and phantom reads can be copied into the report table",
    ),
    (
        "Repeated CASE expressions",
        "`CASE WHEN ISNULL(pc.Unit, @DefaultUnit) = '吨'` appears more than 30 times per row",
    ),
    (
        "Nested CASE expressions",
        "ScaleDiff and LossQty nest up to five levels",
    ),
    (
        "String concatenation",
        "ProductionRemarks concatenates update logs and remarks for every row",
    ),
    (
        "Functions in WHERE",
        "DATEADD(DAY, 1, @ReportDate) is evaluated per comparison",
    ),
    (
        "LEFT JOIN on ProductCategories",
        "an INNER JOIN is possible when pc.Unit is always required",
    ),
];

const RECOMMENDED_INDEXES: &str = "
CREATE NONCLUSTERED INDEX IX_ProductionDailyReports_Station_Date
ON dbo.ProductionDailyReports(StationID, ReportDate, isDeleted)
WITH (ONLINE = ON);

CREATE NONCLUSTERED INDEX IX_Stations_ProductionSys
ON dbo.Stations(StationID_ProductionSys, isDeleted)
INCLUDE (ID, Type)
WITH (ONLINE = ON);

CREATE NONCLUSTERED INDEX IX_Stations_WeighbridgeSys
ON dbo.Stations(StationID_WeighbridgeSys, isDeleted)
INCLUDE (ID, Type)
WITH (ONLINE = ON);

CREATE NONCLUSTERED INDEX IX_ProductCategories_CategoryName
ON dbo.ProductCategories(CategoryName)
INCLUDE (Unit)
WITH (ONLINE = ON);

CREATE NONCLUSTERED INDEX IX_Project_ID
ON dbo.Project(ID)
INCLUDE (SalesDepartment, Salesman, SalesPaymentType)
WITH (ONLINE = ON);";

#[derive(Debug)]
struct IndexCheck {
    table: &'static str,
    indexes: Result<QueryResult, String>,
    uncovered: Vec<&'static str>,
}

/// Counts what the INSERT would write, lists its known problems and checks
/// the indexes of the joined tables.
pub fn run(ctx: &Context) -> anyhow::Result<()> {
    banner("ProductionDailyReportDetails INSERT analysis");

    let params = ctx.config.insert.to_params();
    println!("test parameters:");
    for (name, value) in params.iter() {
        println!("  @{} = {}", name, value);
    }

    section("Part 1: production data");
    let part1 = count_rows(ctx.conn, &params.substitute(PRODUCTION_COUNT_SQL));
    section("Part 2: weighbridge data");
    let part2 = count_rows(ctx.conn, &params.substitute(WEIGHBRIDGE_COUNT_SQL));
    let total = part1 + part2;
    println!();
    println!("  expected rows to insert: {}", format_count(total));

    section("Findings");
    for (index, (title, detail)) in FINDINGS.iter().enumerate() {
        println!("  {}. {}: {}", index + 1, title, detail);
    }

    section("Index check");
    let checks: Vec<IndexCheck> = CHECKED_TABLES
        .iter()
        .map(|&(table, columns)| check_indexes(ctx, table, columns))
        .collect();

    let report = build_report(ctx.database, part1, part2, &checks);
    let path = report.write_to(ctx.output, REPORT_FILE)?;
    println!();
    println!("report saved: {}", path.display());
    Ok(())
}

// A failed count is reported and counted as 0 so the analysis goes on.
fn count_rows(conn: &dyn ConnectionTrait, sql: &str) -> usize {
    let counted = conn
        .query(sql, &[])
        .map(|result| result.first_value().and_then(|v| v.trim().parse::<usize>().ok()));
    match counted {
        Ok(Some(rows)) => {
            println!("  [ok] {} rows", format_count(rows));
            rows
        }
        Ok(None) => {
            warn!("count returned no value: {}", sql.trim());
            println!("  [warn] count returned no value");
            0
        }
        Err(e) => {
            warn!("count failed: {}", e);
            println!("  [warn] count failed: {}", e);
            0
        }
    }
}

fn check_indexes(ctx: &Context, table: &'static str, columns: &[&'static str]) -> IndexCheck {
    println!();
    println!("  table: {}", table);
    let indexes = ctx.conn.query(INDEX_SQL, &[table]).map_err(|e| e.to_string());
    let uncovered = match &indexes {
        Ok(result) if result.is_empty() => {
            println!("    [warn] no index found");
            columns.to_vec()
        }
        Ok(result) => {
            for row in 0..result.rows.len() {
                println!(
                    "    [ok] {}: [{}] ({})",
                    result.value(row, "index_name").unwrap_or("?"),
                    result.value(row, "columns").unwrap_or(""),
                    result.value(row, "index_type").unwrap_or("")
                );
            }
            uncovered_columns(columns, result)
        }
        Err(e) => {
            println!("    [warn] could not read indexes: {}", e);
            vec![]
        }
    };
    if !uncovered.is_empty() {
        println!("    not in any index: {}", uncovered.join(", "));
    }
    IndexCheck {
        table,
        indexes,
        uncovered,
    }
}

/// Columns of `expected` that no index of the table contains.
pub fn uncovered_columns(expected: &[&'static str], indexes: &QueryResult) -> Vec<&'static str> {
    let indexed: Vec<String> = (0..indexes.rows.len())
        .filter_map(|row| indexes.value(row, "columns"))
        .flat_map(|columns| columns.split(','))
        .map(|column| column.trim().to_ascii_lowercase())
        .collect();
    expected
        .iter()
        .filter(|column| !indexed.contains(&column.to_ascii_lowercase()))
        .copied()
        .collect()
}

fn build_report(database: &str, part1: usize, part2: usize, checks: &[IndexCheck]) -> MarkdownReport {
    let total = part1 + part2;
    let mut report = MarkdownReport::new("ProductionDailyReportDetails INSERT analysis");
    report
        .meta("Database", database)
        .meta("Databases involved", "logistics-test, Weighbridge, Statistics-CT-test")
        .meta(
            "Expected rows",
            format!(
                "{} (part 1: {}, part 2: {})",
                format_count(total),
                format_count(part1),
                format_count(part2)
            ),
        )
        .rule();

    report
        .heading(2, "Statement structure")
        .code_block(
            "text",
            "INSERT INTO dbo.ProductionDailyReportDetails (...70+ columns...)\nSELECT ... (part 1: production data from logistics-test)\nUNION\nSELECT ... (part 2: weighbridge data from Weighbridge)",
        );

    let mut volume = MarkdownTable::new(["Source", "Rows", "Share"]);
    volume
        .row([
            "Production data".to_string(),
            format_count(part1),
            format!("{:.1}%", share(part1 as f64, total as f64)),
        ])
        .row([
            "Weighbridge data".to_string(),
            format_count(part2),
            format!("{:.1}%", share(part2 as f64, total as f64)),
        ]);
    report.heading(2, "Data volume").table(&volume);
    if total > 0 {
        report.paragraph(&format!(
            "The repeated CASE expression alone is evaluated about {} times.",
            format_count(total * 30)
        ));
    }

    report.heading(2, "Findings");
    for (title, detail) in FINDINGS {
        report.bullet(&format!("**{}**: {}", title, detail));
    }

    report.heading(2, "Index check");
    for check in checks {
        report.heading(3, check.table);
        match &check.indexes {
            Ok(result) if result.is_empty() => {
                report.paragraph("No index found.");
            }
            Ok(result) => {
                let mut table = MarkdownTable::new(["Index", "Columns", "Type"]);
                for row in 0..result.rows.len() {
                    table.row([
                        result.value(row, "index_name").unwrap_or("?"),
                        result.value(row, "columns").unwrap_or(""),
                        result.value(row, "index_type").unwrap_or(""),
                    ]);
                }
                report.table(&table);
            }
            Err(e) => {
                report.paragraph(&format!("Could not read indexes: {}", e));
            }
        }
        if !check.uncovered.is_empty() {
            report.paragraph(&format!(
                "Join columns not in any index: {}",
                check.uncovered.join(", ")
            ));
        }
    }

    report
        .heading(2, "Recommended indexes")
        .code_block("sql", RECOMMENDED_INDEXES.trim_start())
        .paragraph("Indexes on the tables of the other databases have to be created there.");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlperf_common::error::{OdbcStdError, OdbcStdResult};

    fn indexes(rows: &[(&str, &str)]) -> QueryResult {
        QueryResult {
            columns: vec!["index_name".into(), "columns".into(), "index_type".into()],
            rows: rows
                .iter()
                .map(|(name, columns)| {
                    vec![
                        Some(name.to_string()),
                        Some(columns.to_string()),
                        Some("NONCLUSTERED".to_string()),
                    ]
                })
                .collect(),
        }
    }

    // Answers every query with the same result.
    struct FixedConnection(Result<QueryResult, &'static str>);

    impl ConnectionTrait for FixedConnection {
        fn execute(&self, _sql: &str) -> OdbcStdResult<()> {
            Ok(())
        }

        fn drain(&self, _sql: &str) -> OdbcStdResult<Option<usize>> {
            Ok(None)
        }

        fn query(&self, _sql: &str, _params: &[&str]) -> OdbcStdResult<QueryResult> {
            self.0
                .clone()
                .map_err(|e| OdbcStdError::StringError(e.to_string()))
        }

        fn commit(&self) -> OdbcStdResult<()> {
            Ok(())
        }

        fn rollback(&self) -> OdbcStdResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_count_rows() {
        let counted = FixedConnection(Ok(QueryResult {
            columns: vec!["cnt".into()],
            rows: vec![vec![Some(" 300 ".into())]],
        }));
        assert_eq!(count_rows(&counted, "SELECT COUNT(*) AS cnt"), 300);
    }

    #[test]
    fn test_failed_count_is_zero() {
        let failing = FixedConnection(Err("Invalid object name 'dbo.Missing'"));
        assert_eq!(count_rows(&failing, "SELECT COUNT(*) FROM dbo.Missing"), 0);
        let empty = FixedConnection(Ok(QueryResult::default()));
        assert_eq!(count_rows(&empty, "SELECT COUNT(*) FROM dbo.Empty"), 0);
    }

    #[test]
    fn test_uncovered_columns() {
        let (_, expected) = CHECKED_TABLES[0];
        let result = indexes(&[
            ("PK_Stations", "ID"),
            ("IX_Stations_ProductionSys", "StationID_ProductionSys, IsDeleted"),
        ]);
        assert_eq!(
            uncovered_columns(expected, &result),
            vec!["StationID_WeighbridgeSys"]
        );
        assert_eq!(uncovered_columns(expected, &QueryResult::default()).len(), 3);
    }

    #[test]
    fn test_report_sections() {
        let checks = vec![
            IndexCheck {
                table: "dbo.ProductCategories",
                indexes: Ok(QueryResult::default()),
                uncovered: vec!["CategoryName"],
            },
            IndexCheck {
                table: "dbo.Project",
                indexes: Err("permission denied".into()),
                uncovered: vec![],
            },
        ];
        let text = build_report("Statistics-CT-test", 300, 100, &checks).render();
        assert!(text.contains("| Production data | 300 | 75.0% |"));
        assert!(text.contains("### dbo.ProductCategories\n\nNo index found."));
        assert!(text.contains("Join columns not in any index: CategoryName"));
        assert!(text.contains("Could not read indexes: permission denied"));
        assert!(text.contains("```sql\nCREATE NONCLUSTERED INDEX"));
    }
}
