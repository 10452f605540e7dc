use super::{banner, print_outcome, rows_cell, section, Context};
use sqlperf_helper::executor::outcome::ExecutionOutcome;
use sqlperf_helper::executor::timed::execute_timed;
use sqlperf_helper::extension::compare::{share, Improvement, RowCheck};
use sqlperf_helper::extension::params::ParamSet;
use sqlperf_helper::report::{format_count, format_secs, MarkdownReport, MarkdownTable};

pub const REPORT_FILE: &str = "insert_production_details_performance.md";

pub const ORIGINAL_PRODUCTION_SQL: &str = "
SELECT
    FGC_CreateDate = GETDATE(),
    FGC_LastModifier = @Creator,
    FGC_LastModifyDate = GETDATE(),
    FGC_Creator = @Creator,
    DailyReportID = r.ID,
    Type = ISNULL(ISNULL(mt.ProductionNature, Stations.Type), N'自产'),
    OriginalID = mt.Id,
    OriginalProjectID = mt.ProjectId,
    OriginalPlanID = mt.PlanId,
    ProjectName = mt.ProjectName,
    Customer = mt.CompanyName,
    SalesDepartment = ISNULL(mt.Department, @DefaultDepartment),
    Salesman = ISNULL(mt.PersonInCharge, N'未填'),
    PaymentType = ISNULL(mt.PaymentType, @DefaultPaymentType),
    ProductCategory = ISNULL(mt.ConcreteCategory, @DefaultProductCategory),
    Unit = ISNULL(pc.Unit, @DefaultUnit),
    ProductionCoefficient = CASE WHEN ISNULL(pc.Unit, @DefaultUnit) = N'吨' THEN @ProCoeff ELSE NULL END,
    ProductionQty_M3 = CASE WHEN ISNULL(pc.Unit, @DefaultUnit) = N'吨' THEN
                            mt.ActQuantity / (CASE WHEN ISNULL(pc.Unit, @DefaultUnit) = N'吨' THEN @ProCoeff ELSE NULL END)
                        ELSE mt.ActQuantity END,
    ProductionQty_T = CASE WHEN ISNULL(pc.Unit, @DefaultUnit) = N'吨' THEN mt.ActQuantity ELSE NULL END
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

pub const OPTIMIZED_PRODUCTION_SQL: &str = "
WITH ProductionBaseData AS (
    SELECT
        mt.*,
        Stations.ID AS StationID,
        Stations.Type AS StationType,
        r.ID AS DailyReportID,
        ISNULL(pc.Unit, @DefaultUnit) AS UnitType,
        CASE WHEN ISNULL(pc.Unit, @DefaultUnit) = N'吨' THEN @ProCoeff ELSE NULL END AS Coefficient
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
      AND mt.SiteDate < DATEADD(DAY, 1, @ReportDate)
)
SELECT
    GETDATE() AS FGC_CreateDate,
    @Creator AS FGC_LastModifier,
    GETDATE() AS FGC_LastModifyDate,
    @Creator AS FGC_Creator,
    DailyReportID,
    ISNULL(ISNULL(ProductionNature, StationType), N'自产') AS Type,
    Id AS OriginalID,
    ProjectId AS OriginalProjectID,
    PlanId AS OriginalPlanID,
    ProjectName,
    CompanyName AS Customer,
    ISNULL(Department, @DefaultDepartment) AS SalesDepartment,
    ISNULL(PersonInCharge, N'未填') AS Salesman,
    ISNULL(PaymentType, @DefaultPaymentType) AS PaymentType,
    ISNULL(ConcreteCategory, @DefaultProductCategory) AS ProductCategory,
    UnitType AS Unit,
    Coefficient AS ProductionCoefficient,
    CASE WHEN UnitType = N'吨' THEN ActQuantity / Coefficient ELSE ActQuantity END AS ProductionQty_M3,
    CASE WHEN UnitType = N'吨' THEN ActQuantity ELSE NULL END AS ProductionQty_T
FROM ProductionBaseData";

pub const WEIGHBRIDGE_SQL: &str = "
SELECT
    FGC_CreateDate = GETDATE(),
    FGC_LastModifier = @Creator,
    DailyReportID = r.ID,
    Type = Stations.Type,
    OriginalID = RIGHT(Shipping.Number, 12),
    ProjectName = Shipping.ProjectName,
    Customer = Shipping.Consignee,
    ProductionQty_T = Delivering.RealNet / 1000,
    ReceiptQty = Delivering.Net / 1000
FROM [Weighbridge-test].dbo.Shipping Shipping WITH (NOLOCK)
LEFT JOIN [Weighbridge-test].dbo.Delivering Delivering WITH (NOLOCK)
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

#[derive(Debug)]
struct Results {
    original: ExecutionOutcome,
    optimized: ExecutionOutcome,
    weighbridge: ExecutionOutcome,
}

/// Times the SELECT parts of the INSERT statement, original against the CTE
/// rewrite. Nothing is inserted.
pub fn run(ctx: &Context) -> anyhow::Result<()> {
    banner("INSERT ProductionDailyReportDetails performance");

    let params = ctx.config.insert.to_params();
    println!("test parameters:");
    for (name, value) in params.iter() {
        println!("  @{} = {}", name, value);
    }

    let timed = |title: &str, label: &str, sql: &str| {
        section(title);
        let outcome = execute_timed(ctx.conn, &params.substitute(sql), ctx.config.profile);
        print_outcome(label, &outcome);
        outcome
    };
    let results = Results {
        original: timed(
            "Test 1: original SQL, production data",
            "original production query",
            ORIGINAL_PRODUCTION_SQL,
        ),
        optimized: timed(
            "Test 2: CTE rewrite, production data",
            "CTE production query",
            OPTIMIZED_PRODUCTION_SQL,
        ),
        weighbridge: timed(
            "Test 3: original SQL, weighbridge data",
            "weighbridge query",
            WEIGHBRIDGE_SQL,
        ),
    };

    section("Summary");
    println!("{:<36} {:>12} {:>12}   {}", "version", "elapsed", "rows", "improvement");
    println!("{}", "-".repeat(80));
    for (label, outcome, note) in summary_rows(&results) {
        let elapsed = if outcome.succeeded() {
            format_secs(outcome.elapsed_ms())
        } else {
            "failed".to_string()
        };
        println!("{:<36} {:>12} {:>12}   {}", label, elapsed, rows_cell(outcome), note);
    }

    section("Row consistency");
    println!("  {}", row_check_line(RowCheck::of(&results.original, &results.optimized)));

    let report = build_report(&results, &params);
    let path = report.write_to(ctx.output, REPORT_FILE)?;
    println!();
    println!("report saved: {}", path.display());
    Ok(())
}

fn summary_rows(results: &Results) -> [(&'static str, &ExecutionOutcome, String); 3] {
    [
        ("original SQL, production data", &results.original, "baseline".to_string()),
        (
            "CTE rewrite, production data",
            &results.optimized,
            improvement_note(&results.original, &results.optimized),
        ),
        ("original SQL, weighbridge data", &results.weighbridge, String::new()),
    ]
}

/// `↓ 75.0% (4.0x)`, or `-` when either run failed.
pub fn improvement_note(baseline: &ExecutionOutcome, candidate: &ExecutionOutcome) -> String {
    let Some(improvement) = Improvement::between(baseline, candidate) else {
        return "-".to_string();
    };
    match (improvement.percent(), improvement.speedup()) {
        (Some(percent), Some(speedup)) => format!("↓ {:.1}% ({:.1}x)", percent, speedup),
        (Some(percent), None) => format!("↓ {:.1}%", percent),
        _ => "-".to_string(),
    }
}

fn row_check_line(check: RowCheck) -> String {
    match check {
        RowCheck::Consistent(rows) => {
            format!("[ok] production row counts match: {} rows", format_count(rows))
        }
        RowCheck::Mismatch { baseline, candidate } => format!(
            "[warn] production row counts differ: original {}, CTE {}",
            format_count(baseline),
            format_count(candidate)
        ),
        RowCheck::Unknown => "[warn] row counts unavailable, a query failed".to_string(),
    }
}

fn build_report(results: &Results, params: &ParamSet) -> MarkdownReport {
    let mut report = MarkdownReport::new("INSERT ProductionDailyReportDetails performance");
    report
        .meta("Databases", "Statistics-CT-test, logistics-test, Weighbridge-test")
        .meta("Method", "SELECT parts only, nothing inserted")
        .meta("Parameters", "")
        .params(params)
        .rule();

    let mut production = MarkdownTable::new(["Version", "Elapsed", "Rows", "Improvement"]);
    for (label, outcome, note) in summary_rows(results).into_iter().take(2) {
        production.row([label.to_string(), elapsed_cell(outcome), rows_cell(outcome), note]);
    }
    let mut weighbridge = MarkdownTable::new(["Version", "Elapsed", "Rows"]);
    weighbridge.row([
        "original SQL".to_string(),
        elapsed_cell(&results.weighbridge),
        rows_cell(&results.weighbridge),
    ]);
    report
        .heading(2, "Results")
        .heading(3, "Part 1: production data (ProductDetailsDino-mt)")
        .table(&production)
        .heading(3, "Part 2: weighbridge data (Shipping + Delivering)")
        .table(&weighbridge);

    let part1 = results.original.row_count().unwrap_or(0);
    let part2 = results.weighbridge.row_count().unwrap_or(0);
    let total = part1 + part2;
    report
        .heading(2, "Findings")
        .heading(3, "Data volume")
        .bullet(&format!(
            "Production data: {} rows ({:.1}%)",
            format_count(part1),
            share(part1 as f64, total as f64)
        ))
        .bullet(&format!(
            "Weighbridge data: {} rows ({:.1}%)",
            format_count(part2),
            share(part2 as f64, total as f64)
        ))
        .bullet(&format!("**Total**: {} rows", format_count(total)));

    report.heading(3, "Row consistency").paragraph(&row_check_line(RowCheck::of(
        &results.original,
        &results.optimized,
    )));

    if let Some(improvement) = Improvement::between(&results.original, &results.optimized) {
        report
            .heading(3, "CTE rewrite")
            .paragraph("The rewrite evaluates `ISNULL(pc.Unit, @DefaultUnit)` and the coefficient once per row in the CTE instead of repeating the CASE expression in every column.")
            .bullet(&format!("Original: {}", format_secs(improvement.baseline_ms)))
            .bullet(&format!("CTE: {}", format_secs(improvement.candidate_ms)))
            .bullet(&format!("Saved: {}", format_secs(improvement.saved_ms())));
        if let Some(percent) = improvement.percent() {
            report.bullet(&format!("Improvement: {:.1}%", percent));
        }
    }

    report
        .heading(2, "Next steps")
        .bullet("Replace the original SELECT with the CTE version once row counts match")
        .bullet("Create the indexes on Stations, ProductionDailyReports and ProductCategories")
        .bullet("Prefer READ_COMMITTED_SNAPSHOT over NOLOCK hints");
    report
}

fn elapsed_cell(outcome: &ExecutionOutcome) -> String {
    if outcome.succeeded() {
        format_secs(outcome.elapsed_ms())
    } else {
        format!("failed: {}", outcome.error_message().unwrap_or_default())
    }
}
