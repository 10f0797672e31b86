//! Terminal rendering of load reports and analysis bundles.

use analytics::promotion::{GroupMetrics, PromotionAnalysis};
use analytics::report::{CustomerBundle, ExplorationBundle};
use analytics::seasonal::SeasonalBucket;
use analytics::segmenter::SegmentPreference;
use analytics::{
    AnalysisWarning, CustomerSegmentation, InsightReport, Ratio, RankedEntity, SeasonalTrends,
    Section, YearOverYear,
};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use loader::LoadReport;
use rust_decimal::Decimal;

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn money(value: Decimal) -> String {
    format!("{value:.2}")
}

fn ratio(value: Ratio) -> String {
    format!("{value:.2}")
}

/// A fraction shown as a signed percentage.
fn lift(value: Ratio) -> String {
    match value.value() {
        Some(v) => format!("{:+.1}%", v * Decimal::ONE_HUNDRED),
        None => "n/a".to_string(),
    }
}

fn percent(value: Ratio) -> String {
    match value.value() {
        Some(v) => format!("{v:.1}%"),
        None => "n/a".to_string(),
    }
}

fn heading(title: &str) {
    println!("\n{title}");
    println!("{}", "=".repeat(title.chars().count()));
}

pub fn print_load_report(report: &LoadReport) {
    println!(
        "Loaded {} of {} rows ({} dropped).",
        report.rows_loaded,
        report.rows_read,
        report.rows_dropped()
    );
    if report.rows_dropped() > 0 {
        println!(
            "  duplicates: {}, missing values: {}, invalid values: {}, amount mismatches: {}",
            report.duplicate_ids,
            report.missing_values,
            report.invalid_values,
            report.amount_mismatches
        );
    }
}

pub fn print_report(report: &InsightReport) {
    print_section("Exploration", &report.exploration, print_exploration);
    print_section("Customer Segmentation", &report.customer, print_customer);
    print_section("Promotion Effectiveness", &report.promotion, print_promotion);
    print_section("Seasonal Trends", &report.seasonal, print_seasonal);
    print_warnings(report.warnings());
}

fn print_section<T>(title: &str, section: &Section<T>, print: fn(&T)) {
    heading(title);
    match section {
        Section::Completed(bundle) => print(bundle),
        Section::Failed { reason } => println!("Section failed: {reason}"),
    }
}

fn print_exploration(bundle: &ExplorationBundle) {
    let overview = &bundle.descriptive.overview;
    println!(
        "{} transactions, {} customers, {} products, revenue {}",
        overview.row_count,
        overview.unique_customers,
        overview.unique_products,
        money(overview.total_revenue)
    );
    if let (Some(first), Some(last)) = (overview.first_date, overview.last_date) {
        println!("Date range: {first} to {last}");
    }

    let mut stats = new_table(&["Column", "Count", "Mean", "Std", "Min", "Median", "Max", "Outliers"]);
    for column in &bundle.descriptive.numeric {
        let s = &column.summary;
        stats.add_row(vec![
            column.column.to_string(),
            s.count.to_string(),
            money(s.mean),
            ratio(s.std_dev),
            money(s.min),
            money(s.median),
            money(s.max),
            column.outliers.count.to_string(),
        ]);
    }
    println!("{stats}");

    print_ranking_section("Top products by revenue", &bundle.top_products_by_revenue);
    print_ranking_section("Top cities", &bundle.top_cities);
    print_ranking_section("Top categories", &bundle.top_categories);
    print_ranking_section("Store types", &bundle.store_types);
    print_ranking_section("Payment methods", &bundle.payment_methods);
}

fn print_ranking_section(title: &str, section: &Section<Vec<RankedEntity>>) {
    match section {
        Section::Completed(ranked) => print_ranking(title, ranked),
        Section::Failed { reason } => println!("\n{title}: skipped ({reason})"),
    }
}

pub fn print_ranking(title: &str, ranked: &[RankedEntity]) {
    println!("\n{title}");
    let mut table = new_table(&["#", "Key", "Quantity", "Revenue", "Avg price", "Transactions", "Share"]);
    for (position, entity) in ranked.iter().enumerate() {
        let key = match &entity.label {
            Some(label) => format!("{} ({label})", entity.key),
            None => entity.key.to_string(),
        };
        table.add_row(vec![
            (position + 1).to_string(),
            key,
            entity.total_quantity.to_string(),
            money(entity.total_revenue),
            money(entity.avg_price),
            entity.transaction_count.to_string(),
            percent(entity.revenue_share_pct),
        ]);
    }
    println!("{table}");
}

fn print_customer(bundle: &CustomerBundle) {
    print_segmentation(&bundle.segmentation);
    match &bundle.preferences {
        Section::Completed(preferences) => print_preferences(preferences),
        Section::Failed { reason } => println!("Segment preferences skipped ({reason})"),
    }
    print_ranking("Top customers", &bundle.top_customers);
}

pub fn print_segmentation(segmentation: &CustomerSegmentation) {
    println!(
        "{} customers, {} transactions, visit frequency {}, repeat purchase rate {}",
        segmentation.total_customers,
        segmentation.total_transactions,
        ratio(segmentation.visit_frequency),
        percent(segmentation.repeat_purchase_rate.map(|v| v * Decimal::ONE_HUNDRED)),
    );
    if let Some(b) = &segmentation.boundaries {
        println!(
            "Boundaries: Low < {} <= Medium < {} <= High",
            money(b.lower),
            money(b.upper)
        );
    }

    let mut table = new_table(&[
        "Segment",
        "Customers",
        "Transactions",
        "Revenue",
        "Avg transaction",
        "Revenue share",
    ]);
    for summary in &segmentation.summaries {
        table.add_row(vec![
            summary.segment.to_string(),
            summary.customer_count.to_string(),
            summary.transaction_count.to_string(),
            money(summary.total_revenue),
            ratio(summary.avg_transaction_value),
            percent(summary.revenue_share_pct),
        ]);
    }
    println!("{table}");
}

pub fn print_preferences(preferences: &[SegmentPreference]) {
    for preference in preferences {
        let categories: Vec<String> = preference
            .top_categories
            .iter()
            .map(|c| c.key.to_string())
            .collect();
        println!("{}: {}", preference.segment, categories.join(", "));
    }
}

fn print_promotion(analysis: &PromotionAnalysis) {
    let comparison = &analysis.comparison;
    let mut table = new_table(&["Metric", "Without discount", "With discount", "Lift"]);
    let row = |name: &str, f: fn(&GroupMetrics) -> String, l: Ratio| {
        vec![
            name.to_string(),
            f(&comparison.control),
            f(&comparison.treatment),
            lift(l),
        ]
    };
    table.add_row(row("Transactions", |g| g.transaction_count.to_string(), comparison.lift.transaction_count));
    table.add_row(row("Revenue", |g| money(g.total_revenue), comparison.lift.total_revenue));
    table.add_row(row(
        "Avg transaction",
        |g| ratio(g.avg_transaction_value),
        comparison.lift.avg_transaction_value,
    ));
    table.add_row(row("Avg quantity", |g| ratio(g.avg_quantity), comparison.lift.avg_quantity));
    println!("{table}");

    let mut bands = new_table(&["Discount", "Transactions", "Revenue", "Avg transaction"]);
    for band in &analysis.discount_bands {
        bands.add_row(vec![
            band.band.to_string(),
            band.transaction_count.to_string(),
            money(band.total_revenue),
            ratio(band.avg_transaction_value),
        ]);
    }
    println!("{bands}");

    let roi = &analysis.roi;
    println!(
        "Discount given: {}, revenue from discounted sales: {}, ROI: {}",
        money(roi.total_discount_given),
        money(roi.revenue_from_discounts),
        percent(roi.roi_pct)
    );
}

fn print_buckets(title: &str, buckets: &[SeasonalBucket]) {
    println!("\n{title}");
    let mut table = new_table(&["Period", "Transactions", "Revenue", "Avg transaction", "Customers"]);
    for bucket in buckets {
        table.add_row(vec![
            bucket.period.to_string(),
            bucket.transaction_count.to_string(),
            money(bucket.total_revenue),
            ratio(bucket.avg_transaction_value),
            bucket.unique_customers.to_string(),
        ]);
    }
    println!("{table}");
}

fn print_seasonal(trends: &SeasonalTrends) {
    print_buckets("By month", &trends.monthly);
    print_buckets("By quarter", &trends.quarterly);
    print_buckets("By day of week", &trends.day_of_week);

    if let Some(peak) = trends.peak_month {
        println!("Peak month: {peak}");
    }
    if let Some(busiest) = trends.busiest_day {
        println!("Busiest day: {busiest}");
    }

    match &trends.year_over_year {
        YearOverYear::NotApplicable { distinct_years } => {
            println!("Year-over-year: not applicable ({distinct_years} year(s) of data)");
        }
        YearOverYear::Comparison { growth, .. } => {
            for g in growth {
                println!(
                    "{} -> {}: revenue {}, transactions {}",
                    g.from_year,
                    g.to_year,
                    percent(g.revenue_growth_pct),
                    percent(g.transaction_growth_pct)
                );
            }
        }
    }
}

pub fn print_warnings<'a>(warnings: impl IntoIterator<Item = &'a AnalysisWarning>) {
    let warnings: Vec<&AnalysisWarning> = warnings.into_iter().collect();
    if warnings.is_empty() {
        return;
    }
    println!("\nWarnings:");
    for warning in warnings {
        println!("  - {warning}");
    }
}
