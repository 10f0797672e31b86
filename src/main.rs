use analytics::{
    DEFAULT_TOP_N, GroupKey, InsightEngine, RankMetric, Segmenter, rank_by, segment_preferences,
};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use configuration::{AppConfig, LoggingSettings};
use loader::LoadOutcome;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod render;

/// The main entry point for the Retail Insights application.
fn main() -> Result<()> {
    // Load RUST_LOG and RETAIL__* overrides from a .env file, if there is one.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    let config = configuration::load_config(cli.config.as_deref())
        .context("Failed to load configuration")?;
    let _guard = init_tracing(&config.logging)?;

    // Execute the appropriate command
    match cli.command {
        Commands::Analyze(args) => handle_analyze(args, &config),
        Commands::Rank(args) => handle_rank(args, &config),
        Commands::Segments(args) => handle_segments(args, &config),
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. When a log
/// directory is configured, events go to a daily-rotated file instead of
/// stderr; the returned guard must live until the program exits.
fn init_tracing(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .context("Invalid logging filter")?;

    match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "retail-insights.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
            Ok(Some(guard))
        }
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
            Ok(None)
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Customer, promotion and seasonal insights from a retail transaction ledger.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (defaults to ./config.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every analysis and print the summary tables.
    Analyze(AnalyzeArgs),
    /// Rank products, cities, categories, ... by one or more metrics.
    Rank(RankArgs),
    /// Print the customer value segmentation.
    Segments(SegmentsArgs),
}

#[derive(Parser)]
struct AnalyzeArgs {
    /// The transaction CSV file. Falls back to `data.input_path` from the configuration.
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Also write the complete insight report as JSON to this file.
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Parser)]
struct RankArgs {
    /// The transaction CSV file. Falls back to `data.input_path` from the configuration.
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// The column to group by (product, product_name, category, city, store_type,
    /// payment_method, customer).
    #[arg(long)]
    by: GroupKey,

    /// Metrics to order by, most significant first (quantity, revenue, avg_price,
    /// transactions).
    #[arg(long = "metric", required = true, num_args = 1..)]
    metrics: Vec<RankMetric>,

    /// Number of groups to show.
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    top: usize,
}

#[derive(Parser)]
struct SegmentsArgs {
    /// The transaction CSV file. Falls back to `data.input_path` from the configuration.
    #[arg(long, short)]
    input: Option<PathBuf>,
}

// ==============================================================================
// Command Logic
// ==============================================================================

fn load_table(input: Option<&Path>, config: &AppConfig) -> Result<LoadOutcome> {
    let Some(path) = input.or(config.data.input_path.as_deref()) else {
        bail!("No input file: pass --input or set data.input_path in the configuration");
    };
    let outcome = loader::load_csv(path, &config.data)
        .with_context(|| format!("Failed to load '{}'", path.display()))?;
    render::print_load_report(&outcome.report);
    Ok(outcome)
}

fn handle_analyze(args: AnalyzeArgs, config: &AppConfig) -> Result<()> {
    let outcome = load_table(args.input.as_deref(), config)?;
    let engine = InsightEngine::new(config.analysis.clone());
    let report = engine.run(&outcome.table);

    render::print_report(&report);

    if let Some(path) = args.json {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create '{}'", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &report)?;
        println!("\nFull report written to {}", path.display());
    }
    Ok(())
}

fn handle_rank(args: RankArgs, config: &AppConfig) -> Result<()> {
    let outcome = load_table(args.input.as_deref(), config)?;
    let ranked = rank_by(&outcome.table, args.by, &args.metrics, args.top)?;

    let title = format!("Top {} by {}", args.top, args.by.column());
    render::print_ranking(&title, &ranked);
    Ok(())
}

fn handle_segments(args: SegmentsArgs, config: &AppConfig) -> Result<()> {
    let outcome = load_table(args.input.as_deref(), config)?;
    let segmentation = Segmenter::from_settings(&config.analysis).segment(&outcome.table)?;
    let preferences = segment_preferences(
        &outcome.table,
        &segmentation,
        config.analysis.preference_top_n,
    )?;

    render::print_segmentation(&segmentation);
    render::print_preferences(&preferences);
    render::print_warnings(segmentation.warnings.iter());
    Ok(())
}
