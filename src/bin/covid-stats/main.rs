//! covid-stats - cohort statistics over the post-vaccination reports
//!
//! ```text
//! covid-stats timeline --dataset deaths --resolution weekly --sex K --age-bracket "80 - 84"
//! covid-stats map --producer Pfizer --format json
//! covid-stats summary --filter "dawka_ost=pełna dawka"
//! covid-stats check-config
//! ```

mod config;
mod render;

use clap::{Args, Parser, Subcommand};
use covid_pl_stats::{CohortFilter, DashboardService, DatasetKind, TimeResolution};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

use config::load_config;
use render::Format;

// =============================================================================
// CLI Definition
// =============================================================================

#[derive(Parser)]
#[command(name = "covid-stats")]
#[command(version)]
#[command(about = "Cohort statistics for Polish COVID-19 post-vaccination reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (overrides COVID_STATS_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Cohort vs. all reports per day or week
    Timeline(QueryArgs),

    /// Cohort vs. all reports per county
    Map(QueryArgs),

    /// Cohort size against the whole dataset
    Summary(QueryArgs),

    /// Validate configuration and print it
    CheckConfig,
}

#[derive(Args)]
struct QueryArgs {
    /// Dataset (infections, deaths)
    #[arg(short, long, default_value = "infections")]
    dataset: DatasetKind,

    /// Time resolution (daily, weekly)
    #[arg(short, long, default_value = "daily")]
    resolution: TimeResolution,

    /// Sex to include (K, M); repeat for several
    #[arg(long)]
    sex: Vec<String>,

    /// Age bracket to include, e.g. "30 - 34"; repeat for several
    #[arg(long)]
    age_bracket: Vec<String>,

    /// Vaccine producer to include, e.g. Pfizer; repeat for several
    #[arg(long)]
    producer: Vec<String>,

    /// Last dose to include, e.g. "pełna dawka"; repeat for several
    #[arg(long)]
    dose: Vec<String>,

    /// Generic constraint COLUMN=V1,V2 (e.g. plec=K); repeat for several
    #[arg(long, value_name = "COLUMN=VALUES")]
    filter: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,
}

impl QueryArgs {
    /// Build the cohort filter from every constraint flag
    fn cohort_filter(&self) -> covid_pl_stats::Result<CohortFilter> {
        let mut pairs: Vec<(String, Vec<String>)> = [
            ("sex", &self.sex),
            ("age_bracket", &self.age_bracket),
            ("vaccine_producer", &self.producer),
            ("last_dose", &self.dose),
        ]
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(column, values)| (column.to_string(), values.clone()))
        .collect();

        for constraint in &self.filter {
            let (column, values) = constraint.split_once('=').ok_or_else(|| {
                covid_pl_stats::Error::Configuration(format!(
                    "filter '{}' must look like COLUMN=VALUE[,VALUE...]",
                    constraint
                ))
            })?;
            let values = values
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            pairs.push((column.trim().to_string(), values));
        }

        CohortFilter::from_pairs(pairs)
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

/// Validate configuration and print summary
fn cmd_check_config(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let app_config = load_config(cli.config.as_deref())?;

    println!("Configuration is valid!");
    println!();
    println!("Data:");
    println!("  Infections: {}", app_config.data.infections_path.display());
    println!("  Deaths: {}", app_config.data.deaths_path.display());
    match &app_config.data.county_names_path {
        Some(path) => println!("  County names: {}", path.display()),
        None => println!("  County names: (none)"),
    }
    println!("  Strict ingestion: {}", app_config.data.strict_ingestion);
    println!();
    println!("Cache:");
    println!("  Enabled: {}", app_config.cache.enabled);
    println!("  Max entries: {}", app_config.cache.max_entries);
    println!();
    println!("Query:");
    println!("  Empty buckets: {:?}", app_config.query.empty_buckets);
    println!("  Log level: {}", app_config.logging.level);

    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum QueryKind {
    Timeline,
    Map,
    Summary,
}

/// Load the requested dataset and run one query command
fn cmd_query(
    cli: &Cli,
    kind: QueryKind,
    args: &QueryArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let app_config = load_config(cli.config.as_deref())?;
    init_tracing(&app_config.logging.level);

    let filter = args.cohort_filter()?;
    debug!(filter = %filter, dataset = %args.dataset, "Query parsed");

    let service = DashboardService::from_config(&app_config)?;
    let report = service.load_dataset(
        args.dataset,
        app_config.data.path_for(args.dataset),
        &app_config.data.ingest_options(),
    )?;
    info!(
        dataset = %args.dataset,
        rows = report.rows_kept,
        rejected = report.rejected,
        "Dataset ready"
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match kind {
        QueryKind::Timeline => {
            let views = service.prepare(args.dataset, args.resolution, &filter)?;
            if let Some((first, last)) = render::timeline_span(&views) {
                debug!(%first, %last, buckets = views.timeline.len(), "Timeline span");
            }
            render::timeline(&mut out, &views, args.format)?;
        },
        QueryKind::Map => {
            let views = service.prepare(args.dataset, args.resolution, &filter)?;
            let counties = service.labeled_counties(&views);
            render::counties(&mut out, &views, &counties, args.format)?;
        },
        QueryKind::Summary => {
            let summary = service.summary(args.dataset, &filter)?;
            render::summary(&mut out, &summary, args.format)?;
        },
    }

    out.flush()?;
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::CheckConfig => cmd_check_config(&cli),
        Commands::Timeline(args) => cmd_query(&cli, QueryKind::Timeline, args),
        Commands::Map(args) => cmd_query(&cli, QueryKind::Map, args),
        Commands::Summary(args) => cmd_query(&cli, QueryKind::Summary, args),
    }
}
