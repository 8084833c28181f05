use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{error, info};

use sales_etl::config::{EtlConfig, SourceConfig};
use sales_etl::logging::{self, ConsoleTarget};
use sales_etl::metrics;
use sales_etl::pipeline::{Pipeline, PipelineResult, RunOutcome, RunReport};
use sales_etl::storage::SqliteStore;
use sales_etl::validate::{validate, ValidationReport};

#[derive(Parser)]
#[command(name = "sales_etl")]
#[command(about = "Load regional sales order exports into a SQLite sales table")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file (default: sales_etl.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the SQLite store path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, transform and load the configured order files, then validate
    Run {
        /// Order file and region label as PATH=REGION; repeat for several regions
        #[arg(long = "source")]
        sources: Vec<String>,
        /// Skip the validation queries after loading
        #[arg(long)]
        skip_validation: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Run the validation queries against an existing store
    Validate {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn print_result(result: &PipelineResult) {
    for source in &result.sources {
        println!(
            "📥 {} (region {}): {} rows",
            source.path.display(),
            source.region,
            source.rows
        );
    }
    match &result.outcome {
        RunOutcome::Written {
            stats,
            rows_written,
        } => {
            println!("\n📊 Transform Results:");
            println!("   Input rows: {}", stats.input_rows);
            println!("   Duplicates dropped: {}", stats.duplicates_dropped);
            println!("   Non-positive net sales dropped: {}", stats.non_positive_dropped);
            println!("   Rows written: {}", rows_written);
        }
        RunOutcome::Rejected { missing_columns } => {
            println!("❌ Transformation failed due to missing columns: {}", missing_columns.join(", "));
        }
    }
}

fn check_consistency(report: &ValidationReport) {
    if !report.is_consistent() {
        error!(
            "Sales store holds {} repeated OrderId values",
            report.duplicate_order_ids.len()
        );
    }
}

fn log_metrics() {
    if let Some(snapshot) = metrics::render() {
        info!("Run metrics:\n{}", snapshot.trim_end());
    }
}

impl Commands {
    fn format(&self) -> OutputFormat {
        match self {
            Commands::Run { format, .. } | Commands::Validate { format } => *format,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    let mut config = EtlConfig::load(cli.config.as_deref())?;
    config.apply_store_overrides(EtlConfig::store_path_from_env(), cli.db);

    // JSON goes to stdout alone; log lines move to stderr
    let format = cli.command.format();
    let console = match format {
        OutputFormat::Text => ConsoleTarget::Stdout,
        OutputFormat::Json => ConsoleTarget::Stderr,
    };
    let _log_guard = logging::init_logging(&config.logging.directory, console)?;
    metrics::init_metrics();

    match cli.command {
        Commands::Run {
            sources,
            skip_validation,
            ..
        } => {
            if !sources.is_empty() {
                config.sources = sources
                    .iter()
                    .map(|s| SourceConfig::parse_arg(s))
                    .collect::<Result<Vec<_>, _>>()?;
            }
            config.validate()?;

            info!(store = %config.store.path.display(), "Starting sales ETL run");
            let mut store = SqliteStore::open(&config.store.path)?;
            let result = Pipeline::run(&config.sources, config.transform.dedup, &mut store)?;

            let validation = if result.is_written() && !skip_validation {
                Some(validate(&store)?)
            } else {
                None
            };

            match format {
                OutputFormat::Text => {
                    print_result(&result);
                    if let Some(report) = &validation {
                        println!("\n🔎 Validation:");
                        print!("{}", report);
                    }
                }
                OutputFormat::Json => {
                    let report = RunReport {
                        run: result,
                        validation,
                    };
                    println!("{}", report.to_json()?);
                    if let Some(validation) = &report.validation {
                        check_consistency(validation);
                    }
                    log_metrics();
                    return Ok(());
                }
            }
            if let Some(report) = &validation {
                check_consistency(report);
            }
            log_metrics();
        }
        Commands::Validate { .. } => {
            // Read-only: a missing store is reported, never created
            let store = SqliteStore::open_read_only(&config.store.path)?;
            if !store.has_sales_table()? {
                anyhow::bail!(
                    "no sales table in {}; run the pipeline first",
                    config.store.path.display()
                );
            }
            let report = validate(&store)?;
            match format {
                OutputFormat::Text => print!("{}", report),
                OutputFormat::Json => println!("{}", report.to_json()?),
            }
            check_consistency(&report);
        }
    }
    Ok(())
}
