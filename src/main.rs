use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use inspection_etl::extract::{self, ExtractOptions, INPUT_FILE_PREFIX};
use inspection_etl::load::{self, LoadOptions, LoadPaths};
use inspection_etl::db;

#[derive(Parser)]
#[command(name = "inspection-etl")]
#[command(about = "NYC DOHMH restaurant inspection ETL: extract + load")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream the raw DOHMH CSV into three normalized CSVs
    Extract {
        /// Path to the raw input CSV (auto-discovers the newest
        /// DOHMH_*.csv in --input-dir if omitted)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Directory searched when --input is omitted
        #[arg(long, default_value = ".")]
        input_dir: PathBuf,

        /// Directory for restaurants.csv, inspections.csv, violations.csv
        #[arg(long, default_value = "out")]
        output_dir: PathBuf,

        /// Inclusive start date (YYYY-MM-DD)
        #[arg(long, default_value = "2023-01-01")]
        start_date: NaiveDate,

        /// Inclusive end date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        end_date: Option<NaiveDate>,

        /// Cap on input rows scanned (for quick dry tests)
        #[arg(long)]
        limit: Option<u64>,

        /// Sanitize text to ASCII-only to avoid import encoding issues
        #[arg(long)]
        ascii: bool,

        /// Maximum number of unique restaurants to output
        #[arg(long)]
        max_restaurants: Option<u64>,

        /// Maximum number of inspections to output
        #[arg(long)]
        max_inspections: Option<u64>,

        /// Maximum number of violations to output
        #[arg(long)]
        max_violations: Option<u64>,

        /// Log progress every ~100k input rows
        #[arg(long)]
        verbose: bool,
    },

    /// Import the normalized CSVs into SQLite in dependency order
    Load {
        /// SQLite database path
        #[arg(long, default_value = "inspections.db")]
        db: PathBuf,

        /// Base directory containing the three CSVs
        #[arg(long, default_value = "out")]
        base_dir: PathBuf,

        /// Path to restaurants.csv (overrides --base-dir)
        #[arg(long)]
        restaurants: Option<PathBuf>,

        /// Path to inspections.csv (overrides --base-dir)
        #[arg(long)]
        inspections: Option<PathBuf>,

        /// Path to violations.csv (overrides --base-dir)
        #[arg(long)]
        violations: Option<PathBuf>,

        /// Delete existing data (Violations → Inspections → Restaurants) first
        #[arg(long)]
        truncate: bool,

        /// Parse and validate, but do not write to the database
        #[arg(long)]
        dry_run: bool,

        /// Fail the import on the first bad row instead of skip-and-report
        #[arg(long)]
        strict: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "inspection_etl=debug,info"
    } else {
        "inspection_etl=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Extract {
            input,
            input_dir,
            output_dir,
            start_date,
            end_date,
            limit,
            ascii,
            max_restaurants,
            max_inspections,
            max_violations,
            verbose,
        } => {
            init_tracing(verbose);

            let input = match input {
                Some(path) => path,
                None => match extract::discover_latest_input(&input_dir)? {
                    Some(path) => path,
                    None => bail!(
                        "No input CSV found matching '{}*.csv' in {}",
                        INPUT_FILE_PREFIX,
                        input_dir.display()
                    ),
                },
            };

            let opts = ExtractOptions {
                input,
                output_dir,
                start_date,
                end_date: end_date.unwrap_or_else(|| Local::now().date_naive()),
                limit,
                ascii_only: ascii,
                max_restaurants,
                max_inspections,
                max_violations,
                verbose,
            };

            let summary = extract::run(&opts)?;
            println!("Extraction complete.");
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Load {
            db: db_path,
            base_dir,
            restaurants,
            inspections,
            violations,
            truncate,
            dry_run,
            strict,
        } => {
            init_tracing(false);

            let paths = LoadPaths::resolve(&base_dir, restaurants, inspections, violations)?;
            let opts = LoadOptions { truncate, dry_run, strict };

            println!("Importing CSV data...");
            println!("  Restaurants: {}", paths.restaurants.display());
            println!("  Inspections: {}", paths.inspections.display());
            println!("  Violations:  {}", paths.violations.display());
            println!("  Dry run:     {}", dry_run);
            println!("  Truncate:    {}", truncate);
            println!("  Strict:      {}", strict);

            let mut conn = db::open(&db_path)?;
            let report = load::run(&mut conn, &paths, &opts)?;

            if let Some((v, i, r)) = report.truncated {
                println!("✓ Truncated: {} violations, {} inspections, {} restaurants", v, i, r);
            }

            println!("Import complete.");
            println!("  Upserted Restaurants: {}", report.restaurants_processed);
            println!("  Upserted Inspections: {}", report.inspections_processed);
            println!("  Upserted Violations:  {}", report.violations_processed);
            if !report.failures.is_empty() {
                println!("  Skipped rows:         {}", report.failures.len());
            }
        }
    }

    Ok(())
}
