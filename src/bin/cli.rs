//! tracestay CLI - batch runner and debug tool for stay inference
//!
//! Usage:
//!   tracestay-cli run <pings.csv> [--config <file.json>] [--output <file>] [--format csv|json]
//!   tracestay-cli pairs <pings.csv> [--config <file.json>] [--output <file>] [--require-work]
//!
//! Timezones are not resolved from coordinates here; every stop uses the
//! configured default timezone (override with `--default-timezone`).

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracestay::{
    NoTimezoneLookup, PipelineConfig, Result, csv_io, home_work_pairs, run_pipeline,
};

#[derive(Parser)]
#[command(name = "tracestay-cli")]
#[command(about = "Detect stops, places and home/work locations from GPS pings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file (missing fields use defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the default timezone, e.g. "America/Bogota"
    #[arg(long, global = true)]
    default_timezone: Option<String>,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce one classified record per stop
    Run {
        /// CSV file of pings (device_id,timestamp_ms,latitude,longitude)
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },

    /// Produce home and work coordinates per device-year
    Pairs {
        /// CSV file of pings (device_id,timestamp_ms,latitude,longitude)
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only emit device-years with both a home and a work place
        #[arg(long)]
        require_work: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(tz) = cli.default_timezone {
        config.timezone.default_timezone = tz;
    }

    match cli.command {
        Commands::Run {
            input,
            output,
            format,
        } => {
            let pings = load_pings(&input)?;
            let result = run_pipeline(pings, &config, &NoTimezoneLookup)?;
            let writer = open_output(output.as_deref())?;
            match format {
                OutputFormat::Csv => csv_io::write_records(writer, &result.records)?,
                OutputFormat::Json => {
                    let mut writer = writer;
                    serde_json::to_writer_pretty(&mut writer, &result.records)?;
                    writeln!(writer)?;
                }
            }
            info!(
                "Wrote {} records ({} device-years with home, {} with work)",
                result.records.len(),
                result.summary.device_years_with_home,
                result.summary.device_years_with_work
            );
        }
        Commands::Pairs {
            input,
            output,
            require_work,
        } => {
            let pings = load_pings(&input)?;
            let result = run_pipeline(pings, &config, &NoTimezoneLookup)?;
            let pairs = home_work_pairs(&result.profiles, require_work);
            csv_io::write_pairs(open_output(output.as_deref())?, &pairs)?;
            info!("Wrote {} home/work pairs", pairs.len());
        }
    }

    Ok(())
}

fn load_pings(path: &Path) -> Result<Vec<tracestay::Ping>> {
    info!("Loading pings from {}", path.display());
    let pings = csv_io::read_pings(BufReader::new(File::open(path)?))?;
    info!("Loaded {} pings", pings.len());
    Ok(pings)
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}
