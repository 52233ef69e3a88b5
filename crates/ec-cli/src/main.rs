//! EconStat CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ec_core::Method;
use ec_inference::ParamBag;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "econstat")]
#[command(about = "EconStat - econometric analysis of tabular and panel data")]
#[command(version = ec_core::VERSION)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// Analysis result as pretty JSON.
    Json,
    /// Regression table only.
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an analysis on a CSV or Excel file
    Analyze {
        /// Input CSV or Excel workbook (header row required)
        #[arg(short, long)]
        input: PathBuf,

        /// Method: OLS, 2SLS, FE or RE
        #[arg(short, long)]
        method: String,

        /// Dependent variable column
        #[arg(long)]
        dependent: Option<String>,

        /// Regressor of interest (endogenous regressor for 2SLS)
        #[arg(long)]
        base: Option<String>,

        /// Control columns, comma-separated
        #[arg(long, value_delimiter = ',')]
        controls: Vec<String>,

        /// Excluded instruments for 2SLS, comma-separated
        #[arg(long, value_delimiter = ',')]
        instruments: Vec<String>,

        /// Panel regressors for FE/RE, comma-separated
        #[arg(long, value_delimiter = ',')]
        exog: Vec<String>,

        /// Entity column for FE/RE
        #[arg(long)]
        entity: Option<String>,

        /// Time column for FE/RE
        #[arg(long)]
        time: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the built-in indicator catalog (metric name → World Bank code)
    Catalog {
        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Analyze {
            input,
            method,
            dependent,
            base,
            controls,
            instruments,
            exog,
            entity,
            time,
            format,
            output,
        } => {
            let params = ParamBag {
                dependent_variable: dependent,
                base_regressor: base,
                controls: Some(controls),
                instruments: Some(instruments),
                exogenous_regressors: Some(exog),
                entity_column: entity,
                time_column: time,
            };
            cmd_analyze(&input, &method, &params, format, output.as_ref())
        }
        Commands::Catalog { output } => cmd_catalog(output.as_ref()),
    }
}

fn cmd_analyze(
    input: &PathBuf,
    method: &str,
    params: &ParamBag,
    format: OutputFormat,
    output: Option<&PathBuf>,
) -> Result<()> {
    let method: Method = method.parse()?;
    let dataset = ec_data::read_file(input)?;
    tracing::info!(rows = dataset.len(), input = %input.display(), "loaded dataset");

    let result = ec_inference::analyze(&dataset, method, params)?;

    match format {
        OutputFormat::Json => write_json(output, serde_json::to_value(&result)?),
        OutputFormat::Text => write_text(output, &result.summary),
    }
}

fn cmd_catalog(output: Option<&PathBuf>) -> Result<()> {
    let catalog = ec_data::IndicatorCatalog::default();
    write_json(output, serde_json::to_value(&catalog)?)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

fn write_text(output: Option<&PathBuf>, text: &str) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    } else {
        print!("{text}");
    }
    Ok(())
}
