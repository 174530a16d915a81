//! Training-sample generator for inverted sensor groups.
//!
//! Logs in to the monitoring API, discovers every complete inverted group in
//! a project and writes windowed, deduplicated samples to a binary file.
//! With `--synthetic` the same pipeline runs against generated data and no
//! network access is needed.
//!
//! Credentials are read from `TALARIA_USERNAME` and `TALARIA_PASSWORD`, either
//! from the environment or from a `.env` file in the working directory.
//!
//! ```text
//! talaria-sampler --project 456 --output data/burquitlam --start 2010-01-01 --end 2025-01-01
//! ```

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::Parser;
use log::info;

use talaria_client::{ApiClient, DEFAULT_HOST};
use talaria_core::{DataSource, DateRange, RunSummary, SampleWriter, SamplingConfig, run_project};

mod synthetic;

const USERNAME_VAR: &str = "TALARIA_USERNAME";
const PASSWORD_VAR: &str = "TALARIA_PASSWORD";

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "talaria-sampler")]
#[command(about = "Generate training samples from inverted sensor groups")]
struct Args {
    /// Project to sample
    #[arg(long)]
    project: u32,

    /// Sample file to create (overwritten if it exists)
    #[arg(long, short)]
    output: PathBuf,

    /// Analytics host name, or a full API URL
    #[arg(long, default_value = DEFAULT_HOST)]
    api_host: String,

    /// First day of readings to fetch
    #[arg(long, default_value = "2005-01-01")]
    start: NaiveDate,

    /// Last day of readings to fetch [default: today]
    #[arg(long)]
    end: Option<NaiveDate>,

    /// TOML file overriding sampling parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run against generated data instead of the API
    #[arg(long)]
    synthetic: bool,
}

// ---------------------------------------------------------------------------
// Setup helpers
// ---------------------------------------------------------------------------

fn parse_config(text: &str) -> Result<SamplingConfig> {
    let config: SamplingConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

fn load_config(path: Option<&Path>) -> Result<SamplingConfig> {
    let Some(path) = path else {
        return Ok(SamplingConfig::default());
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    parse_config(&text).with_context(|| format!("Invalid config {}", path.display()))
}

fn credentials() -> Result<(String, String)> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to load .env");
        }
    }

    let username = std::env::var(USERNAME_VAR).with_context(|| format!("{USERNAME_VAR} is not set"))?;
    let password = std::env::var(PASSWORD_VAR).with_context(|| format!("{PASSWORD_VAR} is not set"))?;
    Ok((username, password))
}

fn generate<S: DataSource>(
    source: &S,
    project: u32,
    range: DateRange,
    config: &SamplingConfig,
    output: &Path,
) -> Result<RunSummary> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = SampleWriter::new(BufWriter::new(file));

    let summary = run_project(source, project, range, config, &mut writer)?;
    writer.into_inner()?;
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let range = DateRange::new(
        args.start,
        args.end.unwrap_or_else(|| Local::now().date_naive()),
    );
    if range.start > range.end {
        bail!("Start date {} is after end date {}", range.start, range.end);
    }

    info!(
        "Sampling project {} from {} to {} into {}",
        args.project,
        range.start,
        range.end,
        args.output.display()
    );

    let summary = if args.synthetic {
        info!("Generating {} days of synthetic readings", synthetic::HISTORY_DAYS);
        let source = synthetic::project(args.project, range.start);
        generate(&source, args.project, range, &config, &args.output)?
    } else {
        let (username, password) = credentials()?;
        info!("Logging in...");
        let client = ApiClient::connect(&args.api_host)?;
        client.login(&username, &password)?;
        generate(&client, args.project, range, &config, &args.output)?
    };

    info!(
        "Finished: {} samples, {} bytes from {} groups ({} without data, {} duplicates dropped)",
        summary.records_written,
        summary.bytes_written,
        summary.groups,
        summary.groups_without_data,
        summary.collisions
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use talaria_core::Channel;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["talaria-sampler", "--project", "456", "-o", "out.bin"]).unwrap();
        assert_eq!(args.project, 456);
        assert_eq!(args.api_host, DEFAULT_HOST);
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2005, 1, 1).unwrap());
        assert_eq!(args.end, None);
        assert!(!args.synthetic);
    }

    #[test]
    fn test_args_reject_bad_date() {
        let result = Args::try_parse_from([
            "talaria-sampler",
            "--project",
            "1",
            "-o",
            "out.bin",
            "--start",
            "01/02/2010",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_config_overrides() {
        let config = parse_config("channel = \"engineering\"\ndiscard_above = 600000000.0\n").unwrap();
        assert_eq!(config.channel, Channel::Engineering);
        assert_eq!(config.discard_above, Some(600_000_000.0));
        assert_eq!(config.window_samples, SamplingConfig::default().window_samples);
    }

    #[test]
    fn test_parse_config_rejects_invalid() {
        assert!(parse_config("window_samples = 1\n").is_err());
        assert!(parse_config("poly_order = \"three\"\n").is_err());
    }
}
