//! batchfetch command-line entry point.
//!
//! Results are printed to stdout as JSON. Logging goes to stderr so the
//! output stays machine-readable.

use std::path::PathBuf;

use anyhow::{Context, Result};
use batchfetch_client::FetchSession;
use batchfetch_core::{BatchResults, BatchSummary, RequestSpec, SessionConfig};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "batchfetch")]
#[command(author, version, about = "Fetch URLs concurrently through a TTL disk cache", long_about = None)]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

/// Flags layered over the loaded configuration.
#[derive(Args)]
struct SessionArgs {
    /// Enable the disk cache in this directory
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Cache entry lifetime in seconds
    #[arg(long, global = true)]
    cache_age: Option<u64>,

    #[arg(long, global = true)]
    user_agent: Option<String>,

    /// -1 unlimited, 0 disabled, n bounded
    #[arg(long, global = true, allow_hyphen_values = true)]
    max_redirects: Option<i64>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a single URL
    Fetch {
        url: String,

        /// Referer header, defaults to the URL itself
        #[arg(long)]
        referer: Option<String>,

        /// Send this form-encoded body as a POST
        #[arg(long)]
        data: Option<String>,

        /// Skip response header capture
        #[arg(long)]
        no_headers: bool,

        /// Always go to the network
        #[arg(long)]
        bypass_cache: bool,
    },
    /// Fetch many URLs with bounded concurrency
    Batch {
        #[arg(required = true, num_args = 2..)]
        urls: Vec<String>,

        /// Prefix for relative URLs
        #[arg(long, default_value = "")]
        base_url: String,

        /// Maximum exchanges in flight
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

#[derive(Serialize)]
struct BatchReport<'a> {
    summary: BatchSummary,
    results: &'a BatchResults,
}

impl SessionArgs {
    fn apply(self, config: &mut SessionConfig) -> Result<()> {
        if let Some(dir) = self.cache_dir {
            config.cache = true;
            config.cache_directory = Some(dir);
        }
        if let Some(age) = self.cache_age {
            config.cache_age = age;
        }
        if let Some(agent) = self.user_agent {
            config.user_agent = agent;
        }
        if let Some(count) = self.max_redirects {
            config.set_max_redirects(count)?;
        }
        Ok(())
    }
}

fn init_logging(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let mut config = SessionConfig::load().context("loading configuration")?;
    cli.session.apply(&mut config)?;
    let default_concurrency = config.max_concurrency;

    let session = FetchSession::new(config)?;

    match cli.command {
        Command::Fetch { url, referer, data, no_headers, bypass_cache } => {
            let mut spec = RequestSpec::new(url).capture_headers(!no_headers);
            if let Some(referer) = referer {
                spec = spec.with_referer(referer);
            }
            if let Some(data) = data {
                spec = spec.with_body(data);
            }
            let result = session.fetch(&spec, bypass_cache).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Batch { urls, base_url, concurrency } => {
            let results = session
                .fetch_all(urls, &base_url, concurrency.unwrap_or(default_concurrency))
                .await?;
            let report = BatchReport { summary: BatchSummary::from_results(&results), results: &results };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
