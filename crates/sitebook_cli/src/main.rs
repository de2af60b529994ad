//! `sitebook`: crawl a documentation site and compile it into one document.
//!
//! Exit codes: 0 when the compiled document (or, for table export, the CSV
//! files) was written, 1 when the run finished without it (stopped, cancelled
//! or artifacts missing), 2 on a setup error.

mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use engine_logging::{engine_info, engine_warn, Verbosity};
use sitebook_engine::{prepare, run, Collaborators, SiteConfig};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "sitebook", version, about = "Crawl a site and compile its pages into one document")]
struct Cli {
    /// RON configuration file; every field has a default.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed URL, overriding `seed_url` from the configuration.
    #[arg(long)]
    seed: Option<String>,

    /// Site version used in output names, skipping changelog discovery.
    #[arg(long = "site-version")]
    site_version: Option<String>,

    /// Directory the run folder is created in.
    #[arg(short, long)]
    export_dir: Option<PathBuf>,

    /// Continue from the checkpoint of an earlier run.
    #[arg(long)]
    resume: bool,

    /// More output: -v info, -vv debug, -vvv trace.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn load_config(&self) -> Result<SiteConfig> {
        let mut config = match &self.config {
            Some(path) => SiteConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => SiteConfig::default(),
        };
        if let Some(seed) = &self.seed {
            config.seed_url = seed.clone();
        }
        if let Some(version) = &self.site_version {
            config.version = Some(version.clone());
        }
        if let Some(dir) = &self.export_dir {
            config.export_dir = dir.clone();
        }
        if self.resume {
            config.resume = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run_cli(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether the run produced its final output.
async fn run_cli(cli: Cli) -> Result<bool> {
    let verbosity = Verbosity::from_count(cli.verbose);
    let config = cli.load_config()?;
    let collaborators = Collaborators::http(&config);

    let cancel = CancellationToken::new();
    let prepared = prepare(config, collaborators, cancel.clone())
        .await
        .context("preparing the run")?
        .with_clock(Arc::new(|| chrono::Utc::now().to_rfc3339()));

    logging::initialize(verbosity, &prepared.layout().log_file());
    if verbosity == Verbosity::Params {
        engine_info!("configuration: {:?}", prepared.context().config);
    }
    engine_info!(
        "run {} in {}{}",
        prepared.layout().identifier(),
        prepared.layout().root().display(),
        if prepared.is_resumed() { " (resumed)" } else { "" }
    );

    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                engine_warn!("interrupted; finishing the current page");
                cancel.cancel();
            }
        }
    });

    let report = run(prepared).await.context("running the crawl")?;
    watcher.abort();

    println!("{report}");
    Ok(report.succeeded())
}
