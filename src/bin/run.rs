//! One-shot discovery run over stdin/stdout.
//!
//! Reads a `ClientProfile` as JSON from stdin, runs the pipeline and writes
//! the `PipelineResult` as JSON to stdout. Tracing goes to stderr so stdout
//! stays clean JSON.
//!
//! ```text
//! rivalscope-run [--config <path>] [--deadline <secs>] < profile.json
//! ```
//!
//! Without `--config` the default config path is used when it exists,
//! built-in defaults otherwise.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use rivalscope::{ClientProfile, CompetitorPipeline, DiscoveryConfig};
use tokio_util::sync::CancellationToken;

struct Args {
    config: Option<PathBuf>,
    deadline: Option<Duration>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        config: None,
        deadline: None,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--deadline" => {
                let secs: u64 = args
                    .next()
                    .context("--deadline needs a number of seconds")?
                    .parse()
                    .context("--deadline must be a whole number of seconds")?;
                parsed.deadline = Some(Duration::from_secs(secs));
            }
            "-h" | "--help" => {
                eprintln!("usage: rivalscope-run [--config <path>] [--deadline <secs>] < profile.json");
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(parsed)
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<DiscoveryConfig> {
    match path {
        Some(path) => DiscoveryConfig::from_file(&path)
            .with_context(|| format!("cannot load config from {}", path.display())),
        None => {
            let path = DiscoveryConfig::default_config_path();
            if path.exists() {
                tracing::info!(path = %path.display(), "using config file");
                DiscoveryConfig::from_file(&path)
                    .with_context(|| format!("cannot load config from {}", path.display()))
            } else {
                Ok(DiscoveryConfig::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;
    let config = load_config(args.config)?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("cannot read profile from stdin")?;
    let profile: ClientProfile =
        serde_json::from_str(&input).context("stdin is not a valid client profile")?;

    let pipeline = CompetitorPipeline::from_config(config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received Ctrl+C, cancelling run");
            ctrl_c.cancel();
        }
    });
    if let Some(deadline) = args.deadline {
        let expiry = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            tracing::warn!(?deadline, "deadline reached, cancelling run");
            expiry.cancel();
        });
    }

    let result = pipeline.run(&profile, cancel).await.map_err(|e| {
        tracing::error!(error = %e, "discovery run failed");
        anyhow::anyhow!("discovery failed: {e}")
    })?;

    let json = serde_json::to_string_pretty(&result)?;
    println!("{json}");
    Ok(())
}
