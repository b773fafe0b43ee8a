//! fanout - run a batch of prompts with bounded concurrency.
//!
//! ```text
//! main() -> config -> BoundedExecutor + ClientHandle -> handle.get()
//!                                                         |
//!                       prompts (file | stdin) -> run_prompts() -> JSON lines on stdout
//! ```
//!
//! Logs go to stderr; stdout carries one result line per prompt.

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fanout::{parse_prompts, render_line, run_prompts};
use fanout_config::FanoutConfig;
use fanout_executor::BoundedExecutor;
use fanout_providers::{ClientDefaults, ClientHandle};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompts from {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("failed to read prompts from stdin")?;
            Ok(input)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let prompts_path = std::env::args_os().nth(1).map(PathBuf::from);

    let config = FanoutConfig::load().context("failed to load configuration")?;
    let limit =
        FanoutConfig::concurrency(config.as_ref()).context("failed to resolve concurrency")?;
    let defaults = ClientDefaults {
        base_url: config.as_ref().and_then(FanoutConfig::base_url),
        model: config.as_ref().and_then(FanoutConfig::model),
    };

    let executor = BoundedExecutor::new(limit);
    let handle = ClientHandle::with_defaults(defaults);
    handle
        .get()
        .context("completion client is not configured")?;

    let prompts = parse_prompts(&read_input(prompts_path.as_ref())?);
    tracing::info!(
        prompts = prompts.len(),
        concurrency = limit.get(),
        "Starting batch"
    );

    let results = run_prompts(&executor, &handle, prompts).await;

    let mut stdout = std::io::stdout().lock();
    for (index, outcome) in results.iter().enumerate() {
        writeln!(stdout, "{}", render_line(index, outcome)).context("failed to write results")?;
    }
    stdout.flush().context("failed to flush results")?;

    tracing::info!(
        succeeded = results.success_count(),
        failed = results.failure_count(),
        "Batch complete"
    );
    Ok(())
}
