//! concli demo entry point.
//!
//! Starts several host instances that share one console. The first instance
//! answers to `h`, `q`, `s` and `r`; the second to `h1`, `q1`, `s1`, `r1`,
//! and so on. The process exits once every instance has been quit or standard
//! input is closed.
//!
//! Usage: `concli-app [instances]`. Set `CONCLI_CONFIG` to a TOML file to
//! tune the engine.

mod commands;
mod host;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use concli_engine::{CliEngine, EngineConfig, stdin_source};
use host::Host;

/// How often the main thread checks whether it can exit.
const EXIT_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Slack on top of the pool's own shutdown budget, so a forced shutdown that
/// finishes at the very end of that budget is still reported as such.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// How long to wait for a pending console shutdown to report.
fn shutdown_wait(pool_timeout: Duration) -> Duration {
    pool_timeout + SHUTDOWN_GRACE
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::var_os("CONCLI_CONFIG") {
        Some(path) => {
            let path = PathBuf::from(path);
            EngineConfig::load(&path)
                .with_context(|| format!("loading engine config {}", path.display()))?
        },
        None => EngineConfig::default(),
    };
    let instances = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<usize>())
        .transpose()
        .context("instance count must be a non-negative integer")?
        .unwrap_or(2)
        .max(1);
    let wait_budget = shutdown_wait(config.shutdown_timeout());

    let engine = Arc::new(CliEngine::new(config)?);
    let hosts: Vec<Arc<Host>> = (0..instances)
        .map(|i| Host::new(format!("instance-{i}"), Arc::clone(&engine)))
        .collect();
    for host in &hosts {
        host.start()
            .with_context(|| format!("starting {}", host.name()))?;
    }
    log::info!("{instances} instances sharing the console");

    let stdin = stdin_source();
    while !hosts.iter().all(|h| h.is_finished()) {
        if stdin.is_closed() && stdin.buffered() == 0 {
            log::info!("standard input closed, stopping all instances");
            for host in &hosts {
                host.quit();
            }
            break;
        }
        std::thread::sleep(EXIT_CHECK_INTERVAL);
    }

    for host in &hosts {
        if let Some(pending) = host.take_shutdown() {
            let outcome = pending
                .wait(wait_budget)
                .context("console shutdown failed")?;
            log::debug!("console shut down: {outcome:?}");
        }
    }
    Ok(())
}
