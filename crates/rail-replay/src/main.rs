//! rail-replay: run a scripted sequence of vault operations.
//!
//! Usage:
//!   rail-replay <config.toml> <script.json>
//!   RAIL_CONFIG=<config.toml> rail-replay <script.json>
//!
//! Prints the event log, per-op results, account balances and aggregate stats
//! as one JSON document on stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use rail_replay::script::{self, Script};
use rail_vault::config::VaultConfig;
use rail_vault::{Clock, ManualClock, SystemClock};
use serde_json::json;
use tracing::info;

/// Config path used when neither an argument nor `RAIL_CONFIG` names one.
const DEFAULT_CONFIG: &str = "rail.toml";

fn paths() -> anyhow::Result<(PathBuf, PathBuf)> {
    resolve_paths(
        std::env::args().skip(1).collect(),
        std::env::var("RAIL_CONFIG").ok(),
    )
}

/// Script is the last argument. An explicit config argument wins over
/// `RAIL_CONFIG`, which wins over [`DEFAULT_CONFIG`].
fn resolve_paths(mut args: Vec<String>, env_config: Option<String>) -> anyhow::Result<(PathBuf, PathBuf)> {
    let script = args
        .pop()
        .context("usage: rail-replay [config.toml] <script.json>")?;
    let config = args
        .pop()
        .or(env_config)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    Ok((PathBuf::from(config), PathBuf::from(script)))
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("rail=info".parse()?),
        )
        .init();

    let (config_path, script_path) = paths()?;
    let config = VaultConfig::load(&config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;
    let content = std::fs::read_to_string(&script_path)
        .with_context(|| format!("read script {}", script_path.display()))?;
    let script: Script = serde_json::from_str(&content).context("parse script")?;

    let start = script.start_time.unwrap_or_else(|| SystemClock.now());
    let clock = ManualClock::new(start);
    let mut built = config.build(Arc::new(clock.clone()))?;
    info!(ops = script.ops.len(), start, "replay starting");

    let results = script::run(&mut built, &clock, &script.ops);
    let failed = results.iter().filter(|r| !r.ok).count();
    info!(ops = results.len(), failed, "replay finished");

    let report = json!({
        "results": results,
        "events": built.vault.events(),
        "accounts": script::account_reports(&built)?,
        "stats": built.vault.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_config_argument_beats_environment() {
        let (config, script) = resolve_paths(
            args(&["cli.toml", "ops.json"]),
            Some("env.toml".to_string()),
        )
        .expect("paths");
        assert_eq!(config, PathBuf::from("cli.toml"));
        assert_eq!(script, PathBuf::from("ops.json"));
    }

    #[test]
    fn test_config_fallbacks() {
        let (config, _) =
            resolve_paths(args(&["ops.json"]), Some("env.toml".to_string())).expect("env");
        assert_eq!(config, PathBuf::from("env.toml"));

        let (config, _) = resolve_paths(args(&["ops.json"]), None).expect("default");
        assert_eq!(config, PathBuf::from(DEFAULT_CONFIG));

        assert!(resolve_paths(Vec::new(), None).is_err());
    }
}
