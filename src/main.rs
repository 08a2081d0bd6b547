use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use nativebridge::{BridgeConfig, MemoryTransport, NativeBridge, RecordingTransport, ScriptHost};
use tracing_subscriber::EnvFilter;

fn main() {
    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let mut args = std::env::args().skip(1);
    let Some(script_path) = args.next().map(PathBuf::from) else {
        eprintln!("usage: nativebridge <script.js> [config.yaml]");
        std::process::exit(2);
    };
    let config_path = args.next().map(PathBuf::from);

    if let Err(err) = run(script_path, config_path) {
        eprintln!("nativebridge: {err:#}");
        std::process::exit(1);
    }
}

fn run(script_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = BridgeConfig::load(config_path).context("failed to load bridge config")?;
    let source = fs::read_to_string(&script_path)
        .with_context(|| format!("failed to read {}", script_path.display()))?;

    let transport = RecordingTransport::wrap(MemoryTransport::new());
    let log = transport.log();
    let host = ScriptHost::new(NativeBridge::with_config(transport, &config))?;

    let filename = script_path.display().to_string();
    let report = host.eval(&source, &filename)?;
    tracing::info!(
        dispatched = report.dispatched,
        failed = report.failed,
        native_calls = log.len(),
        "script turn complete"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for call in log.drain() {
        serde_json::to_writer(&mut out, &call)?;
        writeln!(out)?;
    }
    Ok(())
}
