use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use relay_server::{ServerConfig, UpstreamLauncher, UpstreamParts};
use relay_store::FileCredentialStore;
use relay_telemetry::{LogFormat, TelemetryConfig};
use relay_upstream::{CommandListener, CommandRegistrar, CommandSpec};

/// Relays push notifications to local WebSocket subscribers.
#[derive(Debug, Parser)]
#[command(name = "push-relay", version)]
struct Cli {
    /// HTTP service address.
    #[arg(long, default_value = "localhost:8082")]
    addr: String,

    /// Also write the legacy single-token credential file.
    #[arg(long)]
    backward: bool,

    /// Push service application config.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Cached device credentials.
    #[arg(long, default_value = "device.json")]
    device: PathBuf,

    /// Legacy credential file written with --backward.
    #[arg(long, default_value = "fcm_cred.json")]
    legacy_cred: PathBuf,

    /// Helper that registers a device: app config on stdin,
    /// {"credentials":..,"token":..} on stdout.
    #[arg(long)]
    register_cmd: String,

    /// Helper that listens for pushes: app config and credentials on
    /// stdin, one notification JSON object per stdout line.
    #[arg(long)]
    listener_cmd: String,

    /// Outbound queue size per subscriber.
    #[arg(long, default_value_t = 256, value_parser = clap::value_parser!(u64).range(1..))]
    queue_capacity: u64,

    /// Log level (overridden by RUST_LOG).
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _ = relay_telemetry::init_telemetry(&TelemetryConfig {
        log_level: cli.log_level,
        format: if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        ..Default::default()
    });

    let app = relay_store::load_app_config(&cli.config).context("Could not read config")?;
    let register_spec =
        CommandSpec::parse(&cli.register_cmd).context("--register-cmd must not be empty")?;
    let listener_spec =
        CommandSpec::parse(&cli.listener_cmd).context("--listener-cmd must not be empty")?;

    let (launcher, mut fatal_rx) = UpstreamLauncher::new(UpstreamParts {
        app,
        store: Arc::new(FileCredentialStore::new(&cli.device)),
        registrar: Arc::new(CommandRegistrar::new(register_spec)),
        listener: Arc::new(CommandListener::new(listener_spec)),
        legacy_token_path: cli.backward.then(|| cli.legacy_cred.clone()),
    });

    let config = ServerConfig {
        addr: cli.addr.clone(),
        queue_capacity: usize::try_from(cli.queue_capacity).context("--queue-capacity is too large")?,
        ..Default::default()
    };
    let handle = relay_server::start(config, Arc::new(launcher)).await?;
    tracing::info!(addr = %handle.addr, "Push relay ready");

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for ctrl+c")?;
            tracing::info!("Shutting down");
            handle.shutdown().await;
            Ok(())
        }
        Some(err) = fatal_rx.recv() => {
            tracing::error!(kind = err.error_kind(), error = %err, "Fatal upstream error");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 5] = ["push-relay", "--register-cmd", "reg", "--listener-cmd", "listen"];

    #[test]
    fn queue_capacity_defaults_to_256() {
        let cli = Cli::try_parse_from(REQUIRED).unwrap();
        assert_eq!(cli.queue_capacity, 256);
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let args = REQUIRED.iter().copied().chain(["--queue-capacity", "0"]);
        assert!(Cli::try_parse_from(args).is_err());
    }
}
