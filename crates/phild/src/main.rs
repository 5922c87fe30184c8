//! phild — the Phil daemon.
//!
//! Single binary that assembles:
//! - Load-record store (redb)
//! - Compute API client for the managed instance group
//! - Autoscaler cycle driver
//! - REST API (load reports, probes, status)
//!
//! # Usage
//!
//! ```text
//! phild run --config /etc/phil/phil.toml
//! phild check-config --config /etc/phil/phil.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use phil_autoscale::CycleDriver;
use phil_cloud::ComputeClient;
use phil_core::PhilConfig;
use phil_store::Datastore;

#[derive(Parser)]
#[command(name = "phild", about = "Phil autoscaler daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the autoscaler and the API server.
    Run {
        /// Path to phil.toml.
        #[arg(long, default_value = "phil.toml")]
        config: PathBuf,

        /// Emit logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },
    /// Validate a config file and print the effective bounds.
    CheckConfig {
        #[arg(long, default_value = "phil.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, log_json } => {
            let config = load_config(&config)?;
            init_tracing(&config.log.level, log_json);
            run(config).await
        }
        Command::CheckConfig { config } => check_config(&config),
    }
}

fn load_config(path: &Path) -> anyhow::Result<PhilConfig> {
    let config = PhilConfig::from_file(path)?;
    config
        .validate()
        .with_context(|| format!("{} is not a usable config", path.display()))?;
    Ok(config)
}

/// `RUST_LOG` wins over the configured level.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(level)))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn default_directive(level: &str) -> String {
    format!("{level},phil={level}")
}

fn init_tracing(level: &str, json: bool) {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(level));
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn check_config(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let bounds = config.bounds();
    println!("group:            {}", config.group());
    println!("instances:        {}..={}", bounds.minimum, bounds.maximum);
    println!(
        "usage band:       {}..{}",
        bounds.lower_bound_usage, bounds.upper_bound_usage
    );
    println!("check interval:   {}s", bounds.interval.as_secs());
    println!("stage timeout:    {}s", config.stage_timeout().as_secs());
    println!("datastore:        {}", config.datastore.path.display());
    println!("api port:         {}", config.api.port);
    Ok(())
}

async fn run(config: PhilConfig) -> anyhow::Result<()> {
    info!("phil is starting");

    // ── Initialize subsystems ──────────────────────────────────

    if let Some(dir) = config
        .datastore
        .path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        std::fs::create_dir_all(dir)?;
    }
    let datastore = Arc::new(Datastore::new(&config.datastore.path));
    let store = datastore
        .connect()
        .await
        .context("failed to connect to the datastore")?;

    let compute = Arc::new(ComputeClient::new(
        config.api_endpoint(),
        &config.gcloud.project_id,
        config.gcloud.access_token.clone(),
        config.stage_timeout(),
    )?);
    info!(endpoint = config.api_endpoint(), "compute client initialized");

    let driver = CycleDriver::new(compute, datastore, config.group(), config.bounds())
        .with_stage_timeout(config.stage_timeout());
    let ready = driver.subscribe_ready();
    let status = driver.subscribe_status();

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start autoscaler ───────────────────────────────────────

    let autoscale_handle = tokio::spawn(driver.run(shutdown_rx));

    // ── Start API server ───────────────────────────────────────

    let router = phil_api::build_router(phil_api::ApiState {
        store,
        ready,
        status,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    let _ = autoscale_handle.await;

    info!("phil stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const CONFIG: &str = r#"
[gcloud]
projectId = "acme-prod"

[will]
instanceGroupZone = "europe-west1-b"
instanceGroupName = "will-pool"

[autoscale]
minimumNumberOfInstances = 2
maximumNumberOfInstances = 10
loadCheckInterval = 60

[datastore]
path = "/var/lib/phil/loads.redb"
"#;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_config_and_json_flag() {
        let cli = Cli::try_parse_from(["phild", "run", "--config", "x.toml", "--log-json"]).unwrap();
        match cli.command {
            Command::Run { config, log_json } => {
                assert_eq!(config, PathBuf::from("x.toml"));
                assert!(log_json);
            }
            Command::CheckConfig { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn default_directive_covers_phil_targets() {
        assert_eq!(default_directive("debug"), "debug,phil=debug");
    }

    #[test]
    fn load_config_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phil.toml");
        std::fs::write(&path, CONFIG).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.bounds().minimum, 2);
        assert_eq!(config.api.port, 8080);
        assert!(check_config(&path).is_ok());
    }

    #[test]
    fn load_config_rejects_inverted_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phil.toml");
        let inverted = CONFIG.replace("maximumNumberOfInstances = 10", "maximumNumberOfInstances = 1");
        std::fs::write(&path, inverted).unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn shipped_example_config_is_valid() {
        let config = PhilConfig::from_toml_str(include_str!("../phil.example.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.group().to_string(), "europe-west1-b/will-pool");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/phil.toml")).is_err());
    }
}
