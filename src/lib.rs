//! Scenewatch - scene-based stream orchestration and alarm debounce.
//!
//! Deployment requests bind an algorithm to a set of camera devices for a
//! time window. Each device gets a stream worker (frames, inference, region
//! filter, debounce) and a heartbeat worker; accepted alarms leave through a
//! bounded queue to a publisher.

#![warn(missing_docs)]

pub mod alarm;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod heartbeat;
pub mod inference;
pub mod platform;
pub mod publisher;
pub mod region;
pub mod scene;
pub mod source;
pub mod stream;
pub mod utils;

use clap::Parser;
use cli::{Cli, Command, ConfigAction};
use config::{Config, load_default_config, resolve_config_path, save_config};
use inference::RemoteDetectorFactory;
use platform::{ConfigSceneMapper, HttpDevicePlatform};
use publisher::{AlarmQueue, build_publisher, spawn_dispatcher};
use region::Region;
use scene::{Collaborators, DeployRequest, SceneManager, load_scenes_file, spawn_expiry_sweep};
use source::SnapshotSource;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use error::{Error, Result};

/// Main entry point for the scenewatch CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    handle_command(cli.command, cli.config.as_deref())
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    // HTTP client internals stay quiet unless -vv is given.
    let filter_str = if quiet {
        "warn".to_string()
    } else {
        match verbose {
            0 => "info,reqwest=warn,hyper=warn,hyper_util=warn".to_string(),
            1 => "debug,reqwest=info,hyper=info,hyper_util=info".to_string(),
            _ => "trace".to_string(),
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    fmt().with_env_filter(filter).init();
}

fn handle_command(command: Command, config_path: Option<&Path>) -> Result<()> {
    match command {
        Command::Serve { scenes } => {
            let config = load_default_config(config_path)?;
            serve(config, scenes.as_deref())
        }
        Command::Config { action } => handle_config_command(action, config_path),
        Command::Region { area, point } => {
            let region = Region::parse(&area)?;
            let verdict = if region.contains(point) {
                "inside"
            } else {
                "outside"
            };
            if region.is_unrestricted() {
                println!("Region is empty, every point passes.");
            } else {
                println!("Region has {} polygon(s).", region.polygons().len());
            }
            println!("Point ({}, {}) is {verdict}.", point.x, point.y);
            Ok(())
        }
    }
}

fn handle_config_command(action: ConfigAction, explicit: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = resolve_config_path(explicit)?;
            if path.exists() {
                println!("Configuration file already exists: {}", path.display());
            } else {
                save_config(&Config::default(), &path)?;
                println!("Created configuration file: {}", path.display());
                println!("\nNext steps:");
                println!("  add an [algorithms.<name>] table and set inference.endpoint");
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_default_config(explicit)?;
            println!("{config:#?}");
            Ok(())
        }
        ConfigAction::Path => {
            let path = resolve_config_path(explicit)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// Build the HTTP-backed collaborators described by `config`.
pub fn build_collaborators(config: &Config) -> Result<Collaborators> {
    Ok(Collaborators {
        platform: Arc::new(HttpDevicePlatform::new(&config.platform)?),
        mapper: Arc::new(ConfigSceneMapper::new(config.algorithms.clone())),
        detectors: Arc::new(RemoteDetectorFactory::new(
            config.inference.endpoint.clone(),
            config.inference.request_timeout(),
        )?),
        source: Arc::new(SnapshotSource::new(
            config.source.snapshot_gateway.clone(),
            Duration::from_secs(config.stream.read_timeout_secs),
        )?),
        alarms: Arc::new(AlarmQueue::new(config.publisher.queue_capacity)),
    })
}

fn serve(config: Config, scenes: Option<&Path>) -> Result<()> {
    let scenes = scenes.map(load_scenes_file).transpose()?.unwrap_or_default();

    let runtime = tokio::runtime::Runtime::new().map_err(|e| Error::Internal {
        message: format!("failed to start async runtime: {e}"),
    })?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || signal.cancel()) {
        warn!("Failed to install Ctrl+C handler: {e}");
    }

    runtime.block_on(run_service(config, scenes, shutdown))
}

async fn run_service(
    config: Config,
    scenes: Vec<DeployRequest>,
    shutdown: CancellationToken,
) -> Result<()> {
    let collaborators = build_collaborators(&config)?;
    let alarms = collaborators.alarms.clone();
    let publisher = build_publisher(&config.publisher)?;

    let dispatcher_cancel = CancellationToken::new();
    let dispatcher = spawn_dispatcher(
        alarms,
        publisher,
        config.publisher.request_timeout(),
        dispatcher_cancel.clone(),
    );

    let manager = Arc::new(SceneManager::new(&config, collaborators));
    let sweep_cancel = CancellationToken::new();
    let sweep = spawn_expiry_sweep(manager.clone(), sweep_cancel.clone());

    for request in scenes {
        let scene_id = request.scene_id.clone();
        match manager.deploy(request).await {
            Ok(report) => info!(
                scene_id = %scene_id,
                deployed = report.deployed_count,
                failed = report.failed_count,
                "Startup scene deployed"
            ),
            Err(e) => error!(scene_id = %scene_id, error = %e, "Startup scene rejected"),
        }
    }

    info!(
        scenes = manager.list_scenes().len(),
        streams = manager.registry_stats().total,
        "Scenewatch running, press Ctrl+C to stop"
    );
    shutdown.cancelled().await;
    info!("Shutting down");

    sweep_cancel.cancel();
    if let Err(e) = sweep.await {
        warn!(error = %e, "Expiry sweep task failed");
    }
    manager.shutdown().await;

    dispatcher_cancel.cancel();
    if let Err(e) = dispatcher.await {
        warn!(error = %e, "Alarm dispatcher task failed");
    }
    Ok(())
}
