use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use openebs_exporter::collectors::{
    self, PoolCollector, PoolSyncCollector, ScrapeRegistry, VolumeCollector, ZvolListCollector,
    ZvolStatsCollector,
};
use openebs_exporter::config::Config;
use openebs_exporter::metrics::{
    PoolMetrics, PoolSyncMetrics, VolumeMetrics, ZvolListMetrics, ZvolStatsMetrics,
};
use openebs_exporter::server;
use openebs_exporter::source::runner::{CommandRunner, Runner, LIVENESS_TIMEOUT};
use openebs_exporter::source::{cstor::CstorSource, jiva::JivaSource, VolumeSource};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config/Default.toml")]
    config: String,

    /// Address on which to expose metrics (overrides config)
    #[arg(short = 'a', long = "listen.addr", env = "LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Path under which to expose metrics (overrides config)
    #[arg(short = 'm', long = "listen.path", env = "LISTEN_PATH")]
    metrics_path: Option<String>,

    /// Jiva volume controller address (overrides config)
    #[arg(short = 'c', long = "controller.addr", env = "CONTROLLER_ADDR")]
    controller_addr: Option<String>,

    /// Storage engine this sidecar sits next to: jiva, cstor or pool
    #[arg(short = 'e', long = "storage.engine", env = "STORAGE_ENGINE")]
    storage_engine: Option<String>,

    /// istgt control socket for the cstor engine (overrides config)
    #[arg(short = 's', long = "socket-path", env = "SOCKET_PATH")]
    socket_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting OpenEBS exporter v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(addr) = args.listen_addr {
        config.server.listen_addr = addr;
    }
    if let Some(path) = args.metrics_path {
        config.server.metrics_path = path;
    }
    if let Some(addr) = args.controller_addr {
        config.source.controller_addr = addr;
    }
    if let Some(engine) = args.storage_engine {
        config.source.engine = engine;
    }
    if let Some(path) = args.socket_path {
        config.source.socket_path = path;
    }

    info!("storage engine: {}", config.source.engine);

    let registry = match build_registry(&config).await {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("Failed to set up collectors: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::start(&config.server, registry).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Wires the collectors for the configured engine. An unknown engine is not
/// fatal: the sidecar stays alive and serves an empty metric set, so the
/// surrounding pod does not crash-loop over a bad flag.
async fn build_registry(config: &Config) -> Result<ScrapeRegistry> {
    let mut registry = ScrapeRegistry::new();

    match config.source.engine.as_str() {
        "jiva" => {
            let source = JivaSource::new(&config.source.controller_addr)?;
            register_volume(&mut registry, Box::new(source))?;
        }
        "cstor" => {
            let source = CstorSource::new(&config.source.socket_path);
            register_volume(&mut registry, Box::new(source))?;
        }
        "pool" => {
            let runner: Arc<dyn Runner> = Arc::new(CommandRunner::new());

            let pool_metrics = PoolMetrics::new()?;
            pool_metrics.register_on(registry.registry())?;
            if config.source.wait_for_pool {
                collectors::pool::wait_for_pools(
                    runner.as_ref(),
                    &pool_metrics.command_error_counter,
                )
                .await;
            }
            registry.register(Arc::new(PoolCollector::new(
                runner.clone(),
                pool_metrics,
            )));

            let stats_metrics = ZvolStatsMetrics::new()?;
            stats_metrics.register_on(registry.registry())?;
            registry.register(Arc::new(ZvolStatsCollector::new(
                runner.clone(),
                stats_metrics,
            )));

            let list_metrics = ZvolListMetrics::new()?;
            list_metrics.register_on(registry.registry())?;
            registry.register(Arc::new(ZvolListCollector::new(runner, list_metrics)));

            let sync_metrics = PoolSyncMetrics::new()?;
            sync_metrics.register_on(registry.registry())?;
            let sync_runner: Arc<dyn Runner> =
                Arc::new(CommandRunner::with_timeout(LIVENESS_TIMEOUT));
            registry.register(Arc::new(PoolSyncCollector::new(sync_runner, sync_metrics)));
        }
        other => {
            warn!("unknown storage engine {:?}, serving no metrics", other);
        }
    }

    Ok(registry)
}

fn register_volume(registry: &mut ScrapeRegistry, source: Box<dyn VolumeSource>) -> Result<()> {
    let metrics = VolumeMetrics::new()?;
    metrics.register_on(registry.registry())?;
    registry.register(Arc::new(VolumeCollector::new(source, metrics)));
    Ok(())
}
