//! the `serve` subcommand - runs the rotation agent.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use color_eyre::eyre::{Context, Result};
use spokemint_hub::{MemoryHub, RequestCache};
use spokemint_types::{Config, Request};
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

use crate::{Controller, RotationPolicy, TokenRotator};

/// default config file search paths (in order of priority).
const CONFIG_SEARCH_PATHS: &[&str] = &[
    "/etc/spokemint/config.toml",
    "~/.config/spokemint/config.toml",
    "./config.toml",
];

/// run the rotation agent
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// path to config file (toml format)
    #[arg(short, long, env = "SPOKEMINT_CONFIG")]
    config: Option<PathBuf>,

    /// address for the health endpoint
    #[arg(long, env = "SPOKEMINT_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// spoke namespace identities are created in
    #[arg(long, env = "SPOKEMINT_SPOKE_NAMESPACE")]
    spoke_namespace: Option<String>,

    /// rotate once remaining token lifetime drops below this many seconds
    #[arg(long, env = "SPOKEMINT_REFRESH_THRESHOLD_SECS")]
    refresh_threshold_secs: Option<u64>,

    /// seconds between full resyncs of every request
    #[arg(long, env = "SPOKEMINT_RESYNC_INTERVAL_SECS")]
    resync_interval_secs: Option<u64>,

    /// deadline for each remote call, in seconds
    #[arg(long, env = "SPOKEMINT_REMOTE_TIMEOUT_SECS")]
    remote_timeout_secs: Option<u64>,

    /// log level
    #[arg(long, env = "SPOKEMINT_LOG_LEVEL")]
    log_level: Option<String>,
}

impl ServeCommand {
    /// find and load a config file, returning none if no config file is found.
    fn load_config_file(config_path: Option<&PathBuf>) -> Result<Option<Config>> {
        // an explicitly provided path must exist
        if let Some(path) = config_path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("failed to parse config file: {:?}", path))?;
            return Ok(Some(config));
        }

        // search default paths
        for path_str in CONFIG_SEARCH_PATHS {
            let path = expand_tilde::expand_tilde(path_str)
                .map(|p| p.into_owned())
                .unwrap_or_else(|_| PathBuf::from(path_str));
            if path.exists() {
                debug!("found config file at {:?}", path);
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file: {:?}", path))?;
                let config: Config = toml::from_str(&content)
                    .with_context(|| format!("failed to parse config file: {:?}", path))?;
                return Ok(Some(config));
            }
        }

        Ok(None)
    }

    /// convert cli arguments into a config struct, merging with a config
    /// file if present.
    ///
    /// priority order: defaults -> config file -> cli flags
    fn into_config(self) -> Result<Config> {
        let mut config = match Self::load_config_file(self.config.as_ref())? {
            Some(file_config) => {
                info!("loaded configuration from file");
                file_config
            }
            None => {
                debug!("no config file found, using defaults");
                Config::default()
            }
        };

        // cli overrides (only if explicitly set)
        if let Some(listen_addr) = self.listen_addr {
            config.listen_addr = listen_addr;
        }
        if let Some(spoke_namespace) = self.spoke_namespace {
            config.spoke_namespace = spoke_namespace;
        }
        if let Some(secs) = self.refresh_threshold_secs {
            config.rotation.refresh_threshold_secs = secs;
        }
        if let Some(secs) = self.resync_interval_secs {
            config.controller.resync_interval_secs = secs;
        }
        if let Some(secs) = self.remote_timeout_secs {
            config.controller.remote_timeout_secs = secs;
        }

        Ok(config)
    }

    /// run the serve command
    pub async fn run(self) -> Result<()> {
        // initialize logging (use cli override or default to info)
        let log_level_str = self.log_level.clone().unwrap_or_else(|| "info".to_string());
        let log_level = match log_level_str.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };

        let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
        tracing::subscriber::set_global_default(subscriber)?;

        info!("starting spokemint...");

        let config = self.into_config()?;
        info!("listen address: {}", config.listen_addr);
        info!("spoke namespace: {}", config.spoke_namespace);

        // built-in hub, seeded from config
        let hub = MemoryHub::new();
        for seed in &config.requests {
            let validity = seed
                .validity_secs
                .unwrap_or(config.rotation.default_validity_secs);
            hub.upsert_spec(Request::new(
                seed.namespace.clone(),
                seed.name.clone(),
                validity,
            ))
            .await
            .with_context(|| format!("failed to seed request {}/{}", seed.namespace, seed.name))?;
            info!(
                request = %format!("{}/{}", seed.namespace, seed.name),
                validity_secs = validity,
                "seeded request"
            );
        }

        // spoke backend and the ca bundle source that goes with it
        let (spoke, trust_anchor) = spokemint_spoke::from_config(&config.spoke);

        let cache = RequestCache::new();
        let rotator = Arc::new(TokenRotator::new(
            cache.clone(),
            hub.clone(),
            spoke,
            trust_anchor,
            config.spoke_namespace.clone(),
            RotationPolicy::from_config(&config.rotation),
            Duration::from_secs(config.controller.remote_timeout_secs),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let controller = Controller::new(
            hub.clone(),
            cache,
            rotator,
            config.controller.clone(),
            shutdown_rx,
        );
        let controller_handle = tokio::spawn(controller.run());

        // health endpoint
        let app = crate::router(hub.clone());
        let addr: SocketAddr = config
            .listen_addr
            .parse()
            .context("invalid listen address")?;

        info!("starting http server on {}", addr);
        let listener = TcpListener::bind(addr).await?;

        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;
        let graceful = async move {
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                _ = sigint.recv() => info!("received SIGINT, shutting down"),
            }
            let _ = shutdown_tx.send(true);
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(graceful)
            .await
            .context("server error")?;

        // wait for in-flight passes to finish
        match controller_handle.await {
            Ok(Ok(())) => info!("controller stopped cleanly"),
            Ok(Err(err)) => error!("controller exited with error: {}", err),
            Err(err) => error!("controller task failed: {}", err),
        }

        Ok(())
    }
}
