//! Application assembly and serving.

use crate::cli::RunArgs;
use arc_swap::ArcSwap;
use graxy_core::config::Config;
use graxy_core::lifecycle::signal::SignalHandler;
use graxy_core::lifecycle::{self, Lifecycle, LifecycleEvent};
use graxy_core::metrics::Metrics;
use graxy_provider::CompletionBackend;
use graxy_provider::openai::OpenAIBackend;
use std::sync::Arc;

pub struct Application {
    config: Arc<ArcSwap<Config>>,
    app_router: axum::Router,
    args: RunArgs,
    lifecycle: Arc<dyn Lifecycle>,
}

/// Apply CLI overrides on top of a loaded config.
pub fn effective_config(config: &Config, args: &RunArgs) -> Config {
    let mut config = config.clone();
    if let Some(ref host) = args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config
}

/// Re-read the config file and swap it in, keeping CLI overrides. On failure
/// the live config is left untouched.
pub fn reload_config(args: &RunArgs, live: &ArcSwap<Config>) -> anyhow::Result<()> {
    let new_cfg = effective_config(&Config::load(&args.config)?, args);
    // Listener address, timeouts and body limits are fixed at startup.
    tracing::info!(
        credential_configured = new_cfg.api_key().is_some(),
        model = %new_cfg.model,
        "SIGHUP reload applied"
    );
    live.store(Arc::new(new_cfg));
    Ok(())
}

impl Application {
    /// Load config, build the upstream backend and the router.
    pub fn build(args: &RunArgs) -> anyhow::Result<Self> {
        let config = effective_config(&Config::load_or_default(&args.config), args);

        if config.api_key().is_none() {
            tracing::warn!("OPENAI_API_KEY is not configured; chat requests will fail with 500");
        }

        let backend: Arc<dyn CompletionBackend> = Arc::new(OpenAIBackend::from_config(&config)?);
        tracing::info!(
            backend = backend.identifier(),
            base_url = %config.openai_base_url,
            model = %config.model,
            "Upstream configured"
        );

        let config = Arc::new(ArcSwap::from_pointee(config));
        let state = graxy_server::AppState {
            config: config.clone(),
            backend,
            metrics: Arc::new(Metrics::new()),
        };
        let app_router = graxy_server::build_router(state);

        Ok(Self {
            config,
            app_router,
            args: args.clone(),
            lifecycle: Arc::from(lifecycle::detect_lifecycle()),
        })
    }

    /// Serve HTTP until SIGINT/SIGTERM; SIGHUP reloads the config file.
    pub async fn serve(self) -> anyhow::Result<()> {
        let Self {
            config,
            app_router,
            args,
            lifecycle,
        } = self;

        let (signal_handler, mut shutdown_rx) = SignalHandler::new();

        let reload_target = config.clone();
        let reload_lifecycle = lifecycle.clone();
        let reload_fn = move || {
            reload_lifecycle.notify(LifecycleEvent::Reloading);
            match reload_config(&args, &reload_target) {
                Ok(()) => reload_lifecycle.notify(LifecycleEvent::Reloaded),
                Err(e) => tracing::error!("SIGHUP config reload failed: {e}"),
            }
        };
        tokio::spawn(signal_handler.run(reload_fn));

        let addr = {
            let cfg = config.load();
            format!("{}:{}", cfg.host, cfg.port)
        };

        tracing::info!("Starting HTTP server on {addr}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        lifecycle.notify(LifecycleEvent::Ready);

        let shutdown = async move {
            let _ = shutdown_rx.wait_for(|v| *v).await;
        };
        axum::serve(listener, app_router)
            .with_graceful_shutdown(shutdown)
            .await?;

        lifecycle.notify(LifecycleEvent::Stopping);
        tracing::info!("Server shut down.");
        Ok(())
    }
}
