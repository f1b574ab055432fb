//! staticmap - render static map images from slippy-map tiles.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use staticmap::{
    config::Config,
    server::{create_router, RouterConfig},
    RenderCache, RequestParser, TileMapRenderer,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    // validate() has already checked both of these
    let (cache_config, bounds) = match (config.cache_config(), config.size_bounds()) {
        (Ok(cache_config), Ok(bounds)) => (cache_config, bounds),
        (Err(e), _) | (_, Err(e)) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("staticmap v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Tile source: {}", config.tile_url);
    info!("  Cache dir: {}", cache_config.cache_dir.display());
    if cache_config.is_enabled() {
        info!("  Cache TTL: {}", config.force_cache);
    } else {
        warn!("  Cache: DISABLED - every request is rendered");
    }
    if bounds.is_bounded() {
        info!("  Max size: {}x{}", bounds.max_width, bounds.max_height);
    } else {
        warn!("  Max size: unbounded");
    }

    let engine = match TileMapRenderer::new(config.tile_source(), &config.user_agent_or_default()) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to create tile renderer: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cache = RenderCache::new(engine, cache_config);
    let parser = RequestParser::new(bounds);
    let router = create_router(cache, parser, build_router_config(&config));

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!(
        "    curl -o map.png 'http://{}/map.png?center=52.52,13.405&zoom=12&size=600x300'",
        addr
    );
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "staticmap=debug,tower_http=debug"
    } else {
        "staticmap=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if !config.attribution.is_empty() {
        router_config = router_config.with_attribution(config.attribution.clone());
    }

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
