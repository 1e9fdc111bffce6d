use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use swell_forecast::cache::MemoryCache;
use swell_forecast::config::Config;
use swell_forecast::db::Repository;
use swell_forecast::freshness::FreshnessPolicy;
use swell_forecast::orchestrator::ForecastService;
use swell_forecast::scheduler::Scheduler;
use swell_forecast::server::ApiServer;
use swell_forecast::sources::build_sources;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,swell_forecast=debug,sqlx=warn,tower_http=info")
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Swell forecast service starting...");

    let config_path =
        std::env::var("SWELL_CONFIG").unwrap_or_else(|_| "config/config.yaml".to_string());
    let config = Config::load(&config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration from {}: {}\n\n\
             Make sure:\n\
             1. The config file exists (set SWELL_CONFIG to override the path)\n\
             2. All required environment variables are set (check .env.example)\n\
             3. Create a .env file if needed",
            config_path,
            e
        )
    })?;
    info!("Configuration loaded");

    let connection_string = config.database.connection_string();
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&connection_string)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to connect to database: {}\n\n\
                 Host: {}:{}\n\
                 Database: {}\n\
                 User: {}\n\n\
                 Common fixes:\n\
                 1. Ensure PostgreSQL is running\n\
                 2. Check username/password are correct (DB_USER, DB_PASSWORD)\n\
                 3. Verify database exists: createdb {}\n\
                 4. Check host and port (DB_HOST, DB_PORT)",
                e,
                config.database.host,
                config.database.port,
                config.database.name,
                config.database.user,
                config.database.name
            )
        })?;

    info!(
        "Connected to database: {}@{}:{}/{}",
        config.database.user, config.database.host, config.database.port, config.database.name
    );

    let repository = Arc::new(Repository::new(pool));
    repository.run_migrations().await?;

    let sources = build_sources(&config.sources)?;
    let service = Arc::new(
        ForecastService::new(repository, Arc::new(MemoryCache::new()), sources)
            .with_freshness(FreshnessPolicy::from_hours(config.freshness.max_age_hours))
            .with_source_timeout(config.sources.call_budget())
            .with_aggregate_ttl(Duration::from_secs(config.cache.aggregate_ttl_seconds)),
    );

    // Set up shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let scheduler_handle = if config.scheduler.enabled {
        let mut scheduler =
            Scheduler::new(config.scheduler.clone(), service.clone(), shutdown_rx.clone());
        Some(tokio::spawn(async move { scheduler.run().await }))
    } else {
        info!("Scheduled refresh disabled");
        None
    };

    let mut server_shutdown = shutdown_rx.clone();
    let server = ApiServer::new(service);
    let served = server
        .serve(&config.server.bind_addr, async move {
            let _ = server_shutdown.changed().await;
        })
        .await;

    if let Some(handle) = scheduler_handle {
        if served.is_err() {
            // No shutdown signal will arrive for the scheduler
            handle.abort();
        }
        if let Err(e) = handle.await {
            if !e.is_cancelled() {
                error!("Scheduler task failed: {}", e);
            }
        }
    }

    served?;

    info!("Swell forecast service shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
