use std::{path::Path, sync::Arc};

use clap::Parser;
use mailsweep::{
    AppState, build_app,
    config::AppConfig,
    observability,
    retention::{self, RetentionPolicy, ScanStats},
    store::{DataStore, DirDataStore},
};
use tokio_util::sync::CancellationToken;

/// CLI arguments for mailsweep
#[derive(Parser, Debug)]
#[command(version, about = "Mail store retention sweeper", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (built-in defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the retention scanner and the stats server (default)
    Serve,
    /// Run a single retention pass now and print the result
    Scan,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Scan) => run_scan(args.config.as_deref()).await,
        Some(Command::Serve) | None => run_server(args.config.as_deref()).await,
    }
}

/// Load the config and initialize logging and metrics, exiting on failure.
fn load_config(path: Option<&str>) -> AppConfig {
    let config = match path {
        Some(path) => match AppConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => AppConfig::default(),
    };

    if let Err(e) = observability::init_tracing(&config.observability.logging) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics: {e}");
    }

    config
}

async fn open_store(root: &Path) -> Arc<dyn DataStore> {
    match DirDataStore::open(root).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "Failed to open mail store");
            std::process::exit(1);
        }
    }
}

async fn run_scan(config_path: Option<&str>) {
    let config = load_config(config_path);
    let policy = RetentionPolicy::from(&config.datastore);

    if !policy.enabled {
        eprintln!(
            "Error: retention is disabled (datastore.retention_minutes = {})",
            config.datastore.retention_minutes
        );
        std::process::exit(1);
    }

    let store = open_store(&config.datastore.path).await;
    let stats = ScanStats::new(&policy);

    match retention::run_pass(
        store.as_ref(),
        policy.max_age,
        policy.inter_item_sleep,
        &stats,
    )
    .await
    {
        Ok(pass) => match serde_json::to_string_pretty(&pass) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: failed to serialize scan result: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_server(config_path: Option<&str>) {
    let config = load_config(config_path);

    tracing::info!(
        config_file = config_path.unwrap_or("<defaults>"),
        datastore = %config.datastore.path.display(),
        "Starting mailsweep"
    );

    let policy = RetentionPolicy::from(&config.datastore);
    let stats = Arc::new(ScanStats::new(&policy));
    let shutdown = CancellationToken::new();

    // The store root only has to exist when retention runs
    let store: Arc<dyn DataStore> = if policy.enabled {
        open_store(&config.datastore.path).await
    } else {
        Arc::new(DirDataStore::new(&config.datastore.path))
    };
    let scanner =
        retention::start_retention_scanner(store, policy, Arc::clone(&stats), shutdown.clone());

    let state = AppState {
        config: Arc::new(config.clone()),
        stats,
    };
    let app = build_app(&config, state);

    let bind_addr = config.server.bind_addr();
    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, address = %bind_addr, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on http://{}", bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // Covers the server exiting on its own as well as via the signal
    shutdown.cancel();

    if let Some(handle) = scanner {
        match tokio::time::timeout(config.server.shutdown_timeout(), handle).await {
            Ok(Ok(())) => tracing::info!("Retention scanner shut down cleanly"),
            Ok(Err(e)) => tracing::error!(error = %e, "Retention scanner task failed"),
            Err(_) => tracing::warn!("Timeout waiting for retention scanner to stop"),
        }
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping retention scanner...");
    shutdown.cancel();
}
