use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{Router, http::StatusCode, routing::get};
use clap::Parser;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

mod aggregation;
mod config;
mod db;
mod middleware;
mod models;
mod observability;
mod routes;
mod services;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "adstats.toml";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    pub db: Option<Arc<db::DbPool>>,
    pub services: Option<services::Services>,
}

impl AppState {
    /// Connect to the configured database (if any) and build the services.
    pub async fn new(config: config::AppConfig) -> Result<Self, db::DbError> {
        let (db, services) = if config.database.is_none() {
            tracing::warn!("No database configured, metric queries will be unavailable");
            (None, None)
        } else {
            let pool = db::DbPool::from_config(&config.database).await?;
            if config.database.run_migrations() {
                pool.run_migrations().await?;
            }
            let db = Arc::new(pool);
            let services = services::Services::new(db.clone());
            (Some(db), Some(services))
        };

        Ok(Self {
            config: Arc::new(config),
            db,
            services,
        })
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Aggregation API over daily marketing metrics", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./adstats.toml if it exists)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug, PartialEq)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Bulk load metric records from a delimited file
    ///
    /// The file must start with the header
    /// `date,channel,country,os,impressions,clicks,installs,spend,revenue`.
    Load {
        /// Path to the file
        file: PathBuf,
        /// Field delimiter (use "\t" for tabs)
        #[arg(short, long, default_value = ",")]
        delimiter: String,
    },
}

/// Pick the config file: the explicit path, else `adstats.toml` if present.
fn resolve_config_path(explicit_path: Option<&str>) -> Option<PathBuf> {
    match explicit_path {
        Some(path) => Some(PathBuf::from(path)),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            default.exists().then(|| default.to_path_buf())
        }
    }
}

fn load_config(explicit_path: Option<&str>) -> config::AppConfig {
    let Some(config_path) = resolve_config_path(explicit_path) else {
        return config::AppConfig::default();
    };

    match config::AppConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Failed to load config from {}: {}",
                config_path.display(),
                e
            );
            std::process::exit(1);
        }
    }
}

/// Requests still running after `server.timeout_secs` are answered with 408.
fn timeout_layer(server: &config::ServerConfig) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, server.timeout())
}

pub fn build_app(config: &config::AppConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness))
        .route("/health/ready", get(routes::health::readiness))
        .nest("/api", routes::api_routes())
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ));

    // Layers are applied in reverse order, so CORS runs before the request ID
    if let Some(cors_layer) = config.server.cors.clone().into_layer() {
        app = app.layer(cors_layer);
    }

    app.layer(timeout_layer(&config.server))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = load_config(args.config.as_deref());

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    match args.command {
        Some(Command::Migrate) => run_migrate(config).await,
        Some(Command::Load { file, delimiter }) => run_load(config, &file, &delimiter).await,
        Some(Command::Serve) | None => run_server(config).await,
    }
}

async fn run_server(config: config::AppConfig) {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting adstats"
    );

    let state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application state");
            std::process::exit(1);
        }
    };

    let app = build_app(&config, state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, address = %bind_addr, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on http://{}", bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }

    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests");
}

async fn run_migrate(config: config::AppConfig) {
    if config.database.is_none() {
        eprintln!("Error: Database is not configured. Nothing to migrate.");
        std::process::exit(1);
    }

    tracing::info!("Running database migrations");
    match db::DbPool::from_config(&config.database).await {
        Ok(pool) => match pool.run_migrations().await {
            Ok(()) => tracing::info!("Database migrations completed successfully"),
            Err(e) => {
                tracing::error!(error = %e, "Database migrations failed");
                eprintln!("Error: Database migrations failed: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            eprintln!("Error: Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_load(config: config::AppConfig, file: &Path, delimiter: &str) {
    let delimiter = match services::parse_delimiter(delimiter) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };
    let Some(services) = state.services else {
        eprintln!("Error: Database is not configured. Nowhere to load records into.");
        std::process::exit(1);
    };

    match services.metrics.load_file(file, delimiter).await {
        Ok(inserted) => println!("Loaded {} records from {}", inserted, file.display()),
        Err(e) => {
            tracing::error!(error = %e, "Load failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
