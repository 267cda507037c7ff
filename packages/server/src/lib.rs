#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the envwatch application.
//!
//! Serves the REST API over the optimistic [`ReportMirror`]: filtered and
//! searched report listings, dashboard statistics, CSV and `GeoJSON`
//! exports, status changes for administrators, the community forum and
//! on-demand AI summaries. Reports are persisted in a `SQLite` document
//! store at `data/envwatch.db` unless `ENVWATCH_DB_PATH` says otherwise.
//!
//! The caller identity is taken from headers set by a trusted upstream
//! authentication proxy; see [`identity`].

mod handlers;
pub mod identity;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use envwatch_ai::LlmProvider;
use envwatch_map::MissingCoordinates;
use envwatch_session::{MirrorError, NotificationReceiver, ReportMirror, notification_channel};
use envwatch_store::{DEFAULT_DB_PATH, ReportStore, SqliteStore, StoreError};
use thiserror::Error;

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or running the HTTP server failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The report store could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The initial load of the mirror failed.
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// Server configuration, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address to bind. `BIND_ADDR`, default `127.0.0.1`.
    pub bind_addr: String,
    /// Port to bind. `PORT`, default `8080`.
    pub port: u16,
    /// `SQLite` store location. `ENVWATCH_DB_PATH`, default `data/envwatch.db`.
    pub db_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

impl Config {
    /// Reads the configuration from environment variables, falling back to
    /// the defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            db_path: std::env::var("ENVWATCH_DB_PATH").map_or(defaults.db_path, PathBuf::from),
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// Optimistic mirror of the persisted collections.
    pub mirror: Arc<ReportMirror>,
    /// Per-user notifications produced by the mirror.
    pub notifications: Mutex<NotificationReceiver>,
    /// LLM provider for `/api/summarize`, if one is configured.
    pub ai: Option<Arc<dyn LlmProvider>>,
    /// Placement policy for reports without coordinates in `GeoJSON` exports.
    pub missing_coordinates: MissingCoordinates,
}

impl AppState {
    /// Builds the state around an already opened store.
    ///
    /// The mirror is empty until [`ReportMirror::refresh`] is called.
    #[must_use]
    pub fn new(store: Arc<dyn ReportStore>, ai: Option<Arc<dyn LlmProvider>>) -> Self {
        let (notifier, notifications) = notification_channel();
        let mut mirror = ReportMirror::new(store, notifier);
        if let Some(provider) = &ai {
            mirror = mirror.with_ai(provider.clone());
        }
        Self {
            mirror: Arc::new(mirror),
            notifications: Mutex::new(notifications),
            ai,
            missing_coordinates: envwatch_map::MapSyncConfig::default().missing_coordinates,
        }
    }
}

/// Registers the `/api` routes on a service config.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/reports", web::get().to(handlers::list_reports))
            .route("/reports", web::post().to(handlers::submit_report))
            .route("/reports/export.csv", web::get().to(handlers::export_csv))
            .route("/reports/map.geojson", web::get().to(handlers::export_geojson))
            .route("/reports/{id}/status", web::patch().to(handlers::update_status))
            .route("/stats", web::get().to(handlers::stats))
            .route("/community", web::get().to(handlers::list_posts))
            .route("/community", web::post().to(handlers::create_post))
            .route("/community/{id}/like", web::post().to(handlers::like_post))
            .route("/community/{id}/comments", web::post().to(handlers::add_comment))
            .route("/summarize", web::post().to(handlers::summarize))
            .route("/notifications", web::get().to(handlers::notifications))
            .route("/refresh", web::post().to(handlers::refresh)),
    );
}

/// Starts the envwatch API server.
///
/// Opens the `SQLite` store, loads the mirror, detects an AI provider from
/// the environment and starts the Actix-Web HTTP server. The caller is
/// responsible for logging setup and for providing the async runtime (e.g.
/// via `#[actix_web::main]`).
///
/// A missing AI provider is not an error; `/api/summarize` then answers
/// `503` and submitted reports are stored without analysis.
///
/// # Errors
///
/// * [`ServerError::Store`] if the store cannot be opened
/// * [`ServerError::Mirror`] if the initial load fails
/// * [`ServerError::Io`] if the HTTP server fails to bind or run
#[allow(clippy::future_not_send)]
pub async fn run_server(config: Config) -> Result<(), ServerError> {
    log::info!("Opening report store at {}...", config.db_path.display());
    let store = SqliteStore::open(&config.db_path).await?;

    let ai = match envwatch_ai::create_provider_from_env().await {
        Ok(provider) => Some(Arc::<dyn LlmProvider>::from(provider)),
        Err(e) => {
            log::warn!("AI summaries disabled: {e}");
            None
        }
    };

    let state = web::Data::new(AppState::new(Arc::new(store), ai));

    log::info!("Loading reports...");
    let summary = state.mirror.refresh().await?;
    log::info!(
        "Loaded {} reports and {} community posts",
        summary.reports,
        summary.posts
    );

    let Config {
        bind_addr, port, ..
    } = config;
    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await?;

    Ok(())
}
