use std::sync::Arc;

use crate::model::{DbConnection, ModelManager};
use crate::quiz::GeminiClient;
use crate::storage::Storage;
use crate::utils::signal::shutdown_signal;
use crate::video::HlsTranscoder;
use crate::{error::AppResult, web::AppState};
use axum::Router;
use tokio::net::TcpListener;

pub mod config;
pub use config::{Config, ConfigError, ConfigResult};

pub mod auth;
pub mod error;
pub mod model;
pub mod quiz;
pub mod storage;
pub mod utils;
pub mod video;
pub mod web;

static APPLICATION_NAME: &str = "coursehub";

/// Wires storage, the transcoder and the quiz generator around a model manager.
pub fn build_state(mm: ModelManager, config: &Config) -> AppResult<AppState> {
    let storage = Storage::from_config(config.storage());
    let transcoder = HlsTranscoder::new(storage.clone(), config.transcoder().clone());
    let generator = GeminiClient::new(config.ai())?;

    Ok(AppState::new(
        mm,
        storage,
        config.storage().clone(),
        transcoder,
        Arc::new(generator),
    ))
}

pub async fn build_server() -> AppResult<(AppState, Router)> {
    let use_local = cfg!(debug_assertions);
    let config = config::Config::get_or_init(use_local).await;
    let db = DbConnection::connect(config.app().database_uri())?;

    tracing::debug!("applying migrations...");
    sqlx::migrate!()
        .run(db.pool())
        .await
        .map_err(model::DatabaseError::from)?;

    let mm = ModelManager::new(db);
    let state = build_state(mm, config)?;
    let app = web::routes::build_app(state.clone(), config);
    Ok((state, app))
}

/// Builds the router around an already migrated pool and a prepared state.
pub fn build_app_with_state(state: AppState, config: &Config) -> Router {
    web::routes::build_app(state, config)
}

#[tracing::instrument]
pub async fn setup_workers() -> AppResult<()> {
    let (_, app) = build_server().await?;
    let config = Config::get_or_init(false).await;
    let listener = TcpListener::bind(config.host().bindto()).await?;

    tracing::info!("{APPLICATION_NAME} is starting at: {}", config.host().bindto());
    let axum_handle = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    axum_handle.await?;
    Ok(())
}

fn setup_trace() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

    // load .env file for RUST_LOG etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .with(ErrorLayer::default())
        .init();

    tracing::debug!("tracing initialized.");
}

#[tracing::instrument]
pub async fn run() -> AppResult<()> {
    setup_trace();
    setup_workers().await?;
    Ok(())
}
