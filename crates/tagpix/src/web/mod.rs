//! Web layer module
//!
//! HTTP interface for the tagpix service: thin handlers delegating to the
//! service layer, a standardized JSON envelope for API responses, and the
//! raw image delivery route mounted as a wildcard behind `/api` and
//! `/health`.

use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use sandboxed_file_store::FileStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::Config,
    database::Database,
    database::repositories::{
        ImageSeaOrmRepository, PartitionSeaOrmRepository, TagSeaOrmRepository,
    },
    services::{ImageService, RandomSource, RenderCache, SelectionEngine},
};

pub mod extractors;
pub mod handlers;
pub mod responses;
pub mod utils;

// Re-export commonly used types
pub use responses::{ApiResponse, handle_error};

/// Shared state cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Database,
    pub selection: SelectionEngine,
    pub render_cache: RenderCache,
    pub image_service: ImageService,
    pub image_repo: ImageSeaOrmRepository,
    pub partition_repo: PartitionSeaOrmRepository,
    pub tag_repo: TagSeaOrmRepository,
    pub upload_store: FileStore,
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    /// Wire up state and routes from the loaded configuration.
    pub async fn new(
        config: Config,
        database: Database,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        let state = build_state(config, database, random).await?;
        let app = create_router(state);
        Ok(Self { app, addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind and serve until shutdown.
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("Listening on {}", self.addr);

        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
}

/// Construct the shared application state: file stores, repositories, and
/// the selection/render/upload services, all injected with the one
/// database handle.
pub async fn build_state(
    config: Config,
    database: Database,
    random: Arc<dyn RandomSource>,
) -> Result<AppState> {
    let upload_store = FileStore::builder()
        .base_directory(&config.storage.upload_path)
        .build()
        .await?;
    let cache_store = FileStore::builder()
        .base_directory(&config.storage.cache_path)
        .build()
        .await?;

    let selection = SelectionEngine::new(
        database.clone(),
        random,
        config.delivery.random_session_ttl,
    );
    let render_cache = RenderCache::new(cache_store, config.delivery.jpeg_quality);
    let image_service = ImageService::new(
        database.clone(),
        upload_store.clone(),
        config.storage.partition_size,
        config.delivery.jpeg_quality,
    );

    let connection = database.connection();
    Ok(AppState {
        config: Arc::new(config),
        database,
        selection,
        render_cache,
        image_service,
        image_repo: ImageSeaOrmRepository::new(connection.clone()),
        partition_repo: PartitionSeaOrmRepository::new(connection.clone()),
        tag_repo: TagSeaOrmRepository::new(connection),
        upload_store,
    })
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/images", post(handlers::images::upload_image))
        .route("/images/count", get(handlers::tags::count_images))
        .route("/images/{id}", delete(handlers::images::delete_image))
        .route("/images/{id}/rotate", post(handlers::images::rotate_image))
        .route(
            "/images/{id}/tags",
            get(handlers::tags::list_image_tags).post(handlers::tags::add_image_tag),
        )
        .route("/tags", get(handlers::tags::list_tags))
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api)
        .route("/{*path}", get(handlers::delivery::deliver_image))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
