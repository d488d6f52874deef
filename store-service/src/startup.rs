//! Application startup and lifecycle management.

use crate::config::StoreConfig;
use crate::handlers;
use crate::services::metrics::http_metrics_middleware;
use crate::services::{
    Database, DiscountService, InvoiceExporter, InvoiceLocks, InvoiceService, MemoryStore, Store,
};
use axum::middleware::from_fn;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    security_headers::security_headers_middleware,
    tracing::{make_request_span, request_id_middleware},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: StoreConfig,
    pub store: Arc<dyn Store>,
    pub invoices: InvoiceService,
    pub discounts: DiscountService,
    pub exporter: InvoiceExporter,
}

impl AppState {
    /// Wires the services around one store. The lock registry is shared by
    /// the totals engine and the exporter.
    pub fn new(config: StoreConfig, store: Arc<dyn Store>) -> Result<Self, AppError> {
        let locks = InvoiceLocks::new();
        let settings = config.render_settings()?;

        Ok(Self {
            invoices: InvoiceService::new(store.clone(), locks.clone()),
            discounts: DiscountService::new(store.clone()),
            exporter: InvoiceExporter::new(store.clone(), locks, settings),
            store,
            config,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Invoices
        .route(
            "/invoices",
            post(handlers::invoices::create_invoice).get(handlers::invoices::list_invoices),
        )
        .route(
            "/invoices/:id",
            get(handlers::invoices::get_invoice)
                .put(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        )
        .route("/invoices/:id/pdf", get(handlers::invoices::export_pdf))
        // Invoice lines
        .route(
            "/invoices/:id/lines",
            post(handlers::lines::add_line).get(handlers::lines::list_lines),
        )
        .route(
            "/invoices/:id/lines/:product_id",
            put(handlers::lines::update_line).delete(handlers::lines::remove_line),
        )
        // Discount codes
        .route(
            "/discount-codes",
            post(handlers::discount_codes::create_discount_code),
        )
        .route(
            "/discount-codes/by-code/:code",
            get(handlers::discount_codes::get_by_code),
        )
        .route(
            "/discount-codes/:id",
            delete(handlers::discount_codes::delete_discount_code),
        )
        .route("/stats", get(handlers::stats::get_stats))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route_layer(from_fn(http_metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<axum::body::Body>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: StoreConfig) -> Result<Self, AppError> {
        let store: Arc<dyn Store> = match &config.database {
            Some(database) => {
                let db = Database::new(
                    &database.url,
                    database.max_connections,
                    database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to PostgreSQL: {}", e);
                    AppError::from(e)
                })?;

                db.run_migrations().await.map_err(|e| {
                    tracing::error!("Failed to run migrations: {}", e);
                    AppError::from(e)
                })?;

                Arc::new(db)
            }
            None => {
                tracing::warn!("DATABASE_URL not set - using the in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let addr = config.common.socket_addr();
        let state = AppState::new(config, store)?;

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Store service: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }
}
