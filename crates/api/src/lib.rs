//! HTTP API server for the grocery store backend.
//!
//! Provides REST endpoints for the catalog, the customer directory, and the
//! purchase workflow, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get};
use domain::{CatalogService, CustomerService, PurchaseService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route(
            "/products/{name}",
            get(routes::products::get::<S>)
                .put(routes::products::update::<S>)
                .delete(routes::products::delete::<S>),
        )
        .route(
            "/categories",
            get(routes::categories::list::<S>).post(routes::categories::create::<S>),
        )
        .route(
            "/categories/{name}",
            axum::routing::put(routes::categories::rename::<S>)
                .delete(routes::categories::delete::<S>),
        )
        .route(
            "/categories/{name}/products",
            get(routes::categories::products::<S>),
        )
        .route(
            "/customers",
            get(routes::customers::list::<S>).post(routes::customers::register::<S>),
        )
        .route(
            "/customers/{tax_id}",
            get(routes::customers::get::<S>)
                .put(routes::customers::update::<S>)
                .delete(routes::customers::remove::<S>),
        )
        .route(
            "/customers/{tax_id}/purchases",
            get(routes::purchases::history::<S>),
        )
        .route(
            "/customers/{tax_id}/purchases/{purchase_id}",
            delete(routes::purchases::cancel::<S>),
        )
        .route(
            "/purchases",
            get(routes::purchases::all_histories::<S>).post(routes::purchases::checkout::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state, handing each service its own handle to
/// the store.
pub fn create_state<S: Store + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        purchases: PurchaseService::new(store.clone()),
        catalog: CatalogService::new(store.clone()),
        customers: CustomerService::new(store.clone()),
        store,
    })
}
