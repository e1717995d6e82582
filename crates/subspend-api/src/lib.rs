//! Subspend REST API
//!
//! HTTP surface for subscription records and period spend reports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SUBSPEND API                                   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                         REST API                                 │   │
//! │  │   OpenAPI | Swagger UI | CORS | Request tracing                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌──────────────────────┐  ┌──────────────────────┐  ┌──────────────┐  │
//! │  │   /subscription      │  │ /subscription/       │  │   /health    │  │
//! │  │   CRUD + filtering   │  │ period-price/{range} │  │              │  │
//! │  └──────────────────────┘  └──────────────────────┘  └──────────────┘  │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                        SUBSPEND CORE                             │   │
//! │  │        SubscriptionStore | PriceAggregator | FilterSpec          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod telemetry;

use axum::{routing::get, Router};
use std::sync::Arc;
use subspend_core::{PriceAggregator, SubscriptionStore};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::{ApiError, ApiResult};
pub use models::*;

/// API state
#[derive(Clone)]
pub struct ApiState {
    /// Subscription records
    pub store: Arc<dyn SubscriptionStore>,
    /// Period spend over the same store
    pub aggregator: PriceAggregator,
}

impl ApiState {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        let aggregator = PriceAggregator::new(Arc::clone(&store));
        Self { store, aggregator }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Subspend API",
        version = "0.1.0",
        description = "Subscription records and spend over month ranges",
        license(name = "Apache-2.0")
    ),
    paths(
        routes::health::health_check,
        routes::subscriptions::list_subscriptions,
        routes::subscriptions::get_subscription,
        routes::subscriptions::create_subscription,
        routes::subscriptions::update_subscription,
        routes::subscriptions::delete_subscription,
        routes::subscriptions::get_period_price,
    ),
    components(
        schemas(
            ErrorResponse, routes::health::HealthResponse,
            Subscription, NewSubscription,
            PriceReport, LineItem
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "subscriptions", description = "Subscription management"),
        (name = "pricing", description = "Spend over a month range")
    )
)]
pub struct ApiDoc;

/// Build the API router
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(Arc::new(state))
}

fn api_routes() -> Router<Arc<ApiState>> {
    Router::new().merge(routes::subscriptions::router())
}
