//! Subscription management and period pricing endpoints

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use subspend_core::{FilterSpec, MonthDate, QueryRange, SubscriptionError};
use tracing::info;

use crate::error::ApiResult;
use crate::{models::*, ApiState};

type QueryPairs = Vec<(String, String)>;

pub fn router() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/subscription", get(list_subscriptions).post(create_subscription))
        .route(
            "/subscription/:id",
            get(get_subscription).put(update_subscription).delete(delete_subscription),
        )
        .route("/subscription/period-price/:period", get(get_period_price))
}

fn filter_from_query(query: Result<Query<QueryPairs>, QueryRejection>) -> ApiResult<FilterSpec> {
    let Query(pairs) = query?;
    Ok(FilterSpec::from_pairs(pairs)?)
}

/// List subscriptions
#[utoipa::path(
    get,
    path = "/api/v1/subscription",
    params(
        ("user_id" = Option<i64>, Query, description = "Only this user's subscriptions"),
        ("service_name" = Option<String>, Query, description = "Only this service (exact match)")
    ),
    responses(
        (status = 200, description = "Matching subscriptions ordered by id", body = [Subscription]),
        (status = 400, description = "Unknown filter field or bad value", body = ErrorResponse)
    ),
    tag = "subscriptions"
)]
pub async fn list_subscriptions(
    State(state): State<Arc<ApiState>>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> ApiResult<Json<Vec<Subscription>>> {
    let filter = filter_from_query(query)?;
    let subscriptions = state.store.list(&filter).await?;
    info!(?filter, count = subscriptions.len(), "Listed subscriptions");
    Ok(Json(subscriptions))
}

/// Get subscription by ID
#[utoipa::path(
    get,
    path = "/api/v1/subscription/{id}",
    params(("id" = i64, Path, description = "Subscription ID")),
    responses(
        (status = 200, description = "Subscription details", body = Subscription),
        (status = 404, description = "Subscription not found", body = ErrorResponse)
    ),
    tag = "subscriptions"
)]
pub async fn get_subscription(
    State(state): State<Arc<ApiState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Subscription>> {
    let Path(id) = id?;
    let subscription = state.store.get(id).await?;
    info!(id, "Fetched subscription");
    Ok(Json(subscription))
}

/// Create a new subscription
#[utoipa::path(
    post,
    path = "/api/v1/subscription",
    request_body = NewSubscription,
    responses(
        (status = 201, description = "Subscription created", body = Subscription),
        (status = 400, description = "Invalid subscription", body = ErrorResponse)
    ),
    tag = "subscriptions"
)]
pub async fn create_subscription(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<NewSubscription>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    let Json(input) = body?;
    input.validate()?;

    let id = state.store.insert(&input).await?;
    info!(id, user_id = input.user_id, service = %input.service_name, "Subscription created");

    Ok((StatusCode::CREATED, Json(input.into_subscription(id))))
}

/// Replace a subscription
#[utoipa::path(
    put,
    path = "/api/v1/subscription/{id}",
    params(("id" = i64, Path, description = "Subscription ID")),
    request_body = NewSubscription,
    responses(
        (status = 200, description = "Subscription updated", body = Subscription),
        (status = 400, description = "Invalid subscription", body = ErrorResponse),
        (status = 404, description = "Subscription not found", body = ErrorResponse)
    ),
    tag = "subscriptions"
)]
pub async fn update_subscription(
    State(state): State<Arc<ApiState>>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<NewSubscription>, JsonRejection>,
) -> ApiResult<Json<Subscription>> {
    let Path(id) = id?;
    let Json(input) = body?;
    input.validate()?;

    let subscription = input.into_subscription(id);
    state.store.update(&subscription).await?;
    info!(id, "Subscription updated");

    Ok(Json(subscription))
}

/// Delete a subscription
#[utoipa::path(
    delete,
    path = "/api/v1/subscription/{id}",
    params(("id" = i64, Path, description = "Subscription ID")),
    responses(
        (status = 204, description = "Subscription deleted"),
        (status = 404, description = "Subscription not found", body = ErrorResponse)
    ),
    tag = "subscriptions"
)]
pub async fn delete_subscription(
    State(state): State<Arc<ApiState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id?;
    state.store.delete(id).await?;
    info!(id, "Subscription deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Total spend over a month range
///
/// `period` is `MM-YYYY` (through the current month) or `MM-YYYY:MM-YYYY`.
#[utoipa::path(
    get,
    path = "/api/v1/subscription/period-price/{period}",
    params(
        ("period" = String, Path, description = "MM-YYYY or MM-YYYY:MM-YYYY", example = "01-2025:12-2025"),
        ("user_id" = Option<i64>, Query, description = "Only this user's subscriptions"),
        ("service_name" = Option<String>, Query, description = "Only this service (exact match)")
    ),
    responses(
        (status = 200, description = "Total and per-subscription breakdown", body = PriceReport),
        (status = 400, description = "Bad period or filter", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    ),
    tag = "pricing"
)]
pub async fn get_period_price(
    State(state): State<Arc<ApiState>>,
    period: Result<Path<String>, PathRejection>,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> ApiResult<Json<PriceReport>> {
    let Path(period) = period?;
    let range = QueryRange::parse_period(&period, MonthDate::current())
        .map_err(SubscriptionError::from)?;
    let filter = filter_from_query(query)?;

    let report = state.aggregator.compute_total(&range, &filter).await?;
    info!(%period, ?filter, total = report.total, "Served period price");
    Ok(Json(report))
}
