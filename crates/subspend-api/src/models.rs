//! API Models

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use subspend_core::{LineItem, NewSubscription, PriceReport, Subscription};

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "validation_error")]
    pub code: String,
    pub message: String,
}
