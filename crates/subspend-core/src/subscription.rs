//! Subscription entity

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{SubscriptionError, SubscriptionResult};
use crate::month::{MonthDate, QueryRange};

/// Stored subscription
///
/// `end_month == None` means open-ended (still active).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Subscription {
    /// Assigned by the store, immutable
    pub id: i64,
    pub service_name: String,
    /// Cost per full month in the currency's smallest unit
    pub price: i64,
    pub user_id: i64,
    /// First billable month
    #[serde(rename = "start_date")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, example = "07-2025"))]
    pub start_month: MonthDate,
    /// Last billable month, inclusive
    #[serde(rename = "end_date", default, deserialize_with = "optional_month")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, example = "12-2025"))]
    pub end_month: Option<MonthDate>,
}

impl Subscription {
    /// Whether the span could intersect `range`
    ///
    /// `start_month <= range.end` and the subscription is either open-ended or
    /// ends on/after `range.start`. This is a candidate pre-filter only; the
    /// billable months come from [`crate::overlap`].
    pub fn may_overlap(&self, range: &QueryRange) -> bool {
        self.start_month <= range.end && self.end_month.map_or(true, |end| end >= range.start)
    }
}

/// Subscription payload for create and full-record update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewSubscription {
    #[cfg_attr(feature = "openapi", schema(example = "Yandex Plus"))]
    pub service_name: String,
    #[cfg_attr(feature = "openapi", schema(example = 400))]
    pub price: i64,
    pub user_id: i64,
    #[serde(rename = "start_date")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, example = "07-2025"))]
    pub start_month: MonthDate,
    #[serde(rename = "end_date", default, deserialize_with = "optional_month")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, example = "12-2025"))]
    pub end_month: Option<MonthDate>,
}

impl NewSubscription {
    /// Check entity invariants
    pub fn validate(&self) -> SubscriptionResult<()> {
        if self.service_name.trim().is_empty() {
            return Err(SubscriptionError::validation("service_name must not be empty"));
        }
        if self.price < 0 {
            return Err(SubscriptionError::validation(format!(
                "price must not be negative, got {}",
                self.price
            )));
        }
        if let Some(end) = self.end_month {
            if end < self.start_month {
                return Err(SubscriptionError::validation(format!(
                    "end_date {end} is before start_date {}",
                    self.start_month
                )));
            }
        }
        Ok(())
    }

    /// Attach a store-assigned id
    pub fn into_subscription(self, id: i64) -> Subscription {
        Subscription {
            id,
            service_name: self.service_name,
            price: self.price,
            user_id: self.user_id,
            start_month: self.start_month,
            end_month: self.end_month,
        }
    }
}

impl From<Subscription> for NewSubscription {
    fn from(sub: Subscription) -> Self {
        Self {
            service_name: sub.service_name,
            price: sub.price,
            user_id: sub.user_id,
            start_month: sub.start_month,
            end_month: sub.end_month,
        }
    }
}

/// `null`, missing and `""` all mean open-ended
fn optional_month<'de, D>(deserializer: D) -> Result<Option<MonthDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(text) if !text.is_empty() => MonthDate::parse(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
