//! Subscription storage
//!
//! [`SubscriptionStore`] is the persistence seam. Two implementations:
//! - [`PgSubscriptionStore`]: PostgreSQL through a connection pool, every
//!   call bounded by a deadline
//! - [`InMemorySubscriptionStore`]: for tests and local development

mod memory;
mod postgres;

pub use memory::InMemorySubscriptionStore;
pub use postgres::{PgStoreOptions, PgSubscriptionStore};
pub use sqlx::postgres::PgConnectOptions;

use async_trait::async_trait;

use crate::error::SubscriptionResult;
use crate::filter::FilterSpec;
use crate::month::QueryRange;
use crate::subscription::{NewSubscription, Subscription};

/// Subscription persistence
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Store a new subscription and return its assigned id
    async fn insert(&self, subscription: &NewSubscription) -> SubscriptionResult<i64>;

    /// Get subscription by id
    async fn get(&self, id: i64) -> SubscriptionResult<Subscription>;

    /// Replace the record with `subscription.id`
    async fn update(&self, subscription: &Subscription) -> SubscriptionResult<()>;

    /// Delete subscription by id
    async fn delete(&self, id: i64) -> SubscriptionResult<()>;

    /// All subscriptions matching `filter`, ordered by id
    async fn list(&self, filter: &FilterSpec) -> SubscriptionResult<Vec<Subscription>>;

    /// Subscriptions matching `filter` whose span could overlap `range`
    ///
    /// `start_month <= range.end AND (end_month >= range.start OR end_month IS NULL)`
    async fn list_overlapping(
        &self,
        range: &QueryRange,
        filter: &FilterSpec,
    ) -> SubscriptionResult<Vec<Subscription>>;

    /// Check the backend is reachable
    async fn health_check(&self) -> SubscriptionResult<()>;
}
