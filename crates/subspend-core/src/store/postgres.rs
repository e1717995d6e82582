//! PostgreSQL subscription store

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::SubscriptionStore;
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::filter::FilterSpec;
use crate::month::{MonthDate, QueryRange};
use crate::subscription::{NewSubscription, Subscription};

const SELECT_COLUMNS: &str =
    "SELECT id, service_name, price, user_id, start_date, end_date FROM subscription";

/// Pool and deadline settings
#[derive(Debug, Clone, Copy)]
pub struct PgStoreOptions {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Deadline for every storage call (and for acquiring a connection)
    pub query_timeout: Duration,
}

impl Default for PgStoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            query_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    service_name: String,
    price: i64,
    user_id: i64,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = SubscriptionError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let month = |day: NaiveDate| {
            MonthDate::from_calendar_day(day).map_err(|e| {
                SubscriptionError::Storage(format!("subscription {} has an unusable date: {e}", row.id))
            })
        };

        Ok(Self {
            id: row.id,
            start_month: month(row.start_date)?,
            end_month: row.end_date.map(month).transpose()?,
            service_name: row.service_name,
            price: row.price,
            user_id: row.user_id,
        })
    }
}

fn into_subscriptions(rows: Vec<SubscriptionRow>) -> SubscriptionResult<Vec<Subscription>> {
    rows.into_iter().map(Subscription::try_from).collect()
}

/// PostgreSQL-backed store over a connection pool
#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgSubscriptionStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self { pool, query_timeout }
    }

    /// Open a connection pool
    #[instrument(skip_all, fields(host = connect.get_host(), database = connect.get_database()))]
    pub async fn connect(
        connect: PgConnectOptions,
        options: PgStoreOptions,
    ) -> SubscriptionResult<Self> {
        info!(
            max_connections = options.max_connections,
            min_connections = options.min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .min_connections(options.min_connections)
            .acquire_timeout(options.query_timeout)
            .connect_with(connect)
            .await
            .map_err(|e| SubscriptionError::Storage(format!("failed to connect: {e}")))?;

        info!("PostgreSQL connection pool established");
        Ok(Self::new(pool, options.query_timeout))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> SubscriptionResult<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Run a query under the per-call deadline
    ///
    /// On expiry the query future is dropped, which cancels it. Waiting too
    /// long for a pooled connection counts as the same timeout.
    async fn bounded<T, F>(&self, operation: &'static str, query: F) -> SubscriptionResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(sqlx::Error::PoolTimedOut)) => {
                warn!(operation, timeout = ?self.query_timeout, "No pooled connection available");
                Err(SubscriptionError::Timeout(self.query_timeout))
            }
            Ok(Err(e)) => {
                error!(operation, error = %e, "Query failed");
                Err(e.into())
            }
            Err(_) => {
                warn!(operation, timeout = ?self.query_timeout, "Query timed out");
                Err(SubscriptionError::Timeout(self.query_timeout))
            }
        }
    }
}

fn list_query(filter: &FilterSpec) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(SELECT_COLUMNS);
    builder.push(" WHERE TRUE");
    filter.push_predicate(&mut builder);
    builder.push(" ORDER BY id");
    builder
}

fn overlapping_query(range: &QueryRange, filter: &FilterSpec) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(SELECT_COLUMNS);
    builder
        .push(" WHERE start_date <= ")
        .push_bind(range.end.to_calendar_day())
        .push(" AND (end_date >= ")
        .push_bind(range.start.to_calendar_day())
        .push(" OR end_date IS NULL)");
    filter.push_predicate(&mut builder);
    builder.push(" ORDER BY id");
    builder
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    #[instrument(skip(self, subscription), fields(user_id = subscription.user_id))]
    async fn insert(&self, subscription: &NewSubscription) -> SubscriptionResult<i64> {
        let query = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO subscription (service_name, price, user_id, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&subscription.service_name)
        .bind(subscription.price)
        .bind(subscription.user_id)
        .bind(subscription.start_month.to_calendar_day())
        .bind(subscription.end_month.map(|m| m.to_calendar_day()))
        .fetch_one(&self.pool);

        self.bounded("insert", query).await
    }

    #[instrument(skip(self))]
    async fn get(&self, id: i64) -> SubscriptionResult<Subscription> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = $1");
        let query = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool);

        self.bounded("get", query)
            .await?
            .ok_or(SubscriptionError::NotFound(id))
            .and_then(Subscription::try_from)
    }

    #[instrument(skip(self, subscription), fields(id = subscription.id))]
    async fn update(&self, subscription: &Subscription) -> SubscriptionResult<()> {
        let query = sqlx::query(
            r#"
            UPDATE subscription
            SET service_name = $1, price = $2, user_id = $3, start_date = $4, end_date = $5
            WHERE id = $6
            "#,
        )
        .bind(&subscription.service_name)
        .bind(subscription.price)
        .bind(subscription.user_id)
        .bind(subscription.start_month.to_calendar_day())
        .bind(subscription.end_month.map(|m| m.to_calendar_day()))
        .bind(subscription.id)
        .execute(&self.pool);

        let result = self.bounded("update", query).await?;
        if result.rows_affected() == 0 {
            return Err(SubscriptionError::NotFound(subscription.id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> SubscriptionResult<()> {
        let query = sqlx::query("DELETE FROM subscription WHERE id = $1")
            .bind(id)
            .execute(&self.pool);

        let result = self.bounded("delete", query).await?;
        if result.rows_affected() == 0 {
            return Err(SubscriptionError::NotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: &FilterSpec) -> SubscriptionResult<Vec<Subscription>> {
        let mut builder = list_query(filter);
        let query = builder.build_query_as::<SubscriptionRow>().fetch_all(&self.pool);

        let rows = self.bounded("list", query).await?;
        into_subscriptions(rows)
    }

    #[instrument(skip(self), fields(range = %range))]
    async fn list_overlapping(
        &self,
        range: &QueryRange,
        filter: &FilterSpec,
    ) -> SubscriptionResult<Vec<Subscription>> {
        let mut builder = overlapping_query(range, filter);
        let query = builder.build_query_as::<SubscriptionRow>().fetch_all(&self.pool);

        let rows = self.bounded("list_overlapping", query).await?;
        into_subscriptions(rows)
    }

    async fn health_check(&self) -> SubscriptionResult<()> {
        let query = sqlx::query("SELECT 1").execute(&self.pool);
        self.bounded("health_check", query).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(text: &str) -> MonthDate {
        MonthDate::parse(text).unwrap()
    }

    #[test]
    fn test_list_query_without_filter() {
        let builder = list_query(&FilterSpec::new());
        assert_eq!(
            builder.sql(),
            "SELECT id, service_name, price, user_id, start_date, end_date FROM subscription WHERE TRUE ORDER BY id"
        );
    }

    #[test]
    fn test_overlapping_query_binds_dates_and_filter() {
        let range = QueryRange::new(month("06-2025"), month("07-2025"));
        let filter = FilterSpec::new().with_user_id(5).with_service_name("Netflix");
        let builder = overlapping_query(&range, &filter);

        assert_eq!(
            builder.sql(),
            "SELECT id, service_name, price, user_id, start_date, end_date FROM subscription \
             WHERE start_date <= $1 AND (end_date >= $2 OR end_date IS NULL) \
             AND user_id = $3 AND service_name = $4 ORDER BY id"
        );
        assert!(!builder.sql().contains("2025"));
        assert!(!builder.sql().contains("Netflix"));
    }

    #[test]
    fn test_row_maps_dates_to_months() {
        let row = SubscriptionRow {
            id: 9,
            service_name: "Spotify".into(),
            price: 300,
            user_id: 2,
            start_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            end_date: None,
        };
        let sub = Subscription::try_from(row).unwrap();
        assert_eq!(sub.start_month, month("07-2025"));
        assert_eq!(sub.end_month, None);
    }

    #[test]
    fn test_default_options() {
        let options = PgStoreOptions::default();
        assert_eq!(options.query_timeout, Duration::from_secs(3));
        assert!(options.max_connections >= options.min_connections);
    }

    #[test]
    fn test_row_with_out_of_range_year_is_storage_error() {
        let row = SubscriptionRow {
            id: 4,
            service_name: "Hulu".into(),
            price: 50,
            user_id: 1,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(12_000, 6, 1),
        };

        let err = Subscription::try_from(row).unwrap_err();
        assert!(matches!(err, SubscriptionError::Storage(ref msg) if msg.contains("subscription 4")));
    }

    fn lazy_store(query_timeout: Duration) -> PgSubscriptionStore {
        let pool = PgPoolOptions::new().connect_lazy_with(PgConnectOptions::new());
        PgSubscriptionStore::new(pool, query_timeout)
    }

    #[tokio::test]
    async fn test_stalled_call_times_out() {
        let deadline = Duration::from_millis(50);
        let store = lazy_store(deadline);

        let result = store
            .bounded("stalled", std::future::pending::<Result<(), sqlx::Error>>())
            .await;

        assert!(matches!(result, Err(SubscriptionError::Timeout(d)) if d == deadline));
    }

    #[tokio::test]
    async fn test_pool_exhaustion_is_timeout() {
        let deadline = Duration::from_millis(50);
        let store = lazy_store(deadline);

        let result = store
            .bounded("acquire", async { Err::<(), _>(sqlx::Error::PoolTimedOut) })
            .await;

        assert!(matches!(result, Err(SubscriptionError::Timeout(d)) if d == deadline));
    }

    #[tokio::test]
    async fn test_query_failure_is_storage_error() {
        let store = lazy_store(Duration::from_secs(1));

        let result = store
            .bounded("closed", async { Err::<(), _>(sqlx::Error::PoolClosed) })
            .await;

        assert!(matches!(result, Err(SubscriptionError::Storage(_))));
    }
}
