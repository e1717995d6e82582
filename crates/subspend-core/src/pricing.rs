//! Period price aggregation
//!
//! ```text
//!  QueryRange + FilterSpec
//!          │
//!          ▼
//!  SubscriptionStore::list_overlapping   (candidate pre-filter)
//!          │
//!          ▼
//!  overlap_window per candidate           (query range, not the pre-filter)
//!          │
//!          ▼
//!  line_total = months * price ─► breakdown[id], total += line_total
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{SubscriptionError, SubscriptionResult};
use crate::filter::FilterSpec;
use crate::month::QueryRange;
use crate::overlap::overlap_window;
use crate::store::SubscriptionStore;
use crate::subscription::Subscription;

/// One subscription's contribution to a period price
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LineItem {
    pub service_name: String,
    /// Billable months within the query range
    pub months: i64,
    pub price: i64,
    pub user_id: i64,
    /// `months * price`
    pub line_total: i64,
}

impl LineItem {
    /// Price `subscription` over `range`
    ///
    /// `None` when the subscription does not intersect the range at all.
    pub fn for_subscription(
        subscription: &Subscription,
        range: &QueryRange,
    ) -> SubscriptionResult<Option<Self>> {
        let Some(window) = overlap_window(subscription.start_month, subscription.end_month, range)
        else {
            return Ok(None);
        };

        let months = window.billable_months();
        let line_total = months
            .checked_mul(subscription.price)
            .ok_or_else(overflow)?;

        Ok(Some(Self {
            service_name: subscription.service_name.clone(),
            months,
            price: subscription.price,
            user_id: subscription.user_id,
            line_total,
        }))
    }
}

/// Total price for a period with its per-subscription breakdown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PriceReport {
    pub total: i64,
    /// Keyed by subscription id
    pub breakdown: BTreeMap<i64, LineItem>,
}

impl PriceReport {
    /// Price every candidate over `range`
    ///
    /// Candidates that do not intersect the range are left out of the
    /// breakdown. Any arithmetic overflow fails the whole report.
    pub fn from_candidates<'a, I>(candidates: I, range: &QueryRange) -> SubscriptionResult<Self>
    where
        I: IntoIterator<Item = &'a Subscription>,
    {
        let mut report = Self::default();

        for subscription in candidates {
            if report.breakdown.contains_key(&subscription.id) {
                warn!(id = subscription.id, "Duplicate candidate ignored");
                continue;
            }

            let Some(line) = LineItem::for_subscription(subscription, range)? else {
                debug!(id = subscription.id, "Candidate does not overlap range");
                continue;
            };

            report.total = report.total.checked_add(line.line_total).ok_or_else(overflow)?;
            report.breakdown.insert(subscription.id, line);
        }

        Ok(report)
    }
}

fn overflow() -> SubscriptionError {
    SubscriptionError::validation("aggregated price exceeds supported range")
}

/// Computes period prices from the store
#[derive(Clone)]
pub struct PriceAggregator {
    store: Arc<dyn SubscriptionStore>,
}

impl PriceAggregator {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Total spend over `range` for subscriptions matching `filter`
    ///
    /// Reads fresh from storage on every call. A storage error aborts the
    /// whole aggregation; no partial total is returned.
    #[instrument(skip(self), fields(range = %range))]
    pub async fn compute_total(
        &self,
        range: &QueryRange,
        filter: &FilterSpec,
    ) -> SubscriptionResult<PriceReport> {
        let candidates = self.store.list_overlapping(range, filter).await?;
        let report = PriceReport::from_candidates(&candidates, range)?;

        info!(
            candidates = candidates.len(),
            priced = report.breakdown.len(),
            total = report.total,
            "Computed period price"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::month::MonthDate;
    use crate::store::InMemorySubscriptionStore;
    use crate::subscription::NewSubscription;
    use async_trait::async_trait;
    use proptest::prelude::*;

    fn month(text: &str) -> MonthDate {
        MonthDate::parse(text).unwrap()
    }

    fn range(start: &str, end: &str) -> QueryRange {
        QueryRange::new(month(start), month(end))
    }

    fn new_sub(user_id: i64, service: &str, price: i64, start: &str, end: Option<&str>) -> NewSubscription {
        NewSubscription {
            service_name: service.into(),
            price,
            user_id,
            start_month: month(start),
            end_month: end.map(month),
        }
    }

    async fn aggregator_with(subs: &[NewSubscription]) -> (PriceAggregator, Vec<i64>) {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let mut ids = Vec::new();
        for sub in subs {
            ids.push(store.insert(sub).await.unwrap());
        }
        (PriceAggregator::new(store), ids)
    }

    #[tokio::test]
    async fn test_open_ended_subscription() {
        let (aggregator, ids) =
            aggregator_with(&[new_sub(1, "Netflix", 100, "07-2025", None)]).await;

        let report = aggregator
            .compute_total(&range("07-2025", "09-2025"), &FilterSpec::new())
            .await
            .unwrap();

        assert_eq!(report.total, 200);
        let line = &report.breakdown[&ids[0]];
        assert_eq!(line.months, 2);
        assert_eq!(line.line_total, 200);
        assert_eq!(line.service_name, "Netflix");
    }

    #[tokio::test]
    async fn test_ended_subscription_is_not_a_candidate() {
        let (aggregator, _) =
            aggregator_with(&[new_sub(1, "Old", 50, "01-2025", Some("03-2025"))]).await;

        let report = aggregator
            .compute_total(&range("06-2025", "07-2025"), &FilterSpec::new())
            .await
            .unwrap();

        assert_eq!(report, PriceReport::default());
    }

    #[tokio::test]
    async fn test_filter_by_user_includes_all_services() {
        let (aggregator, ids) = aggregator_with(&[
            new_sub(7, "Netflix", 100, "01-2025", None),
            new_sub(7, "Spotify", 30, "03-2025", Some("05-2025")),
            new_sub(8, "Netflix", 100, "01-2025", None),
        ])
        .await;

        let report = aggregator
            .compute_total(&range("01-2025", "12-2025"), &FilterSpec::new().with_user_id(7))
            .await
            .unwrap();

        assert_eq!(report.breakdown.len(), 2);
        assert_eq!(report.breakdown[&ids[0]].line_total, 1100);
        assert_eq!(report.breakdown[&ids[1]].line_total, 60);
        assert_eq!(report.total, 1160);
        assert!(!report.breakdown.contains_key(&ids[2]));
    }

    #[tokio::test]
    async fn test_single_boundary_month_bills_zero() {
        let (aggregator, ids) =
            aggregator_with(&[new_sub(1, "Trial", 500, "09-2025", Some("09-2025"))]).await;

        let report = aggregator
            .compute_total(&range("07-2025", "09-2025"), &FilterSpec::new())
            .await
            .unwrap();

        assert_eq!(report.total, 0);
        assert_eq!(report.breakdown[&ids[0]].months, 0);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let (aggregator, _) = aggregator_with(&[]).await;
        let report = aggregator
            .compute_total(&range("01-2025", "12-2025"), &FilterSpec::new())
            .await
            .unwrap();
        assert_eq!(report.total, 0);
        assert!(report.breakdown.is_empty());
    }

    #[tokio::test]
    async fn test_inverted_range_is_empty() {
        let (aggregator, _) = aggregator_with(&[
            new_sub(1, "Wide", 100, "01-2020", Some("01-2030")),
            new_sub(1, "Open", 100, "01-2020", None),
        ])
        .await;

        let report = aggregator
            .compute_total(&range("09-2025", "07-2025"), &FilterSpec::new())
            .await
            .unwrap();
        assert_eq!(report, PriceReport::default());
    }

    struct FailingStore;

    #[async_trait]
    impl SubscriptionStore for FailingStore {
        async fn insert(&self, _: &NewSubscription) -> SubscriptionResult<i64> {
            unreachable!()
        }
        async fn get(&self, id: i64) -> SubscriptionResult<Subscription> {
            Err(SubscriptionError::NotFound(id))
        }
        async fn update(&self, _: &Subscription) -> SubscriptionResult<()> {
            unreachable!()
        }
        async fn delete(&self, id: i64) -> SubscriptionResult<()> {
            Err(SubscriptionError::NotFound(id))
        }
        async fn list(&self, _: &FilterSpec) -> SubscriptionResult<Vec<Subscription>> {
            Ok(Vec::new())
        }
        async fn list_overlapping(
            &self,
            _: &QueryRange,
            _: &FilterSpec,
        ) -> SubscriptionResult<Vec<Subscription>> {
            Err(SubscriptionError::Timeout(std::time::Duration::from_secs(3)))
        }
        async fn health_check(&self) -> SubscriptionResult<()> {
            Err(SubscriptionError::Storage("down".into()))
        }
    }

    #[tokio::test]
    async fn test_storage_error_aborts() {
        let aggregator = PriceAggregator::new(Arc::new(FailingStore));
        let result = aggregator
            .compute_total(&range("01-2025", "02-2025"), &FilterSpec::new())
            .await;
        assert!(matches!(result, Err(SubscriptionError::Timeout(_))));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let huge = new_sub(1, "Huge", i64::MAX, "01-2025", None).into_subscription(1);
        let result = PriceReport::from_candidates([&huge], &range("01-2025", "03-2025"));
        assert!(matches!(result, Err(SubscriptionError::Validation(_))));
    }

    #[test]
    fn test_duplicate_candidate_counted_once() {
        let sub = new_sub(1, "Netflix", 10, "01-2025", None).into_subscription(4);
        let report = PriceReport::from_candidates([&sub, &sub], &range("01-2025", "04-2025")).unwrap();
        assert_eq!(report.total, 30);
        assert_eq!(report.breakdown.len(), 1);
    }

    fn any_subscription() -> impl Strategy<Value = Subscription> {
        (
            1i64..50,
            0i64..10_000,
            (2020i32..2030, 1u32..=12),
            proptest::option::of(0i64..60),
        )
            .prop_map(|(id, price, (y, m), length)| {
                let start = MonthDate::new(y, m).unwrap();
                let end = length.map(|len| {
                    let index = i64::from(y) * 12 + i64::from(m - 1) + len;
                    MonthDate::new((index / 12) as i32, (index % 12) as u32 + 1).unwrap()
                });
                Subscription {
                    id,
                    service_name: format!("service-{id}"),
                    price,
                    user_id: id % 5,
                    start_month: start,
                    end_month: end,
                }
            })
    }

    fn any_subscriptions() -> impl Strategy<Value = Vec<Subscription>> {
        proptest::collection::vec(any_subscription(), 0..20).prop_map(|subs| {
            subs.into_iter()
                .zip(1i64..)
                .map(|(sub, id)| Subscription { id, ..sub })
                .collect()
        })
    }

    fn any_range() -> impl Strategy<Value = QueryRange> {
        ((2019i32..2032, 1u32..=12), (2019i32..2032, 1u32..=12)).prop_map(|((y1, m1), (y2, m2))| {
            QueryRange::new(MonthDate::new(y1, m1).unwrap(), MonthDate::new(y2, m2).unwrap())
        })
    }

    proptest! {
        #[test]
        fn prop_total_equals_breakdown_sum(
            subs in any_subscriptions(),
            range in any_range(),
        ) {
            let report = PriceReport::from_candidates(&subs, &range).unwrap();
            let sum: i64 = report.breakdown.values().map(|line| line.line_total).sum();
            prop_assert_eq!(report.total, sum);
            prop_assert!(report.breakdown.values().all(|line| line.months >= 0 && line.line_total >= 0));
        }

        #[test]
        fn prop_order_does_not_change_total(
            subs in any_subscriptions(),
            range in any_range(),
        ) {
            let forward = PriceReport::from_candidates(&subs, &range).unwrap();
            let reversed = PriceReport::from_candidates(subs.iter().rev(), &range).unwrap();
            prop_assert_eq!(forward.total, reversed.total);
        }

        #[test]
        fn prop_inverted_range_prices_nothing(
            subs in any_subscriptions(),
            range in any_range(),
        ) {
            prop_assume!(range.is_empty());
            let report = PriceReport::from_candidates(&subs, &range).unwrap();
            prop_assert_eq!(report, PriceReport::default());
        }

        #[test]
        fn prop_store_prefilter_keeps_every_contributor(
            subs in any_subscriptions(),
            range in any_range(),
        ) {
            let store = Arc::new(InMemorySubscriptionStore::new());
            for sub in &subs {
                tokio_test::block_on(store.insert(&NewSubscription::from(sub.clone()))).unwrap();
            }
            let aggregator = PriceAggregator::new(store);

            let via_store =
                tokio_test::block_on(aggregator.compute_total(&range, &FilterSpec::new())).unwrap();
            let direct = PriceReport::from_candidates(&subs, &range).unwrap();
            prop_assert_eq!(via_store, direct);
        }
    }
}
