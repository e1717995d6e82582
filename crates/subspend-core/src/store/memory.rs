//! In-memory subscription store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use super::SubscriptionStore;
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::filter::FilterSpec;
use crate::month::QueryRange;
use crate::subscription::{NewSubscription, Subscription};

/// In-memory subscription store (for testing and development)
pub struct InMemorySubscriptionStore {
    subscriptions: RwLock<BTreeMap<i64, Subscription>>,
    next_id: AtomicI64,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.read().is_empty()
    }
}

impl Default for InMemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn insert(&self, subscription: &NewSubscription) -> SubscriptionResult<i64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscriptions
            .write()
            .insert(id, subscription.clone().into_subscription(id));
        Ok(id)
    }

    async fn get(&self, id: i64) -> SubscriptionResult<Subscription> {
        self.subscriptions
            .read()
            .get(&id)
            .cloned()
            .ok_or(SubscriptionError::NotFound(id))
    }

    async fn update(&self, subscription: &Subscription) -> SubscriptionResult<()> {
        let mut subscriptions = self.subscriptions.write();
        let existing = subscriptions
            .get_mut(&subscription.id)
            .ok_or(SubscriptionError::NotFound(subscription.id))?;
        *existing = subscription.clone();
        Ok(())
    }

    async fn delete(&self, id: i64) -> SubscriptionResult<()> {
        self.subscriptions
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(SubscriptionError::NotFound(id))
    }

    async fn list(&self, filter: &FilterSpec) -> SubscriptionResult<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .read()
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    async fn list_overlapping(
        &self,
        range: &QueryRange,
        filter: &FilterSpec,
    ) -> SubscriptionResult<Vec<Subscription>> {
        Ok(self
            .subscriptions
            .read()
            .values()
            .filter(|s| s.may_overlap(range) && filter.matches(s))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> SubscriptionResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::month::MonthDate;

    fn month(text: &str) -> MonthDate {
        MonthDate::parse(text).unwrap()
    }

    fn new_sub(user_id: i64, service_name: &str, start: &str, end: Option<&str>) -> NewSubscription {
        NewSubscription {
            service_name: service_name.into(),
            price: 100,
            user_id,
            start_month: month(start),
            end_month: end.map(month),
        }
    }

    #[tokio::test]
    async fn test_crud_round() {
        let store = InMemorySubscriptionStore::new();

        // Insert
        let id = store.insert(&new_sub(1, "Netflix", "01-2025", None)).await.unwrap();
        assert_eq!(store.len(), 1);

        // Get
        let mut sub = store.get(id).await.unwrap();
        assert_eq!(sub.service_name, "Netflix");

        // Update
        sub.price = 250;
        sub.end_month = Some(month("12-2025"));
        store.update(&sub).await.unwrap();
        assert_eq!(store.get(id).await.unwrap(), sub);

        // Delete
        store.delete(id).await.unwrap();
        assert!(matches!(store.get(id).await, Err(SubscriptionError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_ids_are_not_reused() {
        let store = InMemorySubscriptionStore::new();
        let first = store.insert(&new_sub(1, "A", "01-2025", None)).await.unwrap();
        store.delete(first).await.unwrap();
        let second = store.insert(&new_sub(1, "B", "01-2025", None)).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_missing_id_is_not_found() {
        let store = InMemorySubscriptionStore::new();
        let ghost = new_sub(1, "Ghost", "01-2025", None).into_subscription(99);

        assert!(matches!(store.update(&ghost).await, Err(SubscriptionError::NotFound(99))));
        assert!(matches!(store.delete(99).await, Err(SubscriptionError::NotFound(99))));
    }

    #[tokio::test]
    async fn test_list_with_filter() {
        let store = InMemorySubscriptionStore::new();
        store.insert(&new_sub(1, "Netflix", "01-2025", None)).await.unwrap();
        store.insert(&new_sub(1, "Spotify", "01-2025", None)).await.unwrap();
        store.insert(&new_sub(2, "Netflix", "01-2025", None)).await.unwrap();

        assert_eq!(store.list(&FilterSpec::new()).await.unwrap().len(), 3);
        assert_eq!(store.list(&FilterSpec::new().with_user_id(1)).await.unwrap().len(), 2);

        let both = FilterSpec::new().with_user_id(2).with_service_name("Netflix");
        let found = store.list(&both).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user_id, 2);
    }

    #[tokio::test]
    async fn test_list_overlapping_prefilter() {
        let store = InMemorySubscriptionStore::new();
        let ended = store.insert(&new_sub(1, "Old", "01-2025", Some("03-2025"))).await.unwrap();
        let open = store.insert(&new_sub(1, "Open", "07-2025", None)).await.unwrap();
        let future = store.insert(&new_sub(1, "Later", "01-2026", None)).await.unwrap();

        let range = QueryRange::new(month("06-2025"), month("07-2025"));
        let ids: Vec<_> = store
            .list_overlapping(&range, &FilterSpec::new())
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();

        assert_eq!(ids, vec![open]);
        assert!(!ids.contains(&ended));
        assert!(!ids.contains(&future));
    }
}
