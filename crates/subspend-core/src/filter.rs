//! Subscription filters
//!
//! A [`FilterSpec`] holds at most one equality constraint per whitelisted
//! field. Constraints combine with AND; an absent field constrains nothing.
//! Values only ever reach SQL as bound parameters.

use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};

use crate::error::{SubscriptionError, SubscriptionResult};
use crate::subscription::Subscription;

/// Filterable field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    UserId,
    ServiceName,
}

impl FilterField {
    /// Every accepted field
    pub const ALL: [FilterField; 2] = [FilterField::UserId, FilterField::ServiceName];

    /// Field by its external name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    /// External (query string) name
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserId => "user_id",
            Self::ServiceName => "service_name",
        }
    }

    /// Storage column
    pub fn column(&self) -> &'static str {
        match self {
            Self::UserId => "user_id",
            Self::ServiceName => "service_name",
        }
    }
}

/// Closed set of optional equality constraints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<String>,
}

impl FilterSpec {
    /// Filter matching everything
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Build from raw key/value pairs (e.g. a query string)
    ///
    /// Unknown keys, repeated keys and a non-integer `user_id` are rejected.
    /// An empty value means "not supplied".
    pub fn from_pairs<I, K, V>(pairs: I) -> SubscriptionResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut spec = Self::new();
        let mut seen = Vec::with_capacity(FilterField::ALL.len());

        for (key, value) in pairs {
            let key = key.as_ref();
            let field = FilterField::from_name(key).ok_or_else(|| {
                SubscriptionError::validation(format!("unknown filter field: {key}"))
            })?;

            if seen.contains(&field) {
                return Err(SubscriptionError::validation(format!(
                    "filter field given more than once: {key}"
                )));
            }
            seen.push(field);

            let value = value.as_ref();
            if value.is_empty() {
                continue;
            }

            match field {
                FilterField::UserId => {
                    let user_id = value.parse::<i64>().map_err(|_| {
                        SubscriptionError::validation(format!("Invalid filter type: user_id={value}"))
                    })?;
                    spec.user_id = Some(user_id);
                }
                FilterField::ServiceName => spec.service_name = Some(value.to_string()),
            }
        }

        Ok(spec)
    }

    /// True when no field is constrained
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.service_name.is_none()
    }

    /// Evaluate the predicate in memory
    pub fn matches(&self, subscription: &Subscription) -> bool {
        self.user_id.map_or(true, |id| subscription.user_id == id)
            && self
                .service_name
                .as_deref()
                .map_or(true, |name| subscription.service_name == name)
    }

    /// Append `AND <column> = $n` for each constraint
    ///
    /// The builder must already hold a `WHERE` clause.
    pub fn push_predicate(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        if let Some(user_id) = self.user_id {
            builder
                .push(" AND ")
                .push(FilterField::UserId.column())
                .push(" = ")
                .push_bind(user_id);
        }
        if let Some(service_name) = &self.service_name {
            builder
                .push(" AND ")
                .push(FilterField::ServiceName.column())
                .push(" = ")
                .push_bind(service_name.clone());
        }
    }
}
