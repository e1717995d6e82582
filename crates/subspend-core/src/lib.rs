//! Subspend Core - subscription spend tracking
//!
//! Answers "how much was spent on subscriptions over a month range?" for one
//! user, one service, or everybody.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SUBSPEND CORE                                   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     PRICE AGGREGATOR                             │   │
//! │  │   Candidates ─► Overlap per subscription ─► Total + Breakdown    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌─────────────┐ │
//! │  │  MonthDate   │  │   Overlap    │  │  FilterSpec  │  │ Subscription│ │
//! │  │  QueryRange  │  │  Calculator  │  │ (bound SQL)  │  │    Store    │ │
//! │  └──────────────┘  └──────────────┘  └──────────────┘  └─────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  STORAGE (PostgreSQL pool | memory)              │   │
//! │  │     Per-call deadline | Parameterized queries | Migrations       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod filter;
pub mod month;
pub mod overlap;
pub mod pricing;
pub mod store;
pub mod subscription;

pub use error::{SubscriptionError, SubscriptionResult};
pub use filter::{FilterField, FilterSpec};
pub use month::{MonthDate, MonthParseError, QueryRange};
pub use overlap::{billable_months, overlap_window, OverlapWindow};
pub use pricing::{LineItem, PriceAggregator, PriceReport};
pub use store::{
    InMemorySubscriptionStore, PgConnectOptions, PgStoreOptions, PgSubscriptionStore,
    SubscriptionStore,
};
pub use subscription::{NewSubscription, Subscription};
