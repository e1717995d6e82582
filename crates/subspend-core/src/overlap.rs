//! Overlap between a subscription span and a query range
//!
//! Billable months are the month *difference* between the overlap bounds,
//! not an inclusive month count: an overlap covering a single calendar
//! month bills 0 months.

use crate::month::{MonthDate, QueryRange};
use crate::subscription::Subscription;

/// Intersection of a subscription span with a query range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapWindow {
    pub start: MonthDate,
    pub end: MonthDate,
}

impl OverlapWindow {
    /// `months_until(start, end)`, never negative
    pub fn billable_months(&self) -> i64 {
        self.start.months_until(&self.end)
    }
}

/// Overlap of `[span_start, span_end]` with `range`
///
/// An open-ended span (`span_end == None`) is active through `range.end`
/// and never beyond it. Returns `None` when the windows do not intersect.
pub fn overlap_window(
    span_start: MonthDate,
    span_end: Option<MonthDate>,
    range: &QueryRange,
) -> Option<OverlapWindow> {
    let effective_end = span_end.unwrap_or(range.end);
    let start = span_start.max(range.start);
    let end = effective_end.min(range.end);

    (start <= end).then_some(OverlapWindow { start, end })
}

/// Billable months of `subscription` within `range`, 0 when disjoint
pub fn billable_months(subscription: &Subscription, range: &QueryRange) -> i64 {
    overlap_window(subscription.start_month, subscription.end_month, range)
        .map_or(0, |window| window.billable_months())
}
