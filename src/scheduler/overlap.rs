//! Interval overlap decisions for room bookings.
//!
//! All booking intervals are half-open `[start, end)` on a single room's
//! timeline. The overlap rule is deliberately asymmetric at the boundaries:
//! two intervals that start at the same instant always conflict, and an
//! interval that ends exactly where the next one starts does not. The
//! simpler "touching never conflicts" rule is available as
//! [`BoundaryPolicy::TouchingAllowed`] so callers and tests can pin either
//! behavior explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A booking time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

/// Boundary rule applied when two intervals share an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// A tie on start instants always conflicts; only a strict ordering on
    /// both start and end, with the earlier interval ending at or before the
    /// later one starts, is conflict-free.
    #[default]
    StartTieConflicts,
    /// Intervals that merely touch (`a.end == b.start`) never conflict.
    TouchingAllowed,
}

/// Decide whether two intervals on the same room overlap.
///
/// The pair is first ordered by (start, end) ascending, so the result does
/// not depend on argument order.
pub fn overlaps(a: Interval, b: Interval, policy: BoundaryPolicy) -> bool {
    let (first, second) = sort_pair(a, b);

    match policy {
        BoundaryPolicy::StartTieConflicts => {
            let starts_strictly_before = first.start < second.start;
            let ends_strictly_before = first.end < second.end;
            let ends_at_or_before_second_starts =
                first.end < second.start || first.end == second.start;

            let clear = starts_strictly_before
                && ends_strictly_before
                && ends_at_or_before_second_starts;
            !clear
        }
        BoundaryPolicy::TouchingAllowed => first.end > second.start,
    }
}

/// Decide whether a candidate interval conflicts with the intervals returned
/// by the store's bracketing range query.
///
/// The range query for a tight candidate returns at most the immediate left
/// and right neighbors; three or more rows is itself evidence of conflict,
/// so that case is conservatively treated as overlapping.
pub fn is_overlapping(candidate: Interval, existing: &[Interval], policy: BoundaryPolicy) -> bool {
    match existing {
        [] => false,
        [only] => overlaps(candidate, *only, policy),
        [left, right] => {
            overlaps(*left, candidate, policy) || overlaps(candidate, *right, policy)
        }
        _ => true,
    }
}

fn sort_pair(a: Interval, b: Interval) -> (Interval, Interval) {
    if (a.start, a.end) <= (b.start, b.end) {
        (a, b)
    } else {
        (b, a)
    }
}
