//! Time and XP math
//!
//! Pure functions over a session's pause intervals and rate segments. No
//! side effects and no storage access: every mutating operation recomputes
//! durations and XP from first principles instead of incrementing
//! counters, so the same state recomputed at the same instant always
//! yields the same result.

use chrono::{DateTime, Utc};

use crate::models::session::{PauseInterval, RateSegment, Session, XpBreakdown};

/// Result of piecewise XP integration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegratedXp {
    pub xp_total: i64,
    pub breakdown: XpBreakdown,
}

/// Derived duration and XP fields, recomputed as of `now`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recalculated {
    pub total_duration_seconds: f64,
    pub focused_duration_seconds: f64,
    pub xp_total: i64,
    pub xp_breakdown: XpBreakdown,
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// Sum of all pause interval durations in fractional seconds. An open
/// interval lasts until `now`.
pub fn total_pause_duration(intervals: &[PauseInterval], now: DateTime<Utc>) -> f64 {
    intervals
        .iter()
        .map(|interval| seconds_between(interval.paused_at, interval.resumed_at.unwrap_or(now)))
        .sum()
}

/// Elapsed session time excluding all paused intervals, clamped to >= 0
pub fn focused_duration(
    started_at: DateTime<Utc>,
    intervals: &[PauseInterval],
    now: DateTime<Utc>,
) -> f64 {
    let elapsed = seconds_between(started_at, now);
    (elapsed - total_pause_duration(intervals, now)).max(0.0)
}

/// Piecewise integration of the rate segments over `focused_seconds`.
///
/// Segment `i` is in effect from its `at_second` mark until the next
/// segment begins (or until `focused_seconds`, whichever comes first);
/// segments starting at or beyond `focused_seconds` contribute nothing.
/// The total is the floor of the sum across dimensions.
pub fn integrate_xp(segments: &[RateSegment], focused_seconds: f64) -> IntegratedXp {
    let mut breakdown = XpBreakdown::default();

    for (i, segment) in segments.iter().enumerate() {
        if segment.at_second >= focused_seconds {
            break;
        }

        let segment_end = segments
            .get(i + 1)
            .map(|next| next.at_second)
            .unwrap_or(focused_seconds)
            .min(focused_seconds);
        let duration = segment_end - segment.at_second;

        breakdown.physique += duration * segment.rates.physique;
        breakdown.energy += duration * segment.rates.energy;
        breakdown.logic += duration * segment.rates.logic;
        breakdown.creativity += duration * segment.rates.creativity;
        breakdown.social += duration * segment.rates.social;
    }

    IntegratedXp {
        xp_total: breakdown.sum().floor() as i64,
        breakdown,
    }
}

/// Recompute all derived fields of a session as of `now`
pub fn recalculate(session: &Session, now: DateTime<Utc>) -> Recalculated {
    let total_duration_seconds = seconds_between(session.started_at, now).max(0.0);
    let focused_duration_seconds = focused_duration(session.started_at, &session.pause_intervals, now);
    let integrated = integrate_xp(&session.rate_segments, focused_duration_seconds);

    Recalculated {
        total_duration_seconds,
        focused_duration_seconds,
        xp_total: integrated.xp_total,
        xp_breakdown: integrated.breakdown,
    }
}
