//! Session document and related value types
//!
//! A session is one row in `activity_sessions`. All timestamps cross the
//! wire as epoch milliseconds; durations derived from them are fractional
//! seconds, and XP totals are floored integers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Live,
    Paused,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Live => "live",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
        }
    }

    /// True for the statuses that occupy the user's single active slot
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Live | SessionStatus::Paused)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(SessionStatus::Live),
            "paused" => Ok(SessionStatus::Paused),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(format!("unknown session status: {}", other)),
        }
    }
}

/// Why a session reached `completed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletedReason {
    Manual,
    Auto,
    Abandoned,
    Timeout,
    CrashRecovered,
}

impl CompletedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletedReason::Manual => "manual",
            CompletedReason::Auto => "auto",
            CompletedReason::Abandoned => "abandoned",
            CompletedReason::Timeout => "timeout",
            CompletedReason::CrashRecovered => "crash_recovered",
        }
    }
}

impl FromStr for CompletedReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(CompletedReason::Manual),
            "auto" => Ok(CompletedReason::Auto),
            "abandoned" => Ok(CompletedReason::Abandoned),
            "timeout" => Ok(CompletedReason::Timeout),
            "crash_recovered" => Ok(CompletedReason::CrashRecovered),
            other => Err(format!("unknown completed reason: {}", other)),
        }
    }
}

/// Completion reasons a client may request directly. Abandonment goes
/// through the dedicated abandon operation instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Manual,
    Auto,
    Timeout,
}

impl FinishReason {
    pub fn as_completed(self) -> CompletedReason {
        match self {
            FinishReason::Manual => CompletedReason::Manual,
            FinishReason::Auto => CompletedReason::Auto,
            FinishReason::Timeout => CompletedReason::Timeout,
        }
    }
}

/// One pause interval. At most one entry per session may be open (absent
/// `resumed_at`), and only the last entry may be open. Closing an entry
/// only ever sets `resumed_at`; entries are never reordered or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseInterval {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub paused_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub resumed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PauseInterval {
    pub fn is_open(&self) -> bool {
        self.resumed_at.is_none()
    }
}

/// XP accrued per focused second across the five life-aspect dimensions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct XpRates {
    #[serde(default)]
    pub physique: f64,
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub logic: f64,
    #[serde(default)]
    pub creativity: f64,
    #[serde(default)]
    pub social: f64,
}

impl XpRates {
    pub fn is_non_negative(&self) -> bool {
        self.physique >= 0.0
            && self.energy >= 0.0
            && self.logic >= 0.0
            && self.creativity >= 0.0
            && self.social >= 0.0
    }
}

/// Accumulated XP per dimension, derived from the rate segments and the
/// focused duration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct XpBreakdown {
    #[serde(default)]
    pub physique: f64,
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub logic: f64,
    #[serde(default)]
    pub creativity: f64,
    #[serde(default)]
    pub social: f64,
}

impl XpBreakdown {
    pub fn sum(&self) -> f64 {
        self.physique + self.energy + self.logic + self.creativity + self.social
    }
}

/// A time-anchored XP-rate vector, in effect from `at_second` (measured in
/// focused seconds) until the next segment begins. The first segment of a
/// session always has `at_second = 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSegment {
    pub at_second: f64,
    pub activity_id: Uuid,
    pub rates: XpRates,
}

/// Immutable client metadata captured when the session starts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// Activity session entity
///
/// Duration and XP fields are derived: they are recomputed from
/// `started_at`, `pause_intervals` and `rate_segments` on every mutating
/// operation and are never independently authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal_id: Uuid,
    pub activity_id: Uuid,
    pub status: SessionStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub last_resumed_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_heartbeat_at: DateTime<Utc>,
    pub pause_intervals: Vec<PauseInterval>,
    pub total_duration_seconds: f64,
    pub focused_duration_seconds: f64,
    pub rate_segments: Vec<RateSegment>,
    pub xp_total: i64,
    pub xp_breakdown: XpBreakdown,
    pub nudge_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_context: Option<DeviceContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_reason: Option<CompletedReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interruption_reason: Option<String>,
    pub synced_to_django: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub last_synced_at: Option<DateTime<Utc>>,
}
