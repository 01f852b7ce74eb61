//! Client for the external system of record
//!
//! Completed sessions are mirrored into the Django backend that serves
//! reporting and leaderboards. The push is an idempotent upsert keyed by
//! session id: a retry after a crash between the remote write and the
//! local flag update simply overwrites the same record.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::session::{Session, XpBreakdown};

/// Finalized session record as the system of record expects it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedSessionRecord {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub goal_id: Uuid,
    pub activity_id: Uuid,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub ended_at: Option<DateTime<Utc>>,
    pub total_duration_seconds: f64,
    pub focused_duration_seconds: f64,
    pub xp_total: i64,
    pub xp_breakdown: XpBreakdown,
    pub completed_reason: Option<&'static str>,
    pub interruption_reason: Option<String>,
}

impl CompletedSessionRecord {
    /// Build the push payload from a completed session
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id,
            user_id: session.user_id,
            goal_id: session.goal_id,
            activity_id: session.activity_id,
            started_at: session.started_at,
            ended_at: session.ended_at,
            total_duration_seconds: session.total_duration_seconds,
            focused_duration_seconds: session.focused_duration_seconds,
            xp_total: session.xp_total,
            xp_breakdown: session.xp_breakdown,
            completed_reason: session.completed_reason.map(|reason| reason.as_str()),
            interruption_reason: session.interruption_reason.clone(),
        }
    }
}

/// Client for pushing finalized sessions to the Django backend
#[derive(Clone)]
pub struct DjangoSyncClient {
    http: reqwest::Client,
    base_url: String,
}

impl DjangoSyncClient {
    /// Create a new sync client
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Push a finalized session, keyed by session id
    pub async fn push_completed_session(&self, session: &Session) -> Result<()> {
        let url = format!(
            "{}/api/session-records/{}/",
            self.base_url.trim_end_matches('/'),
            session.id
        );
        let payload = CompletedSessionRecord::from_session(session);

        let response = self.http.put(&url).json(&payload).send().await?;
        response.error_for_status()?;

        Ok(())
    }
}
