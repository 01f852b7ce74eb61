//! Session lifecycle engine
//!
//! Each operation is a single atomic read-modify-write against one session
//! record: begin a transaction, lock the row, apply the pure transition,
//! persist, commit. The server clock is authoritative throughout; client
//! timestamps are never trusted.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::SessionError;
use crate::models::StartSessionRequest;
use crate::models::session::{
    CompletedReason, FinishReason, RateSegment, Session, SessionStatus, XpBreakdown,
};
use crate::repositories::SessionRepository;
use crate::transitions;

/// Session lifecycle engine
#[derive(Clone)]
pub struct SessionEngine {
    pool: PgPool,
    repository: SessionRepository,
}

impl SessionEngine {
    /// Create a new session engine
    pub fn new(pool: PgPool, repository: SessionRepository) -> Self {
        Self { pool, repository }
    }

    /// Start a new session for a user
    ///
    /// Rejects with `AlreadyActive` if the user already has a live or
    /// paused session; the store's unique index is the serialization point
    /// for concurrent starts.
    pub async fn start(&self, request: StartSessionRequest) -> Result<Session, SessionError> {
        if !request.rates.is_non_negative() {
            return Err(SessionError::NegativeRates);
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            goal_id: request.goal_id,
            activity_id: request.activity_id,
            status: SessionStatus::Live,
            started_at: now,
            ended_at: None,
            last_resumed_at: None,
            last_heartbeat_at: now,
            pause_intervals: vec![],
            total_duration_seconds: 0.0,
            focused_duration_seconds: 0.0,
            rate_segments: vec![RateSegment {
                at_second: 0.0,
                activity_id: request.activity_id,
                rates: request.rates,
            }],
            xp_total: 0,
            xp_breakdown: XpBreakdown::default(),
            nudge_count: 0,
            device_context: request.device_context,
            completed_reason: None,
            interruption_reason: None,
            synced_to_django: false,
            last_synced_at: None,
        };

        self.repository.insert(&session).await?;
        info!("Started session {} for user {}", session.id, session.user_id);

        Ok(session)
    }

    /// Liveness signal: refresh derived fields and the heartbeat timestamp
    pub async fn heartbeat(&self, id: Uuid) -> Result<Session, SessionError> {
        self.mutate(id, transitions::apply_heartbeat).await
    }

    /// Pause a live session
    pub async fn pause(&self, id: Uuid, reason: Option<String>) -> Result<Session, SessionError> {
        let session = self
            .mutate(id, |session, now| {
                transitions::apply_pause(session, now, reason)
            })
            .await?;
        info!("Paused session {}", session.id);
        Ok(session)
    }

    /// Resume a paused session
    pub async fn resume(&self, id: Uuid) -> Result<Session, SessionError> {
        let session = self.mutate(id, transitions::apply_resume).await?;
        info!("Resumed session {}", session.id);
        Ok(session)
    }

    /// Complete a session with a client-supplied reason
    pub async fn complete(&self, id: Uuid, reason: FinishReason) -> Result<Session, SessionError> {
        let session = self
            .mutate(id, |session, now| {
                transitions::apply_finish(session, now, "complete", reason.as_completed(), None)
            })
            .await?;
        info!(
            "Completed session {} ({} XP, reason: {})",
            session.id,
            session.xp_total,
            reason.as_completed().as_str()
        );
        Ok(session)
    }

    /// Abandon a session, either client-initiated or forced by the reaper
    pub async fn abandon(
        &self,
        id: Uuid,
        interruption_reason: Option<String>,
    ) -> Result<Session, SessionError> {
        let session = self
            .mutate(id, |session, now| {
                transitions::apply_finish(
                    session,
                    now,
                    "abandon",
                    CompletedReason::Abandoned,
                    interruption_reason,
                )
            })
            .await?;
        info!("Abandoned session {}", session.id);
        Ok(session)
    }

    /// Get a session by id
    pub async fn get_session(&self, id: Uuid) -> Result<Option<Session>, SessionError> {
        self.repository.get_by_id(id).await
    }

    /// Get the user's live-or-paused session, if any
    pub async fn get_active_session(&self, user_id: Uuid) -> Result<Option<Session>, SessionError> {
        self.repository.find_active_by_user(user_id).await
    }

    /// Get all sessions for a goal, newest first
    pub async fn get_sessions_by_goal(&self, goal_id: Uuid) -> Result<Vec<Session>, SessionError> {
        self.repository.list_by_goal(goal_id).await
    }

    /// Run one transition as an atomic read-modify-write
    async fn mutate<F>(&self, id: Uuid, transition: F) -> Result<Session, SessionError>
    where
        F: FnOnce(Session, DateTime<Utc>) -> Result<Session, SessionError>,
    {
        let mut tx = self.pool.begin().await?;

        let session = self
            .repository
            .fetch_for_update(&mut tx, id)
            .await?
            .ok_or(SessionError::NotFound(id))?;

        let updated = transition(session, Utc::now())?;

        self.repository.persist(&mut tx, &updated).await?;
        tx.commit().await?;

        Ok(updated)
    }
}
