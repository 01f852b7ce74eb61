//! Session repository for database operations
//!
//! All lifecycle mutations go through `fetch_for_update` + `persist` inside
//! a single transaction; the row lock serializes concurrent operations on
//! the same session. The single-active-session invariant is enforced by
//! the `activity_sessions_one_active_per_user` partial unique index, not by
//! application-level locking.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::SessionError;
use crate::models::session::{CompletedReason, DeviceContext, Session, SessionStatus};

/// Column list shared by every SELECT that maps to a full `Session`
const SESSION_COLUMNS: &str = r#"
    id, user_id, goal_id, activity_id, status, started_at, ended_at,
    last_resumed_at, last_heartbeat_at, pause_intervals,
    total_duration_seconds, focused_duration_seconds, rate_segments,
    xp_total, xp_breakdown, nudge_count, device_context, completed_reason,
    interruption_reason, synced_to_django, last_synced_at
"#;

/// Session repository
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a newly started session
    ///
    /// A violation of the one-active-session index maps to
    /// `SessionError::AlreadyActive`: exactly one of two racing starts for
    /// the same user commits.
    pub async fn insert(&self, session: &Session) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            INSERT INTO activity_sessions (
                id, user_id, goal_id, activity_id, status, started_at,
                ended_at, last_resumed_at, last_heartbeat_at, pause_intervals,
                total_duration_seconds, focused_duration_seconds,
                rate_segments, xp_total, xp_breakdown, nudge_count,
                device_context, completed_reason, interruption_reason,
                synced_to_django, last_synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.goal_id)
        .bind(session.activity_id)
        .bind(session.status.as_str())
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(session.last_resumed_at)
        .bind(session.last_heartbeat_at)
        .bind(to_json(&session.pause_intervals, "pause_intervals")?)
        .bind(session.total_duration_seconds)
        .bind(session.focused_duration_seconds)
        .bind(to_json(&session.rate_segments, "rate_segments")?)
        .bind(session.xp_total)
        .bind(to_json(&session.xp_breakdown, "xp_breakdown")?)
        .bind(session.nudge_count)
        .bind(
            session
                .device_context
                .as_ref()
                .map(|context| to_json(context, "device_context"))
                .transpose()?,
        )
        .bind(session.completed_reason.map(|reason| reason.as_str()))
        .bind(session.interruption_reason.as_deref())
        .bind(session.synced_to_django)
        .bind(session.last_synced_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db)
                if db.constraint() == Some("activity_sessions_one_active_per_user") =>
            {
                SessionError::AlreadyActive(session.user_id)
            }
            _ => SessionError::Database(e),
        })?;

        Ok(())
    }

    /// Fetch a session inside a transaction, locking the row for the
    /// duration of the transaction
    pub async fn fetch_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Session>, SessionError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM activity_sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(|row| row_to_session(&row)).transpose()
    }

    /// Persist the engine-owned columns of a session inside a transaction
    ///
    /// `nudge_count` is deliberately not written: the social subsystem owns
    /// it and the engine only preserves it.
    pub async fn persist(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        session: &Session,
    ) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            UPDATE activity_sessions SET
                status = $2,
                ended_at = $3,
                last_resumed_at = $4,
                last_heartbeat_at = $5,
                pause_intervals = $6,
                total_duration_seconds = $7,
                focused_duration_seconds = $8,
                rate_segments = $9,
                xp_total = $10,
                xp_breakdown = $11,
                completed_reason = $12,
                interruption_reason = $13,
                synced_to_django = $14,
                last_synced_at = $15,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(session.id)
        .bind(session.status.as_str())
        .bind(session.ended_at)
        .bind(session.last_resumed_at)
        .bind(session.last_heartbeat_at)
        .bind(to_json(&session.pause_intervals, "pause_intervals")?)
        .bind(session.total_duration_seconds)
        .bind(session.focused_duration_seconds)
        .bind(to_json(&session.rate_segments, "rate_segments")?)
        .bind(session.xp_total)
        .bind(to_json(&session.xp_breakdown, "xp_breakdown")?)
        .bind(session.completed_reason.map(|reason| reason.as_str()))
        .bind(session.interruption_reason.as_deref())
        .bind(session.synced_to_django)
        .bind(session.last_synced_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Get a session by id
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Session>, SessionError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM activity_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_session(&row)).transpose()
    }

    /// Get the user's live-or-paused session, if any
    pub async fn find_active_by_user(&self, user_id: Uuid) -> Result<Option<Session>, SessionError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM activity_sessions
            WHERE user_id = $1 AND status IN ('live', 'paused')
            "#
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_session(&row)).transpose()
    }

    /// Get all sessions for a goal, newest first
    pub async fn list_by_goal(&self, goal_id: Uuid) -> Result<Vec<Session>, SessionError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM activity_sessions
            WHERE goal_id = $1
            ORDER BY started_at DESC
            "#
        ))
        .bind(goal_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_session).collect()
    }

    /// Ids of live sessions whose heartbeat is older than `cutoff`
    pub async fn find_stale_live(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, SessionError> {
        let rows = sqlx::query(
            r#"
            SELECT id
            FROM activity_sessions
            WHERE status = 'live' AND last_heartbeat_at < $1
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }

    /// Completed sessions not yet delivered to the system of record
    pub async fn find_unsynced_completed(&self, limit: i64) -> Result<Vec<Session>, SessionError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM activity_sessions
            WHERE status = 'completed' AND synced_to_django = FALSE
            ORDER BY ended_at ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_session).collect()
    }

    /// Record a successful push to the system of record
    pub async fn mark_synced(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            UPDATE activity_sessions
            SET synced_to_django = TRUE, last_synced_at = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn to_json<T: serde::Serialize>(value: &T, field: &str) -> Result<serde_json::Value, SessionError> {
    serde_json::to_value(value).map_err(|e| SessionError::Corrupt(format!("{}: {}", field, e)))
}

fn from_json<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    field: &str,
) -> Result<T, SessionError> {
    serde_json::from_value(value).map_err(|e| SessionError::Corrupt(format!("{}: {}", field, e)))
}

fn row_to_session(row: &PgRow) -> Result<Session, SessionError> {
    let status: String = row.get("status");
    let status: SessionStatus = status.parse().map_err(SessionError::Corrupt)?;

    let completed_reason: Option<String> = row.get("completed_reason");
    let completed_reason: Option<CompletedReason> = completed_reason
        .map(|reason| reason.parse().map_err(SessionError::Corrupt))
        .transpose()?;

    let device_context: Option<serde_json::Value> = row.get("device_context");
    let device_context: Option<DeviceContext> = device_context
        .map(|value| from_json(value, "device_context"))
        .transpose()?;

    Ok(Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        goal_id: row.get("goal_id"),
        activity_id: row.get("activity_id"),
        status,
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
        last_resumed_at: row.get("last_resumed_at"),
        last_heartbeat_at: row.get("last_heartbeat_at"),
        pause_intervals: from_json(row.get("pause_intervals"), "pause_intervals")?,
        total_duration_seconds: row.get("total_duration_seconds"),
        focused_duration_seconds: row.get("focused_duration_seconds"),
        rate_segments: from_json(row.get("rate_segments"), "rate_segments")?,
        xp_total: row.get("xp_total"),
        xp_breakdown: from_json(row.get("xp_breakdown"), "xp_breakdown")?,
        nudge_count: row.get("nudge_count"),
        device_context,
        completed_reason,
        interruption_reason: row.get("interruption_reason"),
        synced_to_django: row.get("synced_to_django"),
        last_synced_at: row.get("last_synced_at"),
    })
}
