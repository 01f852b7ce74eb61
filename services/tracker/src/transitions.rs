//! Pure state-machine transitions
//!
//! Each lifecycle operation's in-memory effect lives here as a pure
//! function over a session snapshot and the server clock. The engine wraps
//! these in a transaction; keeping them pure keeps the state machine
//! testable without a database.
//!
//! State machine: (none) -> live -> {paused <-> live} -> completed.
//! `completed` is terminal.

use chrono::{DateTime, Utc};

use crate::error::SessionError;
use crate::models::session::{CompletedReason, PauseInterval, Session, SessionStatus};
use crate::xp;

fn require_status(
    session: &Session,
    expected: SessionStatus,
    operation: &'static str,
) -> Result<(), SessionError> {
    if session.status != expected {
        return Err(SessionError::InvalidTransition {
            operation,
            status: session.status,
        });
    }
    Ok(())
}

fn apply_recalculation(session: &mut Session, now: DateTime<Utc>) {
    let recalculated = xp::recalculate(session, now);
    session.total_duration_seconds = recalculated.total_duration_seconds;
    session.focused_duration_seconds = recalculated.focused_duration_seconds;
    session.xp_total = recalculated.xp_total;
    session.xp_breakdown = recalculated.xp_breakdown;
}

/// Liveness signal: refresh derived fields and the heartbeat timestamp
pub fn apply_heartbeat(mut session: Session, now: DateTime<Utc>) -> Result<Session, SessionError> {
    require_status(&session, SessionStatus::Live, "heartbeat")?;

    apply_recalculation(&mut session, now);
    session.last_heartbeat_at = now;
    Ok(session)
}

/// live -> paused: freeze accrual at the pause instant and open a new
/// pause interval
pub fn apply_pause(
    mut session: Session,
    now: DateTime<Utc>,
    reason: Option<String>,
) -> Result<Session, SessionError> {
    require_status(&session, SessionStatus::Live, "pause")?;

    apply_recalculation(&mut session, now);
    session.status = SessionStatus::Paused;
    session.pause_intervals.push(PauseInterval {
        paused_at: now,
        resumed_at: None,
        reason,
    });
    session.last_heartbeat_at = now;
    Ok(session)
}

/// paused -> live: close the open interval.
///
/// Durations and XP are intentionally NOT recomputed here; they refresh on
/// the next heartbeat, pause, or completion, so a read immediately after
/// resume still shows the pre-pause totals. Downstream consumers rely on
/// that lag.
pub fn apply_resume(mut session: Session, now: DateTime<Utc>) -> Result<Session, SessionError> {
    require_status(&session, SessionStatus::Paused, "resume")?;

    match session.pause_intervals.last_mut() {
        Some(interval) if interval.is_open() => {
            interval.resumed_at = Some(now);
        }
        _ => return Err(SessionError::MissingOpenInterval),
    }

    session.status = SessionStatus::Live;
    session.last_resumed_at = Some(now);
    session.last_heartbeat_at = now;
    Ok(session)
}

/// {live, paused} -> completed: close any open interval, recompute final
/// totals, and freeze the record. Shared by complete and abandon.
pub fn apply_finish(
    mut session: Session,
    now: DateTime<Utc>,
    operation: &'static str,
    reason: CompletedReason,
    interruption_reason: Option<String>,
) -> Result<Session, SessionError> {
    if !session.status.is_active() {
        return Err(SessionError::InvalidTransition {
            operation,
            status: session.status,
        });
    }

    if let Some(interval) = session.pause_intervals.last_mut() {
        if interval.is_open() {
            interval.resumed_at = Some(now);
        }
    }

    apply_recalculation(&mut session, now);
    session.status = SessionStatus::Completed;
    session.ended_at = Some(now);
    session.completed_reason = Some(reason);
    session.interruption_reason = interruption_reason;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::{RateSegment, XpBreakdown, XpRates};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn ts(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn live_session() -> Session {
        let activity_id = Uuid::new_v4();
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            goal_id: Uuid::new_v4(),
            activity_id,
            status: SessionStatus::Live,
            started_at: ts(0),
            ended_at: None,
            last_resumed_at: None,
            last_heartbeat_at: ts(0),
            pause_intervals: vec![],
            total_duration_seconds: 0.0,
            focused_duration_seconds: 0.0,
            rate_segments: vec![RateSegment {
                at_second: 0.0,
                activity_id,
                rates: XpRates {
                    energy: 2.0,
                    ..Default::default()
                },
            }],
            xp_total: 0,
            xp_breakdown: XpBreakdown::default(),
            nudge_count: 0,
            device_context: None,
            completed_reason: None,
            interruption_reason: None,
            synced_to_django: false,
            last_synced_at: None,
        }
    }

    #[test]
    fn test_heartbeat_refreshes_derived_fields() {
        let session = apply_heartbeat(live_session(), ts(10)).unwrap();

        assert_eq!(session.status, SessionStatus::Live);
        assert_eq!(session.last_heartbeat_at, ts(10));
        assert_eq!(session.total_duration_seconds, 10.0);
        assert_eq!(session.focused_duration_seconds, 10.0);
        assert_eq!(session.xp_total, 20);
    }

    #[test]
    fn test_focused_time_is_monotonic_across_heartbeats() {
        let first = apply_heartbeat(live_session(), ts(10)).unwrap();
        let second = apply_heartbeat(first.clone(), ts(20)).unwrap();

        assert!(second.focused_duration_seconds >= first.focused_duration_seconds);
        assert!(second.focused_duration_seconds <= second.total_duration_seconds);
    }

    #[test]
    fn test_pause_opens_interval_and_freezes_accrual() {
        let session = apply_pause(live_session(), ts(10), Some("break".to_string())).unwrap();

        assert_eq!(session.status, SessionStatus::Paused);
        assert_eq!(session.pause_intervals.len(), 1);
        assert!(session.pause_intervals[0].is_open());
        assert_eq!(session.pause_intervals[0].reason.as_deref(), Some("break"));
        assert_eq!(session.focused_duration_seconds, 10.0);
        assert_eq!(session.xp_total, 20);
        assert_eq!(session.last_heartbeat_at, ts(10));
    }

    #[test]
    fn test_pause_requires_live() {
        let paused = apply_pause(live_session(), ts(10), None).unwrap();
        let err = apply_pause(paused, ts(20), None).unwrap_err();

        assert!(matches!(
            err,
            SessionError::InvalidTransition {
                operation: "pause",
                status: SessionStatus::Paused,
            }
        ));
    }

    #[test]
    fn test_heartbeat_rejected_while_paused() {
        let paused = apply_pause(live_session(), ts(10), None).unwrap();
        let err = apply_heartbeat(paused, ts(20)).unwrap_err();

        assert_eq!(err.to_string(), "cannot heartbeat a paused session");
    }

    #[test]
    fn test_resume_closes_interval_without_recomputing() {
        let paused = apply_pause(live_session(), ts(10), None).unwrap();
        let resumed = apply_resume(paused.clone(), ts(15)).unwrap();

        assert_eq!(resumed.status, SessionStatus::Live);
        assert_eq!(resumed.pause_intervals[0].resumed_at, Some(ts(15)));
        assert_eq!(resumed.last_resumed_at, Some(ts(15)));
        assert_eq!(resumed.last_heartbeat_at, ts(15));

        // Totals stay stale until the next heartbeat/pause/complete.
        assert_eq!(
            resumed.total_duration_seconds,
            paused.total_duration_seconds
        );
        assert_eq!(
            resumed.focused_duration_seconds,
            paused.focused_duration_seconds
        );
        assert_eq!(resumed.xp_total, paused.xp_total);
    }

    #[test]
    fn test_resume_then_heartbeat_excludes_pause() {
        // Start t=0, pause t=10..15, heartbeat at t=25: 20 focused seconds.
        let paused = apply_pause(live_session(), ts(10), None).unwrap();
        let resumed = apply_resume(paused, ts(15)).unwrap();
        let session = apply_heartbeat(resumed, ts(25)).unwrap();

        assert_eq!(session.total_duration_seconds, 25.0);
        assert_eq!(session.focused_duration_seconds, 20.0);
        assert_eq!(session.xp_total, 40);
    }

    #[test]
    fn test_resume_requires_paused() {
        let err = apply_resume(live_session(), ts(5)).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidTransition {
                operation: "resume",
                status: SessionStatus::Live,
            }
        ));
    }

    #[test]
    fn test_resume_rejects_corrupt_pause_ledger() {
        // A paused session whose last interval is already closed should be
        // unreachable; resume must still refuse to fabricate one.
        let mut session = apply_pause(live_session(), ts(10), None).unwrap();
        session.pause_intervals[0].resumed_at = Some(ts(12));

        let err = apply_resume(session, ts(15)).unwrap_err();
        assert!(matches!(err, SessionError::MissingOpenInterval));
    }

    #[test]
    fn test_complete_from_live() {
        let session = apply_finish(
            live_session(),
            ts(30),
            "complete",
            CompletedReason::Manual,
            None,
        )
        .unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.ended_at, Some(ts(30)));
        assert_eq!(session.completed_reason, Some(CompletedReason::Manual));
        assert_eq!(session.interruption_reason, None);
        assert_eq!(session.total_duration_seconds, 30.0);
        assert_eq!(session.focused_duration_seconds, 30.0);
        assert_eq!(session.xp_total, 60);
    }

    #[test]
    fn test_complete_from_paused_closes_open_interval() {
        let paused = apply_pause(live_session(), ts(10), None).unwrap();
        let session = apply_finish(paused, ts(30), "complete", CompletedReason::Auto, None).unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.pause_intervals[0].resumed_at, Some(ts(30)));
        // 10 focused seconds before the pause, none after.
        assert_eq!(session.total_duration_seconds, 30.0);
        assert_eq!(session.focused_duration_seconds, 10.0);
        assert_eq!(session.xp_total, 20);
    }

    #[test]
    fn test_abandon_records_interruption() {
        let session = apply_finish(
            live_session(),
            ts(30),
            "abandon",
            CompletedReason::Abandoned,
            Some("heartbeat_timeout".to_string()),
        )
        .unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.completed_reason, Some(CompletedReason::Abandoned));
        assert_eq!(
            session.interruption_reason.as_deref(),
            Some("heartbeat_timeout")
        );
    }

    #[test]
    fn test_completed_is_terminal() {
        let completed = apply_finish(
            live_session(),
            ts(30),
            "complete",
            CompletedReason::Manual,
            None,
        )
        .unwrap();

        assert!(apply_heartbeat(completed.clone(), ts(40)).is_err());
        assert!(apply_pause(completed.clone(), ts(40), None).is_err());
        assert!(apply_resume(completed.clone(), ts(40)).is_err());
        assert!(
            apply_finish(
                completed.clone(),
                ts(40),
                "complete",
                CompletedReason::Manual,
                None,
            )
            .is_err()
        );
        assert!(
            apply_finish(
                completed.clone(),
                ts(40),
                "abandon",
                CompletedReason::Abandoned,
                None,
            )
            .is_err()
        );

        // Rejected operations leave the record untouched.
        let again = apply_heartbeat(completed.clone(), ts(40)).unwrap_err();
        assert_eq!(again.to_string(), "cannot heartbeat a completed session");
        let frozen = apply_finish(
            live_session(),
            ts(30),
            "complete",
            CompletedReason::Manual,
            None,
        )
        .unwrap();
        assert_eq!(frozen.total_duration_seconds, completed.total_duration_seconds);
        assert_eq!(frozen.xp_total, completed.xp_total);
    }

    #[test]
    fn test_pause_ledger_has_single_open_interval() {
        let mut session = live_session();
        for i in 0..3 {
            session = apply_pause(session, ts(10 + i * 20), None).unwrap();
            session = apply_resume(session, ts(20 + i * 20)).unwrap();
        }

        let open = session
            .pause_intervals
            .iter()
            .filter(|interval| interval.is_open())
            .count();
        assert_eq!(open, 0);
        assert_eq!(session.pause_intervals.len(), 3);

        let session = apply_pause(session, ts(80), None).unwrap();
        assert!(session.pause_intervals.last().unwrap().is_open());
        assert_eq!(
            session
                .pause_intervals
                .iter()
                .filter(|interval| interval.is_open())
                .count(),
            1
        );
    }
}
