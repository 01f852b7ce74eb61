//! Integration tests for the session record store
//!
//! These tests exercise the schema-level invariants against a real
//! PostgreSQL instance. They require `DATABASE_URL` to point at a live
//! database and are ignored by default; run them with
//! `cargo test -- --ignored`.

use chrono::Utc;
use common::database::{DatabaseConfig, init_pool};
use serial_test::serial;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const SCHEMA: &str = include_str!("../src/schema.sql");

async fn setup_pool() -> Result<PgPool, Box<dyn std::error::Error>> {
    let config = DatabaseConfig::from_env()?;
    let pool = init_pool(&config).await?;
    sqlx::raw_sql(SCHEMA).execute(&pool).await?;
    Ok(pool)
}

async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    status: &str,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO activity_sessions (
            id, user_id, goal_id, activity_id, status, started_at,
            last_heartbeat_at, rate_segments
        )
        VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(Uuid::new_v4())
    .bind(Uuid::new_v4())
    .bind(status)
    .bind(Utc::now())
    .bind(serde_json::json!([
        {"at_second": 0.0, "activity_id": Uuid::new_v4(), "rates": {"creativity": 1.0}}
    ]))
    .execute(pool)
    .await?;

    Ok(id)
}

/// A user can hold at most one live-or-paused session: the partial unique
/// index rejects the second insert.
#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_single_active_session_per_user() -> Result<(), Box<dyn std::error::Error>> {
    let pool = setup_pool().await?;
    let user_id = Uuid::new_v4();

    insert_session(&pool, user_id, "live").await?;

    let second = insert_session(&pool, user_id, "paused").await;
    let err = second.expect_err("second active session must be rejected");

    match err {
        sqlx::Error::Database(db) => {
            assert_eq!(
                db.constraint(),
                Some("activity_sessions_one_active_per_user")
            );
        }
        other => panic!("expected a constraint violation, got: {}", other),
    }

    // A completed session does not occupy the slot.
    insert_session(&pool, user_id, "completed").await?;

    Ok(())
}

/// Sync bookkeeping round trip: a completed session starts unsynced and
/// the flag flips exactly once the push is recorded.
#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_sync_flag_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let pool = setup_pool().await?;
    let user_id = Uuid::new_v4();

    let id = insert_session(&pool, user_id, "completed").await?;

    let row = sqlx::query("SELECT synced_to_django FROM activity_sessions WHERE id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await?;
    assert!(!row.get::<bool, _>("synced_to_django"));

    sqlx::query(
        "UPDATE activity_sessions SET synced_to_django = TRUE, last_synced_at = $2 WHERE id = $1",
    )
    .bind(id)
    .bind(Utc::now())
    .execute(&pool)
    .await?;

    let row = sqlx::query(
        "SELECT synced_to_django, last_synced_at FROM activity_sessions WHERE id = $1",
    )
    .bind(id)
    .fetch_one(&pool)
    .await?;
    assert!(row.get::<bool, _>("synced_to_django"));
    assert!(
        row.get::<Option<chrono::DateTime<Utc>>, _>("last_synced_at")
            .is_some()
    );

    Ok(())
}
