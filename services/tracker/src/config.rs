//! Tracker service configuration

use anyhow::Result;
use std::env;

/// Configuration for the tracker service
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Live sessions with a heartbeat older than this are reaped
    pub heartbeat_timeout_seconds: u64,
    /// Cron schedule for the staleness reaper
    pub reaper_schedule: String,
    /// Cron schedule for the sync retry job
    pub sync_schedule: String,
    /// Maximum sessions pushed per sync run
    pub sync_batch_size: i64,
    /// Base URL of the Django system of record
    pub django_base_url: String,
}

impl TrackerConfig {
    /// Create a new TrackerConfig from environment variables
    ///
    /// # Environment Variables
    /// - `TRACKER_BIND_ADDR`: HTTP bind address (default: "0.0.0.0:3002")
    /// - `HEARTBEAT_TIMEOUT_SECONDS`: staleness threshold (default: 300)
    /// - `REAPER_SCHEDULE`: reaper cron schedule (default: every 2 minutes)
    /// - `SYNC_SCHEDULE`: sync cron schedule (default: every 5 minutes)
    /// - `SYNC_BATCH_SIZE`: sessions per sync run (default: 100)
    /// - `DJANGO_BASE_URL`: system-of-record base URL
    ///   (default: "http://localhost:8000")
    pub fn from_env() -> Result<Self> {
        let bind_addr =
            env::var("TRACKER_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3002".to_string());

        let heartbeat_timeout_seconds = env::var("HEARTBEAT_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        let reaper_schedule =
            env::var("REAPER_SCHEDULE").unwrap_or_else(|_| "0 */2 * * * *".to_string());

        let sync_schedule =
            env::var("SYNC_SCHEDULE").unwrap_or_else(|_| "0 */5 * * * *".to_string());

        let sync_batch_size = env::var("SYNC_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        let django_base_url =
            env::var("DJANGO_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());

        Ok(Self {
            bind_addr,
            heartbeat_timeout_seconds,
            reaper_schedule,
            sync_schedule,
            sync_batch_size,
            django_base_url,
        })
    }
}
