//! Scheduled background jobs
//!
//! Both jobs run on fixed wall-clock schedules, are idempotent, and are
//! safe to overlap with live traffic: they only ever move a record forward
//! in the state machine or forward in sync status.

pub mod reaper;
pub mod sync_retry;
