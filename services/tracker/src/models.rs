//! Models for request payloads and the session document

use serde::Deserialize;
use uuid::Uuid;

pub mod session;

use session::{DeviceContext, FinishReason, XpRates};

/// Request to start a new activity session
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub user_id: Uuid,
    pub goal_id: Uuid,
    pub activity_id: Uuid,
    pub rates: XpRates,
    pub device_context: Option<DeviceContext>,
}

/// Optional body for pausing a session
#[derive(Debug, Default, Deserialize)]
pub struct PauseRequest {
    pub reason: Option<String>,
}

/// Body for completing a session
#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub reason: FinishReason,
}

/// Optional body for abandoning a session
#[derive(Debug, Default, Deserialize)]
pub struct AbandonRequest {
    pub interruption_reason: Option<String>,
}
