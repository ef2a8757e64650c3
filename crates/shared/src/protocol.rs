use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ExplorationId, Params, UserId};

/// Response to `GET /learnhandler/init/:exploration_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderInitResponse {
    pub block_number: u64,
    pub interactive_html: String,
    pub oppia_html: String,
    pub params: Params,
    pub state_history: Vec<String>,
    pub state_name: String,
    pub title: String,
}

/// Reader progress echoed back by the client on every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    #[serde(default)]
    pub answer: Value,
    pub handler: String,
    pub block_number: u64,
    #[serde(default)]
    pub params: Params,
    pub state_history: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub interactive_html: String,
    pub exploration_id: ExplorationId,
    pub state_name: String,
    pub oppia_html: String,
    pub block_number: u64,
    pub params: Params,
    pub finished: bool,
    pub state_history: Vec<String>,
    pub reader_response_html: String,
    pub reader_response_iframe: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderFeedbackRequest {
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub state_history: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: UserId,
    pub token: String,
}

/// Onboarding payload. `agreed_to_terms` stays raw JSON so that anything other
/// than a literal `true` can be rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrerequisitesRequest {
    #[serde(default)]
    pub agreed_to_terms: Option<Value>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrerequisitesResponse {
    pub agreed_to_terms: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateHitSummary {
    pub state_name: String,
    pub first_hits: u64,
    pub total_hits: u64,
}
