//! Editor onboarding: accepting the license terms and choosing a username.

use serde_json::Value;
use shared::{
    domain::{UserId, UserSummary},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{PrerequisitesRequest, PrerequisitesResponse},
};
use storage::UsernameClaim;
use tracing::info;

use crate::{internal, ReaderContext};

pub const TERMS_NOT_ACCEPTED: &str =
    "In order to edit explorations on this site, you will need to accept the license terms.";

pub fn get_prerequisites(user: &UserSummary) -> PrerequisitesResponse {
    PrerequisitesResponse {
        agreed_to_terms: user.agreed_to_terms,
        username: user.username.clone(),
    }
}

pub fn validate_username(username: &str) -> Result<(), ApiException> {
    if username.is_empty() {
        return Err(ApiException::new(
            ErrorCode::Validation,
            "Empty username supplied.",
        ));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiException::new(
            ErrorCode::Validation,
            "Usernames can only have alphanumeric characters.",
        ));
    }
    Ok(())
}

/// Terms are checked before the username. A user who already registered a
/// username may omit it.
pub async fn submit_prerequisites(
    ctx: &ReaderContext,
    user_id: UserId,
    request: PrerequisitesRequest,
) -> Result<(), ApiError> {
    if request.agreed_to_terms != Some(Value::Bool(true)) {
        return Err(ApiError::validation(TERMS_NOT_ACCEPTED));
    }

    let user = ctx
        .storage
        .get_user(user_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "unknown user"))?;

    let username = match (request.username, user.username) {
        (Some(username), _) => Some(username),
        (None, Some(_)) => None,
        (None, None) => Some(String::new()),
    };
    if let Some(username) = &username {
        validate_username(username)?;
    }

    let claim = ctx
        .storage
        .complete_onboarding(user_id, username.as_deref())
        .await
        .map_err(internal)?;
    if claim == UsernameClaim::Taken {
        return Err(ApiError::validation(format!(
            "Sorry, the username {} is already taken.",
            username.unwrap_or_default()
        )));
    }
    if let Some(username) = username {
        info!(user_id = user_id.0, %username, "username registered");
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/prerequisites_tests.rs"]
mod tests;
