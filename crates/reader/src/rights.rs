use shared::{
    domain::{ExplorationId, UserId, UserSummary},
    error::{ApiError, ErrorCode},
};
use storage::StoredExploration;
use tracing::info;

use crate::{explorations::get_exploration, internal, ReaderContext};

/// Public explorations are visible to everyone, private ones to their editors.
pub async fn can_view(
    ctx: &ReaderContext,
    actor: Option<&UserSummary>,
    stored: &StoredExploration,
) -> Result<bool, ApiError> {
    if stored.is_public {
        return Ok(true);
    }
    can_edit(ctx, actor, stored).await
}

/// Admins edit everything; owners and listed editors edit their explorations.
pub async fn can_edit(
    ctx: &ReaderContext,
    actor: Option<&UserSummary>,
    stored: &StoredExploration,
) -> Result<bool, ApiError> {
    let Some(actor) = actor else {
        return Ok(false);
    };
    if actor.is_admin || stored.owner_user_id == Some(actor.user_id) {
        return Ok(true);
    }
    ctx.storage
        .is_editor(&stored.exploration.id, actor.user_id)
        .await
        .map_err(internal)
}

async fn ensure_owner_or_admin(
    ctx: &ReaderContext,
    actor: &UserSummary,
    exploration_id: &ExplorationId,
) -> Result<(), ApiError> {
    let stored = get_exploration(ctx, exploration_id).await?;
    if actor.is_admin || stored.owner_user_id == Some(actor.user_id) {
        Ok(())
    } else {
        Err(ApiError::new(
            ErrorCode::Forbidden,
            "only the owner or an admin can change rights",
        ))
    }
}

pub async fn publish_exploration(
    ctx: &ReaderContext,
    actor: &UserSummary,
    exploration_id: &ExplorationId,
) -> Result<(), ApiError> {
    ensure_owner_or_admin(ctx, actor, exploration_id).await?;
    ctx.storage
        .publish_exploration(exploration_id)
        .await
        .map_err(internal)?;
    info!(%exploration_id, user_id = actor.user_id.0, "exploration published");
    Ok(())
}

pub async fn add_editor(
    ctx: &ReaderContext,
    actor: &UserSummary,
    exploration_id: &ExplorationId,
    editor: UserId,
) -> Result<(), ApiError> {
    ensure_owner_or_admin(ctx, actor, exploration_id).await?;
    ctx.storage
        .add_editor(exploration_id, editor)
        .await
        .map_err(internal)
}

#[cfg(test)]
#[path = "tests/rights_tests.rs"]
mod tests;
