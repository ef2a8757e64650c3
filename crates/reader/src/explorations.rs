use serde_json::json;
use shared::{
    domain::{
        AnswerHandler, Content, Exploration, ExplorationId, RuleKind, RuleSpec, State, UserId,
        WidgetInstance, END_DEST,
    },
    error::ApiError,
};
use std::collections::BTreeMap;
use storage::StoredExploration;
use tracing::info;

use crate::{internal, ReaderContext};

pub const DEFAULT_STATE_NAME: &str = "(untitled state)";

pub async fn get_exploration(
    ctx: &ReaderContext,
    exploration_id: &ExplorationId,
) -> Result<StoredExploration, ApiError> {
    ctx.storage
        .get_exploration(exploration_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("exploration '{exploration_id}' not found")))
}

/// Structural checks plus widget ids known to the registry.
pub fn validate_exploration(ctx: &ReaderContext, exploration: &Exploration) -> Result<(), ApiError> {
    exploration.validate().map_err(ApiError::validation)?;
    for (name, state) in &exploration.states {
        if !ctx.widgets.contains(&state.widget.widget_id) {
            return Err(ApiError::validation(format!(
                "state '{name}' uses unknown widget '{}'",
                state.widget.widget_id
            )));
        }
    }
    Ok(())
}

/// Creates a private, single-state exploration owned by `owner`.
pub async fn create_new(
    ctx: &ReaderContext,
    owner: UserId,
    title: &str,
    category: &str,
    exploration_id: Option<ExplorationId>,
    default_dest_is_end_state: bool,
) -> Result<ExplorationId, ApiError> {
    let exploration_id =
        exploration_id.unwrap_or_else(|| ExplorationId(uuid::Uuid::new_v4().simple().to_string()));
    if ctx
        .storage
        .get_exploration(&exploration_id)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(ApiError::validation(format!(
            "exploration '{exploration_id}' already exists"
        )));
    }

    let default_dest = if default_dest_is_end_state {
        END_DEST
    } else {
        DEFAULT_STATE_NAME
    };
    let mut customization_args = serde_json::Map::new();
    customization_args.insert("placeholder".into(), json!("Type your answer here."));
    let init_state = State {
        content: vec![Content::text("")],
        param_changes: Vec::new(),
        widget: WidgetInstance {
            widget_id: "TextInput".into(),
            customization_args,
            sticky: false,
            handlers: vec![AnswerHandler {
                name: "submit".into(),
                rule_specs: vec![RuleSpec {
                    definition: RuleKind::Default,
                    dest: default_dest.into(),
                    feedback: Vec::new(),
                }],
            }],
        },
    };

    let exploration = Exploration {
        id: exploration_id.clone(),
        title: title.to_string(),
        category: category.to_string(),
        default_skin: "conversation_v1".into(),
        init_state_name: DEFAULT_STATE_NAME.into(),
        param_specs: BTreeMap::new(),
        param_changes: Vec::new(),
        states: BTreeMap::from([(DEFAULT_STATE_NAME.to_string(), init_state)]),
    };
    validate_exploration(ctx, &exploration)?;
    ctx.storage
        .save_exploration(&exploration, Some(owner), false)
        .await
        .map_err(internal)?;
    info!(%exploration_id, owner = owner.0, "exploration created");
    Ok(exploration_id)
}

#[cfg(test)]
#[path = "tests/explorations_tests.rs"]
mod tests;
