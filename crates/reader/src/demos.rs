//! Bundled demo explorations, stored public and ownerless.

use shared::{
    domain::{Exploration, ExplorationId},
    error::ApiError,
};
use tracing::info;

use crate::{explorations::validate_exploration, internal, ReaderContext};

const DEMOS: &[(&str, &str)] = &[
    ("0", include_str!("../demos/welcome.yaml")),
    ("1", include_str!("../demos/three_balls.yaml")),
    ("6", include_str!("../demos/parameterized_adventure.yaml")),
];

pub fn demo_ids() -> impl Iterator<Item = &'static str> {
    DEMOS.iter().map(|(id, _)| *id)
}

pub fn is_demo(exploration_id: &ExplorationId) -> bool {
    demo_ids().any(|id| id == exploration_id.as_str())
}

/// Parses a bundled demo. The YAML's own id must match the one it is filed under.
pub fn parse_demo(exploration_id: &ExplorationId) -> Result<Exploration, ApiError> {
    let (_, source) = DEMOS
        .iter()
        .find(|(id, _)| *id == exploration_id.as_str())
        .ok_or_else(|| ApiError::not_found(format!("no demo exploration '{exploration_id}'")))?;
    let exploration: Exploration = serde_yaml::from_str(source)
        .map_err(|err| internal(format!("demo '{exploration_id}' is malformed: {err}")))?;
    if exploration.id != *exploration_id {
        return Err(internal(format!(
            "demo '{exploration_id}' declares id '{}'",
            exploration.id
        )));
    }
    Ok(exploration)
}

pub async fn load_demo(ctx: &ReaderContext, exploration_id: &ExplorationId) -> Result<(), ApiError> {
    let exploration = parse_demo(exploration_id)?;
    validate_exploration(ctx, &exploration)?;
    let version = ctx
        .storage
        .save_exploration(&exploration, None, true)
        .await
        .map_err(internal)?;
    info!(%exploration_id, version, "demo exploration loaded");
    Ok(())
}

pub async fn delete_demo(
    ctx: &ReaderContext,
    exploration_id: &ExplorationId,
) -> Result<(), ApiError> {
    if !is_demo(exploration_id) {
        return Err(ApiError::not_found(format!(
            "no demo exploration '{exploration_id}'"
        )));
    }
    if ctx
        .storage
        .delete_exploration(exploration_id)
        .await
        .map_err(internal)?
    {
        info!(%exploration_id, "demo exploration deleted");
    }
    Ok(())
}

/// Loads every demo that is not stored yet. Returns how many were loaded.
pub async fn load_missing_demos(ctx: &ReaderContext) -> Result<usize, ApiError> {
    let mut loaded = 0;
    for id in demo_ids() {
        let exploration_id = ExplorationId::new(id);
        let exists = ctx
            .storage
            .get_exploration(&exploration_id)
            .await
            .map_err(internal)?
            .is_some();
        if !exists {
            load_demo(ctx, &exploration_id).await?;
            loaded += 1;
        }
    }
    Ok(loaded)
}

#[cfg(test)]
#[path = "tests/demos_tests.rs"]
mod tests;
