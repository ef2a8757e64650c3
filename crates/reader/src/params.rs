use rand::seq::SliceRandom;
use serde_json::Value;
use shared::domain::{Exploration, ParamChange, ParamGenerator, Params, State};
use widgets::template::parse_with_params;

/// Declared defaults, then the exploration-level parameter changes.
pub fn get_init_params(exploration: &Exploration) -> Params {
    let defaults: Params = exploration
        .param_specs
        .iter()
        .map(|(name, spec)| (name.clone(), spec.default_value.clone()))
        .collect();
    apply_param_changes(&exploration.param_changes, &defaults)
}

/// Parameters a reader holds after entering `state`.
pub fn update_with_state_params(state: &State, reader_params: &Params) -> Params {
    apply_param_changes(&state.param_changes, reader_params)
}

/// Every change is evaluated against `params` as they were before any of
/// them applied.
pub fn apply_param_changes(changes: &[ParamChange], params: &Params) -> Params {
    let mut updated = params.clone();
    for change in changes {
        updated.insert(change.name.clone(), generate(&change.generator, params));
    }
    updated
}

fn generate(generator: &ParamGenerator, params: &Params) -> Value {
    match generator {
        ParamGenerator::Copier { value } => Value::String(parse_with_params(value, params)),
        ParamGenerator::RandomSelector { list_of_values } => list_of_values
            .choose(&mut rand::thread_rng())
            .map(|value| Value::String(parse_with_params(value, params)))
            .unwrap_or(Value::Null),
    }
}

#[cfg(test)]
#[path = "tests/params_tests.rs"]
mod tests;
