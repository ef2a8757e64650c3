use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Destination name that ends a reader session.
pub const END_DEST: &str = "END";

/// Reader parameters, keyed by name. Values are arbitrary JSON.
pub type Params = BTreeMap<String, Value>;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(UserId);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExplorationId(pub String);

impl ExplorationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExplorationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exploration {
    pub id: ExplorationId,
    pub title: String,
    pub category: String,
    #[serde(default = "default_skin")]
    pub default_skin: String,
    pub init_state_name: String,
    /// Declared parameters and their default values.
    #[serde(default)]
    pub param_specs: BTreeMap<String, ParamSpec>,
    /// Applied once when a reader session starts.
    #[serde(default)]
    pub param_changes: Vec<ParamChange>,
    pub states: BTreeMap<String, State>,
}

impl Exploration {
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    pub fn init_state(&self) -> Option<&State> {
        self.states.get(&self.init_state_name)
    }

    /// Checks that every rule destination and the initial state resolve.
    pub fn validate(&self) -> Result<(), String> {
        if !self.states.contains_key(&self.init_state_name) {
            return Err(format!(
                "initial state '{}' is not defined",
                self.init_state_name
            ));
        }
        for (name, state) in &self.states {
            if name.trim().is_empty() {
                return Err("state names must not be empty".into());
            }
            if name == END_DEST {
                return Err(format!("'{END_DEST}' is reserved and cannot name a state"));
            }
            for handler in &state.widget.handlers {
                if handler.rule_specs.is_empty() {
                    return Err(format!(
                        "handler '{}' in state '{name}' has no rules",
                        handler.name
                    ));
                }
                for rule_spec in &handler.rule_specs {
                    if rule_spec.dest != END_DEST && !self.states.contains_key(&rule_spec.dest) {
                        return Err(format!(
                            "rule in state '{name}' points to unknown state '{}'",
                            rule_spec.dest
                        ));
                    }
                }
                if !matches!(
                    handler.rule_specs.last().map(|spec| &spec.definition),
                    Some(RuleKind::Default)
                ) {
                    return Err(format!(
                        "handler '{}' in state '{name}' must end with a Default rule",
                        handler.name
                    ));
                }
            }
        }
        Ok(())
    }
}

fn default_skin() -> String {
    "conversation_v1".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(default)]
    pub default_value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamChange {
    pub name: String,
    pub generator: ParamGenerator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "generator_id", content = "customization_args")]
pub enum ParamGenerator {
    /// Copies a template string, resolved against the current parameters.
    Copier { value: String },
    /// Picks one template uniformly at random.
    RandomSelector { list_of_values: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub content: Vec<Content>,
    #[serde(default)]
    pub param_changes: Vec<ParamChange>,
    pub widget: WidgetInstance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Image,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub value: String,
}

impl Content {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Text,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetInstance {
    pub widget_id: String,
    #[serde(default)]
    pub customization_args: serde_json::Map<String, Value>,
    #[serde(default)]
    pub sticky: bool,
    #[serde(default)]
    pub handlers: Vec<AnswerHandler>,
}

impl WidgetInstance {
    pub fn handler(&self, name: &str) -> Option<&AnswerHandler> {
        self.handlers.iter().find(|handler| handler.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerHandler {
    pub name: String,
    pub rule_specs: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub definition: RuleKind,
    pub dest: String,
    #[serde(default)]
    pub feedback: Vec<String>,
}

/// Answer predicates. Inputs are templates resolved against reader parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "inputs")]
pub enum RuleKind {
    Default,
    Equals { x: Value },
    CaseSensitiveEquals { x: String },
    Contains { x: String },
    StartsWith { x: String },
    FuzzyEquals { x: String },
    IsLessThan { x: Value },
    IsGreaterThan { x: Value },
    IsInclusivelyBetween { a: Value, b: Value },
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleKind::Default => f.write_str("Default"),
            RuleKind::Equals { x } => write!(f, "Equals({x})"),
            RuleKind::CaseSensitiveEquals { x } => write!(f, "CaseSensitiveEquals({x})"),
            RuleKind::Contains { x } => write!(f, "Contains({x})"),
            RuleKind::StartsWith { x } => write!(f, "StartsWith({x})"),
            RuleKind::FuzzyEquals { x } => write!(f, "FuzzyEquals({x})"),
            RuleKind::IsLessThan { x } => write!(f, "IsLessThan({x})"),
            RuleKind::IsGreaterThan { x } => write!(f, "IsGreaterThan({x})"),
            RuleKind::IsInclusivelyBetween { a, b } => {
                write!(f, "IsInclusivelyBetween({a}, {b})")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: UserId,
    pub email: String,
    pub username: Option<String>,
    pub agreed_to_terms: bool,
    pub is_admin: bool,
}

impl UserSummary {
    /// Editors must pick a username and accept the terms before editing.
    pub fn has_completed_onboarding(&self) -> bool {
        self.agreed_to_terms && self.username.is_some()
    }
}
