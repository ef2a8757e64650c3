use rand::seq::SliceRandom;
use serde_json::Value;
use shared::domain::{Params, RuleKind, State, END_DEST};
use thiserror::Error;
use widgets::{template::parse_with_params, WidgetError, WidgetRegistry};

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("state has no '{0}' answer handler")]
    UnknownHandler(String),
    #[error("no rule matched the answer for handler '{0}'")]
    NoMatchingRule(String),
    #[error(transparent)]
    Widget(#[from] WidgetError),
}

/// Outcome of classifying one answer. Feedback keeps its placeholders; they
/// are resolved, HTML-escaped, when the feedback is exported.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub description: String,
    pub dest: String,
    pub feedback: Vec<String>,
}

impl Rule {
    pub fn is_terminal(&self) -> bool {
        self.dest == END_DEST
    }

    /// One feedback candidate, chosen uniformly at random.
    pub fn feedback_string(&self) -> Option<&str> {
        self.feedback
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description)
    }
}

/// Maps a reader's answer in a state to the rule that decides what happens next.
pub trait Classifier: Send + Sync {
    fn classify(
        &self,
        state: &State,
        handler: &str,
        answer: &Value,
        params: &Params,
    ) -> Result<Rule, ClassifyError>;
}

/// Walks the handler's rule specs in order and returns the first match.
#[derive(Clone, Default)]
pub struct RuleSpecClassifier {
    widgets: WidgetRegistry,
}

impl RuleSpecClassifier {
    pub fn new(widgets: WidgetRegistry) -> Self {
        Self { widgets }
    }
}

impl Classifier for RuleSpecClassifier {
    fn classify(
        &self,
        state: &State,
        handler: &str,
        answer: &Value,
        params: &Params,
    ) -> Result<Rule, ClassifyError> {
        let answer_handler = state
            .widget
            .handler(handler)
            .ok_or_else(|| ClassifyError::UnknownHandler(handler.to_string()))?;
        let widget = self.widgets.get_widget_by_id(&state.widget.widget_id)?;
        let normalized = widget.normalize_answer(&state.widget.customization_args, answer)?;

        answer_handler
            .rule_specs
            .iter()
            .find(|spec| matches_rule(&spec.definition, &normalized, params))
            .map(|spec| Rule {
                description: spec.definition.to_string(),
                dest: spec.dest.clone(),
                feedback: spec.feedback.clone(),
            })
            .ok_or_else(|| ClassifyError::NoMatchingRule(handler.to_string()))
    }
}

fn matches_rule(rule: &RuleKind, answer: &Value, params: &Params) -> bool {
    match rule {
        RuleKind::Default => true,
        RuleKind::Equals { x } => {
            let x = resolve(x, params);
            match (as_number(answer), as_number(&x)) {
                (Some(a), Some(b)) if answer.is_number() => a == b,
                _ => match (answer.as_str(), x.as_str()) {
                    (Some(a), Some(b)) => normalize_text(a) == normalize_text(b),
                    _ => *answer == x,
                },
            }
        }
        RuleKind::CaseSensitiveEquals { x } => {
            answer.as_str() == Some(parse_with_params(x, params).as_str())
        }
        RuleKind::Contains { x } => answer.as_str().is_some_and(|a| {
            normalize_text(a).contains(&normalize_text(&parse_with_params(x, params)))
        }),
        RuleKind::StartsWith { x } => answer.as_str().is_some_and(|a| {
            normalize_text(a).starts_with(&normalize_text(&parse_with_params(x, params)))
        }),
        RuleKind::FuzzyEquals { x } => answer.as_str().is_some_and(|a| {
            edit_distance(&normalize_text(a), &normalize_text(&parse_with_params(x, params))) <= 1
        }),
        RuleKind::IsLessThan { x } => {
            compare_numbers(answer, &resolve(x, params), |a, b| a < b)
        }
        RuleKind::IsGreaterThan { x } => {
            compare_numbers(answer, &resolve(x, params), |a, b| a > b)
        }
        RuleKind::IsInclusivelyBetween { a, b } => {
            let (Some(value), Some(low), Some(high)) = (
                as_number(answer),
                as_number(&resolve(a, params)),
                as_number(&resolve(b, params)),
            ) else {
                return false;
            };
            low <= value && value <= high
        }
    }
}

/// String inputs may reference parameters.
fn resolve(input: &Value, params: &Params) -> Value {
    match input {
        Value::String(template) => Value::String(parse_with_params(template, params)),
        other => other.clone(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare_numbers(answer: &Value, x: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (as_number(answer), as_number(x)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

/// Lowercases and collapses runs of whitespace.
fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = Vec::with_capacity(b.len() + 1);
        current.push(i + 1);
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current.push(substitution.min(previous[j + 1] + 1).min(current[j] + 1));
        }
        previous = current;
    }
    previous[b.len()]
}

#[cfg(test)]
#[path = "tests/classifier_tests.rs"]
mod tests;
