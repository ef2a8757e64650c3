use std::{collections::HashMap, sync::Arc};

use serde_json::{Map, Value};
use shared::domain::Params;
use thiserror::Error;

mod interactive;
pub mod template;

pub use interactive::{Continue, MultipleChoiceInput, NumericInput, TextInput};

pub type CustomizationArgs = Map<String, Value>;

#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("no interactive widget registered under id '{0}'")]
    UnknownWidget(String),
    #[error("{widget} cannot accept answer {answer}: {reason}")]
    InvalidAnswer {
        widget: &'static str,
        answer: Value,
        reason: String,
    },
    #[error("{widget} has an invalid customization argument '{arg}': {reason}")]
    InvalidCustomization {
        widget: &'static str,
        arg: &'static str,
        reason: String,
    },
}

/// What the reader sees echoed back after answering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderResponse {
    pub html: String,
    pub iframe: String,
}

/// One kind of interaction a state can present to a reader.
pub trait InteractiveWidget: Send + Sync {
    fn id(&self) -> &'static str;

    /// Markup the client mounts to collect the next answer.
    fn raw_code(&self, args: &CustomizationArgs, params: &Params) -> Result<String, WidgetError>;

    /// Coerces a raw client answer into the canonical form rules compare against.
    fn normalize_answer(&self, args: &CustomizationArgs, answer: &Value)
        -> Result<Value, WidgetError>;

    fn reader_response_html(
        &self,
        args: &CustomizationArgs,
        params: &Params,
        answer: &Value,
    ) -> Result<ReaderResponse, WidgetError>;

    /// Form of the answer kept in the stats log.
    fn stats_log_html(
        &self,
        args: &CustomizationArgs,
        params: &Params,
        answer: &Value,
    ) -> Result<String, WidgetError> {
        Ok(self.reader_response_html(args, params, answer)?.html)
    }
}

#[derive(Clone)]
pub struct WidgetRegistry {
    widgets: HashMap<&'static str, Arc<dyn InteractiveWidget>>,
}

impl WidgetRegistry {
    pub fn empty() -> Self {
        Self {
            widgets: HashMap::new(),
        }
    }

    pub fn register(&mut self, widget: Arc<dyn InteractiveWidget>) {
        self.widgets.insert(widget.id(), widget);
    }

    pub fn get_widget_by_id(&self, widget_id: &str) -> Result<Arc<dyn InteractiveWidget>, WidgetError> {
        self.widgets
            .get(widget_id)
            .cloned()
            .ok_or_else(|| WidgetError::UnknownWidget(widget_id.to_string()))
    }

    pub fn contains(&self, widget_id: &str) -> bool {
        self.widgets.contains_key(widget_id)
    }

    pub fn widget_ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.widgets.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for WidgetRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(Continue));
        registry.register(Arc::new(TextInput));
        registry.register(Arc::new(NumericInput));
        registry.register(Arc::new(MultipleChoiceInput));
        registry
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
