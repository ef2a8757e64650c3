use std::sync::Arc;

use shared::error::{ApiError, ErrorCode};
use storage::Storage;
use widgets::WidgetRegistry;

pub mod classifier;
pub mod content;
pub mod demos;
pub mod explorations;
pub mod flow;
pub mod params;
pub mod prerequisites;
pub mod rights;

pub use classifier::{Classifier, Rule, RuleSpecClassifier};
pub use flow::{
    init_exploration, pick_random_exploration, reader_page, submit_reader_feedback, transition,
    ReaderPage, ReaderSession,
};
pub use prerequisites::{get_prerequisites, submit_prerequisites};

/// Everything a reader or onboarding request needs.
#[derive(Clone)]
pub struct ReaderContext {
    pub storage: Storage,
    pub widgets: WidgetRegistry,
    pub classifier: Arc<dyn Classifier>,
}

impl ReaderContext {
    /// Uses the default widget set and the rule-spec classifier.
    pub fn new(storage: Storage) -> Self {
        let widgets = WidgetRegistry::default();
        Self {
            storage,
            classifier: Arc::new(RuleSpecClassifier::new(widgets.clone())),
            widgets,
        }
    }
}

fn internal(err: impl std::fmt::Display) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
pub(crate) async fn test_context() -> ReaderContext {
    ReaderContext::new(Storage::new("sqlite::memory:").await.expect("db"))
}
