use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ClassificationResult, Classifier, ClassifierError, validate_input};

/// MockClassifier
///
/// A `Classifier` for unit and integration tests. It returns a canned result
/// or a canned error and counts how many calls reached it past input
/// validation, so tests can assert that no inference happened.
#[derive(Clone)]
pub struct MockClassifier {
    outcome: Result<ClassificationResult, ClassifierError>,
    calls: Arc<AtomicUsize>,
}

impl MockClassifier {
    pub fn returning(category: &str, confidence: f64) -> Self {
        Self {
            outcome: Ok(ClassificationResult {
                category: category.to_string(),
                confidence,
                probabilities: None,
            }),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Simulates an unreachable inference backend.
    pub fn unavailable() -> Self {
        Self::failing(ClassifierError::ServiceUnavailable(
            "Mock Classifier Error: Simulation requested".to_string(),
        ))
    }

    pub fn failing(error: ClassifierError) -> Self {
        Self {
            outcome: Err(error),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifierError> {
        validate_input(text)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
