use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::config::ClassifierConfig;

pub mod local;
pub mod mock;
pub mod remote;

pub use local::LocalModelClassifier;
pub use mock::MockClassifier;
pub use remote::RemoteInferenceClassifier;

/// Category stored on an article whose classification failed at creation time.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// ClassifierError
///
/// The only error surface of the classification layer. Transport-specific errors
/// (reqwest, tokenizers, candle) are converted into one of these kinds before
/// they leave a `Classifier` implementation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("input text cannot be empty")]
    InvalidInput,
    #[error("classification service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("unexpected classifier response: {0}")]
    UnexpectedResponseShape(String),
    #[error("classifier failed to initialize: {0}")]
    InitializationFailure(String),
}

/// ClassificationResult
///
/// Normalized outcome of a single `classify` call. `probabilities` is only
/// present when the transport scored more than the winning label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ClassificationResult {
    /// Winning label, or `Uncategorized` for the creation fallback.
    pub category: String,
    /// Score of the winning label, in [0, 1].
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub probabilities: Option<BTreeMap<String, f64>>,
}

impl ClassificationResult {
    /// The sentinel substituted when classification is unavailable on article creation.
    pub fn uncategorized() -> Self {
        Self {
            category: UNCATEGORIZED.to_string(),
            confidence: 0.0,
            probabilities: None,
        }
    }
}

/// ClassificationRequest
///
/// Input payload for `POST /news/classify`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct ClassificationRequest {
    #[schema(example = "Exams begin next week")]
    pub text: String,
}

/// A raw `(label, score)` pair as produced by a transport, before ranking.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candidate {
    pub label: String,
    pub score: f64,
}

impl Candidate {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Classifier
///
/// The capability that maps article text to a category and a confidence score.
/// Exactly one implementation is constructed at startup (see `build_classifier`)
/// and shared through the application state, so handlers never know whether
/// inference runs in-process or behind an HTTP endpoint.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifierError>;

    /// Short transport name used in logs.
    fn name(&self) -> &'static str;
}

/// ClassifierState
///
/// The concrete type used to share the classifier across the application state.
pub type ClassifierState = Arc<dyn Classifier>;

/// build_classifier
///
/// Constructs the one transport selected by configuration. A local model that
/// cannot load is returned as `InitializationFailure`; a remote transport
/// without a credential still builds.
pub fn build_classifier(
    config: &ClassifierConfig,
    categories: &[String],
) -> Result<ClassifierState, ClassifierError> {
    let classifier: ClassifierState = match config {
        ClassifierConfig::Remote {
            api_url,
            api_token,
            timeout,
        } => Arc::new(RemoteInferenceClassifier::new(
            api_url,
            api_token.clone(),
            *timeout,
            categories.to_vec(),
        )?),
        ClassifierConfig::Local {
            model_dir,
            tokenizer_path,
            labels_path,
        } => Arc::new(LocalModelClassifier::load(
            model_dir,
            tokenizer_path,
            labels_path,
            categories.to_vec(),
        )?),
    };

    tracing::info!(transport = classifier.name(), "classifier ready");
    Ok(classifier)
}

/// Rejects empty or whitespace-only input before any transport work happens.
pub fn validate_input(text: &str) -> Result<(), ClassifierError> {
    if text.trim().is_empty() {
        return Err(ClassifierError::InvalidInput);
    }
    Ok(())
}

/// rank_candidates
///
/// Picks the highest-scoring candidate. On equal scores the earliest candidate
/// in response order wins. Labels outside `categories` are passed through
/// unchanged, with a warning.
///
/// When more than one candidate is present the full distribution is attached.
pub fn rank_candidates(
    candidates: Vec<Candidate>,
    categories: &[String],
) -> Result<ClassificationResult, ClassifierError> {
    if candidates.is_empty() {
        return Err(ClassifierError::UnexpectedResponseShape(
            "empty candidate list".to_string(),
        ));
    }

    if let Some(bad) = candidates
        .iter()
        .find(|c| !c.score.is_finite() || !(0.0..=1.0).contains(&c.score))
    {
        return Err(ClassifierError::UnexpectedResponseShape(format!(
            "score {} for label '{}' is outside [0, 1]",
            bad.score, bad.label
        )));
    }

    let mut seen = HashSet::with_capacity(candidates.len());
    if let Some(dup) = candidates.iter().find(|&c| !seen.insert(&c.label)) {
        return Err(ClassifierError::UnexpectedResponseShape(format!(
            "label '{}' scored more than once",
            dup.label
        )));
    }

    let mut best = &candidates[0];
    for candidate in &candidates[1..] {
        // Strictly greater keeps the first-seen candidate on ties.
        if candidate.score > best.score {
            best = candidate;
        }
    }

    if !categories.iter().any(|c| c == &best.label) {
        tracing::warn!(
            label = %best.label,
            "classifier returned a label outside the configured category set"
        );
    }

    let probabilities = (candidates.len() > 1).then(|| {
        candidates
            .iter()
            .map(|c| (c.label.clone(), c.score))
            .collect::<BTreeMap<_, _>>()
    });

    Ok(ClassificationResult {
        category: best.label.clone(),
        confidence: best.score,
        probabilities,
    })
}
