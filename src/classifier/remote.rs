use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Deserialize;
use std::time::Duration;

use super::{
    Candidate, ClassificationResult, Classifier, ClassifierError, rank_candidates, validate_input,
};

/// Payload shapes accepted from the inference endpoint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    // [[{"label": "...", "score": 0.95}, ...]]
    Ranked(Vec<Vec<Candidate>>),
    // [{"label": "...", "score": 0.95}, ...]
    Flat(Vec<Candidate>),
    // {"label": "...", "score": 0.95}
    Single(Candidate),
}

impl InferenceResponse {
    fn into_candidates(self) -> Vec<Candidate> {
        match self {
            InferenceResponse::Ranked(lists) => lists.into_iter().next().unwrap_or_default(),
            InferenceResponse::Flat(list) => list,
            InferenceResponse::Single(candidate) => vec![candidate],
        }
    }
}

/// RemoteInferenceClassifier
///
/// Classifies text through a hosted text-classification endpoint
/// (Hugging Face Inference API compatible). One POST per call, no retries.
#[derive(Clone)]
pub struct RemoteInferenceClassifier {
    client: Client,
    api_url: String,
    api_token: Option<String>,
    categories: Vec<String>,
}

impl RemoteInferenceClassifier {
    pub fn new(
        api_url: &str,
        api_token: Option<String>,
        timeout: Duration,
        categories: Vec<String>,
    ) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::InitializationFailure(e.to_string()))?;

        match &api_token {
            Some(_) => tracing::info!(url = %api_url, "classifier configured to use remote inference API"),
            None => tracing::warn!("HF_API_TOKEN is not set. Classification requests will fail."),
        }

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_token,
            categories,
        })
    }
}

#[async_trait]
impl Classifier for RemoteInferenceClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifierError> {
        validate_input(text)?;

        let token = self.api_token.as_deref().ok_or_else(|| {
            ClassifierError::ServiceUnavailable("inference API token is not configured".to_string())
        })?;

        tracing::debug!("sending request to inference API");
        let response = self
            .client
            .post(&self.api_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .json(&serde_json::json!({ "inputs": text }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("inference API request failed: {}", e);
                ClassifierError::ServiceUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(%status, "inference API returned an error status");
            return Err(ClassifierError::ServiceUnavailable(format!(
                "inference API returned {}",
                status
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            tracing::error!("inference API returned a non-JSON body: {}", e);
            ClassifierError::ServiceUnavailable(e.to_string())
        })?;

        let parsed: InferenceResponse = serde_json::from_value(body.clone()).map_err(|_| {
            ClassifierError::UnexpectedResponseShape(format!(
                "unexpected response format from inference API: {}",
                body
            ))
        })?;

        rank_candidates(parsed.into_candidates(), &self.categories)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
