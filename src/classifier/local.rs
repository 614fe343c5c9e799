use async_trait::async_trait;
use candle_core::{D, DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokenizers::{PaddingStrategy, Tokenizer, TruncationParams};

use super::{
    Candidate, ClassificationResult, Classifier, ClassifierError, rank_candidates, validate_input,
};

/// Every input is truncated or padded to exactly this many tokens.
pub const MAX_SEQUENCE_LENGTH: usize = 512;

fn init_err(context: &str, e: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::InitializationFailure(format!("{}: {}", context, e))
}

/// Token ids, segment ids and attention mask for a single input, all of
/// length `MAX_SEQUENCE_LENGTH`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedInput {
    pub input_ids: Vec<u32>,
    pub token_type_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

/// Encoder
///
/// A tokenizer fixed to truncate-and-pad at `MAX_SEQUENCE_LENGTH`. Padding keeps
/// the pad token and id declared by the tokenizer file, when it declares one.
pub struct Encoder {
    tokenizer: Tokenizer,
}

impl Encoder {
    pub fn from_file(path: &Path) -> Result<Self, ClassifierError> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| init_err(&format!("failed to load tokenizer {}", path.display()), e))?;
        Self::new(tokenizer)
    }

    pub fn new(mut tokenizer: Tokenizer) -> Result<Self, ClassifierError> {
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| init_err("invalid truncation settings", e))?;

        let mut padding = tokenizer.get_padding().cloned().unwrap_or_default();
        padding.strategy = PaddingStrategy::Fixed(MAX_SEQUENCE_LENGTH);
        tokenizer.with_padding(Some(padding));

        Ok(Self { tokenizer })
    }

    pub fn encode(&self, text: &str) -> Result<EncodedInput, ClassifierError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ClassifierError::ServiceUnavailable(format!("tokenization failed: {}", e)))?;

        Ok(EncodedInput {
            input_ids: encoding.get_ids().to_vec(),
            token_type_ids: encoding.get_type_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
        })
    }
}

/// SequenceClassificationModel
///
/// Anything that turns `(1, seq_len)` id/type/mask tensors into `(1, num_labels)` logits.
pub trait SequenceClassificationModel: Send + Sync {
    fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> candle_core::Result<Tensor>;
}

/// BertSequenceClassifier
///
/// BERT encoder, tanh pooler over the `[CLS]` position, and a linear
/// classification head. Weight names follow the `BertForSequenceClassification`
/// checkpoint layout (`bert.*`, `classifier.*`).
pub struct BertSequenceClassifier {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
}

impl BertSequenceClassifier {
    /// Loads `config.json` and `model.safetensors` from `model_dir`.
    pub fn load(model_dir: &Path, num_labels: usize, device: &Device) -> Result<Self, ClassifierError> {
        let config_path = model_dir.join("config.json");
        let weights_path = model_dir.join("model.safetensors");

        let raw_config = std::fs::read_to_string(&config_path)
            .map_err(|e| init_err(&format!("failed to read {}", config_path.display()), e))?;
        let config: BertConfig = serde_json::from_str(&raw_config)
            .map_err(|e| init_err(&format!("invalid model config {}", config_path.display()), e))?;

        if !weights_path.is_file() {
            return Err(ClassifierError::InitializationFailure(format!(
                "model weights not found at {}",
                weights_path.display()
            )));
        }

        let weights = std::fs::read(&weights_path)
            .map_err(|e| init_err(&format!("failed to read {}", weights_path.display()), e))?;
        let vb = VarBuilder::from_buffered_safetensors(weights, DType::F32, device)
            .map_err(|e| init_err("failed to load model weights", e))?;

        let bert = BertModel::load(vb.pp("bert"), &config)
            .map_err(|e| init_err("failed to load BERT encoder", e))?;
        let pooler = candle_nn::linear(config.hidden_size, config.hidden_size, vb.pp("bert.pooler.dense"))
            .map_err(|e| init_err("failed to load pooler", e))?;
        let classifier = candle_nn::linear(config.hidden_size, num_labels, vb.pp("classifier"))
            .map_err(|e| init_err("classification head does not match the label encoder", e))?;

        Ok(Self {
            bert,
            pooler,
            classifier,
        })
    }
}

impl SequenceClassificationModel for BertSequenceClassifier {
    fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> candle_core::Result<Tensor> {
        let hidden = self
            .bert
            .forward(input_ids, token_type_ids, Some(attention_mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        self.classifier.forward(&pooled)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelEncoderFile {
    // ["Academics", "Events", ...]
    Classes(Vec<String>),
    // {"classes": ["Academics", ...]}
    Wrapped { classes: Vec<String> },
    // {"0": "Academics", "1": "Events", ...}
    Indexed(BTreeMap<String, String>),
}

/// load_labels
///
/// Reads the label encoder: the ordinal index of each label is the index of
/// the matching logit.
pub fn load_labels(path: &Path) -> Result<Vec<String>, ClassifierError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| init_err(&format!("failed to read label encoder {}", path.display()), e))?;
    let file: LabelEncoderFile = serde_json::from_str(&raw)
        .map_err(|e| init_err(&format!("invalid label encoder {}", path.display()), e))?;

    let labels = match file {
        LabelEncoderFile::Classes(classes) | LabelEncoderFile::Wrapped { classes } => classes,
        LabelEncoderFile::Indexed(map) => {
            let mut indexed = map
                .into_iter()
                .map(|(k, v)| {
                    k.parse::<usize>()
                        .map(|i| (i, v))
                        .map_err(|e| init_err(&format!("label index '{}'", k), e))
                })
                .collect::<Result<Vec<_>, _>>()?;
            indexed.sort_by_key(|(i, _)| *i);
            if indexed.iter().enumerate().any(|(pos, (i, _))| pos != *i) {
                return Err(ClassifierError::InitializationFailure(
                    "label encoder indices must be contiguous from 0".to_string(),
                ));
            }
            indexed.into_iter().map(|(_, v)| v).collect()
        }
    };

    if labels.is_empty() {
        return Err(ClassifierError::InitializationFailure(
            "label encoder contains no labels".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(labels.len());
    if let Some(duplicate) = labels.iter().find(|&label| !seen.insert(label)) {
        return Err(ClassifierError::InitializationFailure(format!(
            "label encoder lists '{}' more than once",
            duplicate
        )));
    }
    Ok(labels)
}

/// Softmax over the last dimension, flattened to a single probability vector.
pub fn softmax(logits: &Tensor) -> candle_core::Result<Vec<f32>> {
    let logits = logits.to_dtype(DType::F32)?;
    candle_nn::ops::softmax(&logits, D::Minus1)?
        .flatten_all()?
        .to_vec1::<f32>()
}

struct LocalModel {
    encoder: Encoder,
    model: Box<dyn SequenceClassificationModel>,
    labels: Vec<String>,
    categories: Vec<String>,
    device: Device,
}

impl LocalModel {
    fn predict(&self, text: &str) -> Result<ClassificationResult, ClassifierError> {
        let encoded = self.encoder.encode(text)?;
        let probabilities = self
            .run(&encoded)
            .map_err(|e| ClassifierError::ServiceUnavailable(format!("inference failed: {}", e)))?;

        if probabilities.len() != self.labels.len() {
            return Err(ClassifierError::UnexpectedResponseShape(format!(
                "model produced {} probabilities for {} labels",
                probabilities.len(),
                self.labels.len()
            )));
        }

        let candidates = self
            .labels
            .iter()
            .zip(probabilities)
            .map(|(label, p)| Candidate::new(label.clone(), f64::from(p)))
            .collect();

        rank_candidates(candidates, &self.categories)
    }

    fn run(&self, encoded: &EncodedInput) -> candle_core::Result<Vec<f32>> {
        let input_ids = Tensor::new(encoded.input_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let token_type_ids =
            Tensor::new(encoded.token_type_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let attention_mask =
            Tensor::new(encoded.attention_mask.as_slice(), &self.device)?.unsqueeze(0)?;

        let logits = self
            .model
            .forward(&input_ids, &token_type_ids, &attention_mask)?;
        softmax(&logits)
    }
}

/// LocalModelClassifier
///
/// In-process classification against a model, tokenizer and label encoder
/// loaded once at startup. Inference is blocking and runs on tokio's blocking
/// pool; the loaded state is shared read-only between calls.
#[derive(Clone)]
pub struct LocalModelClassifier {
    inner: Arc<LocalModel>,
}

impl LocalModelClassifier {
    /// load
    ///
    /// Loads every artifact the transport needs. Any missing or corrupt file is
    /// an `InitializationFailure`, which the composition root treats as fatal.
    pub fn load(
        model_dir: &Path,
        tokenizer_path: &Path,
        labels_path: &Path,
        categories: Vec<String>,
    ) -> Result<Self, ClassifierError> {
        let device = Device::cuda_if_available(0).map_err(|e| init_err("failed to select device", e))?;
        let labels = load_labels(labels_path)?;
        let encoder = Encoder::from_file(tokenizer_path)?;
        let model = BertSequenceClassifier::load(model_dir, labels.len(), &device)?;

        tracing::info!(
            model = %model_dir.display(),
            labels = labels.len(),
            device = ?device,
            "local classification model loaded"
        );

        Ok(Self::with_device(encoder, Box::new(model), labels, categories, device))
    }

    /// Assembles a classifier from already-loaded parts, on the CPU.
    pub fn from_parts(
        encoder: Encoder,
        model: Box<dyn SequenceClassificationModel>,
        labels: Vec<String>,
        categories: Vec<String>,
    ) -> Self {
        Self::with_device(encoder, model, labels, categories, Device::Cpu)
    }

    fn with_device(
        encoder: Encoder,
        model: Box<dyn SequenceClassificationModel>,
        labels: Vec<String>,
        categories: Vec<String>,
        device: Device,
    ) -> Self {
        Self {
            inner: Arc::new(LocalModel {
                encoder,
                model,
                labels,
                categories,
                device,
            }),
        }
    }
}

#[async_trait]
impl Classifier for LocalModelClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifierError> {
        validate_input(text)?;

        let inner = Arc::clone(&self.inner);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || inner.predict(&text))
            .await
            .map_err(|e| ClassifierError::ServiceUnavailable(format!("inference task failed: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
