use campus_news::{
    classifier::{
        ClassifierError, Classifier, LocalModelClassifier, build_classifier,
        local::{Encoder, MAX_SEQUENCE_LENGTH, SequenceClassificationModel},
    },
    config::ClassifierConfig,
};
use candle_core::Tensor;
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tempfile::TempDir;

// --- Test Fixtures ---

/// A minimal word-level tokenizer: lowercase, split on whitespace, `[PAD]` = 0.
const TOKENIZER_JSON: &str = r#"{
  "version": "1.0",
  "truncation": null,
  "padding": null,
  "added_tokens": [],
  "normalizer": { "type": "Lowercase" },
  "pre_tokenizer": { "type": "Whitespace" },
  "post_processor": null,
  "decoder": null,
  "model": {
    "type": "WordLevel",
    "vocab": {
      "[PAD]": 0,
      "[UNK]": 1,
      "exams": 2,
      "begin": 3,
      "next": 4,
      "week": 5,
      "word": 6
    },
    "unk_token": "[UNK]"
  }
}"#;

fn write_tokenizer(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("tokenizer.json");
    std::fs::write(&path, TOKENIZER_JSON).unwrap();
    path
}

fn labels() -> Vec<String> {
    ["Academics", "Sports", "Events"]
        .iter()
        .map(|l| l.to_string())
        .collect()
}

/// Returns fixed logits and records the shape of every `input_ids` it sees.
struct FakeModel {
    logits: Vec<f32>,
    seen_shapes: Arc<Mutex<Vec<Vec<usize>>>>,
}

impl SequenceClassificationModel for FakeModel {
    fn forward(
        &self,
        input_ids: &Tensor,
        _token_type_ids: &Tensor,
        _attention_mask: &Tensor,
    ) -> candle_core::Result<Tensor> {
        self.seen_shapes
            .lock()
            .unwrap()
            .push(input_ids.dims().to_vec());
        Tensor::new(self.logits.as_slice(), input_ids.device())?.unsqueeze(0)
    }
}

fn fake_classifier(
    dir: &TempDir,
    logits: Vec<f32>,
) -> (LocalModelClassifier, Arc<Mutex<Vec<Vec<usize>>>>) {
    let seen_shapes = Arc::new(Mutex::new(Vec::new()));
    let model = FakeModel {
        logits,
        seen_shapes: seen_shapes.clone(),
    };
    let encoder = Encoder::from_file(&write_tokenizer(dir)).unwrap();
    let classifier = LocalModelClassifier::from_parts(encoder, Box::new(model), labels(), labels());
    (classifier, seen_shapes)
}

// --- Encoding ---

#[test]
fn test_encoder_pads_short_input_to_fixed_length() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Encoder::from_file(&write_tokenizer(&dir)).unwrap();

    let encoded = encoder.encode("Exams begin next week").unwrap();

    assert_eq!(encoded.input_ids.len(), MAX_SEQUENCE_LENGTH);
    assert_eq!(encoded.token_type_ids.len(), MAX_SEQUENCE_LENGTH);
    assert_eq!(encoded.attention_mask.len(), MAX_SEQUENCE_LENGTH);
    assert_eq!(&encoded.input_ids[..4], &[2, 3, 4, 5]);
    assert!(encoded.input_ids[4..].iter().all(|id| *id == 0));
    assert_eq!(encoded.attention_mask.iter().sum::<u32>(), 4);
}

#[test]
fn test_encoder_truncates_long_input() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Encoder::from_file(&write_tokenizer(&dir)).unwrap();
    let text = vec!["word"; 600].join(" ");

    let encoded = encoder.encode(&text).unwrap();

    assert_eq!(encoded.input_ids.len(), MAX_SEQUENCE_LENGTH);
    assert!(encoded.input_ids.iter().all(|id| *id == 6));
    assert_eq!(
        encoded.attention_mask.iter().sum::<u32>() as usize,
        MAX_SEQUENCE_LENGTH
    );
}

#[test]
fn test_encoder_maps_unknown_words() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = Encoder::from_file(&write_tokenizer(&dir)).unwrap();

    let encoded = encoder.encode("convocation week").unwrap();

    assert_eq!(&encoded.input_ids[..2], &[1, 5]);
}

// --- Inference ---

#[tokio::test]
async fn test_local_classify_softmaxes_logits_and_picks_argmax() {
    let dir = tempfile::tempdir().unwrap();
    let (classifier, seen_shapes) = fake_classifier(&dir, vec![0.5, 3.0, -1.0]);

    let result = classifier.classify("Exams begin next week").await.unwrap();

    assert_eq!(result.category, "Sports");
    let probabilities = result.probabilities.unwrap();
    assert_eq!(probabilities.len(), 3);
    let total: f64 = probabilities.values().sum();
    assert!((total - 1.0).abs() < 1e-4);
    assert_eq!(result.confidence, probabilities["Sports"]);
    assert!(probabilities["Sports"] > probabilities["Academics"]);

    assert_eq!(
        *seen_shapes.lock().unwrap(),
        vec![vec![1, MAX_SEQUENCE_LENGTH]]
    );
}

#[tokio::test]
async fn test_local_classify_equal_logits_pick_first_label() {
    let dir = tempfile::tempdir().unwrap();
    let (classifier, _) = fake_classifier(&dir, vec![1.0, 1.0, 1.0]);

    let result = classifier.classify("next week").await.unwrap();

    assert_eq!(result.category, "Academics");
}

#[tokio::test]
async fn test_local_classify_rejects_blank_input_before_inference() {
    let dir = tempfile::tempdir().unwrap();
    let (classifier, seen_shapes) = fake_classifier(&dir, vec![0.5, 3.0, -1.0]);

    assert_eq!(classifier.classify("   ").await, Err(ClassifierError::InvalidInput));
    assert!(seen_shapes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_local_classify_label_count_mismatch_is_shape_error() {
    let dir = tempfile::tempdir().unwrap();
    let (classifier, _) = fake_classifier(&dir, vec![0.5, 3.0]);

    let result = classifier.classify("Exams begin next week").await;

    assert!(matches!(result, Err(ClassifierError::UnexpectedResponseShape(_))));
}

#[tokio::test]
async fn test_local_classify_handles_concurrent_calls() {
    let dir = tempfile::tempdir().unwrap();
    let (classifier, seen_shapes) = fake_classifier(&dir, vec![2.0, 0.1, 0.1]);

    let calls = (0..8).map(|_| {
        let classifier = classifier.clone();
        tokio::spawn(async move { classifier.classify("Exams begin next week").await })
    });

    for call in calls.collect::<Vec<_>>() {
        assert_eq!(call.await.unwrap().unwrap().category, "Academics");
    }
    assert_eq!(seen_shapes.lock().unwrap().len(), 8);
}

// --- Startup ---

#[test]
fn test_local_load_with_missing_artifacts_is_initialization_failure() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing");

    let result = LocalModelClassifier::load(&missing, &missing, &missing, labels());

    assert!(matches!(result, Err(ClassifierError::InitializationFailure(_))));
}

#[test]
fn test_local_load_without_weights_is_initialization_failure() {
    let dir = tempfile::tempdir().unwrap();
    let tokenizer_path = write_tokenizer(&dir);
    let labels_path = dir.path().join("label_encoder.json");
    std::fs::write(&labels_path, r#"["Academics", "Sports", "Events"]"#).unwrap();

    let result = LocalModelClassifier::load(dir.path(), &tokenizer_path, &labels_path, labels());

    assert!(matches!(result, Err(ClassifierError::InitializationFailure(_))));
}

#[test]
fn test_local_load_with_corrupt_weights_is_initialization_failure() {
    let dir = tempfile::tempdir().unwrap();
    let tokenizer_path = write_tokenizer(&dir);
    let labels_path = dir.path().join("label_encoder.json");
    std::fs::write(&labels_path, r#"["Academics", "Sports", "Events"]"#).unwrap();
    std::fs::write(
        dir.path().join("config.json"),
        r#"{
          "vocab_size": 7,
          "hidden_size": 8,
          "num_hidden_layers": 1,
          "num_attention_heads": 2,
          "intermediate_size": 16,
          "hidden_act": "gelu",
          "hidden_dropout_prob": 0.1,
          "max_position_embeddings": 512,
          "type_vocab_size": 2,
          "initializer_range": 0.02,
          "layer_norm_eps": 1e-12,
          "pad_token_id": 0
        }"#,
    )
    .unwrap();
    std::fs::write(dir.path().join("model.safetensors"), b"not a safetensors file").unwrap();

    let result = LocalModelClassifier::load(dir.path(), &tokenizer_path, &labels_path, labels());

    assert!(matches!(
        result,
        Err(ClassifierError::InitializationFailure(msg)) if msg.contains("weights")
    ));
}

#[test]
fn test_local_load_with_duplicate_labels_is_initialization_failure() {
    let dir = tempfile::tempdir().unwrap();
    let tokenizer_path = write_tokenizer(&dir);
    let labels_path = dir.path().join("label_encoder.json");
    std::fs::write(&labels_path, r#"["Academics", "Sports", "Academics"]"#).unwrap();

    let result = LocalModelClassifier::load(dir.path(), &tokenizer_path, &labels_path, labels());

    assert!(matches!(result, Err(ClassifierError::InitializationFailure(_))));
}

#[test]
fn test_build_classifier_selects_transport() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing");

    let local = build_classifier(
        &ClassifierConfig::Local {
            model_dir: missing.clone(),
            tokenizer_path: missing.clone(),
            labels_path: missing,
        },
        &labels(),
    );
    assert!(matches!(local, Err(ClassifierError::InitializationFailure(_))));

    // A remote transport without a token still builds; calls fail later.
    let remote = build_classifier(
        &ClassifierConfig::Remote {
            api_url: "http://127.0.0.1:9/models/x".to_string(),
            api_token: None,
            timeout: Duration::from_secs(1),
        },
        &labels(),
    )
    .ok()
    .unwrap();
    assert_eq!(remote.name(), "remote");
}
