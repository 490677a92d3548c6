//! Fitted sentiment model: featurizer + tree ensemble, persisted as a
//! gzip-compressed tar archive with `schema.json` and `model.json`.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::dataset::Input;
use super::featurize::TextFeaturizer;
use super::tree::{FastTreeOptions, TreeEnsemble};
use super::SentimentError;

const MODEL_FORMAT_VERSION: u32 = 1;
const SCHEMA_ENTRY: &str = "schema.json";
const MODEL_ENTRY: &str = "model.json";

/// One prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Output {
    /// Predicted label; `true` is positive.
    pub prediction: bool,
    pub probability: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelSchema {
    format_version: u32,
    created_by: String,
    created_at: String,
    input_columns: Vec<SchemaColumn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaColumn {
    name: String,
    index: usize,
    kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentModel {
    featurizer: TextFeaturizer,
    ensemble: TreeEnsemble,
    options: FastTreeOptions,
}

impl SentimentModel {
    pub fn new(featurizer: TextFeaturizer, ensemble: TreeEnsemble, options: FastTreeOptions) -> Self {
        Self {
            featurizer,
            ensemble,
            options,
        }
    }

    pub fn predict(&self, text: &str) -> Output {
        let features = self.featurizer.transform(text);
        let probability = self.ensemble.probability(&features);
        Output {
            prediction: probability >= 0.5,
            probability: probability as f32,
        }
    }

    pub fn predict_batch(&self, rows: &[Input]) -> Vec<Output> {
        rows.iter().map(|r| self.predict(&r.sentiment_text)).collect()
    }

    pub fn tree_count(&self) -> usize {
        self.ensemble.trees().len()
    }

    /// Write the model archive, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), SentimentError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let schema = ModelSchema {
            format_version: MODEL_FORMAT_VERSION,
            created_by: format!("{} {}", crate::config::APP_NAME, crate::config::APP_VERSION),
            created_at: chrono::Utc::now().to_rfc3339(),
            input_columns: vec![
                SchemaColumn {
                    name: "SentimentText".into(),
                    index: 0,
                    kind: "text".into(),
                },
                SchemaColumn {
                    name: "Label".into(),
                    index: 1,
                    kind: "bool".into(),
                },
            ],
        };
        let schema_json = serde_json::to_vec_pretty(&schema)?;
        let model_json = serde_json::to_vec(self)?;

        let file = File::create(path)?;
        let gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut tar = tar::Builder::new(gz);
        append_bytes(&mut tar, SCHEMA_ENTRY, &schema_json)?;
        append_bytes(&mut tar, MODEL_ENTRY, &model_json)?;
        tar.into_inner()?.finish()?.flush()?;

        tracing::info!(
            path = %path.display(),
            trees = self.tree_count(),
            vocabulary = self.featurizer.dimension(),
            "Model saved"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SentimentError> {
        let gz = flate2::read::GzDecoder::new(BufReader::new(File::open(path)?));
        let mut archive = tar::Archive::new(gz);

        let mut schema: Option<ModelSchema> = None;
        let mut model: Option<SentimentModel> = None;
        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.to_string_lossy().into_owned();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            match name.as_str() {
                SCHEMA_ENTRY => schema = Some(serde_json::from_slice(&contents)?),
                MODEL_ENTRY => model = Some(serde_json::from_slice(&contents)?),
                other => tracing::debug!(entry = other, "Ignoring unknown model archive entry"),
            }
        }

        let schema = schema.ok_or(SentimentError::MissingArchiveEntry(SCHEMA_ENTRY))?;
        if schema.format_version != MODEL_FORMAT_VERSION {
            return Err(SentimentError::UnsupportedModelVersion(schema.format_version));
        }
        model.ok_or(SentimentError::MissingArchiveEntry(MODEL_ENTRY))
    }
}

fn append_bytes<W: Write>(
    tar: &mut tar::Builder<W>,
    name: &str,
    bytes: &[u8],
) -> Result<(), SentimentError> {
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(chrono::Utc::now().timestamp().max(0) as u64);
    tar.append_data(&mut header, name, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::featurize::SparseVector;

    fn tiny_model() -> SentimentModel {
        let texts = ["great food", "awful food", "great staff", "awful staff"];
        let featurizer = TextFeaturizer::fit(texts);
        let rows: Vec<SparseVector> = texts.iter().map(|t| featurizer.transform(t)).collect();
        let labels = [true, false, true, false];
        let options = FastTreeOptions {
            number_of_leaves: 2,
            minimum_example_count_per_leaf: 1,
            number_of_trees: 10,
            ..FastTreeOptions::default()
        };
        let ensemble =
            TreeEnsemble::fit(&rows, &labels, featurizer.dimension(), &options).unwrap();
        SentimentModel::new(featurizer, ensemble, options)
    }

    #[test]
    fn predict_separates_training_words() {
        let model = tiny_model();
        let good = model.predict("great");
        let bad = model.predict("awful");
        assert!(good.probability > bad.probability);
        assert_eq!(good.prediction, good.probability >= 0.5);
    }

    #[test]
    fn predict_batch_matches_single_predictions() {
        let model = tiny_model();
        let rows = vec![Input::new("great food", true), Input::new("awful", false)];
        let batch = model.predict_batch(&rows);
        assert_eq!(batch[0], model.predict("great food"));
        assert_eq!(batch[1], model.predict("awful"));
    }

    #[test]
    fn save_and_load_preserve_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("Sentiment.model");
        let model = tiny_model();
        model.save(&path).unwrap();

        let restored = SentimentModel::load(&path).unwrap();
        assert_eq!(restored.tree_count(), 10);
        assert_eq!(restored.predict("great staff"), model.predict("great staff"));
    }

    #[test]
    fn load_rejects_archive_without_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.model");
        {
            let file = File::create(&path).unwrap();
            let gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut tar = tar::Builder::new(gz);
            let schema = br#"{"format_version":1,"created_by":"t","created_at":"t","input_columns":[]}"#;
            append_bytes(&mut tar, SCHEMA_ENTRY, schema).unwrap();
            tar.into_inner().unwrap().finish().unwrap();
        }
        assert!(matches!(
            SentimentModel::load(&path),
            Err(SentimentError::MissingArchiveEntry(MODEL_ENTRY))
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SentimentModel::load(&dir.path().join("absent.model")),
            Err(SentimentError::Io(_))
        ));
    }
}
