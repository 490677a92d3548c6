//! Binary sentiment classification.
//!
//! Load → split → featurize → fit → evaluate → save, the same linear flow
//! as a high-level ML toolkit, with the featurizer and the boosted trees
//! implemented here.

pub mod dataset;
pub mod featurize;
pub mod metrics;
pub mod model;
pub mod trainer;
pub mod tree;

pub use dataset::{load_from_text_file, train_test_split, Input, TrainTestData};
pub use featurize::{SparseVector, TextFeaturizer};
pub use metrics::{evaluate, BinaryMetrics};
pub use model::{Output, SentimentModel};
pub use trainer::{train, TrainerOptions, TrainingReport};
pub use tree::{FastTreeOptions, TreeEnsemble};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dataset read error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Model serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),

    #[error("Test fraction must be in (0, 1), got {0}")]
    InvalidTestFraction(f64),

    #[error("Training requires both positive and negative examples")]
    SingleClass,

    #[error("Model archive is missing entry '{0}'")]
    MissingArchiveEntry(&'static str),

    #[error("Model archive was written by an incompatible format version {0}")]
    UnsupportedModelVersion(u32),
}
