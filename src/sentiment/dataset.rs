use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::SentimentError;

/// One labeled row: column 0 is the text, column 1 the sentiment label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub sentiment_text: String,
    /// `true` for positive sentiment.
    pub sentiment: bool,
}

impl Input {
    pub fn new(sentiment_text: impl Into<String>, sentiment: bool) -> Self {
        Self {
            sentiment_text: sentiment_text.into(),
            sentiment,
        }
    }
}

/// Disjoint train and test partitions of a dataset.
#[derive(Debug, Clone)]
pub struct TrainTestData {
    pub train_set: Vec<Input>,
    pub test_set: Vec<Input>,
}

/// Load a tab-separated file of `text \t label` rows.
///
/// Rows without a label column or with an unrecognised label are skipped.
pub fn load_from_text_file(path: &Path, has_header: bool) -> Result<Vec<Input>, SentimentError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_header)
        .quoting(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let (Some(text), Some(label)) = (record.get(0), record.get(1)) else {
            tracing::warn!(line = line + 1, "Skipping row without a label column");
            skipped += 1;
            continue;
        };
        match parse_label(label) {
            Some(sentiment) => rows.push(Input::new(text.trim(), sentiment)),
            None => {
                tracing::warn!(line = line + 1, label, "Skipping row with unrecognised label");
                skipped += 1;
            }
        }
    }

    if rows.is_empty() {
        return Err(SentimentError::EmptyDataset(path.display().to_string()));
    }

    tracing::info!(
        path = %path.display(),
        rows = rows.len(),
        skipped,
        "Dataset loaded"
    );
    Ok(rows)
}

fn parse_label(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Shuffle rows deterministically from `seed` and hold out `test_fraction` of them.
pub fn train_test_split(
    rows: &[Input],
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestData, SentimentError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(SentimentError::InvalidTestFraction(test_fraction));
    }
    if rows.is_empty() {
        return Err(SentimentError::EmptyDataset("no rows to split".into()));
    }

    let mut indices: Vec<usize> = (0..rows.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n = rows.len();
    let mut test_count = (n as f64 * test_fraction).round() as usize;
    if n >= 2 {
        test_count = test_count.clamp(1, n - 1);
    }

    let (test_idx, train_idx) = indices.split_at(test_count);
    Ok(TrainTestData {
        train_set: train_idx.iter().map(|&i| rows[i].clone()).collect(),
        test_set: test_idx.iter().map(|&i| rows[i].clone()).collect(),
    })
}
