use std::time::Instant;

use super::dataset::{train_test_split, Input};
use super::featurize::{SparseVector, TextFeaturizer};
use super::metrics::{evaluate, BinaryMetrics};
use super::model::SentimentModel;
use super::tree::{FastTreeOptions, TreeEnsemble};
use super::SentimentError;

#[derive(Debug, Clone)]
pub struct TrainerOptions {
    pub test_fraction: f64,
    pub seed: u64,
    pub fast_tree: FastTreeOptions,
}

impl Default for TrainerOptions {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 0,
            fast_tree: FastTreeOptions::default(),
        }
    }
}

/// Fitted model plus its held-out evaluation.
#[derive(Debug)]
pub struct TrainingReport {
    pub model: SentimentModel,
    pub metrics: BinaryMetrics,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Split, featurize, fit and evaluate.
pub fn train(rows: &[Input], options: &TrainerOptions) -> Result<TrainingReport, SentimentError> {
    let split = train_test_split(rows, options.test_fraction, options.seed)?;
    let start = Instant::now();

    let featurizer =
        TextFeaturizer::fit(split.train_set.iter().map(|r| r.sentiment_text.as_str()));
    let features: Vec<SparseVector> = split
        .train_set
        .iter()
        .map(|r| featurizer.transform(&r.sentiment_text))
        .collect();
    let labels: Vec<bool> = split.train_set.iter().map(|r| r.sentiment).collect();

    tracing::info!(
        train_rows = split.train_set.len(),
        test_rows = split.test_set.len(),
        vocabulary = featurizer.dimension(),
        "Fitting tree ensemble"
    );

    let ensemble = TreeEnsemble::fit(
        &features,
        &labels,
        featurizer.dimension(),
        &options.fast_tree,
    )?;
    let model = SentimentModel::new(featurizer, ensemble, options.fast_tree.clone());

    let scored: Vec<(bool, f64)> = split
        .test_set
        .iter()
        .zip(model.predict_batch(&split.test_set))
        .map(|(row, out)| (row.sentiment, f64::from(out.probability)))
        .collect();
    let metrics = evaluate(&scored)?;

    tracing::info!(
        elapsed_ms = %start.elapsed().as_millis(),
        accuracy = metrics.accuracy,
        auc = metrics.area_under_roc_curve,
        "Training complete"
    );

    Ok(TrainingReport {
        model,
        metrics,
        train_rows: split.train_set.len(),
        test_rows: split.test_set.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reviews() -> Vec<Input> {
        let positive = [
            "great food and friendly staff",
            "loved the pizza",
            "amazing service, great value",
            "the best burger in town",
            "friendly and fast",
            "delicious and fresh",
        ];
        let negative = [
            "terrible service",
            "the food was cold and bland",
            "never coming back, awful",
            "rude staff and slow",
            "worst meal ever",
            "bland and overpriced",
        ];
        let mut rows = Vec::new();
        for round in 0..5 {
            for text in positive {
                rows.push(Input::new(format!("{text} {round}"), true));
            }
            for text in negative {
                rows.push(Input::new(format!("{text} {round}"), false));
            }
        }
        rows
    }

    fn quick_options() -> TrainerOptions {
        TrainerOptions {
            fast_tree: FastTreeOptions {
                number_of_leaves: 8,
                minimum_example_count_per_leaf: 2,
                number_of_trees: 30,
                ..FastTreeOptions::default()
            },
            ..TrainerOptions::default()
        }
    }

    #[test]
    fn trains_and_evaluates_on_held_out_rows() {
        let report = train(&reviews(), &quick_options()).unwrap();
        assert_eq!(report.train_rows + report.test_rows, 60);
        assert_eq!(report.test_rows, 12);
        assert!(report.metrics.accuracy > 0.5);
    }

    #[test]
    fn fixed_seed_gives_identical_metrics() {
        let a = train(&reviews(), &quick_options()).unwrap();
        let b = train(&reviews(), &quick_options()).unwrap();
        assert_eq!(a.metrics.accuracy, b.metrics.accuracy);
        assert_eq!(a.metrics.f1_score, b.metrics.f1_score);
        assert_eq!(
            a.model.predict("great staff"),
            b.model.predict("great staff")
        );
    }

    #[test]
    fn single_class_dataset_is_rejected() {
        let rows: Vec<Input> = (0..10).map(|i| Input::new(format!("ok {i}"), true)).collect();
        assert!(matches!(
            train(&rows, &quick_options()),
            Err(SentimentError::SingleClass)
        ));
    }
}
