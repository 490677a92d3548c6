//! Train the review sentiment model, report held-out metrics, save it,
//! and optionally score a sentence with the saved model.
//!
//! Usage: `sentiment [SENTENCE]`
//! Paths come from `SENTIMENT_DATA_PATH` / `SENTIMENT_MODEL_PATH`.
//! Stdout carries only the report; logs go to stderr.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use intellipix::config::{DEFAULT_SENTIMENT_DATA, DEFAULT_SENTIMENT_MODEL};
use intellipix::sentiment::{self, BinaryMetrics, SentimentError, SentimentModel, TrainerOptions};

fn path_from_env(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn write_metrics(out: &mut impl Write, metrics: &BinaryMetrics) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Accuracy: {}", percent(metrics.accuracy))?;
    writeln!(out, "AUC: {}", percent(metrics.area_under_precision_recall_curve))?;
    writeln!(out, "F1: {}", percent(metrics.f1_score))?;
    writeln!(out)
}

fn run(
    data_path: &Path,
    model_path: &Path,
    sentence: Option<&str>,
    out: &mut impl Write,
) -> Result<(), SentimentError> {
    let rows = sentiment::load_from_text_file(data_path, false)?;

    writeln!(out, "Training the model...")?;
    let report = sentiment::train(&rows, &TrainerOptions::default())?;
    write_metrics(out, &report.metrics)?;

    writeln!(out, "Saving the model...")?;
    report.model.save(model_path)?;

    if let Some(sentence) = sentence {
        let model = SentimentModel::load(model_path)?;
        let output = model.predict(sentence);
        writeln!(out)?;
        writeln!(
            out,
            "\"{sentence}\" => {} ({})",
            if output.prediction { "positive" } else { "negative" },
            percent(f64::from(output.probability))
        )?;
    }
    Ok(())
}

fn main() -> ExitCode {
    intellipix::init_tracing_with_writer(std::io::stderr);

    let data_path = path_from_env("SENTIMENT_DATA_PATH", DEFAULT_SENTIMENT_DATA);
    let model_path = path_from_env("SENTIMENT_MODEL_PATH", DEFAULT_SENTIMENT_MODEL);
    let sentence = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let sentence = Some(sentence).filter(|s| !s.trim().is_empty());

    let mut stdout = std::io::stdout().lock();
    match run(&data_path, &model_path, sentence.as_deref(), &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_reviews(path: &Path) {
        let mut tsv = String::new();
        for i in 0..30 {
            tsv.push_str(&format!("Loved the food and the friendly staff {i}\t1\n"));
            tsv.push_str(&format!("Terrible service and cold food {i}\t0\n"));
        }
        std::fs::write(path, tsv).unwrap();
    }

    #[test]
    fn percent_uses_two_decimals() {
        assert_eq!(percent(0.5), "50.00%");
        assert_eq!(percent(0.83333), "83.33%");
    }

    #[test]
    fn stdout_holds_only_the_report() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("reviews.tsv");
        let model = dir.path().join("out").join("Sentiment.model");
        write_reviews(&data);

        let mut out = Vec::new();
        run(&data, &model, Some("Loved the food"), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 9, "unexpected output: {text}");
        assert_eq!(lines[0], "Training the model...");
        assert_eq!(lines[1], "");
        assert!(lines[2].starts_with("Accuracy: ") && lines[2].ends_with('%'));
        assert!(lines[3].starts_with("AUC: ") && lines[3].ends_with('%'));
        assert!(lines[4].starts_with("F1: ") && lines[4].ends_with('%'));
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "Saving the model...");
        assert_eq!(lines[7], "");
        assert!(lines[8].starts_with("\"Loved the food\" => "));
        assert!(model.is_file());
    }

    #[test]
    fn no_sentence_stops_after_saving() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("reviews.tsv");
        let model = dir.path().join("Sentiment.model");
        write_reviews(&data);

        let mut out = Vec::new();
        run(&data, &model, None, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().last(), Some("Saving the model..."));
    }
}
