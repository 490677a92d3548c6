use serde::Serialize;

use super::SentimentError;

/// Binary classification quality over an evaluation set.
#[derive(Debug, Clone, Serialize)]
pub struct BinaryMetrics {
    pub accuracy: f64,
    /// Area under the ROC curve.
    pub area_under_roc_curve: f64,
    pub area_under_precision_recall_curve: f64,
    pub f1_score: f64,
    pub positive_precision: f64,
    pub positive_recall: f64,
    pub negative_precision: f64,
    pub negative_recall: f64,
    pub log_loss: f64,
    pub confusion: ConfusionCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionCounts {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

/// Evaluate `(label, probability)` pairs; predictions use a 0.5 threshold.
pub fn evaluate(scored: &[(bool, f64)]) -> Result<BinaryMetrics, SentimentError> {
    if scored.is_empty() {
        return Err(SentimentError::EmptyDataset("evaluation set".into()));
    }

    let mut confusion = ConfusionCounts::default();
    let mut log_loss = 0.0;
    for &(label, probability) in scored {
        match (label, probability >= 0.5) {
            (true, true) => confusion.true_positive += 1,
            (false, true) => confusion.false_positive += 1,
            (false, false) => confusion.true_negative += 1,
            (true, false) => confusion.false_negative += 1,
        }
        let p = probability.clamp(1e-15, 1.0 - 1e-15);
        log_loss -= if label { p.ln() } else { (1.0 - p).ln() };
    }

    let c = confusion;
    let positive_precision = ratio(c.true_positive, c.true_positive + c.false_positive);
    let positive_recall = ratio(c.true_positive, c.true_positive + c.false_negative);
    let f1_score = if positive_precision + positive_recall > 0.0 {
        2.0 * positive_precision * positive_recall / (positive_precision + positive_recall)
    } else {
        0.0
    };

    Ok(BinaryMetrics {
        accuracy: ratio(c.true_positive + c.true_negative, scored.len()),
        area_under_roc_curve: roc_auc(scored),
        area_under_precision_recall_curve: pr_auc(scored),
        f1_score,
        positive_precision,
        positive_recall,
        negative_precision: ratio(c.true_negative, c.true_negative + c.false_negative),
        negative_recall: ratio(c.true_negative, c.true_negative + c.false_positive),
        log_loss: log_loss / scored.len() as f64,
        confusion,
    })
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Sort by descending score and group ties: `(positives, negatives)` per distinct score.
fn tie_groups(scored: &[(bool, f64)]) -> Vec<(usize, usize)> {
    let mut sorted: Vec<(bool, f64)> = scored.to_vec();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut groups: Vec<(f64, usize, usize)> = Vec::new();
    for (label, score) in sorted {
        match groups.last_mut() {
            Some(last) if last.0 == score => {
                if label {
                    last.1 += 1
                } else {
                    last.2 += 1
                }
            }
            _ => groups.push((score, usize::from(label), usize::from(!label))),
        }
    }
    groups.into_iter().map(|(_, p, n)| (p, n)).collect()
}

/// Mann-Whitney form of the ROC area; tied scores count half.
fn roc_auc(scored: &[(bool, f64)]) -> f64 {
    let total_pos = scored.iter().filter(|s| s.0).count();
    let total_neg = scored.len() - total_pos;
    if total_pos == 0 || total_neg == 0 {
        return 0.0;
    }

    let mut negatives_below = total_neg as f64;
    let mut area = 0.0;
    for (pos, neg) in tie_groups(scored) {
        negatives_below -= neg as f64;
        area += pos as f64 * (negatives_below + neg as f64 / 2.0);
    }
    area / (total_pos as f64 * total_neg as f64)
}

/// Average precision: precision summed at each recall step, ties taken together.
fn pr_auc(scored: &[(bool, f64)]) -> f64 {
    let total_pos = scored.iter().filter(|s| s.0).count();
    if total_pos == 0 {
        return 0.0;
    }

    let (mut tp, mut seen) = (0usize, 0usize);
    let mut area = 0.0;
    for (pos, neg) in tie_groups(scored) {
        tp += pos;
        seen += pos + neg;
        area += (pos as f64 / total_pos as f64) * (tp as f64 / seen as f64);
    }
    area
}
