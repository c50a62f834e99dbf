use std::collections::BTreeMap;

use serde::Serialize;

/// Precision/recall/F1 for one label, with its ground-truth support.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Batch classification report over aligned label pairs.
///
/// Covers every label seen in either column. Division by zero yields 0.0
/// for the affected metric rather than NaN, so a label that is never
/// predicted still gets a well-defined row.
///
/// - macro: unweighted mean over all labels;
/// - micro: computed from pooled true/false-positive counts, which for
///   single-label data equals accuracy;
/// - weighted: support-weighted mean over all labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub per_class: BTreeMap<String, ClassMetrics>,
    pub macro_avg: AggregateMetrics,
    pub micro_avg: AggregateMetrics,
    pub weighted_avg: AggregateMetrics,
    pub total_support: usize,
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

fn f1_of(precision: f64, recall: f64) -> f64 {
    let sum = precision + recall;
    if sum > 0.0 {
        2.0 * precision * recall / sum
    } else {
        0.0
    }
}

impl ClassificationReport {
    pub fn compute(y_true: &[String], y_pred: &[String]) -> Self {
        let total = y_true.len().min(y_pred.len());
        let pairs = y_true.iter().zip(y_pred.iter()).take(total);

        // label -> (true positives, predicted count, support)
        let mut counts: BTreeMap<&str, (usize, usize, usize)> = BTreeMap::new();
        let mut correct = 0usize;
        for (t, p) in pairs {
            let hit = t == p;
            if hit {
                correct += 1;
            }
            counts.entry(t.as_str()).or_default().2 += 1;
            let p_entry = counts.entry(p.as_str()).or_default();
            p_entry.1 += 1;
            if hit {
                p_entry.0 += 1;
            }
        }

        let accuracy = safe_div(correct as f64, total as f64);

        let mut per_class = BTreeMap::new();
        let mut tp_total = 0usize;
        let mut predicted_total = 0usize;
        let (mut macro_p, mut macro_r, mut macro_f) = (0.0, 0.0, 0.0);
        let (mut weighted_p, mut weighted_r, mut weighted_f) = (0.0, 0.0, 0.0);

        for (label, &(tp, predicted, support)) in &counts {
            let precision = safe_div(tp as f64, predicted as f64);
            let recall = safe_div(tp as f64, support as f64);
            let f1 = f1_of(precision, recall);

            tp_total += tp;
            predicted_total += predicted;
            macro_p += precision;
            macro_r += recall;
            macro_f += f1;
            weighted_p += precision * support as f64;
            weighted_r += recall * support as f64;
            weighted_f += f1 * support as f64;

            per_class.insert(
                label.to_string(),
                ClassMetrics {
                    precision,
                    recall,
                    f1,
                    support,
                },
            );
        }

        let num_labels = per_class.len() as f64;
        let macro_avg = AggregateMetrics {
            precision: safe_div(macro_p, num_labels),
            recall: safe_div(macro_r, num_labels),
            f1: safe_div(macro_f, num_labels),
        };

        let micro_precision = safe_div(tp_total as f64, predicted_total as f64);
        let micro_recall = safe_div(tp_total as f64, total as f64);
        let micro_avg = AggregateMetrics {
            precision: micro_precision,
            recall: micro_recall,
            f1: f1_of(micro_precision, micro_recall),
        };

        let weighted_avg = AggregateMetrics {
            precision: safe_div(weighted_p, total as f64),
            recall: safe_div(weighted_r, total as f64),
            f1: safe_div(weighted_f, total as f64),
        };

        Self {
            accuracy,
            per_class,
            macro_avg,
            micro_avg,
            weighted_avg,
            total_support: total,
        }
    }

    pub fn class(&self, label: &str) -> Option<&ClassMetrics> {
        self.per_class.get(label)
    }
}
