use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome of scoring one prediction file.
///
/// Every failure mode of an engine surfaces here as `success == false`
/// with a human-readable `error_message`; engines never let an error
/// escape `score()`. `metrics` keeps insertion order (serde_json is built
/// with `preserve_order`), and `logs` is append-only: engine-level lines
/// come before task-level ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringResult {
    pub success: bool,
    pub score: Option<f64>,
    pub metrics: Option<Map<String, Value>>,
    pub error_message: Option<String>,
    pub logs: Vec<String>,
}

impl ScoringResult {
    pub fn success(score: f64, metrics: Option<Map<String, Value>>, logs: Vec<String>) -> Self {
        Self {
            success: true,
            score: Some(score),
            metrics,
            error_message: None,
            logs,
        }
    }

    pub fn failure(error_message: impl Into<String>, logs: Vec<String>) -> Self {
        Self {
            success: false,
            score: None,
            metrics: None,
            error_message: Some(error_message.into()),
            logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_flags() {
        let ok = ScoringResult::success(0.75, None, vec!["[INFO] done".into()]);
        assert!(ok.success);
        assert_eq!(ok.score, Some(0.75));
        assert!(ok.error_message.is_none());

        let bad = ScoringResult::failure("missing columns", Vec::new());
        assert!(!bad.success);
        assert_eq!(bad.score, None);
        assert_eq!(bad.error_message.as_deref(), Some("missing columns"));
    }

    #[test]
    fn serializes_metrics_in_insertion_order() {
        let mut metrics = Map::new();
        metrics.insert("ACCURACY".into(), 0.6.into());
        metrics.insert("F1_MACRO".into(), 0.5.into());
        let result = ScoringResult::success(0.6, Some(metrics), Vec::new());

        let json = serde_json::to_string(&result).unwrap();
        let accuracy_at = json.find("ACCURACY").unwrap();
        let f1_at = json.find("F1_MACRO").unwrap();
        assert!(accuracy_at < f1_at);
    }
}
