use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::engines::custom::ScriptHost;

/// Competition task families.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Classification,
    Detection,
    Segmentation,
    Custom,
}

/// Metric selectable per competition. The string form is the wire name
/// used as the metrics-map key (`F1_MACRO`, `MAP_50_95`, ...); legacy
/// `F1`/`PRECISION`/`RECALL` alias the macro variants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    Accuracy,
    F1,
    F1Macro,
    F1Micro,
    F1Weighted,
    Precision,
    PrecisionMacro,
    PrecisionMicro,
    PrecisionWeighted,
    Recall,
    RecallMacro,
    RecallMicro,
    RecallWeighted,
    ClassF1,
    ClassPrecision,
    ClassRecall,
    #[strum(serialize = "MAP")]
    #[serde(rename = "MAP")]
    Map,
    #[strum(serialize = "MAP_50_95")]
    #[serde(rename = "MAP_50_95")]
    Map5095,
    #[strum(serialize = "MIOU")]
    #[serde(rename = "MIOU")]
    Miou,
    Custom,
}

/// Misconfiguration detected at factory time. This is the one error that
/// propagates to the caller: it means the competition setup is broken,
/// not that a submission failed to score.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("custom metric requires a scoring script")]
    MissingScript,

    #[error("unsupported task/metric combination: {task}/{metric}")]
    UnsupportedCombination { task: TaskType, metric: MetricType },
}

/// Script plugin reference: a name resolved through a [`ScriptHost`].
#[derive(Clone)]
pub struct ScriptConfig {
    pub name: String,
    pub host: Arc<dyn ScriptHost>,
}

/// Everything the factory needs to build an engine for one competition.
#[derive(Clone)]
pub struct ScoringConfig {
    pub task_type: TaskType,
    pub metric_type: MetricType,
    pub ground_truth_path: PathBuf,
    pub metric_target_class: Option<String>,
    pub script: Option<ScriptConfig>,
}

impl ScoringConfig {
    pub fn new(
        task_type: TaskType,
        metric_type: MetricType,
        ground_truth_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            task_type,
            metric_type,
            ground_truth_path: ground_truth_path.into(),
            metric_target_class: None,
            script: None,
        }
    }

    pub fn with_target_class(mut self, class: impl Into<String>) -> Self {
        self.metric_target_class = Some(class.into());
        self
    }

    pub fn with_script(mut self, name: impl Into<String>, host: Arc<dyn ScriptHost>) -> Self {
        self.script = Some(ScriptConfig {
            name: name.into(),
            host,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn metric_wire_names() {
        assert_eq!(MetricType::Accuracy.to_string(), "ACCURACY");
        assert_eq!(MetricType::F1Macro.to_string(), "F1_MACRO");
        assert_eq!(MetricType::PrecisionWeighted.to_string(), "PRECISION_WEIGHTED");
        assert_eq!(MetricType::ClassF1.to_string(), "CLASS_F1");
        assert_eq!(MetricType::Map.to_string(), "MAP");
        assert_eq!(MetricType::Map5095.to_string(), "MAP_50_95");
        assert_eq!(MetricType::Miou.to_string(), "MIOU");
    }

    #[test]
    fn metric_parses_from_wire_names() {
        assert_eq!(MetricType::from_str("MAP_50_95").unwrap(), MetricType::Map5095);
        assert_eq!(MetricType::from_str("ACCURACY").unwrap(), MetricType::Accuracy);
        assert!(MetricType::from_str("MRR").is_err());
    }

    #[test]
    fn task_wire_names() {
        assert_eq!(TaskType::Classification.to_string(), "CLASSIFICATION");
        assert_eq!(TaskType::from_str("SEGMENTATION").unwrap(), TaskType::Segmentation);
    }
}
