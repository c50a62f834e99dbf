use crate::engines::{
    ClassificationEngine, ConfigError, CustomEngine, DetectionEngine, MetricType, ScoringConfig,
    ScoringEngine, SegmentationEngine, TaskType,
};

/// Builds the engine for one competition's configuration.
///
/// A `CUSTOM` metric always wins: it selects the custom engine no matter
/// the task type, and requires a script reference. Otherwise the task
/// type picks the engine and the metric is handed to it; the detection
/// and segmentation engines score whichever of their metrics was asked
/// for, so no combination check is needed beyond the custom task.
pub fn get_scoring_engine(
    config: ScoringConfig,
) -> Result<Box<dyn ScoringEngine>, ConfigError> {
    if config.metric_type == MetricType::Custom {
        let script = config.script.ok_or(ConfigError::MissingScript)?;
        return Ok(Box::new(CustomEngine::new(
            config.ground_truth_path,
            script.name,
            script.host,
        )));
    }

    match config.task_type {
        TaskType::Classification => Ok(Box::new(ClassificationEngine::new(
            config.ground_truth_path,
            config.metric_type,
            config.metric_target_class,
        ))),
        TaskType::Detection => Ok(Box::new(DetectionEngine::new(
            config.ground_truth_path,
            config.metric_type,
        ))),
        TaskType::Segmentation => Ok(Box::new(SegmentationEngine::new(
            config.ground_truth_path,
            MetricType::Miou,
        ))),
        TaskType::Custom => Err(ConfigError::UnsupportedCombination {
            task: config.task_type,
            metric: config.metric_type,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::custom::{ScoringScript, ScriptOutcome, ScriptRegistry};
    use crate::testing::fixtures::{
        classification_fixture, detection_fixture, segmentation_fixture,
    };
    use std::sync::Arc;

    #[test]
    fn builds_engine_per_task_type() {
        let (_dir, gt, pred) = classification_fixture();
        let config = ScoringConfig::new(TaskType::Classification, MetricType::Accuracy, &gt);
        let mut engine = get_scoring_engine(config).unwrap();
        assert_eq!(engine.score(&pred).score, Some(0.6));

        let (_dir, gt, pred) = detection_fixture();
        let config = ScoringConfig::new(TaskType::Detection, MetricType::Map, &gt);
        let mut engine = get_scoring_engine(config).unwrap();
        assert_eq!(engine.score(&pred).score, Some(1.0));

        let (_dir, gt, pred) = segmentation_fixture();
        let config = ScoringConfig::new(TaskType::Segmentation, MetricType::Miou, &gt);
        let mut engine = get_scoring_engine(config).unwrap();
        assert_eq!(engine.score(&pred).score, Some(1.0));
    }

    #[test]
    fn custom_metric_overrides_task_type() {
        let (_dir, gt, pred) = classification_fixture();
        let mut registry = ScriptRegistry::new();
        registry.register(
            "constant",
            ScoringScript::from_fn(|_, _, _| Ok(ScriptOutcome::Score(42.0))),
        );

        let config = ScoringConfig::new(TaskType::Classification, MetricType::Custom, &gt)
            .with_script("constant", Arc::new(registry));
        let mut engine = get_scoring_engine(config).unwrap();
        assert_eq!(engine.score(&pred).score, Some(42.0));
    }

    #[test]
    fn custom_metric_without_script_is_rejected() {
        let config =
            ScoringConfig::new(TaskType::Custom, MetricType::Custom, "gt.csv");
        assert!(matches!(
            get_scoring_engine(config),
            Err(ConfigError::MissingScript)
        ));
    }

    #[test]
    fn custom_task_with_builtin_metric_is_rejected() {
        let config =
            ScoringConfig::new(TaskType::Custom, MetricType::Accuracy, "gt.csv");
        assert!(matches!(
            get_scoring_engine(config),
            Err(ConfigError::UnsupportedCombination { .. })
        ));
    }
}
