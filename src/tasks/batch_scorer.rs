use std::path::{Path, PathBuf};

use crate::engines::{ConfigError, ScoringConfig, ScoringEngine, ScoringResult, get_scoring_engine};

/// Scores a batch of submissions against one competition configuration.
///
/// The engine is built once and reused, so ground truth is read from disk
/// a single time no matter how many predictions are scored. Results come
/// back in submission order; a submission that fails to score yields a
/// failed result, it never aborts the batch.
pub struct BatchScorer {
    engine: Box<dyn ScoringEngine>,
}

impl BatchScorer {
    pub fn new(config: ScoringConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            engine: get_scoring_engine(config)?,
        })
    }

    pub fn score_one(&mut self, prediction_path: &Path) -> ScoringResult {
        self.engine.score(prediction_path)
    }

    pub fn score_all<I, P>(&mut self, prediction_paths: I) -> Vec<(PathBuf, ScoringResult)>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        prediction_paths
            .into_iter()
            .map(|path| {
                let path = path.into();
                let result = self.engine.score(&path);
                (path, result)
            })
            .collect()
    }
}
