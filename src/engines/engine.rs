use std::path::{Path, PathBuf};
use std::sync::Arc;

use strum_macros::Display;
use thiserror::Error;

use crate::core::{DataTable, TableError};
use crate::engines::ScoringResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("{0}")]
    InvalidData(String),

    #[error("{0}")]
    Script(String),
}

/// State shared by every scoring engine: the ground-truth source and its
/// lazily loaded cache, the required prediction columns (populated after
/// auto-detection), and the log buffer that is reset at the start of each
/// `score()` call.
#[derive(Debug, Clone)]
pub struct EngineBase {
    ground_truth_path: PathBuf,
    ground_truth: Option<Arc<DataTable>>,
    required_columns: Vec<String>,
    logs: Vec<String>,
}

impl EngineBase {
    pub fn new(ground_truth_path: impl Into<PathBuf>) -> Self {
        Self {
            ground_truth_path: ground_truth_path.into(),
            ground_truth: None,
            required_columns: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn ground_truth_path(&self) -> &Path {
        &self.ground_truth_path
    }

    pub fn ground_truth(&self) -> Option<&DataTable> {
        self.ground_truth.as_deref()
    }

    pub fn ground_truth_arc(&self) -> Option<Arc<DataTable>> {
        self.ground_truth.clone()
    }

    pub fn required_columns(&self) -> &[String] {
        &self.required_columns
    }

    pub fn set_required_columns(&mut self, columns: Vec<String>) {
        self.required_columns = columns;
    }

    pub fn log(&mut self, level: LogLevel, message: impl AsRef<str>) {
        self.logs.push(format!("[{level}] {}", message.as_ref()));
    }

    /// Appends already-formatted lines, e.g. from a script logger.
    pub fn extend_logs(&mut self, lines: impl IntoIterator<Item = String>) {
        self.logs.extend(lines);
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn reset_logs(&mut self) {
        self.logs.clear();
    }

    pub fn take_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.logs)
    }

    /// Reads the ground-truth table into the cache. Logs and returns
    /// `false` on failure instead of erroring.
    pub fn load_ground_truth_table(&mut self) -> bool {
        match DataTable::from_path(&self.ground_truth_path) {
            Ok(table) => {
                self.log(
                    LogLevel::Info,
                    format!("Loaded ground truth with {} rows", table.num_rows()),
                );
                self.ground_truth = Some(Arc::new(table));
                true
            }
            Err(e) => {
                self.log(LogLevel::Error, format!("Failed to load ground truth: {e}"));
                false
            }
        }
    }

    /// Required columns absent from `table`, in required order.
    pub fn missing_columns(&self, table: &DataTable) -> Vec<String> {
        self.required_columns
            .iter()
            .filter(|c| !table.has_column(c))
            .cloned()
            .collect()
    }
}

/// Contract every task engine follows.
///
/// The provided `score()` is the sole orchestration entry point; task
/// engines supply `calculate_score` and may override ground-truth loading
/// (for column auto-detection) and format validation. `score()` never
/// panics on bad input and never returns an error: every failure becomes
/// a `ScoringResult` with `success == false`.
pub trait ScoringEngine {
    fn base(&self) -> &EngineBase;

    fn base_mut(&mut self) -> &mut EngineBase;

    /// Task-specific scoring over a validated prediction table. An `Err`
    /// is converted by `score()` into a failure result, so it never
    /// crosses the engine boundary.
    fn calculate_score(
        &mut self,
        prediction: &DataTable,
        ground_truth: &DataTable,
    ) -> Result<ScoringResult, EngineError>;

    fn load_ground_truth(&mut self) -> bool {
        self.base_mut().load_ground_truth_table()
    }

    /// Checks that all currently-known required columns exist; the
    /// message names the missing ones.
    fn validate_prediction_format(&self, prediction: &DataTable) -> (bool, String) {
        let missing = self.base().missing_columns(prediction);
        if missing.is_empty() {
            (true, String::new())
        } else {
            (
                false,
                format!("Missing required columns: [{}]", missing.join(", ")),
            )
        }
    }

    fn load_prediction(&mut self, prediction_path: &Path) -> Option<DataTable> {
        match DataTable::from_path(prediction_path) {
            Ok(table) => {
                self.base_mut().log(
                    LogLevel::Info,
                    format!("Loaded prediction with {} rows", table.num_rows()),
                );
                Some(table)
            }
            Err(e) => {
                self.base_mut()
                    .log(LogLevel::Error, format!("Failed to load prediction: {e}"));
                None
            }
        }
    }

    fn score(&mut self, prediction_path: &Path) -> ScoringResult {
        self.base_mut().reset_logs();
        run_scoring_pipeline(self, prediction_path)
    }
}

/// Shared body of `score()`, after the log reset. Split out so engines
/// that override `score()` (the custom engine) can still reuse the
/// load/validate/calculate pipeline without clearing logs twice.
pub(crate) fn run_scoring_pipeline<E: ScoringEngine + ?Sized>(
    engine: &mut E,
    prediction_path: &Path,
) -> ScoringResult {
    if engine.base().ground_truth().is_none() && !engine.load_ground_truth() {
        let logs = engine.base_mut().take_logs();
        return ScoringResult::failure("Failed to load ground truth", logs);
    }

    let Some(prediction) = engine.load_prediction(prediction_path) else {
        let logs = engine.base_mut().take_logs();
        return ScoringResult::failure("Failed to load prediction file", logs);
    };

    let (valid, message) = engine.validate_prediction_format(&prediction);
    if !valid {
        let logs = engine.base_mut().take_logs();
        return ScoringResult::failure(message, logs);
    }

    let Some(ground_truth) = engine.base().ground_truth_arc() else {
        let logs = engine.base_mut().take_logs();
        return ScoringResult::failure("Failed to load ground truth", logs);
    };

    match engine.calculate_score(&prediction, &ground_truth) {
        Ok(mut result) => {
            let mut logs = engine.base_mut().take_logs();
            logs.append(&mut result.logs);
            result.logs = logs;
            result
        }
        Err(e) => {
            engine
                .base_mut()
                .log(LogLevel::Error, format!("Scoring failed: {e}"));
            let logs = engine.base_mut().take_logs();
            ScoringResult::failure(e.to_string(), logs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::write_csv;
    use tempfile::TempDir;

    struct FixedScoreEngine {
        base: EngineBase,
        fail_with: Option<String>,
    }

    impl FixedScoreEngine {
        fn new(path: impl Into<PathBuf>) -> Self {
            Self {
                base: EngineBase::new(path),
                fail_with: None,
            }
        }
    }

    impl ScoringEngine for FixedScoreEngine {
        fn base(&self) -> &EngineBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut EngineBase {
            &mut self.base
        }

        fn calculate_score(
            &mut self,
            prediction: &DataTable,
            _ground_truth: &DataTable,
        ) -> Result<ScoringResult, EngineError> {
            if let Some(message) = &self.fail_with {
                return Err(EngineError::InvalidData(message.clone()));
            }
            self.base.log(LogLevel::Info, "calculated");
            Ok(ScoringResult::success(
                prediction.num_rows() as f64,
                None,
                vec!["[INFO] task log".to_string()],
            ))
        }
    }

    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let gt = write_csv(dir.path(), "gt.csv", "id,label\n1,cat\n2,dog\n");
        let pred = write_csv(dir.path(), "pred.csv", "id,label\n1,cat\n2,cat\n3,dog\n");
        (dir, gt, pred)
    }

    #[test]
    fn score_runs_the_full_pipeline() {
        let (_dir, gt, pred) = fixture();
        let mut engine = FixedScoreEngine::new(&gt);

        let result = engine.score(&pred);
        assert!(result.success);
        assert_eq!(result.score, Some(3.0));
        // engine-level logs come before the task-level log
        assert_eq!(result.logs.len(), 4);
        assert!(result.logs[0].contains("Loaded ground truth with 2 rows"));
        assert!(result.logs[1].contains("Loaded prediction with 3 rows"));
        assert!(result.logs[2].contains("calculated"));
        assert_eq!(result.logs[3], "[INFO] task log");
    }

    #[test]
    fn missing_ground_truth_fails_fast() {
        let dir = TempDir::new().unwrap();
        let mut engine = FixedScoreEngine::new(dir.path().join("absent.csv"));

        let result = engine.score(&dir.path().join("also_absent.csv"));
        assert!(!result.success);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Failed to load ground truth")
        );
        assert!(result.logs.iter().any(|l| l.starts_with("[ERROR]")));
    }

    #[test]
    fn missing_prediction_fails_fast() {
        let (dir, gt, _pred) = fixture();
        let mut engine = FixedScoreEngine::new(&gt);

        let result = engine.score(&dir.path().join("absent.csv"));
        assert!(!result.success);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Failed to load prediction file")
        );
    }

    #[test]
    fn missing_required_columns_fail_validation() {
        let (_dir, gt, pred) = fixture();
        let mut engine = FixedScoreEngine::new(&gt);
        engine
            .base_mut()
            .set_required_columns(vec!["id".into(), "probability".into()]);

        let result = engine.score(&pred);
        assert!(!result.success);
        let message = result.error_message.unwrap();
        assert!(message.contains("Missing required columns"));
        assert!(message.contains("probability"));
        assert!(!message.contains("[id"));
    }

    #[test]
    fn calculate_score_error_becomes_failure_result() {
        let (_dir, gt, pred) = fixture();
        let mut engine = FixedScoreEngine::new(&gt);
        engine.fail_with = Some("boom".to_string());

        let result = engine.score(&pred);
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("boom"));
        assert!(result.logs.iter().any(|l| l == "[ERROR] Scoring failed: boom"));
    }

    #[test]
    fn ground_truth_is_cached_across_calls() {
        let (_dir, gt, pred) = fixture();
        let mut engine = FixedScoreEngine::new(&gt);

        let first = engine.score(&pred);
        std::fs::remove_file(&gt).unwrap();
        let second = engine.score(&pred);

        assert!(second.success);
        assert_eq!(first.score, second.score);
        // second call has no "Loaded ground truth" line: the cache was reused
        assert!(!second.logs[0].contains("ground truth"));
    }

    #[test]
    fn log_lines_carry_level_prefix() {
        let mut base = EngineBase::new("gt.csv");
        base.log(LogLevel::Info, "a");
        base.log(LogLevel::Warning, "b");
        base.log(LogLevel::Error, "c");
        assert_eq!(base.logs(), &["[INFO] a", "[WARNING] b", "[ERROR] c"]);
    }
}
