use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use serde_json::{Map, Value};

use crate::core::DataTable;
use crate::engines::engine::run_scoring_pipeline;
use crate::engines::{EngineBase, EngineError, LogLevel, ScoringEngine, ScoringResult};

/// Log sink handed to scoring functions; lines are appended after the
/// engine's own logs once the function returns.
#[derive(Debug, Default)]
pub struct ScriptLogger {
    lines: Vec<String>,
}

impl ScriptLogger {
    pub fn log(&mut self, message: impl AsRef<str>) {
        self.log_with(LogLevel::Info, message);
    }

    pub fn log_with(&mut self, level: LogLevel, message: impl AsRef<str>) {
        self.lines.push(format!("[{level}] {}", message.as_ref()));
    }

    fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// What a scoring function may hand back; adapted into a
/// [`ScoringResult`] by the custom engine.
pub enum ScriptOutcome {
    /// A complete result, passed through untouched.
    Result(ScoringResult),
    /// A bare number: a successful result with that score.
    Score(f64),
    /// An object with optional `success`, `score`, `metrics`,
    /// `error_message` and `logs` keys.
    Report(Map<String, Value>),
}

pub type ScoringFn =
    dyn Fn(&DataTable, &DataTable, &mut ScriptLogger) -> anyhow::Result<ScriptOutcome>
        + Send
        + Sync;

pub type EngineFactory = dyn Fn(&Path) -> Box<dyn ScoringEngine> + Send + Sync;

/// Operator-supplied scoring plugin. The two shapes mirror the two ways
/// a scoring script can extend the platform: a full engine delegate, or
/// a single scoring function with optional required-columns metadata.
#[derive(Clone)]
pub enum ScoringScript {
    Engine(Arc<EngineFactory>),
    Function {
        scorer: Arc<ScoringFn>,
        required_columns: Vec<String>,
    },
}

impl ScoringScript {
    pub fn from_fn<F>(scorer: F) -> Self
    where
        F: Fn(&DataTable, &DataTable, &mut ScriptLogger) -> anyhow::Result<ScriptOutcome>
            + Send
            + Sync
            + 'static,
    {
        Self::Function {
            scorer: Arc::new(scorer),
            required_columns: Vec::new(),
        }
    }

    pub fn with_required_columns(self, columns: Vec<String>) -> Self {
        match self {
            Self::Function { scorer, .. } => Self::Function {
                scorer,
                required_columns: columns,
            },
            other => other,
        }
    }
}

/// Resolves a script name to a plugin. The default host is
/// [`ScriptRegistry`]; deployments with other loading schemes implement
/// this seam themselves.
pub trait ScriptHost: Send + Sync {
    fn load(&self, name: &str) -> anyhow::Result<ScoringScript>;
}

/// Name-keyed plugin registry.
#[derive(Default)]
pub struct ScriptRegistry {
    scripts: HashMap<String, ScoringScript>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, script: ScoringScript) {
        self.scripts.insert(name.into(), script);
    }
}

impl ScriptHost for ScriptRegistry {
    fn load(&self, name: &str) -> anyhow::Result<ScoringScript> {
        self.scripts
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("no scoring script registered under '{name}'"))
    }
}

enum LoadedScript {
    Engine(Box<dyn ScoringEngine>),
    Function {
        scorer: Arc<ScoringFn>,
    },
}

/// Scoring engine driven by an operator-supplied plugin.
///
/// The plugin resolves at most once per engine instance; a resolution
/// failure is reported as a failure result and retried on the next call.
/// An engine-shaped plugin turns this engine into a thin proxy; a
/// function-shaped plugin runs inside the standard pipeline with its
/// return value adapted into a [`ScoringResult`].
pub struct CustomEngine {
    base: EngineBase,
    script_name: String,
    host: Arc<dyn ScriptHost>,
    loaded: Option<LoadedScript>,
}

impl CustomEngine {
    pub fn new(
        ground_truth_path: impl Into<std::path::PathBuf>,
        script_name: impl Into<String>,
        host: Arc<dyn ScriptHost>,
    ) -> Self {
        Self {
            base: EngineBase::new(ground_truth_path),
            script_name: script_name.into(),
            host,
            loaded: None,
        }
    }

    fn ensure_loaded(&mut self) -> Result<(), String> {
        if self.loaded.is_some() {
            return Ok(());
        }
        match self.host.load(&self.script_name) {
            Ok(ScoringScript::Engine(factory)) => {
                let delegate = factory(self.base.ground_truth_path());
                self.loaded = Some(LoadedScript::Engine(delegate));
            }
            Ok(ScoringScript::Function {
                scorer,
                required_columns,
            }) => {
                if !required_columns.is_empty() {
                    self.base.set_required_columns(required_columns);
                }
                self.loaded = Some(LoadedScript::Function { scorer });
            }
            Err(e) => {
                self.base.log(
                    LogLevel::Error,
                    format!("Failed to load custom scoring script: {e}"),
                );
                return Err(format!("Failed to load scoring script: {e}"));
            }
        }
        self.base.log(
            LogLevel::Info,
            format!("Successfully loaded custom scoring script: {}", self.script_name),
        );
        Ok(())
    }

    fn adapt_outcome(outcome: ScriptOutcome) -> ScoringResult {
        match outcome {
            ScriptOutcome::Result(result) => result,
            ScriptOutcome::Score(score) => ScoringResult::success(score, None, Vec::new()),
            ScriptOutcome::Report(report) => {
                let success = report
                    .get("success")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                let score = report.get("score").and_then(Value::as_f64);
                let metrics = report
                    .get("metrics")
                    .and_then(Value::as_object)
                    .cloned();
                let error_message = report
                    .get("error_message")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let logs = report
                    .get("logs")
                    .and_then(Value::as_array)
                    .map(|lines| {
                        lines
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();

                ScoringResult {
                    success,
                    score,
                    metrics,
                    error_message,
                    logs,
                }
            }
        }
    }
}

impl ScoringEngine for CustomEngine {
    fn base(&self) -> &EngineBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EngineBase {
        &mut self.base
    }

    fn load_ground_truth(&mut self) -> bool {
        match &mut self.loaded {
            Some(LoadedScript::Engine(delegate)) => delegate.load_ground_truth(),
            _ => self.base.load_ground_truth_table(),
        }
    }

    fn validate_prediction_format(&self, prediction: &DataTable) -> (bool, String) {
        match &self.loaded {
            Some(LoadedScript::Engine(delegate)) => {
                delegate.validate_prediction_format(prediction)
            }
            _ => {
                let missing = self.base.missing_columns(prediction);
                if missing.is_empty() {
                    (true, String::new())
                } else {
                    (
                        false,
                        format!("Missing required columns: [{}]", missing.join(", ")),
                    )
                }
            }
        }
    }

    fn calculate_score(
        &mut self,
        prediction: &DataTable,
        ground_truth: &DataTable,
    ) -> Result<ScoringResult, EngineError> {
        let Some(loaded) = &mut self.loaded else {
            return Err(EngineError::Script(
                "Custom script does not implement calculate_score()".into(),
            ));
        };
        match loaded {
            LoadedScript::Engine(delegate) => delegate.calculate_score(prediction, ground_truth),
            LoadedScript::Function { scorer } => {
                let scorer = Arc::clone(scorer);
                let mut logger = ScriptLogger::default();
                match scorer(prediction, ground_truth, &mut logger) {
                    Ok(outcome) => {
                        self.base.extend_logs(logger.into_lines());
                        Ok(Self::adapt_outcome(outcome))
                    }
                    Err(e) => {
                        self.base.extend_logs(logger.into_lines());
                        self.base.log(
                            LogLevel::Error,
                            format!("Error executing custom calculate_score: {e}"),
                        );
                        Ok(ScoringResult::failure(
                            format!("Custom script execution failed: {e}"),
                            Vec::new(),
                        ))
                    }
                }
            }
        }
    }

    fn score(&mut self, prediction_path: &Path) -> ScoringResult {
        self.base.reset_logs();
        if let Err(message) = self.ensure_loaded() {
            return ScoringResult::failure(message, self.base.take_logs());
        }

        if let Some(LoadedScript::Engine(delegate)) = &mut self.loaded {
            // thin proxy: the delegate runs its own pipeline; our load
            // log is prepended to keep logs append-only
            let mut result = delegate.score(prediction_path);
            let mut logs = self.base.take_logs();
            logs.append(&mut result.logs);
            result.logs = logs;
            return result;
        }

        run_scoring_pipeline(self, prediction_path)
    }
}
