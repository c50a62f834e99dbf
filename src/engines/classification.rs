use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value, json};

use crate::core::DataTable;
use crate::engines::{
    EngineBase, EngineError, LogLevel, MetricType, ScoringEngine, ScoringResult,
};
use crate::metrics::ClassificationReport;
use crate::utils::math::round_to;

/// Sentinel filled in for ground-truth rows with no matching prediction;
/// it never equals a real label, so those rows always score as wrong.
const MISSING_LABEL: &str = "__MISSING__";

/// Scoring engine for classification tasks.
///
/// The ground truth's first column is the identifier, the second the
/// label; prediction files must carry the same two columns under the
/// same names. The primary score is whichever metric the competition
/// requested, falling back to accuracy.
pub struct ClassificationEngine {
    base: EngineBase,
    metric_type: MetricType,
    target_class: Option<String>,
    id_column: Option<String>,
    label_column: Option<String>,
}

impl ClassificationEngine {
    pub fn new(
        ground_truth_path: impl Into<std::path::PathBuf>,
        metric_type: MetricType,
        target_class: Option<String>,
    ) -> Self {
        Self {
            base: EngineBase::new(ground_truth_path),
            metric_type,
            target_class,
            id_column: None,
            label_column: None,
        }
    }

    fn build_metrics(
        &self,
        report: &ClassificationReport,
        total_samples: usize,
        missing_count: usize,
    ) -> Map<String, Value> {
        let mut metrics = Map::new();
        let mut put = |key: MetricType, value: f64| {
            metrics.insert(key.to_string(), json!(round_to(value, 6)));
        };

        put(MetricType::Accuracy, report.accuracy);
        put(MetricType::F1Macro, report.macro_avg.f1);
        put(MetricType::F1Micro, report.micro_avg.f1);
        put(MetricType::F1Weighted, report.weighted_avg.f1);
        put(MetricType::PrecisionMacro, report.macro_avg.precision);
        put(MetricType::PrecisionMicro, report.micro_avg.precision);
        put(MetricType::PrecisionWeighted, report.weighted_avg.precision);
        put(MetricType::RecallMacro, report.macro_avg.recall);
        put(MetricType::RecallMicro, report.micro_avg.recall);
        put(MetricType::RecallWeighted, report.weighted_avg.recall);

        // legacy aliases kept for older competitions
        put(MetricType::F1, report.macro_avg.f1);
        put(MetricType::Precision, report.macro_avg.precision);
        put(MetricType::Recall, report.macro_avg.recall);

        if let Some(target) = &self.target_class {
            let class = report.class(target);
            let f1 = class.map_or(0.0, |c| c.f1);
            let precision = class.map_or(0.0, |c| c.precision);
            let recall = class.map_or(0.0, |c| c.recall);
            put(MetricType::ClassF1, f1);
            put(MetricType::ClassPrecision, precision);
            put(MetricType::ClassRecall, recall);
        }

        metrics.insert("total_samples".into(), json!(total_samples));
        metrics.insert("missing_predictions".into(), json!(missing_count));
        metrics.insert(
            "per_class_report".into(),
            serde_json::to_value(report).unwrap_or(Value::Null),
        );
        metrics
    }
}

impl ScoringEngine for ClassificationEngine {
    fn base(&self) -> &EngineBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EngineBase {
        &mut self.base
    }

    fn load_ground_truth(&mut self) -> bool {
        if !self.base.load_ground_truth_table() {
            return false;
        }

        let Some(ground_truth) = self.base.ground_truth_arc() else {
            return false;
        };
        let headers = ground_truth.headers();
        if headers.len() < 2 {
            self.base.log(
                LogLevel::Error,
                "Ground truth must have at least 2 columns",
            );
            return false;
        }

        let id_column = headers[0].clone();
        let label_column = headers[1].clone();
        self.base.log(
            LogLevel::Info,
            format!("Auto-detected columns: ID='{id_column}', Label='{label_column}'"),
        );
        self.base
            .set_required_columns(vec![id_column.clone(), label_column.clone()]);
        self.id_column = Some(id_column);
        self.label_column = Some(label_column);
        true
    }

    fn validate_prediction_format(&self, prediction: &DataTable) -> (bool, String) {
        let missing = self.base.missing_columns(prediction);
        if !missing.is_empty() {
            return (
                false,
                format!(
                    "Missing required columns: [{}]. Expected columns: [{}]",
                    missing.join(", "),
                    self.base.required_columns().join(", ")
                ),
            );
        }

        let id_column = self.id_column.as_deref().unwrap_or_default();
        if let Some(id_idx) = prediction.column_index(id_column) {
            let mut seen = HashSet::new();
            for id in prediction.column(id_idx) {
                if !seen.insert(id) {
                    return (
                        false,
                        format!("Prediction contains duplicate {id_column} values"),
                    );
                }
            }
        }

        (true, String::new())
    }

    fn calculate_score(
        &mut self,
        prediction: &DataTable,
        ground_truth: &DataTable,
    ) -> Result<ScoringResult, EngineError> {
        let id_column = self.id_column.clone().ok_or_else(|| {
            EngineError::InvalidData("ground truth columns were not detected".into())
        })?;

        let pred_id_idx = prediction.column_index(&id_column).ok_or_else(|| {
            EngineError::InvalidData(format!("prediction is missing the '{id_column}' column"))
        })?;
        let label_column = self.label_column.clone().unwrap_or_default();
        let pred_label_idx = prediction.column_index(&label_column).ok_or_else(|| {
            EngineError::InvalidData(format!("prediction is missing the '{label_column}' column"))
        })?;

        let mut predicted_by_id: HashMap<&str, &str> = HashMap::new();
        for row in 0..prediction.num_rows() {
            if let (Some(id), Some(label)) = (
                prediction.cell(row, pred_id_idx),
                prediction.cell(row, pred_label_idx),
            ) {
                predicted_by_id.insert(id, label);
            }
        }

        // left join: every ground-truth row is represented
        let mut y_true = Vec::with_capacity(ground_truth.num_rows());
        let mut y_pred = Vec::with_capacity(ground_truth.num_rows());
        let mut missing_count = 0usize;
        for row in 0..ground_truth.num_rows() {
            let id = ground_truth.cell(row, 0).unwrap_or_default();
            let label = ground_truth.cell(row, 1).unwrap_or_default();
            y_true.push(label.to_string());
            match predicted_by_id.get(id) {
                Some(predicted) => y_pred.push((*predicted).to_string()),
                None => {
                    missing_count += 1;
                    y_pred.push(MISSING_LABEL.to_string());
                }
            }
        }

        if missing_count > 0 {
            self.base.log(
                LogLevel::Warning,
                format!("{missing_count} items have no prediction"),
            );
        }

        let report = ClassificationReport::compute(&y_true, &y_pred);
        self.base
            .log(LogLevel::Info, format!("Accuracy: {:.4}", report.accuracy));
        self.base.log(
            LogLevel::Info,
            format!("F1 (macro): {:.4}", report.macro_avg.f1),
        );

        let metrics = self.build_metrics(&report, y_true.len(), missing_count);
        let requested = self.metric_type.to_string();
        let score = metrics
            .get(&requested)
            .and_then(Value::as_f64)
            .unwrap_or_else(|| round_to(report.accuracy, 6));

        Ok(ScoringResult::success(score, Some(metrics), Vec::new()))
    }
}
