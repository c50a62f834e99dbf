use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::core::DataTable;
use crate::engines::{
    EngineBase, EngineError, LogLevel, MetricType, ScoringEngine, ScoringResult,
};
use crate::metrics::{Mask, mask_iou, rle_decode};
use crate::utils::math::{mean, round_to};

#[derive(Debug, Clone)]
struct SegmentationColumns {
    id: String,
    class: String,
    rle: String,
}

/// Scoring engine for segmentation tasks.
///
/// Ground truth columns 0-4 are identifier, class, RLE mask, height,
/// width; predictions carry identifier, class and RLE mask, with image
/// dimensions looked up from the ground truth. The score is the mean
/// IoU: per-class averages of mask IoU, then the mean across classes.
pub struct SegmentationEngine {
    base: EngineBase,
    metric_type: MetricType,
    columns: Option<SegmentationColumns>,
    image_dimensions: HashMap<String, (usize, usize)>,
}

impl SegmentationEngine {
    pub fn new(ground_truth_path: impl Into<std::path::PathBuf>, metric_type: MetricType) -> Self {
        Self {
            base: EngineBase::new(ground_truth_path),
            metric_type,
            columns: None,
            image_dimensions: HashMap::new(),
        }
    }
}

impl ScoringEngine for SegmentationEngine {
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
        if headers.len() < 5 {
            self.base.log(
                LogLevel::Error,
                "Segmentation ground truth must have at least 5 columns: id, class, rle_mask, height, width",
            );
            return false;
        }

        let columns = SegmentationColumns {
            id: headers[0].clone(),
            class: headers[1].clone(),
            rle: headers[2].clone(),
        };
        self.base.log(
            LogLevel::Info,
            format!(
                "Auto-detected columns: ID='{}', Class='{}', RLE='{}', H='{}', W='{}'",
                columns.id, columns.class, columns.rle, headers[3], headers[4]
            ),
        );
        self.base.set_required_columns(vec![
            columns.id.clone(),
            columns.class.clone(),
            columns.rle.clone(),
        ]);
        self.columns = Some(columns);

        // cache per-image dimensions from the gt columns 3 and 4
        self.image_dimensions.clear();
        for row in 0..ground_truth.num_rows() {
            let id = ground_truth.cell(row, 0).unwrap_or_default();
            let height = ground_truth.numeric_cell(row, 3);
            let width = ground_truth.numeric_cell(row, 4);
            match (height, width) {
                (Ok(h), Ok(w)) if h >= 0.0 && w >= 0.0 => {
                    self.image_dimensions
                        .insert(id.to_string(), (h as usize, w as usize));
                }
                _ => {
                    self.base.log(
                        LogLevel::Error,
                        format!("Invalid height/width for image {id}"),
                    );
                    return false;
                }
            }
        }
        true
    }

    fn validate_prediction_format(&self, prediction: &DataTable) -> (bool, String) {
        let missing = self.base.missing_columns(prediction);
        if missing.is_empty() {
            (true, String::new())
        } else {
            (
                false,
                format!(
                    "Missing required columns: [{}]. Expected: [{}]",
                    missing.join(", "),
                    self.base.required_columns().join(", ")
                ),
            )
        }
    }

    fn calculate_score(
        &mut self,
        prediction: &DataTable,
        ground_truth: &DataTable,
    ) -> Result<ScoringResult, EngineError> {
        let columns = self.columns.clone().ok_or_else(|| {
            EngineError::InvalidData("ground truth columns were not detected".into())
        })?;

        let index_of = |name: &str| {
            prediction.column_index(name).ok_or_else(|| {
                EngineError::InvalidData(format!("prediction is missing the '{name}' column"))
            })
        };
        let pred_id_idx = index_of(&columns.id)?;
        let pred_class_idx = index_of(&columns.class)?;
        let pred_rle_idx = index_of(&columns.rle)?;

        // (image, class) -> rle
        let mut predicted_masks: HashMap<(&str, &str), &str> = HashMap::new();
        for row in 0..prediction.num_rows() {
            if let (Some(id), Some(class), Some(rle)) = (
                prediction.cell(row, pred_id_idx),
                prediction.cell(row, pred_class_idx),
                prediction.cell(row, pred_rle_idx),
            ) {
                predicted_masks.insert((id, class), rle);
            }
        }

        // ground-truth first-appearance order, for deterministic results
        let mut classes: Vec<String> = Vec::new();
        for row in 0..ground_truth.num_rows() {
            let class = ground_truth.cell(row, 1).unwrap_or_default();
            if !classes.iter().any(|c| c == class) {
                classes.push(class.to_string());
            }
        }
        self.base
            .log(LogLevel::Info, format!("Number of classes: {}", classes.len()));

        let mut per_class_iou = Map::new();
        let mut class_means = Vec::with_capacity(classes.len());
        for class in &classes {
            let mut ious = Vec::new();
            for row in 0..ground_truth.num_rows() {
                if ground_truth.cell(row, 1) != Some(class.as_str()) {
                    continue;
                }
                let image_id = ground_truth.cell(row, 0).unwrap_or_default();
                let Some(&(height, width)) = self.image_dimensions.get(image_id) else {
                    self.base.log(
                        LogLevel::Warning,
                        format!("No dimensions for image {image_id}"),
                    );
                    continue;
                };

                let gt_rle = ground_truth.cell(row, 2).unwrap_or_default();
                let gt_mask = rle_decode(gt_rle, height, width);
                let pred_mask = match predicted_masks.get(&(image_id, class.as_str())) {
                    Some(rle) => rle_decode(rle, height, width),
                    None => Mask::zeros(height, width),
                };
                ious.push(mask_iou(&gt_mask, &pred_mask));
            }
            let class_iou = mean(&ious);
            class_means.push(class_iou);
            per_class_iou.insert(class.clone(), json!(round_to(class_iou, 4)));
        }

        let miou = mean(&class_means);
        self.base.log(LogLevel::Info, format!("mIoU: {miou:.4}"));

        let score = round_to(miou, 6);
        let mut metrics = Map::new();
        metrics.insert(self.metric_type.to_string(), json!(score));
        metrics.insert("per_class_iou".into(), Value::Object(per_class_iou));
        metrics.insert("num_classes".into(), json!(classes.len()));
        metrics.insert("num_gt_masks".into(), json!(ground_truth.num_rows()));
        metrics.insert("num_pred_masks".into(), json!(prediction.num_rows()));

        Ok(ScoringResult::success(score, Some(metrics), Vec::new()))
    }
}
