use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::core::DataTable;
use crate::engines::{
    EngineBase, EngineError, LogLevel, MetricType, ScoringEngine, ScoringResult,
};
use crate::metrics::{BoundingBox, average_precision};
use crate::utils::math::{mean, round_to};

/// Name the prediction file must use for its confidence column; the six
/// positional columns reuse the ground-truth header names.
const CONFIDENCE_COLUMN: &str = "confidence";

const MAP_IOU_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone)]
struct DetectionColumns {
    id: String,
    class: String,
    xmin: String,
    ymin: String,
    xmax: String,
    ymax: String,
}

struct LabeledBox {
    image: String,
    class: String,
    bbox: BoundingBox,
}

struct RankedPrediction {
    image: String,
    class: String,
    bbox: BoundingBox,
    confidence: f64,
}

/// Scoring engine for object detection tasks.
///
/// Ground truth columns 0-5 are identifier, class, xmin, ymin, xmax,
/// ymax; predictions add a `confidence` column. Supports mAP@0.5 and
/// mAP@[0.5:0.95]. Matching is greedy in descending-confidence order;
/// equal-confidence predictions keep their original row order (the sort
/// is stable).
pub struct DetectionEngine {
    base: EngineBase,
    metric_type: MetricType,
    columns: Option<DetectionColumns>,
}

impl DetectionEngine {
    pub fn new(ground_truth_path: impl Into<std::path::PathBuf>, metric_type: MetricType) -> Self {
        Self {
            base: EngineBase::new(ground_truth_path),
            metric_type,
            columns: None,
        }
    }

    fn parse_boxes(&self, table: &DataTable) -> Result<Vec<LabeledBox>, EngineError> {
        let mut boxes = Vec::with_capacity(table.num_rows());
        for row in 0..table.num_rows() {
            boxes.push(LabeledBox {
                image: table.cell(row, 0).unwrap_or_default().to_string(),
                class: table.cell(row, 1).unwrap_or_default().to_string(),
                bbox: BoundingBox::new(
                    table.numeric_cell(row, 2)?,
                    table.numeric_cell(row, 3)?,
                    table.numeric_cell(row, 4)?,
                    table.numeric_cell(row, 5)?,
                ),
            });
        }
        Ok(boxes)
    }

    fn parse_predictions(
        &self,
        prediction: &DataTable,
        columns: &DetectionColumns,
    ) -> Result<Vec<RankedPrediction>, EngineError> {
        let index_of = |name: &str| {
            prediction.column_index(name).ok_or_else(|| {
                EngineError::InvalidData(format!("prediction is missing the '{name}' column"))
            })
        };
        let id_idx = index_of(&columns.id)?;
        let class_idx = index_of(&columns.class)?;
        let xmin_idx = index_of(&columns.xmin)?;
        let ymin_idx = index_of(&columns.ymin)?;
        let xmax_idx = index_of(&columns.xmax)?;
        let ymax_idx = index_of(&columns.ymax)?;
        let confidence_idx = index_of(CONFIDENCE_COLUMN)?;

        let mut predictions = Vec::with_capacity(prediction.num_rows());
        for row in 0..prediction.num_rows() {
            predictions.push(RankedPrediction {
                image: prediction.cell(row, id_idx).unwrap_or_default().to_string(),
                class: prediction
                    .cell(row, class_idx)
                    .unwrap_or_default()
                    .to_string(),
                bbox: BoundingBox::new(
                    prediction.numeric_cell(row, xmin_idx)?,
                    prediction.numeric_cell(row, ymin_idx)?,
                    prediction.numeric_cell(row, xmax_idx)?,
                    prediction.numeric_cell(row, ymax_idx)?,
                ),
                confidence: prediction.numeric_cell(row, confidence_idx)?,
            });
        }
        Ok(predictions)
    }

    /// AP for one class at one IoU threshold. Empty prediction or
    /// ground-truth sets for the class yield 0.0.
    fn class_average_precision(
        predictions: &[RankedPrediction],
        ground_truth: &[LabeledBox],
        class: &str,
        iou_threshold: f64,
    ) -> f64 {
        let mut class_predictions: Vec<&RankedPrediction> =
            predictions.iter().filter(|p| p.class == class).collect();
        let class_ground_truth: Vec<&LabeledBox> =
            ground_truth.iter().filter(|b| b.class == class).collect();

        if class_predictions.is_empty() || class_ground_truth.is_empty() {
            return 0.0;
        }

        // stable: ties keep original row order
        class_predictions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut boxes_per_image: HashMap<&str, Vec<&BoundingBox>> = HashMap::new();
        for gt in &class_ground_truth {
            boxes_per_image
                .entry(gt.image.as_str())
                .or_default()
                .push(&gt.bbox);
        }
        let mut matched: HashMap<&str, Vec<bool>> = boxes_per_image
            .iter()
            .map(|(image, boxes)| (*image, vec![false; boxes.len()]))
            .collect();

        let mut true_positives = 0u64;
        let mut false_positives = 0u64;
        let total_ground_truth = class_ground_truth.len() as f64;
        let mut precision = Vec::with_capacity(class_predictions.len());
        let mut recall = Vec::with_capacity(class_predictions.len());

        for prediction in &class_predictions {
            let hit = match (
                boxes_per_image.get(prediction.image.as_str()),
                matched.get_mut(prediction.image.as_str()),
            ) {
                (Some(gt_boxes), Some(flags)) => {
                    let mut best_iou = 0.0;
                    let mut best_idx = None;
                    for (idx, gt_box) in gt_boxes.iter().enumerate() {
                        if flags[idx] {
                            continue;
                        }
                        let iou = prediction.bbox.iou(gt_box);
                        if iou > best_iou {
                            best_iou = iou;
                            best_idx = Some(idx);
                        }
                    }
                    match best_idx {
                        Some(idx) if best_iou >= iou_threshold => {
                            flags[idx] = true;
                            true
                        }
                        _ => false,
                    }
                }
                _ => false,
            };

            if hit {
                true_positives += 1;
            } else {
                false_positives += 1;
            }
            precision
                .push(true_positives as f64 / (true_positives + false_positives) as f64);
            recall.push(true_positives as f64 / total_ground_truth);
        }

        average_precision(&precision, &recall)
    }
}

impl ScoringEngine for DetectionEngine {
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
        if headers.len() < 6 {
            self.base.log(
                LogLevel::Error,
                "Detection ground truth must have at least 6 columns: id, class, xmin, ymin, xmax, ymax",
            );
            return false;
        }

        let columns = DetectionColumns {
            id: headers[0].clone(),
            class: headers[1].clone(),
            xmin: headers[2].clone(),
            ymin: headers[3].clone(),
            xmax: headers[4].clone(),
            ymax: headers[5].clone(),
        };
        self.base.log(
            LogLevel::Info,
            format!(
                "Auto-detected columns: ID='{}', Class='{}', BBox=[{}, {}, {}, {}]",
                columns.id, columns.class, columns.xmin, columns.ymin, columns.xmax, columns.ymax
            ),
        );
        self.base.set_required_columns(vec![
            columns.id.clone(),
            columns.class.clone(),
            CONFIDENCE_COLUMN.to_string(),
            columns.xmin.clone(),
            columns.ymin.clone(),
            columns.xmax.clone(),
            columns.ymax.clone(),
        ]);
        self.columns = Some(columns);
        true
    }

    fn validate_prediction_format(&self, prediction: &DataTable) -> (bool, String) {
        let missing = self.base.missing_columns(prediction);
        if !missing.is_empty() {
            return (
                false,
                format!(
                    "Missing required columns: [{}]. Expected: [{}]",
                    missing.join(", "),
                    self.base.required_columns().join(", ")
                ),
            );
        }

        let Some(columns) = &self.columns else {
            return (false, "ground truth columns were not detected".to_string());
        };

        for name in [
            columns.xmin.as_str(),
            columns.ymin.as_str(),
            columns.xmax.as_str(),
            columns.ymax.as_str(),
            CONFIDENCE_COLUMN,
        ] {
            let idx = match prediction.column_index(name) {
                Some(idx) => idx,
                None => return (false, format!("Column '{name}' must be numeric")),
            };
            if !prediction.is_numeric_column(idx) {
                return (false, format!("Column '{name}' must be numeric"));
            }
        }

        if let Some(confidence_idx) = prediction.column_index(CONFIDENCE_COLUMN) {
            let in_range = prediction
                .column(confidence_idx)
                .all(|v| v.parse::<f64>().is_ok_and(|c| (0.0..=1.0).contains(&c)));
            if !in_range {
                return (
                    false,
                    "Confidence values must be between 0 and 1".to_string(),
                );
            }
        }

        (true, String::new())
    }

    fn calculate_score(
        &mut self,
        prediction: &DataTable,
        ground_truth: &DataTable,
    ) -> Result<ScoringResult, EngineError> {
        let columns = self.columns.clone().ok_or_else(|| {
            EngineError::InvalidData("ground truth columns were not detected".into())
        })?;

        let ground_truth_boxes = self.parse_boxes(ground_truth)?;
        let predictions = self.parse_predictions(prediction, &columns)?;

        // ground-truth first-appearance order, for deterministic results
        let mut classes: Vec<String> = Vec::new();
        for gt in &ground_truth_boxes {
            if !classes.contains(&gt.class) {
                classes.push(gt.class.clone());
            }
        }
        let predicted_classes = {
            let mut seen: Vec<&str> = Vec::new();
            for p in &predictions {
                if !seen.contains(&p.class.as_str()) {
                    seen.push(&p.class);
                }
            }
            seen.len()
        };
        self.base.log(
            LogLevel::Info,
            format!(
                "GT classes: {}, Pred classes: {}",
                classes.len(),
                predicted_classes
            ),
        );

        let mut metrics = Map::new();
        let score;
        if self.metric_type == MetricType::Map5095 {
            // exact thresholds {0.50, 0.55, ..., 0.95}
            let per_threshold: Vec<f64> = (10..=19)
                .map(|k| {
                    let threshold = k as f64 / 20.0;
                    let aps: Vec<f64> = classes
                        .iter()
                        .map(|class| {
                            Self::class_average_precision(
                                &predictions,
                                &ground_truth_boxes,
                                class,
                                threshold,
                            )
                        })
                        .collect();
                    mean(&aps)
                })
                .collect();
            let map = mean(&per_threshold);
            self.base
                .log(LogLevel::Info, format!("mAP@[0.5:0.95]: {map:.4}"));

            score = round_to(map, 6);
            metrics.insert("mAP_50_95".into(), json!(score));
        } else {
            let mut per_class_ap = Map::new();
            let mut aps = Vec::with_capacity(classes.len());
            for class in &classes {
                let ap = Self::class_average_precision(
                    &predictions,
                    &ground_truth_boxes,
                    class,
                    MAP_IOU_THRESHOLD,
                );
                aps.push(ap);
                per_class_ap.insert(class.clone(), json!(round_to(ap, 4)));
            }
            let map = mean(&aps);
            self.base.log(LogLevel::Info, format!("mAP@0.5: {map:.4}"));

            score = round_to(map, 6);
            metrics.insert("mAP_50".into(), json!(score));
            metrics.insert("per_class_ap".into(), Value::Object(per_class_ap));
        }

        metrics.insert("num_classes".into(), json!(classes.len()));
        metrics.insert("num_predictions".into(), json!(prediction.num_rows()));
        metrics.insert("num_ground_truth".into(), json!(ground_truth.num_rows()));

        Ok(ScoringResult::success(score, Some(metrics), Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{detection_fixture, write_csv};

    #[test]
    fn perfect_single_box_scores_one() {
        let (dir, gt, _pred) = detection_fixture();
        let perfect = write_csv(
            dir.path(),
            "perfect.csv",
            "image_id,class,confidence,xmin,ymin,xmax,ymax\n\
             img1,car,0.9,10,10,50,50\n\
             img1,person,0.8,60,60,90,90\n\
             img2,car,0.7,0,0,40,40\n",
        );
        let mut engine = DetectionEngine::new(&gt, MetricType::Map);

        let result = engine.score(&perfect);
        assert!(result.success);
        assert_eq!(result.score, Some(1.0));

        let metrics = result.metrics.unwrap();
        assert_eq!(metrics["mAP_50"], json!(1.0));
        assert_eq!(metrics["per_class_ap"]["car"], json!(1.0));
        assert_eq!(metrics["per_class_ap"]["person"], json!(1.0));
        assert_eq!(metrics["num_classes"], json!(2));
    }

    #[test]
    fn class_without_predictions_has_zero_ap() {
        let (dir, gt, _pred) = detection_fixture();
        let car_only = write_csv(
            dir.path(),
            "car_only.csv",
            "image_id,class,confidence,xmin,ymin,xmax,ymax\n\
             img1,car,0.9,10,10,50,50\n\
             img2,car,0.7,0,0,40,40\n",
        );
        let mut engine = DetectionEngine::new(&gt, MetricType::Map);

        let result = engine.score(&car_only);
        let metrics = result.metrics.unwrap();
        assert_eq!(metrics["per_class_ap"]["car"], json!(1.0));
        assert_eq!(metrics["per_class_ap"]["person"], json!(0.0));
        assert_eq!(result.score, Some(0.5));
    }

    #[test]
    fn misplaced_boxes_are_false_positives() {
        let (dir, gt, _pred) = detection_fixture();
        let off_target = write_csv(
            dir.path(),
            "off.csv",
            "image_id,class,confidence,xmin,ymin,xmax,ymax\n\
             img1,car,0.9,200,200,240,240\n\
             img1,person,0.8,200,200,240,240\n",
        );
        let mut engine = DetectionEngine::new(&gt, MetricType::Map);

        let result = engine.score(&off_target);
        assert_eq!(result.score, Some(0.0));
    }

    #[test]
    fn one_ground_truth_box_matches_at_most_once() {
        let (dir, _gt, _pred) = detection_fixture();
        let gt = write_csv(
            dir.path(),
            "single_gt.csv",
            "image_id,class,xmin,ymin,xmax,ymax\nimg1,car,10,10,50,50\n",
        );
        // two identical predictions: the second must count as a false positive
        let doubled = write_csv(
            dir.path(),
            "doubled.csv",
            "image_id,class,confidence,xmin,ymin,xmax,ymax\n\
             img1,car,0.9,10,10,50,50\n\
             img1,car,0.8,10,10,50,50\n",
        );
        let mut engine = DetectionEngine::new(&gt, MetricType::Map);

        let result = engine.score(&doubled);
        // precision [1, 0.5], recall [1, 1]: the 11-point AP stays 1.0
        assert_eq!(result.score, Some(1.0));
        assert!(result.success);
    }

    #[test]
    fn map_50_95_averages_over_thresholds() {
        let (dir, gt, _pred) = detection_fixture();
        let perfect = write_csv(
            dir.path(),
            "perfect.csv",
            "image_id,class,confidence,xmin,ymin,xmax,ymax\n\
             img1,car,0.9,10,10,50,50\n\
             img1,person,0.8,60,60,90,90\n\
             img2,car,0.7,0,0,40,40\n",
        );
        let mut engine = DetectionEngine::new(&gt, MetricType::Map5095);

        let result = engine.score(&perfect);
        assert!(result.success);
        // exact matches have IoU 1.0 at every threshold
        assert_eq!(result.score, Some(1.0));
        let metrics = result.metrics.unwrap();
        assert_eq!(metrics["mAP_50_95"], json!(1.0));
        assert!(!metrics.contains_key("per_class_ap"));
    }

    #[test]
    fn non_numeric_bbox_fails_validation() {
        let (dir, gt, _pred) = detection_fixture();
        let bad = write_csv(
            dir.path(),
            "bad.csv",
            "image_id,class,confidence,xmin,ymin,xmax,ymax\nimg1,car,0.9,a,10,50,50\n",
        );
        let mut engine = DetectionEngine::new(&gt, MetricType::Map);

        let result = engine.score(&bad);
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("must be numeric"));
    }

    #[test]
    fn out_of_range_confidence_fails_validation() {
        let (dir, gt, _pred) = detection_fixture();
        let bad = write_csv(
            dir.path(),
            "bad.csv",
            "image_id,class,confidence,xmin,ymin,xmax,ymax\nimg1,car,1.5,10,10,50,50\n",
        );
        let mut engine = DetectionEngine::new(&gt, MetricType::Map);

        let result = engine.score(&bad);
        assert!(!result.success);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Confidence values must be between 0 and 1")
        );
    }

    #[test]
    fn missing_confidence_column_fails_validation() {
        let (dir, gt, _pred) = detection_fixture();
        let bad = write_csv(
            dir.path(),
            "bad.csv",
            "image_id,class,xmin,ymin,xmax,ymax\nimg1,car,10,10,50,50\n",
        );
        let mut engine = DetectionEngine::new(&gt, MetricType::Map);

        let result = engine.score(&bad);
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("confidence"));
    }

    #[test]
    fn narrow_ground_truth_fails_to_load() {
        let (dir, _gt, pred) = detection_fixture();
        let thin = write_csv(dir.path(), "thin.csv", "image_id,class\nimg1,car\n");
        let mut engine = DetectionEngine::new(&thin, MetricType::Map);

        let result = engine.score(&pred);
        assert!(!result.success);
        assert!(result.logs.iter().any(|l| l.contains("at least 6 columns")));
    }
}
