/// Axis-aligned bounding box in a per-image coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn area(&self) -> f64 {
        (self.xmax - self.xmin) * (self.ymax - self.ymin)
    }

    /// Intersection over union with `other`; 0.0 when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let x1 = self.xmin.max(other.xmin);
        let y1 = self.ymin.max(other.ymin);
        let x2 = self.xmax.min(other.xmax);
        let y2 = self.ymax.min(other.ymax);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union == 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Average precision by 11-point interpolation.
///
/// `precision[i]`/`recall[i]` are the cumulative values after the i-th
/// ranked prediction. The precision envelope is made monotonically
/// non-increasing from the right, then averaged over the recall
/// thresholds {0.0, 0.1, ..., 1.0}.
pub fn average_precision(precision: &[f64], recall: &[f64]) -> f64 {
    if precision.is_empty() || recall.is_empty() {
        return 0.0;
    }

    let mut p = Vec::with_capacity(precision.len() + 2);
    p.push(0.0);
    p.extend_from_slice(precision);
    p.push(0.0);

    let mut r = Vec::with_capacity(recall.len() + 2);
    r.push(0.0);
    r.extend_from_slice(recall);
    r.push(1.0);

    for i in (0..p.len() - 1).rev() {
        p[i] = p[i].max(p[i + 1]);
    }

    let mut ap = 0.0;
    for step in 0..=10 {
        let threshold = step as f64 / 10.0;
        let best = r
            .iter()
            .zip(&p)
            .filter(|(rec, _)| **rec >= threshold)
            .map(|(_, prec)| *prec)
            .fold(0.0, f64::max);
        ap += best / 11.0;
    }
    ap
}
