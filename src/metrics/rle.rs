/// Binary mask for one image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    height: usize,
    width: usize,
    data: Vec<bool>,
}

impl Mask {
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            data: vec![false; height * width],
        }
    }

    /// Builds a mask from row-major pixels; panics if the length does not
    /// match `height * width`, so only fixture code should use it.
    pub fn from_pixels(height: usize, width: usize, pixels: Vec<bool>) -> Self {
        assert_eq!(pixels.len(), height * width);
        Self {
            height,
            width,
            data: pixels,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.data
            .get(row * self.width + col)
            .copied()
            .unwrap_or(false)
    }

    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        let idx = row * self.width + col;
        if idx < self.data.len() {
            self.data[idx] = value;
        }
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|p| **p).count()
    }

    fn flat(&self) -> &[bool] {
        &self.data
    }
}

/// Decodes a run-length string into a mask.
///
/// The format is space-separated `start length` pairs over the row-major
/// flattened mask, 1-indexed, covering foreground runs only. Empty, blank
/// and `"0"` strings decode to an all-zero mask; malformed strings (odd
/// pair count, non-integer tokens) also decode to all-zero rather than
/// failing the scoring run. Runs reaching outside the mask are skipped.
pub fn rle_decode(rle: &str, height: usize, width: usize) -> Mask {
    let mut mask = Mask::zeros(height, width);
    let trimmed = rle.trim();
    if trimmed.is_empty() || trimmed == "0" {
        return mask;
    }

    let mut tokens = Vec::new();
    for raw in trimmed.split_whitespace() {
        match raw.parse::<i64>() {
            Ok(value) => tokens.push(value),
            Err(_) => return mask,
        }
    }
    if tokens.len() % 2 != 0 {
        return mask;
    }

    let size = (height * width) as i64;
    for pair in tokens.chunks(2) {
        let start = pair[0] - 1;
        let length = pair[1];
        if start >= 0 && length > 0 && start + length <= size {
            for i in start..start + length {
                mask.data[i as usize] = true;
            }
        }
    }
    mask
}

/// Encodes a mask as space-separated 1-indexed `start length` pairs;
/// an empty mask encodes to the empty string.
pub fn rle_encode(mask: &Mask) -> String {
    let flat = mask.flat();
    let mut runs: Vec<String> = Vec::new();
    let mut i = 0;
    while i < flat.len() {
        if flat[i] {
            let start = i + 1;
            let mut length = 0;
            while i < flat.len() && flat[i] {
                length += 1;
                i += 1;
            }
            runs.push(start.to_string());
            runs.push(length.to_string());
        } else {
            i += 1;
        }
    }
    runs.join(" ")
}

/// IoU over boolean masks. An empty union counts as a perfect match
/// (1.0) when the intersection is also empty, else 0.0.
pub fn mask_iou(a: &Mask, b: &Mask) -> f64 {
    let len = a.flat().len().max(b.flat().len());
    let mut intersection = 0usize;
    let mut union = 0usize;
    for i in 0..len {
        let pa = a.flat().get(i).copied().unwrap_or(false);
        let pb = b.flat().get(i).copied().unwrap_or(false);
        if pa && pb {
            intersection += 1;
        }
        if pa || pb {
            union += 1;
        }
    }

    if union == 0 {
        if intersection == 0 { 1.0 } else { 0.0 }
    } else {
        intersection as f64 / union as f64
    }
}
