use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Writes `content` as `name` inside `dir` and returns the full path.
pub fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Five-row labeling task with three matching predictions (accuracy 0.6).
/// Returns `(tempdir, ground_truth, prediction)`; keep the tempdir alive
/// for as long as the paths are used.
pub fn classification_fixture() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let gt = write_csv(
        dir.path(),
        "gt.csv",
        "image_id,label\n1,cat\n2,dog\n3,cat\n4,bird\n5,dog\n",
    );
    let pred = write_csv(
        dir.path(),
        "pred.csv",
        "image_id,label\n1,cat\n2,dog\n3,dog\n4,bird\n5,cat\n",
    );
    (dir, gt, pred)
}

/// Two images, two classes, three boxes; the prediction reproduces every
/// box exactly, so both mAP variants score 1.0.
pub fn detection_fixture() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let gt = write_csv(
        dir.path(),
        "gt.csv",
        "image_id,class,xmin,ymin,xmax,ymax\n\
         img1,car,10,10,50,50\n\
         img1,person,60,60,90,90\n\
         img2,car,0,0,40,40\n",
    );
    let pred = write_csv(
        dir.path(),
        "pred.csv",
        "image_id,class,confidence,xmin,ymin,xmax,ymax\n\
         img1,car,0.9,10,10,50,50\n\
         img1,person,0.8,60,60,90,90\n\
         img2,car,0.7,0,0,40,40\n",
    );
    (dir, gt, pred)
}

/// Two 4x4 masks, one per image and class; the prediction matches both,
/// so mIoU is 1.0.
pub fn segmentation_fixture() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let gt = write_csv(
        dir.path(),
        "gt.csv",
        "image_id,class,rle_mask,height,width\n\
         img1,cat,1 4,4,4\n\
         img2,dog,5 2,4,4\n",
    );
    let pred = write_csv(
        dir.path(),
        "pred.csv",
        "image_id,class,rle_mask\nimg1,cat,1 4\nimg2,dog,5 2\n",
    );
    (dir, gt, pred)
}
