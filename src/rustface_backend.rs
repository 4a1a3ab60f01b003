use std::path::Path;

use crate::error::Error;
use crate::face::{FaceDetector, FaceGeometry, Rect};

/// Face detector backed by the `rustface` crate (SeetaFace engine).
///
/// Loads a SeetaFace frontal model from disk on construction, so deployments
/// can swap models without rebuilding.
pub struct RustfaceDetector {
    model: rustface::Model,
}

impl RustfaceDetector {
    /// Load a SeetaFace model file (e.g. `seeta_fd_frontal_v1.0.bin`).
    pub fn from_model_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            Error::Internal(format!(
                "failed to read face model {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let model = rustface::read_model(std::io::Cursor::new(bytes))
            .map_err(|e| Error::Internal(format!("failed to parse face model: {e}")))?;
        Ok(Self { model })
    }
}

/// SeetaFace reports an unbounded classifier score; squash it into the
/// [0, 1] confidence the locator expects. A score of 3 maps to 0.5 and
/// typical confident detections (score 10+) land above 0.75.
fn normalize_score(score: f64) -> f32 {
    let s = score.max(0.0) as f32;
    s / (s + 3.0)
}

impl FaceDetector for RustfaceDetector {
    fn detect_faces(&self, gray: &[u8], width: u32, height: u32) -> Vec<FaceGeometry> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(20);
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(gray, width, height));

        faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceGeometry::from_bounds(
                    Rect {
                        x: bbox.x() as f32,
                        y: bbox.y() as f32,
                        width: bbox.width() as f32,
                        height: bbox.height() as f32,
                    },
                    normalize_score(face.score()),
                )
            })
            .collect()
    }
}
