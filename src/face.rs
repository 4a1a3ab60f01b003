//! Face geometry data model, the pluggable detector trait, and the locator
//! that enforces the exactly-one-face invariant.

use image::RgbImage;
use serde::Serialize;

use crate::error::Rejection;

/// Default minimum detection confidence accepted by [`FaceLocator`].
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.8;

/// A point in image coordinates (pixels, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

/// Axis-aligned bounding box in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Box width.
    pub width: f32,
    /// Box height.
    pub height: f32,
}

impl Rect {
    /// Center of the box.
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// Whether `p` lies inside the box (edges inclusive).
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

/// The four landmark points the pipeline relies on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Landmarks {
    /// Center of the subject's left eye (viewer's left).
    pub left_eye: Point,
    /// Center of the subject's right eye (viewer's right).
    pub right_eye: Point,
    /// Nose tip.
    pub nose: Point,
    /// Mouth center.
    pub mouth: Point,
}

/// Canonical landmark positions as fractions of the face bounding box,
/// used when a backend reports only a box.
const CANONICAL_LEFT_EYE: (f32, f32) = (0.30, 0.40);
const CANONICAL_RIGHT_EYE: (f32, f32) = (0.70, 0.40);
const CANONICAL_NOSE: (f32, f32) = (0.50, 0.60);
const CANONICAL_MOUTH: (f32, f32) = (0.50, 0.80);

impl Landmarks {
    /// Estimate landmarks from a bounding box alone.
    pub fn estimated(bounds: &Rect) -> Self {
        let at = |(fx, fy): (f32, f32)| Point {
            x: bounds.x + fx * bounds.width,
            y: bounds.y + fy * bounds.height,
        };
        Landmarks {
            left_eye: at(CANONICAL_LEFT_EYE),
            right_eye: at(CANONICAL_RIGHT_EYE),
            nose: at(CANONICAL_NOSE),
            mouth: at(CANONICAL_MOUTH),
        }
    }

    /// Midpoint of the eye line.
    pub fn eye_level(&self) -> f32 {
        (self.left_eye.y + self.right_eye.y) / 2.0
    }

    /// In-plane rotation of the eye line, degrees. Positive = clockwise.
    pub fn eye_angle_degrees(&self) -> f32 {
        let dx = self.right_eye.x - self.left_eye.x;
        let dy = self.right_eye.y - self.left_eye.y;
        dy.atan2(dx).to_degrees()
    }
}

/// A single detected face: bounding box, landmarks, in-plane rotation,
/// and detection confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceGeometry {
    /// Face bounding box in image coordinates.
    pub bounds: Rect,
    /// Eye, nose, and mouth positions.
    pub landmarks: Landmarks,
    /// In-plane rotation in degrees, derived from the eye line.
    pub angle_degrees: f32,
    /// Detector confidence, normalized to [0, 1].
    pub confidence: f32,
}

impl FaceGeometry {
    /// Build a geometry from a bounding box alone, estimating landmarks
    /// at their canonical positions.
    pub fn from_bounds(bounds: Rect, confidence: f32) -> Self {
        let landmarks = Landmarks::estimated(&bounds);
        FaceGeometry {
            bounds,
            angle_degrees: landmarks.eye_angle_degrees(),
            landmarks,
            confidence,
        }
    }

    /// Build a geometry from a box plus measured landmarks; the rotation
    /// angle is derived from the eye line.
    pub fn with_landmarks(bounds: Rect, landmarks: Landmarks, confidence: f32) -> Self {
        FaceGeometry {
            bounds,
            angle_degrees: landmarks.eye_angle_degrees(),
            landmarks,
            confidence,
        }
    }

    /// Eye-line y coordinate.
    pub fn eye_level(&self) -> f32 {
        self.landmarks.eye_level()
    }

    /// Re-express this geometry after a translate-then-scale transform:
    /// every coordinate becomes `(v - offset) * scale`, per axis.
    pub fn mapped(&self, offset_x: f32, offset_y: f32, scale_x: f32, scale_y: f32) -> Self {
        let map = |p: Point| Point {
            x: (p.x - offset_x) * scale_x,
            y: (p.y - offset_y) * scale_y,
        };
        FaceGeometry {
            bounds: Rect {
                x: (self.bounds.x - offset_x) * scale_x,
                y: (self.bounds.y - offset_y) * scale_y,
                width: self.bounds.width * scale_x,
                height: self.bounds.height * scale_y,
            },
            landmarks: Landmarks {
                left_eye: map(self.landmarks.left_eye),
                right_eye: map(self.landmarks.right_eye),
                nose: map(self.landmarks.nose),
                mouth: map(self.landmarks.mouth),
            },
            angle_degrees: self.angle_degrees,
            confidence: self.confidence,
        }
    }
}

/// Pluggable face detection backend.
///
/// Implementations receive a row-major grayscale buffer and return every
/// face they find; the caller resolves how many faces are acceptable.
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a `width` × `height` grayscale buffer.
    fn detect_faces(&self, gray: &[u8], width: u32, height: u32) -> Vec<FaceGeometry>;
}

/// Resolves detector output into exactly one face or a [`Rejection`].
pub struct FaceLocator {
    detector: Box<dyn FaceDetector>,
    threshold: f32,
}

impl FaceLocator {
    /// Wrap a detector with the given confidence threshold.
    pub fn new(detector: Box<dyn FaceDetector>, threshold: f32) -> Self {
        FaceLocator {
            detector,
            threshold,
        }
    }

    /// The confidence threshold in force.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Locate exactly one face in the image.
    ///
    /// Zero detections, multiple detections, and a sub-threshold single
    /// detection are all rejections, not errors: the orchestrator folds
    /// them into the report.
    pub fn locate(&self, image: &RgbImage) -> Result<FaceGeometry, Rejection> {
        let gray = image::imageops::grayscale(image);
        let faces = self
            .detector
            .detect_faces(gray.as_raw(), gray.width(), gray.height());

        tracing::debug!(count = faces.len(), "face detection complete");

        match faces.len() {
            0 => Err(Rejection::NoFaceDetected),
            1 => {
                let face = faces.into_iter().next().ok_or(Rejection::NoFaceDetected)?;
                if face.confidence < self.threshold {
                    Err(Rejection::LowConfidenceDetection {
                        confidence: face.confidence,
                        threshold: self.threshold,
                    })
                } else {
                    Ok(face)
                }
            }
            n => Err(Rejection::MultipleFacesDetected(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDetector(Vec<FaceGeometry>);

    impl FaceDetector for FixedDetector {
        fn detect_faces(&self, _gray: &[u8], _w: u32, _h: u32) -> Vec<FaceGeometry> {
            self.0.clone()
        }
    }

    fn face(confidence: f32) -> FaceGeometry {
        FaceGeometry::from_bounds(
            Rect {
                x: 100.0,
                y: 80.0,
                width: 120.0,
                height: 150.0,
            },
            confidence,
        )
    }

    fn test_image() -> RgbImage {
        RgbImage::from_pixel(320, 320, image::Rgb([128, 128, 128]))
    }

    #[test]
    fn one_good_face_is_accepted() {
        let locator = FaceLocator::new(
            Box::new(FixedDetector(vec![face(0.95)])),
            DEFAULT_CONFIDENCE_THRESHOLD,
        );
        let found = locator.locate(&test_image()).unwrap();
        assert!((found.confidence - 0.95).abs() < f32::EPSILON);
        assert!(found.confidence <= 1.0);
    }

    #[test]
    fn zero_faces_is_rejected() {
        let locator = FaceLocator::new(
            Box::new(FixedDetector(vec![])),
            DEFAULT_CONFIDENCE_THRESHOLD,
        );
        assert_eq!(
            locator.locate(&test_image()).unwrap_err(),
            Rejection::NoFaceDetected
        );
    }

    #[test]
    fn two_faces_is_rejected() {
        let locator = FaceLocator::new(
            Box::new(FixedDetector(vec![face(0.9), face(0.85)])),
            DEFAULT_CONFIDENCE_THRESHOLD,
        );
        assert_eq!(
            locator.locate(&test_image()).unwrap_err(),
            Rejection::MultipleFacesDetected(2)
        );
    }

    #[test]
    fn confidence_just_under_threshold_is_rejected() {
        let locator = FaceLocator::new(
            Box::new(FixedDetector(vec![face(0.79)])),
            DEFAULT_CONFIDENCE_THRESHOLD,
        );
        match locator.locate(&test_image()).unwrap_err() {
            Rejection::LowConfidenceDetection {
                confidence,
                threshold,
            } => {
                assert!((confidence - 0.79).abs() < 1e-6);
                assert!((threshold - 0.8).abs() < 1e-6);
            }
            other => panic!("unexpected rejection: {other:?}"),
        }
    }

    #[test]
    fn estimated_landmarks_sit_inside_the_box() {
        let bounds = Rect {
            x: 50.0,
            y: 60.0,
            width: 100.0,
            height: 140.0,
        };
        let lm = Landmarks::estimated(&bounds);
        for p in [lm.left_eye, lm.right_eye, lm.nose, lm.mouth] {
            assert!(bounds.contains(p), "{p:?} outside {bounds:?}");
        }
        // Eyes above nose above mouth.
        assert!(lm.eye_level() < lm.nose.y);
        assert!(lm.nose.y < lm.mouth.y);
    }

    #[test]
    fn level_eyes_have_zero_angle() {
        let bounds = Rect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        };
        let face = FaceGeometry::from_bounds(bounds, 1.0);
        assert!(face.angle_degrees.abs() < 1e-6);
    }

    #[test]
    fn tilted_eyes_report_their_angle() {
        let lm = Landmarks {
            left_eye: Point { x: 30.0, y: 40.0 },
            right_eye: Point { x: 70.0, y: 54.6 }, // ~20° tilt over 40 px
            nose: Point { x: 50.0, y: 60.0 },
            mouth: Point { x: 50.0, y: 80.0 },
        };
        let angle = lm.eye_angle_degrees();
        assert!((angle - 20.0).abs() < 0.5, "angle was {angle}");
    }

    #[test]
    fn mapped_scales_and_translates_every_point() {
        let face = face(1.0);
        let out = face.mapped(50.0, 40.0, 2.0, 2.0);
        assert!((out.bounds.x - 100.0).abs() < 1e-4);
        assert!((out.bounds.y - 80.0).abs() < 1e-4);
        assert!((out.bounds.width - 240.0).abs() < 1e-4);
        assert!((out.bounds.height - 300.0).abs() < 1e-4);
        assert!((out.eye_level() - (face.eye_level() - 40.0) * 2.0).abs() < 1e-3);
        // Confidence and angle survive the transform untouched.
        assert_eq!(out.confidence, face.confidence);
        assert_eq!(out.angle_degrees, face.angle_degrees);
    }
}
