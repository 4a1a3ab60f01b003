use thiserror::Error;

/// Fatal and pre-condition errors.
///
/// Everything here aborts the request before or during the pipeline.
/// Validation-class failures (no face, bad segmentation, ...) are
/// [`Rejection`]s instead: they are folded into a non-compliant
/// [`ComplianceReport`](crate::ComplianceReport) and never surface as errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested country code is not in the registry.
    #[error("unsupported country code: {0}")]
    UnsupportedCountry(String),

    /// The upload is neither JPEG nor PNG.
    #[error("unsupported image format: {0} (expected image/jpeg or image/png)")]
    UnsupportedFormat(String),

    /// The upload exceeds the country's accepted size band.
    #[error("file too large: {size} bytes (maximum {max})")]
    FileTooLarge {
        /// Actual upload size in bytes.
        size: usize,
        /// Accepted maximum in bytes.
        max: usize,
    },

    /// The upload is below the country's accepted size band.
    #[error("file too small: {size} bytes (minimum {min})")]
    FileTooSmall {
        /// Actual upload size in bytes.
        size: usize,
        /// Accepted minimum in bytes.
        min: usize,
    },

    /// The bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The output image could not be encoded.
    #[error("failed to encode image: {0}")]
    Encode(String),

    /// A stage exceeded the pipeline timeout. Internal class; callers may
    /// retry exactly once with the original bytes.
    #[error("pipeline timed out during {0}")]
    Timeout(&'static str),

    /// Detector crash, worker panic, or another unrecoverable fault.
    #[error("internal processing error: {0}")]
    Internal(String),
}

/// Validation-class failures.
///
/// A rejection never propagates as an error: the orchestrator converts it
/// into a failing check inside the compliance report so the caller always
/// gets actionable feedback.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// The detector found no face in the image.
    NoFaceDetected,

    /// The detector found more than one face.
    MultipleFacesDetected(usize),

    /// A single face was found but its confidence is below the threshold.
    LowConfidenceDetection {
        /// Detector confidence in [0, 1].
        confidence: f32,
        /// Required minimum confidence.
        threshold: f32,
    },

    /// The required crop extends past the source image bounds by
    /// `deficit_px` pixels; the subject is framed too tightly.
    InsufficientMargin {
        /// Pixels by which the crop window leaves the source.
        deficit_px: u32,
    },

    /// Classified background pixels vary too much to be a uniform backdrop.
    SegmentationFailed {
        /// Measured background variance.
        variance: f32,
        /// Accepted variance limit.
        limit: f32,
    },
}

impl Rejection {
    /// Human-readable description for the compliance report.
    pub fn message(&self) -> String {
        match self {
            Rejection::NoFaceDetected => "no face detected in the image".to_string(),
            Rejection::MultipleFacesDetected(n) => {
                format!("expected exactly one face, detected {n}")
            }
            Rejection::LowConfidenceDetection {
                confidence,
                threshold,
            } => format!(
                "face detection confidence {confidence:.2} is below the required {threshold:.2}"
            ),
            Rejection::InsufficientMargin { deficit_px } => format!(
                "the photo is framed too tightly: the required crop extends {deficit_px} px past the image edge"
            ),
            Rejection::SegmentationFailed { variance, limit } => format!(
                "background is not uniform enough to segment (variance {variance:.0}, limit {limit:.0})"
            ),
        }
    }

    /// Actionable advice matching this rejection.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Rejection::NoFaceDetected => {
                "Retake the photo facing the camera directly, with the face clearly visible."
            }
            Rejection::MultipleFacesDetected(_) => {
                "Retake the photo with only one person in the frame."
            }
            Rejection::LowConfidenceDetection { .. } => {
                "Improve lighting and remove obstructions (hats, sunglasses) so the face is clearly detectable."
            }
            Rejection::InsufficientMargin { .. } => {
                "Step back from the camera so there is room above the head and around the shoulders."
            }
            Rejection::SegmentationFailed { .. } => {
                "Retake the photo in front of a plain, evenly lit wall."
            }
        }
    }
}
