//! Compliance checks and the report model.
//!
//! Four independent, side-effect-free checks score the processed photo
//! against the country spec. The verdict is the AND of per-category
//! passes; the weighted score is a diagnostic number for the user, never
//! the gate.

use image::RgbImage;
use serde::Serialize;

use crate::country::CountrySpec;
use crate::encode::{laplacian_variance, luma, mean_luma, RawImage};
use crate::error::Rejection;
use crate::normalize::NormalizedImage;
use crate::segment::SegmentationResult;

/// Maximum accepted in-plane head tilt, degrees.
pub const MAX_TILT_DEGREES: f32 = 15.0;
/// Accepted deviation of the measured face-height fraction.
const FACE_HEIGHT_TOLERANCE: f32 = 0.04;
/// Accepted deviation of the vertical face-center fraction.
const FACE_CENTER_TOLERANCE: f32 = 0.05;
/// Accepted deviation of the eye-level fraction.
const EYE_LEVEL_TOLERANCE: f32 = 0.05;
/// Minimum luma separation between subject and background.
const MIN_BACKGROUND_CONTRAST: f32 = 30.0;
/// Mean per-channel distance accepted between the composited background
/// and the spec color.
const BACKGROUND_COLOR_TOLERANCE: f32 = 12.0;
/// Minimum backdrop uniformity confidence.
const MIN_UNIFORMITY: f32 = 0.5;

/// The fixed check categories, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckCategory {
    /// Source resolution, size band, format, sharpness, brightness.
    Technical,
    /// Exactly-one-face invariant.
    FaceCount,
    /// Tilt, face height, centering, eye level, eye visibility.
    FaceQuality,
    /// Backdrop uniformity, color match, subject contrast.
    Background,
}

impl CheckCategory {
    /// Report order. Fixed: reports must be deterministic regardless of
    /// which check finishes first.
    pub const ORDER: [CheckCategory; 4] = [
        CheckCategory::Technical,
        CheckCategory::FaceCount,
        CheckCategory::FaceQuality,
        CheckCategory::Background,
    ];

    /// Aggregate weight of this category; the four weights sum to 100.
    pub fn weight(self) -> u32 {
        match self {
            CheckCategory::Technical => 20,
            CheckCategory::FaceCount => 25,
            CheckCategory::FaceQuality => 30,
            CheckCategory::Background => 25,
        }
    }

    fn rank(self) -> usize {
        Self::ORDER
            .iter()
            .position(|c| *c == self)
            .unwrap_or(Self::ORDER.len())
    }
}

/// Result of one category check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceCheck {
    /// Which category this check scored.
    pub category: CheckCategory,
    /// Whether the category passed.
    pub valid: bool,
    /// 0–100, fraction of sub-checks passed.
    pub score: u8,
    /// What was measured, or which sub-checks failed.
    pub message: String,
    /// Advice shown when the check fails. Not part of the per-check JSON
    /// shape; collected into the report's suggestion list.
    #[serde(skip)]
    pub suggestion: Option<String>,
}

impl ComplianceCheck {
    /// A passing check.
    pub fn pass(category: CheckCategory, message: impl Into<String>) -> Self {
        ComplianceCheck {
            category,
            valid: true,
            score: 100,
            message: message.into(),
            suggestion: None,
        }
    }

    /// A failing check with its advice.
    pub fn fail(
        category: CheckCategory,
        score: u8,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        ComplianceCheck {
            category,
            valid: false,
            score: score.min(100),
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// A failing check synthesized from a validation rejection.
    pub fn from_rejection(category: CheckCategory, rejection: &Rejection) -> Self {
        ComplianceCheck::fail(category, 0, rejection.message(), rejection.suggestion())
    }
}

/// Aggregate verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overall {
    /// AND of every per-category pass.
    pub compliant: bool,
    /// Weighted diagnostic score, 0–100.
    pub score: u8,
}

/// The full report returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    /// Aggregate verdict and score.
    pub overall: Overall,
    /// Per-category results in fixed order.
    pub checks: Vec<ComplianceCheck>,
    /// Actionable advice collected from the failing checks.
    pub suggestions: Vec<String>,
}

impl ComplianceReport {
    /// Assemble a report from checks in any completion order.
    ///
    /// Checks are sorted into the fixed category order, the weighted score
    /// sums the weights of passing categories, and the verdict is the AND
    /// of every per-category pass.
    pub fn assemble(mut checks: Vec<ComplianceCheck>) -> Self {
        checks.sort_by_key(|c| c.category.rank());

        let score: u32 = checks
            .iter()
            .filter(|c| c.valid)
            .map(|c| c.category.weight())
            .sum();
        let compliant = !checks.is_empty() && checks.iter().all(|c| c.valid);
        let mut suggestions: Vec<String> = checks
            .iter()
            .filter(|c| !c.valid)
            .filter_map(|c| c.suggestion.clone())
            .collect();
        // Adjacent categories can fail for the same root cause.
        suggestions.dedup();

        ComplianceReport {
            overall: Overall {
                compliant,
                score: score.min(100) as u8,
            },
            checks,
            suggestions,
        }
    }

    /// Serialize to the wire JSON shape.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Technical check: source resolution, file-size band, container format,
/// sharpness, and brightness. Needs only the raw upload, so the
/// orchestrator runs it alongside face location.
pub fn technical_check(raw: &RawImage, spec: &CountrySpec) -> ComplianceCheck {
    let mut failures: Vec<(String, String)> = Vec::new();
    let mut total = 0u32;

    let (w, h) = raw.pixels.dimensions();
    total += 1;
    if w < spec.min_source_width || h < spec.min_source_height {
        failures.push((
            format!(
                "resolution {w}x{h} is below the required {}x{}",
                spec.min_source_width, spec.min_source_height
            ),
            "Use a higher-resolution photo or a camera with more megapixels.".to_string(),
        ));
    }

    total += 1;
    if raw.source_len < spec.min_file_bytes || raw.source_len > spec.max_file_bytes {
        failures.push((
            format!(
                "file size {} bytes is outside the accepted band {}-{}",
                raw.source_len, spec.min_file_bytes, spec.max_file_bytes
            ),
            "Re-export the photo at a standard quality setting.".to_string(),
        ));
    }

    total += 1;
    if !matches!(raw.format, image::ImageFormat::Jpeg | image::ImageFormat::Png) {
        failures.push((
            format!("container format {:?} is not accepted", raw.format),
            "Save the photo as JPEG or PNG.".to_string(),
        ));
    }

    total += 1;
    let sharpness = laplacian_variance(&raw.pixels);
    if sharpness < spec.min_sharpness {
        failures.push((
            format!(
                "sharpness {sharpness:.0} is below the required {:.0}",
                spec.min_sharpness
            ),
            "Hold the camera steady and make sure the face is in focus.".to_string(),
        ));
    }

    total += 1;
    let brightness = mean_luma(&raw.pixels);
    let (lo, hi) = spec.brightness_band;
    if brightness < lo || brightness > hi {
        failures.push((
            format!("brightness {brightness:.0} is outside the accepted band {lo:.0}-{hi:.0}"),
            "Retake the photo with even, natural lighting.".to_string(),
        ));
    }

    finish_check(CheckCategory::Technical, total, failures, || {
        "image meets the technical requirements".to_string()
    })
}

/// Face-count check: re-validates the exactly-one-face invariant the
/// locator already resolved.
pub fn face_count_check(rejection: Option<&Rejection>) -> ComplianceCheck {
    match rejection {
        None => ComplianceCheck::pass(CheckCategory::FaceCount, "exactly one face detected"),
        Some(r) => ComplianceCheck::from_rejection(CheckCategory::FaceCount, r),
    }
}

/// Face-quality check: head tilt, face-height fraction, vertical centering,
/// eye level, and both eyes inside the frame, all measured on the
/// normalized canvas.
pub fn face_quality_check(norm: &NormalizedImage, spec: &CountrySpec) -> ComplianceCheck {
    let mut failures: Vec<(String, String)> = Vec::new();
    let mut total = 0u32;
    let canvas_h = norm.image.height() as f32;
    let canvas_w = norm.image.width() as f32;

    total += 1;
    let tilt = norm.face.angle_degrees;
    if tilt.abs() > MAX_TILT_DEGREES {
        failures.push((
            format!(
                "head orientation is tilted {tilt:.0}\u{b0}, more than the allowed {MAX_TILT_DEGREES:.0}\u{b0}"
            ),
            "Keep the head straight and level with the camera.".to_string(),
        ));
    }

    total += 1;
    let height_frac = norm.face.bounds.height / canvas_h;
    if (height_frac - spec.face_height_frac).abs() > FACE_HEIGHT_TOLERANCE {
        failures.push((
            format!(
                "face height is {:.0}% of the photo, required {:.0}%",
                height_frac * 100.0,
                spec.face_height_frac * 100.0
            ),
            "Adjust the distance to the camera so the face fills the required portion.".to_string(),
        ));
    }

    total += 1;
    let center_frac = norm.face.bounds.center().y / canvas_h;
    if (center_frac - spec.face_center_frac).abs() > FACE_CENTER_TOLERANCE {
        failures.push((
            format!(
                "face center sits at {:.0}% from the top, required {:.0}%",
                center_frac * 100.0,
                spec.face_center_frac * 100.0
            ),
            "Center the face vertically in the frame.".to_string(),
        ));
    }

    total += 1;
    let eye_frac = norm.face.eye_level() / canvas_h;
    if (eye_frac - spec.eye_level_frac).abs() > EYE_LEVEL_TOLERANCE {
        failures.push((
            format!(
                "eye level sits at {:.0}% from the top, required {:.0}%",
                eye_frac * 100.0,
                spec.eye_level_frac * 100.0
            ),
            "Position the eyes at the required height in the frame.".to_string(),
        ));
    }

    total += 1;
    let eyes = [norm.face.landmarks.left_eye, norm.face.landmarks.right_eye];
    let eyes_visible = eyes
        .iter()
        .all(|p| p.x >= 0.0 && p.x <= canvas_w && p.y >= 0.0 && p.y <= canvas_h);
    if !eyes_visible {
        failures.push((
            "both eyes must be inside the frame".to_string(),
            "Face the camera directly with both eyes open and visible.".to_string(),
        ));
    }

    finish_check(CheckCategory::FaceQuality, total, failures, || {
        "face geometry meets the requirements".to_string()
    })
}

/// Background check: backdrop uniformity, color match against the spec,
/// and subject/background contrast, measured on the composited canvas.
pub fn background_check(
    composited: &RgbImage,
    segmentation: &SegmentationResult,
    spec: &CountrySpec,
) -> ComplianceCheck {
    let mut failures: Vec<(String, String)> = Vec::new();
    let mut total = 0u32;

    total += 1;
    let uniformity = segmentation.uniformity();
    if uniformity < MIN_UNIFORMITY {
        failures.push((
            format!("background uniformity {uniformity:.2} is below the required {MIN_UNIFORMITY:.2}"),
            "Retake the photo in front of a plain, evenly lit wall.".to_string(),
        ));
    }

    // Mean color and luma split by the mask.
    let mut bg_sum = [0.0f64; 3];
    let mut bg_luma = 0.0f64;
    let mut bg_count = 0u64;
    let mut fg_luma = 0.0f64;
    let mut fg_count = 0u64;
    for (x, y, p) in composited.enumerate_pixels() {
        if segmentation.mask.get_pixel(x, y).0[0] < 128 {
            for c in 0..3 {
                bg_sum[c] += p.0[c] as f64;
            }
            bg_luma += luma(p.0[0], p.0[1], p.0[2]) as f64;
            bg_count += 1;
        } else {
            fg_luma += luma(p.0[0], p.0[1], p.0[2]) as f64;
            fg_count += 1;
        }
    }

    total += 1;
    if bg_count > 0 {
        let distance: f64 = (0..3)
            .map(|c| (bg_sum[c] / bg_count as f64 - spec.background[c] as f64).abs())
            .sum::<f64>()
            / 3.0;
        if distance > BACKGROUND_COLOR_TOLERANCE as f64 {
            failures.push((
                format!(
                    "background color deviates {distance:.0} levels from the required #{:02X}{:02X}{:02X}",
                    spec.background[0], spec.background[1], spec.background[2]
                ),
                "Use a backdrop matching the required background color.".to_string(),
            ));
        }
    } else {
        failures.push((
            "no background region could be measured".to_string(),
            "Retake the photo with clear space around the head and shoulders.".to_string(),
        ));
    }

    total += 1;
    if bg_count > 0 && fg_count > 0 {
        let contrast = (bg_luma / bg_count as f64 - fg_luma / fg_count as f64).abs();
        if contrast < MIN_BACKGROUND_CONTRAST as f64 {
            failures.push((
                format!(
                    "subject/background contrast {contrast:.0} is below the required {MIN_BACKGROUND_CONTRAST:.0}"
                ),
                "Wear clothing that stands out from the background.".to_string(),
            ));
        }
    }

    finish_check(CheckCategory::Background, total, failures, || {
        format!(
            "background is uniform and matches the required color ({} method)",
            segmentation.method.as_str()
        )
    })
}

fn finish_check(
    category: CheckCategory,
    total: u32,
    failures: Vec<(String, String)>,
    pass_message: impl FnOnce() -> String,
) -> ComplianceCheck {
    if failures.is_empty() {
        return ComplianceCheck::pass(category, pass_message());
    }
    let passed = total.saturating_sub(failures.len() as u32);
    let score = (passed * 100 / total.max(1)) as u8;
    let message = failures
        .iter()
        .map(|(m, _)| m.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    // One suggestion per failing check: lead with the first failure's advice.
    let suggestion = failures
        .into_iter()
        .map(|(_, s)| s)
        .next()
        .unwrap_or_default();
    ComplianceCheck::fail(category, score, message, suggestion)
}
