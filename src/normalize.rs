//! Geometric normalization: scale and translate the source so the detected
//! face lands where the country spec demands.

use image::imageops::FilterType;
use image::RgbImage;

use crate::country::CountrySpec;
use crate::error::Rejection;
use crate::face::FaceGeometry;

/// Upscale factor beyond which output quality degrades visibly.
/// Exceeding it is a warning, never fatal.
const MAX_CLEAN_UPSCALE: f32 = 2.0;

/// The spec-sized canvas with the face geometry re-expressed in output
/// coordinates.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// Canvas at the spec's pixel dimensions.
    pub image: RgbImage,
    /// Face geometry in canvas coordinates.
    pub face: FaceGeometry,
    /// Print resolution carried through to the output metadata.
    pub dpi: u32,
    /// Scale factor applied to the source.
    pub scale: f32,
}

impl NormalizedImage {
    /// True when the source had to be enlarged past the clean-upscale
    /// limit; the quality of the result is reduced.
    pub fn upscale_warning(&self) -> bool {
        self.scale > MAX_CLEAN_UPSCALE
    }
}

/// Compute and apply the crop/scale transform aligning `face` to `spec`.
///
/// The transform has two constraints it can satisfy exactly: the face
/// height fraction and the vertical face-center fraction (horizontal
/// centering is implied). Eye level is verified downstream by the
/// evaluator. Rotation is never corrected; the evaluator rejects tilts
/// over its limit instead.
///
/// Fails with [`Rejection::InsufficientMargin`] when the required crop
/// would leave the source image — fabricated border pixels are worse than
/// an honest rejection.
pub fn normalize(
    source: &RgbImage,
    face: &FaceGeometry,
    spec: &CountrySpec,
) -> Result<NormalizedImage, Rejection> {
    let (canvas_w, canvas_h) = spec.canvas_px();
    let (src_w, src_h) = (source.width() as f32, source.height() as f32);

    let target_face_h = spec.face_height_frac * canvas_h as f32;
    let scale = target_face_h / face.bounds.height;

    // Source-space crop window that maps onto the full canvas.
    let crop_w = canvas_w as f32 / scale;
    let crop_h = canvas_h as f32 / scale;
    let center = face.bounds.center();
    let crop_x = center.x - crop_w / 2.0;
    let crop_y = center.y - spec.face_center_frac * crop_h;

    let overrun = [
        -crop_x,
        -crop_y,
        crop_x + crop_w - src_w,
        crop_y + crop_h - src_h,
    ]
    .into_iter()
    .fold(0.0f32, f32::max);
    if overrun > 0.5 {
        return Err(Rejection::InsufficientMargin {
            deficit_px: overrun.ceil() as u32,
        });
    }

    // Clamp sub-pixel slack from rounding, then cut and resample.
    let x = crop_x.max(0.0).round() as u32;
    let y = crop_y.max(0.0).round() as u32;
    let w = (crop_w.round() as u32).min(source.width() - x).max(1);
    let h = (crop_h.round() as u32).min(source.height() - y).max(1);

    let cropped = image::imageops::crop_imm(source, x, y, w, h).to_image();
    let canvas = image::imageops::resize(&cropped, canvas_w, canvas_h, FilterType::Lanczos3);

    // Exact per-axis scale after integer rounding, so the re-expressed
    // geometry matches the resampled pixels.
    let scale_x = canvas_w as f32 / w as f32;
    let scale_y = canvas_h as f32 / h as f32;
    let face_out = face.mapped(x as f32, y as f32, scale_x, scale_y);

    tracing::debug!(
        scale,
        crop_x = x,
        crop_y = y,
        crop_w = w,
        crop_h = h,
        "normalized to {}x{} canvas",
        canvas_w,
        canvas_h
    );

    Ok(NormalizedImage {
        image: canvas,
        face: face_out,
        dpi: spec.dpi,
        scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::country;
    use crate::face::Rect;

    fn flat_source(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, image::Rgb([200, 200, 200]))
    }

    fn face_at(x: f32, y: f32, w: f32, h: f32) -> FaceGeometry {
        FaceGeometry::from_bounds(
            Rect {
                x,
                y,
                width: w,
                height: h,
            },
            0.95,
        )
    }

    #[test]
    fn us_scenario_hits_the_published_numbers() {
        // 600x600 source, face box 300 px tall (50% of source), US spec.
        let spec = country::lookup("US").unwrap();
        let source = flat_source(600, 600);
        let face = face_at(190.0, 150.0, 240.0, 300.0);

        let norm = normalize(&source, &face, spec).unwrap();

        // Scale ≈ 0.69 × 602 / 300 ≈ 1.38
        assert!((norm.scale - 1.38).abs() < 0.02, "scale was {}", norm.scale);
        assert_eq!(norm.image.dimensions(), (602, 602));
        // Normalized face height ≈ 0.69 × 602 ≈ 415 px, ±6 px tolerance.
        let out_h = norm.face.bounds.height;
        assert!((out_h - 415.0).abs() <= 6.0, "face height was {out_h}");
    }

    #[test]
    fn round_trip_face_height_within_one_percent() {
        for code in ["US", "GB", "DE", "CA"] {
            let spec = country::lookup(code).unwrap();
            let source = flat_source(1200, 1500);
            let face = face_at(450.0, 400.0, 300.0, 380.0);

            let norm = normalize(&source, &face, spec).unwrap();
            let (_, canvas_h) = spec.canvas_px();
            let target = spec.face_height_frac * canvas_h as f32;
            let measured = norm.face.bounds.height;
            assert!(
                (measured - target).abs() / target <= 0.01,
                "{code}: measured {measured}, target {target}"
            );
        }
    }

    #[test]
    fn face_center_lands_at_spec_fraction() {
        let spec = country::lookup("US").unwrap();
        let source = flat_source(1000, 1000);
        let face = face_at(350.0, 300.0, 300.0, 360.0);

        let norm = normalize(&source, &face, spec).unwrap();
        let (_, canvas_h) = spec.canvas_px();
        let expected = spec.face_center_frac * canvas_h as f32;
        let actual = norm.face.bounds.center().y;
        assert!(
            (actual - expected).abs() <= canvas_h as f32 * 0.01,
            "center at {actual}, expected {expected}"
        );
    }

    #[test]
    fn tight_framing_is_rejected_not_padded() {
        let spec = country::lookup("US").unwrap();
        // Face fills almost the whole frame: the required crop must leave it.
        let source = flat_source(400, 400);
        let face = face_at(20.0, 10.0, 360.0, 380.0);

        match normalize(&source, &face, spec).unwrap_err() {
            Rejection::InsufficientMargin { deficit_px } => assert!(deficit_px > 0),
            other => panic!("unexpected rejection: {other:?}"),
        }
    }

    #[test]
    fn heavy_upscale_warns_but_succeeds() {
        let spec = country::lookup("US").unwrap();
        // Tiny face: scale = 415 / 100 > 4×.
        let source = flat_source(800, 800);
        let face = face_at(350.0, 350.0, 80.0, 100.0);

        let norm = normalize(&source, &face, spec).unwrap();
        assert!(norm.upscale_warning());
        assert!(norm.scale > MAX_CLEAN_UPSCALE);
    }

    #[test]
    fn downscale_never_warns() {
        let spec = country::lookup("US").unwrap();
        let source = flat_source(3000, 3000);
        let face = face_at(1100.0, 1000.0, 800.0, 1000.0);

        let norm = normalize(&source, &face, spec).unwrap();
        assert!(!norm.upscale_warning());
        assert!(norm.scale < 1.0);
    }
}
