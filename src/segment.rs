//! Deterministic background segmentation.
//!
//! Three classical methods — chroma key, edge flood fill, and luminance
//! (Otsu) thresholding — plus automatic selection from border samples.
//! No learned models: authorities reject AI-retouched backgrounds, so the
//! pipeline stays with reproducible pixel classification.

use std::collections::VecDeque;
use std::str::FromStr;

use image::{GrayImage, RgbImage};

use crate::encode::luma;
use crate::error::Rejection;
use crate::face::Rect;

/// Mask value for subject pixels.
const SUBJECT: u8 = 255;
/// Mask value for background pixels.
const BACKGROUND: u8 = 0;

/// Maximum per-channel color variance of classified background pixels
/// before the backdrop is declared non-uniform.
pub const UNIFORMITY_VARIANCE_LIMIT: f32 = 1200.0;

/// Hue tolerance for chroma keying, degrees.
const CHROMA_HUE_TOLERANCE: f32 = 18.0;
/// Minimum saturation for a pixel to count as chroma background.
const CHROMA_SAT_MIN: f32 = 0.25;
/// Value tolerance used when keying against an unsaturated (white/grey)
/// backdrop, where hue is meaningless.
const CHROMA_VALUE_TOLERANCE: f32 = 0.15;
/// Sobel gradient magnitude above which a pixel is an edge.
const EDGE_GRADIENT_THRESHOLD: f32 = 60.0;
/// Border-vs-center luma contrast that makes flood fill the best choice.
const EDGE_CONTRAST_MIN: f32 = 50.0;
/// Feather width at the mask boundary, pixels.
const FEATHER_RADIUS: u32 = 2;
/// Side length of the corner sample patches.
const CORNER_PATCH: u32 = 8;
/// Height of the top-strip sample.
const TOP_STRIP_ROWS: u32 = 8;

/// A concrete segmentation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationMethod {
    /// HSV distance from the sampled backdrop color.
    ChromaKey,
    /// Gradient edge map plus border flood fill.
    EdgeFloodFill,
    /// Otsu luminance threshold.
    LuminanceThreshold,
}

impl SegmentationMethod {
    /// Short name used in report messages and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentationMethod::ChromaKey => "chroma",
            SegmentationMethod::EdgeFloodFill => "edge",
            SegmentationMethod::LuminanceThreshold => "luminance",
        }
    }
}

/// Caller's method choice: a fixed algorithm, or automatic selection from
/// the border samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodSelection {
    /// Sample the corners and top strip, then pick the best-suited method.
    #[default]
    Auto,
    /// Use exactly this method.
    Fixed(SegmentationMethod),
}

impl FromStr for MethodSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(MethodSelection::Auto),
            "chroma" => Ok(MethodSelection::Fixed(SegmentationMethod::ChromaKey)),
            "edge" => Ok(MethodSelection::Fixed(SegmentationMethod::EdgeFloodFill)),
            "luminance" => Ok(MethodSelection::Fixed(SegmentationMethod::LuminanceThreshold)),
            other => Err(format!(
                "unknown segmentation method {other:?} (expected chroma, edge, luminance, or auto)"
            )),
        }
    }
}

/// Segmentation output: an alpha mask the same size as its source image,
/// the method that produced it, and how uniform the backdrop was.
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    /// 255 = subject, 0 = background, feathered in between at the boundary.
    pub mask: GrayImage,
    /// The method actually used (resolved from `Auto` where applicable).
    pub method: SegmentationMethod,
    /// Per-channel color variance of classified background pixels.
    pub background_variance: f32,
}

impl SegmentationResult {
    /// Uniformity confidence in [0, 1]; 1.0 means a perfectly flat backdrop.
    pub fn uniformity(&self) -> f32 {
        (1.0 - self.background_variance / UNIFORMITY_VARIANCE_LIMIT).clamp(0.0, 1.0)
    }
}

/// Average color and HSV statistics of the four corners and top strip.
#[derive(Debug, Clone, Copy)]
struct BorderSample {
    hue: f32,
    saturation: f32,
    value: f32,
    luma: f32,
    /// Per-channel color variance of the sampled border region itself.
    /// High values mean the corners disagree about the backdrop color.
    variance: f32,
}

/// Classify background pixels and produce a feathered alpha mask.
///
/// The feather never reaches inside `face_bounds`, so facial-edge pixels
/// keep their hard classification. Fails with
/// [`Rejection::SegmentationFailed`] when the classified background is too
/// varied to be a uniform backdrop.
pub fn segment(
    image: &RgbImage,
    face_bounds: &Rect,
    selection: MethodSelection,
) -> Result<SegmentationResult, Rejection> {
    let sample = sample_border(image);
    let method = match selection {
        MethodSelection::Fixed(m) => m,
        MethodSelection::Auto => choose_method(image, &sample),
    };
    tracing::debug!(method = method.as_str(), "segmenting background");

    let binary = match method {
        SegmentationMethod::ChromaKey => chroma_mask(image, &sample),
        SegmentationMethod::EdgeFloodFill => flood_mask(image),
        SegmentationMethod::LuminanceThreshold => luminance_mask(image, &sample),
    };
    let binary = open3(&binary);

    // Two ways a backdrop fails: the classified background pixels vary too
    // much, or the border region the classification was anchored on is
    // itself not one color (corner-sample disagreement).
    let background_variance = background_variance(image, &binary).max(sample.variance);
    if background_variance > UNIFORMITY_VARIANCE_LIMIT {
        return Err(Rejection::SegmentationFailed {
            variance: background_variance,
            limit: UNIFORMITY_VARIANCE_LIMIT,
        });
    }

    let mask = feather(&binary, face_bounds);
    debug_assert_eq!(mask.dimensions(), image.dimensions());

    Ok(SegmentationResult {
        mask,
        method,
        background_variance,
    })
}

/// Composite the subject over a uniform replacement background using the
/// mask's alpha ramp.
pub fn composite(image: &RgbImage, mask: &GrayImage, background: [u8; 3]) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let alpha = mask.get_pixel(x, y).0[0] as f32 / 255.0;
        let inv = 1.0 - alpha;
        let blend = |src: u8, bg: u8| (src as f32 * alpha + bg as f32 * inv).round() as u8;
        out.put_pixel(
            x,
            y,
            image::Rgb([
                blend(pixel.0[0], background[0]),
                blend(pixel.0[1], background[1]),
                blend(pixel.0[2], background[2]),
            ]),
        );
    }
    out
}

fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    (hue, saturation, max)
}

fn hue_distance(a: f32, b: f32) -> f32 {
    let d = (a - b).abs() % 360.0;
    d.min(360.0 - d)
}

fn sample_border(image: &RgbImage) -> BorderSample {
    let (w, h) = image.dimensions();
    let patch = CORNER_PATCH.min(w.max(1)).min(h.max(1));
    let strip = TOP_STRIP_ROWS.min(h.max(1));

    let mut sum = [0.0f64; 3];
    let mut sq_sum = [0.0f64; 3];
    let mut count = 0u64;
    let mut push = |x: u32, y: u32| {
        let p = image.get_pixel(x, y);
        for c in 0..3 {
            let v = p.0[c] as f64;
            sum[c] += v;
            sq_sum[c] += v * v;
        }
        count += 1;
    };

    for dy in 0..patch {
        for dx in 0..patch {
            push(dx, dy);
            push(w - 1 - dx, dy);
            push(dx, h - 1 - dy);
            push(w - 1 - dx, h - 1 - dy);
        }
    }
    for y in 0..strip {
        for x in 0..w {
            push(x, y);
        }
    }

    let n = count.max(1) as f64;
    let mean = [
        (sum[0] / n) as f32,
        (sum[1] / n) as f32,
        (sum[2] / n) as f32,
    ];
    let variance: f64 = (0..3)
        .map(|c| sq_sum[c] / n - (sum[c] / n).powi(2))
        .sum::<f64>()
        / 3.0;
    let (hue, saturation, value) = rgb_to_hsv(
        mean[0].round() as u8,
        mean[1].round() as u8,
        mean[2].round() as u8,
    );
    BorderSample {
        hue,
        saturation,
        value,
        luma: luma(
            mean[0].round() as u8,
            mean[1].round() as u8,
            mean[2].round() as u8,
        ),
        variance: variance as f32,
    }
}

/// Mean luma of the central quarter of the image, where the subject sits.
fn center_luma(image: &RgbImage) -> f32 {
    let (w, h) = image.dimensions();
    let (x0, y0) = (w / 4, h / 4);
    let (x1, y1) = (3 * w / 4, 3 * h / 4);
    let mut sum = 0.0f64;
    let mut count = 0u64;
    for y in y0..y1.max(y0 + 1) {
        for x in x0..x1.max(x0 + 1) {
            let p = image.get_pixel(x, y);
            sum += luma(p.0[0], p.0[1], p.0[2]) as f64;
            count += 1;
        }
    }
    (sum / count.max(1) as f64) as f32
}

/// Pick the method best suited to the sampled backdrop: saturated corner
/// colors key cleanly, strong border/center contrast flood-fills cleanly,
/// and neutral studio backdrops threshold cleanly.
fn choose_method(image: &RgbImage, sample: &BorderSample) -> SegmentationMethod {
    if sample.saturation >= CHROMA_SAT_MIN {
        SegmentationMethod::ChromaKey
    } else if (sample.luma - center_luma(image)).abs() >= EDGE_CONTRAST_MIN {
        SegmentationMethod::EdgeFloodFill
    } else {
        SegmentationMethod::LuminanceThreshold
    }
}

/// Key background pixels against the sampled backdrop color in HSV.
fn chroma_mask(image: &RgbImage, sample: &BorderSample) -> GrayImage {
    let keyed_saturated = sample.saturation >= CHROMA_SAT_MIN;
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        let (h, s, v) = rgb_to_hsv(p.0[0], p.0[1], p.0[2]);
        let is_background = if keyed_saturated {
            s >= CHROMA_SAT_MIN && hue_distance(h, sample.hue) <= CHROMA_HUE_TOLERANCE
        } else {
            // White/grey backdrop: hue carries no signal, match on
            // low saturation and similar brightness.
            s < CHROMA_SAT_MIN && (v - sample.value).abs() <= CHROMA_VALUE_TOLERANCE
        };
        image::Luma(if is_background { [BACKGROUND] } else { [SUBJECT] })
    })
}

/// Sobel gradient magnitude over luma.
fn gradient_magnitude(image: &RgbImage) -> Vec<f32> {
    let (w, h) = image.dimensions();
    let at = |x: i64, y: i64| {
        let x = x.clamp(0, w as i64 - 1) as u32;
        let y = y.clamp(0, h as i64 - 1) as u32;
        let p = image.get_pixel(x, y);
        luma(p.0[0], p.0[1], p.0[2])
    };

    let mut mag = vec![0.0f32; (w * h) as usize];
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let gx = at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1)
                - at(x - 1, y - 1)
                - 2.0 * at(x - 1, y)
                - at(x - 1, y + 1);
            let gy = at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1)
                - at(x - 1, y - 1)
                - 2.0 * at(x, y - 1)
                - at(x + 1, y - 1);
            mag[(y as u32 * w + x as u32) as usize] = (gx * gx + gy * gy).sqrt();
        }
    }
    mag
}

/// Flood from the image border inward, stopping at gradient edges; every
/// reached pixel is background.
fn flood_mask(image: &RgbImage) -> GrayImage {
    let (w, h) = image.dimensions();
    let mag = gradient_magnitude(image);
    let is_edge = |x: u32, y: u32| mag[(y * w + x) as usize] > EDGE_GRADIENT_THRESHOLD;

    let mut background = vec![false; (w * h) as usize];
    let mut queue = VecDeque::new();

    let mut seed = |x: u32, y: u32, queue: &mut VecDeque<(u32, u32)>, bg: &mut Vec<bool>| {
        let idx = (y * w + x) as usize;
        if !bg[idx] && !is_edge(x, y) {
            bg[idx] = true;
            queue.push_back((x, y));
        }
    };
    for x in 0..w {
        seed(x, 0, &mut queue, &mut background);
        seed(x, h - 1, &mut queue, &mut background);
    }
    for y in 0..h {
        seed(0, y, &mut queue, &mut background);
        seed(w - 1, y, &mut queue, &mut background);
    }

    while let Some((x, y)) = queue.pop_front() {
        let neighbors = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbors {
            if nx < w && ny < h {
                let idx = (ny * w + nx) as usize;
                if !background[idx] && !is_edge(nx, ny) {
                    background[idx] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        image::Luma(if background[(y * w + x) as usize] {
            [BACKGROUND]
        } else {
            [SUBJECT]
        })
    })
}

/// Otsu's method: the threshold maximizing inter-class variance of the
/// luma histogram.
fn otsu_threshold(histogram: &[u64; 256]) -> u8 {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 128;
    }
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(v, &c)| v as f64 * c as f64)
        .sum();

    let mut best_threshold = 128u8;
    let mut best_variance = -1.0f64;
    let mut background_count = 0u64;
    let mut background_sum = 0.0f64;

    for t in 0..256usize {
        background_count += histogram[t];
        if background_count == 0 {
            continue;
        }
        let foreground_count = total - background_count;
        if foreground_count == 0 {
            break;
        }
        background_sum += t as f64 * histogram[t] as f64;

        let mean_bg = background_sum / background_count as f64;
        let mean_fg = (weighted_total - background_sum) / foreground_count as f64;
        let between = background_count as f64 * foreground_count as f64 * (mean_bg - mean_fg).powi(2);
        if between > best_variance {
            best_variance = between;
            best_threshold = t as u8;
        }
    }
    best_threshold
}

/// Threshold on luma; the side of the threshold the border sample falls on
/// is the background side.
fn luminance_mask(image: &RgbImage, sample: &BorderSample) -> GrayImage {
    let mut histogram = [0u64; 256];
    for p in image.pixels() {
        let l = luma(p.0[0], p.0[1], p.0[2]).round().clamp(0.0, 255.0) as usize;
        histogram[l] += 1;
    }
    let threshold = otsu_threshold(&histogram) as f32;
    let background_is_bright = sample.luma > threshold;

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        let bright = luma(p.0[0], p.0[1], p.0[2]) > threshold;
        image::Luma(if bright == background_is_bright {
            [BACKGROUND]
        } else {
            [SUBJECT]
        })
    })
}

/// 3×3 binary open (erode then dilate) on the subject mask, removing
/// speckle noise without shifting real boundaries.
fn open3(mask: &GrayImage) -> GrayImage {
    let eroded = morph3(mask, u8::min);
    morph3(&eroded, u8::max)
}

fn morph3(mask: &GrayImage, fold: fn(u8, u8) -> u8) -> GrayImage {
    let (w, h) = mask.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut acc = mask.get_pixel(x, y).0[0];
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let nx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
                let ny = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
                acc = fold(acc, mask.get_pixel(nx, ny).0[0]);
            }
        }
        image::Luma([acc])
    })
}

/// Replace the hard mask boundary with a short alpha ramp, except inside
/// the face box where the binary classification is kept.
fn feather(binary: &GrayImage, face_bounds: &Rect) -> GrayImage {
    let (w, h) = binary.dimensions();
    let r = FEATHER_RADIUS as i64;
    GrayImage::from_fn(w, h, |x, y| {
        let inside_face = x as f32 >= face_bounds.x
            && x as f32 <= face_bounds.x + face_bounds.width
            && y as f32 >= face_bounds.y
            && y as f32 <= face_bounds.y + face_bounds.height;
        if inside_face {
            return *binary.get_pixel(x, y);
        }

        let mut sum = 0u32;
        let mut count = 0u32;
        for dy in -r..=r {
            for dx in -r..=r {
                let nx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
                let ny = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
                sum += binary.get_pixel(nx, ny).0[0] as u32;
                count += 1;
            }
        }
        image::Luma([(sum / count) as u8])
    })
}

/// Per-channel variance of pixels the binary mask classified as background,
/// averaged across channels.
fn background_variance(image: &RgbImage, binary: &GrayImage) -> f32 {
    let mut sum = [0.0f64; 3];
    let mut sq_sum = [0.0f64; 3];
    let mut count = 0u64;
    for (x, y, p) in image.enumerate_pixels() {
        if binary.get_pixel(x, y).0[0] == BACKGROUND {
            for c in 0..3 {
                let v = p.0[c] as f64;
                sum[c] += v;
                sq_sum[c] += v * v;
            }
            count += 1;
        }
    }
    if count == 0 {
        // Nothing classified as background at all: treat as non-uniform.
        return f32::INFINITY;
    }
    let n = count as f64;
    let variance: f64 = (0..3)
        .map(|c| sq_sum[c] / n - (sum[c] / n).powi(2))
        .sum::<f64>()
        / 3.0;
    variance as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Green backdrop with a centered grey subject block.
    fn green_screen_portrait(w: u32, h: u32) -> (RgbImage, Rect) {
        let face = Rect {
            x: w as f32 * 0.3,
            y: h as f32 * 0.2,
            width: w as f32 * 0.4,
            height: h as f32 * 0.5,
        };
        let img = RgbImage::from_fn(w, h, |x, y| {
            let inside = x as f32 >= face.x
                && x as f32 <= face.x + face.width
                && y as f32 >= face.y
                && y as f32 <= face.y + face.height;
            if inside {
                image::Rgb([150, 120, 100])
            } else {
                image::Rgb([0, 255, 0])
            }
        });
        (img, face)
    }

    /// Neutral bright backdrop with a dark subject block.
    fn studio_portrait(w: u32, h: u32) -> (RgbImage, Rect) {
        let face = Rect {
            x: w as f32 * 0.3,
            y: h as f32 * 0.25,
            width: w as f32 * 0.4,
            height: h as f32 * 0.5,
        };
        let img = RgbImage::from_fn(w, h, |x, y| {
            let inside = x as f32 >= face.x
                && x as f32 <= face.x + face.width
                && y as f32 >= face.y
                && y as f32 <= face.y + face.height;
            if inside {
                image::Rgb([70, 55, 50])
            } else {
                image::Rgb([235, 235, 235])
            }
        });
        (img, face)
    }

    #[test]
    fn auto_selects_chroma_for_pure_green_corners() {
        let (img, face) = green_screen_portrait(160, 200);
        let result = segment(&img, &face, MethodSelection::Auto).unwrap();
        assert_eq!(result.method, SegmentationMethod::ChromaKey);
    }

    #[test]
    fn chroma_mask_matches_manual_count_within_two_percent() {
        let (img, face) = green_screen_portrait(160, 200);
        let result = segment(&img, &face, MethodSelection::Auto).unwrap();

        // Manual threshold: every pure-green pixel is background.
        let manual = img.pixels().filter(|p| p.0 == [0, 255, 0]).count() as f32;
        let masked = result
            .mask
            .pixels()
            .filter(|p| p.0[0] < SUBJECT / 2)
            .count() as f32;
        let total = (img.width() * img.height()) as f32;
        assert!(
            (manual - masked).abs() / total <= 0.02,
            "manual {manual}, masked {masked}"
        );
    }

    #[test]
    fn flat_green_background_is_uniform() {
        let (img, face) = green_screen_portrait(160, 200);
        let result = segment(&img, &face, MethodSelection::Auto).unwrap();
        assert!(result.uniformity() > 0.9);
        assert!(result.background_variance < 100.0);
    }

    #[test]
    fn auto_classifies_neutral_studio_backdrop_as_background() {
        let (img, face) = studio_portrait(160, 200);
        let result = segment(&img, &face, MethodSelection::Auto).unwrap();
        // Bright neutral backdrop, moderate contrast: luminance or edge are
        // both defensible, but the backdrop must classify as background.
        let corner = result.mask.get_pixel(2, 2).0[0];
        assert!(corner < SUBJECT / 2, "corner classified as subject");
    }

    #[test]
    fn explicit_edge_method_segments_high_contrast_subject() {
        let (img, face) = studio_portrait(160, 200);
        let result = segment(
            &img,
            &face,
            MethodSelection::Fixed(SegmentationMethod::EdgeFloodFill),
        )
        .unwrap();
        assert_eq!(result.method, SegmentationMethod::EdgeFloodFill);
        // Center of the subject block stays subject.
        let center = result
            .mask
            .get_pixel(img.width() / 2, img.height() / 2)
            .0[0];
        assert_eq!(center, SUBJECT);
        // Far corner is background.
        assert_eq!(result.mask.get_pixel(1, 1).0[0], BACKGROUND);
    }

    #[test]
    fn textured_wallpaper_fails_segmentation() {
        let face = Rect {
            x: 48.0,
            y: 50.0,
            width: 64.0,
            height: 100.0,
        };
        // Noisy checker background: variance far above any uniform backdrop.
        let img = RgbImage::from_fn(160, 200, |x, y| {
            let inside =
                x as f32 >= face.x && x as f32 <= 112.0 && y as f32 >= face.y && y as f32 <= 150.0;
            if inside {
                image::Rgb([120, 100, 90])
            } else if (x / 4 + y / 4) % 2 == 0 {
                image::Rgb([230, 230, 230])
            } else {
                image::Rgb([40, 40, 40])
            }
        });
        match segment(&img, &face, MethodSelection::Auto).unwrap_err() {
            Rejection::SegmentationFailed { variance, limit } => {
                assert!(variance > limit);
            }
            other => panic!("unexpected rejection: {other:?}"),
        }
    }

    #[test]
    fn mask_dimensions_match_source() {
        let (img, face) = green_screen_portrait(123, 177);
        let result = segment(&img, &face, MethodSelection::Auto).unwrap();
        assert_eq!(result.mask.dimensions(), img.dimensions());
    }

    #[test]
    fn feather_never_enters_the_face_box() {
        let (img, face) = green_screen_portrait(160, 200);
        let result = segment(&img, &face, MethodSelection::Auto).unwrap();
        for (x, y, p) in result.mask.enumerate_pixels() {
            let inside = x as f32 >= face.x
                && x as f32 <= face.x + face.width
                && y as f32 >= face.y
                && y as f32 <= face.y + face.height;
            if inside {
                assert!(
                    p.0[0] == SUBJECT || p.0[0] == BACKGROUND,
                    "feathered value {} inside face box at ({x},{y})",
                    p.0[0]
                );
            }
        }
    }

    #[test]
    fn composite_replaces_background_with_spec_color() {
        let (img, face) = green_screen_portrait(160, 200);
        let result = segment(&img, &face, MethodSelection::Auto).unwrap();
        let out = composite(&img, &result.mask, [255, 255, 255]);
        // Corner was pure green, now the replacement white.
        assert_eq!(out.get_pixel(1, 1).0, [255, 255, 255]);
        // Subject center untouched.
        let center = out.get_pixel(img.width() / 2, img.height() / 2);
        assert_eq!(center.0, [150, 120, 100]);
    }

    #[test]
    fn otsu_splits_a_bimodal_histogram() {
        let mut histogram = [0u64; 256];
        histogram[40] = 1000;
        histogram[200] = 1000;
        let t = otsu_threshold(&histogram);
        assert!((40..200).contains(&t), "threshold was {t}");
    }

    #[test]
    fn method_selection_parses_contract_strings() {
        assert_eq!(
            "auto".parse::<MethodSelection>().unwrap(),
            MethodSelection::Auto
        );
        assert_eq!(
            "chroma".parse::<MethodSelection>().unwrap(),
            MethodSelection::Fixed(SegmentationMethod::ChromaKey)
        );
        assert_eq!(
            "edge".parse::<MethodSelection>().unwrap(),
            MethodSelection::Fixed(SegmentationMethod::EdgeFloodFill)
        );
        assert_eq!(
            "luminance".parse::<MethodSelection>().unwrap(),
            MethodSelection::Fixed(SegmentationMethod::LuminanceThreshold)
        );
        assert!("ai".parse::<MethodSelection>().is_err());
    }

    #[test]
    fn open_removes_isolated_speckles() {
        let mut mask = GrayImage::from_pixel(32, 32, image::Luma([BACKGROUND]));
        mask.put_pixel(16, 16, image::Luma([SUBJECT])); // lone speck
        let opened = open3(&mask);
        assert_eq!(opened.get_pixel(16, 16).0[0], BACKGROUND);
    }
}
