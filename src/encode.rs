//! Byte-level decode/encode and the image measurements consumed by the
//! technical check.

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageFormat, RgbImage};

use crate::error::Error;

/// A decoded upload: pixels plus the facts about the original bytes that
/// the technical check needs.
#[derive(Debug, Clone)]
pub struct RawImage {
    /// Decoded pixel data.
    pub pixels: RgbImage,
    /// Length of the original upload in bytes.
    pub source_len: usize,
    /// Detected source container format.
    pub format: ImageFormat,
}

/// Detect the container format from raw bytes; only JPEG and PNG pass.
pub fn sniff_format(bytes: &[u8]) -> Result<ImageFormat, Error> {
    let format = image::guess_format(bytes)
        .map_err(|_| Error::UnsupportedFormat("unrecognized image data".to_string()))?;
    match format {
        ImageFormat::Jpeg | ImageFormat::Png => Ok(format),
        other => Err(Error::UnsupportedFormat(format!("{other:?}"))),
    }
}

/// Decode upload bytes into a [`RawImage`].
pub fn decode(bytes: &[u8]) -> Result<RawImage, Error> {
    let format = sniff_format(bytes)?;
    let decoded = image::load_from_memory(bytes).map_err(|e| Error::Decode(e.to_string()))?;
    let pixels = decoded.to_rgb8();
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(Error::Decode("image has zero dimensions".to_string()));
    }
    Ok(RawImage {
        pixels,
        source_len: bytes.len(),
        format,
    })
}

/// Encode the finished canvas as PNG.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, Error> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| Error::Encode(e.to_string()))?;
    Ok(buffer)
}

/// BT.601 luma of one pixel.
pub(crate) fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// Mean luma over the whole image, 0–255.
pub fn mean_luma(image: &RgbImage) -> f32 {
    if image.width() == 0 || image.height() == 0 {
        return 0.0;
    }
    let sum: f64 = image
        .pixels()
        .map(|p| luma(p.0[0], p.0[1], p.0[2]) as f64)
        .sum();
    (sum / (image.width() as f64 * image.height() as f64)) as f32
}

/// Sharpness as the variance of a 4-neighbor Laplacian over luma.
/// Blurry images score low; focused detail scores high.
pub fn laplacian_variance(image: &RgbImage) -> f32 {
    let (w, h) = (image.width(), image.height());
    if w < 3 || h < 3 {
        return 0.0;
    }

    let at = |x: u32, y: u32| {
        let p = image.get_pixel(x, y);
        luma(p.0[0], p.0[1], p.0[2]) as f64
    };

    let mut responses = Vec::with_capacity(((w - 2) * (h - 2)) as usize);
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y);
            responses.push(lap);
        }
    }

    let n = responses.len() as f64;
    let mean = responses.iter().sum::<f64>() / n;
    let variance = responses.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ])
        })
    }

    fn png_bytes(img: &RgbImage) -> Vec<u8> {
        encode_png(img).unwrap()
    }

    #[test]
    fn png_round_trips_through_decode() {
        let bytes = png_bytes(&gradient_image(64, 80));
        let raw = decode(&bytes).unwrap();
        assert_eq!(raw.pixels.dimensions(), (64, 80));
        assert_eq!(raw.format, ImageFormat::Png);
        assert_eq!(raw.source_len, bytes.len());
    }

    #[test]
    fn garbage_bytes_are_unsupported() {
        assert!(matches!(
            sniff_format(b"definitely not an image"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn webp_is_rejected_even_though_decodable() {
        // Minimal RIFF/WEBP header: recognized container, unsupported here.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&[0u8; 4]);
        bytes.extend_from_slice(b"WEBP");
        assert!(matches!(
            sniff_format(&bytes),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn mean_luma_of_flat_image_is_its_luma() {
        let img = RgbImage::from_pixel(10, 10, image::Rgb([100, 100, 100]));
        assert!((mean_luma(&img) - 100.0).abs() < 0.5);
    }

    #[test]
    fn checkerboard_is_sharper_than_flat() {
        let flat = RgbImage::from_pixel(32, 32, image::Rgb([128, 128, 128]));
        let checker = RgbImage::from_fn(32, 32, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgb([255, 255, 255])
            } else {
                image::Rgb([0, 0, 0])
            }
        });
        assert_eq!(laplacian_variance(&flat), 0.0);
        assert!(laplacian_variance(&checker) > 1000.0);
    }
}
