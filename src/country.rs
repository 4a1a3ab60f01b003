//! Country passport-photo specifications.
//!
//! One immutable table, built into the binary, looked up by ISO 3166-1
//! alpha-2 code. Entries are value structs with `'static` lifetime so the
//! registry is safe for concurrent reads with no synchronization.

use crate::error::Error;

/// Millimeters per inch, for deriving pixel dimensions from physical sizes.
const MM_PER_INCH: f32 = 25.4;

/// Passport photo requirements for one country.
///
/// All fractions are relative to the output canvas height, measured from
/// the top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountrySpec {
    /// ISO 3166-1 alpha-2 code, uppercase.
    pub code: &'static str,
    /// Country name for messages.
    pub name: &'static str,
    /// Physical photo width in millimeters.
    pub width_mm: f32,
    /// Physical photo height in millimeters.
    pub height_mm: f32,
    /// Print resolution.
    pub dpi: u32,
    /// Required face (chin-to-crown) height as a fraction of canvas height.
    pub face_height_frac: f32,
    /// Required eye-line position as a fraction of canvas height.
    pub eye_level_frac: f32,
    /// Required vertical face-center position as a fraction of canvas height.
    pub face_center_frac: f32,
    /// Required uniform background color (sRGB).
    pub background: [u8; 3],
    /// Minimum acceptable source resolution.
    pub min_source_width: u32,
    /// Minimum acceptable source resolution.
    pub min_source_height: u32,
    /// Accepted upload size band in bytes.
    pub min_file_bytes: usize,
    /// Accepted upload size band in bytes.
    pub max_file_bytes: usize,
    /// Minimum Laplacian-variance sharpness.
    pub min_sharpness: f32,
    /// Accepted mean-luma band (0–255).
    pub brightness_band: (f32, f32),
}

impl CountrySpec {
    /// Output canvas size in pixels, derived from the physical dimensions
    /// and DPI.
    pub fn canvas_px(&self) -> (u32, u32) {
        let w = (self.width_mm / MM_PER_INCH * self.dpi as f32).round() as u32;
        let h = (self.height_mm / MM_PER_INCH * self.dpi as f32).round() as u32;
        (w.max(1), h.max(1))
    }
}

/// Shared quality thresholds used by most entries. Individual fields are
/// overridden per country where authorities differ.
const COMMON_MIN_FILE_BYTES: usize = 10 * 1024;
const COMMON_MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
const COMMON_MIN_SHARPNESS: f32 = 60.0;
const COMMON_BRIGHTNESS_BAND: (f32, f32) = (70.0, 200.0);

/// The registry: one entry per supported country, never mutated.
static SPECS: &[CountrySpec] = &[
    CountrySpec {
        code: "US",
        name: "United States",
        width_mm: 51.0,
        height_mm: 51.0,
        dpi: 300,
        face_height_frac: 0.69,
        eye_level_frac: 0.35,
        face_center_frac: 0.42,
        background: [0xFF, 0xFF, 0xFF],
        min_source_width: 600,
        min_source_height: 600,
        min_file_bytes: COMMON_MIN_FILE_BYTES,
        max_file_bytes: COMMON_MAX_FILE_BYTES,
        min_sharpness: COMMON_MIN_SHARPNESS,
        brightness_band: COMMON_BRIGHTNESS_BAND,
    },
    CountrySpec {
        code: "GB",
        name: "United Kingdom",
        width_mm: 35.0,
        height_mm: 45.0,
        dpi: 300,
        face_height_frac: 0.70,
        eye_level_frac: 0.40,
        face_center_frac: 0.47,
        background: [0xF0, 0xF0, 0xF0],
        min_source_width: 413,
        min_source_height: 531,
        min_file_bytes: COMMON_MIN_FILE_BYTES,
        max_file_bytes: COMMON_MAX_FILE_BYTES,
        min_sharpness: COMMON_MIN_SHARPNESS,
        brightness_band: COMMON_BRIGHTNESS_BAND,
    },
    CountrySpec {
        code: "DE",
        name: "Germany",
        width_mm: 35.0,
        height_mm: 45.0,
        dpi: 300,
        face_height_frac: 0.75,
        eye_level_frac: 0.45,
        face_center_frac: 0.53,
        background: [0xC8, 0xC8, 0xC8],
        min_source_width: 413,
        min_source_height: 531,
        min_file_bytes: COMMON_MIN_FILE_BYTES,
        max_file_bytes: COMMON_MAX_FILE_BYTES,
        min_sharpness: COMMON_MIN_SHARPNESS,
        brightness_band: COMMON_BRIGHTNESS_BAND,
    },
    CountrySpec {
        code: "FR",
        name: "France",
        width_mm: 35.0,
        height_mm: 45.0,
        dpi: 300,
        face_height_frac: 0.72,
        eye_level_frac: 0.42,
        face_center_frac: 0.49,
        background: [0xE8, 0xE8, 0xE8],
        min_source_width: 413,
        min_source_height: 531,
        min_file_bytes: COMMON_MIN_FILE_BYTES,
        max_file_bytes: COMMON_MAX_FILE_BYTES,
        min_sharpness: COMMON_MIN_SHARPNESS,
        brightness_band: COMMON_BRIGHTNESS_BAND,
    },
    CountrySpec {
        code: "CA",
        name: "Canada",
        width_mm: 50.0,
        height_mm: 70.0,
        dpi: 300,
        face_height_frac: 0.45,
        eye_level_frac: 0.38,
        face_center_frac: 0.43,
        background: [0xFF, 0xFF, 0xFF],
        min_source_width: 591,
        min_source_height: 827,
        min_file_bytes: COMMON_MIN_FILE_BYTES,
        max_file_bytes: COMMON_MAX_FILE_BYTES,
        min_sharpness: COMMON_MIN_SHARPNESS,
        brightness_band: COMMON_BRIGHTNESS_BAND,
    },
    CountrySpec {
        code: "AU",
        name: "Australia",
        width_mm: 35.0,
        height_mm: 45.0,
        dpi: 300,
        face_height_frac: 0.71,
        eye_level_frac: 0.41,
        face_center_frac: 0.48,
        background: [0xF5, 0xF5, 0xF5],
        min_source_width: 413,
        min_source_height: 531,
        min_file_bytes: COMMON_MIN_FILE_BYTES,
        max_file_bytes: COMMON_MAX_FILE_BYTES,
        min_sharpness: COMMON_MIN_SHARPNESS,
        brightness_band: COMMON_BRIGHTNESS_BAND,
    },
    CountrySpec {
        code: "IN",
        name: "India",
        width_mm: 51.0,
        height_mm: 51.0,
        dpi: 300,
        face_height_frac: 0.70,
        eye_level_frac: 0.38,
        face_center_frac: 0.45,
        background: [0xFF, 0xFF, 0xFF],
        min_source_width: 600,
        min_source_height: 600,
        min_file_bytes: COMMON_MIN_FILE_BYTES,
        max_file_bytes: COMMON_MAX_FILE_BYTES,
        min_sharpness: COMMON_MIN_SHARPNESS,
        brightness_band: COMMON_BRIGHTNESS_BAND,
    },
    CountrySpec {
        code: "JP",
        name: "Japan",
        width_mm: 35.0,
        height_mm: 45.0,
        dpi: 300,
        face_height_frac: 0.72,
        eye_level_frac: 0.42,
        face_center_frac: 0.49,
        background: [0xFF, 0xFF, 0xFF],
        min_source_width: 413,
        min_source_height: 531,
        min_file_bytes: COMMON_MIN_FILE_BYTES,
        max_file_bytes: COMMON_MAX_FILE_BYTES,
        min_sharpness: COMMON_MIN_SHARPNESS,
        brightness_band: COMMON_BRIGHTNESS_BAND,
    },
    CountrySpec {
        code: "BR",
        name: "Brazil",
        width_mm: 50.0,
        height_mm: 70.0,
        dpi: 300,
        face_height_frac: 0.47,
        eye_level_frac: 0.39,
        face_center_frac: 0.44,
        background: [0xFF, 0xFF, 0xFF],
        min_source_width: 591,
        min_source_height: 827,
        min_file_bytes: COMMON_MIN_FILE_BYTES,
        max_file_bytes: COMMON_MAX_FILE_BYTES,
        min_sharpness: COMMON_MIN_SHARPNESS,
        brightness_band: COMMON_BRIGHTNESS_BAND,
    },
];

/// Look up the spec for a country code (case-insensitive).
pub fn lookup(code: &str) -> Result<&'static CountrySpec, Error> {
    SPECS
        .iter()
        .find(|spec| spec.code.eq_ignore_ascii_case(code))
        .ok_or_else(|| Error::UnsupportedCountry(code.to_string()))
}

/// Codes of every supported country, in table order.
pub fn supported_codes() -> impl Iterator<Item = &'static str> {
    SPECS.iter().map(|spec| spec.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn us_spec_matches_published_requirements() {
        let us = lookup("US").unwrap();
        assert_eq!(us.background, [0xFF, 0xFF, 0xFF]);
        assert!((us.face_height_frac - 0.69).abs() < f32::EPSILON);
        assert!((us.eye_level_frac - 0.35).abs() < f32::EPSILON);
        // 51 mm at 300 DPI ≈ 602 px square
        assert_eq!(us.canvas_px(), (602, 602));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("us").unwrap().code, "US");
        assert_eq!(lookup("gB").unwrap().code, "GB");
    }

    #[test]
    fn unknown_code_is_rejected() {
        let err = lookup("ZZ").unwrap_err();
        assert!(matches!(err, Error::UnsupportedCountry(code) if code == "ZZ"));
    }

    #[test]
    fn all_entries_are_internally_consistent() {
        for spec in super::SPECS {
            let (w, h) = spec.canvas_px();
            assert!(w > 0 && h > 0, "{}: empty canvas", spec.code);
            assert!(
                spec.face_height_frac > 0.0 && spec.face_height_frac < 1.0,
                "{}: face height fraction out of range",
                spec.code
            );
            // Eyes sit above the face center in every real spec.
            assert!(
                spec.eye_level_frac < spec.face_center_frac + spec.face_height_frac / 2.0,
                "{}: eye level below the face box",
                spec.code
            );
            assert!(spec.min_file_bytes < spec.max_file_bytes, "{}", spec.code);
            assert!(
                spec.brightness_band.0 < spec.brightness_band.1,
                "{}",
                spec.code
            );
        }
    }

    #[test]
    fn supported_codes_lists_the_table() {
        let codes: Vec<_> = supported_codes().collect();
        assert!(codes.contains(&"US"));
        assert!(codes.contains(&"DE"));
        assert_eq!(codes.len(), super::SPECS.len());
    }
}
