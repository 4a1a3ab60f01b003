//! Passport photo processing: detect the face, segment the background,
//! normalize the geometry to a country's requirements, and score the
//! result into a compliance report.
//!
//! # Example
//!
//! ```no_run
//! use passfoto::{MethodSelection, Mode, Pipeline, ProcessRequest};
//! # use passfoto::{FaceDetector, FaceGeometry};
//! # struct MyDetector;
//! # impl FaceDetector for MyDetector {
//! #     fn detect_faces(&self, _: &[u8], _: u32, _: u32) -> Vec<FaceGeometry> { vec![] }
//! # }
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let pipeline = Pipeline::builder(Box::new(MyDetector)).build();
//! let output = pipeline
//!     .process(ProcessRequest {
//!         image_bytes: std::fs::read("photo.jpg")?,
//!         mime_type: "image/jpeg".to_string(),
//!         country_code: "US".to_string(),
//!         method: MethodSelection::Auto,
//!         mode: Mode::Full,
//!     })
//!     .await?;
//! println!("{}", output.report.to_json()?);
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]

/// Country specification registry.
pub mod country;
mod encode;
mod error;
/// Face geometry types, the detector trait, and the single-face locator.
pub mod face;
mod normalize;
mod pipeline;
#[cfg(feature = "rustface")]
/// Built-in SeetaFace-based face detector backend.
pub mod rustface_backend;
/// Deterministic background segmentation.
pub mod segment;

mod evaluate;

pub use country::CountrySpec;
pub use error::{Error, Rejection};
pub use evaluate::{CheckCategory, ComplianceCheck, ComplianceReport, Overall};
pub use face::{FaceDetector, FaceGeometry, FaceLocator, Landmarks, Point, Rect};
pub use normalize::NormalizedImage;
pub use pipeline::{
    Mode, OutputMetadata, Pipeline, PipelineBuilder, ProcessOutput, ProcessRequest,
    DEFAULT_TIMEOUT,
};
#[cfg(feature = "rustface")]
pub use rustface_backend::RustfaceDetector;
pub use segment::{MethodSelection, SegmentationMethod, SegmentationResult};
