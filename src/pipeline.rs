//! The pipeline orchestrator.
//!
//! Owns the raw image for the duration of one request and sequences
//! decode, face location, normalization, segmentation, and scoring.
//! Validation failures become failing checks in the report; only
//! pre-condition and internal errors propagate as [`Error`].

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task;

use crate::country::{self, CountrySpec};
use crate::encode::{self, RawImage};
use crate::error::{Error, Rejection};
use crate::evaluate::{
    background_check, face_count_check, face_quality_check, technical_check, CheckCategory,
    ComplianceCheck, ComplianceReport,
};
use crate::face::{FaceDetector, FaceGeometry, FaceLocator, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::normalize::{self, NormalizedImage};
use crate::segment::{self, MethodSelection};

/// Default whole-pipeline timeout for the CPU-bound stages.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether a failing stage ends the request early or the remaining checks
/// still run for complete feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Stop at the first failing stage and return a partial report.
    FailFast,
    /// Run every check that still has usable input.
    #[default]
    Full,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail-fast" => Ok(Mode::FailFast),
            "full" => Ok(Mode::Full),
            other => Err(format!(
                "unknown mode {other:?} (expected fail-fast or full)"
            )),
        }
    }
}

/// One processing request, as handed over by the upload layer.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    /// Raw upload bytes (JPEG or PNG).
    pub image_bytes: Vec<u8>,
    /// Declared MIME type; must be `image/jpeg` or `image/png`. The actual
    /// container is sniffed from the bytes regardless.
    pub mime_type: String,
    /// ISO 3166-1 alpha-2 country code, case-insensitive.
    pub country_code: String,
    /// Segmentation method, or automatic selection.
    pub method: MethodSelection,
    /// Fail-fast or full evaluation.
    pub mode: Mode,
}

/// Output image facts for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputMetadata {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Print resolution.
    pub dpi: u32,
}

/// The pipeline's answer: the finished photo (when one could be produced)
/// and the compliance report.
#[derive(Debug)]
pub struct ProcessOutput {
    /// PNG bytes of the normalized, background-replaced photo. `None` when
    /// an upstream stage rejected the input before compositing.
    pub image_bytes: Option<Vec<u8>>,
    /// Dimensions and DPI of the output image, when one was produced.
    pub metadata: Option<OutputMetadata>,
    /// The compliance report, always present.
    pub report: ComplianceReport,
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    detector: Box<dyn FaceDetector>,
    confidence_threshold: f32,
    timeout: Duration,
    segmentation_workers: usize,
}

impl PipelineBuilder {
    /// Start from a detector backend with default settings.
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        PipelineBuilder {
            detector,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            timeout: DEFAULT_TIMEOUT,
            segmentation_workers: cores,
        }
    }

    /// Minimum detection confidence (default 0.8).
    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Whole-pipeline timeout for the CPU-bound stages (default 5 s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap on concurrent segmentations (default: available cores). Bounds
    /// the number of simultaneous image buffers.
    pub fn segmentation_workers(mut self, workers: usize) -> Self {
        self.segmentation_workers = workers.max(1);
        self
    }

    /// Finish the builder.
    pub fn build(self) -> Pipeline {
        Pipeline {
            locator: Arc::new(FaceLocator::new(self.detector, self.confidence_threshold)),
            timeout: self.timeout,
            segment_permits: Arc::new(Semaphore::new(self.segmentation_workers)),
        }
    }
}

/// The request orchestrator. Cheap to share behind an `Arc`; holds no
/// per-request state.
pub struct Pipeline {
    locator: Arc<FaceLocator>,
    timeout: Duration,
    segment_permits: Arc<Semaphore>,
}

impl Pipeline {
    /// Builder entry point.
    pub fn builder(detector: Box<dyn FaceDetector>) -> PipelineBuilder {
        PipelineBuilder::new(detector)
    }

    /// Process one photo end to end.
    ///
    /// Pre-condition violations (unknown country, bad format, size band)
    /// and internal faults return `Err`; every validation failure comes
    /// back as a non-compliant report instead.
    pub async fn process(&self, request: ProcessRequest) -> Result<ProcessOutput, Error> {
        let spec = country::lookup(&request.country_code)?;
        validate_mime(&request.mime_type)?;
        encode::sniff_format(&request.image_bytes)?;

        let size = request.image_bytes.len();
        if size > spec.max_file_bytes {
            return Err(Error::FileTooLarge {
                size,
                max: spec.max_file_bytes,
            });
        }
        if size < spec.min_file_bytes {
            return Err(Error::FileTooSmall {
                size,
                min: spec.min_file_bytes,
            });
        }

        tracing::info!(
            country = spec.code,
            bytes = size,
            mode = ?request.mode,
            "request received"
        );

        let bytes = request.image_bytes;
        let raw = task::spawn_blocking(move || encode::decode(&bytes))
            .await
            .map_err(join_error)??;
        let raw = Arc::new(raw);

        // The technical check needs only the raw bytes, so it runs
        // alongside face location.
        let (technical, face_outcome) = {
            let raw_t = Arc::clone(&raw);
            let raw_f = Arc::clone(&raw);
            let locator = Arc::clone(&self.locator);
            let (technical, outcome) = tokio::join!(
                task::spawn_blocking(move || technical_check(&raw_t, spec)),
                task::spawn_blocking(move || locator.locate(&raw_f.pixels)),
            );
            (technical.map_err(join_error)?, outcome.map_err(join_error)?)
        };
        tracing::debug!(valid = technical.valid, "stage: technical checked");

        if request.mode == Mode::FailFast && !technical.valid {
            return Ok(report_only(vec![technical]));
        }

        let face = match face_outcome {
            Ok(face) => face,
            Err(rejection) => {
                tracing::debug!(?rejection, "stage: face location rejected");
                return Ok(self.face_rejected(request.mode, technical, &rejection));
            }
        };
        tracing::debug!(confidence = face.confidence, "stage: face located");

        let heavy = self.finish(raw, face, spec, request.method, request.mode, technical);
        match tokio::time::timeout(self.timeout, heavy).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout("normalization/segmentation/evaluation")),
        }
    }

    /// Stages after face location: normalize, segment, composite, score.
    async fn finish(
        &self,
        raw: Arc<RawImage>,
        face: FaceGeometry,
        spec: &'static CountrySpec,
        method: MethodSelection,
        mode: Mode,
        technical: ComplianceCheck,
    ) -> Result<ProcessOutput, Error> {
        let norm = {
            let raw = Arc::clone(&raw);
            let face = face.clone();
            task::spawn_blocking(move || normalize::normalize(&raw.pixels, &face, spec))
                .await
                .map_err(join_error)?
        };
        let norm = match norm {
            Ok(norm) => Arc::new(norm),
            Err(rejection) => {
                tracing::debug!(?rejection, "stage: normalization rejected");
                return Ok(normalization_rejected(mode, technical, &rejection));
            }
        };
        tracing::debug!(scale = norm.scale, "stage: normalized");

        // Segmentation is the heavy stage; the permit bounds concurrent
        // image buffers across requests.
        let segmentation = {
            let _permit = self
                .segment_permits
                .acquire()
                .await
                .map_err(|_| Error::Internal("segmentation pool closed".to_string()))?;
            let norm = Arc::clone(&norm);
            task::spawn_blocking(move || segment::segment(&norm.image, &norm.face.bounds, method))
                .await
                .map_err(join_error)?
        };
        let segmentation = match segmentation {
            Ok(result) => Arc::new(result),
            Err(rejection) => {
                tracing::debug!(?rejection, "stage: segmentation rejected");
                return Ok(self
                    .segmentation_rejected(mode, technical, &norm, spec, &rejection)
                    .await?);
            }
        };
        tracing::debug!(
            method = segmentation.method.as_str(),
            uniformity = segmentation.uniformity(),
            "stage: segmented"
        );

        let composited = {
            let norm = Arc::clone(&norm);
            let seg = Arc::clone(&segmentation);
            Arc::new(
                task::spawn_blocking(move || {
                    segment::composite(&norm.image, &seg.mask, spec.background)
                })
                .await
                .map_err(join_error)?,
            )
        };

        // Remaining checks fan out over immutable snapshots and join at one
        // barrier; the report assembler fixes the category order.
        let (face_quality, background) = {
            let norm_q = Arc::clone(&norm);
            let comp = Arc::clone(&composited);
            let seg = Arc::clone(&segmentation);
            let (q, b) = tokio::join!(
                task::spawn_blocking(move || face_quality_check(&norm_q, spec)),
                task::spawn_blocking(move || background_check(&comp, &seg, spec)),
            );
            (q.map_err(join_error)?, b.map_err(join_error)?)
        };

        let mut report = ComplianceReport::assemble(vec![
            technical,
            face_count_check(None),
            face_quality,
            background,
        ]);
        if norm.upscale_warning() {
            report.suggestions.push(
                "The source resolution required heavy upscaling; a higher-resolution photo will print better."
                    .to_string(),
            );
        }
        tracing::info!(
            compliant = report.overall.compliant,
            score = report.overall.score,
            "stage: scored"
        );

        let png = {
            let comp = Arc::clone(&composited);
            task::spawn_blocking(move || encode::encode_png(&comp))
                .await
                .map_err(join_error)??
        };

        Ok(ProcessOutput {
            metadata: Some(OutputMetadata {
                width: norm.image.width(),
                height: norm.image.height(),
                dpi: norm.dpi,
            }),
            image_bytes: Some(png),
            report,
        })
    }

    /// Assemble the report for a face-location rejection.
    fn face_rejected(
        &self,
        mode: Mode,
        technical: ComplianceCheck,
        rejection: &Rejection,
    ) -> ProcessOutput {
        let face_count = face_count_check(Some(rejection));
        let checks = match mode {
            Mode::FailFast => vec![technical, face_count],
            // Full mode still reports the downstream categories, which
            // cannot be measured without a usable face.
            Mode::Full => vec![
                technical,
                face_count,
                ComplianceCheck::fail(
                    CheckCategory::FaceQuality,
                    0,
                    "not evaluated: requires a located face",
                    rejection.suggestion(),
                ),
                ComplianceCheck::fail(
                    CheckCategory::Background,
                    0,
                    "not evaluated: requires a normalized image",
                    rejection.suggestion(),
                ),
            ],
        };
        report_only(checks)
    }

    /// Assemble the report for a segmentation rejection; in full mode the
    /// face-quality check still runs on the normalized image.
    async fn segmentation_rejected(
        &self,
        mode: Mode,
        technical: ComplianceCheck,
        norm: &Arc<NormalizedImage>,
        spec: &'static CountrySpec,
        rejection: &Rejection,
    ) -> Result<ProcessOutput, Error> {
        let background = ComplianceCheck::from_rejection(CheckCategory::Background, rejection);
        let checks = match mode {
            Mode::FailFast => vec![technical, face_count_check(None), background],
            Mode::Full => {
                let norm = Arc::clone(norm);
                let face_quality =
                    task::spawn_blocking(move || face_quality_check(&norm, spec))
                        .await
                        .map_err(join_error)?;
                vec![technical, face_count_check(None), face_quality, background]
            }
        };
        Ok(report_only(checks))
    }
}

/// Assemble the report for a normalization rejection (insufficient margin
/// is a face-framing problem, so it lands in the face-quality category).
fn normalization_rejected(
    mode: Mode,
    technical: ComplianceCheck,
    rejection: &Rejection,
) -> ProcessOutput {
    let face_quality = ComplianceCheck::from_rejection(CheckCategory::FaceQuality, rejection);
    let checks = match mode {
        Mode::FailFast => vec![technical, face_count_check(None), face_quality],
        Mode::Full => vec![
            technical,
            face_count_check(None),
            face_quality,
            ComplianceCheck::fail(
                CheckCategory::Background,
                0,
                "not evaluated: requires a normalized image",
                rejection.suggestion(),
            ),
        ],
    };
    report_only(checks)
}

fn report_only(checks: Vec<ComplianceCheck>) -> ProcessOutput {
    ProcessOutput {
        image_bytes: None,
        metadata: None,
        report: ComplianceReport::assemble(checks),
    }
}

fn validate_mime(mime: &str) -> Result<(), Error> {
    match mime {
        "image/jpeg" | "image/png" => Ok(()),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }
}

fn join_error(e: task::JoinError) -> Error {
    Error::Internal(format!("worker task failed: {e}"))
}
