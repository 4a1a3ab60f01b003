use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use passfoto::{MethodSelection, Mode, Pipeline, ProcessRequest};

#[derive(Parser)]
#[command(name = "passfoto", about = "Passport photo compliance checker")]
struct Cli {
    /// Input photo (JPEG or PNG)
    #[arg(short, long)]
    file: PathBuf,

    /// ISO 3166-1 alpha-2 country code (e.g. US, DE)
    #[arg(short, long)]
    country: String,

    /// Evaluation mode: fail-fast or full
    #[arg(long, default_value = "full")]
    mode: Mode,

    /// Segmentation method: auto, chroma, edge, or luminance
    #[arg(long, default_value = "auto")]
    method: MethodSelection,

    /// Write the processed photo here when one is produced
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// SeetaFace model file for the built-in detector
    #[arg(long)]
    model: Option<PathBuf>,
}

fn mime_for(path: &Path) -> Result<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => Ok("image/jpeg"),
        Some("png") => Ok("image/png"),
        other => bail!("unsupported file extension {other:?} (expected jpg, jpeg, or png)"),
    }
}

#[cfg(feature = "rustface")]
fn build_pipeline(model: Option<&Path>) -> Result<Pipeline> {
    let Some(model) = model else {
        bail!("--model is required: path to a SeetaFace frontal model file");
    };
    let detector = passfoto::RustfaceDetector::from_model_path(model)
        .context("failed to load the face detection model")?;
    Ok(Pipeline::builder(Box::new(detector)).build())
}

#[cfg(not(feature = "rustface"))]
fn build_pipeline(_model: Option<&Path>) -> Result<Pipeline> {
    bail!("this build has no face detection backend; rebuild with --features rustface");
}

async fn run(cli: Cli) -> Result<bool> {
    passfoto::country::lookup(&cli.country).with_context(|| {
        format!(
            "supported countries: {}",
            passfoto::country::supported_codes()
                .collect::<Vec<_>>()
                .join(", ")
        )
    })?;

    let pipeline = build_pipeline(cli.model.as_deref())?;
    let image_bytes = std::fs::read(&cli.file)
        .with_context(|| format!("failed to read {}", cli.file.display()))?;

    let output = pipeline
        .process(ProcessRequest {
            image_bytes,
            mime_type: mime_for(&cli.file)?.to_string(),
            country_code: cli.country,
            method: cli.method,
            mode: cli.mode,
        })
        .await?;

    println!("{}", output.report.to_json()?);

    if let (Some(out), Some(bytes)) = (&cli.out, &output.image_bytes) {
        std::fs::write(out, bytes)
            .with_context(|| format!("failed to write {}", out.display()))?;
        tracing::info!(path = %out.display(), "wrote processed photo");
    }

    Ok(output.report.overall.compliant)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
