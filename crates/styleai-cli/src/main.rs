use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use image::ImageFormat;
use serde::Serialize;
use serde_json::{json, Value};
use styleai_contracts::{
    AttributeKind, BodyShape, GenerateInput, GenerationOutcome, InlineImage, PersonHints, Vocabulary,
};
use styleai_engine::inline::{decode, encode_bytes, extension_for_mime};
use styleai_engine::{build_orchestrator, Attributes, EngineConfig, Orchestrator};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "styleai=info";

#[derive(Debug, Parser)]
#[command(
    name = "styleai",
    version,
    about = "Virtual try-on from photos or descriptions"
)]
struct Cli {
    /// Use offline stand-ins instead of the hosted models.
    #[arg(long, global = true)]
    dryrun: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    AnalyzePerson(PersonArgs),
    AnalyzeGarment(GarmentArgs),
    Tryon(TryOnArgs),
}

#[derive(Debug, Parser)]
struct PersonArgs {
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    text: Option<String>,
    /// e.g. "170", "1.75m", "5'7\""
    #[arg(long)]
    height: Option<String>,
    #[arg(long, value_parser = parse_body_shape)]
    body_shape: Option<BodyShape>,
}

#[derive(Debug, Parser)]
struct GarmentArgs {
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    text: Option<String>,
}

#[derive(Debug, Parser)]
struct TryOnArgs {
    #[arg(long)]
    person_image: Option<PathBuf>,
    #[arg(long, default_value = "")]
    person_text: String,
    #[arg(long)]
    garment_image: Option<PathBuf>,
    #[arg(long, default_value = "")]
    garment_text: String,
    #[arg(long)]
    height: Option<String>,
    #[arg(long, value_parser = parse_body_shape)]
    body_shape: Option<BodyShape>,
    /// Where to write the generated image. Defaults to `tryon-<timestamp>.<ext>`.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("styleai error: {err:#}");
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr so stdout carries only the JSON result.
///
/// `RUST_LOG` sets the filter (default `styleai=info`); `LOG_FORMAT=json`
/// switches to structured output.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let mut config = EngineConfig::from_env();
    if cli.dryrun {
        config.dryrun = true;
    }
    for warning in &config.warnings {
        warn!(%warning, "configuration warning");
    }
    let orchestrator = build_orchestrator(&config);
    match cli.command {
        Command::AnalyzePerson(args) => run_analyze_person(&orchestrator, args),
        Command::AnalyzeGarment(args) => run_analyze_garment(&orchestrator, args),
        Command::Tryon(args) => run_tryon(&orchestrator, args),
    }
}

fn run_analyze_person(orchestrator: &Orchestrator, args: PersonArgs) -> Result<i32> {
    let image = args
        .image
        .as_deref()
        .map(read_image_as_data_url)
        .transpose()?;
    let hints = PersonHints {
        height: args.height,
        body_shape: args.body_shape,
    };
    analyze(orchestrator, AttributeKind::Person, image, args.text, &hints)
}

fn run_analyze_garment(orchestrator: &Orchestrator, args: GarmentArgs) -> Result<i32> {
    let image = args
        .image
        .as_deref()
        .map(read_image_as_data_url)
        .transpose()?;
    analyze(
        orchestrator,
        AttributeKind::Garment,
        image,
        args.text,
        &PersonHints::default(),
    )
}

fn analyze(
    orchestrator: &Orchestrator,
    kind: AttributeKind,
    image: Option<InlineImage>,
    text: Option<String>,
    hints: &PersonHints,
) -> Result<i32> {
    let attributes = orchestrator
        .extractor()
        .extract(kind, image.as_ref(), text.as_deref(), hints)
        .with_context(|| format!("{} analysis failed", kind.as_str()))?;
    match attributes {
        Attributes::Person(person) => print_json(&person)?,
        Attributes::Garment(garment) => print_json(&garment)?,
    }
    Ok(0)
}

fn run_tryon(orchestrator: &Orchestrator, args: TryOnArgs) -> Result<i32> {
    let input = GenerateInput {
        person_image: args
            .person_image
            .as_deref()
            .map(read_image_as_data_url)
            .transpose()?,
        person_text: args.person_text,
        garment_image: args
            .garment_image
            .as_deref()
            .map(read_image_as_data_url)
            .transpose()?,
        garment_text: args.garment_text,
        height_hint: args.height,
        body_shape_hint: args.body_shape,
    };
    let outcome = orchestrator.generate(&input);

    let saved_to = match &outcome.generated_image {
        Some(image) => {
            let path = args.out.unwrap_or_else(|| default_output_path(image));
            write_image(image, &path)?;
            info!(path = %path.display(), "try-on image saved");
            Some(path)
        }
        None => None,
    };
    print_json(&outcome_for_display(&outcome, saved_to.as_deref())?)?;
    Ok(if outcome.success { 0 } else { 2 })
}

fn parse_body_shape(raw: &str) -> std::result::Result<BodyShape, String> {
    BodyShape::parse(raw).ok_or_else(|| {
        format!(
            "unknown body shape {raw:?} (expected one of: {})",
            BodyShape::choices().join(", ")
        )
    })
}

fn read_image_as_data_url(path: &Path) -> Result<InlineImage> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if bytes.is_empty() {
        bail!("image file {} is empty", path.display());
    }
    encode_bytes(&bytes, guess_image_mime(path))
        .with_context(|| format!("failed to encode {}", path.display()))
}

/// MIME type from the file extension; `None` leaves it to byte sniffing.
fn guess_image_mime(path: &Path) -> Option<&'static str> {
    ImageFormat::from_path(path)
        .ok()
        .map(|format| format.to_mime_type())
}

fn default_output_path(image: &InlineImage) -> PathBuf {
    let extension = extension_for_mime(image.mime_type().unwrap_or("image/png"));
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    PathBuf::from(format!("tryon-{stamp}.{extension}"))
}

fn write_image(image: &InlineImage, path: &Path) -> Result<()> {
    let bytes = decode(image).context("generated image is not inline data")?;
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

/// Outcome JSON with the inline image replaced by a short summary.
fn outcome_for_display(outcome: &GenerationOutcome, saved_to: Option<&Path>) -> Result<Value> {
    let mut value = serde_json::to_value(outcome)?;
    if let (Some(object), Some(image)) = (value.as_object_mut(), &outcome.generated_image) {
        object.insert(
            "generatedImage".to_string(),
            json!({
                "mimeType": image.mime_type(),
                "base64Chars": image.base64_payload().map(str::len),
            }),
        );
        if let Some(path) = saved_to {
            object.insert(
                "savedTo".to_string(),
                Value::String(path.display().to_string()),
            );
        }
    }
    Ok(value)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
