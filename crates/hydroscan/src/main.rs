//! hydroscan: command-line front end.
//!
//! Two steps of a prospecting campaign:
//!
//! - `sample` turns a zone contour (GPX, KML or KMZ) into scan
//!   trajectory batches to send to an elevation service.
//! - `infer` reads the enriched batches back, runs the inference
//!   pipeline and writes the `LIGNES`, `INTERSECTIONS`, `DOLINES` and
//!   `CONTOUR` layers as GeoJSON, KML and GPX, plus an SVG map, a JSON
//!   summary and a plain-text journal, optionally zipped into a report.
//!
//! # Usage
//!
//! ```text
//! hydroscan sample zone.kmz --out-dir batches
//! hydroscan infer batches/enriched_*.gpx --contour zone.kmz --out-dir results --zip
//! ```
//!
//! Logging goes through `env_logger`; set `RUST_LOG=debug` for per-stage
//! detail.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use hydroscan_formats::{
    ContourFormat, Layer, SvgMetadata, archive, geojson, gpx, kml, read_contour, to_map_svg,
};
use hydroscan_pipeline::diagnostics::{Clock, PipelineDiagnostics, process_with_diagnostics};
use hydroscan_pipeline::sampler::sample_trajectory;
use hydroscan_pipeline::{
    CoordinateFrame, GeoPoint, InferenceConfig, InferenceResult, OverlapPolicy, Sample,
    SamplerConfig,
};
use serde::Serialize;

/// File name of the map preview written by `infer`.
const MAP_FILE: &str = "carte_prospection.svg";
/// File name of the run summary written by `infer`.
const SUMMARY_FILE: &str = "summary.json";
/// File name of the plain-text journal written by `infer`.
const JOURNAL_FILE: &str = "journal.txt";

/// Geometric inference of fracture lines, drilling points and dolines.
#[derive(Parser)]
#[command(name = "hydroscan", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build scan trajectory batches from a zone contour.
    Sample(SampleArgs),
    /// Run inference over enriched trajectories and export the layers.
    Infer(InferArgs),
}

#[derive(Args)]
struct SampleArgs {
    /// Zone contour: GPX (track, route or waypoints), KML or KMZ
    /// (placemark polygons).
    contour: PathBuf,

    /// Directory receiving `chunk_1.gpx`, `chunk_2.gpx` and so on.
    #[arg(long)]
    out_dir: PathBuf,

    /// Chord sampling step in metres.
    #[arg(long, default_value_t = SamplerConfig::DEFAULT_STEP_M)]
    step: f64,

    /// Fixed number of ring points (derived from the radius if omitted).
    #[arg(long)]
    ring_points: Option<usize>,

    /// Upper bound on the derived ring point count.
    #[arg(long)]
    max_ring_points: Option<usize>,

    /// Maximum points per batch.
    #[arg(long, default_value_t = SamplerConfig::DEFAULT_CHUNK_SIZE)]
    chunk: usize,
}

#[derive(Args)]
struct InferArgs {
    /// Enriched GPX files, concatenated in argument order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory receiving the layers, the map and the summary.
    #[arg(long)]
    out_dir: PathBuf,

    /// Prominence thresholds in metres, tried first to last.
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = InferenceConfig::DEFAULT_THRESHOLDS.to_vec()
    )]
    thresholds: Vec<f64>,

    /// Angular tolerance for line grouping, in degrees.
    #[arg(long, default_value_t = InferenceConfig::DEFAULT_ANGLE_TOLERANCE_DEG)]
    angle_tolerance: f64,

    /// A threshold is accepted once `count >= n / divisor`.
    #[arg(long, default_value_t = InferenceConfig::DEFAULT_DENSITY_DIVISOR)]
    density_divisor: f64,

    /// Elevation percentile below which samples belong to the doline.
    #[arg(long, default_value_t = InferenceConfig::DEFAULT_DOLINE_PERCENTILE)]
    doline_percentile: f64,

    /// Minimum number of samples before a doline is estimated.
    #[arg(long, default_value_t = InferenceConfig::DEFAULT_DOLINE_MIN_SAMPLES)]
    doline_min_samples: usize,

    /// Working frame for geometric computations.
    #[arg(long, value_enum, default_value_t = Frame::Utm)]
    frame: Frame,

    /// How collinear overlaps between candidate lines are reported.
    #[arg(long, value_enum, default_value_t = Overlap::Skip)]
    overlap: Overlap,

    /// Inference config as a JSON file.
    ///
    /// When provided, the individual parameter flags are ignored.
    #[arg(long, conflicts_with = "config_json")]
    config: Option<PathBuf>,

    /// Inference config as a JSON string.
    ///
    /// When provided, the individual parameter flags are ignored.
    #[arg(long)]
    config_json: Option<String>,

    /// Zone contour (GPX, KML or KMZ) exported as the `CONTOUR` layer.
    #[arg(long)]
    contour: Option<PathBuf>,

    /// Also pack every output into `Rapport_{name}.zip`.
    #[arg(long)]
    zip: bool,

    /// Prospector name, written to the journal and the archive name.
    #[arg(long)]
    prospector: Option<String>,

    /// Prospector phone number, written to the journal and the archive
    /// name.
    #[arg(long)]
    phone: Option<String>,

    /// Print diagnostics as JSON instead of the human-readable report.
    #[arg(long)]
    json: bool,
}

/// Working frame selection.
#[derive(Clone, Copy, ValueEnum)]
enum Frame {
    /// Project to the UTM zone of the survey centroid.
    Utm,
    /// Use raw longitude/latitude as planar coordinates.
    Geographic,
}

/// Overlap policy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Overlap {
    /// Drop pairs that share a segment.
    Skip,
    /// Report the end points of a shared segment.
    Endpoints,
}

/// Build an [`InferenceConfig`] from CLI arguments.
///
/// A JSON config (`--config-json` or `--config`) wins over the
/// individual flags.
fn config_from_cli(args: &InferArgs) -> Result<InferenceConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }
    if let Some(ref path) = args.config {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
        return serde_json::from_str(&text)
            .map_err(|e| format!("Error parsing {}: {e}", path.display()));
    }

    Ok(InferenceConfig {
        thresholds: args.thresholds.clone(),
        angle_tolerance_deg: args.angle_tolerance,
        density_divisor: args.density_divisor,
        doline_percentile: args.doline_percentile,
        doline_min_samples: args.doline_min_samples,
        frame: match args.frame {
            Frame::Utm => CoordinateFrame::Utm,
            Frame::Geographic => CoordinateFrame::Geographic,
        },
        overlap_policy: match args.overlap {
            Overlap::Skip => OverlapPolicy::Skip,
            Overlap::Endpoints => OverlapPolicy::Endpoints,
        },
        ..InferenceConfig::default()
    })
}

const fn sampler_config_from_cli(args: &SampleArgs) -> SamplerConfig {
    SamplerConfig {
        step_m: args.step,
        ring_points: args.ring_points,
        max_ring_points: args.max_ring_points,
        chunk_size: args.chunk,
    }
}

/// Everything a run produced, for `summary.json`.
#[derive(Serialize)]
struct RunSummary<'a> {
    inputs: Vec<String>,
    config: &'a InferenceConfig,
    result: &'a InferenceResult,
    diagnostics: &'a PipelineDiagnostics,
}

/// File name of the `k`-th trajectory batch, counted from 1.
fn chunk_file_name(k: usize) -> String {
    format!("chunk_{}.gpx", k + 1)
}

/// Outputs of one `infer` run, in writing order.
#[derive(Default)]
struct Outputs {
    files: Vec<(String, Vec<u8>)>,
}

impl Outputs {
    fn push(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.push((name.into(), contents.into()));
    }

    fn write_to(&self, dir: &Path) -> Result<(), String> {
        for (name, contents) in &self.files {
            write_file(dir, name, contents)?;
        }
        Ok(())
    }

    fn to_zip(&self) -> Result<Vec<u8>, String> {
        archive::zip_entries(
            self.files
                .iter()
                .map(|(name, contents)| (name.as_str(), contents.as_slice())),
        )
        .map_err(|e| e.to_string())
    }
}

/// Keep letters, digits, `-` and `_`; spaces become `_`.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|&c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect()
}

/// `Rapport_{name}[_{digits}].zip`, the name being the prospector or,
/// failing that, the zone.
fn report_archive_name(prospector: Option<&str>, phone: Option<&str>, zone: &str) -> String {
    let name = sanitize(prospector.unwrap_or(zone));
    let digits: String = phone
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        format!("Rapport_{name}.zip")
    } else {
        format!("Rapport_{name}_{digits}.zip")
    }
}

/// Plain-text run journal: who, what was found, and the map legend.
fn journal(result: &InferenceResult, prospector: Option<&str>, phone: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(prospector) = prospector {
        let _ = writeln!(out, "Prospector: {prospector}");
    }
    if let Some(phone) = phone {
        let _ = writeln!(out, "Phone: {phone}");
    }
    if !out.is_empty() {
        out.push('\n');
    }

    let _ = writeln!(out, "SURVEY STATISTICS\n{}\n", "-".repeat(30));
    let _ = writeln!(out, "Samples: {}", result.sample_count);
    let _ = writeln!(out, "Prominence threshold: {} m", result.threshold);
    let _ = writeln!(out, "Drilling points: {}", result.intersections.len());
    let _ = writeln!(out, "Fracture lines: {}", result.lines.len());
    let _ = writeln!(out, "Dolines: {}", usize::from(result.doline.is_some()));
    match result.contour_hectares() {
        Some(hectares) => {
            let _ = writeln!(out, "Prospected area: {hectares:.2} ha");
        }
        None => {
            let _ = writeln!(out, "Prospected area: not defined");
        }
    }

    let _ = writeln!(out, "\n{}", "=".repeat(50));
    let _ = writeln!(out, "MAP LEGEND\n{}\n", "-".repeat(30));
    let _ = writeln!(out, "{} = dolines", Layer::Dolines);
    let _ = writeln!(out, "{} = drilling points", Layer::Intersections);
    let _ = writeln!(out, "{} = fracture lines", Layer::Lines);
    let _ = writeln!(out, "{} = prospected zone", Layer::Contour);
    out
}

fn write_file(dir: &Path, name: &str, contents: &[u8]) -> Result<(), String> {
    let path = dir.join(name);
    std::fs::write(&path, contents).map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    log::info!("wrote {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

fn create_dir(dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("Error creating {}: {e}", dir.display()))
}

fn read_file(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))
}

/// Contour format named by the file extension.
fn contour_format(path: &Path) -> Result<ContourFormat, String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(ContourFormat::from_extension)
        .ok_or_else(|| {
            format!(
                "Unsupported contour file {}: expected .gpx, .kml or .kmz",
                path.display()
            )
        })
}

fn load_contour(path: &Path) -> Result<Vec<GeoPoint>, String> {
    let format = contour_format(path)?;
    let bytes = read_file(path)?;
    let contour = read_contour(format, &bytes)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    log::info!("{}: {} contour points", path.display(), contour.len());
    Ok(contour)
}

fn run_sample(args: &SampleArgs) -> Result<(), String> {
    let config = sampler_config_from_cli(args);
    let contour = load_contour(&args.contour)?;
    let trajectory =
        sample_trajectory(&contour, &config).map_err(|e| format!("Sampling error: {e}"))?;

    create_dir(&args.out_dir)?;
    let mut batches = 0;
    for (k, batch) in trajectory.chunks(config.chunk_size).enumerate() {
        let text = gpx::trajectory_to_gpx(batch).map_err(|e| e.to_string())?;
        write_file(&args.out_dir, &chunk_file_name(k), text.as_bytes())?;
        batches += 1;
    }

    eprintln!(
        "Zone {} (EPSG:{}), radius {:.1} m, {} ring points, {} scan points in {batches} batches",
        trajectory.zone,
        trajectory.zone.epsg(),
        trajectory.radius_m,
        trajectory.ring.len(),
        trajectory.scan.len(),
    );
    Ok(())
}

fn run_infer(args: &InferArgs) -> Result<(), String> {
    let config = config_from_cli(args)?;
    let contour = args.contour.as_deref().map(load_contour).transpose()?;

    let mut samples: Vec<Sample> = Vec::new();
    for path in &args.inputs {
        let bytes = read_file(path)?;
        let batch = gpx::read_samples(&bytes)
            .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
        log::info!("{}: {} samples", path.display(), batch.len());
        samples.extend(batch);
    }

    let (mut result, diagnostics) = process_with_diagnostics(&samples, &config, &StdClock)
        .map_err(|e| format!("Pipeline error: {e}"))?;
    if let Some(contour) = contour {
        result = result.with_contour(contour);
    }

    for notice in &result.notices {
        log::warn!("{notice:?}");
    }

    create_dir(&args.out_dir)?;

    let zone_name = args
        .contour
        .as_ref()
        .or_else(|| args.inputs.first())
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .unwrap_or("hydroscan");

    let mut outputs = Outputs::default();
    for layer in Layer::ALL {
        let name = layer.name();
        let text = geojson::layer_to_geojson(&result, layer).map_err(|e| e.to_string())?;
        outputs.push(format!("{name}.geojson"), text);
        outputs.push(format!("{name}.kml"), kml::layer_to_kml(&result, layer, zone_name));
        let text = gpx::layer_to_gpx(&result, layer).map_err(|e| e.to_string())?;
        outputs.push(format!("{name}.gpx"), text);
    }

    let config_json = serde_json::to_string(&config).map_err(|e| e.to_string())?;
    let description = format!(
        "{} samples, threshold {} m, {} lines, {} intersections",
        result.sample_count,
        result.threshold,
        result.lines.len(),
        result.intersections.len(),
    );
    let metadata = SvgMetadata {
        title: Some(zone_name),
        description: Some(&description),
        config_json: Some(&config_json),
    };
    outputs.push(MAP_FILE, to_map_svg(&result, &samples, &metadata));

    let summary = RunSummary {
        inputs: args.inputs.iter().map(|p| p.display().to_string()).collect(),
        config: &config,
        result: &result,
        diagnostics: &diagnostics,
    };
    let text = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    outputs.push(SUMMARY_FILE, text);

    let prospector = args.prospector.as_deref();
    let phone = args.phone.as_deref();
    outputs.push(JOURNAL_FILE, journal(&result, prospector, phone));
    outputs.write_to(&args.out_dir)?;

    if args.zip {
        let name = report_archive_name(prospector, phone, zone_name);
        write_file(&args.out_dir, &name, &outputs.to_zip()?)?;
    }

    if args.json {
        let json = serde_json::to_string_pretty(&diagnostics)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        println!("{json}");
    } else {
        println!("{}", diagnostics.report());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let outcome = match &cli.command {
        Command::Sample(args) => run_sample(args),
        Command::Infer(args) => run_infer(args),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
