//! acwe CLI: coronal hole segmentation and confidence maps from the command line.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use acwe::{
    AcweConfig, BatchReport, CombineMode, EvolutionObserver, Field, Interpolation, ReduceConfig,
    SegmentationRecord, SolarDisk,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "acwe")]
#[command(about = "Segment coronal holes in full-disk EUV images with active contours without edges")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment one image with a single background weight.
    Segment(CliSegmentArgs),

    /// Sweep background weights and save the segmentation stack.
    Confidence(CliConfidenceArgs),

    /// Reduce a saved segmentation stack into a confidence map.
    Reduce(CliReduceArgs),
}

#[derive(Debug, Clone, Args)]
struct CliRunArgs {
    /// Path to the input image (PNG, TIFF, ...).
    #[arg(long)]
    image: PathBuf,

    /// JSON file with an `AcweConfig`; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Solar disk centre x in native pixels (default: image centre).
    #[arg(long)]
    sun_cx: Option<f64>,

    /// Solar disk centre y in native pixels (default: image centre).
    #[arg(long)]
    sun_cy: Option<f64>,

    /// Solar disk radius in native pixels (default: 0.4 * min(width, height)).
    #[arg(long)]
    sun_radius: Option<f64>,

    /// Downsampling factor to working resolution.
    #[arg(long)]
    resize_param: Option<u32>,

    /// Seed threshold as a fraction of the quiet-sun level.
    #[arg(long)]
    alpha: Option<f64>,

    /// Increment applied to alpha while the seed is empty.
    #[arg(long)]
    rolling_alpha: Option<f64>,

    /// Foreground (inside) region weight.
    #[arg(long)]
    foreground_weight: Option<f64>,

    /// Narrowband half-width in pixels.
    #[arg(long)]
    narrowband: Option<u32>,

    /// Explicit steps between convergence checks.
    #[arg(long)]
    iters_between_checks: Option<usize>,

    /// Maximum number of batches per run.
    #[arg(long)]
    max_batches: Option<usize>,

    /// Disable limb-brightening correction.
    #[arg(long)]
    no_limb_correction: bool,

    /// Keep holes in the seed mask.
    #[arg(long)]
    no_fill_holes: bool,
}

#[derive(Debug, Clone, Args)]
struct CliSegmentArgs {
    #[command(flatten)]
    run: CliRunArgs,

    /// Background (outside) region weight.
    #[arg(long)]
    background_weight: Option<f64>,

    /// Path to write the run summary (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Path to write the final mask at working resolution (PNG).
    #[arg(long)]
    mask_png: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliConfidenceArgs {
    #[command(flatten)]
    run: CliRunArgs,

    /// Comma-separated background weights (default: 1/k for k = 10..=100).
    #[arg(long, value_delimiter = ',')]
    background_weights: Option<Vec<f64>>,

    /// Path to write the segmentation record (JSON).
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct CliReduceArgs {
    /// Segmentation record written by `acwe confidence`.
    #[arg(long)]
    record: PathBuf,

    /// Combination mode.
    #[arg(long, value_enum, default_value_t = CombineModeArg::Smart)]
    mode: CombineModeArg,

    /// Keep raw layer counts instead of fractions.
    #[arg(long)]
    no_normalize: bool,

    /// Keep the map at working resolution.
    #[arg(long)]
    working_scale: bool,

    /// Interpolation used to upscale layers.
    #[arg(long, value_enum, default_value_t = InterpolationArg::Bilinear)]
    interpolation: InterpolationArg,

    /// Re-binarization threshold of upscaled layers.
    #[arg(long, default_value = "0.5")]
    split: f64,

    /// Tolerated intersection-over-original drop in smart mode.
    #[arg(long, default_value = "0.05")]
    buffer: f64,

    /// Path to write the confidence map (8-bit PNG).
    #[arg(long)]
    out: PathBuf,

    /// Path to write the map values and accepted layers (JSON).
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CombineModeArg {
    Simple,
    Smart,
}

impl CombineModeArg {
    fn to_core(self) -> CombineMode {
        match self {
            Self::Simple => CombineMode::Simple,
            Self::Smart => CombineMode::Smart,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InterpolationArg {
    Nearest,
    Bilinear,
    Bicubic,
    Gaussian,
    Lanczos3,
}

impl InterpolationArg {
    fn to_core(self) -> Interpolation {
        match self {
            Self::Nearest => Interpolation::Nearest,
            Self::Bilinear => Interpolation::Bilinear,
            Self::Bicubic => Interpolation::Bicubic,
            Self::Gaussian => Interpolation::Gaussian,
            Self::Lanczos3 => Interpolation::Lanczos3,
        }
    }
}

impl CliRunArgs {
    fn to_config(&self) -> CliResult<AcweConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let data = std::fs::read_to_string(path).map_err(|e| -> CliError {
                    format!("Failed to read config {}: {}", path.display(), e).into()
                })?;
                serde_json::from_str(&data)?
            }
            None => AcweConfig::default(),
        };

        if let Some(v) = self.resize_param {
            config.preprocess.resize_param = v;
        }
        if self.no_limb_correction {
            config.preprocess.correct_limb_brightening = false;
        }
        if let Some(v) = self.alpha {
            config.seed.alpha = v;
        }
        if let Some(v) = self.rolling_alpha {
            config.seed.rolling_alpha = v;
        }
        if let Some(v) = self.foreground_weight {
            config.segment.weights.lambda_inside = v;
        }
        if let Some(v) = self.narrowband {
            config.segment.narrowband = v;
        }
        if let Some(v) = self.iters_between_checks {
            config.segment.iters_between_checks = v;
        }
        if let Some(v) = self.max_batches {
            config.segment.max_batches = Some(v);
        }
        if self.no_fill_holes {
            config.segment.fill_init_holes = false;
        }
        Ok(config)
    }

    fn to_disk(&self, width: u32, height: u32) -> SolarDisk {
        let fallback = SolarDisk::centered(width, height);
        SolarDisk {
            center_xy: [
                self.sun_cx.unwrap_or(fallback.center_xy[0]),
                self.sun_cy.unwrap_or(fallback.center_xy[1]),
            ],
            radius_px: self.sun_radius.unwrap_or(fallback.radius_px),
        }
    }
}

/// Logs every batch at debug level.
struct BatchTrace;

impl EvolutionObserver for BatchTrace {
    fn on_batch(&mut self, report: &BatchReport) {
        tracing::debug!(
            "batch {}: changed={} diff={:.3}% new={:.3}% area={} steps={} stop={:?}",
            report.batch,
            report.changed,
            report.percent_diff,
            report.percent_new_diff,
            report.area,
            report.steps,
            report.stop
        );
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Segment(args) => run_segment(&args),
        Commands::Confidence(args) => run_confidence(&args),
        Commands::Reduce(args) => run_reduce(&args),
    }
}

fn load_field(path: &Path) -> CliResult<Field> {
    tracing::info!("Loading image: {}", path.display());
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    let gray = img.to_luma32f();
    let (w, h) = gray.dimensions();
    tracing::info!("Image size: {}x{}", w, h);
    Ok(acwe::field_from_fn(w, h, |x, y| gray.get_pixel(x, y)[0] as f64))
}

// ── segment ────────────────────────────────────────────────────────────

fn run_segment(args: &CliSegmentArgs) -> CliResult<()> {
    let image = load_field(&args.run.image)?;
    let (w, h) = image.dimensions();
    let disk = args.run.to_disk(w, h);
    let mut config = args.run.to_config()?;
    if let Some(v) = args.background_weight {
        config.segment.weights.lambda_outside = v;
    }

    let run = acwe::run_acwe(&image, &disk, &config, &mut BatchTrace)?;
    tracing::info!(
        "{:?}: area={} px at working resolution, alpha={}",
        run.outcome,
        run.mask.area(),
        run.alpha
    );

    let json = serde_json::to_string_pretty(&run)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Results written to {}", args.out.display());

    if let Some(path) = &args.mask_png {
        run.mask.to_gray().save(path)?;
        tracing::info!("Mask written to {}", path.display());
    }
    Ok(())
}

// ── confidence ─────────────────────────────────────────────────────────

fn run_confidence(args: &CliConfidenceArgs) -> CliResult<()> {
    let image = load_field(&args.run.image)?;
    let (w, h) = image.dimensions();
    let disk = args.run.to_disk(w, h);
    let config = args.run.to_config()?;
    let weights = args
        .background_weights
        .clone()
        .unwrap_or_else(|| acwe::SweepConfig::default().background_weights);

    let run = acwe::run_acwe_confidence_map(&image, &disk, &config, &weights, &mut BatchTrace)?;
    tracing::info!(
        "Swept {} weights ({} failed), alpha={}",
        run.stack.len(),
        run.stack.n_failed(),
        run.alpha
    );

    let record = SegmentationRecord {
        header: run.header,
        stack: run.stack,
    };
    record.save_json(&args.out)?;
    tracing::info!("Record written to {}", args.out.display());
    Ok(())
}

// ── reduce ─────────────────────────────────────────────────────────────

#[derive(serde::Serialize)]
struct ReduceSummary<'a> {
    width: u32,
    height: u32,
    normalized: bool,
    accepted_indices: &'a [usize],
    accepted_weights: &'a [f64],
    map: &'a [f64],
}

fn run_reduce(args: &CliReduceArgs) -> CliResult<()> {
    let record = SegmentationRecord::load_json(&args.record)?;
    let config = ReduceConfig {
        mode: args.mode.to_core(),
        normalize: !args.no_normalize,
        restore_scale: !args.working_scale,
        interpolation: args.interpolation.to_core(),
        split: args.split,
        buffer: args.buffer,
    };
    let cmap = acwe::reduce_confidence_map(&record.stack, &record.header, &config)?;
    let (w, h) = cmap.map.dimensions();
    tracing::info!(
        "Confidence map {}x{} from {} of {} layers",
        w,
        h,
        cmap.accepted_indices.len(),
        record.stack.len()
    );

    // Fractions map onto 0..=255 directly; raw counts are scaled by the peak.
    let peak = cmap.map.as_raw().iter().copied().fold(0.0, f64::max);
    let scale = if cmap.normalized {
        255.0
    } else if peak > 0.0 {
        255.0 / peak
    } else {
        0.0
    };
    let png = image::GrayImage::from_fn(w, h, |x, y| {
        image::Luma([(cmap.map.get_pixel(x, y)[0] * scale).round().clamp(0.0, 255.0) as u8])
    });
    png.save(&args.out)?;
    tracing::info!("Map written to {}", args.out.display());

    if let Some(path) = &args.json {
        let summary = ReduceSummary {
            width: w,
            height: h,
            normalized: cmap.normalized,
            accepted_indices: &cmap.accepted_indices,
            accepted_weights: &cmap.accepted_weights,
            map: cmap.map.as_raw(),
        };
        std::fs::write(path, serde_json::to_string(&summary)?)?;
        tracing::info!("Map values written to {}", path.display());
    }
    Ok(())
}
