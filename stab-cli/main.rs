use clap::{Parser, ValueEnum};
use stab_cli::{init_thread_pool, Frame, MotionModel, StabilizerBuilder, StabilizerConfig};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Align every frame to the anchor
    Fixed,
    /// Align every frame to the previous stabilized output
    Chained,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Preset {
    Fast,
    Balanced,
    Precision,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Model {
    Homography,
    Affine,
}

#[derive(Parser)]
#[command(name = "stabilize", about = "Feature-based image stabilization")]
#[command(version)]
struct Cli {
    /// Reference frame every output is aligned to
    #[arg(short, long)]
    anchor: PathBuf,

    /// Frames to stabilize, in order
    #[arg(required = true)]
    frames: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "stabilized")]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = Mode::Chained)]
    mode: Mode,

    #[arg(long, value_enum, default_value_t = Preset::Balanced)]
    preset: Preset,

    #[arg(long, value_enum)]
    model: Option<Model>,

    /// Longer side used for detection, 0 for full resolution
    #[arg(long)]
    working_size: Option<u32>,

    /// Fix the RANSAC seed
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    threads: Option<usize>,

    /// TOML configuration file; overrides the preset
    #[cfg(feature = "serde")]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write keypoint and match renderings
    #[arg(long)]
    diagnostics: bool,

    /// Log a detector preset comparison over all inputs
    #[arg(long)]
    compare: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn load(path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
    Ok(image::open(path)?.to_rgba8())
}

fn output_name(path: &Path, suffix: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    format!("{}_{}.png", stem, suffix)
}

fn base_config(cli: &Cli) -> Result<StabilizerConfig, Box<dyn std::error::Error>> {
    #[cfg(feature = "serde")]
    if let Some(path) = &cli.config {
        return Ok(StabilizerConfig::load_toml(path)?);
    }
    Ok(match cli.preset {
        Preset::Fast => StabilizerConfig::fast_preset(),
        Preset::Balanced => StabilizerConfig::balanced_preset(),
        Preset::Precision => StabilizerConfig::precision_preset(),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut builder = StabilizerBuilder::from_config(base_config(&cli)?);
    if let Some(model) = cli.model {
        builder = builder.motion_model(match model {
            Model::Homography => MotionModel::Homography,
            Model::Affine => MotionModel::Affine,
        });
    }
    if let Some(size) = cli.working_size {
        builder = builder.working_pixel_size(size);
    }
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }
    if let Some(threads) = cli.threads {
        builder = builder.threads(threads);
    }
    info!("{}", builder.summary());

    let mut controller = builder.build()?;
    init_thread_pool(controller.config().n_threads)?;

    let anchor = load(&cli.anchor)?;
    let frames = cli
        .frames
        .iter()
        .map(|p| load(p))
        .collect::<Result<Vec<_>, _>>()?;
    info!(frames = frames.len(), "loaded input");

    std::fs::create_dir_all(&cli.output)?;

    if cli.compare {
        let mut all = Vec::with_capacity(frames.len() + 1);
        all.push(anchor.clone());
        all.extend(frames.iter().cloned());
        controller.compare_extractor(&all);
    }

    if cli.diagnostics {
        let dir = cli.output.join("diagnostics");
        std::fs::create_dir_all(&dir)?;
        let working = controller.config().working_pixel_size;

        controller
            .extract_feature(&anchor, working)?
            .save(dir.join(output_name(&cli.anchor, "keypoints")))?;

        let mut sequence = Vec::with_capacity(frames.len() + 1);
        sequence.push(anchor.clone());
        sequence.extend(frames.iter().cloned());
        let renderings = controller.matched_feature_with_image_list(&sequence, working)?;
        for (path, rendering) in cli.frames.iter().zip(renderings) {
            rendering.save(dir.join(output_name(path, "matches")))?;
        }
    }

    controller.set_stabilize_source_image(anchor);
    let started = Instant::now();
    let outputs = match cli.mode {
        Mode::Fixed => controller.stabilized_with_image_list(&frames)?,
        Mode::Chained => controller.stabilized_with_prev_result(&frames)?,
    };
    info!(
        frames = outputs.len(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "stabilization finished"
    );

    for (path, frame) in cli.frames.iter().zip(&outputs) {
        let target = cli.output.join(output_name(path, "stabilized"));
        frame.save(&target)?;
        info!(path = %target.display(), "saved");
    }

    Ok(())
}
