//! Command-line interface for scene flow replay.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::loaders;
use crate::core::writers::{self, TransformRecord};
use crate::processors::{synth, validation, SceneFlowReplay};
use crate::AppConfig;

const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";
const PROGRESS_TEMPLATE: &str = "{bar:40.cyan/blue} {pos}/{len} {msg}";

#[derive(Parser)]
#[command(name = "sceneflow-replay")]
#[command(about = "Replay pre-computed scene flow datasets", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List frame files in replay order
    List {
        /// Dataset directory
        directory: PathBuf,
    },

    /// Read every frame in order, as an estimator would
    Replay {
        /// Dataset directory
        directory: PathBuf,
        /// Stop after this many frames
        #[arg(long)]
        limit: Option<usize>,
        /// Write per-frame rigid transforms to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Decode a single frame file and print its contents
    Inspect {
        /// Frame XML file
        file: PathBuf,
    },

    /// Decode every frame independently and report broken files
    Validate {
        /// Dataset directory
        directory: PathBuf,
    },

    /// Render a frame's residual magnitudes as a PNG heatmap
    Plot {
        /// Frame XML file
        file: PathBuf,
        /// Output PNG file path (defaults to the frame name with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a synthetic dataset for pipeline testing
    Synth {
        /// Output directory
        directory: PathBuf,
        /// Number of frames
        #[arg(long, default_value_t = 10)]
        frames: usize,
        /// Grid width (written as rows)
        #[arg(long, default_value_t = 64)]
        width: u32,
        /// Grid height (written as cols)
        #[arg(long, default_value_t = 48)]
        height: u32,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .expect("spinner template is valid"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar over a known number of frames
fn create_progress(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .expect("progress template is valid"),
    );
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .format_timestamp_secs()
        .init();

    let config = match &cli.config {
        Some(path) => match AppConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                AppConfig::default()
            }
        },
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::List { directory } => cmd_list(&directory, &config),
        Commands::Replay { directory, limit, csv } => {
            cmd_replay(&directory, limit, csv.as_deref(), &config)
        }
        Commands::Inspect { file } => cmd_inspect(&file),
        Commands::Validate { directory } => cmd_validate(&directory, &config),
        Commands::Plot { file, output } => cmd_plot(&file, output, &config),
        Commands::Synth { directory, frames, width, height } => {
            cmd_synth(&directory, frames, width, height)
        }
    }
}

fn open_or_exit(directory: &Path, config: &AppConfig) -> SceneFlowReplay {
    match SceneFlowReplay::open(directory, &config.replay) {
        Ok(replay) => replay,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_list(directory: &Path, config: &AppConfig) {
    let replay = open_or_exit(directory, config);

    for (index, name) in replay.frame_names().iter().enumerate() {
        println!("{:>5}  {}", index, name);
    }

    print_summary(
        "Frame Listing",
        &[
            ("Directory", directory.display().to_string()),
            ("Frames", replay.len().to_string()),
            ("Pattern", config.replay.file_pattern.clone()),
        ],
    );
}

fn cmd_replay(directory: &Path, limit: Option<usize>, csv: Option<&Path>, config: &AppConfig) {
    let start = Instant::now();
    let mut replay = open_or_exit(directory, config);

    let total = limit.map_or(replay.len(), |lim| lim.min(replay.len()));
    let progress = create_progress(total as u64);
    let mut records = Vec::with_capacity(total);
    let mut cells = 0usize;
    let mut moving_cells = 0usize;

    while replay.cursor() < total {
        let name = replay.frame_names()[replay.cursor()].clone();
        progress.set_message(name.clone());

        match replay.read_next() {
            Ok(frame) => {
                cells += frame.num_cells();
                moving_cells += frame.nonzero_residuals();
                records.push(TransformRecord::from_frame(name, &frame));
                progress.inc(1);
            }
            Err(e) => {
                progress.abandon();
                error!("Replay stopped at frame {}: {}", replay.cursor(), e);
                std::process::exit(1);
            }
        }
    }
    progress.finish_and_clear();

    if let Some(csv_path) = csv {
        if let Err(e) = writers::write_transforms_csv(csv_path, &records) {
            error!("Failed to write transforms: {}", e);
            std::process::exit(1);
        }
    }

    print_summary(
        "Replay Complete",
        &[
            ("Directory", directory.display().to_string()),
            ("Frames read", records.len().to_string()),
            ("Frames remaining", replay.remaining().to_string()),
            ("Residual cells", cells.to_string()),
            ("Non-zero residuals", moving_cells.to_string()),
            (
                "Transforms CSV",
                csv.map_or("-".to_string(), |p| p.display().to_string()),
            ),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_inspect(file: &Path) {
    let frame = match loaders::load_scene_flow(file) {
        Ok(frame) => frame,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let t = frame.translation;
    let r = frame.rotation;

    print_summary(
        "Scene Flow Frame",
        &[
            ("File", file.display().to_string()),
            ("Translation", format!("({}, {}, {})", t.x, t.y, t.z)),
            ("Rotation", format!("({}, {}, {})", r.x, r.y, r.z)),
            ("Grid", format!("{} x {}", frame.width, frame.height)),
            ("Non-zero residuals", frame.nonzero_residuals().to_string()),
        ],
    );
}

fn cmd_validate(directory: &Path, config: &AppConfig) {
    let start = Instant::now();
    let spinner = create_spinner("Decoding frames...");

    let report = match validation::validate_dataset(directory, &config.replay) {
        Ok(report) => report,
        Err(e) => {
            spinner.finish_and_clear();
            error!("{}", e);
            std::process::exit(1);
        }
    };
    spinner.finish_and_clear();

    for failure in report.failures() {
        println!(
            "{:>5}  {}: {}",
            failure.index,
            failure.file_name,
            failure.error.as_deref().unwrap_or_default()
        );
    }

    print_summary(
        "Validation Complete",
        &[
            ("Directory", directory.display().to_string()),
            ("Frames", report.total().to_string()),
            ("Valid", report.valid().to_string()),
            ("Consistent grid", report.is_consistent().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if report.valid() != report.total() {
        std::process::exit(1);
    }
}

fn cmd_plot(file: &Path, output: Option<PathBuf>, config: &AppConfig) {
    use crate::visualization;

    let start = Instant::now();
    let output_path = output.unwrap_or_else(|| file.with_extension("png"));

    let spinner = create_spinner("Loading frame...");

    let frame = match loaders::load_scene_flow(file) {
        Ok(frame) => frame,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load frame: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Generating plot...");

    let size = (config.output.plot_width, config.output.plot_height);
    match visualization::plot_residual_magnitude(&output_path, &frame, size) {
        Ok(()) => {
            spinner.finish_and_clear();
            print_summary(
                "Plot Complete",
                &[
                    ("Input file", file.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Grid", format!("{} x {}", frame.width, frame.height)),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Plot failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_synth(directory: &Path, frames: usize, width: u32, height: u32) {
    let start = Instant::now();
    let spinner = create_spinner("Writing synthetic frames...");

    match synth::write_synthetic_dataset(directory, frames, width, height) {
        Ok(paths) => {
            spinner.finish_and_clear();
            print_summary(
                "Synthetic Dataset Written",
                &[
                    ("Directory", directory.display().to_string()),
                    ("Frames", paths.len().to_string()),
                    ("Grid", format!("{} x {}", width, height)),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Synthetic dataset failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
