use clap::{Parser, Subcommand};
use imgbatch::acquire::{DecodeError, MediaType, SourceFile};
use imgbatch::color::BackgroundColor;
use imgbatch::controller::Controller;
use imgbatch::export::{ExportOptions, export_all};
use imgbatch::imaging::{OutputFormat, RustBackend, SizeMode, Tolerance};
use imgbatch::item::ItemParams;
use imgbatch::summary::Summary;
use imgbatch::{config, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "imgbatch")]
#[command(about = "Batch image resizing, background removal and re-encoding")]
#[command(long_about = "\
Batch image resizing, background removal and re-encoding

Loads up to 30 JPEG or PNG images, scales them, optionally clears a uniform
border-connected background, flattens them onto a background color and writes
WebP, JPEG or PNG files with safe names.

Pipeline per image:

  resize  →  remove background (optional)  →  composite  →  encode  →  name

Settings come from stock defaults, then ./imgbatch.toml (or --config), then
command-line flags. Run 'imgbatch gen-config' to generate a documented config.

Set IMGBATCH_LOG=imgbatch=debug for pipeline diagnostics.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./imgbatch.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert images and export them to a directory
    Convert(ConvertArgs),
    /// Print a stock imgbatch.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Input files or directories (directories are searched recursively)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(long, short, default_value = "converted")]
    output: PathBuf,

    /// Scale in percent (1-100)
    #[arg(long, conflicts_with_all = ["width", "height"], value_parser = clap::value_parser!(u32).range(1..=100))]
    percent: Option<u32>,

    /// Target width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Target height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Stretch to exactly --width/--height instead of fitting inside
    #[arg(long)]
    no_keep_aspect: bool,

    /// Encoding quality (1-100, ignored for PNG)
    #[arg(long, short)]
    quality: Option<u32>,

    /// Output format: webp, jpg or png
    #[arg(long, short)]
    format: Option<OutputFormat>,

    /// Background color: transparent, a name, #rgb, #rrggbb or rgb(r, g, b)
    #[arg(long)]
    background: Option<BackgroundColor>,

    /// Clear the border-connected background
    #[arg(long)]
    remove_background: bool,

    /// Background color distance tolerance (10-160)
    #[arg(long)]
    tolerance: Option<u32>,

    /// Output name for every image (duplicates get " (2)", " (3)", ...)
    #[arg(long)]
    name: Option<String>,

    /// Write a JSON export report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

impl ConvertArgs {
    /// Apply command-line overrides on top of configured defaults.
    fn apply(&self, params: &mut ItemParams) {
        if let Some(percent) = self.percent {
            params.size_mode = SizeMode::Percent;
            params.set_percent(percent);
        }
        if self.width.is_some() || self.height.is_some() {
            params.size_mode = SizeMode::Pixels;
            params.set_target_width(self.width);
            params.set_target_height(self.height);
        }
        if self.no_keep_aspect {
            params.keep_aspect_ratio = false;
        }
        if let Some(quality) = self.quality {
            params.quality = quality.into();
        }
        if let Some(format) = self.format {
            params.format = format;
        }
        if let Some(background) = self.background {
            params.background = background;
        }
        if self.remove_background {
            params.remove_background = true;
        }
        if let Some(tolerance) = self.tolerance {
            params.tolerance = Tolerance::new(tolerance);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Convert(args) => {
            let cwd = std::env::current_dir()?;
            let mut app_config = config::load_config(cli.config.as_deref(), &cwd)?;
            args.apply(&mut app_config.defaults);
            init_thread_pool(&app_config.processing);

            let (files, unreadable) = collect_inputs(&args.inputs);
            for error in &unreadable {
                eprintln!("{}", error);
            }

            let mut controller = Controller::new(RustBackend::new(), app_config.controller_settings());
            let admission = controller.admit(files);
            if let Some(name) = &args.name {
                for id in controller.collection().ids() {
                    controller.rename(id, name);
                }
            }
            output::print_admission(&admission, controller.collection());
            if controller.collection().is_empty() {
                return Err("no images to convert".into());
            }
            println!();

            let options = ExportOptions::new(&args.output).with_pacing(app_config.export_pacing());
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_export_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let report = export_all(&mut controller, &options, Some(tx))?;
            printer.join().map_err(|_| "output thread panicked")?;

            output::print_export_report(&report, &Summary::of(controller.collection()));
            if let Some(path) = &args.report {
                let json = serde_json::to_string_pretty(&report)?;
                std::fs::write(path, json)?;
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `IMGBATCH_LOG` or `RUST_LOG`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("IMGBATCH_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "imgbatch=warn".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. The user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Read explicit files as given and walk directories for JPEG/PNG files.
///
/// Directory entries are visited in file-name order. Explicit files are
/// passed through whatever their type, so admission can report them.
fn collect_inputs(inputs: &[PathBuf]) -> (Vec<SourceFile>, Vec<DecodeError>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    let mut read = |path: &Path| match SourceFile::read(path) {
        Ok(file) => files.push(file),
        Err(e) => errors.push(e),
    };

    for input in inputs {
        if !input.is_dir() {
            read(input);
            continue;
        }
        let entries = WalkDir::new(input)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file());
        for entry in entries {
            let name = entry.file_name().to_string_lossy();
            if MediaType::from_mime(MediaType::mime_for_name(&name)).is_some() {
                read(entry.path());
            }
        }
    }
    (files, errors)
}
