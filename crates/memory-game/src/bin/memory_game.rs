use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use memory_game::core::Quad;
use memory_game::markers::{MarkerCatalog, MarkerTemplate, ShadowedTemplate};
use memory_game::{detect, MemoryGameConfig};
use serde::Serialize;
use std::{fs, path::PathBuf};

#[derive(Parser)]
#[command(name = "memory-game", version, about = "Fiducial marker identification for the memory game")]
struct Cli {
    /// Log level; with the `tracing` feature, `RUST_LOG` overrides it.
    #[arg(long, global = true, default_value = "warn")]
    log_level: LevelFilter,

    /// Emit JSON-formatted tracing events (with the `tracing` feature).
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the built-in marker catalog, with every rotation, as JSON.
    Catalog,
    /// Run one frame of the pipeline over an image.
    Detect {
        /// JSON pipeline config; defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Grayscale or color image of the frame.
        #[arg(long)]
        image: PathBuf,
        /// JSON array of quads: `[{"corners": [[x, y], ...]}, ...]`. When
        /// omitted, candidates are traced from the image.
        #[arg(long)]
        quads: Option<PathBuf>,
        /// OpenCV calibration JSON; overrides the config's camera.
        #[arg(long)]
        calibration: Option<PathBuf>,
        /// Write the frame report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct CatalogDump<'a> {
    grid_size: usize,
    templates: Vec<&'a MarkerTemplate>,
    shadowed: Vec<ShadowedTemplate>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.json_logs)?;

    match cli.command {
        Command::Catalog => {
            let catalog = MarkerCatalog::builtin();
            let dump = CatalogDump {
                grid_size: catalog.grid_size(),
                templates: catalog.templates().iter().map(|t| t.as_ref()).collect(),
                shadowed: catalog.duplicate_patterns(),
            };
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
        Command::Detect {
            config,
            image,
            quads,
            calibration,
            output,
        } => {
            let mut cfg = match config {
                Some(path) => MemoryGameConfig::load_json(path)?,
                None => MemoryGameConfig::default(),
            };
            if calibration.is_some() {
                cfg.calibration_path = calibration;
            }

            let img = detect::load_gray(&image)?;
            let quads: Vec<Quad> = match quads {
                Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
                None => detect::find_quads(&img),
            };
            info!(
                "{}: {}x{}, {} candidate quads",
                image.display(),
                img.width(),
                img.height(),
                quads.len()
            );

            let mut processor = cfg.build_processor(MarkerCatalog::builtin())?;
            let report = detect::process_image(&mut processor, &img, &quads);

            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    info!("report written to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

#[cfg(feature = "tracing")]
fn init_logging(level: LevelFilter, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    // `log` records from the pipeline crates become tracing events.
    let _ = tracing_log::LogTracer::init();
    memory_game::core::init_tracing(level, json);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LevelFilter, _json: bool) -> Result<(), Box<dyn std::error::Error>> {
    memory_game::core::init_with_level(level)?;
    Ok(())
}
