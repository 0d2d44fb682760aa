use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glam::Vec3;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use crate::attention::PointerEvent;
use crate::engine::Engine;
use crate::export::{ExportJobSpec, RunMetadata};
use crate::mesh::BaseMesh;
use crate::params::{AutomationMode, EngineConfig, Preset};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Step the simulation deterministically and write per-frame reports
    Simulate {
        /// Job specification JSON; command-line flags override its fields
        #[arg(long)]
        job: Option<PathBuf>,

        /// OBJ mesh to deform (defaults to a generated grid)
        #[arg(long)]
        mesh: Option<PathBuf>,

        /// Engine configuration JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output file for JSON-lines frame reports (stdout if omitted)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Frames per second
        #[arg(long)]
        fps: Option<f64>,

        /// Number of frames to step
        #[arg(long)]
        frames: Option<u64>,

        /// Duration in seconds (used when --frames is absent)
        #[arg(long)]
        duration: Option<f64>,

        /// Seed override
        #[arg(long)]
        seed: Option<u32>,

        /// Distortion preset (calm, default, explosive)
        #[arg(long)]
        preset: Option<String>,

        /// Automation mode (off, sweep, bpmBuzz)
        #[arg(long)]
        automation: Option<String>,

        /// Tempo for bpmBuzz automation
        #[arg(long)]
        bpm: Option<f32>,

        /// Pin the pointer at x,y,z in mesh-local space
        #[arg(long, value_delimiter = ',', num_args = 3)]
        pointer: Option<Vec<f32>>,

        /// Where to write run metadata JSON
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
    /// List distortion presets as JSON
    Presets,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            job,
            mesh,
            config,
            out,
            fps,
            frames,
            duration,
            seed,
            preset,
            automation,
            bpm,
            pointer,
            metadata,
        } => {
            let mut spec = match job {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read job file {:?}", path))?;
                    serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse job file {:?}", path))?
                }
                None => ExportJobSpec::new(),
            };
            spec.mesh_path = mesh.or(spec.mesh_path);
            spec.config_path = config.or(spec.config_path);
            spec.output_path = out.or(spec.output_path);
            spec.fps = fps.unwrap_or(spec.fps);
            spec.frames = frames.or(spec.frames);
            spec.duration = duration.or(spec.duration);
            spec.seed = seed.or(spec.seed);
            spec.preset = preset.or(spec.preset);
            if let Some(name) = automation {
                spec.automation = Some(AutomationMode::parse(&name)?);
            }
            spec.bpm = bpm.or(spec.bpm);
            if let Some(p) = pointer {
                spec.pointer = Some([p[0], p[1], p[2]]);
            }

            spec.validate().map_err(|e| anyhow::anyhow!(e))?;
            simulate(spec, metadata)?;
        }
        Commands::Presets => {
            let presets: serde_json::Map<String, serde_json::Value> = Preset::ALL
                .iter()
                .map(|p| Ok((p.name().to_string(), serde_json::to_value(p.params())?)))
                .collect::<Result<_, serde_json::Error>>()?;
            println!("{}", serde_json::to_string_pretty(&presets)?);
        }
    }
    Ok(())
}

fn load_config(spec: &ExportJobSpec) -> Result<EngineConfig> {
    let mut config = match &spec.config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {:?}", path))?;
            EngineConfig::from_json(&content)
                .with_context(|| format!("Invalid config {:?}", path))?
        }
        None => EngineConfig::default(),
    };
    if let Some(name) = &spec.preset {
        config.distortion = Preset::parse(name)?.params();
    }
    if let Some(seed) = spec.seed {
        config.seed = seed;
    }
    if let Some(mode) = spec.automation {
        config.automation.mode = mode;
    }
    if let Some(bpm) = spec.bpm {
        config.automation.buzz.bpm = bpm;
    }
    Ok(config)
}

fn load_mesh(spec: &ExportJobSpec) -> Result<BaseMesh> {
    let mesh = match &spec.mesh_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read mesh {:?}", path))?;
            BaseMesh::from_obj(&content).with_context(|| format!("Invalid mesh {:?}", path))?
        }
        None => BaseMesh::grid(spec.grid_columns, spec.grid_rows, 4.0, 1.0)?,
    };
    Ok(mesh)
}

fn simulate(spec: ExportJobSpec, metadata_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(&spec)?;
    let mesh = load_mesh(&spec)?;
    let vertex_count = mesh.vertex_count();

    let mut engine = Engine::new(config);
    engine.adopt_mesh(mesh);
    if let Some(p) = spec.pointer {
        engine.handle_pointer(PointerEvent::Move(Vec3::from(p)));
    }

    let mut writer: Box<dyn Write> = match &spec.output_path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };

    let total_frames = spec.total_frames();
    log::info!(
        "Stepping {} frames at {} fps over {} vertices",
        total_frames,
        spec.fps,
        vertex_count
    );

    let started_at = chrono::Utc::now();
    let wall = Instant::now();

    engine.begin_export(spec.fps);
    for _ in 0..total_frames {
        let report = engine
            .export_step()
            .context("Simulation stopped stepping before the last frame")?;
        serde_json::to_writer(&mut writer, &report)?;
        writer.write_all(b"\n")?;
    }
    engine.end_export();
    writer.flush()?;

    let metadata = RunMetadata {
        started_at,
        completed_at: chrono::Utc::now(),
        run_duration_secs: wall.elapsed().as_secs_f64(),
        frame_count: total_frames,
        final_time: engine.clock().time(),
        vertex_count,
        config_hash: spec
            .config_path
            .as_deref()
            .map(RunMetadata::hash_file)
            .transpose()?,
        mesh_hash: spec
            .mesh_path
            .as_deref()
            .map(RunMetadata::hash_file)
            .transpose()?,
        positions_hash: RunMetadata::hash_bytes(engine.position_bytes()),
        glyphwarp_version: env!("CARGO_PKG_VERSION").to_string(),
        job: spec,
    };

    if let Some(path) = metadata_path {
        metadata.save(&path).map_err(|e| anyhow::anyhow!(e))?;
        log::info!("Wrote run metadata to {:?}", path);
    }
    log::info!(
        "Done: {} frames in {:.3}s, positions {}",
        metadata.frame_count,
        metadata.run_duration_secs,
        metadata.positions_hash
    );

    Ok(())
}
