//! cemhyd command-line runner.
//!
//! ```bash
//! # 1000 cycles over an image with its particle ids, outputs in ./run
//! cemhyd --image paste.img --particles paste.pimg -o run --cycles 1000
//!
//! # calibrate time against measured heat and use a TOML run file
//! cemhyd --image paste.img --config sealed.toml --calibration heat.dat
//! ```

use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cemhyd::clock::TimeModel;
use cemhyd::io::{self, CycleLog, ParticleInventory, SnapshotWriter};
use cemhyd::{HydrationParams, HydrationSimulation, SimulationConfig};

/// Stochastic cement hydration on a voxel microstructure.
#[derive(Parser, Debug)]
#[command(name = "cemhyd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Microstructure phase image
    #[arg(short = 'i', long)]
    image: PathBuf,

    /// Particle-id image matching the phase image
    #[arg(short = 'p', long)]
    particles: Option<PathBuf>,

    /// Ordered hydration-parameter file (defaults when omitted)
    #[arg(long)]
    params: Option<PathBuf>,

    /// TOML run configuration
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Calibration series (one header line, then `time value` pairs)
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Directory for CSV output, snapshots and reports
    #[arg(short = 'o', long, default_value = "cemhyd-out")]
    output_dir: PathBuf,

    /// Override the configured number of cycles
    #[arg(long)]
    cycles: Option<u32>,

    /// Override the configured random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Log a progress line every N cycles
    #[arg(long, default_value = "10")]
    progress: u32,

    /// Debug-level logging for the cemhyd crate
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_path(path)
            .with_context(|| format!("loading run configuration {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    if let Some(cycles) = args.cycles {
        config.cycles = cycles;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let params = match &args.params {
        Some(path) => HydrationParams::from_path(path)
            .with_context(|| format!("reading parameter file {}", path.display()))?,
        None => HydrationParams::default(),
    };

    let time = match &args.calibration {
        Some(path) => TimeModel::Calibrated {
            series: io::load_calibration(path)
                .with_context(|| format!("reading calibration file {}", path.display()))?,
            kind: config.time.calibration,
        },
        None => TimeModel::Parabolic {
            beta: config.time.beta,
        },
    };

    let mut lattice = io::load_image(&args.image)
        .with_context(|| format!("reading microstructure {}", args.image.display()))?;
    if let Some(path) = &args.particles {
        io::load_particles(path, &mut lattice)
            .with_context(|| format!("reading particle image {}", path.display()))?;
    }

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating output directory {}", args.output_dir.display()))?;
    let particles = ParticleInventory::capture(&lattice);
    let mut log = CycleLog::create(&args.output_dir)?;
    let snapshot_interval = config.snapshot_interval;
    let mut snapshots = if snapshot_interval > 0 {
        Some(SnapshotWriter::create(&args.output_dir)?)
    } else {
        None
    };

    let mut sim = HydrationSimulation::new(lattice, config, params, time)?;
    let progress = args.progress.max(1);
    sim.run_with(|state, report| {
        log.record(state, report.time_h)?;
        if let Some(snaps) = snapshots.as_mut() {
            if report.cycle % snapshot_interval == 0 {
                snaps.write(&state.lattice, report.cycle, report.time_h)?;
            }
        }
        if report.cycle % progress == 0 || report.cracked {
            info!("{report}");
        }
        Ok(())
    })?;
    log.flush()?;

    let final_image = args.output_dir.join("final.img");
    let file = std::fs::File::create(&final_image)
        .with_context(|| format!("creating {}", final_image.display()))?;
    let mut out = BufWriter::new(file);
    io::write_image(&sim.state.lattice, &mut out)?;
    out.flush()
        .with_context(|| format!("writing {}", final_image.display()))?;
    if !particles.is_empty() {
        particles.write(&sim.state.lattice, &args.output_dir.join(io::output::PARTICLES_FILE))?;
    }

    info!(
        output = %args.output_dir.display(),
        snapshots = snapshots.as_ref().map_or(0, SnapshotWriter::written),
        "outputs written"
    );
    Ok(())
}

fn main() {
    let args = Args::parse();
    let default_filter = if args.verbose {
        "warn,cemhyd=debug"
    } else {
        "warn,cemhyd=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    if let Err(e) = run(args) {
        error!("{e:#}");
        std::process::exit(1);
    }
}
