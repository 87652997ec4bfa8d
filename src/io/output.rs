//! Run outputs: the per-cycle CSV, the per-phase fraction table, lattice
//! snapshots with their index, and the per-particle hydration report.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{HydrationError, Result};
use crate::io::image::write_image;
use crate::lattice::Lattice;
use crate::phase::Phase;
use crate::state::SimulationState;

pub const CYCLES_FILE: &str = "cycles.csv";
pub const PHASES_FILE: &str = "phases.csv";
pub const SNAPSHOT_INDEX_FILE: &str = "snapshots.idx";
pub const PARTICLES_FILE: &str = "particles.csv";

// --- Per-cycle record (CSV) ---
#[derive(Debug, Clone, Serialize)]
pub struct CycleRow {
    pub cycle: u32,
    pub time_h: f64,
    pub alpha: f64,
    /// Heat released [J/g].
    pub heat: f64,
    /// Chemical shrinkage [mL/g].
    pub chemical_shrinkage: f64,
    pub ph: f64,
    /// Conductivity [S/m].
    pub conductivity: f64,
    pub ca: f64,
    pub so4: f64,
    pub k: f64,
    pub na: f64,
    pub porosity: f64,
    pub empty_porosity: f64,
    pub csh: f64,
    pub ch: f64,
    pub ettringite: f64,
    pub afm: f64,
    pub pore_percolates: bool,
    pub solid_percolates: bool,
    pub pore_connectivity: f64,
    pub solid_connectivity: f64,
    pub tracers: usize,
    pub strain: u64,
}

impl CycleRow {
    pub fn capture(state: &SimulationState, time_h: f64) -> Self {
        let c = &state.counters;
        let chem = &state.chemistry;
        let perc = &state.percolation;
        Self {
            cycle: state.cycle,
            time_h,
            alpha: c.degree_of_hydration(),
            heat: c.heat_released(),
            chemical_shrinkage: c.chemical_shrinkage(),
            ph: chem.ph,
            conductivity: chem.conductivity,
            ca: chem.ca,
            so4: chem.so4,
            k: chem.k,
            na: chem.na,
            porosity: c.volume_fraction(Phase::Porosity),
            empty_porosity: c.volume_fraction(Phase::EmptyPore),
            csh: c.volume_fraction(Phase::Csh),
            ch: c.volume_fraction(Phase::Ch),
            ettringite: c.volume_fraction(Phase::Ettringite),
            afm: c.volume_fraction(Phase::Afm),
            pore_percolates: perc.pore_percolates(),
            solid_percolates: perc.is_set(),
            pore_connectivity: perc.pore_connectivity(),
            solid_connectivity: perc.solid_connectivity(),
            tracers: state.tracers.len(),
            strain: c.strain_total(),
        }
    }
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>> {
    let file = File::create(path).map_err(|e| HydrationError::io(path, e))?;
    Ok(csv::Writer::from_writer(file))
}

/// Per-cycle CSV plus a wide table of every phase's volume fraction.
pub struct CycleLog {
    cycles: csv::Writer<File>,
    phases: csv::Writer<File>,
}

impl CycleLog {
    pub fn create(dir: &Path) -> Result<Self> {
        let cycles = csv_writer(&dir.join(CYCLES_FILE))?;
        let mut phases = csv_writer(&dir.join(PHASES_FILE))?;
        let mut header = vec!["cycle".to_string()];
        header.extend(Phase::ALL.iter().map(|p| p.name().to_string()));
        phases.write_record(&header)?;
        Ok(Self { cycles, phases })
    }

    pub fn record(&mut self, state: &SimulationState, time_h: f64) -> Result<()> {
        // header is handled automatically by serialize
        self.cycles.serialize(CycleRow::capture(state, time_h))?;

        let mut row = Vec::with_capacity(Phase::COUNT + 1);
        row.push(state.cycle.to_string());
        row.extend(
            Phase::ALL
                .iter()
                .map(|&p| format!("{:.6}", state.counters.volume_fraction(p))),
        );
        self.phases.write_record(&row)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.cycles.flush()?;
        self.phases.flush()?;
        Ok(())
    }
}

/// Lattice snapshots in the current image format, listed in an index file
/// as `time filename` lines.
pub struct SnapshotWriter {
    dir: PathBuf,
    index: BufWriter<File>,
    written: usize,
}

impl SnapshotWriter {
    pub fn create(dir: &Path) -> Result<Self> {
        let path = dir.join(SNAPSHOT_INDEX_FILE);
        let file = File::create(&path).map_err(|e| HydrationError::io(&path, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            index: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn file_name(cycle: u32) -> String {
        format!("snapshot_{cycle:05}.img")
    }

    pub fn write(&mut self, lattice: &Lattice, cycle: u32, time_h: f64) -> Result<PathBuf> {
        let name = Self::file_name(cycle);
        let path = self.dir.join(&name);
        let file = File::create(&path).map_err(|e| HydrationError::io(&path, e))?;
        let mut out = BufWriter::new(file);
        write_image(lattice, &mut out)?;
        out.flush().map_err(|e| HydrationError::io(&path, e))?;

        writeln!(self.index, "{time_h:.4} {name}")?;
        self.index.flush()?;
        self.written += 1;
        debug!(cycle, time_h, path = %path.display(), "snapshot written");
        Ok(path)
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParticleRow {
    pub particle: u32,
    pub original: u64,
    pub remaining: u64,
    pub alpha: f64,
}

/// Clinker voxels per particle id, captured before the first cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleInventory {
    original: BTreeMap<u32, u64>,
}

fn clinker_by_particle(lattice: &Lattice) -> BTreeMap<u32, u64> {
    let mut out = BTreeMap::new();
    for (phase, &id) in lattice.phase.iter().zip(&lattice.particle) {
        if id != 0 && Phase::CLINKER.contains(phase) {
            *out.entry(id).or_insert(0) += 1;
        }
    }
    out
}

impl ParticleInventory {
    pub fn capture(lattice: &Lattice) -> Self {
        Self {
            original: clinker_by_particle(lattice),
        }
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Degree of hydration of every captured particle against `lattice`.
    pub fn report(&self, lattice: &Lattice) -> Vec<ParticleRow> {
        let now = clinker_by_particle(lattice);
        self.original
            .iter()
            .map(|(&particle, &original)| {
                let remaining = now.get(&particle).copied().unwrap_or(0).min(original);
                ParticleRow {
                    particle,
                    original,
                    remaining,
                    alpha: 1.0 - remaining as f64 / original as f64,
                }
            })
            .collect()
    }

    pub fn write(&self, lattice: &Lattice, path: &Path) -> Result<()> {
        let mut wtr = csv_writer(path)?;
        let rows = self.report(lattice);
        for row in &rows {
            wtr.serialize(row)?;
        }
        wtr.flush().map_err(|e| HydrationError::io(path, e))?;
        info!(path = %path.display(), particles = rows.len(), "particle report written");
        Ok(())
    }
}
