// ============================================================================
// Hydration run orchestrator
//
// Owns the simulation state plus the engines that act on it and advances the
// microstructure one cycle at a time. Every pass takes the state by `&mut`;
// nothing is shared between passes except through `SimulationState`.
// ============================================================================

use tracing::{debug, info};

use crate::chemistry::ChemistrySolver;
use crate::clock::{HydrationClock, TimeModel};
use crate::config::{HydrationParams, SimulationConfig};
use crate::diffusion::{DiffusionEngine, StepReport};
use crate::dissolution::{apply_schedule, dissolve, DeactivationReport, DissolutionReport};
use crate::error::Result;
use crate::lattice::Lattice;
use crate::state::SimulationState;
use crate::water::self_desiccate;

/// Per-cycle diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u32,
    pub time_h: f64,
    pub cracked: bool,
    pub deactivation: DeactivationReport,
    pub dissolution: DissolutionReport,
    pub diffusion: StepReport,
    /// Pore voxels emptied by self-desiccation.
    pub emptied: usize,
    pub percolation_checked: bool,
    pub alpha: f64,
    pub heat: f64,
    pub ph: f64,
    pub pore_percolates: bool,
    pub set: bool,
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[Cycle {:>5}] t={:.2}h  alpha={:.4}  heat={:.1}J/g  pH={:.2}  \
             dissolved={}  reacted={}  nucleated={}  tracers={}  emptied={}  \
             pores={}  set={}",
            self.cycle,
            self.time_h,
            self.alpha,
            self.heat,
            self.ph,
            self.dissolution.dissolved,
            self.diffusion.reactions,
            self.diffusion.nucleations,
            self.diffusion.remaining,
            self.emptied,
            if self.pore_percolates { "open" } else { "closed" },
            self.set,
        )
    }
}

pub struct HydrationSimulation {
    pub config: SimulationConfig,
    pub params: HydrationParams,
    pub state: SimulationState,

    // --- Engines ---
    pub engine: DiffusionEngine,
    pub solver: ChemistrySolver,
    pub clock: HydrationClock,
}

impl HydrationSimulation {
    pub fn new(
        lattice: Lattice,
        config: SimulationConfig,
        params: HydrationParams,
        time: TimeModel,
    ) -> Result<Self> {
        config.validate()?;
        params.validate()?;
        let state = SimulationState::new(lattice, &params, config.seed);
        let engine = DiffusionEngine::new(&params, config.csh_plates);
        let solver = ChemistrySolver::new(config.chemistry.clone());
        info!(
            dims = ?state.lattice.dims(),
            cycles = config.cycles,
            seed = config.seed,
            curing = ?config.curing,
            "hydration run initialized"
        );
        Ok(Self {
            config,
            params,
            state,
            engine,
            solver,
            clock: HydrationClock::new(time),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.state.cycle >= self.config.cycles
    }

    /// Advance one hydration cycle.
    pub fn step_cycle(&mut self) -> CycleReport {
        self.state.cycle += 1;
        let cycle = self.state.cycle;
        let is_final = cycle >= self.config.cycles;

        // ===================================================================
        // 1. CRACK: open the configured slab at the start of its cycle
        // ===================================================================
        let cracked = match self.config.crack {
            Some(crack) if crack.cycle == cycle => {
                self.state.insert_crack(crack.axis, crack.width);
                true
            }
            _ => false,
        };

        // ===================================================================
        // 2. DEACTIVATION: hide or reopen scheduled surfaces
        // ===================================================================
        let deactivation = apply_schedule(
            &mut self.state.lattice,
            &mut self.state.rng,
            &self.config.deactivation,
            cycle,
        );

        // ===================================================================
        // 3. DISSOLUTION: exposed soluble voxels release tracers
        // ===================================================================
        let (lo, hi) = self.config.dissolution_range;
        let dissolution = dissolve(&mut self.state, lo..=hi, self.config.neighborhood);

        // ===================================================================
        // 4. DIFFUSION-REACTION: walk tracers until exhausted or out of steps
        //    (the final cycle forces leftovers to nucleate)
        // ===================================================================
        let diffusion = self
            .engine
            .step(&mut self.state, self.params.diffusion_steps, is_final);

        // ===================================================================
        // 5. COUNTERS: full rebuild from the lattice, CSH aging per layer
        // ===================================================================
        self.state
            .counters
            .rebuild(&self.state.lattice, cycle, &self.params.csh_aging);

        // ===================================================================
        // 6. PERCOLATION: periodic pore and skeleton burns
        // ===================================================================
        let interval = self.config.percolation_interval;
        let percolation_checked = is_final || (interval > 0 && cycle % interval == 0);
        if percolation_checked {
            self.state.percolation.evaluate(&self.state.lattice, cycle);
        }

        // ===================================================================
        // 7. WATER: sealed curing empties pores to match chemical shrinkage
        // ===================================================================
        let emptied = self_desiccate(
            &mut self.state.lattice,
            &mut self.state.counters,
            self.config.curing,
        );

        // ===================================================================
        // 8. TIME & CHEMISTRY: elapsed time, pore solution, rate feedback
        // ===================================================================
        let time_h = self.clock.advance(cycle, &self.state.counters);
        self.state.chemistry =
            self.solver
                .update(&self.state.counters, time_h, &self.state.chemistry);
        self.state.reaction.update(
            &self.state.counters,
            &self.state.chemistry,
            &self.params,
            self.config.ph_feedback,
        );

        // ===================================================================
        // 9. DIAGNOSTICS
        // ===================================================================
        let report = CycleReport {
            cycle,
            time_h,
            cracked,
            deactivation,
            dissolution,
            diffusion,
            emptied,
            percolation_checked,
            alpha: self.state.counters.degree_of_hydration(),
            heat: self.state.counters.heat_released(),
            ph: self.state.chemistry.ph,
            pore_percolates: self.state.percolation.pore_percolates(),
            set: self.state.percolation.is_set(),
        };
        debug!(cycle, time_h, alpha = report.alpha, "cycle complete");
        report
    }

    /// Run the remaining cycles, handing each report to `observer`.
    pub fn run_with<F>(&mut self, mut observer: F) -> Result<()>
    where
        F: FnMut(&SimulationState, &CycleReport) -> Result<()>,
    {
        while !self.is_finished() {
            let report = self.step_cycle();
            observer(&self.state, &report)?;
        }
        info!(
            cycles = self.state.cycle,
            time_h = self.clock.time_h,
            alpha = self.state.counters.degree_of_hydration(),
            set_point = ?self.state.percolation.set_point,
            "hydration run complete"
        );
        Ok(())
    }

    pub fn run(&mut self) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        while !self.is_finished() {
            reports.push(self.step_cycle());
        }
        reports
    }
}
