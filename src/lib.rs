//! cemhyd: stochastic cellular-automaton model of cement paste hydration.
//!
//! Architecture:
//! - Flat SoA voxel lattice (lattice module) with periodic wrap in x and y
//! - Data-driven phase capability and property tables (phase module)
//! - Tracer arena with free list and swap-remove (tracer module)
//! - Dissolution pass and diffusion-reaction engine with a rule table
//!   (dissolution, diffusion modules)
//! - Burning-algorithm percolation for pores and the solid skeleton
//! - Pore-solution chemistry with a Laguerre quartic solver (chemistry module)
//!
//! One cycle: dissolution → diffusion-reaction → counter rebuild →
//! percolation (periodic) → self-desiccation → time, chemistry and rate
//! feedback.

pub mod chemistry;
pub mod clock;
pub mod config;
pub mod counters;
pub mod diffusion;
pub mod dissolution;
pub mod error;
pub mod io;
pub mod lattice;
pub mod percolation;
pub mod phase;
pub mod reaction;
pub mod simulation;
pub mod state;
pub mod tracer;
pub mod water;

pub use config::{HydrationParams, SimulationConfig};
pub use error::{HydrationError, Result};
pub use lattice::Lattice;
pub use phase::Phase;
pub use simulation::{CycleReport, HydrationSimulation};
pub use state::{SimRng, SimulationState};
