//! File formats: microstructure images, calibration series and run outputs.
//! The ordered hydration-parameter file lives with `config::HydrationParams`.

pub mod calibration;
pub mod image;
pub mod output;

pub use calibration::{load_calibration, read_calibration};
pub use image::{load_image, load_particles, read_image, write_image, write_particles};
pub use output::{CycleLog, CycleRow, ParticleInventory, ParticleRow, SnapshotWriter};
