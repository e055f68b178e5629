pub(crate) mod buffers;
pub mod grid_pass;
pub mod integrate;
pub mod pipeline;
pub mod sph;
pub mod utils;

pub use pipeline::{Simulation, StepReport};
