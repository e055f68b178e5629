mod error;
mod grid_2d;
mod params;
mod particle_system;
mod particles;
mod raw_data;
mod sort;
mod timer;
mod uniforms;

use std::str::FromStr;

use anyhow::Context;
use tracing::info;

pub use error::{ConfigError, PipelineOrderingError, StepError};
pub use grid_2d::{
    Bounds2D, CellCoord, Grid2D, Grid2DRaw, GridEntry, GridIndexRange, GridIndices, Wall,
    GRID_CELL_COUNT, GRID_DIM,
};
pub use params::{
    DensityPolicy, KernelCoefficients, NeighborSearch, SimulationParams, DEFAULT_DENSITY_FLOOR,
    MAX_WALLS,
};
pub use particle_system::{grid_pass, integrate, sph, utils, Simulation, StepReport};
pub use particles::{Particle, ParticleRaw, MAX_PARTICLES};
pub use raw_data::HostBufferData;
pub use sort::{BitonicKeySorter, KeySorter, RayonKeySorter, SortStrategy};
pub use timer::StageTimer;
pub use uniforms::{SimulationConstants, SimulationConstantsRaw, Stage};

const DEFAULT_PARTICLES: usize = 16 * 1024;
const DEFAULT_STEPS: u64 = 600;
const REPORT_INTERVAL: u64 = 100;

/// Headless dam break. `SPH2D_PARTICLES` and `SPH2D_STEPS` override the
/// defaults.
pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let particle_count: usize = env_or("SPH2D_PARTICLES", DEFAULT_PARTICLES)?;
    let steps: u64 = env_or("SPH2D_STEPS", DEFAULT_STEPS)?;

    let params = SimulationParams::default();
    let particles = utils::dam_break(particle_count, params.particle_gap, params.domain.min);
    let mut simulation =
        Simulation::new(params, particles).context("invalid simulation setup")?;

    for _ in 0..steps {
        let report = simulation.step()?;
        if report.step % REPORT_INTERVAL == 0 {
            info!(
                "step {}: density in [{:.1}, {:.1}], {} clamped, {:?} per step",
                report.step,
                report.min_density,
                report.max_density,
                report.clamped_densities,
                simulation.stage_timings().average_step()
            );
        }
    }

    let timings = simulation.stage_timings();
    for stage in Stage::ALL {
        if let Some(average) = timings.average(stage) {
            info!("{:>20}: {:?}", stage.name(), average);
        }
    }

    Ok(())
}

fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{name}={value} is not a valid value")),
        Err(_) => Ok(default),
    }
}
