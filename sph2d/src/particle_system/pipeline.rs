//! The per-step stage sequence and the buffers it runs over.
use cgmath::{prelude::*, Vector2};
use instant::{Duration, Instant};
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use super::{
    buffers::PingPong,
    grid_pass, integrate,
    sph::{self, NeighborQuery},
};
use crate::{
    error::{ConfigError, PipelineOrderingError, StepError},
    grid_2d::{CellCoord, GridEntry, GridIndexRange, GridIndices},
    params::{DensityPolicy, NeighborSearch, SimulationParams},
    particles::{Particle, ParticleRaw},
    raw_data::HostBufferData,
    sort::KeySorter,
    timer::StageTimer,
    uniforms::{SimulationConstants, SimulationConstantsRaw, Stage},
};

/// Particles the density and force passes read, with their neighbor query.
fn neighbor_source<'a>(
    search: NeighborSearch,
    sorted: &'a [Particle],
    current: &'a [Particle],
    grid_indices: &'a GridIndices,
) -> (&'a [Particle], NeighborQuery<'a>) {
    match search {
        NeighborSearch::Grid => (sorted, NeighborQuery::Grid(grid_indices)),
        NeighborSearch::BruteForce => (current, NeighborQuery::All(current.len())),
    }
}

/// Summary of one committed step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepReport {
    pub step: u64,
    pub dt: f32,
    pub clamped_densities: usize,
    pub min_density: f32,
    pub max_density: f32,
}

/// Position inside the stage sequence of the step in flight.
#[derive(Debug)]
struct StageCursor {
    sequence: &'static [Stage],
    next: usize,
}

impl StageCursor {
    fn new(search: NeighborSearch) -> Self {
        Self {
            sequence: Stage::sequence(search),
            next: 0,
        }
    }

    fn check(&self, stage: Stage) -> Result<(), PipelineOrderingError> {
        let expected = self.sequence[self.next];
        if expected == stage {
            Ok(())
        } else {
            Err(PipelineOrderingError {
                expected,
                found: stage,
            })
        }
    }

    /// Moves past the current stage, true once the whole step is done.
    fn advance(&mut self) -> bool {
        self.next = (self.next + 1) % self.sequence.len();
        self.next == 0
    }

    fn at_step_start(&self) -> bool {
        self.next == 0
    }

    fn reset(&mut self) {
        self.next = 0;
    }
}

pub struct Simulation {
    constants: SimulationConstants,
    density_policy: DensityPolicy,
    neighbor_search: NeighborSearch,
    sorter: Box<dyn KeySorter>,

    particles: PingPong<Particle>,
    ids: PingPong<u32>,
    sorted_particles: Vec<Particle>,
    grid_entries: Vec<GridEntry>,
    grid_indices: GridIndices,
    densities: Vec<f32>,
    forces: Vec<Vector2<f32>>,

    cursor: StageCursor,
    pending_dt: Option<f32>,
    pending_report: StepReport,
    last_report: Option<StepReport>,
    step_count: u64,
    timer: StageTimer,
}

impl Simulation {
    pub fn new(params: SimulationParams, particles: Vec<Particle>) -> Result<Self, ConfigError> {
        let sorter = params.sort.sorter();
        Self::with_sorter(params, particles, sorter)
    }

    pub fn from_raw(params: SimulationParams, raw: &[ParticleRaw]) -> Result<Self, ConfigError> {
        let particles = raw.iter().map(Particle::from_raw).collect();
        Self::new(params, particles)
    }

    /// Same as [`Simulation::new`] with a caller supplied key sort.
    pub fn with_sorter(
        params: SimulationParams,
        particles: Vec<Particle>,
        mut sorter: Box<dyn KeySorter>,
    ) -> Result<Self, ConfigError> {
        let n = particles.len();
        params.validate(n)?;
        if let Some(index) = particles.iter().position(|p| !p.is_finite()) {
            return Err(ConfigError::NonFiniteParticle(index));
        }
        sorter.reserve(n);

        let constants = SimulationConstants::new(&params, n);
        info!(
            "simulation with {} particles, h = {}, {:?} neighbor search, {} sort",
            n,
            params.smoothing_length,
            params.neighbor_search,
            sorter.name()
        );
        debug!("kernel coefficients: {:?}", constants.kernel);

        Ok(Self {
            constants,
            density_policy: params.density_policy,
            neighbor_search: params.neighbor_search,
            sorter,
            sorted_particles: particles.clone(),
            particles: PingPong::new(particles),
            ids: PingPong::new((0..n as u32).collect()),
            grid_entries: vec![GridEntry::default(); n],
            grid_indices: GridIndices::new(),
            densities: vec![0.0; n],
            forces: vec![Vector2::zero(); n],
            cursor: StageCursor::new(params.neighbor_search),
            pending_dt: None,
            pending_report: StepReport::default(),
            last_report: None,
            step_count: 0,
            timer: StageTimer::new(),
        })
    }

    /// Runs every stage of one step with the configured time step.
    pub fn step(&mut self) -> Result<StepReport, StepError> {
        self.step_with_dt(self.constants.time_step)
    }

    /// Runs one step of `min(frame_time, time_step)`, for hosts driven by
    /// wall-clock frame times.
    pub fn advance(&mut self, frame_time: f32) -> Result<StepReport, StepError> {
        let dt = if frame_time > 0.0 {
            frame_time.min(self.constants.time_step)
        } else {
            self.constants.time_step
        };
        self.step_with_dt(dt)
    }

    fn step_with_dt(&mut self, dt: f32) -> Result<StepReport, StepError> {
        if !self.cursor.at_step_start() {
            // a step left half way through by `run_stage` is thrown away
            debug!("discarding partially run step");
            self.cursor.reset();
        }
        self.pending_dt = Some(dt);

        for stage in Stage::sequence(self.neighbor_search) {
            self.run_stage(*stage)?;
        }

        Ok(self.pending_report)
    }

    /// Runs a single stage of the step in flight.
    ///
    /// # Panics
    /// If `stage` is not the next stage of the sequence.
    pub fn run_stage(&mut self, stage: Stage) -> Result<(), StepError> {
        if let Err(err) = self.cursor.check(stage) {
            panic!("{err}");
        }
        if self.cursor.at_step_start() {
            self.pending_report = StepReport::default();
        }

        let started = Instant::now();
        let result = self.execute(stage);
        let elapsed = started.elapsed();
        self.timer.record(stage, elapsed);
        trace!("{} took {:?}", stage.name(), elapsed);

        match result {
            Ok(()) => {
                if self.cursor.advance() {
                    self.commit();
                }
                Ok(())
            }
            Err(err) => {
                warn!("step {} abandoned: {}", self.step_count + 1, err);
                self.cursor.reset();
                self.pending_dt = None;
                Err(err)
            }
        }
    }

    fn execute(&mut self, stage: Stage) -> Result<(), StepError> {
        match stage {
            Stage::BuildGrid => {
                grid_pass::build_grid(
                    self.particles.front(),
                    &self.constants.grid,
                    &mut self.grid_entries,
                );
            }
            Stage::SortGrid => {
                grid_pass::sort_grid(&mut self.grid_entries, self.sorter.as_mut());
            }
            Stage::ClearGridIndices => {
                self.grid_indices.clear();
            }
            Stage::BuildGridIndices => {
                self.grid_indices.build(&self.grid_entries);
            }
            Stage::RearrangeParticles => {
                let (ids, sorted_ids) = self.ids.split();
                grid_pass::rearrange_particles(
                    self.particles.front(),
                    ids,
                    &self.grid_entries,
                    &mut self.sorted_particles,
                    sorted_ids,
                );
            }
            Stage::Density => {
                let (particles, query) = neighbor_source(
                    self.neighbor_search,
                    &self.sorted_particles,
                    self.particles.front(),
                    &self.grid_indices,
                );
                sph::compute_densities(particles, query, &self.constants, &mut self.densities);
                self.check_densities()?;
            }
            Stage::Force => {
                let (particles, query) = neighbor_source(
                    self.neighbor_search,
                    &self.sorted_particles,
                    self.particles.front(),
                    &self.grid_indices,
                );
                sph::compute_forces(
                    particles,
                    &self.densities,
                    query,
                    &self.constants,
                    &mut self.forces,
                );
            }
            Stage::Integrate => {
                let dt = self.pending_dt.unwrap_or(self.constants.time_step);
                match self.neighbor_search {
                    NeighborSearch::Grid => integrate::integrate(
                        &self.sorted_particles,
                        &self.forces,
                        &self.constants,
                        dt,
                        self.particles.back_mut(),
                    ),
                    NeighborSearch::BruteForce => {
                        let (particles, next) = self.particles.split();
                        integrate::integrate(particles, &self.forces, &self.constants, dt, next);
                    }
                }
                self.pending_report.dt = dt;
            }
        }
        Ok(())
    }

    fn check_densities(&mut self) -> Result<(), StepError> {
        match self.density_policy {
            DensityPolicy::Abort => {
                let unstable = |density: f32| !(density.is_finite() && density > 0.0);
                if let Some(particle) = self.densities.par_iter().position_first(|d| unstable(*d))
                {
                    return Err(StepError::NumericalInstability {
                        particle,
                        density: self.densities[particle],
                    });
                }
            }
            DensityPolicy::Clamp { floor } => {
                let clamped: usize = self
                    .densities
                    .par_iter_mut()
                    .map(|density| {
                        if !(density.is_finite() && *density >= floor) {
                            *density = floor;
                            1
                        } else {
                            0
                        }
                    })
                    .sum();
                if clamped > 0 {
                    warn!(
                        "{} particle densities clamped to {} in step {}",
                        clamped,
                        floor,
                        self.step_count + 1
                    );
                }
                self.pending_report.clamped_densities = clamped;
            }
        }

        let (min_density, max_density) = self
            .densities
            .par_iter()
            .fold(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |(lo, hi), d| (lo.min(*d), hi.max(*d)),
            )
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |a, b| (a.0.min(b.0), a.1.max(b.1)),
            );
        self.pending_report.min_density = min_density;
        self.pending_report.max_density = max_density;
        Ok(())
    }

    fn commit(&mut self) {
        self.particles.swap();
        if self.neighbor_search == NeighborSearch::Grid {
            self.ids.swap();
        }
        self.step_count += 1;
        self.pending_dt = None;

        self.pending_report.step = self.step_count;
        self.last_report = Some(self.pending_report);
        debug!(
            "step {} committed, dt = {}, density in [{}, {}]",
            self.step_count,
            self.pending_report.dt,
            self.pending_report.min_density,
            self.pending_report.max_density
        );
    }

    // ---------------------------------------------------------
    // host output

    /// Committed particle state. In grid mode the order is the cell order of
    /// the last step, see [`Simulation::particle_ids`].
    pub fn particles(&self) -> &[Particle] {
        self.particles.front()
    }

    /// Original index of every entry of [`Simulation::particles`].
    pub fn particle_ids(&self) -> &[u32] {
        self.ids.front()
    }

    pub fn particle_data(&self) -> Vec<ParticleRaw> {
        self.particles().iter().map(Particle::to_raw).collect()
    }

    /// Densities of the last density pass, aligned with [`Simulation::particles`]
    /// once the step is committed.
    pub fn densities(&self) -> &[f32] {
        &self.densities
    }

    /// Accelerations of the last force pass, aligned like the densities.
    pub fn forces(&self) -> &[Vector2<f32>] {
        &self.forces
    }

    pub fn constants(&self) -> &SimulationConstants {
        &self.constants
    }

    pub fn constants_raw(&self) -> SimulationConstantsRaw {
        self.constants.to_raw()
    }

    pub fn particle_count(&self) -> usize {
        self.particles.front().len()
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn last_report(&self) -> Option<StepReport> {
        self.last_report
    }

    // ---------------------------------------------------------
    // diagnostics

    /// Entries as left by the last grid build / sort.
    pub fn grid_entries(&self) -> &[GridEntry] {
        &self.grid_entries
    }

    /// Non-empty cells of the range table, in key order.
    pub fn grid_ranges(&self) -> Vec<(CellCoord, GridIndexRange)> {
        self.grid_indices.occupied()
    }

    /// Particles as left by the last rearrange pass.
    pub fn rearranged_particles(&self) -> &[Particle] {
        &self.sorted_particles
    }

    pub fn stage_timings(&self) -> &StageTimer {
        &self.timer
    }

    pub fn last_stage_time(&self, stage: Stage) -> Option<Duration> {
        self.timer.last(stage)
    }
}
