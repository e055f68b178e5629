//! Host-facing simulation settings and their validation.
use cgmath::Vector2;

use crate::{
    error::ConfigError,
    grid_2d::{Bounds2D, Grid2D, Wall, GRID_DIM},
    particles::MAX_PARTICLES,
    sort::SortStrategy,
};

pub const MAX_WALLS: usize = 4;
pub const DEFAULT_DENSITY_FLOOR: f32 = 1.0e-6;

const WALL_NORMAL_TOLERANCE: f32 = 1.0e-3;

/// What to do when a particle ends the density pass with a density that
/// cannot be divided by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DensityPolicy {
    /// Raise any density below `floor` (or non-finite) to `floor`, count it
    /// in the step report and go on.
    Clamp { floor: f32 },
    /// Abandon the step without committing anything once a density is zero,
    /// negative or non-finite.
    Abort,
}

impl Default for DensityPolicy {
    fn default() -> Self {
        DensityPolicy::Clamp {
            floor: DEFAULT_DENSITY_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NeighborSearch {
    /// Sorted spatial hash, 3x3 cell neighborhoods.
    #[default]
    Grid,
    /// Every particle against every other one. Reference only.
    BruteForce,
}

/// Precomputed smoothing kernel factors, particle mass folded in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelCoefficients {
    /// Poly6: `m * 315 / (64 pi h^9)`.
    pub density: f32,
    /// Spiky gradient: `m * -45 / (pi h^6)`.
    pub grad_pressure: f32,
    /// Viscosity laplacian: `m * mu * 45 / (pi h^6)`.
    pub lap_viscosity: f32,
}

impl KernelCoefficients {
    pub fn new(smoothing_length: f32, particle_mass: f32, viscosity: f32) -> Self {
        use std::f64::consts::PI;
        let h = smoothing_length as f64;
        let mass = particle_mass as f64;
        Self {
            density: (mass * 315.0 / (64.0 * PI * h.powi(9))) as f32,
            grad_pressure: (mass * -45.0 / (PI * h.powi(6))) as f32,
            lap_viscosity: (mass * viscosity as f64 * 45.0 / (PI * h.powi(6))) as f32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub rest_density: f32,
    /// Tait stiffness `B`.
    pub pressure_stiffness: f32,
    pub particle_mass: f32,
    /// Interaction radius `h`.
    pub smoothing_length: f32,
    pub time_step: f32,
    pub viscosity: f32,
    pub wall_stiffness: f32,
    /// Spacing used when seeding particle blocks.
    pub particle_gap: f32,
    pub gravity: Vector2<f32>,
    pub domain: Bounds2D,
    pub grid: Grid2D,
    pub walls: Vec<Wall>,
    pub density_policy: DensityPolicy,
    pub neighbor_search: NeighborSearch,
    pub sort: SortStrategy,
}

impl Default for SimulationParams {
    fn default() -> Self {
        let smoothing_length = 0.012;
        let map_height = 1.2;
        let domain = Bounds2D::new(
            Vector2::new(0.0, 0.0),
            Vector2::new(4.0 / 3.0 * map_height, map_height),
        );

        Self {
            rest_density: 1000.0,
            pressure_stiffness: 200.0,
            particle_mass: 0.0002,
            smoothing_length,
            time_step: 0.005,
            viscosity: 0.1,
            wall_stiffness: 3000.0,
            particle_gap: 0.0045,
            gravity: Vector2::new(0.0, -0.5),
            domain,
            grid: Grid2D::from_cell_size(smoothing_length, domain.min),
            walls: domain.walls(),
            density_policy: DensityPolicy::default(),
            neighbor_search: NeighborSearch::default(),
            sort: SortStrategy::default(),
        }
    }
}

impl SimulationParams {
    /// Replaces the domain, re-deriving the grid transform and the four
    /// bounding walls from it.
    pub fn with_domain(mut self, domain: Bounds2D) -> Self {
        self.domain = domain;
        self.grid = Grid2D::from_cell_size(self.smoothing_length, domain.min);
        self.walls = domain.walls();
        self
    }

    /// Replaces `h`, keeping grid cells one interaction radius wide.
    pub fn with_smoothing_length(mut self, smoothing_length: f32) -> Self {
        self.smoothing_length = smoothing_length;
        self.grid = Grid2D::from_cell_size(smoothing_length, self.domain.min);
        self
    }

    pub fn kernel_coefficients(&self) -> KernelCoefficients {
        KernelCoefficients::new(self.smoothing_length, self.particle_mass, self.viscosity)
    }

    pub fn validate(&self, particle_count: usize) -> Result<(), ConfigError> {
        if particle_count == 0 {
            return Err(ConfigError::NoParticles);
        }
        if particle_count > MAX_PARTICLES {
            return Err(ConfigError::TooManyParticles {
                requested: particle_count,
                max: MAX_PARTICLES,
            });
        }

        positive("rest_density", self.rest_density)?;
        positive("particle_mass", self.particle_mass)?;
        positive("smoothing_length", self.smoothing_length)?;
        positive("time_step", self.time_step)?;
        positive("particle_gap", self.particle_gap)?;
        non_negative("pressure_stiffness", self.pressure_stiffness)?;
        non_negative("viscosity", self.viscosity)?;
        non_negative("wall_stiffness", self.wall_stiffness)?;
        if !(self.gravity.x.is_finite() && self.gravity.y.is_finite()) {
            return Err(ConfigError::NonFinite("gravity"));
        }
        if let DensityPolicy::Clamp { floor } = self.density_policy {
            positive("density floor", floor)?;
        }

        self.validate_grid()?;

        if self.walls.len() > MAX_WALLS {
            return Err(ConfigError::TooManyWalls(self.walls.len()));
        }
        for (index, wall) in self.walls.iter().enumerate() {
            let length = (wall.normal.x * wall.normal.x + wall.normal.y * wall.normal.y).sqrt();
            if !wall.offset.is_finite()
                || !length.is_finite()
                || (length - 1.0).abs() > WALL_NORMAL_TOLERANCE
            {
                return Err(ConfigError::MalformedWall(index));
            }
        }

        Ok(())
    }

    fn validate_grid(&self) -> Result<(), ConfigError> {
        let domain = &self.domain;
        let finite = [domain.min.x, domain.min.y, domain.max.x, domain.max.y]
            .iter()
            .all(|v| v.is_finite());
        if !finite || domain.min.x >= domain.max.x || domain.min.y >= domain.max.y {
            return Err(ConfigError::InvalidDomain);
        }

        positive("grid scale", self.grid.scale.x)?;
        positive("grid scale", self.grid.scale.y)?;
        if !(self.grid.offset.x.is_finite() && self.grid.offset.y.is_finite()) {
            return Err(ConfigError::NonFinite("grid offset"));
        }

        // a 3x3 block only covers the interaction radius if cells are at least h wide
        let h = self.smoothing_length;
        if self.grid.scale.x * h > 1.0 + 1.0e-5 || self.grid.scale.y * h > 1.0 + 1.0e-5 {
            let cell_size = self.grid.cell_size();
            return Err(ConfigError::CellSmallerThanRadius {
                cell_size: cell_size.x.min(cell_size.y),
                radius: h,
            });
        }

        let lo = self.grid.grid_position(domain.min);
        let hi = self.grid.grid_position(domain.max);
        let dim = GRID_DIM as f32;
        if lo.x < 0.0 || lo.y < 0.0 || hi.x >= dim || hi.y >= dim {
            return Err(ConfigError::GridTooLarge {
                extent: [hi.x - lo.x, hi.y - lo.y],
            });
        }

        Ok(())
    }
}

fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NonFinite(name));
    }
    if value <= 0.0 {
        return Err(ConfigError::NonPositive(name));
    }
    Ok(())
}

fn non_negative(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NonFinite(name));
    }
    if value < 0.0 {
        return Err(ConfigError::Negative(name));
    }
    Ok(())
}
