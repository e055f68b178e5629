use cgmath::Vector2;

use crate::{
    grid_2d::{Grid2D, Wall},
    params::{KernelCoefficients, NeighborSearch, SimulationParams, MAX_WALLS},
    raw_data::HostBufferData,
};

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    BuildGrid = 0,
    SortGrid = 1,
    ClearGridIndices = 2,
    BuildGridIndices = 3,
    RearrangeParticles = 4,
    Density = 5,
    Force = 6,
    Integrate = 7,
}

impl Stage {
    pub const COUNT: usize = 8;

    pub const ALL: [Stage; Stage::COUNT] = [
        Stage::BuildGrid,
        Stage::SortGrid,
        Stage::ClearGridIndices,
        Stage::BuildGridIndices,
        Stage::RearrangeParticles,
        Stage::Density,
        Stage::Force,
        Stage::Integrate,
    ];

    const BRUTE_FORCE: [Stage; 3] = [Stage::Density, Stage::Force, Stage::Integrate];

    /// Stages of one step, in the only order they may run.
    pub fn sequence(search: NeighborSearch) -> &'static [Stage] {
        match search {
            NeighborSearch::Grid => &Stage::ALL,
            NeighborSearch::BruteForce => &Stage::BRUTE_FORCE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::BuildGrid => "build grid",
            Stage::SortGrid => "sort grid",
            Stage::ClearGridIndices => "clear grid indices",
            Stage::BuildGridIndices => "build grid indices",
            Stage::RearrangeParticles => "rearrange particles",
            Stage::Density => "density",
            Stage::Force => "force",
            Stage::Integrate => "integrate",
        }
    }
}

/// Immutable per-simulation constants every stage reads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationConstants {
    pub particle_count: u32,
    pub time_step: f32,
    pub smoothing_length: f32,
    pub smoothing_length_sq: f32,
    pub pressure_stiffness: f32,
    pub rest_density: f32,
    pub kernel: KernelCoefficients,
    pub wall_stiffness: f32,
    pub gravity: Vector2<f32>,
    pub grid: Grid2D,
    /// Unused slots hold [`Wall::NONE`].
    pub walls: [Wall; MAX_WALLS],
}

impl SimulationConstants {
    /// Expects `params` to have passed validation for `particle_count`.
    pub fn new(params: &SimulationParams, particle_count: usize) -> Self {
        let mut walls = [Wall::NONE; MAX_WALLS];
        for (slot, wall) in walls.iter_mut().zip(&params.walls) {
            *slot = *wall;
        }

        Self {
            particle_count: particle_count as u32,
            time_step: params.time_step,
            smoothing_length: params.smoothing_length,
            smoothing_length_sq: params.smoothing_length * params.smoothing_length,
            pressure_stiffness: params.pressure_stiffness,
            rest_density: params.rest_density,
            kernel: params.kernel_coefficients(),
            wall_stiffness: params.wall_stiffness,
            gravity: params.gravity,
            grid: params.grid,
            walls,
        }
    }
}

/// Constant block laid out for a GPU uniform buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SimulationConstantsRaw {
    pub num_particles: u32,
    pub time_step: f32,
    pub smoothing_length: f32,
    pub pressure_stiffness: f32,
    pub rest_density: f32,
    pub density_coef: f32,
    pub grad_pressure_coef: f32,
    pub lap_viscosity_coef: f32,
    pub wall_stiffness: f32,
    _pad: [f32; 3],
    pub gravity: [f32; 4],
    /// `xy` scale, `zw` offset.
    pub grid_dim: [f32; 4],
    /// `xy` normal, `z` offset.
    pub planes: [[f32; 4]; MAX_WALLS],
}

impl HostBufferData for SimulationConstants {
    type RawType = SimulationConstantsRaw;
    fn to_raw(&self) -> SimulationConstantsRaw {
        let grid = self.grid.to_raw();
        let mut planes = [[0.0; 4]; MAX_WALLS];
        for (plane, wall) in planes.iter_mut().zip(&self.walls) {
            *plane = wall.to_raw();
        }

        SimulationConstantsRaw {
            num_particles: self.particle_count,
            time_step: self.time_step,
            smoothing_length: self.smoothing_length,
            pressure_stiffness: self.pressure_stiffness,
            rest_density: self.rest_density,
            density_coef: self.kernel.density,
            grad_pressure_coef: self.kernel.grad_pressure,
            lap_viscosity_coef: self.kernel.lap_viscosity,
            wall_stiffness: self.wall_stiffness,
            _pad: [0.0; 3],
            gravity: [self.gravity.x, self.gravity.y, 0.0, 0.0],
            grid_dim: [grid.scale[0], grid.scale[1], grid.offset[0], grid.offset[1]],
            planes,
        }
    }
}
