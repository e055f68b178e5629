//! SPH density and force passes.
use cgmath::{prelude::*, Vector2};
use rayon::prelude::*;

use crate::{grid_2d::GridIndices, particles::Particle, uniforms::SimulationConstants};

/// Where a pass looks for neighbor candidates.
#[derive(Clone, Copy)]
pub enum NeighborQuery<'a> {
    /// Particles are in sorted order and `indices` holds their cell ranges.
    Grid(&'a GridIndices),
    /// All `n` particles are candidates.
    All(usize),
}

impl NeighborQuery<'_> {
    #[inline]
    pub fn for_each_candidate(
        &self,
        position: Vector2<f32>,
        consts: &SimulationConstants,
        f: impl FnMut(usize),
    ) {
        match self {
            NeighborQuery::Grid(indices) => {
                indices.for_each_in_neighborhood(consts.grid.cell_of(position), f)
            }
            NeighborQuery::All(n) => (0..*n).for_each(f),
        }
    }
}

/// Poly6 contribution of a neighbor at squared distance `r_sq < h^2`.
#[inline]
pub fn density_kernel(r_sq: f32, consts: &SimulationConstants) -> f32 {
    let d = consts.smoothing_length_sq - r_sq;
    consts.kernel.density * d * d * d
}

/// Tait equation of state, clamped so sparse regions never pull.
#[inline]
pub fn pressure(density: f32, consts: &SimulationConstants) -> f32 {
    let ratio = density / consts.rest_density;
    consts.pressure_stiffness * (ratio * ratio * ratio - 1.0).max(0.0)
}

/// Spiky gradient term. `diff` points from the particle to the neighbor.
#[inline]
pub fn grad_pressure(
    r: f32,
    p_pressure: f32,
    n_pressure: f32,
    n_density: f32,
    diff: Vector2<f32>,
    consts: &SimulationConstants,
) -> Vector2<f32> {
    let h = consts.smoothing_length;
    let avg_pressure = 0.5 * (n_pressure + p_pressure);
    diff * (consts.kernel.grad_pressure * avg_pressure / n_density * (h - r) * (h - r) / r)
}

/// Viscosity laplacian term.
#[inline]
pub fn lap_velocity(
    r: f32,
    p_velocity: Vector2<f32>,
    n_velocity: Vector2<f32>,
    n_density: f32,
    consts: &SimulationConstants,
) -> Vector2<f32> {
    let h = consts.smoothing_length;
    let vel_diff = n_velocity - p_velocity;
    vel_diff * (consts.kernel.lap_viscosity / n_density * (h - r))
}

/// Density of every particle, self contribution included.
pub fn compute_densities(
    particles: &[Particle],
    query: NeighborQuery,
    consts: &SimulationConstants,
    densities: &mut [f32],
) {
    let h_sq = consts.smoothing_length_sq;

    densities
        .par_iter_mut()
        .enumerate()
        .for_each(|(p_id, density)| {
            let p_position = particles[p_id].position;
            let mut sum = 0.0;

            query.for_each_candidate(p_position, consts, |n_id| {
                let diff = particles[n_id].position - p_position;
                let r_sq = diff.magnitude2();
                if r_sq < h_sq {
                    sum += density_kernel(r_sq, consts);
                }
            });

            *density = sum;
        });
}

/// Pressure and viscosity acceleration of every particle.
///
/// Neighbor terms already carry `1 / rho_neighbor`; the sum is divided once
/// by the particle's own density at the end.
pub fn compute_forces(
    particles: &[Particle],
    densities: &[f32],
    query: NeighborQuery,
    consts: &SimulationConstants,
    forces: &mut [Vector2<f32>],
) {
    let h_sq = consts.smoothing_length_sq;

    forces
        .par_iter_mut()
        .enumerate()
        .for_each(|(p_id, force)| {
            let p = particles[p_id];
            let p_density = densities[p_id];
            let p_pressure = pressure(p_density, consts);
            let mut acceleration = Vector2::zero();

            query.for_each_candidate(p.position, consts, |n_id| {
                let n = particles[n_id];
                let diff = n.position - p.position;
                let r_sq = diff.magnitude2();
                // coincident particles have no defined gradient
                if r_sq < h_sq && r_sq > 0.0 && n_id != p_id {
                    let n_density = densities[n_id];
                    let n_pressure = pressure(n_density, consts);
                    let r = r_sq.sqrt();

                    acceleration += grad_pressure(r, p_pressure, n_pressure, n_density, diff, consts);
                    acceleration += lap_velocity(r, p.velocity, n.velocity, n_density, consts);
                }
            });

            *force = acceleration / p_density;
        });
}
