use cgmath::{prelude::*, Vector2};
use rayon::prelude::*;

use crate::{particles::Particle, uniforms::SimulationConstants};

/// Penalty acceleration from the walls. Zero while every signed distance is
/// non-negative, otherwise along the inward normal and linear in the depth.
#[inline]
pub fn wall_acceleration(position: Vector2<f32>, consts: &SimulationConstants) -> Vector2<f32> {
    consts
        .walls
        .iter()
        .fold(Vector2::zero(), |acceleration, wall| {
            let dist = wall.signed_distance(position);
            acceleration + wall.normal * (dist.min(0.0) * -consts.wall_stiffness)
        })
}

/// Semi-implicit Euler from `particles` into `next`.
pub fn integrate(
    particles: &[Particle],
    forces: &[Vector2<f32>],
    consts: &SimulationConstants,
    dt: f32,
    next: &mut [Particle],
) {
    next.par_iter_mut()
        .zip(particles.par_iter())
        .zip(forces.par_iter())
        .for_each(|((out, particle), force)| {
            let acceleration =
                *force + wall_acceleration(particle.position, consts) + consts.gravity;

            let velocity = particle.velocity + acceleration * dt;
            let position = particle.position + velocity * dt;

            *out = Particle { position, velocity };
        });
}
