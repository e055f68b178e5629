//! Spatial hashing stages: build, sort and rearrange. Clearing and filling
//! the range table live on [`GridIndices`](crate::grid_2d::GridIndices).
use rayon::prelude::*;

use crate::{
    grid_2d::{Grid2D, GridEntry},
    particles::Particle,
    sort::KeySorter,
};

/// One packed (cell, particle) entry per particle.
pub fn build_grid(particles: &[Particle], grid: &Grid2D, entries: &mut [GridEntry]) {
    debug_assert_eq!(particles.len(), entries.len());
    entries
        .par_iter_mut()
        .zip(particles.par_iter())
        .enumerate()
        .for_each(|(p_id, (entry, particle))| {
            *entry = GridEntry::new(grid.cell_of(particle.position), p_id as u16);
        });
}

pub fn sort_grid(entries: &mut [GridEntry], sorter: &mut dyn KeySorter) {
    sorter.sort_keys(bytemuck::cast_slice_mut(entries));
    debug_assert!(
        entries.windows(2).all(|pair| pair[0] < pair[1]),
        "{} sorter left grid entries out of order",
        sorter.name()
    );
}

/// Gathers particle state and ids into the sorted entry order.
pub fn rearrange_particles(
    particles: &[Particle],
    ids: &[u32],
    entries: &[GridEntry],
    sorted: &mut [Particle],
    sorted_ids: &mut [u32],
) {
    sorted
        .par_iter_mut()
        .zip(sorted_ids.par_iter_mut())
        .zip(entries.par_iter())
        .for_each(|((particle, id), entry)| {
            let g_id = entry.particle();
            *particle = particles[g_id];
            *id = ids[g_id];
        });
}
