use cgmath::Vector2;

use crate::particles::Particle;

/// fill in particles in the given range
pub fn particles_in_block(
    bottom_left: (f32, f32),
    top_right: (f32, f32),
    velocity: Option<Vector2<f32>>,
    spacing: f32,
) -> Vec<Particle> {
    let mut particles = Vec::new();

    let num_x = ((top_right.0 - bottom_left.0) / spacing).ceil() as u32;
    let num_y = ((top_right.1 - bottom_left.1) / spacing).ceil() as u32;
    for i in 0..num_x {
        for j in 0..num_y {
            let x_coord = bottom_left.0 + i as f32 * spacing;
            let y_coord = bottom_left.1 + j as f32 * spacing;
            let p = Particle {
                position: Vector2::new(x_coord, y_coord),
                velocity: velocity.unwrap_or(Vector2::new(0.0, 0.0)),
            };

            particles.push(p);
        }
    }

    particles
}

/// `count` resting particles in a block `sqrt(count)` particles wide, packed
/// into the bottom left corner of the domain starting at `origin`.
pub fn dam_break(count: usize, spacing: f32, origin: Vector2<f32>) -> Vec<Particle> {
    let starting_width = ((count as f32).sqrt() as usize).max(1);

    (0..count)
        .map(|i| {
            let x = origin.x + spacing * (i % starting_width) as f32;
            let y = origin.y + spacing * (i / starting_width) as f32;
            Particle::at_rest(Vector2::new(x, y))
        })
        .collect()
}
