use cgmath::{prelude::*, Vector2};

use crate::raw_data::HostBufferData;

/// Capacity of the 16 bit particle field of a grid entry.
pub const MAX_PARTICLES: usize = 1 << 16; // 2^16

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vector2<f32>,
    pub velocity: Vector2<f32>,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleRaw {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vector2::zero(),
            velocity: Vector2::zero(),
        }
    }
}

impl Particle {
    pub fn new(position: Vector2<f32>, velocity: Vector2<f32>) -> Self {
        Self { position, velocity }
    }

    pub fn at_rest(position: Vector2<f32>) -> Self {
        Self {
            position,
            velocity: Vector2::zero(),
        }
    }

    pub fn from_raw(raw: &ParticleRaw) -> Self {
        Self {
            position: raw.position.into(),
            velocity: raw.velocity.into(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.x.is_finite()
            && self.position.y.is_finite()
            && self.velocity.x.is_finite()
            && self.velocity.y.is_finite()
    }
}

impl HostBufferData for Particle {
    type RawType = ParticleRaw;
    fn to_raw(&self) -> ParticleRaw {
        ParticleRaw {
            position: self.position.into(),
            velocity: self.velocity.into(),
        }
    }
}
