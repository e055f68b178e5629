//! Uniform spatial hash grid: cell mapping, packed sort keys and the
//! per-cell range table filled from the sorted keys.
use std::sync::atomic::{AtomicU32, Ordering};

use cgmath::Vector2;
use rayon::prelude::*;

use crate::raw_data::HostBufferData;

/// Cells per axis. The packed key stores each coordinate in 8 bits.
pub const GRID_DIM: u32 = 256;
pub const GRID_CELL_COUNT: usize = (GRID_DIM * GRID_DIM) as usize;

/// Quantized cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CellCoord {
    pub x: u8,
    pub y: u8,
}

impl CellCoord {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Index into the range table, `y * 256 + x`.
    pub fn key(self) -> u16 {
        (self.y as u16) << 8 | self.x as u16
    }

    pub fn from_key(key: u16) -> Self {
        Self {
            x: (key & 0xFF) as u8,
            y: (key >> 8) as u8,
        }
    }

    /// The 3x3 block around this cell, clamped to the grid edges.
    pub fn neighborhood(self) -> impl Iterator<Item = CellCoord> {
        let (x, y) = (self.x as i32, self.y as i32);
        let last = GRID_DIM as i32 - 1;
        ((y - 1).max(0)..=(y + 1).min(last)).flat_map(move |ny| {
            ((x - 1).max(0)..=(x + 1).min(last)).map(move |nx| CellCoord::new(nx as u8, ny as u8))
        })
    }
}

/// Sortable grid entry, bit packed as `[y:8][x:8][particle:16]` so that the
/// numeric order is the (cell key, particle index) order.
#[repr(transparent)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    bytemuck::Pod,
    bytemuck::Zeroable,
)]
pub struct GridEntry(u32);

impl GridEntry {
    pub fn new(cell: CellCoord, particle: u16) -> Self {
        Self((cell.key() as u32) << 16 | particle as u32)
    }

    pub fn from_packed(packed: u32) -> Self {
        Self(packed)
    }

    pub fn packed(self) -> u32 {
        self.0
    }

    pub fn key(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn cell(self) -> CellCoord {
        CellCoord::from_key(self.key())
    }

    pub fn particle(self) -> usize {
        (self.0 & 0xFFFF) as usize
    }
}

/// World rectangle covered by the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds2D {
    pub min: Vector2<f32>,
    pub max: Vector2<f32>,
}

impl Bounds2D {
    pub fn new(min: Vector2<f32>, max: Vector2<f32>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, position: Vector2<f32>) -> bool {
        position.x >= self.min.x
            && position.x <= self.max.x
            && position.y >= self.min.y
            && position.y <= self.max.y
    }

    /// Left, bottom, right and top walls, normals pointing inside.
    pub fn walls(&self) -> Vec<Wall> {
        vec![
            Wall::new(Vector2::new(1.0, 0.0), -self.min.x),
            Wall::new(Vector2::new(0.0, 1.0), -self.min.y),
            Wall::new(Vector2::new(-1.0, 0.0), self.max.x),
            Wall::new(Vector2::new(0.0, -1.0), self.max.y),
        ]
    }
}

/// Half plane `dot(x, normal) + offset >= 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub normal: Vector2<f32>,
    pub offset: f32,
}

impl Wall {
    /// Zero plane, the signed distance is 0 everywhere so it never pushes.
    pub const NONE: Wall = Wall {
        normal: Vector2 { x: 0.0, y: 0.0 },
        offset: 0.0,
    };

    pub fn new(normal: Vector2<f32>, offset: f32) -> Self {
        Self { normal, offset }
    }

    /// Negative once the position is outside the half plane.
    pub fn signed_distance(&self, position: Vector2<f32>) -> f32 {
        position.x * self.normal.x + position.y * self.normal.y + self.offset
    }
}

impl HostBufferData for Wall {
    type RawType = [f32; 4];
    fn to_raw(&self) -> [f32; 4] {
        [self.normal.x, self.normal.y, self.offset, 0.0]
    }
}

/// Affine map from world space to grid space, `cell = position * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid2D {
    pub scale: Vector2<f32>,
    pub offset: Vector2<f32>,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Grid2DRaw {
    pub scale: [f32; 2],
    pub offset: [f32; 2],
}

impl Grid2D {
    /// Square cells of `cell_size` with cell (0, 0) starting at `origin`.
    pub fn from_cell_size(cell_size: f32, origin: Vector2<f32>) -> Self {
        let inv = 1.0 / cell_size;
        Self {
            scale: Vector2::new(inv, inv),
            offset: Vector2::new(-origin.x * inv, -origin.y * inv),
        }
    }

    pub fn cell_size(&self) -> Vector2<f32> {
        Vector2::new(1.0 / self.scale.x, 1.0 / self.scale.y)
    }

    /// Grid-space coordinate of `position`, before clamping.
    pub fn grid_position(&self, position: Vector2<f32>) -> Vector2<f32> {
        Vector2::new(
            position.x * self.scale.x + self.offset.x,
            position.y * self.scale.y + self.offset.y,
        )
    }

    /// Cell of `position`, clamped into the grid. NaN lands in cell 0.
    pub fn cell_of(&self, position: Vector2<f32>) -> CellCoord {
        let g = self.grid_position(position);
        let last = (GRID_DIM - 1) as f32;
        CellCoord::new(g.x.clamp(0.0, last) as u8, g.y.clamp(0.0, last) as u8)
    }
}

impl HostBufferData for Grid2D {
    type RawType = Grid2DRaw;
    fn to_raw(&self) -> Grid2DRaw {
        Grid2DRaw {
            scale: self.scale.into(),
            offset: self.offset.into(),
        }
    }
}

/// Half-open slice `[start, end)` of the sorted entries belonging to one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridIndexRange {
    pub start: u32,
    pub end: u32,
}

impl GridIndexRange {
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }
}

/// Range table with one slot per cell key.
///
/// During [`GridIndices::build`] every slot has exactly one writer, so plain
/// relaxed stores are enough; the end of the parallel pass orders them before
/// any reader.
pub struct GridIndices {
    ranges: Vec<[AtomicU32; 2]>,
}

impl Default for GridIndices {
    fn default() -> Self {
        Self::new()
    }
}

impl GridIndices {
    pub fn new() -> Self {
        let ranges = (0..GRID_CELL_COUNT)
            .map(|_| [AtomicU32::new(0), AtomicU32::new(0)])
            .collect();
        Self { ranges }
    }

    /// Resets every cell to the empty range (0, 0).
    pub fn clear(&mut self) {
        self.ranges.par_iter_mut().for_each(|range| {
            *range[0].get_mut() = 0;
            *range[1].get_mut() = 0;
        });
    }

    /// Records the run of every cell present in the sorted `entries`.
    ///
    /// One unit of work per sorted position compares its key against the
    /// cyclic predecessor and successor. Position 0 and position `n - 1` are
    /// the seam of the cycle and always open and close a run, which keeps the
    /// single cell case at `[0, n)`.
    pub fn build(&mut self, entries: &[GridEntry]) {
        let n = entries.len();
        if n == 0 {
            return;
        }
        let ranges = &self.ranges;

        (0..n).into_par_iter().for_each(|g_id| {
            let g_prev = if g_id == 0 { n - 1 } else { g_id - 1 };
            let g_next = if g_id + 1 == n { 0 } else { g_id + 1 };

            let cell = entries[g_id].key();
            let cell_prev = entries[g_prev].key();
            let cell_next = entries[g_next].key();

            let slot = &ranges[cell as usize];
            if g_id == 0 || cell != cell_prev {
                slot[0].store(g_id as u32, Ordering::Relaxed);
            }
            if g_next == 0 || cell != cell_next {
                slot[1].store(g_id as u32 + 1, Ordering::Relaxed);
            }
        });
    }

    pub fn range(&self, key: u16) -> GridIndexRange {
        let slot = &self.ranges[key as usize];
        GridIndexRange {
            start: slot[0].load(Ordering::Relaxed),
            end: slot[1].load(Ordering::Relaxed),
        }
    }

    /// Calls `f` with every sorted index stored in the 3x3 block around `cell`.
    #[inline]
    pub fn for_each_in_neighborhood(&self, cell: CellCoord, mut f: impl FnMut(usize)) {
        for neighbor in cell.neighborhood() {
            let range = self.range(neighbor.key());
            for n_id in range.start..range.end {
                f(n_id as usize);
            }
        }
    }

    /// Every non-empty cell with its range, in key order.
    pub fn occupied(&self) -> Vec<(CellCoord, GridIndexRange)> {
        (0..GRID_CELL_COUNT)
            .map(|key| (CellCoord::from_key(key as u16), self.range(key as u16)))
            .filter(|(_, range)| !range.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_order_is_cell_then_particle() {
        let a = GridEntry::new(CellCoord::new(255, 0), 9);
        let b = GridEntry::new(CellCoord::new(0, 1), 0);
        let c = GridEntry::new(CellCoord::new(0, 1), 3);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(c.key(), 256);
        assert_eq!(c.cell(), CellCoord::new(0, 1));
        assert_eq!(c.particle(), 3);
    }

    #[test]
    fn packed_layout_is_y_x_particle() {
        let entry = GridEntry::new(CellCoord::new(3, 2), 5);
        assert_eq!(entry.packed(), 0x0203_0005);
        assert_eq!(GridEntry::from_packed(0x0203_0005), entry);
        assert_eq!(GridEntry::from_packed(u32::MAX).cell(), CellCoord::new(255, 255));
        assert_eq!(GridEntry::from_packed(u32::MAX).particle(), 0xFFFF);
    }

    #[test]
    fn cell_of_clamps_to_grid() {
        let grid = Grid2D::from_cell_size(0.5, Vector2::new(0.0, 0.0));
        assert_eq!(grid.cell_of(Vector2::new(-3.0, 1.2)), CellCoord::new(0, 2));
        assert_eq!(grid.cell_of(Vector2::new(1000.0, 0.0)), CellCoord::new(255, 0));
        assert_eq!(grid.cell_of(Vector2::new(f32::NAN, 0.9)), CellCoord::new(0, 1));
    }

    #[test]
    fn neighborhood_is_clamped_at_corners() {
        let corner: Vec<_> = CellCoord::new(0, 255).neighborhood().collect();
        assert_eq!(corner.len(), 4);
        assert!(corner.contains(&CellCoord::new(1, 254)));
        assert_eq!(CellCoord::new(10, 10).neighborhood().count(), 9);
    }

    #[test]
    fn clear_empties_every_cell() {
        let mut indices = GridIndices::new();
        let entries = [
            GridEntry::new(CellCoord::new(1, 0), 0),
            GridEntry::new(CellCoord::new(3, 0), 1),
        ];
        indices.build(&entries);
        indices.clear();
        assert!(indices.occupied().is_empty());
    }
}
