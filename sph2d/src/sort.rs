//! The key sort run between grid build and grid index build.
use rayon::prelude::*;

/// Sorts packed grid keys ascending. Stability is not needed, ties never
/// happen since the particle index is part of the key.
pub trait KeySorter: Send + Sync {
    fn sort_keys(&mut self, keys: &mut [u32]);

    /// Called once at construction with the number of keys every later
    /// `sort_keys` call will see.
    fn reserve(&mut self, _len: usize) {}

    fn name(&self) -> &'static str;
}

/// Bitonic network from the `bitonic_sort` crate. Lengths that are not a
/// power of two are padded through a scratch buffer owned by the sorter.
#[derive(Debug, Clone, Default)]
pub struct BitonicKeySorter {
    scratch: Vec<u32>,
}

impl KeySorter for BitonicKeySorter {
    fn sort_keys(&mut self, keys: &mut [u32]) {
        bitonic_sort::sort_with_scratch(keys, &mut self.scratch);
    }

    fn reserve(&mut self, len: usize) {
        if !len.is_power_of_two() {
            self.scratch.reserve_exact(len.next_power_of_two());
        }
    }

    fn name(&self) -> &'static str {
        "bitonic"
    }
}

/// Rayon's parallel pattern-defeating quicksort.
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonKeySorter;

impl KeySorter for RayonKeySorter {
    fn sort_keys(&mut self, keys: &mut [u32]) {
        keys.par_sort_unstable();
    }

    fn name(&self) -> &'static str {
        "rayon"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortStrategy {
    #[default]
    Bitonic,
    Rayon,
}

impl SortStrategy {
    pub fn sorter(self) -> Box<dyn KeySorter> {
        match self {
            SortStrategy::Bitonic => Box::new(BitonicKeySorter::default()),
            SortStrategy::Rayon => Box::new(RayonKeySorter),
        }
    }
}
