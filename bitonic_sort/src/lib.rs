//! Data-parallel bitonic sort over unsigned keys.
//!
//! The network is walked as `log_len` stages of doubling block size, and stage
//! `s` runs `s` compare-exchange steps. Every step touches disjoint pairs only,
//! so a step is one parallel pass and the end of a pass is the barrier before
//! the next one.
//!
//! Inputs whose length is not a power of two are padded with [`SortKey::MAX`].

use std::time::Instant;

use rayon::prelude::*;

// benchmark input length 2^22
const ARRAY_LENGTH: usize = 1usize << 22;

/// Keys the network can order.
pub trait SortKey: Copy + Ord + Send + Sync {
    /// Padding value; sorts after every real key.
    const MAX: Self;
}

impl SortKey for u32 {
    const MAX: Self = u32::MAX;
}

impl SortKey for u64 {
    const MAX: Self = u64::MAX;
}

/// Parameters of one compare-exchange step.
///
/// `log_group_init` is the log of the number of direction blocks in the
/// current stage, `log_group_curr` the log of the number of compare groups in
/// the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uniforms {
    pub log_len: u32,
    pub log_group_init: u32,
    pub log_group_curr: u32,
}

impl Uniforms {
    /// Length of the blocks whose sort direction alternates in this stage.
    pub fn block_len(&self) -> usize {
        1 << (self.log_len - self.log_group_init)
    }

    /// Distance between the two keys of a compare-exchange pair.
    pub fn pair_distance(&self) -> usize {
        1 << (self.log_len - self.log_group_curr - 1)
    }
}

/// Every step of the network for a power-of-two `len`, in execution order.
pub fn schedule(len: usize) -> impl Iterator<Item = Uniforms> {
    debug_assert!(len.is_power_of_two());
    let log_len = len.trailing_zeros();
    (1..=log_len).flat_map(move |num_stage| {
        let log_group_init = log_len - num_stage;
        (0..num_stage).map(move |num_step| Uniforms {
            log_len,
            log_group_init,
            log_group_curr: log_group_init + num_step,
        })
    })
}

/// Runs a single step over `data`, one unit of work per pair group.
pub fn compare_exchange_pass<T: SortKey>(data: &mut [T], uniforms: Uniforms) {
    let distance = uniforms.pair_distance();
    let block_len = uniforms.block_len();

    data.par_chunks_mut(distance * 2)
        .enumerate()
        .for_each(|(group, chunk)| {
            let ascending = (group * distance * 2) & block_len == 0;
            let (lower, upper) = chunk.split_at_mut(distance);
            for (a, b) in lower.iter_mut().zip(upper.iter_mut()) {
                if (ascending && *a > *b) || (!ascending && *a < *b) {
                    std::mem::swap(a, b);
                }
            }
        });
}

/// Sorts `data` ascending.
pub fn sort<T: SortKey>(data: &mut [T]) {
    sort_with_scratch(data, &mut Vec::new());
}

/// Sorts `data` ascending, padding through `scratch`. The scratch buffer only
/// grows, so a caller sorting the same length repeatedly allocates once.
pub fn sort_with_scratch<T: SortKey>(data: &mut [T], scratch: &mut Vec<T>) {
    let len = data.len();
    if len < 2 {
        return;
    }

    if len.is_power_of_two() {
        sort_padded(data);
        return;
    }

    scratch.clear();
    scratch.extend_from_slice(data);
    scratch.resize(len.next_power_of_two(), T::MAX);
    sort_padded(scratch);
    data.copy_from_slice(&scratch[..len]);
}

fn sort_padded<T: SortKey>(data: &mut [T]) {
    for uniforms in schedule(data.len()) {
        compare_exchange_pass(data, uniforms);
    }
}

pub fn run() {
    let mut time_list = vec![];

    let timer = Instant::now();
    let env = env_logger::Env::default()
        .filter_or("MY_LOG_LEVEL", "info")
        .write_style_or("MY_LOG_STYLE", "always");
    env_logger::init_from_env(env);

    let mut local_input = vec![0u32; ARRAY_LENGTH];
    for e in local_input.iter_mut() {
        *e = rand::random::<u32>();
    }
    log::debug!("Input length: {}", local_input.len());

    time_list.push(timer.elapsed().as_secs_f64()); // 0
    let timer = Instant::now();

    let mut bitonic_sorted = local_input.clone();
    sort(&mut bitonic_sorted);

    time_list.push(timer.elapsed().as_secs_f64()); // 1
    let timer = Instant::now();

    let mut sorted = local_input.clone();
    sorted.sort_unstable();

    time_list.push(timer.elapsed().as_secs_f64()); // 2
    let timer = Instant::now();

    let mut par_sorted = local_input;
    par_sorted.par_sort_unstable();

    time_list.push(timer.elapsed().as_secs_f64()); // 3

    assert!(sorted == bitonic_sorted);
    assert!(sorted == par_sorted);
    log::info!("Bitonic sort successful!");
    log::info!("Initialization takes: {}s", time_list[0]);
    log::info!("Bitonic sorting takes: {}s", time_list[1]);
    log::info!("CPU sorting takes: {}s", time_list[2]);
    log::info!("Rayon sorting takes: {}s", time_list[3]);
}
