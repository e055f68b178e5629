use std::collections::VecDeque;
// use std::time::{Duration, Instant}; // this will panic on WASM
use instant::Duration;

use crate::uniforms::Stage;

/// Rolling wall-clock history of every pipeline stage.
#[derive(Debug)]
pub struct StageTimer {
    pub time_vec_stages: Vec<VecDeque<f32>>,
    pub time_vec_max_size: usize,
}

impl Default for StageTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTimer {
    pub fn new() -> Self {
        Self {
            time_vec_stages: vec![VecDeque::new(); Stage::COUNT],
            time_vec_max_size: 128,
        }
    }

    pub fn record(&mut self, stage: Stage, elapse: Duration) {
        let history = &mut self.time_vec_stages[stage as usize];

        // update time vec
        if history.len() >= self.time_vec_max_size {
            history.pop_front();
        }
        history.push_back(elapse.as_secs_f32());
    }

    pub fn last(&self, stage: Stage) -> Option<Duration> {
        self.time_vec_stages[stage as usize]
            .back()
            .map(|secs| Duration::from_secs_f32(*secs))
    }

    pub fn average(&self, stage: Stage) -> Option<Duration> {
        let history = &self.time_vec_stages[stage as usize];
        if history.is_empty() {
            return None;
        }
        let total: f32 = history.iter().sum();
        Some(Duration::from_secs_f32(total / history.len() as f32))
    }

    /// Sum of the stage averages, i.e. the typical cost of one step.
    pub fn average_step(&self) -> Duration {
        Stage::ALL
            .iter()
            .filter_map(|stage| self.average(*stage))
            .sum()
    }
}
