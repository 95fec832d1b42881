//! Planning statistics collection.
//!
//! Timing and memory figures reported by the solving engine, accumulated per
//! search increment and in total for each monolevel plan.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Timing (seconds) and memory (MiB) figures of one or more solve calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveTimes {
    /// Time spent grounding.
    pub grounding_time: f64,
    /// Time spent searching.
    pub solving_time: f64,
    /// Total wall-clock time, including overhead outside grounding and solving.
    pub total_time: f64,
    /// Peak memory use.
    pub memory: f64,
}

impl SolveTimes {
    pub fn new(grounding_time: f64, solving_time: f64) -> Self {
        Self {
            grounding_time,
            solving_time,
            total_time: grounding_time + solving_time,
            memory: 0.0,
        }
    }

    pub fn with_memory(mut self, memory: f64) -> Self {
        self.memory = memory;
        self
    }
}

impl AddAssign for SolveTimes {
    fn add_assign(&mut self, other: SolveTimes) {
        self.grounding_time += other.grounding_time;
        self.solving_time += other.solving_time;
        self.total_time += other.total_time;
        self.memory = self.memory.max(other.memory);
    }
}

impl fmt::Display for SolveTimes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(Ground = {:.3}s, Search = {:.3}s, Total = {:.3}s, Memory = {:.1}MiB)",
            self.grounding_time, self.solving_time, self.total_time, self.memory
        )
    }
}

/// Statistics of one search increment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncrementStatistics {
    /// Search length reached by the increment.
    pub end_step: u32,
    /// Times spent on the increment.
    pub times: SolveTimes,
}

/// Accumulated statistics of generating a monolevel plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningStatistics {
    /// Totals over all increments.
    pub grand_totals: SolveTimes,
    /// Per increment statistics, keyed by call number starting at 1.
    pub incremental: BTreeMap<u32, IncrementStatistics>,
    /// Time spent by the planner itself between increments.
    pub overhead_time: f64,
    /// Stages whose achievement was delayed by interleaving.
    pub interleaving_quantity: u32,
    /// Total steps by which interleaved achievements were delayed.
    pub interleaving_score: u32,
}

impl PlanningStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of search increments recorded.
    pub fn calls(&self) -> u32 {
        self.incremental.len() as u32
    }

    /// Records one search increment.
    pub fn record_increment(&mut self, end_step: u32, times: SolveTimes) {
        let call = self.calls() + 1;
        self.incremental.insert(call, IncrementStatistics { end_step, times });
        self.grand_totals += times;
    }

    /// Search length reached by the last increment.
    pub fn search_length(&self) -> u32 {
        self.incremental
            .values()
            .next_back()
            .map(|inc| inc.end_step)
            .unwrap_or(0)
    }

    /// Grand total time, overhead included.
    pub fn total_time(&self) -> f64 {
        self.grand_totals.total_time + self.overhead_time
    }

    /// Increment total times in call order.
    pub fn increment_times(&self) -> Vec<f64> {
        self.incremental.values().map(|inc| inc.times.total_time).collect()
    }

    /// Appends the increments of `other` after those of `self` and adds its totals.
    pub fn combine_with(&mut self, other: &PlanningStatistics) {
        for inc in other.incremental.values() {
            let call = self.calls() + 1;
            self.incremental.insert(call, *inc);
        }
        self.grand_totals += other.grand_totals;
        self.overhead_time += other.overhead_time;
        self.interleaving_quantity += other.interleaving_quantity;
        self.interleaving_score += other.interleaving_score;
    }
}

impl fmt::Display for PlanningStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Calls = {}, Totals = {}, Overhead = {:.3}s",
            self.calls(),
            self.grand_totals,
            self.overhead_time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_combine() {
        let mut first = PlanningStatistics::new();
        first.record_increment(1, SolveTimes::new(0.1, 0.2).with_memory(10.0));
        first.record_increment(2, SolveTimes::new(0.1, 0.4).with_memory(12.0));

        let mut second = PlanningStatistics::new();
        second.record_increment(5, SolveTimes::new(0.2, 0.3).with_memory(8.0));
        second.overhead_time = 0.5;

        first.combine_with(&second);

        assert_eq!(first.calls(), 3);
        assert_eq!(first.search_length(), 5);
        assert!((first.grand_totals.total_time - 1.3).abs() < 1e-9);
        assert!((first.grand_totals.memory - 12.0).abs() < 1e-9);
        assert!((first.total_time() - 1.8).abs() < 1e-9);
    }
}
