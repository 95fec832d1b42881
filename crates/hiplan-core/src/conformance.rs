//! Conformance mappings between a refined plan and the sub-goal stages it refines.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::division::SubGoalRange;
use crate::engine::Answer;
use crate::error::{PlanningError, Result};
use crate::literal::SubGoal;
use crate::reversible::ReversibleMap;

/// Links the steps of a refined plan to the sub-goal stages it must achieve.
///
/// * `constraining_sgoals` - the stages produced at the level above, by index.
/// * `current_sgoals` - step to the index current at that step; reversed, an
///   index maps to the steps of the sub-plan refining it.
/// * `sgoals_achieved_at` - index to the step its stage was achieved at (the
///   matching child).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConformanceMapping {
    pub constraining_sgoals: BTreeMap<u32, Vec<SubGoal>>,
    pub current_sgoals: ReversibleMap<u32, u32>,
    pub sgoals_achieved_at: ReversibleMap<u32, u32>,
    /// Steps each stage was minimally achieved on in sequential yield mode.
    pub sequential_yield_steps: Option<BTreeMap<u32, u32>>,
}

impl ConformanceMapping {
    pub fn new(
        constraining_sgoals: BTreeMap<u32, Vec<SubGoal>>,
        current_sgoals: ReversibleMap<u32, u32>,
        sgoals_achieved_at: ReversibleMap<u32, u32>,
    ) -> Self {
        Self {
            constraining_sgoals,
            current_sgoals,
            sgoals_achieved_at,
            sequential_yield_steps: None,
        }
    }

    /// Builds a mapping from the index facts of a solved model.
    ///
    /// When several indices are reported current at one step the last one wins.
    /// Achievement facts are keyed by index.
    pub fn from_answer(
        constraining_sgoals: BTreeMap<u32, Vec<SubGoal>>,
        answer: &Answer,
        sequential_yield_steps: Option<BTreeMap<u32, u32>>,
    ) -> Self {
        let mut current_sgoals = ReversibleMap::new();
        let mut current_facts = answer.current_sgoal_indices.clone();
        current_facts.sort_by_key(|fact| fact.step);
        for fact in current_facts {
            current_sgoals.insert(fact.step, fact.index);
        }

        let mut sgoals_achieved_at = ReversibleMap::new();
        let mut achieved_facts = answer.sgoals_achieved.clone();
        achieved_facts.sort_by_key(|fact| fact.index);
        for fact in achieved_facts {
            sgoals_achieved_at.insert(fact.index, fact.step);
        }

        Self {
            constraining_sgoals,
            current_sgoals,
            sgoals_achieved_at,
            sequential_yield_steps,
        }
    }

    /// Number of sub-goal stages refined.
    pub fn problem_size(&self) -> u32 {
        self.constraining_sgoals.len() as u32
    }

    pub fn constraining_sgoals_range(&self) -> Result<SubGoalRange> {
        match (
            self.constraining_sgoals.keys().next(),
            self.constraining_sgoals.keys().next_back(),
        ) {
            (Some(&first), Some(&last)) => SubGoalRange::new(first, last),
            _ => Err(PlanningError::InvalidArgument(
                "conformance mapping has no constraining sub-goal stages".to_string(),
            )),
        }
    }

    /// Total number of individual sub-goals over all stages.
    pub fn total_constraining_sgoals(&self) -> usize {
        self.constraining_sgoals.values().map(Vec::len).sum()
    }

    /// Mapped steps per refined stage.
    pub fn length_expansion_factor(&self) -> f64 {
        if self.constraining_sgoals.is_empty() {
            return 0.0;
        }
        self.current_sgoals.len() as f64 / self.constraining_sgoals.len() as f64
    }

    /// Population standard deviation of sub-plan lengths over achieved stages.
    pub fn length_expansion_deviation(&self) -> f64 {
        if self.sgoals_achieved_at.len() <= 1 {
            return 0.0;
        }
        let lengths: Vec<f64> = self
            .sgoals_achieved_at
            .keys()
            .map(|index| self.subplan_steps(*index) as f64)
            .collect();
        population_stdev(&lengths)
    }

    /// Number of steps in the sub-plan refining `index`.
    pub fn get_subplan_length(&self, index: u32) -> Result<u32> {
        if !self.sgoals_achieved_at.contains_key(&index) {
            return Err(PlanningError::InvalidArgument(format!(
                "sub-goal index {} is not in the range of conformance mapping {}",
                index, self
            )));
        }
        Ok(self.subplan_steps(index))
    }

    /// Counts stages achieved non-greedily and the total step deficit.
    ///
    /// A stage is interleaved when the gap between consecutive sequential
    /// yield steps is shorter than its final sub-plan.
    pub fn interleaving(&self) -> (u32, u32) {
        let Some(yield_steps) = &self.sequential_yield_steps else {
            return (0, 0);
        };
        let mut quantity = 0;
        let mut score = 0;
        for &index in self.constraining_sgoals.keys() {
            let Some(&yield_step) = yield_steps.get(&index) else {
                continue;
            };
            let previous = index
                .checked_sub(1)
                .and_then(|prev| yield_steps.get(&prev))
                .copied()
                .unwrap_or(1);
            let yield_length = yield_step.saturating_sub(previous);
            let sub_plan_length = self.subplan_steps(index);
            if yield_length < sub_plan_length {
                quantity += 1;
                score += sub_plan_length - yield_length;
            }
        }
        (quantity, score)
    }

    /// Whether achievement steps never decrease as the index grows.
    pub fn is_monotonic(&self) -> bool {
        self.sgoals_achieved_at
            .values()
            .zip(self.sgoals_achieved_at.values().skip(1))
            .all(|(earlier, later)| earlier <= later)
    }

    /// Merges a later mapping of the same plan into this one.
    pub fn extend(&mut self, other: &ConformanceMapping) {
        self.constraining_sgoals
            .extend(other.constraining_sgoals.iter().map(|(k, v)| (*k, v.clone())));
        self.current_sgoals.extend(&other.current_sgoals);
        self.sgoals_achieved_at.extend(&other.sgoals_achieved_at);
    }

    fn subplan_steps(&self, index: u32) -> u32 {
        self.current_sgoals
            .reverse_get(&index)
            .map(|steps| steps.len() as u32)
            .unwrap_or(0)
    }
}

impl fmt::Display for ConformanceMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indices = self
            .constraining_sgoals
            .keys()
            .next()
            .zip(self.constraining_sgoals.keys().next_back());
        let steps = self.current_sgoals.first_key().zip(self.current_sgoals.last_key());
        write!(f, "Number of sub-goal stages = {}", self.problem_size())?;
        if let Some((first, last)) = indices {
            write!(f, ", Index range = [{}-{}]", first, last)?;
        }
        if let Some((first, last)) = steps {
            write!(f, ", Step range = [{}-{}]", first, last)?;
        }
        Ok(())
    }
}

/// Population standard deviation; zero for fewer than two values.
pub(crate) fn population_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Sample standard deviation; zero for fewer than two values.
pub(crate) fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
}

#[cfg(test)]
#[path = "conformance_tests.rs"]
mod tests;
