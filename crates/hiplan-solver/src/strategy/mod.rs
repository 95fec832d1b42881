//! Division strategies.
//!
//! A strategy decides how refinement problems are divided into partial
//! problems. Proactive strategies divide each abstract plan when the planner
//! descends a level ([`DivisionStrategy::proact`]); reactive strategies divide
//! during search from live feedback ([`DivisionStrategy::react`]); adaptive
//! strategies do both.

mod basic;
mod bounds;
mod impetuous;
mod naive;
mod rapid;
mod reactive;
mod relentless;

use std::collections::BTreeMap;
use std::fmt::{self, Debug};

use hiplan_config::TimeBoundType;
use hiplan_core::{Action, DivisionScenario, MonolevelPlan, OnlineMethod, Result, SubGoalRange};

pub use basic::Basic;
pub use bounds::{BackwardsHorizon, Blends, BoundKind, Bounds};
pub use impetuous::Impetuous;
pub use naive::NaiveProactive;
pub use rapid::Rapid;
pub use reactive::ReactiveState;
pub use relentless::Relentless;

/// Search feedback handed to [`DivisionStrategy::react`].
#[derive(Debug, Clone, Copy)]
pub struct ReactionContext<'a> {
    pub level: u32,
    /// Sub-goal stages of the problem being searched.
    pub sgoals_range: SubGoalRange,
    pub start_step: u32,
    pub search_length: u32,
    /// The last minimally achieved stage index.
    pub subgoal_index: u32,
    /// Whether the stage was achieved on this increment.
    pub matching_child: bool,
    /// Total time of each increment since the search started.
    pub incremental_times: &'a [f64],
    /// Plan that minimally achieves the last stage, when observed.
    pub observable_plan: Option<&'a BTreeMap<u32, Vec<Action>>>,
}

/// A strategy's decision after one increment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reaction {
    pub divide: bool,
    /// End the current search at the division.
    pub interrupt: bool,
    pub backwards_horizon: BackwardsHorizon,
    pub rationale: Option<String>,
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(Divide = {}, Interrupt = {}, Backwards Horizon = {}, Rationale = {})",
            self.divide,
            self.interrupt,
            self.backwards_horizon,
            self.rationale.as_deref().unwrap_or("none")
        )
    }
}

/// Trait for deciding where refinement problems are divided.
///
/// The default implementations never divide.
pub trait DivisionStrategy: Send + Debug {
    /// Returns the strategy name for logging.
    fn name(&self) -> &'static str;

    fn bounds(&self) -> &Bounds;

    /// Divides an abstract plan before its refinement starts.
    fn proact(
        &self,
        abstract_plan: &MonolevelPlan,
        previously_solved_problems: u32,
    ) -> Result<DivisionScenario> {
        DivisionScenario::new(abstract_plan.clone(), Vec::new(), previously_solved_problems)
    }

    /// Decides whether to divide the problem being searched.
    fn react(&mut self, _context: &ReactionContext<'_>) -> Result<Reaction> {
        Ok(Reaction::default())
    }

    /// Estimated number of online planning increments, for progress reporting.
    fn total_increments_prediction(&self, _top_level: u32, _method: OnlineMethod) -> Option<u32> {
        None
    }

    /// Whether the strategy may divide reactively at `level`.
    fn divides_reactively(&self, level: u32) -> bool {
        self.bounds().has_time_bound(level)
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub(crate) fn time_bound_name(bound_type: TimeBoundType) -> &'static str {
    match bound_type {
        TimeBoundType::Incremental => "Incremental",
        TimeBoundType::Integral => "Integral",
        TimeBoundType::Cumulative => "Cumulative",
        TimeBoundType::Differential => "Differential",
        TimeBoundType::IncrementalPredictive => "IncrementalPredictive",
        TimeBoundType::CumulativePredictive => "CumulativePredictive",
    }
}

#[cfg(test)]
mod tests;
