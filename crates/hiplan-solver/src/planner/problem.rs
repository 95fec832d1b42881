//! Monolevel problem creation.

use hiplan_core::{
    ConformanceType, IncrementalSolver, MonolevelProblem, PlanningError, Result,
};
use tracing::{debug, warn};

use super::{HierarchicalPlanner, MonolevelOptions};
use crate::strategy::DivisionStrategy;

impl<S: IncrementalSolver> HierarchicalPlanner<S> {
    /// Resolves the options of a planning call at `level` against the plans
    /// stored so far.
    ///
    /// Requested sub-goal stage ranges are clamped into the stages that can
    /// be refined, with a warning.
    pub(super) fn create_problem(
        &self,
        level: u32,
        options: &MonolevelOptions,
        strategy: Option<&dyn DivisionStrategy>,
    ) -> Result<MonolevelProblem> {
        let conformance = options.conformance && level != self.top_level();
        let all_sgoals = self.total_produced_sgoals(level + 1);
        if conformance && all_sgoals == 0 {
            return Err(PlanningError::InvalidPlannerState(format!(
                "conformance refinement requested at level {} but no sub-goal stages exist at level {}",
                level,
                level + 1
            )));
        }

        let conformance_type = match options.conformance_type {
            None if conformance => Some(if options.concurrency {
                ConformanceType::SequentialAchievement
            } else {
                ConformanceType::SimultaneousAchievement
            }),
            given => given,
        };

        let achieved_sgoals = self.total_achieved_sgoals(level);

        let mut first_sgoals = achieved_sgoals + 1;
        if let Some(requested) = options.first_sgoals {
            first_sgoals = requested.min(first_sgoals).max(1);
            if first_sgoals != requested {
                warn!(
                    event = "clamping",
                    level,
                    bound = "first_sgoals",
                    requested,
                    clamped = first_sgoals,
                    "first sub-goal stage index outside the refinable range",
                );
            }
        }

        let mut last_sgoals = all_sgoals.max(1);
        if let Some(requested) = options.last_sgoals {
            last_sgoals = requested.min(last_sgoals).max(first_sgoals);
            if last_sgoals != requested {
                warn!(
                    event = "clamping",
                    level,
                    bound = "last_sgoals",
                    requested,
                    clamped = last_sgoals,
                    "last sub-goal stage index outside the refinable range",
                );
            }
        }

        // Revising stages already achieved rewinds to the step the stage
        // before the first was achieved on.
        let mut start_step = self.total_plan_length(level);
        if first_sgoals <= achieved_sgoals {
            start_step = self
                .solutions
                .sgoals_achieved_at
                .get(&level)
                .and_then(|achieved| achieved.get(&(first_sgoals - 1)).copied())
                .unwrap_or(0);
        }

        let is_initial = start_step == 0;
        let is_final = !conformance || (self.is_complete(level + 1) && last_sgoals == all_sgoals);
        let sequential_yield = conformance && options.sequential_yield;
        let reactive_divisions =
            sequential_yield && strategy.map_or(false, |strategy| strategy.divides_reactively(level));

        let mut search_length_bound = 0;
        if conformance {
            search_length_bound = self
                .total_plan_length(level)
                .max(start_step + (last_sgoals - first_sgoals));
            if is_final {
                search_length_bound = search_length_bound.max(self.total_plan_length(level + 1));
            }
        }
        let use_search_length_bound =
            options.use_search_length_bound && search_length_bound > start_step && !sequential_yield;

        let problem = MonolevelProblem {
            level,
            concurrency: options.concurrency,
            conformance,
            conformance_type,
            first_sgoals,
            last_sgoals,
            start_step,
            is_initial,
            is_final,
            complete_planning: is_initial && is_final,
            sequential_yield,
            reactive_divisions,
            use_search_length_bound,
            search_length_bound,
        };
        debug!(event = "problem_created", level, problem = %problem);
        Ok(problem)
    }
}
