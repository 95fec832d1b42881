//! Shared bookkeeping of reactive division strategies.

use std::collections::BTreeMap;

use hiplan_config::{BoundValue, TimeBoundType};
use hiplan_core::{PlanningError, Result};
use tracing::trace;

use super::{mean, time_bound_name, BackwardsHorizon, BoundKind, Bounds, ReactionContext};

/// The last reactive division made at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastDivision {
    index: u32,
    step: u32,
}

/// Division history and time accounting of a reactive strategy.
#[derive(Debug, Clone, Default)]
pub struct ReactiveState {
    last_division: BTreeMap<u32, LastDivision>,
    moving_average: Option<u32>,
    backwards_horizon: BackwardsHorizon,
}

/// Outcome of checking one time bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BoundCheck {
    pub time: f64,
    pub bound: Option<f64>,
}

impl BoundCheck {
    pub fn triggered(&self) -> bool {
        self.bound.is_some_and(|bound| self.time >= bound)
    }
}

impl ReactiveState {
    pub fn new(moving_average: Option<u32>, backwards_horizon: Option<BoundValue>) -> Result<Self> {
        if moving_average == Some(0) {
            return Err(PlanningError::invalid_input(
                "moving average window must be at least one increment",
                0,
            ));
        }
        let backwards_horizon = backwards_horizon
            .map(BackwardsHorizon::from_value)
            .transpose()?
            .unwrap_or_default();
        Ok(Self {
            last_division: BTreeMap::new(),
            moving_average,
            backwards_horizon,
        })
    }

    pub fn moving_average(&self) -> Option<u32> {
        self.moving_average
    }

    pub fn backwards_horizon(&self) -> BackwardsHorizon {
        self.backwards_horizon
    }

    pub fn last_division_index(&self, level: u32) -> Option<u32> {
        self.last_division.get(&level).map(|last| last.index)
    }

    pub fn last_division_step(&self, level: u32) -> Option<u32> {
        self.last_division.get(&level).map(|last| last.step)
    }

    /// Whether a division can be committed at the context's sub-goal index.
    ///
    /// A non-preemptive strategy only divides when the stage was achieved on
    /// this increment. Divisions never land on the last stage of the problem,
    /// on its first stage, nor at or before the previous division.
    pub fn can_divide(&self, preemptive: bool, context: &ReactionContext<'_>) -> bool {
        let index = context.subgoal_index;
        let last = self.last_division.get(&context.level);
        let last_index = last.map_or(0, |last| last.index);
        let after_last =
            last.map_or(true, |last| index > last.index && context.search_length > last.step);

        (preemptive || context.matching_child)
            && context.sgoals_range.last_index() != index
            && context.sgoals_range.first_index().max(last_index) != index
            && after_last
    }

    /// Time measure of `bound_type` over the increments since the last
    /// division, or since the search started when that is later.
    ///
    /// Predictive and differential measures need enough increments to take
    /// gradients from; they are zero otherwise.
    pub fn calculate_time(&self, context: &ReactionContext<'_>, bound_type: TimeBoundType) -> f64 {
        let since_step = self
            .last_division_step(context.level)
            .unwrap_or(0)
            .max(context.start_step);
        let offset = ((since_step - context.start_step) as usize).min(context.incremental_times.len());
        let valid = &context.incremental_times[offset..];
        let usable = match self.moving_average {
            Some(window) => &valid[valid.len().saturating_sub(window as usize)..],
            None => valid,
        };
        let gradients: Vec<f64> = usable.windows(2).map(|pair| pair[1] - pair[0]).collect();
        // Predictions extrapolate the last gradient by its mean rate of change.
        let gradient_changes: Vec<f64> =
            gradients.windows(2).map(|pair| pair[1] - pair[0]).collect();

        match bound_type {
            TimeBoundType::Incremental => mean(usable),
            TimeBoundType::Integral => usable.iter().sum(),
            TimeBoundType::Cumulative => valid.iter().sum(),
            TimeBoundType::Differential => mean(&gradients),
            TimeBoundType::IncrementalPredictive | TimeBoundType::CumulativePredictive
                if gradients.len() < 2 =>
            {
                0.0
            }
            TimeBoundType::IncrementalPredictive => {
                let latest = usable.last().copied().unwrap_or(0.0);
                latest + gradients[gradients.len() - 1] + mean(&gradient_changes)
            }
            TimeBoundType::CumulativePredictive => {
                let total: f64 = valid.iter().sum();
                total + gradients[gradients.len() - 1] + mean(&gradient_changes)
            }
        }
    }

    /// Measures time of `bound_type` against its bound in `bounds`.
    pub(crate) fn check(
        &self,
        bounds: &Bounds,
        bound_type: TimeBoundType,
        context: &ReactionContext<'_>,
    ) -> BoundCheck {
        let time = self.calculate_time(context, bound_type);
        let bound = bounds
            .get(BoundKind::for_time(bound_type), context.level)
            .map(|value| value.as_f64());
        trace!(
            bound_type = time_bound_name(bound_type),
            time,
            ?bound,
            "checked reactive time bound"
        );
        BoundCheck { time, bound }
    }

    /// Records a committed division.
    ///
    /// Divisions at a level must advance in both index and search length.
    pub fn update(&mut self, level: u32, index: u32, search_length: u32) -> Result<()> {
        if let Some(last) = self.last_division.get(&level) {
            if index <= last.index || search_length <= last.step {
                return Err(PlanningError::InvalidPlannerState(format!(
                    "division at index {} and step {} does not follow the last division at index {} and step {} on level {}",
                    index, search_length, last.index, last.step, level
                )));
            }
        }
        self.last_division.insert(
            level,
            LastDivision {
                index,
                step: search_length,
            },
        );
        Ok(())
    }

    /// Rationale of a reaction for logging.
    pub(crate) fn rationale(check: &BoundCheck, bound_type: TimeBoundType) -> String {
        match check.bound {
            Some(bound) => format!(
                "{} time {:.3}s against bound {:.3}s",
                time_bound_name(bound_type),
                check.time,
                bound
            ),
            None => format!("no {} time bound", time_bound_name(bound_type)),
        }
    }
}
