//! Impetuous reactive division.

use hiplan_config::{ImpetuousConfig, TimeBoundType};
use hiplan_core::{PlanningError, Result};
use tracing::debug;

use super::reactive::{BoundCheck, ReactiveState};
use super::relentless::validate_time_bound;
use super::{time_bound_name, BoundKind, Bounds, DivisionStrategy, Reaction, ReactionContext};

/// Divides on two bounds: reaching the cumulative time bound interrupts the
/// search, reaching the continuous bound divides it without interruption.
///
/// Interrupting divisions take precedence over continuous ones.
#[derive(Debug, Clone)]
pub struct Impetuous {
    bounds: Bounds,
    continuous_bound_type: TimeBoundType,
    preemptive: bool,
    state: ReactiveState,
}

impl Impetuous {
    pub const DEFAULT_MOVING_AVERAGE: u32 = 5;

    pub fn new(config: &ImpetuousConfig) -> Result<Self> {
        let continuous_kind = BoundKind::for_time(config.continuous_bound_type);
        if continuous_kind == BoundKind::CumulativeTime {
            return Err(PlanningError::invalid_input(
                "cannot use a cumulative time bound as the continuous bound type",
                time_bound_name(config.continuous_bound_type),
            ));
        }

        let bounds = Bounds::new()
            .with(BoundKind::CumulativeTime, config.cumulative_time_bound.clone())
            .with(continuous_kind, config.continuous_time_bound.clone());
        validate_time_bound(&bounds, TimeBoundType::Cumulative)?;
        validate_time_bound(&bounds, config.continuous_bound_type)?;

        let state = ReactiveState::new(
            Some(config.moving_average.unwrap_or(Self::DEFAULT_MOVING_AVERAGE)),
            config.backwards_horizon,
        )?;
        Ok(Self {
            bounds,
            continuous_bound_type: config.continuous_bound_type,
            preemptive: config.preemptive.unwrap_or(true),
            state,
        })
    }

    pub fn continuous_bound_type(&self) -> TimeBoundType {
        self.continuous_bound_type
    }

    pub fn state(&self) -> &ReactiveState {
        &self.state
    }
}

impl DivisionStrategy for Impetuous {
    fn name(&self) -> &'static str {
        "impetuous"
    }

    fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    fn react(&mut self, context: &ReactionContext<'_>) -> Result<Reaction> {
        if !self.state.can_divide(self.preemptive, context) {
            return Ok(Reaction {
                backwards_horizon: self.state.backwards_horizon(),
                ..Reaction::default()
            });
        }

        let interrupting = self
            .state
            .check(&self.bounds, TimeBoundType::Cumulative, context);
        let (check, bound_type, interrupt) = if interrupting.triggered() {
            (interrupting, TimeBoundType::Cumulative, true)
        } else {
            let continuous = self
                .state
                .check(&self.bounds, self.continuous_bound_type, context);
            match (interrupting.bound, continuous.bound) {
                (Some(_), None) => (interrupting, TimeBoundType::Cumulative, false),
                _ => (continuous, self.continuous_bound_type, false),
            }
        };
        let divide = check.triggered();

        if divide {
            self.state
                .update(context.level, context.subgoal_index, context.search_length)?;
            debug!(
                level = context.level,
                index = context.subgoal_index,
                search_length = context.search_length,
                interrupt,
                time = check.time,
                "time bound reached"
            );
        }

        Ok(Reaction {
            divide,
            interrupt: divide && interrupt,
            backwards_horizon: self.state.backwards_horizon(),
            rationale: Some(rationale(&check, bound_type, interrupt)),
        })
    }
}

fn rationale(check: &BoundCheck, bound_type: TimeBoundType, interrupt: bool) -> String {
    let kind = if interrupt { "interrupting" } else { "continuous" };
    format!("{} {}", kind, ReactiveState::rationale(check, bound_type))
}
