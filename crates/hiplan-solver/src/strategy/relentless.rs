//! Relentless reactive division.

use hiplan_config::{BoundConfig, RelentlessConfig, TimeBoundType};
use hiplan_core::Result;
use tracing::debug;

use super::reactive::ReactiveState;
use super::{BoundKind, Bounds, DivisionStrategy, Reaction, ReactionContext};

/// Divides whenever a single time bound is reached.
///
/// A preemptive strategy may divide at any increment; a non-preemptive one
/// only when a stage was just achieved. An interrupting strategy ends the
/// current search at the division, otherwise the search continues from a
/// partially fixed plan. Interrupting strategies are never preemptive.
#[derive(Debug, Clone)]
pub struct Relentless {
    bounds: Bounds,
    bound_type: TimeBoundType,
    preemptive: bool,
    interrupting: bool,
    state: ReactiveState,
}

impl Relentless {
    pub fn new(config: &RelentlessConfig) -> Result<Self> {
        Self::with_defaults(config, None)
    }

    /// Builds the strategy with a moving average window used when the
    /// configuration gives none.
    pub(crate) fn with_defaults(
        config: &RelentlessConfig,
        default_moving_average: Option<u32>,
    ) -> Result<Self> {
        let bounds = time_bounds(config.bound_type, &config.time_bound);
        validate_time_bound(&bounds, config.bound_type)?;

        let interrupting = config.interrupting.unwrap_or(false);
        let preemptive = config.preemptive.unwrap_or(true) && !interrupting;
        let state = ReactiveState::new(
            config.moving_average.or(default_moving_average),
            config.backwards_horizon,
        )?;
        Ok(Self {
            bounds,
            bound_type: config.bound_type,
            preemptive,
            interrupting,
            state,
        })
    }

    pub fn bound_type(&self) -> TimeBoundType {
        self.bound_type
    }

    pub fn is_preemptive(&self) -> bool {
        self.preemptive
    }

    pub fn is_interrupting(&self) -> bool {
        self.interrupting
    }

    pub fn state(&self) -> &ReactiveState {
        &self.state
    }
}

/// Time bounds must be non-negative; differential bounds may be any rate.
pub(crate) fn validate_time_bound(bounds: &Bounds, bound_type: TimeBoundType) -> Result<()> {
    let kind = BoundKind::for_time(bound_type);
    if bound_type == TimeBoundType::Differential {
        return bounds.validate(kind, "a finite rate", |value| value.as_f64().is_finite());
    }
    bounds.validate(kind, "a non-negative time in seconds", |value| {
        value.as_f64() >= 0.0
    })
}

/// Time bound of a single kind from configuration.
pub(crate) fn time_bounds(bound_type: TimeBoundType, bound: &BoundConfig) -> Bounds {
    Bounds::new().with(BoundKind::for_time(bound_type), bound.clone())
}

impl DivisionStrategy for Relentless {
    fn name(&self) -> &'static str {
        "relentless"
    }

    fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    fn react(&mut self, context: &ReactionContext<'_>) -> Result<Reaction> {
        let can_divide = self.state.can_divide(self.preemptive, context);
        let check = self.state.check(&self.bounds, self.bound_type, context);
        let divide = can_divide && check.triggered();

        if divide {
            self.state
                .update(context.level, context.subgoal_index, context.search_length)?;
            debug!(
                level = context.level,
                index = context.subgoal_index,
                search_length = context.search_length,
                time = check.time,
                "time bound reached"
            );
        }

        Ok(Reaction {
            divide,
            interrupt: self.interrupting,
            backwards_horizon: self.state.backwards_horizon(),
            rationale: Some(ReactiveState::rationale(&check, self.bound_type)),
        })
    }
}
