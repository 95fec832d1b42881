//! Rapid adaptive division.

use hiplan_config::{RapidConfig, RelentlessConfig};
use hiplan_core::{DivisionScenario, MonolevelPlan, OnlineMethod, Result};

use super::{BoundKind, Bounds, DivisionStrategy, NaiveProactive, Reaction, ReactionContext, Relentless};

/// Divides proactively by a naive size bound, then reactively by a
/// relentless time bound.
///
/// Reactive divisions are always preemptive and continuous.
#[derive(Debug, Clone)]
pub struct Rapid {
    basis: NaiveProactive,
    reactive: Relentless,
    bounds: Bounds,
}

impl Rapid {
    pub const DEFAULT_MOVING_AVERAGE: u32 = 1;

    pub fn new(config: &RapidConfig) -> Result<Self> {
        let basis = NaiveProactive::new(
            config.proactive_basis,
            config.size_bound.clone(),
            config.blend.clone(),
        )?;
        let reactive = Relentless::with_defaults(
            &RelentlessConfig {
                time_bound: config.time_bound.clone(),
                bound_type: config.bound_type,
                backwards_horizon: config.backwards_horizon,
                moving_average: config.moving_average,
                preemptive: Some(true),
                interrupting: Some(false),
            },
            Some(Self::DEFAULT_MOVING_AVERAGE),
        )?;

        let bounds = basis
            .bounds()
            .clone()
            .with(BoundKind::for_time(config.bound_type), config.time_bound.clone());

        Ok(Self {
            basis,
            reactive,
            bounds,
        })
    }

    pub fn basis(&self) -> &NaiveProactive {
        &self.basis
    }

    pub fn reactive(&self) -> &Relentless {
        &self.reactive
    }
}

impl DivisionStrategy for Rapid {
    fn name(&self) -> &'static str {
        "rapid"
    }

    fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    fn proact(
        &self,
        abstract_plan: &MonolevelPlan,
        previously_solved_problems: u32,
    ) -> Result<DivisionScenario> {
        self.basis.proact(abstract_plan, previously_solved_problems)
    }

    fn react(&mut self, context: &ReactionContext<'_>) -> Result<Reaction> {
        self.reactive.react(context)
    }

    fn total_increments_prediction(&self, top_level: u32, method: OnlineMethod) -> Option<u32> {
        self.basis.total_increments_prediction(top_level, method)
    }
}
