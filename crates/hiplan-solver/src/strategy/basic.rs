//! Basic division into a fixed number of partial problems.

use hiplan_config::{BlendConfig, BoundConfig, BoundValue};
use hiplan_core::{DivisionScenario, MonolevelPlan, OnlineMethod, Result};
use tracing::debug;

use super::{Blends, BoundKind, Bounds, DivisionStrategy};

/// Divides every abstract plan into a given number of homogenous partial
/// problems, or one per stage when the plan is shorter.
///
/// # Example
///
/// ```
/// use hiplan_solver::strategy::{Basic, DivisionStrategy};
///
/// let basic = Basic::new(None, None).unwrap();
/// assert_eq!(basic.name(), "basic");
/// ```
#[derive(Debug, Clone)]
pub struct Basic {
    bounds: Bounds,
    blends: Blends,
}

impl Basic {
    pub const DEFAULT_PROBLEMS: i64 = 2;

    pub fn new(problems: Option<BoundConfig>, blend: Option<BlendConfig>) -> Result<Self> {
        let problems =
            problems.unwrap_or(BoundConfig::Fixed(BoundValue::Count(Self::DEFAULT_PROBLEMS)));
        let bounds = Bounds::new().with(BoundKind::Problems, problems);
        bounds.validate(BoundKind::Problems, "a count of at least one", |value| {
            matches!(value, BoundValue::Count(count) if count >= 1)
        })?;
        Ok(Self {
            bounds,
            blends: Blends::new(blend),
        })
    }

    fn problems(&self, level: u32) -> u32 {
        self.bounds
            .get(BoundKind::Problems, level)
            .map(|value| value.as_f64().max(1.0) as u32)
            .unwrap_or(1)
    }
}

impl DivisionStrategy for Basic {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    fn proact(
        &self,
        abstract_plan: &MonolevelPlan,
        previously_solved_problems: u32,
    ) -> Result<DivisionScenario> {
        let plan_length = abstract_plan.plan_length();
        let problems = self.problems(abstract_plan.level).min(plan_length);
        debug!(plan_length, problems, "dividing plan into a fixed number of problems");

        let points = DivisionScenario::make_homogenous_divisions(
            problems,
            plan_length,
            abstract_plan.start_step(),
            self.blends.get(abstract_plan.level),
        )?;
        DivisionScenario::new(abstract_plan.clone(), points, previously_solved_problems)
    }

    fn total_increments_prediction(&self, top_level: u32, method: OnlineMethod) -> Option<u32> {
        let per_level = (2..=top_level).map(|level| self.problems(level));
        Some(match method {
            OnlineMethod::GroundFirst => per_level.product(),
            OnlineMethod::CompleteFirst => per_level.sum(),
        })
    }
}
