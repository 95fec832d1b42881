//! Naive proactive division by partial problem size.

use hiplan_config::{BlendConfig, BoundConfig, BoundValue, ProactiveBasis};
use hiplan_core::{DivisionScenario, MonolevelPlan, OnlineMethod, PlanningError, Result};
use tracing::debug;

use super::{Blends, BoundKind, Bounds, DivisionStrategy};

/// Divides every abstract plan homogenously by a size bound.
///
/// The hasty basis keeps partial problems below a maximum size, favouring
/// planning speed; the steady basis keeps them above a minimum size,
/// favouring plan quality. A fractional size bound is relative to the
/// length of the divided plan.
#[derive(Debug, Clone)]
pub struct NaiveProactive {
    basis: ProactiveBasis,
    bounds: Bounds,
    blends: Blends,
}

impl NaiveProactive {
    /// Divides each plan into about four parts.
    pub const DEFAULT_HASTY_SIZE_BOUND: f64 = 0.25;
    /// Divides each plan into about two parts.
    pub const DEFAULT_STEADY_SIZE_BOUND: f64 = 0.45;

    pub fn new(
        basis: ProactiveBasis,
        size_bound: Option<BoundConfig>,
        blend: Option<BlendConfig>,
    ) -> Result<Self> {
        let default = match basis {
            ProactiveBasis::Hasty => Self::DEFAULT_HASTY_SIZE_BOUND,
            ProactiveBasis::Steady => Self::DEFAULT_STEADY_SIZE_BOUND,
        };
        let size_bound = size_bound.unwrap_or(BoundConfig::Fixed(BoundValue::Fraction(default)));
        let bounds = Bounds::new().with(BoundKind::SizeBound, size_bound);
        bounds.validate(
            BoundKind::SizeBound,
            "a positive count or a fraction in (0.0-1.0]",
            |value| match value {
                BoundValue::Count(count) => count > 0,
                BoundValue::Fraction(fraction) => fraction > 0.0 && fraction <= 1.0,
            },
        )?;
        Ok(Self {
            basis,
            bounds,
            blends: Blends::new(blend),
        })
    }

    pub fn hasty(size_bound: Option<BoundConfig>, blend: Option<BlendConfig>) -> Result<Self> {
        Self::new(ProactiveBasis::Hasty, size_bound, blend)
    }

    pub fn steady(size_bound: Option<BoundConfig>, blend: Option<BlendConfig>) -> Result<Self> {
        Self::new(ProactiveBasis::Steady, size_bound, blend)
    }

    pub fn basis(&self) -> ProactiveBasis {
        self.basis
    }

    /// The size bound at `level` normalised on a plan length, in `[1, plan_length]`.
    ///
    /// Dividing the plan by the true size bound always defines at least one
    /// partial problem.
    pub fn get_true_size_bound(&self, level: u32, plan_length: u32) -> Result<u32> {
        if plan_length == 0 {
            return Err(PlanningError::InvalidArgument(
                "plan length must be greater than zero".to_string(),
            ));
        }
        let size_bound = match self.bounds.get(BoundKind::SizeBound, level) {
            None => plan_length,
            Some(BoundValue::Fraction(fraction)) => {
                (plan_length as f64 * fraction).round().max(1.0) as u32
            }
            Some(BoundValue::Count(count)) => count.max(1) as u32,
        };
        Ok(size_bound.min(plan_length))
    }

    /// Number of partial problems a plan of `plan_length` is divided into.
    pub fn partial_problems(&self, level: u32, plan_length: u32) -> Result<u32> {
        let size_bound = self.get_true_size_bound(level, plan_length)?;
        Ok(match self.basis {
            ProactiveBasis::Hasty => plan_length.div_ceil(size_bound),
            ProactiveBasis::Steady => plan_length / size_bound,
        })
    }

    fn fractional_bound(&self, level: u32) -> Option<f64> {
        match self.bounds.get(BoundKind::SizeBound, level) {
            Some(BoundValue::Fraction(fraction)) => Some(fraction),
            None => Some(1.0),
            Some(BoundValue::Count(_)) => None,
        }
    }
}

impl DivisionStrategy for NaiveProactive {
    fn name(&self) -> &'static str {
        match self.basis {
            ProactiveBasis::Hasty => "hasty",
            ProactiveBasis::Steady => "steady",
        }
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
        let partial_problems = self.partial_problems(abstract_plan.level, plan_length)?;
        debug!(
            strategy = self.name(),
            plan_length,
            partial_problems,
            "dividing plan by size bound"
        );

        let points = DivisionScenario::make_homogenous_divisions(
            partial_problems,
            plan_length,
            abstract_plan.start_step(),
            self.blends.get(abstract_plan.level),
        )?;
        DivisionScenario::new(abstract_plan.clone(), points, previously_solved_problems)
    }

    /// Only fractional size bounds give a prediction; absolute ones depend on
    /// plan lengths.
    fn total_increments_prediction(&self, top_level: u32, method: OnlineMethod) -> Option<u32> {
        let inverse = (2..=top_level)
            .filter_map(|level| self.fractional_bound(level))
            .map(|fraction| 1.0 / fraction);
        let prediction = match method {
            OnlineMethod::GroundFirst => inverse.product::<f64>(),
            OnlineMethod::CompleteFirst => inverse.sum::<f64>(),
        };
        Some(prediction as u32)
    }

    fn divides_reactively(&self, _level: u32) -> bool {
        false
    }
}
