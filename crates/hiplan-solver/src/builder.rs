//! Builder module for constructing division strategies from configuration
//!
//! This module provides the wiring between configuration types and
//! the strategy implementations.

use hiplan_config::{DivisionStrategyConfig, ProactiveBasis};
use hiplan_core::Result;

use crate::strategy::{Basic, DivisionStrategy, Impetuous, NaiveProactive, Rapid, Relentless};

/// Builder for constructing division strategies from configuration.
pub struct StrategyBuilder;

impl StrategyBuilder {
    /// Builds a strategy from configuration, validating its bounds.
    pub fn build(config: &DivisionStrategyConfig) -> Result<Box<dyn DivisionStrategy>> {
        let strategy: Box<dyn DivisionStrategy> = match config {
            DivisionStrategyConfig::Basic(basic) => {
                Box::new(Basic::new(basic.problems.clone(), basic.blend.clone())?)
            }

            DivisionStrategyConfig::Hasty(naive) => Box::new(NaiveProactive::new(
                ProactiveBasis::Hasty,
                naive.size_bound.clone(),
                naive.blend.clone(),
            )?),

            DivisionStrategyConfig::Steady(naive) => Box::new(NaiveProactive::new(
                ProactiveBasis::Steady,
                naive.size_bound.clone(),
                naive.blend.clone(),
            )?),

            DivisionStrategyConfig::Relentless(relentless) => Box::new(Relentless::new(relentless)?),

            DivisionStrategyConfig::Impetuous(impetuous) => Box::new(Impetuous::new(impetuous)?),

            DivisionStrategyConfig::Rapid(rapid) => Box::new(Rapid::new(rapid)?),
        };
        tracing::debug!(strategy = strategy.name(), "built division strategy");
        Ok(strategy)
    }

    /// Creates a basic strategy dividing every plan in two.
    pub fn basic() -> Result<Basic> {
        Basic::new(None, None)
    }

    /// Creates a hasty strategy with the default size bound.
    pub fn hasty() -> Result<NaiveProactive> {
        NaiveProactive::hasty(None, None)
    }

    /// Creates a steady strategy with the default size bound.
    pub fn steady() -> Result<NaiveProactive> {
        NaiveProactive::steady(None, None)
    }
}
