//! Typed bound and blend tables of division strategies.

use std::collections::BTreeMap;
use std::fmt;

use hiplan_config::{BlendConfig, BoundConfig, BoundValue, TimeBoundType};
use hiplan_core::{Blend, PlanningError, Result};

/// The quantity a strategy bound limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BoundKind {
    /// Number of partial problems.
    Problems,
    /// Size of partial problems.
    SizeBound,
    /// Mean recent increment time.
    IncrementalTime,
    /// Mean change in recent increment times.
    DifferentialTime,
    /// Total recent increment time.
    IntegralTime,
    /// Total time since the last division.
    CumulativeTime,
}

impl BoundKind {
    /// The bound slot a time bound type is checked against.
    ///
    /// Predictive types share the slot of the quantity they predict.
    pub fn for_time(bound_type: TimeBoundType) -> Self {
        match bound_type {
            TimeBoundType::Incremental | TimeBoundType::IncrementalPredictive => {
                BoundKind::IncrementalTime
            }
            TimeBoundType::Differential => BoundKind::DifferentialTime,
            TimeBoundType::Integral => BoundKind::IntegralTime,
            TimeBoundType::Cumulative | TimeBoundType::CumulativePredictive => {
                BoundKind::CumulativeTime
            }
        }
    }

    pub fn is_time(self) -> bool {
        !matches!(self, BoundKind::Problems | BoundKind::SizeBound)
    }
}

impl fmt::Display for BoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoundKind::Problems => "problems",
            BoundKind::SizeBound => "size_bound",
            BoundKind::IncrementalTime => "incremental_time_bound",
            BoundKind::DifferentialTime => "differential_time_bound",
            BoundKind::IntegralTime => "integral_time_bound",
            BoundKind::CumulativeTime => "cumulative_time_bound",
        };
        write!(f, "{}", name)
    }
}

/// Bounds of a strategy, each fixed or given per level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bounds {
    table: BTreeMap<BoundKind, BoundConfig>,
}

impl Bounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: BoundKind, bound: BoundConfig) -> Self {
        self.table.insert(kind, bound);
        self
    }

    /// The bound of `kind` at `level`, if one is defined there.
    pub fn get(&self, kind: BoundKind, level: u32) -> Option<BoundValue> {
        match self.table.get(&kind)? {
            BoundConfig::Fixed(value) => Some(*value),
            BoundConfig::PerLevel(levels) => levels.get(&level).copied(),
        }
    }

    /// Sets the bound of `kind` at one level, keeping the other levels.
    pub fn set(&mut self, kind: BoundKind, level: u32, value: BoundValue) {
        match self.table.get_mut(&kind) {
            Some(BoundConfig::PerLevel(levels)) => {
                levels.insert(level, value);
            }
            _ => {
                self.table
                    .insert(kind, BoundConfig::PerLevel([(level, value)].into_iter().collect()));
            }
        }
    }

    /// Whether any time bound is defined at `level`.
    pub fn has_time_bound(&self, level: u32) -> bool {
        self.table
            .keys()
            .any(|kind| kind.is_time() && self.get(*kind, level).is_some())
    }

    pub fn kinds(&self) -> impl Iterator<Item = BoundKind> + '_ {
        self.table.keys().copied()
    }

    /// Every value of `kind` over all levels.
    pub(crate) fn values(&self, kind: BoundKind) -> Vec<BoundValue> {
        match self.table.get(&kind) {
            Some(BoundConfig::Fixed(value)) => vec![*value],
            Some(BoundConfig::PerLevel(levels)) => levels.values().copied().collect(),
            None => Vec::new(),
        }
    }

    /// Checks every value of `kind` with `valid`.
    pub(crate) fn validate(
        &self,
        kind: BoundKind,
        requirement: &str,
        valid: impl Fn(BoundValue) -> bool,
    ) -> Result<()> {
        for value in self.values(kind) {
            if !valid(value) {
                return Err(PlanningError::invalid_input(
                    format!("{} must be {}", kind, requirement),
                    value.as_f64(),
                ));
            }
        }
        Ok(())
    }
}

/// Blend quantities of a strategy, the same on every level or given per level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blends {
    config: Option<BlendConfig>,
}

impl Blends {
    pub fn new(config: Option<BlendConfig>) -> Self {
        Self { config }
    }

    /// The blend at `level`; zero where none is given.
    pub fn get(&self, level: u32) -> Blend {
        match &self.config {
            None => Blend::default(),
            Some(BlendConfig::Symmetric(quantity)) => Blend {
                left: *quantity,
                right: *quantity,
            },
            Some(BlendConfig::Sided(blend)) => *blend,
            Some(BlendConfig::PerLevel(levels)) => levels.get(&level).copied().unwrap_or_default(),
        }
    }
}

/// Stages left unfixed behind a continuous division.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackwardsHorizon {
    Count(u32),
    /// A fraction of the stages achieved since the last division.
    Fraction(f64),
}

impl BackwardsHorizon {
    pub fn from_value(value: BoundValue) -> Result<Self> {
        match value {
            BoundValue::Count(count) if count >= 0 => Ok(BackwardsHorizon::Count(count as u32)),
            BoundValue::Fraction(fraction) if (0.0..=1.0).contains(&fraction) => {
                Ok(BackwardsHorizon::Fraction(fraction))
            }
            other => Err(PlanningError::invalid_input(
                "backwards horizon must be a non-negative count or a fraction in [0.0-1.0]",
                other.as_f64(),
            )),
        }
    }

    /// Resolves the horizon against the stages achieved since the last division.
    pub fn resolve(&self, span: u32) -> u32 {
        match *self {
            BackwardsHorizon::Count(count) => count.min(span),
            BackwardsHorizon::Fraction(fraction) => (fraction * span as f64).round() as u32,
        }
    }
}

impl Default for BackwardsHorizon {
    fn default() -> Self {
        BackwardsHorizon::Count(0)
    }
}

impl fmt::Display for BackwardsHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackwardsHorizon::Count(count) => write!(f, "{}", count),
            BackwardsHorizon::Fraction(fraction) => write!(f, "{:.2}", fraction),
        }
    }
}
