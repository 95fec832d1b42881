//! Configuration system for hiplan.
//!
//! Load planner configuration from TOML or YAML files to select the planning
//! mode, the division strategy and search limits without code changes.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use hiplan_config::{DivisionStrategyConfig, PlannerConfig};
//! use std::time::Duration;
//!
//! let config = PlannerConfig::from_toml_str(r#"
//!     concurrency = true
//!     conformance = true
//!     sequential_yield = true
//!     online_method = "complete_first"
//!     time_limit_secs = 300
//!
//!     [division_strategy]
//!     type = "hasty"
//!     size_bound = 0.25
//!     blend = 1
//! "#).unwrap();
//!
//! assert_eq!(config.time_limit(), Some(Duration::from_secs(300)));
//! assert!(matches!(config.division_strategy, Some(DivisionStrategyConfig::Hasty(_))));
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use hiplan_config::PlannerConfig;
//!
//! let config = PlannerConfig::load("planner.toml").unwrap_or_default();
//! // Proceeds with offline classical planning if the file doesn't exist
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use hiplan_core::{Blend, BlendQuantity, ConformanceType, OnlineMethod, Verbosity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main planner configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PlannerConfig {
    /// Lowest level to plan at.
    #[serde(default = "default_bottom_level")]
    pub bottom_level: u32,

    /// Highest level to plan at; the domain's top level if absent.
    #[serde(default)]
    pub top_level: Option<u32>,

    /// Allow actions to be planned concurrently.
    #[serde(default)]
    pub concurrency: bool,

    /// Refine the sub-goal stages of the level above.
    #[serde(default)]
    pub conformance: bool,

    #[serde(default)]
    pub conformance_type: Option<ConformanceType>,

    /// Yield each sub-goal stage as soon as it is minimally achieved.
    #[serde(default)]
    pub sequential_yield: bool,

    #[serde(default)]
    pub online_method: OnlineMethod,

    /// Keep groundings open between partial problems.
    #[serde(default)]
    pub save_grounding: bool,

    /// Resume saved groundings; follows `save_grounding` if absent.
    #[serde(default)]
    pub use_saved_grounding: Option<bool>,

    #[serde(default = "default_true")]
    pub use_search_length_bound: bool,

    /// Leave sub-goal stages inside a right blend for the next partial problem.
    #[serde(default = "default_true")]
    pub avoid_refining_sgoals_marked_for_blending: bool,

    /// Count sub-goal stages achieved non-greedily during sequential yield.
    #[serde(default)]
    pub detect_interleaving: bool,

    /// Solver optimisation options.
    #[serde(default)]
    pub optimisation: OptimisationConfig,

    /// Time limit of each monolevel search.
    #[serde(default)]
    pub time_limit_secs: Option<u64>,

    /// Search length limit of each monolevel search.
    #[serde(default)]
    pub length_limit: Option<LengthLimit>,

    #[serde(default)]
    pub verbosity: Verbosity,

    /// Worker threads handed to the solving engine.
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Online planning is enabled iff a division strategy is configured.
    #[serde(default)]
    pub division_strategy: Option<DivisionStrategyConfig>,
}

fn default_bottom_level() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_threads() -> usize {
    1
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            bottom_level: default_bottom_level(),
            top_level: None,
            concurrency: false,
            conformance: false,
            conformance_type: None,
            sequential_yield: false,
            online_method: OnlineMethod::default(),
            save_grounding: false,
            use_saved_grounding: None,
            use_search_length_bound: true,
            avoid_refining_sgoals_marked_for_blending: true,
            detect_interleaving: false,
            optimisation: OptimisationConfig::default(),
            time_limit_secs: None,
            length_limit: None,
            verbosity: Verbosity::default(),
            threads: default_threads(),
            division_strategy: None,
        }
    }
}

impl PlannerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file, choosing the format by extension.
    ///
    /// Files ending in `.yaml` or `.yml` are read as YAML, anything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist or cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot: level order and positive limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bottom_level < 1 {
            return Err(ConfigError::Invalid(format!(
                "bottom level must be at least 1, got {}",
                self.bottom_level
            )));
        }
        if let Some(top) = self.top_level {
            if top < self.bottom_level {
                return Err(ConfigError::Invalid(format!(
                    "top level {} is below bottom level {}",
                    top, self.bottom_level
                )));
            }
        }
        if self.time_limit_secs == Some(0) {
            return Err(ConfigError::Invalid("time limit must be positive".to_string()));
        }
        match self.length_limit {
            Some(LengthLimit::Fixed(0)) => {
                return Err(ConfigError::Invalid("length limit must be positive".to_string()))
            }
            Some(LengthLimit::Factor(factor)) if factor.is_nan() || factor <= 0.0 => {
                return Err(ConfigError::Invalid(format!(
                    "length limit factor must be positive, got {}",
                    factor
                )))
            }
            _ => {}
        }
        if self.threads == 0 {
            return Err(ConfigError::Invalid("thread count must be positive".to_string()));
        }
        Ok(())
    }

    pub fn with_levels(mut self, bottom_level: u32, top_level: u32) -> Self {
        self.bottom_level = bottom_level;
        self.top_level = Some(top_level);
        self
    }

    pub fn with_concurrency(mut self, concurrency: bool) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Enables conformance refinement, optionally in sequential yield mode.
    pub fn with_conformance(mut self, conformance: bool, sequential_yield: bool) -> Self {
        self.conformance = conformance;
        self.sequential_yield = sequential_yield;
        self
    }

    pub fn with_conformance_type(mut self, conformance_type: ConformanceType) -> Self {
        self.conformance_type = Some(conformance_type);
        self
    }

    pub fn with_online_method(mut self, online_method: OnlineMethod) -> Self {
        self.online_method = online_method;
        self
    }

    pub fn with_save_grounding(mut self, save_grounding: bool) -> Self {
        self.save_grounding = save_grounding;
        self
    }

    pub fn with_division_strategy(mut self, strategy: DivisionStrategyConfig) -> Self {
        self.division_strategy = Some(strategy);
        self
    }

    pub fn with_time_limit_secs(mut self, seconds: u64) -> Self {
        self.time_limit_secs = Some(seconds);
        self
    }

    pub fn with_length_limit(mut self, length_limit: LengthLimit) -> Self {
        self.length_limit = Some(length_limit);
        self
    }

    pub fn with_detect_interleaving(mut self, detect_interleaving: bool) -> Self {
        self.detect_interleaving = detect_interleaving;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Returns the time limit, if configured.
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.map(Duration::from_secs)
    }

    /// Whether saved groundings are resumed.
    pub fn resume_saved_grounding(&self) -> bool {
        self.use_saved_grounding.unwrap_or(self.save_grounding)
    }

    /// Online planning mode is enabled iff a division strategy is configured.
    pub fn is_online(&self) -> bool {
        self.division_strategy.is_some()
    }
}

/// Solver optimisation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct OptimisationConfig {
    /// Prefer plans achieving positive final goals as early as possible.
    #[serde(default = "default_true")]
    pub preempt_positive_final_goals: bool,

    #[serde(default)]
    pub preempt_negative_final_goals: bool,

    /// Prefer achieving final goals in order.
    #[serde(default = "default_true")]
    pub order_final_goal_achievement: bool,

    /// Minimise the action count; follows `concurrency` if absent.
    #[serde(default)]
    pub minimise_actions: Option<bool>,
}

impl Default for OptimisationConfig {
    fn default() -> Self {
        Self {
            preempt_positive_final_goals: true,
            preempt_negative_final_goals: false,
            order_final_goal_achievement: true,
            minimise_actions: None,
        }
    }
}

/// Search length limit.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthLimit {
    /// An absolute number of steps.
    Fixed(u32),
    /// A factor of the plan length at the level above.
    Factor(f64),
}

/// A bound value, an absolute count or a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BoundValue {
    Count(i64),
    Fraction(f64),
}

impl BoundValue {
    /// The value as a float, whatever its kind.
    pub fn as_f64(&self) -> f64 {
        match *self {
            BoundValue::Count(count) => count as f64,
            BoundValue::Fraction(fraction) => fraction,
        }
    }
}

/// A bound that is either the same on every level or given per level.
///
/// Per-level tables are keyed by level; YAML expresses them directly, TOML
/// needs quoted keys.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BoundConfig {
    Fixed(BoundValue),
    PerLevel(BTreeMap<u32, BoundValue>),
}

/// Blend quantities, symmetric, sided, or given per level.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BlendConfig {
    Symmetric(BlendQuantity),
    PerLevel(BTreeMap<u32, Blend>),
    Sided(Blend),
}

/// How a reactive strategy measures search time against its bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBoundType {
    /// Mean time of recent increments.
    #[default]
    Incremental,
    /// Total time of recent increments.
    Integral,
    /// Total time since the last division.
    Cumulative,
    /// Mean change between recent increments.
    Differential,
    /// Next increment time, extrapolated.
    IncrementalPredictive,
    /// Total time including the next increment, extrapolated.
    CumulativePredictive,
}

/// The proactive half of the rapid strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProactiveBasis {
    #[default]
    Hasty,
    Steady,
}

/// Division strategy configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DivisionStrategyConfig {
    /// A fixed number of partial problems.
    Basic(BasicConfig),

    /// Many small problems bounded by a maximum size.
    Hasty(NaiveProactiveConfig),

    /// Few large problems bounded by a minimum size.
    Steady(NaiveProactiveConfig),

    /// Divide whenever search time exceeds a bound.
    Relentless(RelentlessConfig),

    /// Interrupt on a cumulative bound, divide continuously on another.
    Impetuous(ImpetuousConfig),

    /// Proactive division refined by relentless reactions.
    Rapid(RapidConfig),
}

/// Basic strategy configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct BasicConfig {
    /// Number of partial problems.
    pub problems: Option<BoundConfig>,

    pub blend: Option<BlendConfig>,
}

/// Hasty and steady strategy configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct NaiveProactiveConfig {
    /// Partial problem size, absolute or a fraction of the plan length.
    pub size_bound: Option<BoundConfig>,

    pub blend: Option<BlendConfig>,
}

/// Relentless strategy configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RelentlessConfig {
    /// Search time bound in seconds.
    pub time_bound: BoundConfig,

    #[serde(default)]
    pub bound_type: TimeBoundType,

    /// Stages left unfixed behind a continuous division.
    pub backwards_horizon: Option<BoundValue>,

    /// Number of recent increments averaged over.
    pub moving_average: Option<u32>,

    /// Divide on any step rather than only on matching children.
    pub preemptive: Option<bool>,

    pub interrupting: Option<bool>,
}

/// Impetuous strategy configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ImpetuousConfig {
    /// Interrupting bound on the time since the last division.
    pub cumulative_time_bound: BoundConfig,

    /// Continuous bound, measured by `continuous_bound_type`.
    pub continuous_time_bound: BoundConfig,

    #[serde(default)]
    pub continuous_bound_type: TimeBoundType,

    pub backwards_horizon: Option<BoundValue>,

    pub moving_average: Option<u32>,

    pub preemptive: Option<bool>,
}

/// Rapid strategy configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RapidConfig {
    #[serde(default)]
    pub proactive_basis: ProactiveBasis,

    pub size_bound: Option<BoundConfig>,

    pub time_bound: BoundConfig,

    #[serde(default)]
    pub bound_type: TimeBoundType,

    pub backwards_horizon: Option<BoundValue>,

    pub moving_average: Option<u32>,

    pub blend: Option<BlendConfig>,
}

#[cfg(test)]
mod tests;
