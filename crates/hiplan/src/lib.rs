//! hiplan - Hierarchical Incremental Planning
//!
//! Plans a problem at several abstraction levels, refining the plan of each
//! level into the one below it, optionally dividing the refinement into
//! partial problems that are solved online.
//!
//! # Example
//!
//! ```rust
//! use hiplan::prelude::*;
//!
//! let config = PlannerConfig::new().with_conformance(true, false);
//! assert!(config.validate().is_ok());
//! assert!(!config.is_online());
//! ```

// Value types
pub use hiplan_core::{
    Action, Blend, BlendQuantity, ConformanceMapping, ConformanceType, DivisionPoint,
    DivisionScenario, Expansion, FinalGoal, Fluent, HierarchicalPlan, MonolevelPlan,
    MonolevelProblem, OnlineMethod, PlanningError, PlanningStatistics, RefinementSchema, Result,
    SubGoal, SubGoalRange, Verbosity,
};

// Engine interface
pub use hiplan_core::{
    Answer, EngineError, External, Feedback, HaltReason, IncrementalSolver, InitialConditions,
    SearchRequest, SolveOptions, SolveResult, SolveSession,
};

// Configuration
pub use hiplan_config::{ConfigError, DivisionStrategyConfig, LengthLimit, PlannerConfig};

// Planner and strategies
pub use hiplan_solver::{
    DivisionStrategy, HierarchicalPlanner, LevelSolutions, MonolevelOptions, StrategyBuilder,
};

#[cfg(feature = "console")]
pub use hiplan_console as console;

mod run;
pub use run::run_planner;

pub mod prelude {
    pub use super::{
        DivisionPoint, HierarchicalPlan, HierarchicalPlanner, IncrementalSolver, MonolevelOptions,
        MonolevelPlan, OnlineMethod, PlannerConfig, PlanningError, RefinementSchema,
    };
    pub use super::run_planner;
}
