//! hiplan core - value types and bookkeeping for hierarchical planning
//!
//! This crate provides the fundamental abstractions of the planner:
//! - Literal records extracted from solved models
//! - Division points and scenarios splitting refinement problems
//! - Conformance mappings between refined plans and sub-goal stages
//! - Monolevel and hierarchical plans with their statistics
//! - The interface to the external incremental solving engine

pub mod conformance;
pub mod division;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod literal;
pub mod plan;
pub mod problem;
pub mod reversible;
pub mod schema;
pub mod statistics;

#[cfg(test)]
pub(crate) mod test_utils;

pub use conformance::ConformanceMapping;
pub use division::{
    Blend, BlendQuantity, DivisionPoint, DivisionPointPair, DivisionScenario, SubGoalRange,
};
pub use engine::{
    Answer, EngineError, External, Feedback, HaltReason, IncrementalSolver, InitialConditions,
    SearchRequest, SolveOptions, SolveResult, SolveSession,
};
pub use error::{PlanningError, Result};
pub use hierarchy::HierarchicalPlan;
pub use literal::{Action, FinalGoal, Fluent, IndexStep, SubGoal};
pub use plan::{Expansion, MonolevelPlan};
pub use problem::{ConformanceType, MonolevelProblem, OnlineMethod, Verbosity};
pub use reversible::ReversibleMap;
pub use schema::RefinementSchema;
pub use statistics::{IncrementStatistics, PlanningStatistics, SolveTimes};
