//! hiplan Solver
//!
//! This crate provides the planner built on the core types:
//! - The hierarchical planner and its monolevel planning calls
//! - Division strategies (proactive, reactive and adaptive)
//! - Configuration wiring (builder module)

pub mod builder;
pub mod planner;
pub mod strategy;

pub use builder::StrategyBuilder;
pub use planner::{HierarchicalPlanner, LevelSolutions, MonolevelOptions};
pub use strategy::{
    BackwardsHorizon, Basic, Blends, BoundKind, Bounds, DivisionStrategy, Impetuous,
    NaiveProactive, Rapid, Reaction, ReactionContext, ReactiveState, Relentless,
};
