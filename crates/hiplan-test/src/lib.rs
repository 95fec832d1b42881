//! Shared test fixtures for hiplan crates.
//!
//! - [`plans`] - Abstract plan and sub-goal fixtures
//! - [`scripted`] - A deterministic incremental solver over a synthetic domain
//!
//! # Usage
//!
//! Add as a dev-dependency in your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! hiplan-test = { workspace = true }
//! ```
//!
//! ```ignore
//! use hiplan_test::{abstract_plan, ScriptedSolver};
//!
//! let solver = ScriptedSolver::new(2, 4).with_expansion(1, 3);
//! ```

pub mod plans;
pub mod scripted;

pub use plans::{abstract_plan, abstract_plan_from, sgoal_stage};
pub use scripted::{ScriptedSession, ScriptedSolver, SessionEvent, SessionLog};
