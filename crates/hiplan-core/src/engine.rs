//! Interface to the external incremental answer-set solving engine.
//!
//! The planner never grounds or searches itself. It hands a [`SearchRequest`] to an
//! [`IncrementalSolver`], then drives the returned [`SolveSession`] one search
//! increment at a time, toggling externals between increments and reading the
//! current model back as an [`Answer`].

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::literal::{group_by, Action, FinalGoal, Fluent, IndexStep, SubGoal};
use crate::problem::MonolevelProblem;
use crate::statistics::{PlanningStatistics, SolveTimes};

/// Errors reported by the solving engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The program could not be grounded.
    #[error("Grounding failed: {0}")]
    Grounding(String),

    /// Search failed for a reason other than unsatisfiability.
    #[error("Search failed: {0}")]
    Search(String),

    /// The session was used after it finished or in an invalid way.
    #[error("Session error: {0}")]
    Session(String),
}

/// Outcome of one search increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveResult {
    Satisfiable,
    Unsatisfiable,
    Unknown,
}

/// Why a session stopped yielding increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// The search length limit was reached.
    StepLimit,
    /// The cumulative time limit was reached.
    TimeLimit,
    /// The program was proven unsatisfiable.
    Unsatisfiable,
    /// The stop condition was met; no further increments are needed.
    Exhausted,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::StepLimit => write!(f, "step limit"),
            HaltReason::TimeLimit => write!(f, "time limit"),
            HaltReason::Unsatisfiable => write!(f, "unsatisfiable"),
            HaltReason::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Feedback yielded after each search increment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feedback {
    /// Search length reached by the increment.
    pub end_step: u32,
    /// Times spent on the increment.
    pub times: SolveTimes,
    pub solve_result: SolveResult,
}

/// Boolean switches visible to the solver between increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum External {
    /// The stage at `index` is the next one to achieve, current from `step`.
    CurrentLastSgoals { index: u32, step: u32 },
    /// The final goal must hold on every step from `step` onwards.
    SequentialAchieveFinalGoals { step: u32 },
}

impl fmt::Display for External {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            External::CurrentLastSgoals { index, step } => {
                write!(f, "current_last_sgoals({}, {})", index, step)
            }
            External::SequentialAchieveFinalGoals { step } => {
                write!(f, "seq_achieve_fgoals({})", step)
            }
        }
    }
}

/// Solver options resolved by the planner for one search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveOptions {
    /// Worker threads the engine may use.
    pub threads: usize,
    /// Cumulative time limit for the search.
    pub time_limit: Option<Duration>,
    /// Maximum search length.
    pub length_limit: Option<u32>,
    /// Minimum search length used to prune early increments.
    pub search_length_bound: Option<u32>,
    /// Stop at the first satisfiable increment (classical search).
    pub stop_on_satisfiable: bool,
    /// Keep the grounding open after the search.
    pub save_grounding: bool,
    pub minimise_actions: bool,
    pub preempt_positive_final_goals: bool,
    pub preempt_negative_final_goals: bool,
    pub order_final_goal_achievement: bool,
}

/// Everything the engine needs to search one monolevel problem.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub problem: MonolevelProblem,
    /// State at the problem's start step.
    pub start_state: Vec<Fluent>,
    /// Final goals at the problem level and the level above.
    pub final_goals: Vec<FinalGoal>,
    /// Sub-goal stages to refine, by index.
    pub sgoals: BTreeMap<u32, Vec<SubGoal>>,
    /// Sub-goal stage count of the whole refinement, for saved groundings.
    pub total_last_sgoals: u32,
    pub options: SolveOptions,
}

/// Initial states and final goals of every level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialConditions {
    pub initial_states: BTreeMap<u32, Vec<Fluent>>,
    pub final_goals: BTreeMap<u32, Vec<FinalGoal>>,
}

/// The current model of a session, as typed literal records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Search length of the model.
    pub end_step: u32,
    pub satisfiable: bool,
    pub fluents: Vec<Fluent>,
    pub actions: Vec<Action>,
    pub produced_sgoals: Vec<SubGoal>,
    /// `current_sub_goal_index(level, index, step)` facts.
    pub current_sgoal_indices: Vec<IndexStep>,
    /// `sgoals_ach_at(level, index, step)` facts.
    pub sgoals_achieved: Vec<IndexStep>,
    pub statistics: PlanningStatistics,
}

impl Answer {
    /// Fluents of the given levels, by step.
    pub fn states(&self, levels: &[u32]) -> BTreeMap<u32, Vec<Fluent>> {
        let fluents: Vec<Fluent> = self
            .fluents
            .iter()
            .filter(|f| levels.contains(&f.level))
            .cloned()
            .collect();
        group_by(&fluents, |f| f.step)
    }

    /// Actions of a level, by step.
    pub fn actions_by_step(&self, level: u32) -> BTreeMap<u32, Vec<Action>> {
        let actions: Vec<Action> = self
            .actions
            .iter()
            .filter(|a| a.level == level)
            .cloned()
            .collect();
        group_by(&actions, |a| a.step)
    }

    /// Actions of a level planned at or before `step`.
    pub fn actions_until(&self, level: u32, step: u32) -> Vec<Action> {
        self.actions
            .iter()
            .filter(|a| a.level == level && a.step <= step)
            .cloned()
            .collect()
    }

    /// Sub-goals produced at a level, by stage index.
    pub fn produced_sgoals_by_index(&self, level: u32) -> BTreeMap<u32, Vec<SubGoal>> {
        let sgoals: Vec<SubGoal> = self
            .produced_sgoals
            .iter()
            .filter(|s| s.level == level)
            .cloned()
            .collect();
        group_by(&sgoals, |s| s.index)
    }
}

/// A resumable incremental solve call.
pub trait SolveSession: Send {
    /// Runs one search increment; `None` once the session has halted.
    fn next_increment(&mut self) -> Result<Option<Feedback>, EngineError>;

    /// Why the session halted, if it has.
    fn halt_reason(&self) -> Option<HaltReason>;

    /// Queues an external to be assigned before the next increment.
    fn assign_external(&mut self, external: External, truth: bool) -> Result<(), EngineError>;

    fn release_external(&mut self, external: External) -> Result<(), EngineError>;

    /// The current model.
    fn answer(&self) -> Result<Answer, EngineError>;

    /// Adds hard constraints fixing the given actions and fluents.
    fn fix_plan(&mut self, actions: &[Action], fluents: &[Fluent]) -> Result<(), EngineError>;

    /// Adds a weak constraint preferring the given actions at `priority`.
    fn prefer_actions(&mut self, actions: &[Action], priority: u32) -> Result<(), EngineError>;

    /// Retargets a saved grounding at a new partial problem.
    fn resume(&mut self, request: &SearchRequest) -> Result<(), EngineError>;
}

/// Factory for solve sessions over one planning domain.
pub trait IncrementalSolver {
    type Session: SolveSession;

    /// Top abstraction level of the domain.
    fn top_level(&self) -> u32;

    /// Generates the initial states and final goals of every level.
    fn initial_conditions(&mut self) -> Result<InitialConditions, EngineError>;

    /// Grounds and starts a new session for the request.
    fn start(&mut self, request: &SearchRequest) -> Result<Self::Session, EngineError>;
}
