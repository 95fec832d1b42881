//! The hierarchical conformance refinement planner.
//!
//! [`HierarchicalPlanner`] owns the plans generated at every abstraction
//! level and drives an [`IncrementalSolver`] to extend them:
//! - [`HierarchicalPlanner::monolevel_plan`] solves one (possibly partial)
//!   problem at one level
//! - [`HierarchicalPlanner::hierarchical_plan`] repeats monolevel planning
//!   over a level range until the ground level is complete, dividing
//!   refinement problems with a [`DivisionStrategy`] when planning online

mod hierarchical;
mod monolevel;
mod problem;
mod search;

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use hiplan_config::{LengthLimit, PlannerConfig};
use hiplan_core::{
    Action, ConformanceMapping, DivisionScenario, FinalGoal, Fluent, HierarchicalPlan,
    IncrementalSolver, InitialConditions, MonolevelPlan, PlanningError, PlanningStatistics,
    RefinementSchema, Result, ReversibleMap, SubGoal, Verbosity,
};
use tracing::{debug, warn};

use crate::strategy::DivisionStrategy;

/// Options of one monolevel planning call.
#[derive(Debug, Clone, PartialEq)]
pub struct MonolevelOptions {
    pub concurrency: bool,
    pub conformance: bool,
    /// Defaults to sequential achievement with concurrency, simultaneous otherwise.
    pub conformance_type: Option<hiplan_core::ConformanceType>,
    /// First sub-goal stage to refine; the first unachieved one if absent.
    pub first_sgoals: Option<u32>,
    /// Last sub-goal stage to refine; the last produced one if absent.
    pub last_sgoals: Option<u32>,
    pub sequential_yield: bool,
    pub save_grounding: bool,
    pub use_saved_grounding: bool,
    pub use_search_length_bound: bool,
    /// Read the plan back after every achieved stage.
    pub make_observable: bool,
    pub detect_interleaving: bool,
    pub minimise_actions: Option<bool>,
    pub preempt_positive_final_goals: Option<bool>,
    pub preempt_negative_final_goals: bool,
    pub order_final_goal_achievement: bool,
    pub time_limit: Option<Duration>,
    pub length_limit: Option<u32>,
}

impl Default for MonolevelOptions {
    fn default() -> Self {
        Self {
            concurrency: false,
            conformance: false,
            conformance_type: None,
            first_sgoals: None,
            last_sgoals: None,
            sequential_yield: false,
            save_grounding: false,
            use_saved_grounding: false,
            use_search_length_bound: true,
            make_observable: false,
            detect_interleaving: false,
            minimise_actions: None,
            preempt_positive_final_goals: None,
            preempt_negative_final_goals: false,
            order_final_goal_achievement: true,
            time_limit: None,
            length_limit: None,
        }
    }
}

impl MonolevelOptions {
    /// Options shared by every problem of a configured planning run.
    ///
    /// Length limits given as a factor depend on the level and are left unset.
    pub fn from_config(config: &PlannerConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            conformance: config.conformance,
            conformance_type: config.conformance_type,
            first_sgoals: None,
            last_sgoals: None,
            sequential_yield: config.sequential_yield,
            save_grounding: config.save_grounding,
            use_saved_grounding: config.resume_saved_grounding(),
            use_search_length_bound: config.use_search_length_bound,
            make_observable: false,
            detect_interleaving: config.detect_interleaving,
            minimise_actions: config.optimisation.minimise_actions,
            preempt_positive_final_goals: Some(config.optimisation.preempt_positive_final_goals),
            preempt_negative_final_goals: config.optimisation.preempt_negative_final_goals,
            order_final_goal_achievement: config.optimisation.order_final_goal_achievement,
            time_limit: config.time_limit(),
            length_limit: match config.length_limit {
                Some(LengthLimit::Fixed(limit)) => Some(limit),
                _ => None,
            },
        }
    }

    pub fn with_concurrency(mut self, concurrency: bool) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_conformance(mut self, conformance: bool, sequential_yield: bool) -> Self {
        self.conformance = conformance;
        self.sequential_yield = sequential_yield;
        self
    }

    pub fn with_sgoals_range(mut self, first_sgoals: u32, last_sgoals: u32) -> Self {
        self.first_sgoals = Some(first_sgoals);
        self.last_sgoals = Some(last_sgoals);
        self
    }

    pub fn with_grounding(mut self, save_grounding: bool, use_saved_grounding: bool) -> Self {
        self.save_grounding = save_grounding;
        self.use_saved_grounding = use_saved_grounding;
        self
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }

    pub fn with_length_limit(mut self, length_limit: u32) -> Self {
        self.length_limit = Some(length_limit);
        self
    }

    pub fn with_detect_interleaving(mut self, detect_interleaving: bool) -> Self {
        self.detect_interleaving = detect_interleaving;
        self
    }
}

/// Plans accumulated at every level, keyed by level.
///
/// Only successful planning calls change these.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelSolutions {
    /// States by step; include the fluents of the level above.
    pub states: BTreeMap<u32, BTreeMap<u32, Vec<Fluent>>>,
    pub actions: BTreeMap<u32, BTreeMap<u32, Vec<Action>>>,
    /// Produced sub-goal stages by index.
    pub sgoals: BTreeMap<u32, BTreeMap<u32, Vec<SubGoal>>>,
    /// Step to the index of the stage being refined on it.
    pub current_sgoals: BTreeMap<u32, ReversibleMap<u32, u32>>,
    /// Stage index to the step it was achieved on.
    pub sgoals_achieved_at: BTreeMap<u32, ReversibleMap<u32, u32>>,
    /// Whether the final goal has been achieved.
    pub complete: BTreeMap<u32, bool>,
    pub statistics: BTreeMap<u32, PlanningStatistics>,
}

/// Hierarchical planner over the domain of one incremental solver.
pub struct HierarchicalPlanner<S: IncrementalSolver> {
    name: String,
    solver: S,
    threads: usize,
    verbosity: Verbosity,
    conditions: Option<InitialConditions>,
    solutions: LevelSolutions,
    /// Level to online increment to the partial plan yielded on it.
    partial_plans: BTreeMap<u32, BTreeMap<u32, MonolevelPlan>>,
    /// Level to the scenarios dividing the plan produced at that level.
    division_scenarios: BTreeMap<u32, Vec<DivisionScenario>>,
    saved_groundings: BTreeMap<u32, S::Session>,
    /// Last stage of the refinement a saved grounding was made for.
    total_last_sgoals: BTreeMap<u32, u32>,
}

impl<S: IncrementalSolver> HierarchicalPlanner<S> {
    pub fn new(name: impl Into<String>, solver: S) -> Self {
        Self {
            name: name.into(),
            solver,
            threads: 1,
            verbosity: Verbosity::default(),
            conditions: None,
            solutions: LevelSolutions::default(),
            partial_plans: BTreeMap::new(),
            division_scenarios: BTreeMap::new(),
            saved_groundings: BTreeMap::new(),
            total_last_sgoals: BTreeMap::new(),
        }
    }

    /// Takes the thread count and verbosity of a configuration.
    pub fn with_config(mut self, config: &PlannerConfig) -> Self {
        self.threads = config.threads.max(1);
        self.verbosity = config.verbosity;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn top_level(&self) -> u32 {
        self.solver.top_level()
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn solutions(&self) -> &LevelSolutions {
        &self.solutions
    }

    pub fn problem_initialised(&self) -> bool {
        self.conditions.is_some()
    }

    /// Whether a grounding is held open at `level`.
    pub fn has_saved_grounding(&self, level: u32) -> bool {
        self.saved_groundings.contains_key(&level)
    }

    /// Generates the initial state and final goal of every level.
    pub fn initialise_problem(&mut self) -> Result<()> {
        let conditions = self.solver.initial_conditions().map_err(|err| {
            PlanningError::InvalidPlannerState(format!(
                "failed to generate initial states and final goals: {}",
                err
            ))
        })?;
        for level in 1..=self.top_level() {
            if !conditions.initial_states.contains_key(&level) {
                return Err(PlanningError::InvalidPlannerState(format!(
                    "no initial state generated at level {}",
                    level
                )));
            }
            if !conditions.final_goals.contains_key(&level) {
                return Err(PlanningError::InvalidPlannerState(format!(
                    "no final goal generated at level {}",
                    level
                )));
            }
        }
        debug!(
            planner = %self.name,
            levels = self.top_level(),
            "initialised planning problem",
        );
        self.conditions = Some(conditions);
        Ok(())
    }

    pub fn get_initial_state(&self, level: u32) -> Option<&[Fluent]> {
        self.conditions
            .as_ref()
            .and_then(|conditions| conditions.initial_states.get(&level))
            .map(Vec::as_slice)
    }

    pub fn get_final_goal(&self, level: u32) -> Option<&[FinalGoal]> {
        self.conditions
            .as_ref()
            .and_then(|conditions| conditions.final_goals.get(&level))
            .map(Vec::as_slice)
    }

    /// Discards every plan, conformance mapping, division scenario and saved
    /// grounding.
    pub fn purge_solutions(&mut self) {
        self.solutions = LevelSolutions::default();
        self.partial_plans.clear();
        self.division_scenarios.clear();
        self.saved_groundings.clear();
        self.total_last_sgoals.clear();
        debug!(planner = %self.name, "purged solutions");
    }

    /// Loads the sub-goal stages and divisions of a refinement schema as if
    /// the schema's level had been planned completely.
    pub fn load_schema(
        &mut self,
        schema: &RefinementSchema,
        init_problem: bool,
        purge_solutions: bool,
    ) -> Result<()> {
        let level = schema.level()?;
        if level > self.top_level() {
            return Err(PlanningError::invalid_input(
                "refinement schema level is above the top level",
                level,
            ));
        }
        if purge_solutions {
            self.purge_solutions();
        }

        let abstract_plan = MonolevelPlan::from_schema(schema)?;
        let points = schema
            .problem_divisions
            .iter()
            .filter(|point| !point.inherited)
            .cloned()
            .collect();
        let scenario = DivisionScenario::new(abstract_plan.clone(), points, 0)?;

        self.solutions.sgoals.insert(level, schema.constraining_sgoals.clone());
        self.solutions.actions.insert(level, abstract_plan.actions);
        self.solutions.states.insert(level, abstract_plan.states);
        self.solutions.complete.insert(level, true);
        self.division_scenarios.insert(level, vec![scenario]);

        if !self.problem_initialised() {
            if init_problem {
                self.initialise_problem()?;
            } else {
                warn!(
                    planner = %self.name,
                    "refinement schema loaded with a non-initialised problem",
                );
            }
        }
        debug!(planner = %self.name, level, schema = %schema, "loaded refinement schema");
        Ok(())
    }

    /// The level range `[bottom_level, top_level]`, the domain's top level if
    /// `top_level` is absent.
    pub fn constrained_level_range(
        &self,
        bottom_level: u32,
        top_level: Option<u32>,
    ) -> Result<RangeInclusive<u32>> {
        let top = top_level.unwrap_or_else(|| self.top_level());
        if bottom_level < 1 || top > self.top_level() || bottom_level > top {
            return Err(PlanningError::invalid_input(
                format!("level range must lie within [1-{}]", self.top_level()),
                format!("[{}-{}]", bottom_level, top),
            ));
        }
        Ok(bottom_level..=top)
    }

    /// Number of steps planned at `level`.
    pub fn total_plan_length(&self, level: u32) -> u32 {
        self.solutions.actions.get(&level).map_or(0, |actions| actions.len() as u32)
    }

    /// Number of sub-goal stages produced at `level`.
    pub fn total_produced_sgoals(&self, level: u32) -> u32 {
        self.solutions.sgoals.get(&level).map_or(0, |sgoals| sgoals.len() as u32)
    }

    /// The last stage index from the level above achieved at `level`.
    pub fn total_achieved_sgoals(&self, level: u32) -> u32 {
        self.solutions
            .sgoals_achieved_at
            .get(&level)
            .and_then(|achieved| achieved.last_key().copied())
            .unwrap_or(0)
    }

    pub fn is_complete(&self, level: u32) -> bool {
        self.solutions.complete.get(&level).copied().unwrap_or(false)
    }

    /// The concatenated plan at `level` over `[start_step, end_step]`,
    /// with its conformance mapping up to the first step outside any
    /// refined stage.
    pub fn get_monolevel_plan(
        &self,
        level: u32,
        start_step: u32,
        end_step: Option<u32>,
    ) -> Result<MonolevelPlan> {
        let actions = self
            .solutions
            .actions
            .get(&level)
            .filter(|actions| !actions.is_empty())
            .ok_or_else(|| PlanningError::invalid_input("no plan exists at level", level))?;
        let total_plan_length = actions.len() as u32;
        let end_step = end_step.map_or(total_plan_length, |end| end.min(total_plan_length));

        let above = self.solutions.sgoals.get(&(level + 1));
        let current = self.solutions.current_sgoals.get(&level);
        let achieved = self.solutions.sgoals_achieved_at.get(&level);
        let refined = above.is_some() && achieved.is_some();

        let mut plan = MonolevelPlan {
            level,
            states: BTreeMap::new(),
            actions: BTreeMap::new(),
            produced_sgoals: BTreeMap::new(),
            is_final: self.is_complete(level) && end_step == total_plan_length,
            statistics: self.solutions.statistics.get(&level).cloned().unwrap_or_default(),
            conformance_mapping: None,
            problem_divisions: Vec::new(),
        };
        let mut mapping = ConformanceMapping::default();
        let mut trailing_plan = false;

        let states = self.solutions.states.get(&level);
        let produced = self.solutions.sgoals.get(&level);
        for step in start_step..=end_step {
            let state = states.and_then(|states| states.get(&step)).cloned();
            plan.states.insert(step, state.unwrap_or_default());
            if step == start_step {
                continue;
            }
            plan.actions
                .insert(step, actions.get(&step).cloned().unwrap_or_default());
            if level != 1 {
                if let Some(sgoals) = produced.and_then(|produced| produced.get(&step)) {
                    plan.produced_sgoals.insert(step, sgoals.clone());
                }
            }

            if !refined || trailing_plan {
                continue;
            }
            let Some(index) = current.and_then(|current| current.get(&step)).copied() else {
                trailing_plan = true;
                continue;
            };
            if let Some(sgoals) = above.and_then(|above| above.get(&index)) {
                mapping.constraining_sgoals.insert(index, sgoals.clone());
            }
            mapping.current_sgoals.insert(step, index);
            if let Some(achieved_step) = achieved.and_then(|achieved| achieved.get(&index)) {
                mapping.sgoals_achieved_at.insert(index, *achieved_step);
            }
        }
        if refined {
            plan.conformance_mapping = Some(mapping);
        }
        Ok(plan)
    }

    /// The concatenated ground plan; empty if none exists yet.
    pub fn get_executable_plan(&self) -> Option<MonolevelPlan> {
        self.get_monolevel_plan(1, 0, None).ok()
    }

    /// The concatenated plans, partial plans and division scenarios over a
    /// level range. Levels without a plan are left out.
    pub fn get_hierarchical_plan(
        &self,
        bottom_level: u32,
        top_level: Option<u32>,
    ) -> Result<HierarchicalPlan> {
        let mut concatenated = BTreeMap::new();
        let mut partial = BTreeMap::new();
        let mut tree = BTreeMap::new();
        for level in self.constrained_level_range(bottom_level, top_level)? {
            if self.total_plan_length(level) == 0 {
                continue;
            }
            concatenated.insert(level, self.get_monolevel_plan(level, 0, None)?);
            partial.insert(level, self.partial_plans.get(&level).cloned().unwrap_or_default());
            tree.insert(
                level,
                self.division_scenarios.get(&level).cloned().unwrap_or_default(),
            );
        }
        Ok(HierarchicalPlan::new(concatenated, partial, tree))
    }

    /// Position of the first scenario at `level` whose last stage has not
    /// been refined at the level below.
    fn current_division_scenario_position(&self, level: u32) -> Option<usize> {
        let achieved = self.total_achieved_sgoals(level.saturating_sub(1));
        self.division_scenarios
            .get(&level)?
            .iter()
            .position(|scenario| scenario.last_index() > achieved)
    }

    /// The earliest scenario at `level` that is not yet fully refined.
    pub fn get_current_division_scenario(&self, level: u32) -> Option<&DivisionScenario> {
        let position = self.current_division_scenario_position(level)?;
        self.division_scenarios.get(&level)?.get(position)
    }

    pub fn division_scenarios(&self, level: u32) -> &[DivisionScenario] {
        self.division_scenarios.get(&level).map_or(&[], Vec::as_slice)
    }

    /// The highest or lowest level that can be planned at.
    ///
    /// A level can be planned at if it is incomplete and it is either the top
    /// of the range or has unachieved stages from the level above. `None` iff
    /// every level in the range is complete.
    pub fn get_valid_planning_level(
        &self,
        highest: bool,
        bottom_level: u32,
        top_level: Option<u32>,
    ) -> Result<Option<u32>> {
        let range = self.constrained_level_range(bottom_level, top_level)?;
        let top = *range.end();
        let is_valid = |level: &u32| {
            let level = *level;
            let unachieved = self.total_produced_sgoals(level + 1)
                > self
                    .solutions
                    .sgoals_achieved_at
                    .get(&level)
                    .map_or(0, |achieved| achieved.len() as u32);
            !self.is_complete(level) && (level == top || unachieved)
        };
        let valid = if highest {
            range.clone().rev().find(is_valid)
        } else {
            range.clone().find(is_valid)
        };
        if valid.is_none() && !range.clone().all(|level| self.is_complete(level)) {
            return Err(PlanningError::Internal(format!(
                "found no valid planning level in [{}-{}] though not all levels are complete",
                range.start(),
                range.end()
            )));
        }
        Ok(valid)
    }
}

/// Reborrows an optional strategy for a single planning call.
fn reborrow<'a>(
    strategy: &'a mut Option<&mut dyn DivisionStrategy>,
) -> Option<&'a mut dyn DivisionStrategy> {
    match strategy {
        Some(strategy) => Some(&mut **strategy),
        None => None,
    }
}

impl<S: IncrementalSolver> std::fmt::Debug for HierarchicalPlanner<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchicalPlanner")
            .field("name", &self.name)
            .field("top_level", &self.top_level())
            .field("threads", &self.threads)
            .field("initialised", &self.problem_initialised())
            .field("saved_groundings", &self.saved_groundings.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests;
