//! Monolevel planning: one search at one abstraction level.

use std::collections::BTreeMap;
use std::time::Duration;

use hiplan_core::{
    ConformanceMapping, IncrementalSolver, MonolevelPlan, MonolevelProblem, PlanningError, Result,
    SearchRequest, SolveOptions, SolveSession,
};
use tracing::{debug, info, warn};

use super::search::{engine_failure, search, SearchSpec, Solution};
use super::{HierarchicalPlanner, MonolevelOptions};
use crate::strategy::DivisionStrategy;

impl<S: IncrementalSolver> HierarchicalPlanner<S> {
    /// Generates a (possibly partial) plan at `level`.
    ///
    /// With conformance, the plan refines the sub-goal stages
    /// `[first_sgoals, last_sgoals]` produced at the level above, starting
    /// from the step the stage before the first was achieved on. The plan is
    /// concatenated onto the plan already stored at `level`.
    ///
    /// On any failure the stored plans are left untouched.
    pub fn monolevel_plan(
        &mut self,
        level: u32,
        options: &MonolevelOptions,
        strategy: Option<&mut dyn DivisionStrategy>,
    ) -> Result<MonolevelPlan> {
        if !self.problem_initialised() {
            return Err(PlanningError::InvalidPlannerState(
                "planning problem is not initialised".to_string(),
            ));
        }
        if level < 1 || level > self.top_level() {
            return Err(PlanningError::invalid_input(
                format!("planning level must lie within [1-{}]", self.top_level()),
                level,
            ));
        }
        if options.time_limit == Some(Duration::ZERO) {
            return Err(PlanningError::invalid_input(
                "time limit must be positive",
                "0s",
            ));
        }
        if options.length_limit == Some(0) {
            return Err(PlanningError::invalid_input(
                "search length limit must be positive",
                0,
            ));
        }

        let problem = self.create_problem(level, options, strategy.as_deref())?;
        if let Some(limit) = options.length_limit {
            if problem.use_search_length_bound && limit < problem.search_length_bound {
                warn!(
                    level,
                    length_limit = limit,
                    search_length_bound = problem.search_length_bound,
                    "search length limit is below the minimum search length bound",
                );
            }
        }

        let use_saved_grounding =
            options.use_saved_grounding && self.saved_groundings.contains_key(&level);
        let save_grounding = options.save_grounding && !problem.is_final;
        if (use_saved_grounding || save_grounding) && !self.total_last_sgoals.contains_key(&level)
        {
            self.total_last_sgoals
                .insert(level, self.total_produced_sgoals(level + 1));
        }
        let achieved_sgoals = self.total_achieved_sgoals(level);

        info!(
            event = "monolevel_start",
            planner = %self.name,
            level,
            problem = %problem,
            saved_grounding = use_saved_grounding,
        );

        let request = self.search_request(&problem, options, use_saved_grounding, save_grounding);
        let empty = BTreeMap::new();
        let above_sgoals = self.solutions.sgoals.get(&(level + 1)).unwrap_or(&empty);
        let mut spec = SearchSpec {
            level,
            start_step: problem.start_step,
            first_sgoals: problem.first_sgoals,
            last_sgoals: problem.last_sgoals,
            finalise: problem.is_final && problem.conformance,
            sequential_yield: problem.sequential_yield,
            detect_interleaving: options.detect_interleaving && problem.sequential_yield,
            make_observable: options.make_observable,
            sgoals: above_sgoals,
        };

        let saved_session = if use_saved_grounding {
            self.saved_groundings.remove(&level)
        } else {
            None
        };
        let mut session = match saved_session {
            Some(mut session) => {
                session.resume(&request).map_err(engine_failure)?;
                let fixed_actions: Vec<_> = self
                    .solutions
                    .actions
                    .get(&level)
                    .map(|actions| {
                        actions
                            .range(..=problem.start_step)
                            .flat_map(|(_, step_actions)| step_actions.clone())
                            .collect()
                    })
                    .unwrap_or_default();
                let fixed_fluents: Vec<_> = self
                    .solutions
                    .states
                    .get(&level)
                    .and_then(|states| states.get(&problem.start_step))
                    .cloned()
                    .unwrap_or_default();
                session
                    .fix_plan(&fixed_actions, &fixed_fluents)
                    .map_err(engine_failure)?;
                spec.first_sgoals = spec
                    .first_sgoals
                    .max(achieved_sgoals + 1)
                    .min(spec.last_sgoals);
                session
            }
            None => self.solver.start(&request).map_err(engine_failure)?,
        };

        // A failed search loses its session, including any saved grounding.
        let solution = search(&mut session, &spec, strategy)?;

        if save_grounding {
            self.saved_groundings.insert(level, session);
            debug!(event = "grounding_saved", level);
        } else {
            drop(session);
            debug!(event = "grounding_released", level);
        }

        let plan = self.store_solution(&problem, solution, use_saved_grounding)?;

        info!(
            event = "monolevel_end",
            planner = %self.name,
            level,
            plan_length = plan.plan_length(),
            total_actions = plan.total_actions(),
            is_final = plan.is_final,
            time = plan.statistics.total_time(),
        );
        if self.verbosity.shows_plans() {
            info!(level, plan = %plan, "monolevel plan");
        }
        Ok(plan)
    }

    fn search_request(
        &self,
        problem: &MonolevelProblem,
        options: &MonolevelOptions,
        use_saved_grounding: bool,
        save_grounding: bool,
    ) -> SearchRequest {
        let level = problem.level;

        let mut start_state = Vec::new();
        if !problem.conformance || problem.is_initial {
            for state_level in [level, level + 1] {
                if let Some(state) = self.get_initial_state(state_level) {
                    start_state.extend_from_slice(state);
                }
            }
        } else if let Some(state) = self
            .solutions
            .states
            .get(&level)
            .and_then(|states| states.get(&problem.start_step))
        {
            start_state.extend_from_slice(state);
        }

        let mut final_goals = Vec::new();
        for goal_level in [level, level + 1] {
            if let Some(goals) = self.get_final_goal(goal_level) {
                final_goals.extend_from_slice(goals);
            }
        }

        let mut first_sgoals = problem.first_sgoals;
        let achieved_sgoals = self.total_achieved_sgoals(level);
        if use_saved_grounding && first_sgoals <= achieved_sgoals {
            first_sgoals = (achieved_sgoals + 1).min(problem.last_sgoals);
        }
        let sgoals = if problem.conformance {
            self.solutions
                .sgoals
                .get(&(level + 1))
                .map(|sgoals| {
                    sgoals
                        .range(first_sgoals..=problem.last_sgoals)
                        .map(|(index, stage)| (*index, stage.clone()))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            BTreeMap::new()
        };

        let minimise_actions = options.minimise_actions.unwrap_or(options.concurrency);
        let preempt_positive_final_goals = options
            .preempt_positive_final_goals
            .unwrap_or(!problem.complete_planning || problem.reactive_divisions);

        SearchRequest {
            problem: problem.clone(),
            start_state,
            final_goals,
            sgoals,
            total_last_sgoals: self
                .total_last_sgoals
                .get(&level)
                .copied()
                .unwrap_or(problem.last_sgoals),
            options: SolveOptions {
                threads: self.threads,
                time_limit: options.time_limit,
                length_limit: options.length_limit,
                search_length_bound: problem
                    .use_search_length_bound
                    .then_some(problem.search_length_bound),
                stop_on_satisfiable: !problem.sequential_yield,
                save_grounding: save_grounding || use_saved_grounding,
                minimise_actions,
                preempt_positive_final_goals,
                preempt_negative_final_goals: options.preempt_negative_final_goals,
                order_final_goal_achievement: options.order_final_goal_achievement,
            },
        }
    }

    /// Concatenates a successful search onto the stored plans.
    fn store_solution(
        &mut self,
        problem: &MonolevelProblem,
        solution: Solution,
        used_saved_grounding: bool,
    ) -> Result<MonolevelPlan> {
        let level = problem.level;
        let Solution {
            answer,
            last_achieved_sgoals,
            overhead_time,
            sequential_yield_steps,
            reactive_divisions,
            interrupted,
            interleaving_quantity,
            interleaving_score,
        } = solution;

        let start_step = problem.start_step;
        let end_step = answer.end_step;
        let achieved_final =
            problem.is_final && !interrupted && last_achieved_sgoals == problem.last_sgoals;

        let mut statistics = answer.statistics.clone();
        statistics.overhead_time += overhead_time;
        statistics.interleaving_quantity += interleaving_quantity;
        statistics.interleaving_score += interleaving_score;
        match self.solutions.statistics.get_mut(&level) {
            Some(stored) if !used_saved_grounding => stored.combine_with(&statistics),
            _ => {
                self.solutions.statistics.insert(level, statistics.clone());
            }
        }

        let states: BTreeMap<_, _> = answer
            .states(&[level, level + 1])
            .into_iter()
            .filter(|(step, _)| (start_step..=end_step).contains(step))
            .collect();
        let actions: BTreeMap<_, _> = (start_step + 1..=end_step)
            .map(|step| (step, Vec::new()))
            .chain(
                answer
                    .actions_by_step(level)
                    .into_iter()
                    .filter(|(step, _)| (start_step + 1..=end_step).contains(step)),
            )
            .collect();
        let produced_sgoals: BTreeMap<_, _> = answer
            .produced_sgoals_by_index(level)
            .into_iter()
            .filter(|(index, _)| (start_step + 1..=end_step).contains(index))
            .collect();

        let conformance_mapping = if problem.conformance {
            let constraining = self
                .solutions
                .sgoals
                .get(&(level + 1))
                .map(|sgoals| {
                    sgoals
                        .range(problem.first_sgoals..=last_achieved_sgoals)
                        .map(|(index, stage)| (*index, stage.clone()))
                        .collect()
                })
                .unwrap_or_default();
            let mut mapping =
                ConformanceMapping::from_answer(constraining, &answer, sequential_yield_steps);
            mapping
                .current_sgoals
                .retain(|step, _| (start_step + 1..=end_step).contains(step));
            mapping
                .sgoals_achieved_at
                .retain(|index, _| (problem.first_sgoals..=last_achieved_sgoals).contains(index));
            Some(mapping)
        } else {
            None
        };

        for (step, state) in &states {
            self.solutions
                .states
                .entry(level)
                .or_default()
                .insert(*step, state.clone());
        }
        let stored_actions = self.solutions.actions.entry(level).or_default();
        stored_actions.retain(|step, _| *step <= start_step);
        stored_actions.extend(actions.clone());
        let stored_sgoals = self.solutions.sgoals.entry(level).or_default();
        stored_sgoals.retain(|index, _| *index <= start_step);
        stored_sgoals.extend(produced_sgoals.clone());
        self.solutions.complete.insert(level, achieved_final);

        if let Some(mapping) = &conformance_mapping {
            let current = self.solutions.current_sgoals.entry(level).or_default();
            current.retain(|step, _| *step <= start_step);
            current.extend(&mapping.current_sgoals);
            let achieved = self.solutions.sgoals_achieved_at.entry(level).or_default();
            achieved.retain(|index, _| *index < problem.first_sgoals);
            achieved.extend(&mapping.sgoals_achieved_at);
        }

        Ok(MonolevelPlan {
            level,
            states,
            actions,
            produced_sgoals,
            is_final: achieved_final,
            statistics,
            conformance_mapping,
            problem_divisions: reactive_divisions,
        })
    }
}
