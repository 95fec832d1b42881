//! Hierarchical planning: online and offline progression over a level range.

use std::collections::BTreeMap;
use std::time::Instant;

use hiplan_config::{LengthLimit, PlannerConfig};
use hiplan_core::{
    DivisionPoint, HierarchicalPlan, IncrementalSolver, MonolevelPlan, OnlineMethod,
    PlanningError, Result,
};
use tracing::{debug, info, warn};

use super::{reborrow, HierarchicalPlanner, MonolevelOptions};
use crate::builder::StrategyBuilder;
use crate::strategy::DivisionStrategy;

impl<S: IncrementalSolver> HierarchicalPlanner<S> {
    /// Plans over the configured level range until the bottom level is
    /// complete.
    ///
    /// Planning is online iff the configuration names a division strategy.
    pub fn hierarchical_plan(&mut self, config: &PlannerConfig) -> Result<HierarchicalPlan> {
        let mut strategy = config
            .division_strategy
            .as_ref()
            .map(StrategyBuilder::build)
            .transpose()?;
        match strategy.as_mut() {
            Some(strategy) => self.hierarchical_plan_with(config, Some(&mut **strategy)),
            None => self.hierarchical_plan_with(config, None),
        }
    }

    /// Plans over the configured level range with a caller supplied
    /// division strategy, ignoring any strategy the configuration names.
    pub fn hierarchical_plan_with(
        &mut self,
        config: &PlannerConfig,
        mut strategy: Option<&mut dyn DivisionStrategy>,
    ) -> Result<HierarchicalPlan> {
        config
            .validate()
            .map_err(|err| PlanningError::invalid_input("invalid planner configuration", err))?;
        if !self.problem_initialised() {
            return Err(PlanningError::InvalidPlannerState(
                "planning problem is not initialised".to_string(),
            ));
        }
        let range = self.constrained_level_range(config.bottom_level, config.top_level)?;
        let (bottom, top) = (*range.start(), *range.end());
        let online = strategy.is_some();

        if config.conformance
            && top != self.top_level()
            && self.total_produced_sgoals(top + 1) == 0
        {
            warn!(
                level = top,
                "hierarchical planning starts below the top level without sub-goal stages to conform to",
            );
        }

        info!(
            event = "hierarchical_start",
            planner = %self.name,
            bottom_level = bottom,
            top_level = top,
            online,
            method = %config.online_method,
            strategy = strategy.as_ref().map_or("none", |strategy| strategy.name()),
            predicted_increments = ?strategy.as_ref().and_then(|strategy| {
                strategy.total_increments_prediction(top, config.online_method)
            }),
        );
        let started = Instant::now();

        let base_options = MonolevelOptions::from_config(config);
        let mut increments: u32 = 0;
        let mut problems: BTreeMap<u32, u32> = BTreeMap::new();

        while !self.is_complete(bottom) {
            increments += 1;
            let lowest = self.get_valid_planning_level(false, bottom, Some(top))?;
            let highest = self.get_valid_planning_level(true, bottom, Some(top))?;
            let (Some(lowest), Some(highest)) = (lowest, highest) else {
                return Err(PlanningError::Internal(format!(
                    "no valid planning level in [{}-{}] though level {} is incomplete",
                    bottom, top, bottom
                )));
            };
            let current_range = match config.online_method {
                OnlineMethod::GroundFirst => bottom..=lowest,
                OnlineMethod::CompleteFirst => highest..=highest,
            };
            info!(
                event = "increment_start",
                increment = increments,
                method = %config.online_method,
                levels = %format!("[{}-{}]", current_range.start(), current_range.end()),
            );

            for level in current_range.rev() {
                let problem_number = {
                    let count = problems.entry(level).or_insert(0);
                    *count += 1;
                    *count
                };
                let conformance = config.conformance && self.total_produced_sgoals(level + 1) > 0;

                let mut options = base_options.clone();
                options.conformance = conformance;

                let mut dividing: Option<DividingProblem> = None;
                if conformance {
                    options.first_sgoals = Some(1);
                    options.last_sgoals = Some(self.total_produced_sgoals(level + 1));
                    if online {
                        let no_scenario = || {
                            PlanningError::Internal(format!(
                                "no current division scenario for problem {} at level {}",
                                problem_number, level
                            ))
                        };
                        let position = self
                            .current_division_scenario_position(level + 1)
                            .ok_or_else(no_scenario)?;
                        let scenario = self
                            .division_scenarios(level + 1)
                            .get(position)
                            .ok_or_else(no_scenario)?;
                        if !scenario.problem_range().contains(&problem_number) {
                            return Err(PlanningError::Internal(format!(
                                "problem {} at level {} is outside the scenario problem range {:?}",
                                problem_number,
                                level,
                                scenario.problem_range()
                            )));
                        }
                        let sgoals_range =
                            scenario.get_subgoals_indices_range(problem_number, false)?;
                        debug!(
                            level,
                            problem = problem_number,
                            sgoals_range = %sgoals_range,
                            "proactively chosen sub-goal stage range",
                        );
                        options.first_sgoals = Some(sgoals_range.first_index());
                        options.last_sgoals = Some(sgoals_range.last_index());
                        dividing = Some(DividingProblem {
                            position,
                            problem_number,
                        });
                    }
                }

                options.length_limit = match config.length_limit {
                    Some(LengthLimit::Fixed(limit)) => Some(limit),
                    Some(LengthLimit::Factor(factor)) if conformance => {
                        Some((factor * f64::from(self.total_plan_length(level + 1))).ceil() as u32)
                    }
                    Some(LengthLimit::Factor(factor)) => {
                        warn!(
                            level,
                            factor,
                            "length limit factor ignored for classical planning",
                        );
                        None
                    }
                    None => None,
                };

                let plan = self
                    .monolevel_plan(level, &options, reborrow(&mut strategy))
                    .map_err(|err| match err {
                        PlanningError::NoSolution { .. } => PlanningError::no_solution_from(
                            format!(
                                "hierarchical planning problem over levels [{}-{}] does not have a valid solution",
                                bottom, top
                            ),
                            err,
                        ),
                        other => other,
                    })?;
                self.partial_plans
                    .entry(level)
                    .or_default()
                    .insert(increments, plan.clone());

                let (interrupted, preemptive) = check_yielded_plan(&plan, options.last_sgoals)?;

                if let Some(dividing) = dividing.filter(|_| !plan.problem_divisions.is_empty()) {
                    self.record_reactive_divisions(level, dividing, &plan.problem_divisions)?;
                    if interrupted && preemptive {
                        debug!(
                            level,
                            plan_length = plan.end_step(),
                            search_length = plan.statistics.search_length(),
                            saved_grounding = config.save_grounding,
                            "search length passed a preemptive interrupting division",
                        );
                    }
                }

                let divides_here = match config.online_method {
                    OnlineMethod::GroundFirst => true,
                    OnlineMethod::CompleteFirst => self.is_complete(level),
                };
                if config.conformance && level != 1 && divides_here {
                    if let Some(strategy) = strategy.as_deref() {
                        let previously_solved = problems.get(&(level - 1)).copied().unwrap_or(0);
                        let first_sgoals = options.first_sgoals.unwrap_or(1);
                        self.divide_proactively(
                            level,
                            strategy,
                            dividing,
                            first_sgoals,
                            previously_solved,
                            config.avoid_refining_sgoals_marked_for_blending,
                        )?;
                    }
                }
            }
        }

        let plan = self.get_hierarchical_plan(bottom, Some(top))?;
        info!(
            event = "hierarchical_end",
            planner = %self.name,
            increments,
            plan_length = plan.get(bottom).map_or(0, MonolevelPlan::plan_length),
            total_actions = plan.get(bottom).map_or(0, MonolevelPlan::total_actions),
            time = started.elapsed().as_secs_f64(),
        );
        Ok(plan)
    }

    /// Inserts reactive divisions into the scenario dividing `level + 1`.
    fn record_reactive_divisions(
        &mut self,
        level: u32,
        dividing: DividingProblem,
        points: &[DivisionPoint],
    ) -> Result<()> {
        let scenario = self
            .division_scenarios
            .get_mut(&(level + 1))
            .and_then(|scenarios| scenarios.get_mut(dividing.position))
            .ok_or_else(|| {
                PlanningError::Internal(format!(
                    "reactive divisions made at level {} without a dividing scenario",
                    level
                ))
            })?;
        for point in points {
            if scenario.contains_index(point.index) {
                debug!(level, point = %point, "reactive division already in scenario");
                continue;
            }
            scenario.update_reactively(point.clone(), true, true)?;
        }
        debug!(level, scenario = %scenario, "updated division scenario for reactive divisions");
        Ok(())
    }

    /// Divides the abstract plan just generated at `level` for refinement at
    /// the level below.
    ///
    /// When the plan was a partial problem of a scenario, its right blend is
    /// left for the next partial problem; stages produced inside it are
    /// discarded so that they are refined after being revised.
    fn divide_proactively(
        &mut self,
        level: u32,
        strategy: &dyn DivisionStrategy,
        dividing: Option<DividingProblem>,
        first_sgoals: u32,
        previously_solved: u32,
        avoid_blends: bool,
    ) -> Result<()> {
        let mut start_step = self.total_achieved_sgoals(level - 1);
        let mut end_step: Option<u32> = None;
        let achieved = self.solutions.sgoals_achieved_at.get(&level);

        let mut keep_until_index: Option<u32> = None;
        if let Some(DividingProblem {
            position,
            problem_number,
        }) = dividing
        {
            let scenario = self
                .division_scenarios(level + 1)
                .get(position)
                .ok_or_else(|| {
                    PlanningError::Internal(format!(
                        "dividing scenario of level {} disappeared",
                        level + 1
                    ))
                })?;
            let pair = scenario.get_division_point_pair(problem_number)?;
            let right = pair.right;
            if !right.inherited {
                end_step = achieved.and_then(|achieved| achieved.get(&right.index)).copied();
                keep_until_index = Some(right.index);
            }

            if avoid_blends {
                if !right.inherited {
                    let problem_size = scenario
                        .get_subgoals_indices_range(problem_number, true)?
                        .problem_size();
                    let blend_start = right.index_when_left_point(problem_size, false);
                    if let Some(blend_step) = blend_start
                        .checked_sub(1)
                        .and_then(|index| achieved.and_then(|achieved| achieved.get(&index)))
                    {
                        end_step = Some(end_step.map_or(*blend_step, |end| end.min(*blend_step)));
                    }
                }
            } else {
                start_step = first_sgoals
                    .checked_sub(1)
                    .and_then(|index| achieved.and_then(|achieved| achieved.get(&index)))
                    .copied()
                    .unwrap_or(0);
            }
        }

        if let (Some(end), Some(right_index)) = (end_step, keep_until_index) {
            if let Some(produced) = self.solutions.sgoals.get_mut(&level) {
                produced.retain(|step, _| *step <= end);
            }
            if let Some(achieved) = self.solutions.sgoals_achieved_at.get_mut(&level) {
                achieved.retain(|index, _| *index <= right_index);
            }
        }

        let abstract_plan = self.get_monolevel_plan(level, start_step, end_step)?;
        if abstract_plan.plan_length() == 0 {
            debug!(level, start_step, "nothing left to divide");
            return Ok(());
        }
        let scenario = strategy.proact(&abstract_plan, previously_solved)?;
        info!(
            event = "proactive_division",
            level,
            strategy = strategy.name(),
            start_step = abstract_plan.start_step(),
            end_step = abstract_plan.end_step(),
            problems = scenario.total_problems(),
            scenario = %scenario,
        );
        self.division_scenarios.entry(level).or_default().push(scenario);
        Ok(())
    }
}

/// The scenario position and problem number of a partial problem.
#[derive(Debug, Clone, Copy)]
struct DividingProblem {
    position: usize,
    problem_number: u32,
}

/// Checks a refined plan ends on its last achieved stage.
///
/// Returns whether the search was interrupted before the requested last
/// stage and whether it searched past the plan's end.
fn check_yielded_plan(plan: &MonolevelPlan, requested_last: Option<u32>) -> Result<(bool, bool)> {
    let Some(mapping) = &plan.conformance_mapping else {
        return Ok((false, false));
    };
    let last_achieved = mapping.constraining_sgoals_range()?.last_index();
    let interrupted = requested_last.is_some_and(|last| last_achieved < last);

    let plan_length = plan.end_step();
    let mut last_achievement_step = mapping
        .sgoals_achieved_at
        .get(&last_achieved)
        .copied()
        .unwrap_or(plan_length);
    if plan.is_final {
        last_achievement_step = plan_length;
    }
    if last_achievement_step != plan_length {
        return Err(PlanningError::Internal(format!(
            "last achievement step {} is not the plan length {} at level {}",
            last_achievement_step, plan_length, plan.level
        )));
    }
    let preemptive = last_achievement_step < plan.statistics.search_length();
    Ok((interrupted, preemptive))
}
