//! The incremental search loop over one solve session.

use std::collections::BTreeMap;
use std::time::Instant;

use hiplan_core::{
    Action, Answer, ConformanceMapping, DivisionPoint, EngineError, External, HaltReason,
    PlanningError, Result, SolveResult, SolveSession, SubGoal, SubGoalRange,
};
use tracing::{debug, trace};

use crate::strategy::{DivisionStrategy, ReactionContext};

/// Base priority of the weak constraints preferring previously planned actions.
const PREFERENCE_PRIORITY: u32 = 10;

/// What to search for on a session.
#[derive(Debug, Clone, Copy)]
pub(super) struct SearchSpec<'a> {
    pub level: u32,
    pub start_step: u32,
    pub first_sgoals: u32,
    pub last_sgoals: u32,
    /// The final goal must be achieved with the last stage.
    pub finalise: bool,
    pub sequential_yield: bool,
    pub detect_interleaving: bool,
    pub make_observable: bool,
    /// Sub-goal stages produced at the level above.
    pub sgoals: &'a BTreeMap<u32, Vec<SubGoal>>,
}

/// The outcome of a successful search.
#[derive(Debug, Clone)]
pub(super) struct Solution {
    pub answer: Answer,
    pub last_achieved_sgoals: u32,
    pub overhead_time: f64,
    /// Step each stage was minimally achieved on, in sequential yield mode.
    pub sequential_yield_steps: Option<BTreeMap<u32, u32>>,
    pub reactive_divisions: Vec<DivisionPoint>,
    /// Search ended early by an interrupting division.
    pub interrupted: bool,
    pub interleaving_quantity: u32,
    pub interleaving_score: u32,
}

pub(super) fn engine_failure(err: EngineError) -> PlanningError {
    PlanningError::no_solution_from("exception during search", err)
}

fn halted(level: u32, reason: Option<HaltReason>) -> PlanningError {
    match reason {
        Some(reason) => PlanningError::no_solution(format!(
            "the monolevel planning problem at level {} does not have a valid solution (search halted: {})",
            level, reason
        )),
        None => PlanningError::no_solution(format!(
            "the search at level {} halted without a reason",
            level
        )),
    }
}

/// Runs a search to completion.
///
/// Classical searches run until the session's stop condition. Sequential
/// yield searches achieve one sub-goal stage at a time, consulting the
/// division strategy after every increment.
pub(super) fn search<Z: SolveSession + ?Sized>(
    session: &mut Z,
    spec: &SearchSpec<'_>,
    strategy: Option<&mut dyn DivisionStrategy>,
) -> Result<Solution> {
    if !spec.sequential_yield {
        return search_classical(session, spec);
    }
    search_sequential(session, spec, strategy)
}

fn search_classical<Z: SolveSession + ?Sized>(
    session: &mut Z,
    spec: &SearchSpec<'_>,
) -> Result<Solution> {
    while let Some(feedback) = session.next_increment().map_err(engine_failure)? {
        trace!(
            event = "search_increment",
            level = spec.level,
            end_step = feedback.end_step,
            time = feedback.times.total_time,
            result = ?feedback.solve_result,
        );
    }
    match session.halt_reason() {
        Some(HaltReason::Exhausted) => {}
        reason => return Err(halted(spec.level, reason)),
    }

    let answer = session.answer().map_err(engine_failure)?;
    if !answer.satisfiable {
        return Err(halted(spec.level, Some(HaltReason::Unsatisfiable)));
    }
    Ok(Solution {
        answer,
        last_achieved_sgoals: spec.last_sgoals,
        overhead_time: 0.0,
        sequential_yield_steps: None,
        reactive_divisions: Vec::new(),
        interrupted: false,
        interleaving_quantity: 0,
        interleaving_score: 0,
    })
}

/// Interleaving counts against the plan minimally achieving the previous stage.
#[derive(Default)]
struct InterleavingTracker {
    previous_actions: BTreeMap<u32, Vec<Action>>,
    previous_mapping: Option<ConformanceMapping>,
    quantity: u32,
    score: u32,
}

impl InterleavingTracker {
    /// Counts the stages whose achievement was delayed since the last
    /// observation, then remembers the current plan.
    fn observe(&mut self, actions: &BTreeMap<u32, Vec<Action>>, mapping: &ConformanceMapping) {
        if let Some(previous) = &self.previous_mapping {
            for step in actions.keys() {
                let Some(index) = mapping
                    .sgoals_achieved_at
                    .reverse_get(step)
                    .and_then(|indices| indices.iter().next())
                else {
                    continue;
                };
                if let Some(old_step) = previous.sgoals_achieved_at.get(index) {
                    if step > old_step {
                        self.quantity += 1;
                        self.score += step - old_step;
                        debug!(
                            event = "interleaving",
                            index = *index,
                            old_step = *old_step,
                            step = *step,
                        );
                    }
                }
            }
        }
        self.previous_actions = actions.clone();
        self.previous_mapping = Some(mapping.clone());
    }

    fn preferred_actions(&self) -> Vec<Action> {
        self.previous_actions.values().flatten().cloned().collect()
    }
}

fn search_sequential<Z: SolveSession + ?Sized>(
    session: &mut Z,
    spec: &SearchSpec<'_>,
    mut strategy: Option<&mut dyn DivisionStrategy>,
) -> Result<Solution> {
    let level = spec.level;
    let first = spec.first_sgoals;
    let last = spec.last_sgoals;
    let sgoals_range = SubGoalRange::new(first, last)?;

    let mut overhead_time = 0.0;
    let mut current_last = first;
    let mut yield_steps: BTreeMap<u32, u32> = BTreeMap::new();
    let mut increment_times: Vec<f64> = Vec::new();
    let mut reactive_divisions: Vec<DivisionPoint> = Vec::new();
    let mut interleaving = InterleavingTracker::default();
    let mut interrupted = false;

    session
        .assign_external(
            External::CurrentLastSgoals {
                index: current_last,
                step: spec.start_step + 1,
            },
            true,
        )
        .map_err(engine_failure)?;
    if spec.finalise && current_last == last {
        session
            .assign_external(
                External::SequentialAchieveFinalGoals {
                    step: spec.start_step,
                },
                true,
            )
            .map_err(engine_failure)?;
    }

    loop {
        let Some(feedback) = session.next_increment().map_err(engine_failure)? else {
            return Err(halted(level, session.halt_reason()));
        };
        increment_times.push(feedback.times.total_time);
        trace!(
            event = "search_increment",
            level,
            end_step = feedback.end_step,
            time = feedback.times.total_time,
            result = ?feedback.solve_result,
        );

        let matching_child = feedback.solve_result == SolveResult::Satisfiable;
        let mut observable: Option<BTreeMap<u32, Vec<Action>>> = None;

        if matching_child {
            let started = Instant::now();
            yield_steps.insert(current_last, feedback.end_step);
            current_last += 1;
            debug!(
                event = "sgoal_achieved",
                level,
                index = current_last - 1,
                step = feedback.end_step,
                achieved = current_last - first,
                total = last - first + 1,
            );

            if spec.detect_interleaving || spec.make_observable {
                let answer = session.answer().map_err(engine_failure)?;
                let actions = answer.actions_by_step(level);
                let constraining = spec
                    .sgoals
                    .range(first..current_last)
                    .map(|(index, sgoals)| (*index, sgoals.clone()))
                    .collect();
                let mapping =
                    ConformanceMapping::from_answer(constraining, &answer, Some(yield_steps.clone()));

                if spec.detect_interleaving {
                    interleaving.observe(&actions, &mapping);
                    session
                        .prefer_actions(
                            &interleaving.preferred_actions(),
                            PREFERENCE_PRIORITY + (current_last - 1),
                        )
                        .map_err(engine_failure)?;
                }
                observable = Some(actions);
            }

            if current_last > last {
                overhead_time += started.elapsed().as_secs_f64();
                break;
            }

            session
                .assign_external(
                    External::CurrentLastSgoals {
                        index: current_last,
                        step: feedback.end_step,
                    },
                    true,
                )
                .map_err(engine_failure)?;
            if spec.finalise && current_last == last {
                session
                    .assign_external(
                        External::SequentialAchieveFinalGoals {
                            step: feedback.end_step,
                        },
                        true,
                    )
                    .map_err(engine_failure)?;
            }
            overhead_time += started.elapsed().as_secs_f64();
        }

        let last_division_index = reactive_divisions.last().map_or(first, |point| point.index);
        let Some(strategy) = strategy.as_deref_mut() else {
            continue;
        };
        if last_division_index == current_last || (spec.finalise && current_last == last) {
            continue;
        }

        let started = Instant::now();
        let subgoal_index = current_last - 1;
        let reaction = strategy.react(&ReactionContext {
            level,
            sgoals_range,
            start_step: spec.start_step,
            search_length: feedback.end_step,
            subgoal_index,
            matching_child,
            incremental_times: &increment_times,
            observable_plan: observable.as_ref(),
        })?;
        trace!(event = "reaction", level, reaction = %reaction);

        if reaction.divide {
            let achieved_step = yield_steps
                .get(&subgoal_index)
                .copied()
                .unwrap_or(feedback.end_step);
            let preemptive = feedback.end_step.saturating_sub(achieved_step);

            if reaction.interrupt {
                let point = DivisionPoint::interrupting(subgoal_index, feedback.end_step)
                    .with_preemptive(preemptive);
                debug!(event = "reactive_division", level, point = %point, interrupting = true);
                reactive_divisions.push(point);
                interrupted = true;
                overhead_time += started.elapsed().as_secs_f64();
                break;
            }

            let horizon = reaction
                .backwards_horizon
                .resolve(current_last.saturating_sub(last_division_index));
            let fixed_index = current_last.saturating_sub(horizon + 1);
            let fix_until_index = first.max(fixed_index);
            let fix_until_step = if horizon == 0 {
                feedback.end_step
            } else {
                yield_steps.get(&fixed_index).copied().unwrap_or(spec.start_step)
            };

            let point = DivisionPoint::continuous(fix_until_index, fix_until_step)
                .with_preemptive(preemptive)
                .with_commitment(subgoal_index, feedback.end_step);
            debug!(event = "reactive_division", level, point = %point, interrupting = false);
            reactive_divisions.push(point);

            let answer = session.answer().map_err(engine_failure)?;
            let actions = answer.actions_until(level, fix_until_step);
            session.fix_plan(&actions, &[]).map_err(engine_failure)?;
        }
        overhead_time += started.elapsed().as_secs_f64();
    }

    let mut answer = session.answer().map_err(engine_failure)?;
    if interrupted {
        if let Some(step) = yield_steps.get(&(current_last - 1)) {
            truncate_answer(&mut answer, *step);
        }
    }
    Ok(Solution {
        answer,
        last_achieved_sgoals: current_last - 1,
        overhead_time,
        sequential_yield_steps: Some(yield_steps),
        reactive_divisions,
        interrupted,
        interleaving_quantity: interleaving.quantity,
        interleaving_score: interleaving.score,
    })
}

/// Drops everything planned after `end_step`.
///
/// Steps searched past the last achieved stage of an interrupted search are
/// replanned by the next partial problem.
pub(super) fn truncate_answer(answer: &mut Answer, end_step: u32) {
    answer.fluents.retain(|fluent| fluent.step <= end_step);
    answer.actions.retain(|action| action.step <= end_step);
    answer.produced_sgoals.retain(|sgoal| sgoal.index <= end_step);
    answer
        .current_sgoal_indices
        .retain(|fact| fact.step <= end_step);
    answer.sgoals_achieved.retain(|fact| fact.step <= end_step);
    answer.end_step = answer.end_step.min(end_step);
}
