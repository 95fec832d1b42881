//! A deterministic incremental solver over a synthetic corridor domain.
//!
//! A robot walks a corridor of cells. The classical plan at the top level
//! takes one move per step, and each move produces a one sub-goal stage
//! indexed by its step. Refining a stage at a lower level takes a fixed
//! number of steps (the level's expansion), so every stage is achieved a
//! known number of steps after the previous one.
//!
//! Each search increment extends the search length by one step. Sessions
//! record the calls the planner makes on them in a shared [`SessionLog`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use hiplan_core::{
    Action, Answer, EngineError, External, Feedback, FinalGoal, Fluent, HaltReason,
    IncrementalSolver, IndexStep, InitialConditions, PlanningStatistics, SearchRequest, SolveResult,
    SolveSession, SolveTimes, SubGoal,
};

/// Time of one increment, given its level and search length.
pub type IncrementTime = Arc<dyn Fn(u32, u32) -> f64 + Send + Sync>;

/// A call made on a scripted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started {
        level: u32,
        first_sgoals: u32,
        last_sgoals: u32,
        start_step: u32,
    },
    Resumed {
        level: u32,
        first_sgoals: u32,
        last_sgoals: u32,
        start_step: u32,
    },
    Assigned {
        level: u32,
        external: External,
        truth: bool,
    },
    Released {
        level: u32,
        external: External,
    },
    FixedPlan {
        level: u32,
        actions: usize,
        last_step: Option<u32>,
    },
    PreferredActions {
        level: u32,
        actions: usize,
        priority: u32,
    },
}

/// Calls made on every session of one solver.
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    events: Vec<SessionEvent>,
}

impl SessionLog {
    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    pub fn count(&self, matches: impl Fn(&SessionEvent) -> bool) -> usize {
        self.events.iter().filter(|event| matches(event)).count()
    }

    fn push(&mut self, event: SessionEvent) {
        self.events.push(event);
    }
}

fn lock(log: &Mutex<SessionLog>) -> MutexGuard<'_, SessionLog> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Solver factory for the corridor domain.
#[derive(Clone)]
pub struct ScriptedSolver {
    top_level: u32,
    top_plan_length: u32,
    default_expansion: u32,
    expansions: BTreeMap<u32, u32>,
    unsatisfiable_levels: BTreeSet<u32>,
    failing_levels: BTreeSet<u32>,
    increment_time: IncrementTime,
    log: Arc<Mutex<SessionLog>>,
}

impl ScriptedSolver {
    pub const DEFAULT_EXPANSION: u32 = 2;
    pub const DEFAULT_INCREMENT_TIME: f64 = 0.01;

    /// A domain with `top_level` levels whose top level plan has
    /// `top_plan_length` steps.
    pub fn new(top_level: u32, top_plan_length: u32) -> Self {
        Self {
            top_level,
            top_plan_length,
            default_expansion: Self::DEFAULT_EXPANSION,
            expansions: BTreeMap::new(),
            unsatisfiable_levels: BTreeSet::new(),
            failing_levels: BTreeSet::new(),
            increment_time: Arc::new(|_, _| Self::DEFAULT_INCREMENT_TIME),
            log: Arc::new(Mutex::new(SessionLog::default())),
        }
    }

    /// Steps taken at `level` to refine one stage of the level above.
    pub fn with_expansion(mut self, level: u32, expansion: u32) -> Self {
        self.expansions.insert(level, expansion.max(1));
        self
    }

    pub fn with_default_expansion(mut self, expansion: u32) -> Self {
        self.default_expansion = expansion.max(1);
        self
    }

    /// Problems at `level` are proven unsatisfiable on the first increment.
    pub fn with_unsatisfiable_level(mut self, level: u32) -> Self {
        self.unsatisfiable_levels.insert(level);
        self
    }

    /// Grounding fails for problems at `level`.
    pub fn with_failing_level(mut self, level: u32) -> Self {
        self.failing_levels.insert(level);
        self
    }

    pub fn with_increment_time(
        mut self,
        increment_time: impl Fn(u32, u32) -> f64 + Send + Sync + 'static,
    ) -> Self {
        self.increment_time = Arc::new(increment_time);
        self
    }

    pub fn expansion(&self, level: u32) -> u32 {
        self.expansions
            .get(&level)
            .copied()
            .unwrap_or(self.default_expansion)
    }

    /// Length of the complete plan at `level`.
    pub fn plan_length(&self, level: u32) -> u32 {
        (level..self.top_level).fold(self.top_plan_length, |length, lower| {
            length * self.expansion(lower)
        })
    }

    pub fn log(&self) -> Arc<Mutex<SessionLog>> {
        Arc::clone(&self.log)
    }

    /// A snapshot of the calls made on every session so far.
    pub fn events(&self) -> Vec<SessionEvent> {
        lock(&self.log).events().to_vec()
    }
}

impl IncrementalSolver for ScriptedSolver {
    type Session = ScriptedSession;

    fn top_level(&self) -> u32 {
        self.top_level
    }

    fn initial_conditions(&mut self) -> Result<InitialConditions, EngineError> {
        let mut conditions = InitialConditions::default();
        for level in 1..=self.top_level {
            conditions
                .initial_states
                .insert(level, vec![Fluent::new(level, "position(talos)", "cell0", 0)]);
            conditions.final_goals.insert(
                level,
                vec![FinalGoal::new(
                    level,
                    "position(talos)",
                    format!("cell{}", self.plan_length(level)),
                    true,
                )],
            );
        }
        Ok(conditions)
    }

    fn start(&mut self, request: &SearchRequest) -> Result<ScriptedSession, EngineError> {
        let level = request.problem.level;
        if self.failing_levels.contains(&level) {
            return Err(EngineError::Grounding(format!(
                "no grounding for level {}",
                level
            )));
        }
        let problem = &request.problem;
        lock(&self.log).push(SessionEvent::Started {
            level,
            first_sgoals: problem.first_sgoals,
            last_sgoals: problem.last_sgoals,
            start_step: problem.start_step,
        });

        let mut session = ScriptedSession {
            level,
            expansion: self.expansion(level),
            classical_length: self.plan_length(level),
            origin_step: problem.start_step,
            start_step: problem.start_step,
            end_step: problem.start_step,
            base_step: problem.start_step,
            conformance: false,
            first_sgoals: 1,
            last_sgoals: 1,
            achieved: BTreeMap::new(),
            current_last: None,
            sequential_yield: false,
            stop_on_satisfiable: true,
            length_limit: None,
            search_length_bound: None,
            unsatisfiable: self.unsatisfiable_levels.contains(&level),
            last_result: None,
            halted: None,
            statistics: PlanningStatistics::default(),
            increment_time: Arc::clone(&self.increment_time),
            log: Arc::clone(&self.log),
        };
        session.target(request);
        Ok(session)
    }
}

/// A session searching one problem of the corridor domain.
pub struct ScriptedSession {
    level: u32,
    expansion: u32,
    classical_length: u32,
    origin_step: u32,
    start_step: u32,
    end_step: u32,
    /// Step the stage before the first refined one was achieved on.
    base_step: u32,
    conformance: bool,
    first_sgoals: u32,
    last_sgoals: u32,
    /// Stages achieved by earlier problems of a saved grounding.
    achieved: BTreeMap<u32, u32>,
    current_last: Option<u32>,
    sequential_yield: bool,
    stop_on_satisfiable: bool,
    length_limit: Option<u32>,
    search_length_bound: Option<u32>,
    unsatisfiable: bool,
    last_result: Option<SolveResult>,
    halted: Option<HaltReason>,
    statistics: PlanningStatistics,
    increment_time: IncrementTime,
    log: Arc<Mutex<SessionLog>>,
}

impl ScriptedSession {
    fn target(&mut self, request: &SearchRequest) {
        let problem = &request.problem;
        self.start_step = problem.start_step;
        self.end_step = problem.start_step;
        self.conformance = problem.conformance;
        self.first_sgoals = problem.first_sgoals;
        self.last_sgoals = problem.last_sgoals;
        self.base_step = problem
            .first_sgoals
            .checked_sub(1)
            .and_then(|index| self.achieved.get(&index).copied())
            .unwrap_or(problem.start_step)
            .max(problem.start_step);
        self.current_last = None;
        self.sequential_yield = problem.sequential_yield;
        self.stop_on_satisfiable = request.options.stop_on_satisfiable;
        self.length_limit = request.options.length_limit;
        self.search_length_bound = request.options.search_length_bound;
        self.last_result = None;
        self.halted = None;
    }

    /// Step a stage of the current problem is achieved on.
    fn achievement_step(&self, index: u32) -> u32 {
        self.base_step + (index + 1 - self.first_sgoals) * self.expansion
    }

    /// The last stage the session is currently asked to achieve.
    fn target_index(&self) -> u32 {
        if self.sequential_yield {
            self.current_last.unwrap_or(self.last_sgoals)
        } else {
            self.last_sgoals
        }
    }

    /// Every stage achieved by the current model, with its step.
    fn achieved_stages(&self) -> BTreeMap<u32, u32> {
        let mut stages: BTreeMap<u32, u32> = self
            .achieved
            .range(..self.first_sgoals)
            .filter(|(_, step)| **step <= self.end_step)
            .map(|(index, step)| (*index, *step))
            .collect();
        for index in self.first_sgoals..=self.target_index().min(self.last_sgoals) {
            let step = self.achievement_step(index);
            if step <= self.end_step {
                stages.insert(index, step);
            }
        }
        stages
    }

    fn is_satisfied(&self) -> bool {
        if !self.conformance {
            return self.end_step >= self.start_step + self.classical_length;
        }
        self.achievement_step(self.target_index()) <= self.end_step
    }

    fn record(&self, event: SessionEvent) {
        lock(&self.log).push(event);
    }
}

impl SolveSession for ScriptedSession {
    fn next_increment(&mut self) -> Result<Option<Feedback>, EngineError> {
        if self.halted.is_some() {
            return Ok(None);
        }
        if self.unsatisfiable {
            self.halted = Some(HaltReason::Unsatisfiable);
            return Ok(None);
        }

        let next = (self.end_step + 1).max(self.search_length_bound.unwrap_or(0));
        if self.length_limit.is_some_and(|limit| next > limit) {
            self.halted = Some(HaltReason::StepLimit);
            return Ok(None);
        }

        self.end_step = next;
        let times = SolveTimes::new(0.0, (self.increment_time)(self.level, next));
        self.statistics.record_increment(next, times);

        let solve_result = if self.is_satisfied() {
            if self.stop_on_satisfiable {
                self.halted = Some(HaltReason::Exhausted);
            }
            SolveResult::Satisfiable
        } else {
            SolveResult::Unsatisfiable
        };
        self.last_result = Some(solve_result);

        Ok(Some(Feedback {
            end_step: next,
            times,
            solve_result,
        }))
    }

    fn halt_reason(&self) -> Option<HaltReason> {
        self.halted
    }

    fn assign_external(&mut self, external: External, truth: bool) -> Result<(), EngineError> {
        if let External::CurrentLastSgoals { index, .. } = external {
            if truth {
                self.current_last = Some(index);
            }
        }
        self.record(SessionEvent::Assigned {
            level: self.level,
            external,
            truth,
        });
        Ok(())
    }

    fn release_external(&mut self, external: External) -> Result<(), EngineError> {
        if let External::CurrentLastSgoals { index, .. } = external {
            if self.current_last == Some(index) {
                self.current_last = None;
            }
        }
        self.record(SessionEvent::Released {
            level: self.level,
            external,
        });
        Ok(())
    }

    fn answer(&self) -> Result<Answer, EngineError> {
        if self.last_result.is_none() {
            return Err(EngineError::Session(
                "no model before the first increment".to_string(),
            ));
        }
        let level = self.level;
        let fluents = (self.origin_step..=self.end_step)
            .map(|step| Fluent::new(level, "position(talos)", format!("cell{}", step), step))
            .collect();
        let steps = self.origin_step + 1..=self.end_step;
        let actions: Vec<Action> = steps
            .clone()
            .map(|step| Action::new(level, "talos", format!("move(cell{})", step), step))
            .collect();
        let produced_sgoals = if level > 1 {
            actions
                .iter()
                .map(|action| {
                    SubGoal::new(
                        level,
                        "talos",
                        action.action.clone(),
                        "position(talos)",
                        format!("cell{}", action.step),
                        action.step,
                    )
                })
                .collect()
        } else {
            Vec::new()
        };

        let (current_sgoal_indices, sgoals_achieved) = if self.conformance {
            let achieved = self.achieved_stages();
            let mut prospective = achieved.clone();
            for index in self.first_sgoals..=self.last_sgoals {
                prospective
                    .entry(index)
                    .or_insert_with(|| self.achievement_step(index));
            }
            let current = steps
                .filter_map(|step| {
                    prospective
                        .iter()
                        .find(|(_, achieved_step)| **achieved_step >= step)
                        .map(|(index, _)| IndexStep::new(level, *index, step))
                })
                .collect();
            let achieved = achieved
                .into_iter()
                .map(|(index, step)| IndexStep::new(level, index, step))
                .collect();
            (current, achieved)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(Answer {
            end_step: self.end_step,
            satisfiable: self.last_result == Some(SolveResult::Satisfiable),
            fluents,
            actions,
            produced_sgoals,
            current_sgoal_indices,
            sgoals_achieved,
            statistics: self.statistics.clone(),
        })
    }

    fn fix_plan(&mut self, actions: &[Action], _fluents: &[Fluent]) -> Result<(), EngineError> {
        self.record(SessionEvent::FixedPlan {
            level: self.level,
            actions: actions.len(),
            last_step: actions.iter().map(|action| action.step).max(),
        });
        Ok(())
    }

    fn prefer_actions(&mut self, actions: &[Action], priority: u32) -> Result<(), EngineError> {
        self.record(SessionEvent::PreferredActions {
            level: self.level,
            actions: actions.len(),
            priority,
        });
        Ok(())
    }

    fn resume(&mut self, request: &SearchRequest) -> Result<(), EngineError> {
        if request.problem.level != self.level {
            return Err(EngineError::Session(format!(
                "cannot resume a level {} grounding at level {}",
                self.level, request.problem.level
            )));
        }
        self.achieved = self.achieved_stages();
        self.record(SessionEvent::Resumed {
            level: self.level,
            first_sgoals: request.problem.first_sgoals,
            last_sgoals: request.problem.last_sgoals,
            start_step: request.problem.start_step,
        });
        self.target(request);
        Ok(())
    }
}
