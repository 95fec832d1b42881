//! Tests for the hierarchical planner over the scripted corridor domain.

use std::collections::BTreeMap;
use std::time::Duration;

use hiplan_config::{
    BasicConfig, BoundConfig, BoundValue, DivisionStrategyConfig, LengthLimit, PlannerConfig,
    RelentlessConfig, TimeBoundType,
};
use hiplan_core::{
    DivisionPoint, External, OnlineMethod, PlanningError, RefinementSchema, SubGoal,
};
use hiplan_test::{sgoal_stage, ScriptedSolver, SessionEvent};

use super::*;
use crate::strategy::Relentless;

fn planner(solver: ScriptedSolver) -> HierarchicalPlanner<ScriptedSolver> {
    let mut planner = HierarchicalPlanner::new("corridor", solver);
    planner.initialise_problem().unwrap();
    planner
}

fn basic(problems: i64) -> DivisionStrategyConfig {
    DivisionStrategyConfig::Basic(BasicConfig {
        problems: Some(BoundConfig::Fixed(BoundValue::Count(problems))),
        blend: None,
    })
}

fn relentless(time_bound: f64, bound_type: TimeBoundType, interrupting: bool) -> RelentlessConfig {
    RelentlessConfig {
        time_bound: BoundConfig::Fixed(BoundValue::Fraction(time_bound)),
        bound_type,
        backwards_horizon: None,
        moving_average: None,
        preemptive: None,
        interrupting: Some(interrupting),
    }
}

fn started(events: &[SessionEvent], at_level: u32) -> Vec<(u32, u32, u32)> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Started {
                level,
                first_sgoals,
                last_sgoals,
                start_step,
            } if *level == at_level => Some((*first_sgoals, *last_sgoals, *start_step)),
            _ => None,
        })
        .collect()
}

fn achieved_at(planner: &HierarchicalPlanner<ScriptedSolver>, level: u32) -> Vec<(u32, u32)> {
    planner.solutions().sgoals_achieved_at[&level]
        .iter()
        .map(|(index, step)| (*index, *step))
        .collect()
}

#[test]
fn test_initialise_problem() {
    let mut planner = HierarchicalPlanner::new("corridor", ScriptedSolver::new(2, 4));
    assert!(!planner.problem_initialised());
    assert!(planner.get_initial_state(1).is_none());

    planner.initialise_problem().unwrap();
    assert!(planner.problem_initialised());
    assert_eq!(planner.get_initial_state(2).unwrap().len(), 1);
    assert_eq!(planner.get_final_goal(1).unwrap()[0].value, "cell8");
}

#[test]
fn test_planning_requires_initialised_problem() {
    let mut planner = HierarchicalPlanner::new("corridor", ScriptedSolver::new(2, 4));
    let result = planner.monolevel_plan(2, &MonolevelOptions::default(), None);
    assert!(matches!(result, Err(PlanningError::InvalidPlannerState(_))));

    let result = planner.hierarchical_plan(&PlannerConfig::new());
    assert!(matches!(result, Err(PlanningError::InvalidPlannerState(_))));
}

#[test]
fn test_monolevel_rejects_invalid_input() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    let result = planner.monolevel_plan(3, &MonolevelOptions::default(), None);
    assert!(matches!(result, Err(PlanningError::InvalidInput { .. })));

    let options = MonolevelOptions::default().with_time_limit(Duration::ZERO);
    let result = planner.monolevel_plan(2, &options, None);
    assert!(matches!(result, Err(PlanningError::InvalidInput { .. })));

    let mut options = MonolevelOptions::default();
    options.length_limit = Some(0);
    let result = planner.monolevel_plan(2, &options, None);
    assert!(matches!(result, Err(PlanningError::InvalidInput { .. })));
}

#[test]
fn test_classical_top_level_plan() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    let plan = planner.monolevel_plan(2, &MonolevelOptions::default(), None).unwrap();

    assert_eq!(plan.plan_length(), 4);
    assert_eq!(plan.total_actions(), 4);
    assert!(plan.is_final);
    assert!(plan.conformance_mapping.is_none());
    assert_eq!(plan.produced_sgoals.len(), 4);
    assert_eq!(plan.statistics.calls(), 4);

    assert!(planner.is_complete(2));
    assert_eq!(planner.total_plan_length(2), 4);
    assert_eq!(planner.total_produced_sgoals(2), 4);
    assert_eq!(planner.total_achieved_sgoals(1), 0);
}

#[test]
fn test_conformance_refinement_of_whole_plan() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    planner.monolevel_plan(2, &MonolevelOptions::default(), None).unwrap();

    let options = MonolevelOptions::default().with_conformance(true, false);
    let plan = planner.monolevel_plan(1, &options, None).unwrap();

    assert_eq!(plan.plan_length(), 8);
    assert!(plan.is_final);
    let mapping = plan.conformance_mapping.as_ref().unwrap();
    assert_eq!(mapping.sgoals_achieved_at.get(&3), Some(&6));
    assert_eq!(mapping.current_sgoals.get(&5), Some(&3));
    // Searching starts at the minimum search length bound.
    assert_eq!(plan.statistics.calls(), 5);

    assert!(planner.is_complete(1));
    assert_eq!(achieved_at(&planner, 1), vec![(1, 2), (2, 4), (3, 6), (4, 8)]);
}

#[test]
fn test_partial_problems_concatenate() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    planner.monolevel_plan(2, &MonolevelOptions::default(), None).unwrap();

    let first = MonolevelOptions::default()
        .with_conformance(true, false)
        .with_sgoals_range(1, 2);
    let plan = planner.monolevel_plan(1, &first, None).unwrap();
    assert_eq!(plan.start_step(), 0);
    assert_eq!(plan.end_step(), 4);
    assert!(!plan.is_final);
    assert!(!planner.is_complete(1));

    let rest = MonolevelOptions::default().with_conformance(true, false);
    let plan = planner.monolevel_plan(1, &rest, None).unwrap();
    assert_eq!(plan.start_step(), 4);
    assert_eq!(plan.end_step(), 8);
    assert!(plan.is_final);

    let concatenated = planner.get_monolevel_plan(1, 0, None).unwrap();
    assert_eq!(concatenated.plan_length(), 8);
    assert!(concatenated.is_final);
    assert_eq!(concatenated.statistics.calls(), 8);
    let mapping = concatenated.conformance_mapping.unwrap();
    assert_eq!(mapping.constraining_sgoals.len(), 4);

    assert_eq!(
        started(&planner.solver().events(), 1),
        vec![(1, 2, 0), (3, 4, 4)]
    );
}

#[test]
fn test_create_problem_clamps_sgoals_range() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    planner.monolevel_plan(2, &MonolevelOptions::default(), None).unwrap();

    let options = MonolevelOptions::default()
        .with_conformance(true, false)
        .with_sgoals_range(3, 10);
    let problem = planner.create_problem(1, &options, None).unwrap();
    assert_eq!(problem.first_sgoals, 1);
    assert_eq!(problem.last_sgoals, 4);
    assert_eq!(problem.start_step, 0);
    assert!(problem.is_initial);
    assert!(problem.is_final);
    assert!(problem.complete_planning);
    assert_eq!(
        problem.conformance_type,
        Some(hiplan_core::ConformanceType::SimultaneousAchievement)
    );
    assert_eq!(problem.search_length_bound, 4);
    assert!(problem.use_search_length_bound);
}

#[test]
fn test_create_problem_rewinds_to_revised_stage() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    planner.monolevel_plan(2, &MonolevelOptions::default(), None).unwrap();
    let options = MonolevelOptions::default()
        .with_conformance(true, false)
        .with_sgoals_range(1, 3);
    planner.monolevel_plan(1, &options, None).unwrap();

    let revise = MonolevelOptions::default()
        .with_concurrency(true)
        .with_conformance(true, false)
        .with_sgoals_range(3, 4);
    let problem = planner.create_problem(1, &revise, None).unwrap();
    assert_eq!(problem.first_sgoals, 3);
    assert_eq!(problem.start_step, 4);
    assert!(!problem.is_initial);
    assert_eq!(
        problem.conformance_type,
        Some(hiplan_core::ConformanceType::SequentialAchievement)
    );
}

#[test]
fn test_conformance_without_sgoals_is_rejected() {
    let planner = planner(ScriptedSolver::new(2, 4));
    let options = MonolevelOptions::default().with_conformance(true, false);
    let result = planner.create_problem(1, &options, None);
    assert!(matches!(result, Err(PlanningError::InvalidPlannerState(_))));
}

#[test]
fn test_failed_search_leaves_solutions_unchanged() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    planner.monolevel_plan(2, &MonolevelOptions::default(), None).unwrap();
    let snapshot = planner.solutions().clone();

    let options = MonolevelOptions::default()
        .with_conformance(true, false)
        .with_length_limit(3);
    let error = planner.monolevel_plan(1, &options, None).unwrap_err();
    assert!(matches!(error, PlanningError::NoSolution { .. }));
    assert!(error.is_recoverable());
    assert_eq!(planner.solutions(), &snapshot);
}

#[test]
fn test_engine_failure_is_no_solution() {
    let mut planner = planner(ScriptedSolver::new(2, 4).with_failing_level(1));
    planner.monolevel_plan(2, &MonolevelOptions::default(), None).unwrap();
    let snapshot = planner.solutions().clone();

    let options = MonolevelOptions::default().with_conformance(true, false);
    let error = planner.monolevel_plan(1, &options, None).unwrap_err();
    assert!(matches!(error, PlanningError::NoSolution { source: Some(_), .. }));
    assert_eq!(planner.solutions(), &snapshot);
}

#[test]
fn test_unsatisfiable_hierarchical_problem() {
    let mut planner = planner(ScriptedSolver::new(2, 4).with_unsatisfiable_level(1));
    let config = PlannerConfig::new().with_conformance(true, false);

    let error = planner.hierarchical_plan(&config).unwrap_err();
    match error {
        PlanningError::NoSolution { message, source } => {
            assert!(message.contains("levels [1-2]"));
            assert!(source.is_some());
        }
        other => panic!("expected no solution, got {:?}", other),
    }
    assert!(planner.is_complete(2));
    assert!(!planner.solutions().actions.contains_key(&1));
}

#[test]
fn test_valid_planning_levels() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    assert_eq!(planner.get_valid_planning_level(true, 1, None).unwrap(), Some(2));
    assert_eq!(planner.get_valid_planning_level(false, 1, None).unwrap(), Some(2));

    planner.monolevel_plan(2, &MonolevelOptions::default(), None).unwrap();
    assert_eq!(planner.get_valid_planning_level(true, 1, None).unwrap(), Some(1));
    assert_eq!(planner.get_valid_planning_level(false, 1, None).unwrap(), Some(1));

    let options = MonolevelOptions::default().with_conformance(true, false);
    planner.monolevel_plan(1, &options, None).unwrap();
    assert_eq!(planner.get_valid_planning_level(true, 1, None).unwrap(), None);

    let result = planner.get_valid_planning_level(true, 0, None);
    assert!(matches!(result, Err(PlanningError::InvalidInput { .. })));
    let result = planner.get_valid_planning_level(true, 1, Some(3));
    assert!(matches!(result, Err(PlanningError::InvalidInput { .. })));
}

#[test]
fn test_offline_classical_hierarchical_plan() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    let plan = planner.hierarchical_plan(&PlannerConfig::new()).unwrap();

    assert_eq!(plan.bottom_level(), Some(1));
    assert_eq!(plan.top_level(), Some(2));
    assert_eq!(plan.get(1).unwrap().plan_length(), 8);
    assert_eq!(plan.get(2).unwrap().plan_length(), 4);
    assert!(plan.get(1).unwrap().conformance_mapping.is_none());
    assert!(plan.problem_division_tree.get(&2).map_or(true, Vec::is_empty));
    assert_eq!(started(&planner.solver().events(), 1).len(), 1);
}

#[test]
fn test_offline_conformance_hierarchical_plan() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    let config = PlannerConfig::new().with_conformance(true, false);
    let plan = planner.hierarchical_plan(&config).unwrap();

    let ground = plan.get(1).unwrap();
    assert_eq!(ground.plan_length(), 8);
    assert!(ground.is_final);
    assert_eq!(
        ground.conformance_mapping.as_ref().unwrap().sgoals_achieved_at.len(),
        4
    );
    assert_eq!(plan.partial_plans[&1].keys().copied().collect::<Vec<_>>(), vec![1]);
    assert_eq!(started(&planner.solver().events(), 1), vec![(1, 4, 0)]);
}

#[test]
fn test_ground_first_online_plan() {
    let mut planner = planner(ScriptedSolver::new(3, 2));
    let config = PlannerConfig::new()
        .with_conformance(true, false)
        .with_division_strategy(basic(2));
    let plan = planner.hierarchical_plan(&config).unwrap();

    assert_eq!(plan.get(1).unwrap().plan_length(), 8);
    assert_eq!(plan.get(2).unwrap().plan_length(), 4);
    assert_eq!(plan.get(3).unwrap().plan_length(), 2);

    let increments = |level: u32| plan.partial_plans[&level].keys().copied().collect::<Vec<_>>();
    assert_eq!(increments(3), vec![1]);
    assert_eq!(increments(2), vec![1, 3]);
    assert_eq!(increments(1), vec![1, 2, 3, 4]);

    assert_eq!(plan.problem_division_tree[&3].len(), 1);
    assert_eq!(plan.problem_division_tree[&2].len(), 2);

    assert_eq!(
        started(&planner.solver().events(), 1),
        vec![(1, 1, 0), (2, 2, 2), (3, 3, 4), (4, 4, 6)]
    );
    assert_eq!(started(&planner.solver().events(), 2), vec![(1, 1, 0), (2, 2, 2)]);
    assert_eq!(achieved_at(&planner, 1), vec![(1, 2), (2, 4), (3, 6), (4, 8)]);
}

#[test]
fn test_complete_first_online_plan() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    let mut config = PlannerConfig::new()
        .with_conformance(true, false)
        .with_division_strategy(basic(2));
    config.online_method = OnlineMethod::CompleteFirst;
    let plan = planner.hierarchical_plan(&config).unwrap();

    assert_eq!(plan.get(1).unwrap().plan_length(), 8);
    assert_eq!(plan.partial_plans[&2].keys().copied().collect::<Vec<_>>(), vec![1]);
    assert_eq!(plan.partial_plans[&1].keys().copied().collect::<Vec<_>>(), vec![2, 3]);
    assert_eq!(
        started(&planner.solver().events(), 1),
        vec![(1, 2, 0), (3, 4, 4)]
    );
}

#[test]
fn test_interrupting_reactive_division() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    let config = PlannerConfig::new()
        .with_conformance(true, true)
        .with_division_strategy(DivisionStrategyConfig::Relentless(relentless(
            0.03,
            TimeBoundType::Cumulative,
            true,
        )));
    let plan = planner.hierarchical_plan(&config).unwrap();

    assert_eq!(plan.get(1).unwrap().plan_length(), 8);
    assert!(plan.get(1).unwrap().is_final);

    let partial = &plan.partial_plans[&1];
    assert_eq!(partial.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    let interrupted = &partial[&1];
    assert_eq!(interrupted.end_step(), 4);
    assert!(!interrupted.is_final);
    assert_eq!(interrupted.problem_divisions.len(), 1);
    assert!(interrupted.problem_divisions[0].interrupting);

    let scenario = &planner.division_scenarios(2)[0];
    assert_eq!(scenario.total_problems(), 2);
    assert_eq!(scenario.points()[0].index, 2);
    assert_eq!(scenario.points()[0].reactive, Some(4));

    assert_eq!(
        started(&planner.solver().events(), 1),
        vec![(1, 4, 0), (3, 4, 4)]
    );
}

#[test]
fn test_continuous_reactive_division_fixes_plan() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    planner.monolevel_plan(2, &MonolevelOptions::default(), None).unwrap();

    let mut strategy =
        Relentless::new(&relentless(0.005, TimeBoundType::Incremental, false)).unwrap();
    let options = MonolevelOptions::default().with_conformance(true, true);
    let plan = planner
        .monolevel_plan(1, &options, Some(&mut strategy))
        .unwrap();

    assert!(plan.is_final);
    assert_eq!(plan.plan_length(), 8);
    assert_eq!(plan.problem_divisions.len(), 1);
    let point = &plan.problem_divisions[0];
    assert_eq!(point.index, 2);
    assert!(!point.interrupting);
    assert_eq!(point.reactive, Some(4));

    let fixed: Vec<_> = planner
        .solver()
        .events()
        .into_iter()
        .filter(|event| matches!(event, SessionEvent::FixedPlan { .. }))
        .collect();
    assert_eq!(
        fixed,
        vec![SessionEvent::FixedPlan {
            level: 1,
            actions: 4,
            last_step: Some(4),
        }]
    );
}

#[test]
fn test_sequential_yield_assigns_stages_in_order() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    planner.monolevel_plan(2, &MonolevelOptions::default(), None).unwrap();

    let options = MonolevelOptions::default()
        .with_conformance(true, true)
        .with_detect_interleaving(true);
    let plan = planner.monolevel_plan(1, &options, None).unwrap();
    assert!(plan.is_final);
    assert_eq!(plan.statistics.interleaving_quantity, 0);

    let events = planner.solver().events();
    let assigned: Vec<External> = events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Assigned {
                level: 1,
                external,
                truth: true,
            } => Some(*external),
            _ => None,
        })
        .collect();
    assert_eq!(
        assigned,
        vec![
            External::CurrentLastSgoals { index: 1, step: 1 },
            External::CurrentLastSgoals { index: 2, step: 2 },
            External::CurrentLastSgoals { index: 3, step: 4 },
            External::CurrentLastSgoals { index: 4, step: 6 },
            External::SequentialAchieveFinalGoals { step: 6 },
        ]
    );

    let priorities: Vec<u32> = events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::PreferredActions { priority, .. } => Some(*priority),
            _ => None,
        })
        .collect();
    assert_eq!(priorities, vec![11, 12, 13, 14]);
}

#[test]
fn test_saved_grounding_is_resumed() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    let config = PlannerConfig::new()
        .with_conformance(true, false)
        .with_save_grounding(true)
        .with_division_strategy(basic(2));
    let plan = planner.hierarchical_plan(&config).unwrap();

    assert_eq!(plan.get(1).unwrap().plan_length(), 8);
    assert_eq!(plan.get(1).unwrap().statistics.calls(), 8);
    assert!(!planner.has_saved_grounding(1));

    let events = planner.solver().events();
    assert_eq!(started(&events, 1), vec![(1, 2, 0)]);
    assert!(events.contains(&SessionEvent::Resumed {
        level: 1,
        first_sgoals: 3,
        last_sgoals: 4,
        start_step: 4,
    }));
    assert!(events.contains(&SessionEvent::FixedPlan {
        level: 1,
        actions: 4,
        last_step: Some(4),
    }));
    assert_eq!(achieved_at(&planner, 1), vec![(1, 2), (2, 4), (3, 6), (4, 8)]);
}

#[test]
fn test_length_limit_factor() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    let config = PlannerConfig::new()
        .with_conformance(true, false)
        .with_length_limit(LengthLimit::Factor(1.5));

    // Six steps cannot refine a four step plan at expansion two.
    let error = planner.hierarchical_plan(&config).unwrap_err();
    assert!(matches!(error, PlanningError::NoSolution { .. }));

    planner.purge_solutions();
    let config = config.with_length_limit(LengthLimit::Factor(2.0));
    let plan = planner.hierarchical_plan(&config).unwrap();
    assert_eq!(plan.get(1).unwrap().plan_length(), 8);
}

#[test]
fn test_load_schema_then_refine_online() {
    let sgoals: BTreeMap<u32, Vec<SubGoal>> =
        (1..=4).map(|index| (index, sgoal_stage(2, index, 1))).collect();
    let schema = RefinementSchema::new(sgoals, vec![DivisionPoint::proactive(2)]);

    let mut planner = HierarchicalPlanner::new("corridor", ScriptedSolver::new(2, 4));
    planner.load_schema(&schema, true, true).unwrap();
    assert!(planner.problem_initialised());
    assert!(planner.is_complete(2));
    assert_eq!(planner.total_produced_sgoals(2), 4);
    assert_eq!(
        planner.get_current_division_scenario(2).unwrap().total_problems(),
        2
    );

    let config = PlannerConfig::new()
        .with_levels(1, 1)
        .with_conformance(true, false)
        .with_division_strategy(basic(2));
    let plan = planner.hierarchical_plan(&config).unwrap();
    assert_eq!(plan.top_level(), Some(1));
    assert_eq!(plan.get(1).unwrap().plan_length(), 8);
    assert_eq!(
        started(&planner.solver().events(), 1),
        vec![(1, 2, 0), (3, 4, 4)]
    );
}

#[test]
fn test_purge_solutions() {
    let mut planner = planner(ScriptedSolver::new(2, 4));
    planner.hierarchical_plan(&PlannerConfig::new()).unwrap();
    assert!(planner.get_executable_plan().is_some());

    planner.purge_solutions();
    assert_eq!(planner.solutions(), &LevelSolutions::default());
    assert!(planner.get_executable_plan().is_none());
    assert!(planner.problem_initialised());
    assert!(matches!(
        planner.get_monolevel_plan(1, 0, None),
        Err(PlanningError::InvalidInput { .. })
    ));
}

#[test]
fn test_monolevel_options_from_config() {
    let config = PlannerConfig::new()
        .with_concurrency(true)
        .with_conformance(true, true)
        .with_save_grounding(true)
        .with_time_limit_secs(30)
        .with_length_limit(LengthLimit::Fixed(40));
    let options = MonolevelOptions::from_config(&config);

    assert!(options.concurrency);
    assert!(options.sequential_yield);
    assert!(options.use_saved_grounding);
    assert_eq!(options.time_limit, Some(Duration::from_secs(30)));
    assert_eq!(options.length_limit, Some(40));
    assert_eq!(options.preempt_positive_final_goals, Some(true));

    let factor = MonolevelOptions::from_config(
        &PlannerConfig::new().with_length_limit(LengthLimit::Factor(2.0)),
    );
    assert_eq!(factor.length_limit, None);
}
