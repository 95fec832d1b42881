//! Tests for division strategies.

use hiplan_config::{
    BoundConfig, BoundValue, ImpetuousConfig, ProactiveBasis, RapidConfig, RelentlessConfig,
    TimeBoundType,
};
use hiplan_core::{OnlineMethod, PlanningError, SubGoalRange};
use hiplan_test::abstract_plan;

use super::*;

fn fixed(value: f64) -> BoundConfig {
    BoundConfig::Fixed(BoundValue::Fraction(value))
}

fn relentless_config(time_bound: f64) -> RelentlessConfig {
    RelentlessConfig {
        time_bound: fixed(time_bound),
        bound_type: TimeBoundType::Incremental,
        backwards_horizon: None,
        moving_average: None,
        preemptive: None,
        interrupting: None,
    }
}

fn context(times: &[f64], subgoal_index: u32, search_length: u32) -> ReactionContext<'_> {
    ReactionContext {
        level: 1,
        sgoals_range: SubGoalRange::new(1, 5).unwrap(),
        start_step: 0,
        search_length,
        subgoal_index,
        matching_child: true,
        incremental_times: times,
        observable_plan: None,
    }
}

fn indices(scenario: &DivisionScenario) -> Vec<u32> {
    scenario.points().iter().map(|point| point.index).collect()
}

#[test]
fn test_basic_divides_into_fixed_problems() {
    let basic = Basic::new(Some(BoundConfig::Fixed(BoundValue::Count(4))), None).unwrap();
    let scenario = basic.proact(&abstract_plan(2, 10), 0).unwrap();
    assert_eq!(indices(&scenario), vec![2, 4, 7]);

    // Never more problems than steps.
    let scenario = basic.proact(&abstract_plan(2, 3), 0).unwrap();
    assert_eq!(indices(&scenario), vec![1, 2]);
    assert!(!basic.divides_reactively(1));
}

#[test]
fn test_basic_prediction() {
    let basic = Basic::new(None, None).unwrap();
    assert_eq!(basic.total_increments_prediction(3, OnlineMethod::GroundFirst), Some(4));
    assert_eq!(basic.total_increments_prediction(3, OnlineMethod::CompleteFirst), Some(4));
    assert_eq!(basic.total_increments_prediction(1, OnlineMethod::GroundFirst), Some(1));
}

#[test]
fn test_basic_rejects_zero_problems() {
    let result = Basic::new(Some(BoundConfig::Fixed(BoundValue::Count(0))), None);
    assert!(matches!(result, Err(PlanningError::InvalidInput { .. })));
}

#[test]
fn test_true_size_bound() {
    let hasty = NaiveProactive::hasty(None, None).unwrap();
    assert_eq!(hasty.get_true_size_bound(2, 8).unwrap(), 2);
    assert_eq!(hasty.partial_problems(2, 8).unwrap(), 4);
    assert_eq!(hasty.get_true_size_bound(2, 1).unwrap(), 1);

    let steady = NaiveProactive::steady(None, None).unwrap();
    assert_eq!(steady.get_true_size_bound(2, 8).unwrap(), 4);
    assert_eq!(steady.partial_problems(2, 8).unwrap(), 2);

    let absolute =
        NaiveProactive::hasty(Some(BoundConfig::Fixed(BoundValue::Count(20))), None).unwrap();
    assert_eq!(absolute.get_true_size_bound(2, 8).unwrap(), 8);
    assert_eq!(absolute.partial_problems(2, 8).unwrap(), 1);
    assert!(absolute.get_true_size_bound(2, 0).is_err());
}

#[test]
fn test_hasty_and_steady_division() {
    let hasty = NaiveProactive::hasty(None, None).unwrap();
    let scenario = hasty.proact(&abstract_plan(2, 8), 0).unwrap();
    assert_eq!(indices(&scenario), vec![2, 4, 6]);
    assert_eq!(hasty.name(), "hasty");

    let steady = NaiveProactive::steady(None, None).unwrap();
    let scenario = steady.proact(&abstract_plan(2, 8), 3).unwrap();
    assert_eq!(indices(&scenario), vec![4]);
    assert_eq!(scenario.previously_solved_problems(), 3);
}

#[test]
fn test_naive_prediction() {
    let hasty = NaiveProactive::hasty(None, None).unwrap();
    assert_eq!(hasty.total_increments_prediction(3, OnlineMethod::GroundFirst), Some(16));
    assert_eq!(hasty.total_increments_prediction(3, OnlineMethod::CompleteFirst), Some(8));

    let absolute =
        NaiveProactive::steady(Some(BoundConfig::Fixed(BoundValue::Count(3))), None).unwrap();
    assert_eq!(absolute.total_increments_prediction(3, OnlineMethod::CompleteFirst), Some(0));
}

#[test]
fn test_naive_rejects_invalid_size_bound() {
    assert!(NaiveProactive::hasty(Some(fixed(1.5)), None).is_err());
    assert!(NaiveProactive::steady(Some(BoundConfig::Fixed(BoundValue::Count(0))), None).is_err());
}

#[test]
fn test_relentless_divides_on_mean_time() {
    let times = [0.2, 0.3, 1.2];

    let mut patient = Relentless::new(&relentless_config(1.0)).unwrap();
    let reaction = patient.react(&context(&times, 3, 6)).unwrap();
    assert!(!reaction.divide);
    assert_eq!(patient.state().last_division_index(1), None);

    let mut relentless = Relentless::new(&relentless_config(0.5)).unwrap();
    let reaction = relentless.react(&context(&times, 3, 6)).unwrap();
    assert!(reaction.divide);
    assert!(!reaction.interrupt);
    assert_eq!(relentless.state().last_division_index(1), Some(3));
    assert_eq!(relentless.state().last_division_step(1), Some(6));

    // No second division at the same index.
    let reaction = relentless.react(&context(&times, 3, 7)).unwrap();
    assert!(!reaction.divide);
}

#[test]
fn test_relentless_never_divides_on_range_bounds() {
    let times = [5.0, 5.0];
    let mut relentless = Relentless::new(&relentless_config(0.5)).unwrap();
    assert!(!relentless.react(&context(&times, 1, 2)).unwrap().divide);
    assert!(!relentless.react(&context(&times, 5, 10)).unwrap().divide);
}

#[test]
fn test_non_preemptive_waits_for_matching_child() {
    let times = [5.0, 5.0];
    let mut config = relentless_config(0.5);
    config.preemptive = Some(false);
    let mut relentless = Relentless::new(&config).unwrap();

    let mut between = context(&times, 2, 5);
    between.matching_child = false;
    assert!(!relentless.react(&between).unwrap().divide);
    assert!(relentless.react(&context(&times, 2, 5)).unwrap().divide);
}

#[test]
fn test_interrupting_is_never_preemptive() {
    let mut config = relentless_config(0.5);
    config.interrupting = Some(true);
    let mut relentless = Relentless::new(&config).unwrap();
    assert!(relentless.is_interrupting());
    assert!(!relentless.is_preemptive());

    let times = [1.0];
    let reaction = relentless.react(&context(&times, 2, 4)).unwrap();
    assert!(reaction.divide);
    assert!(reaction.interrupt);
}

#[test]
fn test_calculate_time() {
    let times = [1.0, 2.0, 4.0];
    let state = ReactiveState::new(None, None).unwrap();
    let ctx = context(&times, 3, 3);

    assert!((state.calculate_time(&ctx, TimeBoundType::Incremental) - 7.0 / 3.0).abs() < 1e-9);
    assert_eq!(state.calculate_time(&ctx, TimeBoundType::Integral), 7.0);
    assert_eq!(state.calculate_time(&ctx, TimeBoundType::Cumulative), 7.0);
    assert_eq!(state.calculate_time(&ctx, TimeBoundType::Differential), 1.5);
    // Gradients 1, 2 change at a rate of 1.
    assert_eq!(state.calculate_time(&ctx, TimeBoundType::IncrementalPredictive), 7.0);
    assert_eq!(state.calculate_time(&ctx, TimeBoundType::CumulativePredictive), 10.0);

    let windowed = ReactiveState::new(Some(2), None).unwrap();
    assert_eq!(windowed.calculate_time(&ctx, TimeBoundType::Incremental), 3.0);
    assert_eq!(windowed.calculate_time(&ctx, TimeBoundType::Cumulative), 7.0);
    assert_eq!(windowed.calculate_time(&ctx, TimeBoundType::IncrementalPredictive), 0.0);
}

#[test]
fn test_predictive_time_uses_rate_of_change_of_gradient() {
    // Gradients 1, 2, 3 change at a rate of 1, unlike their mean of 2.
    let times = [1.0, 2.0, 4.0, 7.0];
    let ctx = context(&times, 4, 4);

    let state = ReactiveState::new(None, None).unwrap();
    assert_eq!(state.calculate_time(&ctx, TimeBoundType::Differential), 2.0);
    assert_eq!(state.calculate_time(&ctx, TimeBoundType::IncrementalPredictive), 11.0);
    assert_eq!(state.calculate_time(&ctx, TimeBoundType::CumulativePredictive), 18.0);

    // A window of 3 keeps gradients 2, 3.
    let windowed = ReactiveState::new(Some(3), None).unwrap();
    assert_eq!(windowed.calculate_time(&ctx, TimeBoundType::Differential), 2.5);
    assert_eq!(windowed.calculate_time(&ctx, TimeBoundType::IncrementalPredictive), 11.0);
    assert_eq!(windowed.calculate_time(&ctx, TimeBoundType::CumulativePredictive), 18.0);

    let accelerating = [1.0, 2.0, 4.0, 8.0];
    let ctx = context(&accelerating, 4, 4);
    // Gradients 2, 4 change at a rate of 2.
    assert_eq!(windowed.calculate_time(&ctx, TimeBoundType::IncrementalPredictive), 14.0);
    assert_eq!(windowed.calculate_time(&ctx, TimeBoundType::CumulativePredictive), 21.0);
}

#[test]
fn test_calculate_time_since_last_division() {
    let times = [1.0, 2.0, 4.0, 8.0];
    let mut state = ReactiveState::new(None, None).unwrap();
    state.update(1, 2, 2).unwrap();

    let ctx = context(&times, 4, 4);
    assert_eq!(state.calculate_time(&ctx, TimeBoundType::Cumulative), 12.0);
}

#[test]
fn test_update_requires_progress() {
    let mut state = ReactiveState::new(None, None).unwrap();
    state.update(1, 3, 6).unwrap();
    assert!(state.update(1, 3, 8).is_err());
    assert!(state.update(1, 4, 6).is_err());
    assert!(state.update(2, 1, 1).is_ok());
}

#[test]
fn test_reactive_state_rejects_invalid_settings() {
    assert!(ReactiveState::new(Some(0), None).is_err());
    assert!(ReactiveState::new(None, Some(BoundValue::Fraction(1.5))).is_err());
    assert!(ReactiveState::new(None, Some(BoundValue::Count(-1))).is_err());
}

#[test]
fn test_backwards_horizon() {
    assert_eq!(BackwardsHorizon::Count(2).resolve(1), 1);
    assert_eq!(BackwardsHorizon::Count(2).resolve(5), 2);
    assert_eq!(BackwardsHorizon::Fraction(0.5).resolve(4), 2);
    assert_eq!(BackwardsHorizon::default().resolve(4), 0);
}

fn impetuous_config(cumulative: f64, continuous: f64) -> ImpetuousConfig {
    ImpetuousConfig {
        cumulative_time_bound: fixed(cumulative),
        continuous_time_bound: fixed(continuous),
        continuous_bound_type: TimeBoundType::Incremental,
        backwards_horizon: None,
        moving_average: None,
        preemptive: None,
    }
}

#[test]
fn test_impetuous_interrupts_on_cumulative_time() {
    let times = [1.0, 2.0, 3.0];
    let mut impetuous = Impetuous::new(&impetuous_config(5.0, 100.0)).unwrap();
    let reaction = impetuous.react(&context(&times, 2, 3)).unwrap();
    assert!(reaction.divide);
    assert!(reaction.interrupt);
}

#[test]
fn test_impetuous_divides_continuously() {
    let times = [1.0, 2.0, 3.0];
    let mut impetuous = Impetuous::new(&impetuous_config(100.0, 0.5)).unwrap();
    let reaction = impetuous.react(&context(&times, 2, 3)).unwrap();
    assert!(reaction.divide);
    assert!(!reaction.interrupt);
    assert_eq!(impetuous.state().moving_average(), Some(5));
}

#[test]
fn test_impetuous_rejects_cumulative_continuous_bound() {
    let mut config = impetuous_config(5.0, 1.0);
    config.continuous_bound_type = TimeBoundType::Cumulative;
    assert!(matches!(
        Impetuous::new(&config),
        Err(PlanningError::InvalidInput { .. })
    ));
}

#[test]
fn test_rapid_combines_proactive_and_reactive() {
    let config = RapidConfig {
        proactive_basis: ProactiveBasis::Steady,
        size_bound: Some(fixed(0.5)),
        time_bound: fixed(0.5),
        bound_type: TimeBoundType::Incremental,
        backwards_horizon: None,
        moving_average: None,
        blend: None,
    };
    let mut rapid = Rapid::new(&config).unwrap();

    let scenario = rapid.proact(&abstract_plan(2, 8), 0).unwrap();
    assert_eq!(indices(&scenario), vec![4]);
    assert!(rapid.divides_reactively(1));
    assert!(rapid.reactive().is_preemptive());
    assert_eq!(rapid.reactive().state().moving_average(), Some(1));

    let times = [0.1, 0.9];
    let reaction = rapid.react(&context(&times, 2, 4)).unwrap();
    assert!(reaction.divide);
    assert!(!reaction.interrupt);
}

#[test]
fn test_reaction_display() {
    let reaction = Reaction {
        divide: true,
        interrupt: false,
        backwards_horizon: BackwardsHorizon::Count(1),
        rationale: None,
    };
    assert_eq!(
        reaction.to_string(),
        "(Divide = true, Interrupt = false, Backwards Horizon = 1, Rationale = none)"
    );
}
