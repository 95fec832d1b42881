//! Tests for planner configuration.

use super::*;

#[test]
fn test_toml_parsing() {
    let toml = r#"
        bottom_level = 1
        top_level = 3
        concurrency = true
        conformance = true
        conformance_type = "sequential"
        sequential_yield = true
        online_method = "complete_first"
        time_limit_secs = 120
        verbosity = "verbose"

        [optimisation]
        minimise_actions = false

        [length_limit]
        factor = 1.5

        [division_strategy]
        type = "relentless"
        time_bound = 2.5
        bound_type = "cumulative_predictive"
        moving_average = 3
        interrupting = true
    "#;

    let config = PlannerConfig::from_toml_str(toml).unwrap();
    assert_eq!(config.top_level, Some(3));
    assert_eq!(config.conformance_type, Some(ConformanceType::SequentialAchievement));
    assert_eq!(config.online_method, OnlineMethod::CompleteFirst);
    assert_eq!(config.time_limit(), Some(Duration::from_secs(120)));
    assert_eq!(config.length_limit, Some(LengthLimit::Factor(1.5)));
    assert_eq!(config.verbosity, Verbosity::Verbose);
    assert_eq!(config.optimisation.minimise_actions, Some(false));
    assert!(config.optimisation.preempt_positive_final_goals);
    assert!(config.is_online());

    match config.division_strategy {
        Some(DivisionStrategyConfig::Relentless(relentless)) => {
            assert_eq!(relentless.time_bound, BoundConfig::Fixed(BoundValue::Fraction(2.5)));
            assert_eq!(relentless.bound_type, TimeBoundType::CumulativePredictive);
            assert_eq!(relentless.moving_average, Some(3));
            assert_eq!(relentless.interrupting, Some(true));
            assert_eq!(relentless.preemptive, None);
        }
        other => panic!("expected relentless strategy, got {:?}", other),
    }
}

#[test]
fn test_defaults() {
    let config = PlannerConfig::from_toml_str("").unwrap();
    assert_eq!(config.bottom_level, 1);
    assert_eq!(config.top_level, None);
    assert_eq!(config.online_method, OnlineMethod::GroundFirst);
    assert!(config.use_search_length_bound);
    assert!(config.avoid_refining_sgoals_marked_for_blending);
    assert!(!config.resume_saved_grounding());
    assert!(!config.is_online());
    assert_eq!(config.time_limit(), None);
}

#[test]
fn test_toml_blend_forms() {
    let symmetric = PlannerConfig::from_toml_str(
        r#"
        [division_strategy]
        type = "basic"
        problems = 3
        blend = 0.5
    "#,
    )
    .unwrap();
    match symmetric.division_strategy {
        Some(DivisionStrategyConfig::Basic(basic)) => {
            assert_eq!(basic.problems, Some(BoundConfig::Fixed(BoundValue::Count(3))));
            assert_eq!(basic.blend, Some(BlendConfig::Symmetric(BlendQuantity::Fraction(0.5))));
        }
        other => panic!("expected basic strategy, got {:?}", other),
    }

    let sided = PlannerConfig::from_toml_str(
        r#"
        [division_strategy]
        type = "steady"
        size_bound = 4
        blend = { left = 1, right = 2 }
    "#,
    )
    .unwrap();
    match sided.division_strategy {
        Some(DivisionStrategyConfig::Steady(steady)) => {
            assert_eq!(steady.blend, Some(BlendConfig::Sided(Blend::new(1, 2))));
        }
        other => panic!("expected steady strategy, got {:?}", other),
    }
}

#[test]
fn test_yaml_parsing() {
    let yaml = r#"
        concurrency: true
        conformance: true
        sequential_yield: false
        save_grounding: true
        length_limit:
          fixed: 40
        division_strategy:
          type: impetuous
          cumulative_time_bound:
            1: 5.0
            2: 10.0
          continuous_time_bound: 1
          continuous_bound_type: differential
          backwards_horizon: 0.5
    "#;

    let config = PlannerConfig::from_yaml_str(yaml).unwrap();
    assert!(config.save_grounding);
    assert!(config.resume_saved_grounding());
    assert_eq!(config.length_limit, Some(LengthLimit::Fixed(40)));

    match config.division_strategy {
        Some(DivisionStrategyConfig::Impetuous(impetuous)) => {
            let per_level: BTreeMap<u32, BoundValue> =
                [(1, BoundValue::Fraction(5.0)), (2, BoundValue::Fraction(10.0))]
                    .into_iter()
                    .collect();
            assert_eq!(impetuous.cumulative_time_bound, BoundConfig::PerLevel(per_level));
            assert_eq!(
                impetuous.continuous_time_bound,
                BoundConfig::Fixed(BoundValue::Count(1))
            );
            assert_eq!(impetuous.continuous_bound_type, TimeBoundType::Differential);
            assert_eq!(impetuous.backwards_horizon, Some(BoundValue::Fraction(0.5)));
        }
        other => panic!("expected impetuous strategy, got {:?}", other),
    }
}

#[test]
fn test_yaml_per_level_blend() {
    let yaml = r#"
        division_strategy:
          type: rapid
          proactive_basis: steady
          size_bound: 0.5
          time_bound: 3
          blend:
            2:
              left: 1
              right: 0
    "#;

    let config = PlannerConfig::from_yaml_str(yaml).unwrap();
    match config.division_strategy {
        Some(DivisionStrategyConfig::Rapid(rapid)) => {
            assert_eq!(rapid.proactive_basis, ProactiveBasis::Steady);
            assert_eq!(rapid.bound_type, TimeBoundType::Incremental);
            let blend: BTreeMap<u32, Blend> = [(2, Blend::new(1, 0))].into_iter().collect();
            assert_eq!(rapid.blend, Some(BlendConfig::PerLevel(blend)));
        }
        other => panic!("expected rapid strategy, got {:?}", other),
    }
}

#[test]
fn test_invalid_values_rejected() {
    assert!(matches!(
        PlannerConfig::from_toml_str("bottom_level = 3\ntop_level = 2"),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        PlannerConfig::from_toml_str("time_limit_secs = 0"),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        PlannerConfig::from_toml_str("[length_limit]\nfactor = -1.0"),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        PlannerConfig::from_toml_str("[division_strategy]\ntype = \"unknown\""),
        Err(ConfigError::Toml(_))
    ));
}

#[test]
fn test_builder() {
    let config = PlannerConfig::new()
        .with_levels(1, 2)
        .with_concurrency(true)
        .with_conformance(true, true)
        .with_online_method(OnlineMethod::CompleteFirst)
        .with_division_strategy(DivisionStrategyConfig::Hasty(NaiveProactiveConfig::default()))
        .with_time_limit_secs(30)
        .with_detect_interleaving(true);

    assert_eq!(config.bottom_level, 1);
    assert_eq!(config.top_level, Some(2));
    assert!(config.concurrency);
    assert!(config.sequential_yield);
    assert!(config.detect_interleaving);
    assert_eq!(config.time_limit(), Some(Duration::from_secs(30)));
    assert!(config.is_online());
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_missing_file() {
    let result = PlannerConfig::load("/nonexistent/planner.yaml");
    assert!(matches!(result, Err(ConfigError::Io(_))));
}
