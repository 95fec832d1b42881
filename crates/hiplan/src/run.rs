//! Planner entry point that hides the planner wiring.

use hiplan_config::PlannerConfig;
use hiplan_core::{HierarchicalPlan, IncrementalSolver, Result};
use hiplan_solver::HierarchicalPlanner;

/// Runs a complete hierarchical planning call on a fresh planner.
///
/// With the `console` feature the coloured console output is installed on
/// first use.
pub fn run_planner<S: IncrementalSolver>(
    name: impl Into<String>,
    solver: S,
    config: &PlannerConfig,
) -> Result<HierarchicalPlan> {
    #[cfg(feature = "console")]
    hiplan_console::init();

    let mut planner = HierarchicalPlanner::new(name, solver).with_config(config);
    planner.initialise_problem()?;
    planner.hierarchical_plan(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiplan_config::{BasicConfig, DivisionStrategyConfig};
    use hiplan_core::PlanningError;
    use hiplan_test::ScriptedSolver;

    #[test]
    fn test_run_planner_online() {
        let config = PlannerConfig::new()
            .with_conformance(true, false)
            .with_division_strategy(DivisionStrategyConfig::Basic(BasicConfig::default()));
        let plan = run_planner("corridor", ScriptedSolver::new(2, 4), &config).unwrap();

        assert_eq!(plan.get(1).unwrap().plan_length(), 8);
        assert!(plan.get(1).unwrap().is_final);
        assert_eq!(plan.partial_plans[&1].len(), 2);
    }

    #[test]
    fn test_run_planner_rejects_invalid_config() {
        let config = PlannerConfig::new().with_levels(2, 1);
        let result = run_planner("corridor", ScriptedSolver::new(2, 4), &config);
        assert!(matches!(result, Err(PlanningError::InvalidInput { .. })));
    }
}
