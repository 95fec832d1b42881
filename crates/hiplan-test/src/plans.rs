//! Abstract plan fixtures.

use std::collections::BTreeMap;

use hiplan_core::{Action, MonolevelPlan, PlanningStatistics, SubGoal};

/// A sub-goal stage of `size` sub-goals at `index`.
pub fn sgoal_stage(level: u32, index: u32, size: u32) -> Vec<SubGoal> {
    (0..size)
        .map(|n| {
            SubGoal::new(
                level,
                "talos",
                format!("move(cell{})", index),
                format!("at(talos, {})", n),
                format!("cell{}", index),
                index,
            )
        })
        .collect()
}

/// A complete classical plan at `level` with one action and one produced
/// sub-goal per step over `1..=length`.
pub fn abstract_plan(level: u32, length: u32) -> MonolevelPlan {
    abstract_plan_from(level, 0, length)
}

/// Like [`abstract_plan`] but starting on `start_step`.
pub fn abstract_plan_from(level: u32, start_step: u32, length: u32) -> MonolevelPlan {
    let steps = start_step + 1..=start_step + length;
    let actions: BTreeMap<u32, Vec<Action>> = steps
        .clone()
        .map(|step| (step, vec![Action::new(level, "talos", format!("move(cell{})", step), step)]))
        .collect();
    let produced_sgoals = steps.map(|step| (step, sgoal_stage(level, step, 1))).collect();
    MonolevelPlan {
        level,
        states: (start_step..=start_step + length)
            .map(|step| (step, Vec::new()))
            .collect(),
        actions,
        produced_sgoals,
        is_final: true,
        statistics: PlanningStatistics::default(),
        conformance_mapping: None,
        problem_divisions: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abstract_plan_from() {
        let plan = abstract_plan_from(3, 4, 2);
        assert_eq!(plan.start_step(), 4);
        assert_eq!(plan.end_step(), 6);
        assert_eq!(plan.plan_length(), 2);
        assert_eq!(plan.produced_sgoals.keys().copied().collect::<Vec<_>>(), vec![5, 6]);
    }
}
