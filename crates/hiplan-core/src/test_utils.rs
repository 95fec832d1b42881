//! Test utilities for hiplan-core
//!
//! Provides plan and sub-goal fixtures used across the crate's test modules.

use std::collections::BTreeMap;

use crate::division::{DivisionPoint, DivisionScenario};
use crate::literal::{Action, SubGoal};
use crate::plan::MonolevelPlan;
use crate::statistics::PlanningStatistics;

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
        .map(|step| (step, vec![Action::new(level, "talos", format!("act{}", step), step)]))
        .collect();
    let produced_sgoals = steps.map(|step| (step, sgoal_stage(level, step, 1))).collect();
    MonolevelPlan {
        level,
        states: (start_step..=start_step + length).map(|step| (step, Vec::new())).collect(),
        actions,
        produced_sgoals,
        is_final: true,
        statistics: PlanningStatistics::default(),
        conformance_mapping: None,
        problem_divisions: Vec::new(),
    }
}

/// A scenario over a level 2 plan of `length` steps.
pub fn scenario(length: u32, points: Vec<DivisionPoint>) -> DivisionScenario {
    DivisionScenario::new(abstract_plan(2, length), points, 0).unwrap()
}
