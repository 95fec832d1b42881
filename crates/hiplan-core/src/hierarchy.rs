//! Hierarchical plans: the outcome of one online planning run.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Map, Value};

use crate::division::{DivisionPoint, DivisionScenario};
use crate::error::{PlanningError, Result};
use crate::plan::MonolevelPlan;
use crate::schema::RefinementSchema;
use crate::statistics::SolveTimes;

/// The concatenated plan of every level, the partial plans yielded on each
/// online increment, and the division scenarios made between levels.
#[derive(Debug, Clone, Default)]
pub struct HierarchicalPlan {
    /// Level to complete plan.
    pub concatenated_plans: BTreeMap<u32, MonolevelPlan>,
    /// Level to online increment to the partial plan yielded on it.
    pub partial_plans: BTreeMap<u32, BTreeMap<u32, MonolevelPlan>>,
    /// Level to the scenarios dividing that level's plan, in order.
    pub problem_division_tree: BTreeMap<u32, Vec<DivisionScenario>>,
}

impl HierarchicalPlan {
    pub fn new(
        concatenated_plans: BTreeMap<u32, MonolevelPlan>,
        partial_plans: BTreeMap<u32, BTreeMap<u32, MonolevelPlan>>,
        problem_division_tree: BTreeMap<u32, Vec<DivisionScenario>>,
    ) -> Self {
        Self {
            concatenated_plans,
            partial_plans,
            problem_division_tree,
        }
    }

    pub fn get(&self, level: u32) -> Option<&MonolevelPlan> {
        self.concatenated_plans.get(&level)
    }

    pub fn bottom_level(&self) -> Option<u32> {
        self.concatenated_plans.keys().next().copied()
    }

    pub fn top_level(&self) -> Option<u32> {
        self.concatenated_plans.keys().next_back().copied()
    }

    /// Time until the first partial plan at `level` was yielded: the planning
    /// time of every partial plan at `level` and above on the increments up to
    /// and including that yield.
    pub fn get_latency_time(&self, level: u32) -> Result<f64> {
        let yield_increment = self
            .partial_plans
            .get(&level)
            .and_then(|plans| plans.keys().next().copied())
            .ok_or_else(|| PlanningError::invalid_input("no partial plans at level", level))?;
        Ok(self
            .partial_plans
            .range(level..)
            .flat_map(|(_, plans)| plans.range(..=yield_increment))
            .map(|(_, plan)| plan.grand_totals().total_time)
            .sum())
    }

    /// Total planning time of the complete plans at `level` and above.
    pub fn get_completion_time(&self, level: u32) -> f64 {
        self.concatenated_plans
            .range(level..)
            .map(|(_, plan)| plan.grand_totals().total_time)
            .sum()
    }

    /// Mean planning time of the partial plans yielded at `level`.
    pub fn get_average_yield_time(&self, level: u32) -> Result<f64> {
        let plans = self
            .partial_plans
            .get(&level)
            .filter(|plans| !plans.is_empty())
            .ok_or_else(|| PlanningError::invalid_input("no partial plans at level", level))?;
        let total: f64 = plans.values().map(|plan| plan.grand_totals().total_time).sum();
        Ok(total / plans.len() as f64)
    }

    pub fn get_overall_totals(&self, level: u32) -> Option<SolveTimes> {
        self.concatenated_plans.get(&level).map(MonolevelPlan::grand_totals)
    }

    pub fn overall_total_time(&self) -> f64 {
        self.concatenated_plans
            .values()
            .map(|plan| plan.grand_totals().total_time)
            .sum()
    }

    /// Latency of the ground (bottom) level.
    pub fn execution_latency(&self) -> Result<f64> {
        let bottom = self
            .bottom_level()
            .ok_or_else(|| PlanningError::invalid_input("hierarchical plan is empty", 0))?;
        self.get_latency_time(bottom)
    }

    /// Peak memory over all levels.
    pub fn required_memory(&self) -> f64 {
        self.concatenated_plans
            .values()
            .map(|plan| plan.grand_totals().memory)
            .fold(0.0, f64::max)
    }

    pub fn average_divisions_per_scenario(&self) -> f64 {
        let divisions: Vec<u32> = self
            .problem_division_tree
            .values()
            .flatten()
            .map(|scenario| scenario.get_total_divisions(false))
            .collect();
        if divisions.is_empty() {
            return 0.0;
        }
        divisions.iter().sum::<u32>() as f64 / divisions.len() as f64
    }

    /// Mean per level of all divisions, counting each boundary between
    /// consecutive scenarios as a division too.
    pub fn average_divisions_per_level(&self) -> f64 {
        if self.problem_division_tree.is_empty() {
            return 0.0;
        }
        let total: u32 = self
            .problem_division_tree
            .values()
            .map(|scenarios| {
                let divisions: u32 = scenarios.iter().map(|s| s.get_total_divisions(false)).sum();
                divisions + (scenarios.len() as u32).saturating_sub(1)
            })
            .sum();
        total as f64 / self.problem_division_tree.len() as f64
    }

    /// All division points over the plan at a level, each scenario bracketed
    /// by inherited points with adjacent scenarios sharing one.
    ///
    /// With `produced_from`, the points dividing the plan produced at `level`;
    /// otherwise those applied when planning at `level`.
    pub fn get_division_points(&self, level: u32, produced_from: bool) -> Result<Vec<DivisionPoint>> {
        let divided_level = if produced_from { level } else { level + 1 };
        let scenarios = self.problem_division_tree.get(&divided_level).ok_or_else(|| {
            PlanningError::invalid_input("no problem division at level", divided_level)
        })?;
        let mut points: Vec<DivisionPoint> = Vec::new();
        for scenario in scenarios {
            points.pop();
            points.extend(scenario.get_division_points(false, true));
        }
        Ok(points)
    }

    /// The sub-goal stages refined at `level` and the divisions applied to
    /// them, enough to replan `level` without the levels above.
    pub fn get_refinement_schema(&self, level: u32) -> Result<RefinementSchema> {
        let mapping = self
            .concatenated_plans
            .get(&level)
            .and_then(|plan| plan.conformance_mapping.as_ref())
            .ok_or_else(|| PlanningError::invalid_input("plan is not a refined plan at level", level))?;
        Ok(RefinementSchema::new(
            mapping.constraining_sgoals.clone(),
            self.get_division_points(level + 1, true)?,
        ))
    }

    /// Per level and step: planned actions, produced sub-goals of abstract
    /// plans, and the current and achieved sub-goal stage of refined plans.
    pub fn to_json_value(&self) -> Value {
        let mut levels = Map::new();
        for (level, plan) in &self.concatenated_plans {
            let mut steps = Map::new();
            for (step, actions) in &plan.actions {
                let mut entry = Map::new();
                entry.insert(
                    "actions".to_string(),
                    actions
                        .iter()
                        .map(|a| json!({ "robot": a.robot, "action": a.action }))
                        .collect(),
                );
                if plan.is_abstract() {
                    entry.insert(
                        "produced_sgoals".to_string(),
                        plan.produced_sgoals
                            .get(step)
                            .into_iter()
                            .flatten()
                            .map(|s| {
                                json!({
                                    "robot": s.robot,
                                    "action": s.action,
                                    "fluent": s.fluent,
                                    "value": s.value
                                })
                            })
                            .collect(),
                    );
                }
                if let Some(mapping) = &plan.conformance_mapping {
                    let current = mapping.current_sgoals.get(step).copied();
                    let achieved =
                        current.and_then(|index| mapping.sgoals_achieved_at.get(&index).copied());
                    entry.insert("current_sgoals_index".to_string(), json!(current));
                    entry.insert("achieved_sgoals_index".to_string(), json!(achieved));
                }
                steps.insert(step.to_string(), Value::Object(entry));
            }
            levels.insert(level.to_string(), Value::Object(steps));
        }
        Value::Object(levels)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_json_value()).map_err(|err| {
            PlanningError::Internal(format!("failed to serialise hierarchical plan: {}", err))
        })
    }
}

impl fmt::Display for HierarchicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (level, plan) in self.concatenated_plans.iter().rev() {
            let partials = self.partial_plans.get(level).map_or(0, BTreeMap::len);
            writeln!(f, "{} : Partial plans = {}", plan, partials)?;
        }
        write!(f, "Overall total time = {:.3}s", self.overall_total_time())
    }
}
