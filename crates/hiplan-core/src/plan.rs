//! Monolevel plans and their quality metrics.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::conformance::{sample_stdev, ConformanceMapping};
use crate::division::DivisionPoint;
use crate::error::{PlanningError, Result};
use crate::literal::{Action, Fluent, SubGoal};
use crate::schema::RefinementSchema;
use crate::statistics::{PlanningStatistics, SolveTimes};

/// A pair of length and action expansion measures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Expansion {
    /// Steps per refined sub-goal stage.
    pub length: f64,
    /// Actions per refined sub-goal.
    pub action: f64,
}

impl Expansion {
    pub fn new(length: f64, action: f64) -> Self {
        Self { length, action }
    }
}

impl fmt::Display for Expansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(Len = {:.2}, Act = {:.2})", self.length, self.action)
    }
}

/// A contiguous sequence of steps at one abstraction level and the actions
/// planned on them.
///
/// States cover the start step too; actions start on the step after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonolevelPlan {
    pub level: u32,
    pub states: BTreeMap<u32, Vec<Fluent>>,
    pub actions: BTreeMap<u32, Vec<Action>>,
    /// Sub-goals produced by the plan, keyed by the stage index (the producing step).
    pub produced_sgoals: BTreeMap<u32, Vec<SubGoal>>,
    pub is_final: bool,
    pub statistics: PlanningStatistics,
    pub conformance_mapping: Option<ConformanceMapping>,
    /// Divisions committed while the plan was searched.
    pub problem_divisions: Vec<DivisionPoint>,
}

impl MonolevelPlan {
    /// Fabricates the abstract plan a refinement schema was taken from.
    ///
    /// Each sub-goal stage becomes the produced stage of an empty step, so
    /// the plan spans exactly the schema's index range.
    pub fn from_schema(schema: &RefinementSchema) -> Result<Self> {
        let range = schema.sgoals_range()?;
        let level = schema.level()?;
        let states = (range.first_index() - 1..=range.last_index())
            .map(|step| (step, Vec::new()))
            .collect();
        let actions = range.indices().map(|step| (step, Vec::new())).collect();
        Ok(Self {
            level,
            states,
            actions,
            produced_sgoals: schema.constraining_sgoals.clone(),
            is_final: true,
            statistics: PlanningStatistics::default(),
            conformance_mapping: None,
            problem_divisions: Vec::new(),
        })
    }

    /// Actions planned on a step.
    pub fn get(&self, step: u32) -> Option<&[Action]> {
        self.actions.get(&step).map(Vec::as_slice)
    }

    /// Start step, inclusive of states and exclusive of actions.
    pub fn start_step(&self) -> u32 {
        self.states.keys().next().copied().unwrap_or(0)
    }

    /// End step, inclusive of states and actions.
    pub fn end_step(&self) -> u32 {
        self.states.keys().next_back().copied().unwrap_or(0)
    }

    /// Number of steps with actions.
    pub fn plan_length(&self) -> u32 {
        self.actions.len() as u32
    }

    pub fn total_actions(&self) -> u32 {
        self.actions.values().map(|actions| actions.len() as u32).sum()
    }

    /// Plan length per action; below one when actions run concurrently.
    pub fn compression_factor(&self) -> f64 {
        match self.total_actions() {
            0 => 0.0,
            total => self.plan_length() as f64 / total as f64,
        }
    }

    pub fn total_produced_sgoals(&self) -> u32 {
        self.produced_sgoals.values().map(|sgoals| sgoals.len() as u32).sum()
    }

    /// Planned in an abstract model; produces sub-goal stages.
    pub fn is_abstract(&self) -> bool {
        self.level > 1
    }

    /// Planned in the ground model; executable and never refined further.
    pub fn is_ground(&self) -> bool {
        self.level == 1
    }

    /// Whether the plan refines sub-goal stages from the level above.
    pub fn is_refined(&self) -> bool {
        self.conformance_mapping.is_some()
    }

    pub fn is_initial(&self) -> bool {
        self.start_step() == 0
    }

    pub fn is_complete(&self) -> bool {
        self.is_initial() && self.is_final
    }

    /// `"offline"` for complete plans without divisions, `"online"` otherwise.
    pub fn planning_mode(&self) -> &'static str {
        if self.is_complete() && self.problem_divisions.is_empty() {
            "offline"
        } else {
            "online"
        }
    }

    /// `"classic"`, `"com-ref"` (complete refinement) or `"par-ref"` (partial refinement).
    pub fn problem_type(&self) -> &'static str {
        if !self.is_refined() {
            "classic"
        } else if self.planning_mode() == "offline" {
            "com-ref"
        } else {
            "par-ref"
        }
    }

    pub fn grand_totals(&self) -> SolveTimes {
        self.statistics.grand_totals
    }

    /// Average expansion over all refined stages; `(1, 1)` for classical plans.
    pub fn get_plan_expansion_factor(&self) -> Expansion {
        match &self.conformance_mapping {
            Some(mapping) if mapping.problem_size() > 0 => Expansion::new(
                self.plan_length() as f64 / mapping.problem_size() as f64,
                ratio(self.total_actions(), mapping.total_constraining_sgoals() as u32),
            ),
            _ => Expansion::new(1.0, 1.0),
        }
    }

    /// Expansion of one refined stage: its sub-plan length and its actions per
    /// constraining sub-goal.
    pub fn get_expansion_factor(&self, index: u32) -> Result<Expansion> {
        let Some(mapping) = &self.conformance_mapping else {
            return Ok(Expansion::new(1.0, 1.0));
        };
        let Some(sgoals) = mapping.constraining_sgoals.get(&index) else {
            return Err(PlanningError::InvalidArgument(format!(
                "sub-goal index {} is not refined by {}",
                index, self
            )));
        };
        let steps = mapping.current_sgoals.reverse_get(&index);
        let length = steps.map(|steps| steps.len()).unwrap_or(0);
        let actions: u32 = steps
            .into_iter()
            .flatten()
            .filter_map(|step| self.actions.get(step))
            .map(|actions| actions.len() as u32)
            .sum();
        Ok(Expansion::new(length as f64, ratio(actions, sgoals.len() as u32)))
    }

    /// Sample standard deviation of stage expansion; zero unless more than one
    /// stage is refined.
    pub fn get_expansion_deviation(&self) -> Expansion {
        let Some(mapping) = &self.conformance_mapping else {
            return Expansion::default();
        };
        if mapping.constraining_sgoals.len() <= 1 {
            return Expansion::default();
        }
        let factors: Vec<Expansion> = mapping
            .constraining_sgoals
            .keys()
            .filter_map(|index| self.get_expansion_factor(*index).ok())
            .collect();
        let lengths: Vec<f64> = factors.iter().map(|f| f.length).collect();
        let actions: Vec<f64> = factors.iter().map(|f| f.action).collect();
        Expansion::new(sample_stdev(&lengths), sample_stdev(&actions))
    }

    /// Coefficient of deviation of stage expansion; zero is perfectly balanced.
    pub fn get_degree_of_balance(&self) -> Expansion {
        if !self.is_refined() {
            return Expansion::default();
        }
        let deviation = self.get_expansion_deviation();
        let factor = self.get_plan_expansion_factor();
        let divide = |dev: f64, fac: f64| if fac == 0.0 { 0.0 } else { dev / fac };
        Expansion::new(
            divide(deviation.length, factor.length),
            divide(deviation.action, factor.action),
        )
    }
}

fn ratio(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl fmt::Display for MonolevelPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let totals = self.grand_totals();
        write!(
            f,
            "Level = {:>2} ({}), Length = {:>3}, Actions = {:>3} (Com = {:.2}), Sgs = {}, \
             Time = {:>7.3}s (Gro = {:>7.3}s, Sea = {:>7.3}s), Expan {} (Dev = {}, Bal = {})",
            self.level,
            self.problem_type(),
            self.plan_length(),
            self.total_actions(),
            self.compression_factor(),
            self.total_produced_sgoals(),
            totals.total_time,
            totals.grounding_time,
            totals.solving_time,
            self.get_plan_expansion_factor(),
            self.get_expansion_deviation(),
            self.get_degree_of_balance()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reversible::ReversibleMap;
    use crate::test_utils::{abstract_plan, sgoal_stage};

    /// Four ground steps refining two stages: index 1 over steps 1-3 (one
    /// action each), index 2 over step 4 (two actions).
    fn refined_plan() -> MonolevelPlan {
        let actions: BTreeMap<u32, Vec<Action>> = (1..=4)
            .map(|step| {
                let mut actions = vec![Action::new(1, "talos", format!("act{}", step), step)];
                if step == 4 {
                    actions.push(Action::new(1, "tiago", "act4b", step));
                }
                (step, actions)
            })
            .collect();
        let current: ReversibleMap<u32, u32> =
            [(1, 1), (2, 1), (3, 1), (4, 2)].into_iter().collect();
        let achieved: ReversibleMap<u32, u32> = [(1, 3), (2, 4)].into_iter().collect();
        let constraining = [(1, sgoal_stage(2, 1, 1)), (2, sgoal_stage(2, 2, 1))]
            .into_iter()
            .collect();

        MonolevelPlan {
            level: 1,
            states: (0..=4).map(|step| (step, Vec::new())).collect(),
            actions,
            produced_sgoals: BTreeMap::new(),
            is_final: true,
            statistics: PlanningStatistics::default(),
            conformance_mapping: Some(ConformanceMapping::new(constraining, current, achieved)),
            problem_divisions: Vec::new(),
        }
    }

    #[test]
    fn test_derived_properties() {
        let plan = refined_plan();

        assert_eq!(plan.start_step(), 0);
        assert_eq!(plan.end_step(), 4);
        assert_eq!(plan.plan_length(), 4);
        assert_eq!(plan.total_actions(), 5);
        assert!(plan.is_ground());
        assert!(plan.is_complete());
        assert_eq!(plan.planning_mode(), "offline");
        assert_eq!(plan.problem_type(), "com-ref");
    }

    #[test]
    fn test_expansion_factors() {
        let plan = refined_plan();

        assert_eq!(plan.get_plan_expansion_factor(), Expansion::new(2.0, 2.5));
        assert_eq!(plan.get_expansion_factor(1).unwrap(), Expansion::new(3.0, 3.0));
        assert_eq!(plan.get_expansion_factor(2).unwrap(), Expansion::new(1.0, 2.0));
        assert!(plan.get_expansion_factor(3).is_err());

        let deviation = plan.get_expansion_deviation();
        assert!((deviation.length - 2.0_f64.sqrt()).abs() < 1e-9);
        let balance = plan.get_degree_of_balance();
        assert!((balance.length - 2.0_f64.sqrt() / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_classical_plan_expansion() {
        let plan = abstract_plan(2, 5);

        assert!(!plan.is_refined());
        assert_eq!(plan.problem_type(), "classic");
        assert_eq!(plan.get_plan_expansion_factor(), Expansion::new(1.0, 1.0));
        assert_eq!(plan.get_expansion_deviation(), Expansion::default());
        assert_eq!(plan.total_produced_sgoals(), 5);
    }

    #[test]
    fn test_partial_plan_is_online() {
        let mut plan = refined_plan();
        plan.is_final = false;
        assert_eq!(plan.planning_mode(), "online");
        assert_eq!(plan.problem_type(), "par-ref");
    }
}
