//! Refinement schemas: saved sub-goal stages and the divisions made over them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::division::{DivisionPoint, SubGoalRange};
use crate::error::{PlanningError, Result};
use crate::literal::SubGoal;

/// The sub-goal stages of an abstract plan together with the divisions
/// committed while refining them.
///
/// Loading a schema lets planning resume at the level below without
/// replanning the abstract level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefinementSchema {
    #[serde(rename = "sub_goal_stages")]
    pub constraining_sgoals: BTreeMap<u32, Vec<SubGoal>>,
    #[serde(default)]
    pub problem_divisions: Vec<DivisionPoint>,
}

impl RefinementSchema {
    pub fn new(
        constraining_sgoals: BTreeMap<u32, Vec<SubGoal>>,
        problem_divisions: Vec<DivisionPoint>,
    ) -> Self {
        Self {
            constraining_sgoals,
            problem_divisions,
        }
    }

    /// Level the sub-goal stages were produced at.
    pub fn level(&self) -> Result<u32> {
        self.constraining_sgoals
            .values()
            .flatten()
            .next()
            .map(|sgoal| sgoal.level)
            .ok_or_else(|| PlanningError::InvalidArgument("refinement schema is empty".to_string()))
    }

    pub fn sgoals_range(&self) -> Result<SubGoalRange> {
        match (
            self.constraining_sgoals.keys().next(),
            self.constraining_sgoals.keys().next_back(),
        ) {
            (Some(&first), Some(&last)) => SubGoalRange::new(first, last),
            _ => Err(PlanningError::InvalidArgument("refinement schema is empty".to_string())),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| {
            PlanningError::Internal(format!("failed to serialise refinement schema: {}", err))
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| PlanningError::invalid_input("malformed refinement schema", err))
    }
}

impl fmt::Display for RefinementSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(Level = ")?;
        match self.level() {
            Ok(level) => write!(f, "{}", level)?,
            Err(_) => write!(f, "?")?,
        }
        match self.sgoals_range() {
            Ok(range) => write!(f, ", Sub-goals range = {}", range)?,
            Err(_) => write!(f, ", Sub-goals range = []")?,
        }
        write!(f, ", Total problem divisions = {})", self.problem_divisions.len())
    }
}
