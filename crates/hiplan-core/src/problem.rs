//! Monolevel planning problem specifications.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::division::SubGoalRange;
use crate::error::Result;

/// How sub-goal stages must be achieved during conformance refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConformanceType {
    /// All sub-goals of a stage must hold on the same step.
    SimultaneousAchievement,
    /// Sub-goals of a stage may be achieved one after another.
    SequentialAchievement,
}

impl fmt::Display for ConformanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConformanceType::SimultaneousAchievement => write!(f, "simultaneous"),
            ConformanceType::SequentialAchievement => write!(f, "sequential"),
        }
    }
}

/// Order in which levels are progressed during online planning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnlineMethod {
    /// Descend from the highest valid level to the lowest in every increment.
    #[default]
    GroundFirst,
    /// Stay at the highest valid level until it is complete.
    CompleteFirst,
}

impl fmt::Display for OnlineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnlineMethod::GroundFirst => write!(f, "ground-first"),
            OnlineMethod::CompleteFirst => write!(f, "complete-first"),
        }
    }
}

/// How much of the planning process is reported.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Disable,
    Minimal,
    #[default]
    Simple,
    Standard,
    Verbose,
}

impl Verbosity {
    /// Whether full plans are reported.
    pub fn shows_plans(self) -> bool {
        self >= Verbosity::Standard
    }
}

/// Specification of one monolevel planning problem.
///
/// Created fresh by the planner for every planning call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonolevelProblem {
    pub level: u32,
    pub concurrency: bool,

    pub conformance: bool,
    pub conformance_type: Option<ConformanceType>,
    /// First sub-goal stage index to refine, inclusive.
    pub first_sgoals: u32,
    /// Last sub-goal stage index to refine, inclusive.
    pub last_sgoals: u32,

    /// The first action is planned on the step after this one.
    pub start_step: u32,
    pub is_initial: bool,
    pub is_final: bool,
    pub complete_planning: bool,

    pub sequential_yield: bool,
    pub reactive_divisions: bool,
    pub use_search_length_bound: bool,
    pub search_length_bound: u32,
}

impl MonolevelProblem {
    /// The sub-goal stage indices refined by the problem.
    pub fn sgoals_range(&self) -> Result<SubGoalRange> {
        SubGoalRange::new(self.first_sgoals, self.last_sgoals)
    }

    /// One-line summary of the problem.
    pub fn problem_description(&self) -> String {
        let problem_type = if self.conformance {
            format!(
                "{} conformance refinement ({}) with sgoals range [{}-{}]",
                if self.complete_planning { "complete" } else { "partial" },
                self.conformance_type
                    .unwrap_or(ConformanceType::SimultaneousAchievement),
                self.first_sgoals,
                self.last_sgoals
            )
        } else {
            "classical".to_string()
        };
        format!(
            "Level [{}] : Concurrency {} : Problem type = {} : Minimum search length bound = {} with value = {}",
            self.level,
            if self.concurrency { "enabled" } else { "disabled" },
            problem_type,
            if self.use_search_length_bound { "enabled" } else { "disabled" },
            self.search_length_bound
        )
    }
}

impl fmt::Display for MonolevelProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.problem_description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refinement_problem() -> MonolevelProblem {
        MonolevelProblem {
            level: 1,
            concurrency: true,
            conformance: true,
            conformance_type: Some(ConformanceType::SequentialAchievement),
            first_sgoals: 3,
            last_sgoals: 5,
            start_step: 4,
            is_initial: false,
            is_final: false,
            complete_planning: false,
            sequential_yield: true,
            reactive_divisions: false,
            use_search_length_bound: false,
            search_length_bound: 6,
        }
    }

    #[test]
    fn test_sgoals_range() {
        let problem = refinement_problem();
        let range = problem.sgoals_range().unwrap();
        assert_eq!(range.problem_size(), 3);
        assert!(range.contains(5));
    }

    #[test]
    fn test_problem_description() {
        let description = refinement_problem().problem_description();
        assert!(description.contains("partial conformance refinement (sequential)"));
        assert!(description.contains("[3-5]"));
    }

    #[test]
    fn test_verbosity_order() {
        assert!(Verbosity::Verbose.shows_plans());
        assert!(!Verbosity::Simple.shows_plans());
        assert_eq!(Verbosity::default(), Verbosity::Simple);
    }
}
