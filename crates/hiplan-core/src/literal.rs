//! Typed literal records extracted from solved models.
//!
//! Every record carries its abstraction level; fluents and actions are placed at a
//! plan step, sub-goals at the sub-goal stage index they belong to.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A state variable assignment holding at a step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fluent {
    pub level: u32,
    pub fluent: String,
    pub value: String,
    pub step: u32,
}

impl Fluent {
    pub fn new(level: u32, fluent: impl Into<String>, value: impl Into<String>, step: u32) -> Self {
        Self {
            level,
            fluent: fluent.into(),
            value: value.into(),
            step,
        }
    }
}

impl fmt::Display for Fluent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "holds({}, {}, {}, {})",
            self.level, self.fluent, self.value, self.step
        )
    }
}

/// An action planned for a robot at a step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Action {
    pub level: u32,
    pub robot: String,
    pub action: String,
    pub step: u32,
}

impl Action {
    pub fn new(level: u32, robot: impl Into<String>, action: impl Into<String>, step: u32) -> Self {
        Self {
            level,
            robot: robot.into(),
            action: action.into(),
            step,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "occurs({}, {}, {}, {})",
            self.level, self.robot, self.action, self.step
        )
    }
}

/// A goal literal produced by the effects of an abstract action.
///
/// Sub-goals sharing an `index` form one sub-goal stage. The index is the step of
/// the producing action in the abstract plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubGoal {
    pub level: u32,
    pub robot: String,
    pub action: String,
    pub fluent: String,
    pub value: String,
    pub index: u32,
}

impl SubGoal {
    pub fn new(
        level: u32,
        robot: impl Into<String>,
        action: impl Into<String>,
        fluent: impl Into<String>,
        value: impl Into<String>,
        index: u32,
    ) -> Self {
        Self {
            level,
            robot: robot.into(),
            action: action.into(),
            fluent: fluent.into(),
            value: value.into(),
            index,
        }
    }
}

impl fmt::Display for SubGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sub_goal({}, {}, {}, {}, {}, {})",
            self.level, self.robot, self.action, self.fluent, self.value, self.index
        )
    }
}

/// A literal of the final goal at a level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FinalGoal {
    pub level: u32,
    pub fluent: String,
    pub value: String,
    pub truth: bool,
}

impl FinalGoal {
    pub fn new(level: u32, fluent: impl Into<String>, value: impl Into<String>, truth: bool) -> Self {
        Self {
            level,
            fluent: fluent.into(),
            value: value.into(),
            truth,
        }
    }
}

impl fmt::Display for FinalGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "final_goal({}, {}, {}, {})",
            self.level, self.fluent, self.value, self.truth
        )
    }
}

/// A `(level, index, step)` fact relating a sub-goal stage index to a plan step.
///
/// Used both for "index is current at step" and "index was achieved at step".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexStep {
    pub level: u32,
    pub index: u32,
    pub step: u32,
}

impl IndexStep {
    pub fn new(level: u32, index: u32, step: u32) -> Self {
        Self { level, index, step }
    }
}

/// Groups literals into a step (or index) keyed map, preserving encounter order.
pub fn group_by<T: Clone>(items: &[T], key: impl Fn(&T) -> u32) -> BTreeMap<u32, Vec<T>> {
    let mut grouped: BTreeMap<u32, Vec<T>> = BTreeMap::new();
    for item in items {
        grouped.entry(key(item)).or_default().push(item.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_step() {
        let actions = vec![
            Action::new(1, "talos", "move(a)", 2),
            Action::new(1, "talos", "grasp(b)", 1),
            Action::new(1, "tiago", "move(c)", 2),
        ];
        let grouped = group_by(&actions, |a| a.step);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&1].len(), 1);
        assert_eq!(grouped[&2][1].robot, "tiago");
    }

    #[test]
    fn test_display() {
        let sgoal = SubGoal::new(2, "talos", "move(a)", "in(talos)", "room_a", 3);
        assert_eq!(
            sgoal.to_string(),
            "sub_goal(2, talos, move(a), in(talos), room_a, 3)"
        );
    }
}
