//! Division points and sub-goal stage ranges.

use std::cmp::Ordering;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::Blend;
use crate::error::{PlanningError, Result};

/// An inclusive, contiguous range of sub-goal stage indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubGoalRange {
    first_index: u32,
    last_index: u32,
}

impl SubGoalRange {
    /// Creates a range, failing unless `1 <= first_index <= last_index`.
    pub fn new(first_index: u32, last_index: u32) -> Result<Self> {
        if first_index < 1 || first_index > last_index {
            return Err(PlanningError::InvalidArgument(format!(
                "sub-goal range must satisfy 1 <= first <= last, got [{}-{}]",
                first_index, last_index
            )));
        }
        Ok(Self {
            first_index,
            last_index,
        })
    }

    pub fn first_index(&self) -> u32 {
        self.first_index
    }

    pub fn last_index(&self) -> u32 {
        self.last_index
    }

    /// Number of sub-goal stages in the range.
    pub fn problem_size(&self) -> u32 {
        self.last_index - self.first_index + 1
    }

    pub fn contains(&self, index: u32) -> bool {
        (self.first_index..=self.last_index).contains(&index)
    }

    pub fn indices(&self) -> RangeInclusive<u32> {
        self.first_index..=self.last_index
    }
}

impl fmt::Display for SubGoalRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.first_index, self.last_index)
    }
}

/// The sub-goal stage index and search step current when a continuous
/// division was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub index: u32,
    pub step: u32,
}

/// A boundary between two partial problems.
///
/// `index` is the sub-goal stage index current at the moment of division; the
/// next partial problem starts at `index + 1`. Proactive points have no
/// `reactive` step. Interrupting points are always reactive.
///
/// Ordering and equality ignore the blend and commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "DivisionPointRecord")]
pub struct DivisionPoint {
    pub index: u32,
    #[serde(default)]
    pub blend: Blend,
    #[serde(default)]
    pub inherited: bool,
    #[serde(default)]
    pub reactive: Option<u32>,
    #[serde(default)]
    pub interrupting: bool,
    #[serde(default)]
    pub preemptive: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed: Option<Commitment>,
}

impl DivisionPoint {
    /// Creates a division point, rejecting interrupting points that are not reactive.
    pub fn new(
        index: u32,
        blend: Blend,
        inherited: bool,
        reactive: Option<u32>,
        interrupting: bool,
        preemptive: u32,
    ) -> Result<Self> {
        if interrupting && reactive.is_none() {
            return Err(PlanningError::InvalidArgument(format!(
                "interrupting divisions must be reactive, got index {}",
                index
            )));
        }
        Ok(Self {
            index,
            blend,
            inherited,
            reactive,
            interrupting,
            preemptive,
            committed: None,
        })
    }

    /// A proactive point with zero blend.
    pub fn proactive(index: u32) -> Self {
        Self {
            index,
            blend: Blend::default(),
            inherited: false,
            reactive: None,
            interrupting: false,
            preemptive: 0,
            committed: None,
        }
    }

    /// A point inherited from the bounds of the divided plan.
    pub fn inherited(index: u32) -> Self {
        Self {
            inherited: true,
            ..Self::proactive(index)
        }
    }

    /// A reactive point that ends the running search.
    pub fn interrupting(index: u32, step: u32) -> Self {
        Self {
            reactive: Some(step),
            interrupting: true,
            ..Self::proactive(index)
        }
    }

    /// A reactive point that fixes decided actions without ending the search.
    pub fn continuous(index: u32, step: u32) -> Self {
        Self {
            reactive: Some(step),
            ..Self::proactive(index)
        }
    }

    pub fn with_blend(mut self, blend: Blend) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_preemptive(mut self, preemptive: u32) -> Self {
        self.preemptive = preemptive;
        self
    }

    pub fn with_commitment(mut self, index: u32, step: u32) -> Self {
        self.committed = Some(Commitment { index, step });
        self
    }

    /// Whether this point was chosen before search began.
    pub fn is_proactive(&self) -> bool {
        self.reactive.is_none()
    }

    /// Whether this point separates two partial problems.
    pub fn is_shifting(&self) -> bool {
        self.is_proactive() || self.interrupting
    }

    /// First index of the partial problem to the right of this point.
    ///
    /// Unless `ignore_blend` is set, the left blend (resolved against the
    /// previous problem's unblended size) pulls the start back.
    pub fn index_when_left_point(&self, previous_problem_size: u32, ignore_blend: bool) -> u32 {
        if ignore_blend {
            return self.index + 1;
        }
        (self.index + 1).saturating_sub(self.blend.get_left(previous_problem_size))
    }

    /// Last index of the partial problem to the left of this point.
    ///
    /// Unless `ignore_blend` is set, the right blend (resolved against the
    /// next problem's unblended size) pushes the end forward.
    pub fn index_when_right_point(&self, next_problem_size: u32, ignore_blend: bool) -> u32 {
        if ignore_blend {
            return self.index;
        }
        self.index + self.blend.get_right(next_problem_size)
    }

    fn sort_key(&self) -> (u32, bool, Option<u32>, bool, u32) {
        (
            self.index,
            self.inherited,
            self.reactive,
            self.interrupting,
            self.preemptive,
        )
    }
}

impl PartialEq for DivisionPoint {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for DivisionPoint {}

impl PartialOrd for DivisionPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DivisionPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for DivisionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(Index = {}, Blend = {}, Inherited = {}, Type = {}",
            self.index,
            self.blend,
            self.inherited,
            if self.is_proactive() { "proactive" } else { "reactive" }
        )?;
        if let Some(step) = self.reactive {
            write!(
                f,
                ", Step = {}, Interrupting = {}, Preemptive = {}",
                step, self.interrupting, self.preemptive
            )?;
        }
        write!(f, ")")
    }
}

#[derive(Deserialize)]
struct DivisionPointRecord {
    index: u32,
    #[serde(default)]
    blend: Blend,
    #[serde(default)]
    inherited: bool,
    #[serde(default)]
    reactive: Option<u32>,
    #[serde(default)]
    interrupting: bool,
    #[serde(default)]
    preemptive: u32,
    #[serde(default)]
    committed: Option<Commitment>,
}

impl TryFrom<DivisionPointRecord> for DivisionPoint {
    type Error = PlanningError;

    fn try_from(record: DivisionPointRecord) -> Result<Self> {
        let mut point = DivisionPoint::new(
            record.index,
            record.blend,
            record.inherited,
            record.reactive,
            record.interrupting,
            record.preemptive,
        )?;
        point.committed = record.committed;
        Ok(point)
    }
}

/// The left and right division points bounding one partial problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionPointPair {
    pub left: DivisionPoint,
    pub right: DivisionPoint,
}
