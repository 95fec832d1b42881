//! Division scenarios: how one abstract plan is split into partial refinement problems.

use std::fmt;
use std::ops::RangeInclusive;

use serde::Serialize;

use super::{Blend, BlendQuantity, DivisionPoint, DivisionPointPair, SubGoalRange};
use crate::error::{PlanningError, Result};
use crate::plan::MonolevelPlan;

/// An ordered sequence of division points over the sub-goal stages of one
/// abstract plan.
///
/// The shifting points partition `[first_index, last_index]` into
/// `total_problems()` partial problems, numbered from
/// `previously_solved_problems + 1`. Continuous reactive points are kept in the
/// sequence but do not start a new problem.
#[derive(Debug, Clone, Serialize)]
pub struct DivisionScenario {
    divided_abstract_plan: MonolevelPlan,
    points: Vec<DivisionPoint>,
    previously_solved_problems: u32,
}

impl DivisionScenario {
    /// Creates a scenario, sorting the points by index.
    ///
    /// Fails if the plan is empty or has fewer steps than the problems the
    /// points would define.
    pub fn new(
        divided_abstract_plan: MonolevelPlan,
        mut points: Vec<DivisionPoint>,
        previously_solved_problems: u32,
    ) -> Result<Self> {
        let plan_length = divided_abstract_plan.plan_length();
        if plan_length == 0 {
            return Err(PlanningError::InvalidArgument(
                "cannot divide an empty plan".to_string(),
            ));
        }
        if points.len() as u32 + 1 > plan_length {
            return Err(PlanningError::InvalidArgument(format!(
                "{} division points define more problems than the {} steps of the divided plan",
                points.len(),
                plan_length
            )));
        }
        points.sort();
        Ok(Self {
            divided_abstract_plan,
            points,
            previously_solved_problems,
        })
    }

    pub fn divided_abstract_plan(&self) -> &MonolevelPlan {
        &self.divided_abstract_plan
    }

    /// Problems solved at the level below before this scenario applied.
    pub fn previously_solved_problems(&self) -> u32 {
        self.previously_solved_problems
    }

    pub fn points(&self) -> &[DivisionPoint] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &DivisionPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether any point divides at `index`.
    pub fn contains_index(&self, index: u32) -> bool {
        self.points.iter().any(|point| point.index == index)
    }

    /// Number of division points, optionally counting only shifting ones.
    pub fn get_total_divisions(&self, shifting_only: bool) -> u32 {
        self.points
            .iter()
            .filter(|point| !shifting_only || point.is_shifting())
            .count() as u32
    }

    pub fn total_problems(&self) -> u32 {
        self.get_total_divisions(true) + 1
    }

    /// Numbers of the partial problems this scenario defines.
    pub fn problem_range(&self) -> RangeInclusive<u32> {
        self.previously_solved_problems + 1..=self.previously_solved_problems + self.total_problems()
    }

    /// First divided sub-goal stage index; the divided plan's first action step.
    pub fn first_index(&self) -> u32 {
        self.divided_abstract_plan.start_step() + 1
    }

    pub fn last_index(&self) -> u32 {
        self.divided_abstract_plan.end_step()
    }

    /// The division points, optionally only shifting ones, optionally
    /// bracketed by inherited points at the first and last index.
    pub fn get_division_points(
        &self,
        shifting_only: bool,
        fabricate_inherited: bool,
    ) -> Vec<DivisionPoint> {
        let mut points: Vec<DivisionPoint> = Vec::with_capacity(self.points.len() + 2);
        if fabricate_inherited {
            points.push(DivisionPoint::inherited(self.first_index()));
        }
        points.extend(
            self.points
                .iter()
                .filter(|point| !shifting_only || point.is_shifting())
                .cloned(),
        );
        if fabricate_inherited {
            points.push(DivisionPoint::inherited(self.last_index()));
        }
        points
    }

    /// The points bounding a partial problem; the scenario's ends are
    /// represented by inherited points.
    pub fn get_division_point_pair(&self, problem_number: u32) -> Result<DivisionPointPair> {
        let (first, last) = self.check_problem_number(problem_number)?;
        let shifting = self.get_division_points(true, false);
        let offset = (problem_number - first) as usize;

        let left = if problem_number > first {
            shifting[offset - 1].clone()
        } else {
            DivisionPoint::inherited(self.first_index())
        };
        let right = if problem_number < last {
            shifting[offset].clone()
        } else {
            DivisionPoint::inherited(self.last_index())
        };
        Ok(DivisionPointPair { left, right })
    }

    /// The sub-goal stage indices of a partial problem.
    ///
    /// Blends are resolved pairwise: a point's left blend against the unblended
    /// size of the problem before it, its right blend against the unblended
    /// size of the problem after it.
    pub fn get_subgoals_indices_range(
        &self,
        problem_number: u32,
        ignore_blend: bool,
    ) -> Result<SubGoalRange> {
        let (first, last) = self.check_problem_number(problem_number)?;
        let shifting = self.get_division_points(true, false);
        let offset = (problem_number - first) as usize;

        let mut first_index = self.first_index();
        let mut last_index = self.last_index();

        if problem_number > first {
            let left = &shifting[offset - 1];
            first_index = if ignore_blend {
                left.index_when_left_point(0, true)
            } else {
                let previous_size = self
                    .get_subgoals_indices_range(problem_number - 1, true)?
                    .problem_size();
                left.index_when_left_point(previous_size, false)
                    .max(self.first_index())
            };
        }
        if problem_number < last {
            let right = &shifting[offset];
            last_index = if ignore_blend {
                right.index_when_right_point(0, true)
            } else {
                let next_size = self
                    .get_subgoals_indices_range(problem_number + 1, true)?
                    .problem_size();
                right.index_when_right_point(next_size, false)
                    .min(self.last_index())
            };
        }
        SubGoalRange::new(first_index, last_index)
    }

    /// Inserts a reactive division made while searching this scenario's
    /// problems.
    ///
    /// Continuous points are inserted as they are. For an interrupting point:
    /// * with `prevent_blending_over_reactive`, the left blend of the next
    ///   point is trimmed so it stops short of the new point;
    /// * if the new point lies inside the right blend of the previous point,
    ///   the search already passed that point, so the previous point is
    ///   replaced by the new one, carrying the larger of both blends when
    ///   `translate_blends` is set.
    pub fn update_reactively(
        &mut self,
        point: DivisionPoint,
        prevent_blending_over_reactive: bool,
        translate_blends: bool,
    ) -> Result<()> {
        if point.reactive.is_none() {
            return Err(PlanningError::InvalidArgument(format!(
                "division point must be reactive, got {}",
                point
            )));
        }
        if !point.blend.is_zero() {
            return Err(PlanningError::InvalidArgument(format!(
                "cannot insert a reactive division with a non-zero blend, got {}",
                point
            )));
        }
        if self.contains_index(point.index) {
            return Err(PlanningError::InvalidArgument(format!(
                "duplicate division point inserted, got {}",
                point
            )));
        }

        let last_index = self.last_index();
        let position = match self.points.iter().position(|p| point.index < p.index) {
            Some(position) => position,
            None if point.index < last_index => self.points.len(),
            None => {
                return Err(PlanningError::InvalidArgument(format!(
                    "division point {} is not in the index range [{}-{}] of the scenario",
                    point,
                    self.first_index(),
                    last_index
                )))
            }
        };
        if point.index < self.first_index() {
            return Err(PlanningError::InvalidArgument(format!(
                "division point {} is not in the index range [{}-{}] of the scenario",
                point,
                self.first_index(),
                last_index
            )));
        }

        if !point.interrupting {
            self.points.insert(position, point);
            return Ok(());
        }

        // The problem being interrupted lies between the neighbouring shifting points.
        let problem_number = self.previously_solved_problems
            + 1
            + self.points[..position]
                .iter()
                .filter(|p| p.is_shifting())
                .count() as u32;
        let problem_size = self
            .get_subgoals_indices_range(problem_number, true)?
            .problem_size();

        if prevent_blending_over_reactive && position < self.points.len() {
            let next = &mut self.points[position];
            if next.index_when_left_point(problem_size, false) < point.index + 1 {
                let trimmed = BlendQuantity::Count(next.index - point.index - 1);
                next.blend = Blend {
                    left: trimmed,
                    right: next.blend.right,
                };
            }
        }

        if position > 0
            && self.points[position - 1].index_when_right_point(problem_size, false) > point.index
        {
            let previous = self.points.remove(position - 1);
            let replacement = if translate_blends {
                let blend = point.blend.max(&previous.blend);
                point.with_blend(blend)
            } else {
                point
            };
            self.points.insert(position - 1, replacement);
        } else {
            self.points.insert(position, point);
        }
        Ok(())
    }

    /// Divides a plan of `plan_length` steps into `partial_problems`
    /// contiguous groups of near-equal size.
    ///
    /// Small groups of `plan_length / partial_problems` stages come first,
    /// followed by groups one larger. Each point's blend is resolved against
    /// its neighbouring group sizes and never crosses into a non-adjacent group.
    ///
    /// # Example
    ///
    /// ```
    /// use hiplan_core::division::{Blend, DivisionScenario};
    ///
    /// let points = DivisionScenario::make_homogenous_divisions(4, 10, 0, Blend::default()).unwrap();
    /// let indices: Vec<u32> = points.iter().map(|p| p.index).collect();
    /// assert_eq!(indices, vec![2, 4, 7]);
    /// ```
    pub fn make_homogenous_divisions(
        partial_problems: u32,
        plan_length: u32,
        start_step: u32,
        blend: Blend,
    ) -> Result<Vec<DivisionPoint>> {
        if partial_problems < 1 || plan_length < 1 || partial_problems > plan_length {
            return Err(PlanningError::InvalidArgument(format!(
                "cannot divide a plan of length {} into {} partial problems",
                plan_length, partial_problems
            )));
        }

        let small_problems = partial_problems - plan_length % partial_problems;
        let small_size = plan_length / partial_problems;
        let size = |division: u32| match division {
            0 => 0,
            d if d <= small_problems => small_size,
            _ => small_size + 1,
        };

        let mut points = Vec::with_capacity(partial_problems as usize - 1);
        let mut current = start_step;
        for division in 1..partial_problems {
            let previous = current;
            current += size(division);
            let next = current + size(division + 1);

            let left = current
                - current
                    .saturating_sub(blend.get_left(current - previous))
                    .max(previous);
            let right = (current + blend.get_right(next - current)).min(next) - current;

            points.push(DivisionPoint::proactive(current).with_blend(Blend::new(left, right)));
        }
        Ok(points)
    }

    fn check_problem_number(&self, problem_number: u32) -> Result<(u32, u32)> {
        let range = self.problem_range();
        if !range.contains(&problem_number) {
            return Err(PlanningError::InvalidArgument(format!(
                "problem number {} is not in the range [{}-{}] of the division scenario",
                problem_number,
                range.start(),
                range.end()
            )));
        }
        Ok((*range.start(), *range.end()))
    }
}

impl fmt::Display for DivisionScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Divided plan : {}", self.divided_abstract_plan)?;
        write!(f, "Division points [total={}] : [", self.points.len())?;
        for (i, point) in self.points.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", point)?;
        }
        write!(f, "]")
    }
}
