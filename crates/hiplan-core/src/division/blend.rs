//! Blend quantities: the overlap between adjacent partial problems.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One side of a blend, either an absolute count of sub-goal stages or a
/// fraction of the adjacent partial problem's size.
///
/// Counts never go below zero and fractions are clamped to `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawQuantity", into = "RawQuantity")]
pub enum BlendQuantity {
    Count(u32),
    Fraction(f64),
}

impl BlendQuantity {
    /// Creates a count, clamping negative values to zero.
    pub fn count(value: i64) -> Self {
        BlendQuantity::Count(value.clamp(0, u32::MAX as i64) as u32)
    }

    /// Creates a fraction, clamping it into `[0.0, 1.0]`.
    pub fn fraction(value: f64) -> Self {
        if value.is_nan() {
            BlendQuantity::Fraction(0.0)
        } else {
            BlendQuantity::Fraction(value.clamp(0.0, 1.0))
        }
    }

    /// Resolves this quantity to a count given the adjacent problem's size.
    ///
    /// Fractions are multiplied by the size and truncated.
    pub fn resolve(&self, adjacent_problem_size: u32) -> u32 {
        match *self {
            BlendQuantity::Count(count) => count,
            BlendQuantity::Fraction(fraction) => (fraction * adjacent_problem_size as f64) as u32,
        }
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            BlendQuantity::Count(count) => count == 0,
            BlendQuantity::Fraction(fraction) => fraction == 0.0,
        }
    }

    /// The larger of two quantities of the same kind. A zero quantity yields
    /// to the other one; otherwise a count wins over a fraction since it
    /// does not depend on problem size.
    fn max(self, other: Self) -> Self {
        match (self, other) {
            (BlendQuantity::Count(a), BlendQuantity::Count(b)) => BlendQuantity::Count(a.max(b)),
            (BlendQuantity::Fraction(a), BlendQuantity::Fraction(b)) => {
                BlendQuantity::Fraction(a.max(b))
            }
            (quantity, other) if other.is_zero() => quantity,
            (quantity, other) if quantity.is_zero() => other,
            (count @ BlendQuantity::Count(_), _) | (_, count @ BlendQuantity::Count(_)) => count,
            (_, other) => other,
        }
    }
}

impl Default for BlendQuantity {
    fn default() -> Self {
        BlendQuantity::Count(0)
    }
}

impl From<u32> for BlendQuantity {
    fn from(value: u32) -> Self {
        BlendQuantity::Count(value)
    }
}

impl From<i32> for BlendQuantity {
    fn from(value: i32) -> Self {
        BlendQuantity::count(value as i64)
    }
}

impl From<i64> for BlendQuantity {
    fn from(value: i64) -> Self {
        BlendQuantity::count(value)
    }
}

impl From<f64> for BlendQuantity {
    fn from(value: f64) -> Self {
        BlendQuantity::fraction(value)
    }
}

impl fmt::Display for BlendQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlendQuantity::Count(count) => write!(f, "{}", count),
            BlendQuantity::Fraction(fraction) => write!(f, "{:.2}", fraction),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawQuantity {
    Count(i64),
    Fraction(f64),
}

impl From<RawQuantity> for BlendQuantity {
    fn from(raw: RawQuantity) -> Self {
        match raw {
            RawQuantity::Count(count) => BlendQuantity::count(count),
            RawQuantity::Fraction(fraction) => BlendQuantity::fraction(fraction),
        }
    }
}

impl From<BlendQuantity> for RawQuantity {
    fn from(quantity: BlendQuantity) -> Self {
        match quantity {
            BlendQuantity::Count(count) => RawQuantity::Count(count as i64),
            BlendQuantity::Fraction(fraction) => RawQuantity::Fraction(fraction),
        }
    }
}

/// Left and right blend quantities of a division point.
///
/// # Example
///
/// ```
/// use hiplan_core::division::Blend;
///
/// let blend = Blend::new(0.5, 2);
/// assert_eq!(blend.get_left(5), 2);
/// assert_eq!(blend.get_right(10), 2);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Blend {
    #[serde(default)]
    pub left: BlendQuantity,
    #[serde(default)]
    pub right: BlendQuantity,
}

impl Blend {
    pub fn new(left: impl Into<BlendQuantity>, right: impl Into<BlendQuantity>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// A blend with the same quantity on both sides.
    pub fn symmetric(quantity: impl Into<BlendQuantity>) -> Self {
        let quantity = quantity.into();
        Self {
            left: quantity,
            right: quantity,
        }
    }

    /// Number of stages the next problem reaches back into the previous one.
    pub fn get_left(&self, previous_problem_size: u32) -> u32 {
        self.left.resolve(previous_problem_size)
    }

    /// Number of stages the previous problem reaches forward into the next one.
    pub fn get_right(&self, next_problem_size: u32) -> u32 {
        self.right.resolve(next_problem_size)
    }

    pub fn is_zero(&self) -> bool {
        self.left.is_zero() && self.right.is_zero()
    }

    /// Side-wise maximum of two blends.
    pub fn max(&self, other: &Blend) -> Blend {
        Blend {
            left: self.left.max(other.left),
            right: self.right.max(other.right),
        }
    }
}

impl fmt::Display for Blend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(Left = {}, Right = {})", self.left, self.right)
    }
}
