//! Problem division: splitting a refinement problem into partial problems.
//!
//! - `Blend`: overlap between adjacent partial problems
//! - `DivisionPoint`: one boundary, proactive or reactive
//! - `DivisionScenario`: all boundaries over one abstract plan

mod blend;
mod point;
mod scenario;


pub use blend::{Blend, BlendQuantity};
pub use point::{Commitment, DivisionPoint, DivisionPointPair, SubGoalRange};
pub use scenario::DivisionScenario;
