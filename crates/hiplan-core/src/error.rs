//! Error types for hiplan

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error carried as the cause of a failed search.
pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// Main error type for planning operations
#[derive(Debug, Error)]
pub enum PlanningError {
    /// Malformed or out-of-domain caller arguments
    #[error("Invalid input: {message} (given: {given})")]
    InvalidInput { message: String, given: String },

    /// A precondition on planner state was violated
    #[error("Invalid planner state: {0}")]
    InvalidPlannerState(String),

    /// The search proved unsatisfiable, hit a limit, or failed in the engine
    #[error("No solution: {message}")]
    NoSolution {
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    /// An invariant maintained by the planner itself was broken
    #[error("Internal error: {0}")]
    Internal(String),

    /// A value type was constructed or queried with invalid arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl PlanningError {
    /// Creates an [`PlanningError::InvalidInput`] error.
    pub fn invalid_input(message: impl Into<String>, given: impl std::fmt::Display) -> Self {
        PlanningError::InvalidInput {
            message: message.into(),
            given: given.to_string(),
        }
    }

    /// Creates a [`PlanningError::NoSolution`] error without a cause.
    pub fn no_solution(message: impl Into<String>) -> Self {
        PlanningError::NoSolution {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a [`PlanningError::NoSolution`] error wrapping its cause.
    pub fn no_solution_from(
        message: impl Into<String>,
        source: impl Into<BoxedCause>,
    ) -> Self {
        PlanningError::NoSolution {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns true if the caller may retry the call with different limits.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlanningError::NoSolution { .. })
    }
}

/// Result type alias for planning operations
pub type Result<T> = std::result::Result<T, PlanningError>;
