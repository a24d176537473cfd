//! Error types for PuzzleForge

use thiserror::Error;

/// Main error type for PuzzleForge operations.
///
/// Variants split into two families. Authoring defects (`Schema`, `Parse`,
/// `Replay`, `Io`) are fatal and must never be retried. Everything else is a
/// sampling or solving outcome that a fresh generation attempt may avoid; see
/// [`PuzzleError::is_recoverable`].
#[derive(Debug, Error)]
pub enum PuzzleError {
    /// The specification document violates a structural invariant.
    #[error("Schema validation error at `{field}`: {message}")]
    Schema { field: String, message: String },

    /// An expression or description template failed to parse.
    #[error("Parse error at {position} in `{source_text}`: {message}")]
    Parse {
        source_text: String,
        position: usize,
        message: String,
    },

    /// Evaluating an expression failed at runtime.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// The sampler could not produce a valid selection within its budget.
    #[error("Random generation failed for {context}: {message}")]
    RandomGeneration { context: String, message: String },

    /// The active condition set is unsatisfiable.
    #[error("No solution satisfies the constraints ({context})")]
    NoSolution { context: String },

    /// Enumeration exceeded the configured maximum.
    #[error("Found {found} solutions, which exceeds the maximum allowed ({limit})")]
    TooManySolutions { found: usize, limit: usize },

    /// An open-ended query answer failed its assertion.
    #[error("Answer assertion failed for query `{query}`: {message}")]
    AnswerAssertion { query: String, message: String },

    /// Two distinct assignments reach the same optimal objective value.
    #[error("Objective `{objective}` has multiple optimal solutions with value {value}")]
    AmbiguousOptimum { objective: String, value: String },

    /// The constraint solver gave up (time or node limit).
    #[error("Solver returned unknown during {phase}: {reason}")]
    SolverUnknown { phase: String, reason: String },

    /// A recorded configuration does not fit the specification.
    #[error("Replay error: {0}")]
    Replay(String),

    /// I/O failure while reading or writing documents.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PuzzleError {
    pub fn schema(field: impl Into<String>, message: impl Into<String>) -> Self {
        PuzzleError::Schema {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn eval(message: impl Into<String>) -> Self {
        PuzzleError::Evaluation(message.into())
    }

    pub fn random(context: impl Into<String>, message: impl Into<String>) -> Self {
        PuzzleError::RandomGeneration {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn replay(message: impl Into<String>) -> Self {
        PuzzleError::Replay(message.into())
    }

    /// Returns true when regenerating the whole puzzle instance may succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PuzzleError::Schema { .. }
                | PuzzleError::Parse { .. }
                | PuzzleError::Replay(_)
                | PuzzleError::Io(_)
        )
    }

    /// Short stable name of the variant, used in logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            PuzzleError::Schema { .. } => "SchemaValidationError",
            PuzzleError::Parse { .. } => "ParseError",
            PuzzleError::Evaluation(_) => "EvaluationError",
            PuzzleError::RandomGeneration { .. } => "RandomGenerationError",
            PuzzleError::NoSolution { .. } => "NoSolutionError",
            PuzzleError::TooManySolutions { .. } => "TooManySolutionsError",
            PuzzleError::AnswerAssertion { .. } => "AnswerAssertionError",
            PuzzleError::AmbiguousOptimum { .. } => "AmbiguousOptimumError",
            PuzzleError::SolverUnknown { .. } => "SolverUnknownError",
            PuzzleError::Replay(_) => "ReplayError",
            PuzzleError::Io(_) => "IoError",
        }
    }
}

/// Result type alias for PuzzleForge operations
pub type Result<T> = std::result::Result<T, PuzzleError>;
