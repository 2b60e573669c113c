//! Error taxonomy for mgsh
//!
//! Structural errors (misplaced keywords, invalid nesting, bad syntax) are
//! reported for the offending line and leave any open block in place so the
//! user can retype. Execution errors come out of a block run after the block
//! has already been torn down.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("'{keyword}' is not allowed here: {reason}")]
    MisplacedKeyword { keyword: String, reason: String },
    #[error("Control flow state mismatch: {0}")]
    StateMismatch(String),
    #[error("Invalid nesting: {0}")]
    InvalidNesting(String),
    #[error("The try block is empty")]
    EmptyTryBlock,
    #[error("Not iterable: {0}")]
    NotIterable(String),
    #[error("Variable '{0}' is already bound")]
    VariableAlreadyBound(String),
    #[error("Condition could not be resolved: {0}")]
    NullCondition(String),
    #[error("Condition did not resolve to a boolean: {0}")]
    ConditionNotBoolean(String),
    #[error("Index {index} is out of range for a list of {len} elements")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Transport failure: {0}")]
    TransportFailure(String),
    #[error("A block is already open ({0}); close it before opening another")]
    RedirectionAlreadyActive(String),
    #[error("Block replay nested deeper than {0} levels")]
    NestingTooDeep(usize),
    #[error("Operation failed: {0}")]
    OperationFailed(String),
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("A batch is already active")]
    BatchAlreadyActive,
    #[error("No active batch")]
    NoActiveBatch,
    #[error("Invalid macro name '{0}'")]
    InvalidMacroName(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub(crate) fn misplaced(keyword: &str, reason: impl Into<String>) -> Self {
        CliError::MisplacedKeyword {
            keyword: keyword.to_string(),
            reason: reason.into(),
        }
    }

    /// Structural errors keep the active block open; everything else ends it.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            CliError::MisplacedKeyword { .. }
                | CliError::InvalidNesting(_)
                | CliError::EmptyTryBlock
                | CliError::RedirectionAlreadyActive(_)
                | CliError::Parse(_)
        )
    }
}
