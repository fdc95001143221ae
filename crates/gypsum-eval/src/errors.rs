use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("undefined variable {name} in {file}")]
    UndefinedVariable { name: String, file: String },

    #[error("command {command:?} (in {cwd}) exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        cwd: String,
        status: String,
        stderr: String,
    },

    #[error("command {command:?} (in {cwd}) did not finish within {timeout:?}")]
    CommandTimedOut {
        command: String,
        cwd: String,
        timeout: Duration,
    },

    #[error("unable to run command {command:?}: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("expansion of {input:?} in {file} did not settle after {limit} rounds")]
    ExpansionOverflow {
        input: String,
        file: String,
        limit: usize,
    },

    #[error("{input:?} in {file}: {message}")]
    InvalidExpansion {
        input: String,
        file: String,
        message: String,
    },

    #[error("invalid condition {condition:?} in {file}: {message}")]
    Condition {
        condition: String,
        file: String,
        message: String,
    },

    #[error("cannot merge {from} into {to} for key {key}")]
    MergeTypeMismatch {
        key: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("incompatible list policies {0} and {1}")]
    IncompatibleListPolicies(String, String),

    #[error("{key} in {name}: {message}")]
    InvalidFilter {
        name: String,
        key: String,
        message: String,
    },
}

impl EvalError {
    /// The taxonomy name reported to users.
    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::UndefinedVariable { .. } => "UndefinedVariableError",
            EvalError::CommandFailed { .. }
            | EvalError::CommandTimedOut { .. }
            | EvalError::CommandSpawn { .. } => "CommandEvaluationError",
            EvalError::ExpansionOverflow { .. } => "VariableExpansionOverflowError",
            EvalError::InvalidExpansion { .. } => "VariableExpansionError",
            EvalError::Condition { .. } => "ConditionError",
            EvalError::MergeTypeMismatch { .. } | EvalError::IncompatibleListPolicies(..) => {
                "MergeError"
            }
            EvalError::InvalidFilter { .. } => "ListFilterError",
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
