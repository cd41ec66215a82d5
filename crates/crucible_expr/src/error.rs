//! # Expression Error Types
//!
//! Everything that can go wrong between a program string and a typed value.

use thiserror::Error;

/// Errors raised while lexing, parsing or evaluating a program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// The program could not be tokenized.
    #[error("lex error at byte {offset}: {message}")]
    Lex {
        /// Byte offset of the offending character.
        offset: usize,
        /// What went wrong.
        message: String,
    },

    /// The token stream is not a valid program.
    #[error("parse error at byte {offset}: {message}")]
    Parse {
        /// Byte offset of the offending token.
        offset: usize,
        /// What went wrong.
        message: String,
    },

    /// An identifier has no binding in the evaluation scope.
    #[error("unbound reference: {0}")]
    Unbound(String),

    /// An operator or built-in received operands of the wrong kind.
    #[error("type error: {0}")]
    Type(String),

    /// Unknown built-in function or wrong arity.
    #[error("bad call: {0}")]
    BadCall(String),

    /// Integer overflow, division by zero, non-finite float.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// A value could not be coerced to the requested numeric kind.
    #[error("cannot convert {from} to {to}")]
    Conversion {
        /// Source kind.
        from: String,
        /// Requested kind.
        to: &'static str,
    },

    /// The program exceeded one of the configured evaluation limits.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
}

impl ExprError {
    pub(crate) fn lex(offset: usize, message: impl Into<String>) -> Self {
        Self::Lex {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            message: message.into(),
        }
    }
}

/// Result type for expression operations.
pub type ExprResult<T> = Result<T, ExprError>;
