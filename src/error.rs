//! Error types for the tapec compiler

use std::fmt;
use thiserror::Error;

/// Which half of a loop pair is missing when the markers do not balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMarker {
    /// The loop-open marker
    Start,
    /// The loop-close marker
    End,
}

impl fmt::Display for LoopMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopMarker::Start => write!(f, "loop start"),
            LoopMarker::End => write!(f, "loop end"),
        }
    }
}

/// tapec compiler errors
#[derive(Error, Debug)]
pub enum Error {
    // Front-end errors
    /// Loop markers do not balance
    ///
    /// **Triggered by:** a loop-open with no matching loop-close before the end of
    /// the stream, or a loop-close with no open loop
    /// **Example:** `+[->+<` (missing loop end), `+]` (missing loop start)
    #[error("Unbalanced loop: missing {missing} for the marker at instruction {index}")]
    Structural {
        /// The marker kind that could not be found
        missing: LoopMarker,
        /// Index of the unmatched marker in the primitive stream
        index: usize,
    },

    /// Loops nest deeper than the compiler accepts
    ///
    /// **Triggered by:** more than
    /// [`MAX_LOOP_DEPTH`](crate::compiler::loop_analyzer::MAX_LOOP_DEPTH) loops
    /// open at once
    #[error("Loop nesting exceeds {limit} levels at instruction {index}")]
    NestingTooDeep {
        /// Index of the loop-open marker past the limit
        index: usize,
        /// The accepted depth
        limit: usize,
    },

    /// A source segment matches no entry of the token table
    ///
    /// **Triggered by:** text outside the vocabulary of a word-based language
    /// **Example:** `Ook. Ook? Eek!` with the Ook! table
    #[error("Unknown token '{segment}' at line {line}, column {column}")]
    UnknownToken {
        /// The offending text
        segment: String,
        /// Line number (1-indexed)
        line: usize,
        /// Column number (1-indexed)
        column: usize,
    },

    /// No token table could be resolved for the source
    #[error("Unsupported language: {name}")]
    UnsupportedLanguage {
        /// Language name or file extension that was requested
        name: String,
    },

    /// A language definition file is malformed
    ///
    /// **Triggered by:** a line without a separator, an unknown instruction
    /// name, a token or instruction declared twice, or an empty definition
    #[error("Invalid token table at line {line}: {message}")]
    InvalidTokenTable {
        /// Line number in the definition file (1-indexed, 0 for whole-file problems)
        line: usize,
        /// Error description
        message: String,
    },

    // Interpreter errors
    /// Cell access outside the tape
    #[error("Tape overflow: cell {address} is outside a tape of {size} cells")]
    TapeOverflow {
        /// The address that was accessed
        address: i64,
        /// Tape size in cells
        size: usize,
    },

    /// The interpreter ran out of its step budget
    #[error("Step limit of {limit} exceeded")]
    StepLimitExceeded {
        /// The configured limit
        limit: u64,
    },

    // Back-end errors
    /// A backend could not encode an operation
    #[error("Code generation error: {0}")]
    Codegen(String),
}

impl Error {
    /// Create a code generation error with a message
    pub fn codegen(msg: impl Into<String>) -> Self {
        Error::Codegen(msg.into())
    }

    /// Create a definition-file error for the given line
    pub fn token_table(line: usize, msg: impl Into<String>) -> Self {
        Error::InvalidTokenTable {
            line,
            message: msg.into(),
        }
    }
}

/// Result type for tapec operations
pub type Result<T> = std::result::Result<T, Error>;
