//! Execution and program-encoding error types.

use thiserror::Error;

/// Errors that can occur while a [`Machine`](crate::vm::machine::Machine)
/// executes.
///
/// Every variant is terminal for the offending machine: the machine halts
/// irrecoverably before the error is returned, and nothing is retried
/// internally. Harnesses decide whether a member failure is fatal for the
/// whole composition, but they never swallow it.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Unrecognized opcode or addressing-mode digit in an instruction word.
    #[error("invalid instruction word {word} at address {addr}")]
    InvalidInstruction { word: i64, addr: i64 },

    /// A destination parameter used Immediate mode.
    #[error("immediate-mode write target in word {word} at address {addr}")]
    InvalidWriteTarget { word: i64, addr: i64 },

    /// An effective memory address resolved below zero.
    #[error("negative memory address {addr}")]
    NegativeAddress { addr: i64 },

    /// A push-model read found no buffered value and no supplying port.
    #[error("no input available")]
    NoInputAvailable,

    /// A blocking read was cancelled from outside: the port it was waiting
    /// on was torn down.
    #[error("cancelled while blocked on a port")]
    Cancelled,
}

/// Errors produced while decoding the comma-separated program encoding.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// A field was not a base-10 signed integer.
    #[error("invalid word at position {index}: {source}")]
    InvalidWord {
        index: usize,
        source: std::num::ParseIntError,
    },

    /// The encoding contained no words at all.
    #[error("empty program")]
    Empty,
}
