//! Composition-harness error types.

use thiserror::Error;

use crate::vm::errors::ExecError;

/// Errors surfaced by the composition harnesses.
///
/// Member-machine failures are never swallowed: the pipeline treats them as
/// fatal for the whole composition, while the star network isolates the
/// failed node and reports it in the
/// [`NetworkReport`](crate::network::star::NetworkReport).
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A member machine failed with a fatal execution error.
    #[error("machine at address {address} failed: {source}")]
    NodeFailed {
        address: i64,
        #[source]
        source: ExecError,
    },

    /// Every live machine is blocked on input and none can make progress.
    #[error("composition stalled: all machines blocked on input")]
    Stalled,

    /// The run or search completed without producing a result. Distinct
    /// from a machine error: nothing failed, there is just no answer.
    #[error("no solution")]
    NoSolution,
}
