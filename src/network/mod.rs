//! Composition harnesses: wiring many machines together.
//!
//! Machines never share memory; they exchange values exclusively through
//! directional FIFO [`port`]s. On top of that, two wiring patterns:
//!
//! - [`pipeline`]: a ring of machines where each one's output feeds the
//!   next's input, plus the exhaustive phase-setting search over it
//! - [`star`]: an addressed many-to-one topology routed through a switch,
//!   with a monitor breaking network-wide deadlock
//!
//! # Modules
//!
//! - [`errors`]: harness error types
//! - [`node`]: push-model driver running one machine per async task
//! - [`pipeline`]: feedback-loop composition and the signal search
//! - [`port`]: the unbounded FIFO port pair
//! - [`star`]: switch, monitor, and the star-network run loop

pub mod errors;
pub mod node;
pub mod pipeline;
pub mod port;
pub mod star;
