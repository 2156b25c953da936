//! A small virtual machine for programs encoded as flat sequences of signed
//! 64-bit integers, together with the orchestration patterns for composing
//! many machine instances: pipelined feedback loops and an addressed star
//! network with idle detection.
//!
//! - [`vm`]: memory, instruction set, and the suspend/resume machine core
//! - [`network`]: ports, push-model node driver, and composition harnesses
//! - [`utils`]: leveled colored logging

pub mod network;
pub mod utils;
pub mod vm;

pub use network::errors::HarnessError;
pub use vm::errors::{ExecError, ProgramError};
pub use vm::machine::{Machine, Status, StepResult};
pub use vm::program::Program;
