//! Integer virtual machine core.
//!
//! Programs are flat sequences of signed 64-bit words loaded into a growable
//! [`memory::Memory`] at address zero. The [`machine::Machine`] decodes one
//! instruction word per step, resolves parameters through three addressing
//! modes, and suspends cleanly on I/O so that many instances can be
//! multiplexed by the harnesses in [`network`](crate::network).
//!
//! # Modules
//!
//! - [`errors`]: execution and encoding error types
//! - [`isa`]: opcode table, addressing modes, instruction-word decoding
//! - [`machine`]: the machine state and its single authoritative `step`
//! - [`memory`]: growable zero-filled word store
//! - [`program`]: the comma-separated program encoding

pub mod errors;
pub mod isa;
pub mod machine;
pub mod memory;
pub mod program;
