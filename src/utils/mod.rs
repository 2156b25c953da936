//! Shared utilities.
//!
//! - [`log`]: leveled colored logging and the `debug!`/`info!`/`warn!`/
//!   `error!` macros

pub mod log;
