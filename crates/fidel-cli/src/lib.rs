//! Command implementations behind the `fidel` binary.

pub mod commands;
pub mod trace_init;
