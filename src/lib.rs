//! Assembly instruction simulator.
//!
//! Parses a small assembly dialect, executes it over a register file and a
//! bounded operand stack, and emits a JSON trace of every executed step.

pub mod utils;
pub mod virtual_machine;
