//! Stack VM library.
//!
//! Provides a minimal stack-based bytecode virtual machine, its assembler,
//! and logging utilities shared by the command-line tools.

pub mod utils;
pub mod virtual_machine;
