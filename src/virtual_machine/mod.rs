//! Stack-based bytecode virtual machine.
//!
//! The VM executes a flat byte sequence against a fixed-capacity operand
//! stack of 64-bit words and a byte-addressable memory, and yields the bytes
//! selected by its final `RETURN`.
//!
//! # Architecture
//!
//! - **Operand stack**: fixed capacity of `u64` words, checked on every push and pop
//! - **Memory**: byte-addressable, capacity fixed per instance, committed lazily in pages
//! - **Instruction format**: one opcode byte, optionally followed by a 1- or
//!   8-byte big-endian immediate
//! - **Dispatch**: a 256-entry jump table indexed by the opcode byte
//! - **Execution model**: straight-line; the program halts on `RETURN`, at the
//!   end of the bytecode, or on the first error
//!
//! # Modules
//!
//! - [`assembler`]: Assembly parsing, diagnostics, bytecode generation and disassembly
//! - [`config`]: Stack and memory capacities
//! - [`errors`]: Assembly, configuration and execution error types
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`output`]: Decoding of returned bytes
//! - [`vm`]: Core virtual machine implementation

pub mod assembler;
pub mod config;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod output;
pub mod vm;
