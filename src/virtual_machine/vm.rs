//! Core virtual machine implementation.
//!
//! The VM executes bytecode against a fixed-capacity operand stack of 64-bit
//! words and a byte-addressable memory. Instructions are dispatched through a
//! 256-entry jump table indexed by the opcode byte. All arithmetic wraps
//! modulo 2^64.
//!
//! # Operand order
//!
//! Binary instructions pop the top word as the right-hand operand and the word
//! below it as the left-hand operand: `PUSH1 5; PUSH1 3; SUB` leaves `2`, and
//! `PUSH1 6; PUSH1 3; DIV` leaves `2`.
//!
//! # Failure model
//!
//! Each handler checks its preconditions (operand count, immediate length,
//! memory bounds, divisor) before mutating anything. When a handler fails, the
//! program counter is rewound to the failing opcode, so the VM is observed
//! exactly as it was before that instruction.

mod dispatch;
mod memory;
mod stack;

use crate::virtual_machine::config::VmConfig;
use crate::virtual_machine::errors::VMError;
use dispatch::{JUMP_TABLE, Step};
use memory::Memory;
use stack::Stack;

/// Why the last [`VM::run`] stopped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Halt {
    /// A `RETURN` instruction executed.
    Returned,
    /// The program counter reached the end of the bytecode.
    Exhausted,
    /// An instruction failed.
    Faulted,
}

/// Externally observable execution state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// Bytecode is loaded and has not been run to a halt since.
    Ready,
    /// The last run halted.
    Halted(Halt),
}

/// Stack-based bytecode virtual machine.
///
/// Stack and memory are allocated once per instance and survive
/// [`load`](VM::load), so consecutive programs can hand data to each other
/// through memory. Use [`reset`](VM::reset) or [`run_fresh`](VM::run_fresh)
/// to start from a clean state.
pub struct VM {
    /// Bytecode to execute.
    bytecode: Vec<u8>,
    /// Program counter (index of the next byte to decode).
    pc: usize,
    /// Operand stack.
    stack: Stack,
    /// Byte-addressable memory.
    memory: Memory,
    config: VmConfig,
    status: Status,
}

impl VM {
    /// Creates a VM with the given capacities and no bytecode.
    ///
    /// Returns [`VMError::InvalidConfig`] if a capacity is out of range.
    pub fn new(config: VmConfig) -> Result<Self, VMError> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: VmConfig) -> Self {
        Self {
            bytecode: Vec::new(),
            pc: 0,
            stack: Stack::new(config.stack_capacity),
            memory: Memory::new(config.memory_capacity),
            config,
            status: Status::Ready,
        }
    }

    /// Replaces the bytecode and rewinds the program counter.
    ///
    /// Stack and memory are kept.
    pub fn load(&mut self, bytecode: impl Into<Vec<u8>>) {
        self.bytecode = bytecode.into();
        self.pc = 0;
        self.status = Status::Ready;
    }

    /// Empties the stack, discards memory contents and rewinds the program
    /// counter. The loaded bytecode is kept.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.memory.clear();
        self.pc = 0;
        self.status = Status::Ready;
    }

    /// Resets the VM, loads `bytecode` and runs it.
    pub fn run_fresh(&mut self, bytecode: impl Into<Vec<u8>>) -> Result<Vec<u8>, VMError> {
        self.reset();
        self.load(bytecode);
        self.run()
    }

    /// Executes from the current program counter until the program halts.
    ///
    /// Returns the bytes selected by `RETURN`, or an empty vector when the
    /// bytecode runs out without one. On error no output is produced.
    pub fn run(&mut self) -> Result<Vec<u8>, VMError> {
        while self.pc < self.bytecode.len() {
            let opcode_offset = self.pc;
            let opcode = self.bytecode[opcode_offset];
            self.pc += 1;

            match JUMP_TABLE[opcode as usize](self) {
                Ok(Step::Continue) => {}
                Ok(Step::Return(output)) => {
                    self.status = Status::Halted(Halt::Returned);
                    return Ok(output);
                }
                Err(err) => {
                    self.pc = opcode_offset;
                    self.status = Status::Halted(Halt::Faulted);
                    crate::warn!("vm fault at offset {opcode_offset}: {err}");
                    return Err(err);
                }
            }
        }

        self.status = Status::Halted(Halt::Exhausted);
        Ok(Vec::new())
    }

    /// Live stack words, bottom first.
    pub fn stack(&self) -> &[u64] {
        self.stack.as_slice()
    }

    /// Offset of the next instruction, or of the faulting one after an error.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// The loaded program.
    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    /// Capacities this VM was built with.
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Whether the last run is still going or how it halted.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Copies `len` bytes of memory starting at `offset`.
    pub fn read_memory(&self, offset: u64, len: u64) -> Result<Vec<u8>, VMError> {
        self.memory.slice(offset, len)
    }

    /// Writes `data` into memory at `offset`, e.g. to pass input to a program.
    pub fn write_memory(&mut self, offset: u64, data: &[u8]) -> Result<(), VMError> {
        self.memory.write(offset, data)
    }

    /// Reads an `N`-byte immediate following the opcode and advances the
    /// program counter past it.
    fn read_immediate<const N: usize>(&mut self) -> Result<[u8; N], VMError> {
        let start = self.pc;
        let slice = start
            .checked_add(N)
            .and_then(|end| self.bytecode.get(start..end))
            .ok_or(VMError::UnexpectedEndOfBytecode {
                ip: start,
                requested: N,
                available: self.bytecode.len().saturating_sub(start),
            })?;

        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pc = start + N;
        Ok(out)
    }

    /// Pops `a` (next from top) and `b` (top) and pushes `f(a, b)`.
    fn binary_op(&mut self, f: fn(u64, u64) -> u64) -> Result<Step, VMError> {
        let (a, b) = self.stack.pop2()?;
        self.stack.push(f(a, b))?;
        Ok(Step::Continue)
    }

    fn op_undefined(&mut self) -> Result<Step, VMError> {
        let offset = self.pc - 1;
        Err(VMError::UndefinedOpcode {
            opcode: self.bytecode[offset],
            offset,
        })
    }

    fn op_pop(&mut self) -> Result<Step, VMError> {
        self.stack.pop()?;
        Ok(Step::Continue)
    }

    fn op_push1(&mut self) -> Result<Step, VMError> {
        let [value] = self.read_immediate::<1>()?;
        self.stack.push(value as u64)?;
        Ok(Step::Continue)
    }

    fn op_push8(&mut self) -> Result<Step, VMError> {
        let bytes = self.read_immediate::<8>()?;
        self.stack.push(u64::from_be_bytes(bytes))?;
        Ok(Step::Continue)
    }

    fn op_add(&mut self) -> Result<Step, VMError> {
        self.binary_op(u64::wrapping_add)
    }

    fn op_sub(&mut self) -> Result<Step, VMError> {
        self.binary_op(u64::wrapping_sub)
    }

    fn op_mul(&mut self) -> Result<Step, VMError> {
        self.binary_op(u64::wrapping_mul)
    }

    fn op_div(&mut self) -> Result<Step, VMError> {
        self.stack.require(2)?;
        if self.stack.peek(0)? == 0 {
            return Err(VMError::DivisionByZero);
        }
        self.binary_op(u64::wrapping_div)
    }

    fn op_store1(&mut self) -> Result<Step, VMError> {
        self.stack.require(2)?;
        let offset = self.stack.peek(0)?;
        let value = self.stack.peek(1)?;
        self.memory.write(offset, &[value as u8])?;
        self.stack.pop2()?;
        Ok(Step::Continue)
    }

    fn op_store8(&mut self) -> Result<Step, VMError> {
        self.stack.require(2)?;
        let offset = self.stack.peek(0)?;
        let value = self.stack.peek(1)?;
        self.memory.write_u64(offset, value)?;
        self.stack.pop2()?;
        Ok(Step::Continue)
    }

    fn op_load8(&mut self) -> Result<Step, VMError> {
        let offset = self.stack.peek(0)?;
        let value = self.memory.read_u64(offset)?;
        self.stack.replace_top(value)?;
        Ok(Step::Continue)
    }

    fn op_return(&mut self) -> Result<Step, VMError> {
        self.stack.require(2)?;
        let offset = self.stack.peek(0)?;
        let size = self.stack.peek(1)?;
        let output = self.memory.slice(offset, size)?;
        self.stack.pop2()?;
        Ok(Step::Return(output))
    }
}

impl Default for VM {
    /// A VM with 32 stack words and 64 KiB of memory.
    fn default() -> Self {
        Self::with_config(VmConfig::default())
    }
}
