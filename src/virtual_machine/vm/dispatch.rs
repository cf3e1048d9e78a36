//! Opcode jump table.
//!
//! Every one of the 256 byte values maps to a handler. Bytes that are not in
//! the opcode table map to [`VM::op_undefined`], so the fetch loop indexes the
//! table directly with no range check or fallback branch.

use super::VM;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;

/// Outcome of a successfully executed instruction.
#[derive(Debug, Eq, PartialEq)]
pub(super) enum Step {
    /// Fetch the next instruction.
    Continue,
    /// Halt and yield the returned bytes.
    Return(Vec<u8>),
}

/// Instruction handler. The program counter points just past the opcode byte.
pub(super) type Handler = fn(&mut VM) -> Result<Step, VMError>;

pub(super) type JumpTable = [Handler; 256];

macro_rules! jump_table {
    ( $( $variant:ident => $handler:ident ),* $(,)? ) => {
        const fn new_instruction_set() -> JumpTable {
            let mut table: JumpTable = [VM::op_undefined as Handler; 256];
            $( table[Opcode::$variant as usize] = VM::$handler; )*
            table
        }

        // Fails to compile if an opcode is missing from the table.
        #[allow(dead_code)]
        fn assert_every_opcode_mapped(op: Opcode) {
            match op {
                $( Opcode::$variant => (), )*
            }
        }
    };
}

jump_table! {
    // Stack
    Pop => op_pop,
    Push1 => op_push1,
    Push8 => op_push8,
    // Arithmetic
    Add => op_add,
    Sub => op_sub,
    Mul => op_mul,
    Div => op_div,
    // Memory
    Store1 => op_store1,
    Store8 => op_store8,
    Load8 => op_load8,
    // Control
    Return => op_return,
}

pub(super) static JUMP_TABLE: JumpTable = new_instruction_set();
