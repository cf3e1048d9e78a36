//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical opcode table and invokes a callback macro for code generation, so
//! the engine, the assembler and the disassembler never duplicate it.
//!
//! This module generates:
//! - The [`Opcode`] enum with its byte values
//! - `TryFrom<u8>` for decoding opcodes and `FromStr` for mnemonics
//! - Mnemonic and immediate-width lookups
//!
//! # Bytecode Format
//!
//! Each instruction is one opcode byte optionally followed by one immediate:
//! - `Imm8`: 1 byte
//! - `Imm64`: 8 bytes, big-endian
//!
//! Instruction boundaries are not self-describing; a decoder relies on the
//! fixed width of each opcode's immediate.

use crate::virtual_machine::errors::VMError;
use std::fmt;
use std::str::FromStr;

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Stack
            // =========================
            /// POP ; discard the top word
            Pop = 0x00, "POP" => [],
            /// PUSH1 imm8 ; push a 1-byte immediate, zero-extended
            Push1 = 0x01, "PUSH1" => [value: Imm8],
            /// PUSH8 imm64 ; push an 8-byte big-endian immediate
            Push8 = 0x02, "PUSH8" => [value: Imm64],
            // =========================
            // Arithmetic (wrapping, unsigned)
            // =========================
            /// ADD ; a b -> a + b
            Add = 0x10, "ADD" => [],
            /// SUB ; a b -> a - b
            Sub = 0x11, "SUB" => [],
            /// MUL ; a b -> a * b
            Mul = 0x12, "MUL" => [],
            /// DIV ; a b -> a / b (fails on b == 0)
            Div = 0x13, "DIV" => [],
            // =========================
            // Memory
            // =========================
            /// STORE1 ; value offset -> ; memory[offset] = low byte of value
            Store1 = 0x20, "STORE1" => [],
            /// STORE8 ; value offset -> ; memory[offset..offset+8] = value (big-endian)
            Store8 = 0x21, "STORE8" => [],
            /// LOAD8 ; offset -> memory[offset..offset+8] (big-endian)
            Load8 = 0x22, "LOAD8" => [],
            // =========================
            // Control
            // =========================
            /// RETURN ; size offset -> ; halt yielding memory[offset..offset+size]
            Return = 0x30, "RETURN" => [],
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        /// A single instruction kind of the VM.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        /// Decodes a lone byte. Undefined bytes report offset 0; use
        /// [`Opcode::decode_at`] when the byte's position is known.
        impl TryFrom<u8> for Opcode {
            type Error = VMError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                Opcode::decode_at(value, 0)
            }
        }

        impl Opcode {
            /// Decodes `byte` found at `offset` in a bytecode stream.
            pub fn decode_at(byte: u8, offset: usize) -> Result<Opcode, VMError> {
                match byte {
                    $( $opcode => Ok(Opcode::$name), )*
                    _ => Err(VMError::UndefinedOpcode {
                        opcode: byte,
                        offset,
                    }),
                }
            }

            /// Every opcode, in table order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns the width in bytes of the immediate following the opcode.
            pub const fn immediate_width(&self) -> usize {
                match self {
                    $( Opcode::$name => 0usize $( + define_instructions!(@width $kind) )*, )*
                }
            }

            /// Looks up an opcode by its exact, case-sensitive mnemonic.
            pub fn from_mnemonic(mnemonic: &str) -> Result<Opcode, VMError> {
                match mnemonic {
                    $( $mnemonic => Ok(Opcode::$name), )*
                    _ => Err(VMError::UnknownOpcode {
                        mnemonic: mnemonic.to_string(),
                    }),
                }
            }
        }
    };

    // ---------- immediate types ----------
    (@ty Imm8)  => { u8 };
    (@ty Imm64) => { u64 };

    // ---------- immediate widths ----------
    (@width Imm8)  => { 1usize };
    (@width Imm64) => { 8usize };

    // ---------- encoding ----------
    (@emit $out:ident, Imm8, $v:ident) => {
        $out.push(*$v);
    };

    (@emit $out:ident, Imm64, $v:ident) => {
        $out.extend_from_slice(&$v.to_be_bytes());
    };
}

for_each_instruction!(define_instructions);

impl Opcode {
    /// Encoded size of the instruction: opcode byte plus immediate.
    pub const fn size(&self) -> usize {
        1 + self.immediate_width()
    }

    /// Returns `true` for opcodes that carry an immediate operand.
    pub const fn has_immediate(&self) -> bool {
        self.immediate_width() != 0
    }
}

impl FromStr for Opcode {
    type Err = VMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Opcode::from_mnemonic(s)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_try_from_undefined() {
        assert!(matches!(
            Opcode::try_from(0xFF),
            Err(VMError::UndefinedOpcode { opcode: 0xFF, .. })
        ));
    }

    #[test]
    fn decode_at_reports_offset() {
        assert_eq!(
            Opcode::decode_at(0xEE, 17),
            Err(VMError::UndefinedOpcode {
                opcode: 0xEE,
                offset: 17
            })
        );
        assert_eq!(Opcode::decode_at(0x22, 17), Ok(Opcode::Load8));
        assert_eq!(
            Opcode::try_from(0xEE),
            Err(VMError::UndefinedOpcode {
                opcode: 0xEE,
                offset: 0
            })
        );
    }

    #[test]
    fn opcode_byte_round_trip() {
        for &op in Opcode::ALL {
            assert_eq!(Opcode::try_from(op as u8).unwrap(), op);
        }
    }

    #[test]
    fn mnemonic_round_trip() {
        for &op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()).unwrap(), op);
            assert_eq!(op.to_string().parse::<Opcode>().unwrap(), op);
        }
    }

    #[test]
    fn from_mnemonic_is_exact() {
        assert_eq!(Opcode::from_mnemonic("PUSH1").unwrap(), Opcode::Push1);
        for bad in ["push1", "PUSH", "PUSH1 ", " ADD", "ADDX", ""] {
            assert!(
                matches!(
                    Opcode::from_mnemonic(bad),
                    Err(VMError::UnknownOpcode { ref mnemonic }) if mnemonic == bad
                ),
                "{bad:?} should not resolve"
            );
        }
    }

    #[test]
    fn immediate_widths() {
        assert_eq!(Opcode::Push1.immediate_width(), 1);
        assert_eq!(Opcode::Push8.immediate_width(), 8);
        assert_eq!(Opcode::Push8.size(), 9);
        for op in [
            Opcode::Pop,
            Opcode::Add,
            Opcode::Sub,
            Opcode::Mul,
            Opcode::Div,
            Opcode::Store1,
            Opcode::Store8,
            Opcode::Load8,
            Opcode::Return,
        ] {
            assert_eq!(op.immediate_width(), 0, "{op}");
            assert!(!op.has_immediate());
        }
    }

    #[test]
    fn opcode_bytes_are_unique() {
        let mut seen = [false; 256];
        for &op in Opcode::ALL {
            assert!(!seen[op as usize], "duplicate byte for {op}");
            seen[op as usize] = true;
        }
        assert_eq!(Opcode::ALL.len(), 11);
    }
}
