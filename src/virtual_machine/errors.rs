use stackvm_derive::Error;

/// Errors that can occur during assembly, configuration, or VM execution.
///
/// Execution errors are raised before the failing instruction touches the
/// stack or memory, so the VM state after an error is the state before the
/// instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    /// Mnemonic not present in the opcode table.
    #[error("unknown opcode: {mnemonic}")]
    UnknownOpcode { mnemonic: String },
    /// Bytecode contains a byte with no assigned handler.
    #[error("undefined opcode 0x{opcode:02x} at offset {offset}")]
    UndefinedOpcode { opcode: u8, offset: usize },
    /// A push would exceed the stack capacity.
    #[error("stack overflow (capacity {capacity})")]
    StackOverflow { capacity: usize },
    /// An instruction needs more operands than the stack holds.
    #[error("stack underflow: required {required} operands, {available} available")]
    StackUnderflow { required: usize, available: usize },
    /// Memory access past the end of memory.
    #[error("memory access out of bounds: offset {offset} + {len} bytes exceeds capacity {capacity}")]
    MemoryOutOfBounds { offset: u64, len: u64, capacity: u64 },
    /// `DIV` with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,
    /// Bytecode ended in the middle of an immediate operand.
    #[error("unexpected end of bytecode at {ip}: requested {requested} bytes, {available} available")]
    UnexpectedEndOfBytecode {
        ip: usize,
        requested: usize,
        available: usize,
    },
    /// VM configuration rejected at construction.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
    /// Wrong number of operands on an assembly line.
    #[error("operand count mismatch for {instruction}: expected {expected}, got {actual}")]
    ArityMismatch {
        instruction: String,
        expected: usize,
        actual: usize,
    },
    /// Operand is not an unsigned integer that fits the immediate width.
    #[error("invalid operand '{token}': expected an unsigned {width}-byte integer")]
    InvalidOperand { token: String, width: usize },
    /// Assembly error with line and column context.
    #[error("line {line}:{offset}: {source}")]
    AssemblyError {
        line: usize,
        offset: usize,
        source: String,
    },
    /// File I/O error while reading a program.
    #[error("io error on {path}: {source}")]
    IoError { path: String, source: String },
    /// Returned bytes cannot be decoded as requested.
    #[error("decoding error: {reason}")]
    DecodeError { reason: String },
}
