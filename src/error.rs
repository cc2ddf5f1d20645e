use thiserror::Error;

/// Errors raised while reading a class file or reconstructing a method body.
#[derive(Debug, Error)]
pub enum Error {
    /// Structurally invalid class-file data: bad magic, unknown pool tag,
    /// out-of-range pool index, wrong-tag pool access, malformed operands.
    #[error("class file format error: {0}")]
    Format(String),

    /// The active configuration has no handler for this opcode and the
    /// built-in fallback does not cover it either.
    #[error("unhandled opcode 0x{opcode:02x} ({mnemonic}) in {method}")]
    UnhandledOpcode {
        opcode: u8,
        mnemonic: &'static str,
        method: String,
    },

    /// A reduced expression was not a statement.
    #[error("not a statement: {0}")]
    InvalidStatement(String),

    /// Pop or peek on an empty operand stack.
    #[error("operand stack is empty")]
    EmptyStack,

    /// The code stream has no more bytes.
    #[error("unexpected end of code")]
    EndOfCode,

    /// No local variable table entry covers the slot at the given pc.
    #[error("no local variable in slot {slot} at pc {pc}")]
    LocalVariableUnavailable { slot: u16, pc: u32 },

    /// A dynamic call site whose bootstrap arguments do not describe a
    /// lambda factory this library understands.
    #[error("unsupported dynamic call site: {0}")]
    UnsupportedCallSite(String),
}

impl Error {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Error::Format(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
