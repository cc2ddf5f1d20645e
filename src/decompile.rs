mod code_stream;
mod config;
mod context;
mod decompiler;
mod instructions;
mod line_numbers;

#[cfg(test)]
pub(crate) mod fixtures;

pub use code_stream::{CodeStream, LookAheadCallback, ProgramCounter};
pub use config::*;
pub use context::*;
pub use decompiler::Decompiler;
pub use line_numbers::LineNumberCounter;
