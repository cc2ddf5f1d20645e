use std::collections::BTreeMap;

use crate::error::{Error, Result};

use super::context::DecompilationContext;

/// A callback scheduled against a future program counter value, invoked by
/// the decompiler loop once the instruction at that offset is reached.
pub type LookAheadCallback = Box<dyn FnOnce(&mut DecompilationContext) -> Result<()>>;

/// Tracks the offset of the instruction currently being decompiled and the
/// look-ahead callbacks scheduled against future offsets.
pub struct ProgramCounter {
    value: u32,
    look_aheads: BTreeMap<u32, Vec<LookAheadCallback>>,
}

impl ProgramCounter {
    pub fn new(start_pc: u32) -> Self {
        Self {
            value: start_pc,
            look_aheads: BTreeMap::new(),
        }
    }

    pub fn current(&self) -> u32 {
        self.value
    }

    /// Schedules `callback` to run when the counter reaches `target_pc`,
    /// which must be strictly ahead of the current value.
    pub fn look_ahead(&mut self, target_pc: u32, callback: LookAheadCallback) {
        assert!(
            target_pc > self.value,
            "look-ahead target {target_pc} is not ahead of pc {}",
            self.value
        );

        self.look_aheads.entry(target_pc).or_default().push(callback);
    }

    /// Moves the counter to `pc` and takes every callback scheduled at or
    /// before it, in schedule order.
    pub(crate) fn advance_to(&mut self, pc: u32) -> Vec<LookAheadCallback> {
        self.value = pc;

        let mut due = Vec::new();
        let pending = self.look_aheads.split_off(&(pc + 1));

        for (_, callbacks) in std::mem::replace(&mut self.look_aheads, pending) {
            due.extend(callbacks);
        }

        due
    }
}

impl std::fmt::Debug for ProgramCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCounter")
            .field("value", &self.value)
            .field("look_aheads", &self.look_aheads.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A cursor over the byte code of a single method body. Reads advance the
/// cursor; peeks buffer ahead without moving it until `commit` is called,
/// and any subsequent read discards an uncommitted peek.
#[derive(Debug)]
pub struct CodeStream<'a> {
    code: &'a [u8],
    base_pc: u32,
    position: usize,
    peeking: bool,
    peek_position: usize,
}

impl<'a> CodeStream<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self::with_base_pc(code, 0)
    }

    /// A stream over a code fragment that starts at offset `base_pc` of the
    /// enclosing method body.
    pub fn with_base_pc(code: &'a [u8], base_pc: u32) -> Self {
        Self {
            code,
            base_pc,
            position: 0,
            peeking: false,
            peek_position: 0,
        }
    }

    /// The offset of the next byte to be consumed.
    pub fn pc(&self) -> u32 {
        self.base_pc + self.position as u32
    }

    pub fn next_instruction(&mut self) -> Result<u8> {
        self.next_unsigned_byte()
    }

    pub fn next_byte(&mut self) -> Result<i8> {
        Ok(self.next_unsigned_byte()? as i8)
    }

    pub fn next_unsigned_byte(&mut self) -> Result<u8> {
        self.unpeek();

        let byte = *self.code.get(self.position).ok_or(Error::EndOfCode)?;
        self.position += 1;

        Ok(byte)
    }

    pub fn next_signed_short(&mut self) -> Result<i16> {
        Ok(self.next_unsigned_short()? as i16)
    }

    pub fn next_unsigned_short(&mut self) -> Result<u16> {
        self.unpeek();

        let bytes = self
            .code
            .get(self.position..self.position + 2)
            .ok_or(Error::EndOfCode)?;
        self.position += 2;

        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads the next instruction without consuming it. Repeated peeks look
    /// further ahead.
    pub fn peek_instruction(&mut self) -> Result<u8> {
        self.peek_unsigned_byte()
    }

    pub fn peek_byte(&mut self) -> Result<i8> {
        Ok(self.peek_unsigned_byte()? as i8)
    }

    pub fn peek_unsigned_short(&mut self) -> Result<u16> {
        let high = self.peek_unsigned_byte()?;
        let low = self.peek_unsigned_byte()?;
        Ok(u16::from_be_bytes([high, low]))
    }

    fn peek_unsigned_byte(&mut self) -> Result<u8> {
        if !self.peeking {
            self.peeking = true;
            self.peek_position = self.position;
        }

        let byte = *self.code.get(self.peek_position).ok_or(Error::EndOfCode)?;
        self.peek_position += 1;

        Ok(byte)
    }

    /// Consumes everything peeked since the last read.
    pub fn commit(&mut self) {
        if self.peeking {
            self.peeking = false;
            self.position = self.peek_position;
        }
    }

    fn unpeek(&mut self) {
        self.peeking = false;
    }
}
