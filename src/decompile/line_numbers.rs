use std::cell::Cell;

use crate::classfile::LineNumberTableItem;

/// Maps the advancing program counter to the current source line using the
/// method's line-number table. The cursor only ever moves forward, one entry
/// per query at most, which is sufficient for the linear scan the decompiler
/// performs.
#[derive(Debug)]
pub struct LineNumberCounter {
    entries: Vec<LineNumberTableItem>,
    cursor: Cell<usize>,
}

impl LineNumberCounter {
    /// `entries` must be in ascending start-pc order, as stored in the class
    /// file. An empty table yields line 0 for every pc.
    pub fn new(entries: Vec<LineNumberTableItem>) -> Self {
        Self {
            entries,
            cursor: Cell::new(0),
        }
    }

    pub fn line_number(&self, pc: u32) -> u16 {
        if self.entries.is_empty() {
            return 0;
        }

        let cursor = self.cursor.get();

        if cursor + 1 < self.entries.len()
            && pc >= u32::from(self.entries[cursor + 1].start_pc())
        {
            self.cursor.set(cursor + 1);
        }

        self.entries[self.cursor.get()].line_number()
    }
}
