use std::sync::Arc;

use crate::classfile::{ClassFile, MethodInfo};
use crate::error::{Error, Result};
use crate::model::Element;
use crate::types::TypeResolver;

use super::code_stream::{LookAheadCallback, ProgramCounter};
use super::line_numbers::LineNumberCounter;

/// An expression on the operand stack, stamped with the offset of the
/// instruction that produced it and its position in push order.
#[derive(Debug, Clone)]
pub struct StackedExpression {
    pub(crate) element: Element,
    pub(crate) pc: u32,
    pub(crate) sequence: u32,
}

impl StackedExpression {
    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

/// A completed statement. The collection a context accumulates is kept
/// ordered by `(pc, sequence)` so that flushed subexpressions land at the
/// position of the instruction that created them, not where they were
/// reduced.
#[derive(Debug, Clone)]
pub struct Statement {
    pub(crate) element: Element,
    pub(crate) pc: u32,
    pub(crate) sequence: u32,
}

impl Statement {
    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

/// Mutable state of one method decompilation: the operand stack, the
/// statements recovered so far, the program counter with its scheduled
/// look-aheads, and the abort flag that ends the main loop early.
#[derive(Debug)]
pub struct DecompilationContext {
    class_file: Arc<ClassFile>,
    method: MethodInfo,
    type_resolver: Arc<TypeResolver>,
    program_counter: ProgramCounter,
    line_numbers: LineNumberCounter,
    start_pc: u32,
    stack: Vec<StackedExpression>,
    statements: Vec<Statement>,
    sequence: u32,
    aborted: bool,
}

impl DecompilationContext {
    pub fn new(
        class_file: Arc<ClassFile>,
        method: MethodInfo,
        type_resolver: Arc<TypeResolver>,
        start_pc: u32,
    ) -> Self {
        let line_numbers = LineNumberCounter::new(
            method
                .line_number_table()
                .map(|table| table.to_vec())
                .unwrap_or_default(),
        );

        Self {
            class_file,
            method,
            type_resolver,
            program_counter: ProgramCounter::new(start_pc),
            line_numbers,
            start_pc,
            stack: Vec::new(),
            statements: Vec::new(),
            sequence: 0,
            aborted: false,
        }
    }

    pub fn class_file(&self) -> &Arc<ClassFile> {
        &self.class_file
    }

    pub fn method(&self) -> &MethodInfo {
        &self.method
    }

    pub fn type_resolver(&self) -> &Arc<TypeResolver> {
        &self.type_resolver
    }

    pub fn program_counter(&self) -> &ProgramCounter {
        &self.program_counter
    }

    /// The offset of the instruction currently being decompiled.
    pub fn pc(&self) -> u32 {
        self.program_counter.current()
    }

    /// The offset at which this decompilation began; jumps to before it
    /// cannot be followed.
    pub fn start_pc(&self) -> u32 {
        self.start_pc
    }

    /// The source line the current instruction was compiled from, or 0 when
    /// the method carries no line number table.
    pub fn line_number(&self) -> u16 {
        self.line_numbers.line_number(self.pc())
    }

    pub fn push(&mut self, element: Element) {
        let stacked = StackedExpression {
            element,
            pc: self.pc(),
            sequence: self.next_sequence(),
        };
        self.stack.push(stacked);
    }

    pub fn pop(&mut self) -> Result<Element> {
        self.stack
            .pop()
            .map(|stacked| stacked.element)
            .ok_or(Error::EmptyStack)
    }

    pub fn peek(&self) -> Result<&Element> {
        self.stack
            .last()
            .map(|stacked| &stacked.element)
            .ok_or(Error::EmptyStack)
    }

    /// Inserts `element` at the position `offset` slots from the top of the
    /// stack; `insert(-2, e)` slides `e` in below the two topmost expressions.
    pub fn insert(&mut self, offset: isize, element: Element) -> Result<()> {
        let index = self.stack.len() as isize + offset;

        if index < 0 || index > self.stack.len() as isize {
            return Err(Error::format(format!(
                "stack insert offset {offset} out of range for depth {}",
                self.stack.len()
            )));
        }

        let stacked = StackedExpression {
            element,
            pc: self.pc(),
            sequence: self.next_sequence(),
        };
        self.stack.insert(index as usize, stacked);

        Ok(())
    }

    pub fn has_stacked_expressions(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn stacked_expressions(&self) -> &[StackedExpression] {
        &self.stack
    }

    /// Pops the topmost expression and appends it to the statement list at
    /// the position of the instruction that produced it. Returns `false` on
    /// an empty stack and fails if the expression cannot stand alone as a
    /// statement.
    pub fn reduce(&mut self) -> Result<bool> {
        let Some(stacked) = self.stack.pop() else {
            return Ok(false);
        };

        if !stacked.element.is_statement() {
            return Err(Error::InvalidStatement(format!("{:?}", stacked.element)));
        }

        self.insert_statement(Statement {
            element: stacked.element,
            pc: stacked.pc,
            sequence: stacked.sequence,
        });

        Ok(true)
    }

    /// Flushes every stacked expression into the statement list.
    pub fn reduce_all(&mut self) -> Result<()> {
        while self.has_stacked_expressions() {
            self.reduce()?;
        }

        Ok(())
    }

    /// Completes `element` as a statement at the current pc. Everything
    /// still on the stack is flushed first so that earlier side effects
    /// precede it.
    pub fn enlist(&mut self, element: Element) -> Result<()> {
        if !element.is_statement() {
            return Err(Error::InvalidStatement(format!("{element:?}")));
        }

        self.reduce_all()?;

        let statement = Statement {
            element,
            pc: self.pc(),
            sequence: self.next_sequence(),
        };
        self.insert_statement(statement);

        Ok(())
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn replace_statement(&mut self, index: usize, element: Element) -> Result<()> {
        if !element.is_statement() {
            return Err(Error::InvalidStatement(format!("{element:?}")));
        }

        match self.statements.get_mut(index) {
            Some(statement) => {
                statement.element = element;
                Ok(())
            }
            None => Err(Error::format(format!(
                "no statement at index {index} to replace"
            ))),
        }
    }

    pub fn remove_statement(&mut self, index: usize) -> Result<()> {
        if index >= self.statements.len() {
            return Err(Error::format(format!(
                "no statement at index {index} to remove"
            )));
        }

        self.statements.remove(index);

        Ok(())
    }

    /// Halts the decompilation loop without an error; everything recovered
    /// so far stands.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Schedules `callback` to run once decompilation reaches `target_pc`,
    /// which must lie strictly ahead of the current instruction.
    pub fn look_ahead(
        &mut self,
        target_pc: u32,
        callback: impl FnOnce(&mut DecompilationContext) -> Result<()> + 'static,
    ) {
        self.program_counter.look_ahead(target_pc, Box::new(callback));
    }

    pub(crate) fn advance(&mut self, pc: u32) -> Vec<LookAheadCallback> {
        self.program_counter.advance_to(pc)
    }

    pub(crate) fn into_statements(self) -> Vec<Element> {
        self.statements
            .into_iter()
            .map(|statement| statement.element)
            .collect()
    }

    fn insert_statement(&mut self, statement: Statement) {
        let at = self.statements.partition_point(|existing| {
            (existing.pc, existing.sequence) <= (statement.pc, statement.sequence)
        });
        self.statements.insert(at, statement);
    }

    fn next_sequence(&mut self) -> u32 {
        self.sequence += 1;
        self.sequence
    }
}
