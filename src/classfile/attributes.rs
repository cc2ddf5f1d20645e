use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum AttributeInfo {
    Code(CodeAttribute),
    SourceFile(Arc<str>),
    LineNumberTable(Vec<LineNumberTableItem>),
    LocalVariableTable(Vec<LocalVariable>),
    /// Raw attribute body; bootstrap methods are decoded on demand.
    BootstrapMethods(Arc<[u8]>),
    Unknown {
        name: Arc<str>,
        info: Arc<[u8]>,
    },
}

#[derive(Debug, Clone)]
pub struct CodeAttribute {
    pub(crate) max_stack: u16,
    pub(crate) max_locals: u16,
    pub(crate) code: Arc<[u8]>,
    pub(crate) exception_table: Vec<ExceptionTableItem>,
    pub(crate) attributes: Vec<AttributeInfo>,
}

impl CodeAttribute {
    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    pub fn code(&self) -> &Arc<[u8]> {
        &self.code
    }

    pub fn exception_table(&self) -> &[ExceptionTableItem] {
        &self.exception_table
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumberTableItem {
    pub(crate) start_pc: u16,
    pub(crate) line_number: u16,
}

impl LineNumberTableItem {
    pub fn new(start_pc: u16, line_number: u16) -> Self {
        Self {
            start_pc,
            line_number,
        }
    }

    pub fn start_pc(&self) -> u16 {
        self.start_pc
    }

    pub fn line_number(&self) -> u16 {
        self.line_number
    }
}

#[derive(Debug, Clone)]
pub struct ExceptionTableItem {
    pub(crate) start_pc: u16,
    pub(crate) end_pc: u16,
    pub(crate) handler_pc: u16,
    pub(crate) catch_type: Option<Arc<str>>,
}

impl ExceptionTableItem {
    pub fn start_pc(&self) -> u16 {
        self.start_pc
    }

    pub fn end_pc(&self) -> u16 {
        self.end_pc
    }

    pub fn handler_pc(&self) -> u16 {
        self.handler_pc
    }

    pub fn catch_type(&self) -> Option<&Arc<str>> {
        self.catch_type.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub(crate) start_pc: u16,
    pub(crate) length: u16,
    pub(crate) name: Arc<str>,
    pub(crate) descriptor: Arc<str>,
    pub(crate) index: u16,
}

impl LocalVariable {
    pub fn new(
        start_pc: u16,
        length: u16,
        name: Arc<str>,
        descriptor: Arc<str>,
        index: u16,
    ) -> Self {
        Self {
            start_pc,
            length,
            name,
            descriptor,
            index,
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn descriptor(&self) -> &Arc<str> {
        &self.descriptor
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub(crate) fn covers(&self, pc: u32) -> bool {
        let start = u32::from(self.start_pc);
        start <= pc && pc < start + u32::from(self.length)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
    pub method_ref: u16,
    pub arguments: Vec<u16>,
}
