use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::consts::{ClassAccessFlag, FieldAccessFlag, MethodAccessFlag};
use crate::descriptor::{MethodDescriptor, parse_method_descriptor};
use crate::error::{Error, Result};

use super::attributes::{
    AttributeInfo, BootstrapMethod, CodeAttribute, ExceptionTableItem, LineNumberTableItem,
    LocalVariable,
};
use super::constant_pool::ConstantPool;
use super::parser;

/// A parsed class file. Immutable once built; shared read-only between
/// decompilations.
#[derive(Debug)]
pub struct ClassFile {
    pub(crate) minor_version: u16,
    pub(crate) major_version: u16,
    pub(crate) constant_pool: ConstantPool,
    pub(crate) access_flags: ClassAccessFlag,
    pub(crate) this_class: Arc<str>,
    pub(crate) super_class: Option<Arc<str>>,
    pub(crate) interfaces: Vec<Arc<str>>,
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) methods: Vec<MethodInfo>,
    pub(crate) attributes: Vec<AttributeInfo>,
    pub(crate) bootstrap_methods: OnceCell<Vec<BootstrapMethod>>,
}

impl ClassFile {
    pub fn version(&self) -> (u16, u16) {
        (self.major_version, self.minor_version)
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.constant_pool
    }

    pub fn access_flags(&self) -> ClassAccessFlag {
        self.access_flags
    }

    /// The internal binary name of this class, e.g. `com/example/Widget`.
    pub fn name(&self) -> &Arc<str> {
        &self.this_class
    }

    pub fn super_class_name(&self) -> Option<&Arc<str>> {
        self.super_class.as_ref()
    }

    pub fn interfaces(&self) -> &[Arc<str>] {
        &self.interfaces
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    pub fn source_file(&self) -> Option<&Arc<str>> {
        self.attributes.iter().find_map(|attribute| match attribute {
            AttributeInfo::SourceFile(name) => Some(name),
            _ => None,
        })
    }

    /// The decoded `BootstrapMethods` attribute. Decoding happens on first
    /// access and is cached; a class file without the attribute fails here,
    /// since callers only ask when an `invokedynamic` site references it.
    pub fn bootstrap_methods(&self) -> Result<&[BootstrapMethod]> {
        self.bootstrap_methods
            .get_or_try_init(|| {
                let raw = self.attributes.iter().find_map(|attribute| match attribute {
                    AttributeInfo::BootstrapMethods(info) => Some(info.clone()),
                    _ => None,
                });

                match raw {
                    Some(info) => parser::parse_bootstrap_methods(&info),
                    None => Err(Error::format(format!(
                        "no BootstrapMethods attribute in class file {}",
                        self.this_class
                    ))),
                }
            })
            .map(Vec::as_slice)
    }

    pub fn bootstrap_method(&self, index: u16) -> Result<&BootstrapMethod> {
        self.bootstrap_methods()?
            .get(index as usize)
            .ok_or_else(|| {
                Error::format(format!(
                    "no bootstrap method at index {index} in class file {}",
                    self.this_class
                ))
            })
    }
}

#[derive(Debug)]
pub struct FieldInfo {
    pub(crate) access_flags: FieldAccessFlag,
    pub(crate) name: Arc<str>,
    pub(crate) descriptor: Arc<str>,
    pub(crate) attributes: Vec<AttributeInfo>,
}

impl FieldInfo {
    pub fn access_flags(&self) -> FieldAccessFlag {
        self.access_flags
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn descriptor(&self) -> &Arc<str> {
        &self.descriptor
    }
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub(crate) access_flags: MethodAccessFlag,
    pub(crate) name: Arc<str>,
    pub(crate) descriptor: Arc<str>,
    pub(crate) attributes: Vec<AttributeInfo>,
    pub(crate) parsed_descriptor: OnceCell<MethodDescriptor>,
}

impl MethodInfo {
    pub fn access_flags(&self) -> MethodAccessFlag {
        self.access_flags
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn raw_descriptor(&self) -> &Arc<str> {
        &self.descriptor
    }

    /// The parsed form of the method descriptor, computed on first access.
    pub fn descriptor(&self) -> Result<&MethodDescriptor> {
        self.parsed_descriptor
            .get_or_try_init(|| parse_method_descriptor(&self.descriptor))
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlag::STATIC)
    }

    /// Whether this method is compiler-generated backing code for a lambda
    /// expression declared in some other method of the same class.
    pub fn is_lambda_backing(&self) -> bool {
        self.name.starts_with("lambda$")
    }

    pub fn code(&self) -> Result<&CodeAttribute> {
        self.attributes
            .iter()
            .find_map(|attribute| match attribute {
                AttributeInfo::Code(code) => Some(code),
                _ => None,
            })
            .ok_or_else(|| {
                Error::format(format!("method {} has no Code attribute", self.name))
            })
    }

    pub fn line_number_table(&self) -> Option<&[LineNumberTableItem]> {
        let code = self.code().ok()?;
        code.attributes.iter().find_map(|attribute| match attribute {
            AttributeInfo::LineNumberTable(table) => Some(table.as_slice()),
            _ => None,
        })
    }

    pub fn local_variable_table(&self) -> Option<&[LocalVariable]> {
        let code = self.code().ok()?;
        code.attributes.iter().find_map(|attribute| match attribute {
            AttributeInfo::LocalVariableTable(table) => Some(table.as_slice()),
            _ => None,
        })
    }

    /// Looks up the local variable occupying `slot` and alive at `pc`.
    pub fn local_variable(&self, slot: u16, pc: u32) -> Option<&LocalVariable> {
        self.local_variable_table()?
            .iter()
            .find(|variable| variable.index == slot && variable.covers(pc))
    }

    /// The exception-table entry whose protected range ends exactly at `pc`.
    /// An unconditional jump at that offset is the skip-the-handler jump the
    /// compiler plants at the end of a try block.
    pub fn exception_table_entry_ending_at(&self, pc: u32) -> Option<&ExceptionTableItem> {
        self.code()
            .ok()?
            .exception_table
            .iter()
            .find(|entry| u32::from(entry.end_pc) == pc)
    }

    /// The span of source lines this method's code covers, from the line
    /// number table.
    pub fn line_number_range(&self) -> Option<(u16, u16)> {
        let table = self.line_number_table()?;
        let first = table.iter().map(|item| item.line_number).min()?;
        let last = table.iter().map(|item| item.line_number).max()?;
        Some((first, last))
    }

    /// Returns a copy of this method whose code attribute carries `variables`
    /// as its local variable table. The code bytes themselves are shared.
    pub fn with_local_variable_table(&self, variables: Vec<LocalVariable>) -> MethodInfo {
        let mut method = self.clone();

        if let Some(AttributeInfo::Code(code)) = method
            .attributes
            .iter_mut()
            .find(|attribute| matches!(attribute, AttributeInfo::Code(_)))
        {
            code.attributes
                .retain(|attribute| !matches!(attribute, AttributeInfo::LocalVariableTable(_)));
            code.attributes
                .push(AttributeInfo::LocalVariableTable(variables));
        }

        method
    }
}
