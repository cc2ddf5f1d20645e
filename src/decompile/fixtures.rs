// Hand-assembled class-file structures for decompiler tests.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::classfile::{
    AttributeInfo, BootstrapMethod, ClassFile, CodeAttribute, ConstantPool, ConstantPoolInfo,
    ExceptionTableItem, LineNumberTableItem, LocalVariable, MethodInfo, ReferenceKind,
};
use crate::consts::{ClassAccessFlag, MethodAccessFlag};

pub(crate) struct PoolBuilder {
    entries: Vec<ConstantPoolInfo>,
}

impl PoolBuilder {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn push(&mut self, entry: ConstantPoolInfo) -> u16 {
        self.entries.push(entry);
        self.entries.len() as u16
    }

    pub(crate) fn utf8(&mut self, value: &str) -> u16 {
        self.push(ConstantPoolInfo::Utf8(Arc::from(value)))
    }

    pub(crate) fn integer(&mut self, value: i32) -> u16 {
        self.push(ConstantPoolInfo::Integer(value))
    }

    pub(crate) fn long(&mut self, value: i64) -> u16 {
        let index = self.push(ConstantPoolInfo::Long(value));
        self.push(ConstantPoolInfo::Placeholder);
        index
    }

    pub(crate) fn string(&mut self, value: &str) -> u16 {
        let string_index = self.utf8(value);
        self.push(ConstantPoolInfo::String { string_index })
    }

    pub(crate) fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.push(ConstantPoolInfo::Class { name_index })
    }

    pub(crate) fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.push(ConstantPoolInfo::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    pub(crate) fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.push(ConstantPoolInfo::Fieldref {
            class_index,
            name_and_type_index,
        })
    }

    pub(crate) fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.push(ConstantPoolInfo::Methodref {
            class_index,
            name_and_type_index,
        })
    }

    pub(crate) fn interface_method_ref(
        &mut self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.push(ConstantPoolInfo::InterfaceMethodref {
            class_index,
            name_and_type_index,
        })
    }

    pub(crate) fn method_type(&mut self, descriptor: &str) -> u16 {
        let descriptor_index = self.utf8(descriptor);
        self.push(ConstantPoolInfo::MethodType { descriptor_index })
    }

    pub(crate) fn method_handle(&mut self, kind: ReferenceKind, reference_index: u16) -> u16 {
        self.push(ConstantPoolInfo::MethodHandle {
            reference_kind: kind as u8,
            reference_index,
        })
    }

    pub(crate) fn invoke_dynamic(
        &mut self,
        bootstrap_method_attr_index: u16,
        name: &str,
        descriptor: &str,
    ) -> u16 {
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.push(ConstantPoolInfo::InvokeDynamic {
            bootstrap_method_attr_index,
            name_and_type_index,
        })
    }

    pub(crate) fn entries(self) -> Vec<ConstantPoolInfo> {
        self.entries
    }
}

pub(crate) struct MethodBuilder {
    access_flags: MethodAccessFlag,
    name: String,
    descriptor: String,
    code: Vec<u8>,
    max_locals: u16,
    locals: Vec<LocalVariable>,
    line_numbers: Vec<LineNumberTableItem>,
    exception_table: Vec<ExceptionTableItem>,
}

impl MethodBuilder {
    pub(crate) fn new(name: &str, descriptor: &str) -> Self {
        Self {
            access_flags: MethodAccessFlag::PUBLIC,
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            code: Vec::new(),
            max_locals: 8,
            locals: Vec::new(),
            line_numbers: Vec::new(),
            exception_table: Vec::new(),
        }
    }

    pub(crate) fn flags(mut self, access_flags: MethodAccessFlag) -> Self {
        self.access_flags = access_flags;
        self
    }

    pub(crate) fn code(mut self, code: Vec<u8>) -> Self {
        self.code = code;
        self
    }

    pub(crate) fn local(
        mut self,
        start_pc: u16,
        length: u16,
        name: &str,
        descriptor: &str,
        index: u16,
    ) -> Self {
        self.locals.push(LocalVariable::new(
            start_pc,
            length,
            Arc::from(name),
            Arc::from(descriptor),
            index,
        ));
        self
    }

    pub(crate) fn line(mut self, start_pc: u16, line_number: u16) -> Self {
        self.line_numbers
            .push(LineNumberTableItem::new(start_pc, line_number));
        self
    }

    pub(crate) fn exception(mut self, start_pc: u16, end_pc: u16, handler_pc: u16) -> Self {
        self.exception_table.push(ExceptionTableItem {
            start_pc,
            end_pc,
            handler_pc,
            catch_type: Some(Arc::from("java/lang/Exception")),
        });
        self
    }

    pub(crate) fn build(self) -> MethodInfo {
        let mut attributes = Vec::new();

        if !self.locals.is_empty() {
            attributes.push(AttributeInfo::LocalVariableTable(self.locals));
        }

        if !self.line_numbers.is_empty() {
            attributes.push(AttributeInfo::LineNumberTable(self.line_numbers));
        }

        MethodInfo {
            access_flags: self.access_flags,
            name: Arc::from(&*self.name),
            descriptor: Arc::from(&*self.descriptor),
            attributes: vec![AttributeInfo::Code(CodeAttribute {
                max_stack: 8,
                max_locals: self.max_locals,
                code: Arc::from(&*self.code),
                exception_table: self.exception_table,
                attributes,
            })],
            parsed_descriptor: OnceCell::new(),
        }
    }
}

pub(crate) fn static_flags() -> MethodAccessFlag {
    MethodAccessFlag::PUBLIC | MethodAccessFlag::STATIC
}

pub(crate) fn class_file(
    this_class: &str,
    entries: Vec<ConstantPoolInfo>,
    methods: Vec<MethodInfo>,
) -> Arc<ClassFile> {
    class_file_with_bootstrap(this_class, entries, methods, None)
}

pub(crate) fn class_file_with_bootstrap(
    this_class: &str,
    entries: Vec<ConstantPoolInfo>,
    methods: Vec<MethodInfo>,
    bootstrap: Option<Vec<BootstrapMethod>>,
) -> Arc<ClassFile> {
    let bootstrap_methods = OnceCell::new();

    if let Some(methods) = bootstrap {
        bootstrap_methods.set(methods).ok();
    }

    Arc::new(ClassFile {
        minor_version: 0,
        major_version: 52,
        constant_pool: ConstantPool::from_entries(entries),
        access_flags: ClassAccessFlag::PUBLIC | ClassAccessFlag::SUPER,
        this_class: Arc::from(this_class),
        super_class: Some(Arc::from("java/lang/Object")),
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods,
        attributes: Vec::new(),
        bootstrap_methods,
    })
}
