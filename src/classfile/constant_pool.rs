use std::sync::Arc;

use crate::error::{Error, Result};

/// One parsed constant pool entry. `Placeholder` occupies the unused slot
/// that follows every `Long` and `Double` entry so that raw pool indices
/// stay aligned with the class file.
#[derive(Debug, Clone)]
pub enum ConstantPoolInfo {
    Utf8(Arc<str>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    Fieldref {
        class_index: u16,
        name_and_type_index: u16,
    },
    Methodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Placeholder,
}

impl ConstantPoolInfo {
    fn description(&self) -> &'static str {
        match self {
            ConstantPoolInfo::Utf8(_) => "Utf8",
            ConstantPoolInfo::Integer(_) => "Integer",
            ConstantPoolInfo::Float(_) => "Float",
            ConstantPoolInfo::Long(_) => "Long",
            ConstantPoolInfo::Double(_) => "Double",
            ConstantPoolInfo::Class { .. } => "Class",
            ConstantPoolInfo::String { .. } => "String",
            ConstantPoolInfo::Fieldref { .. } => "Fieldref",
            ConstantPoolInfo::Methodref { .. } => "Methodref",
            ConstantPoolInfo::InterfaceMethodref { .. } => "InterfaceMethodref",
            ConstantPoolInfo::NameAndType { .. } => "NameAndType",
            ConstantPoolInfo::MethodHandle { .. } => "MethodHandle",
            ConstantPoolInfo::MethodType { .. } => "MethodType",
            ConstantPoolInfo::InvokeDynamic { .. } => "InvokeDynamic",
            ConstantPoolInfo::Placeholder => "Placeholder",
        }
    }
}

/// The kind stored in a `MethodHandle` pool entry, with the tag values the
/// class-file format assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

impl ReferenceKind {
    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            1 => ReferenceKind::GetField,
            2 => ReferenceKind::GetStatic,
            3 => ReferenceKind::PutField,
            4 => ReferenceKind::PutStatic,
            5 => ReferenceKind::InvokeVirtual,
            6 => ReferenceKind::InvokeStatic,
            7 => ReferenceKind::InvokeSpecial,
            8 => ReferenceKind::NewInvokeSpecial,
            9 => ReferenceKind::InvokeInterface,
            _ => {
                return Err(Error::format(format!(
                    "invalid method handle reference kind {tag}"
                )));
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRefDescriptor {
    pub class_name: Arc<str>,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRefDescriptor {
    pub class_name: Arc<str>,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeDynamicDescriptor {
    pub bootstrap_method_attr_index: u16,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHandleDescriptor {
    pub kind: ReferenceKind,
    pub class_name: Arc<str>,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
}

/// The constant pool of a class file, addressed by 1-based index.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<ConstantPoolInfo>,
}

impl ConstantPool {
    /// Builds a pool from entries in slot order. The caller is responsible
    /// for the placeholder slots after `Long` and `Double` entries.
    pub fn from_entries(entries: Vec<ConstantPoolInfo>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: u16) -> Result<&ConstantPoolInfo> {
        if index == 0 || index as usize > self.entries.len() {
            return Err(Error::format(format!(
                "constant pool index {index} out of range (1..={})",
                self.entries.len()
            )));
        }

        Ok(&self.entries[index as usize - 1])
    }

    pub fn utf8(&self, index: u16) -> Result<Arc<str>> {
        match self.entry(index)? {
            ConstantPoolInfo::Utf8(text) => Ok(text.clone()),
            other => Err(wrong_entry("Utf8", index, other)),
        }
    }

    pub fn class_name(&self, index: u16) -> Result<Arc<str>> {
        match *self.entry(index)? {
            ConstantPoolInfo::Class { name_index } => self.utf8(name_index),
            ref other => Err(wrong_entry("Class", index, other)),
        }
    }

    /// Resolves a `NameAndType` entry into its `(name, descriptor)` pair.
    pub fn name_and_type(&self, index: u16) -> Result<(Arc<str>, Arc<str>)> {
        match *self.entry(index)? {
            ConstantPoolInfo::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(name_index)?, self.utf8(descriptor_index)?)),
            ref other => Err(wrong_entry("NameAndType", index, other)),
        }
    }

    pub fn field_ref(&self, index: u16) -> Result<FieldRefDescriptor> {
        match *self.entry(index)? {
            ConstantPoolInfo::Fieldref {
                class_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(name_and_type_index)?;
                Ok(FieldRefDescriptor {
                    class_name: self.class_name(class_index)?,
                    name,
                    descriptor,
                })
            }
            ref other => Err(wrong_entry("Fieldref", index, other)),
        }
    }

    pub fn method_ref(&self, index: u16) -> Result<MethodRefDescriptor> {
        match *self.entry(index)? {
            ConstantPoolInfo::Methodref {
                class_index,
                name_and_type_index,
            } => self.member_ref(class_index, name_and_type_index),
            ref other => Err(wrong_entry("Methodref", index, other)),
        }
    }

    pub fn interface_method_ref(&self, index: u16) -> Result<MethodRefDescriptor> {
        match *self.entry(index)? {
            ConstantPoolInfo::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => self.member_ref(class_index, name_and_type_index),
            ref other => Err(wrong_entry("InterfaceMethodref", index, other)),
        }
    }

    pub fn invoke_dynamic(&self, index: u16) -> Result<InvokeDynamicDescriptor> {
        match *self.entry(index)? {
            ConstantPoolInfo::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(name_and_type_index)?;
                Ok(InvokeDynamicDescriptor {
                    bootstrap_method_attr_index,
                    name,
                    descriptor,
                })
            }
            ref other => Err(wrong_entry("InvokeDynamic", index, other)),
        }
    }

    pub fn method_type(&self, index: u16) -> Result<Arc<str>> {
        match *self.entry(index)? {
            ConstantPoolInfo::MethodType { descriptor_index } => self.utf8(descriptor_index),
            ref other => Err(wrong_entry("MethodType", index, other)),
        }
    }

    pub fn method_handle(&self, index: u16) -> Result<MethodHandleDescriptor> {
        match *self.entry(index)? {
            ConstantPoolInfo::MethodHandle {
                reference_kind,
                reference_index,
            } => {
                let kind = ReferenceKind::from_tag(reference_kind)?;
                let (class_name, name, descriptor) = match kind {
                    ReferenceKind::GetField
                    | ReferenceKind::GetStatic
                    | ReferenceKind::PutField
                    | ReferenceKind::PutStatic => {
                        let field = self.field_ref(reference_index)?;
                        (field.class_name, field.name, field.descriptor)
                    }
                    ReferenceKind::InvokeVirtual
                    | ReferenceKind::InvokeStatic
                    | ReferenceKind::InvokeSpecial
                    | ReferenceKind::NewInvokeSpecial => {
                        let method = self.method_ref(reference_index)?;
                        (method.class_name, method.name, method.descriptor)
                    }
                    ReferenceKind::InvokeInterface => {
                        let method = self.interface_method_ref(reference_index)?;
                        (method.class_name, method.name, method.descriptor)
                    }
                };

                Ok(MethodHandleDescriptor {
                    kind,
                    class_name,
                    name,
                    descriptor,
                })
            }
            ref other => Err(wrong_entry("MethodHandle", index, other)),
        }
    }

    fn member_ref(
        &self,
        class_index: u16,
        name_and_type_index: u16,
    ) -> Result<MethodRefDescriptor> {
        let (name, descriptor) = self.name_and_type(name_and_type_index)?;
        Ok(MethodRefDescriptor {
            class_name: self.class_name(class_index)?,
            name,
            descriptor,
        })
    }
}

fn wrong_entry(expected: &str, index: u16, actual: &ConstantPoolInfo) -> Error {
    Error::format(format!(
        "expected {expected} entry at constant pool index {index}, found {}",
        actual.description()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pool() -> ConstantPool {
        ConstantPool::from_entries(vec![
            ConstantPoolInfo::Utf8(Arc::from("java/lang/System")), // 1
            ConstantPoolInfo::Class { name_index: 1 },             // 2
            ConstantPoolInfo::Utf8(Arc::from("out")),              // 3
            ConstantPoolInfo::Utf8(Arc::from("Ljava/io/PrintStream;")), // 4
            ConstantPoolInfo::NameAndType {
                name_index: 3,
                descriptor_index: 4,
            }, // 5
            ConstantPoolInfo::Fieldref {
                class_index: 2,
                name_and_type_index: 5,
            }, // 6
            ConstantPoolInfo::Long(1 << 40),                       // 7
            ConstantPoolInfo::Placeholder,                         // 8
            ConstantPoolInfo::Methodref {
                class_index: 2,
                name_and_type_index: 5,
            }, // 9
            ConstantPoolInfo::MethodHandle {
                reference_kind: 6,
                reference_index: 9,
            }, // 10
        ])
    }

    #[test]
    fn test_entry_index_bounds() {
        let pool = sample_pool();

        assert!(pool.entry(0).is_err());
        assert!(pool.entry(1).is_ok());
        assert!(pool.entry(10).is_ok());
        assert!(pool.entry(11).is_err());
    }

    #[test]
    fn test_class_name_resolution() {
        let pool = sample_pool();

        assert_eq!(&*pool.class_name(2).unwrap(), "java/lang/System");
    }

    #[test]
    fn test_field_ref_view() {
        let pool = sample_pool();
        let field = pool.field_ref(6).unwrap();

        assert_eq!(&*field.class_name, "java/lang/System");
        assert_eq!(&*field.name, "out");
        assert_eq!(&*field.descriptor, "Ljava/io/PrintStream;");
    }

    #[test]
    fn test_wrong_tag_is_rejected() {
        let pool = sample_pool();

        assert!(pool.utf8(2).is_err());
        assert!(pool.class_name(1).is_err());
        assert!(pool.method_ref(6).is_err());
    }

    #[test]
    fn test_placeholder_slot_keeps_indices_aligned() {
        let pool = sample_pool();

        assert!(matches!(
            pool.entry(7).unwrap(),
            ConstantPoolInfo::Long(value) if *value == 1 << 40
        ));
        assert!(matches!(
            pool.entry(8).unwrap(),
            ConstantPoolInfo::Placeholder
        ));
        assert!(pool.method_ref(9).is_ok());
    }

    #[test]
    fn test_method_handle_view() {
        let pool = sample_pool();
        let handle = pool.method_handle(10).unwrap();

        assert_eq!(handle.kind, ReferenceKind::InvokeStatic);
        assert_eq!(&*handle.class_name, "java/lang/System");
        assert_eq!(&*handle.name, "out");
    }

    #[test]
    fn test_method_handle_rejects_invalid_kind() {
        let pool = ConstantPool::from_entries(vec![ConstantPoolInfo::MethodHandle {
            reference_kind: 12,
            reference_index: 1,
        }]);

        assert!(pool.method_handle(1).is_err());
    }
}
