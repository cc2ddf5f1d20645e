use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::descriptor::FieldType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }
}

/// A resolved view of a type name occurring in a class file. Reference types
/// keep their internal binary name (`java/lang/String`); names that are not
/// well-formed survive as `Unresolved` so that decompilation can proceed and
/// produce a degraded result instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeHandle {
    Primitive(PrimitiveKind),
    Reference(Arc<str>),
    Array(Arc<TypeHandle>),
    Unresolved(Arc<str>),
    Void,
}

pub const BOOLEAN: TypeHandle = TypeHandle::Primitive(PrimitiveKind::Boolean);
pub const BYTE: TypeHandle = TypeHandle::Primitive(PrimitiveKind::Byte);
pub const CHAR: TypeHandle = TypeHandle::Primitive(PrimitiveKind::Char);
pub const SHORT: TypeHandle = TypeHandle::Primitive(PrimitiveKind::Short);
pub const INT: TypeHandle = TypeHandle::Primitive(PrimitiveKind::Int);
pub const LONG: TypeHandle = TypeHandle::Primitive(PrimitiveKind::Long);
pub const FLOAT: TypeHandle = TypeHandle::Primitive(PrimitiveKind::Float);
pub const DOUBLE: TypeHandle = TypeHandle::Primitive(PrimitiveKind::Double);

impl TypeHandle {
    pub fn array_of(component: TypeHandle) -> TypeHandle {
        TypeHandle::Array(Arc::new(component))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeHandle::Primitive(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeHandle::Void)
    }

    /// The component type of an array type, or `None` for non-arrays.
    pub fn component_type(&self) -> Option<&TypeHandle> {
        match self {
            TypeHandle::Array(component) => Some(component),
            _ => None,
        }
    }

    /// The field descriptor text for this type, e.g. `I` or
    /// `Ljava/lang/String;`. Resolving the result yields this type again.
    pub fn descriptor(&self) -> String {
        match self {
            TypeHandle::Primitive(kind) => match kind {
                PrimitiveKind::Boolean => "Z",
                PrimitiveKind::Byte => "B",
                PrimitiveKind::Char => "C",
                PrimitiveKind::Short => "S",
                PrimitiveKind::Int => "I",
                PrimitiveKind::Long => "J",
                PrimitiveKind::Float => "F",
                PrimitiveKind::Double => "D",
            }
            .to_string(),
            TypeHandle::Reference(name) => format!("L{name};"),
            TypeHandle::Array(component) => format!("[{}", component.descriptor()),
            TypeHandle::Unresolved(name) => name.to_string(),
            TypeHandle::Void => "V".to_string(),
        }
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeHandle::Primitive(kind) => f.write_str(kind.name()),
            TypeHandle::Reference(name) => f.write_str(&name.replace('/', ".")),
            TypeHandle::Array(component) => write!(f, "{component}[]"),
            TypeHandle::Unresolved(name) => f.write_str(name),
            TypeHandle::Void => f.write_str("void"),
        }
    }
}

/// Resolves type names from constant pool entries and descriptors, caching
/// every resolution. Shareable across concurrent decompilations.
#[derive(Debug, Default)]
pub struct TypeResolver {
    cache: DashMap<Arc<str>, TypeHandle>,
}

impl TypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a type name as it occurs in a class file: an internal binary
    /// name (`java/lang/Thread`), an array descriptor (`[I`,
    /// `[Ljava/lang/String;`) or a one-letter primitive descriptor.
    pub fn resolve(&self, name: &str) -> TypeHandle {
        if let Some(resolved) = self.cache.get(name) {
            return resolved.clone();
        }

        let resolved = self.resolve_uncached(name);
        self.cache.insert(Arc::from(name), resolved.clone());
        resolved
    }

    pub fn resolve_field_type(&self, field_type: &FieldType) -> TypeHandle {
        match field_type {
            FieldType::Byte => BYTE,
            FieldType::Char => CHAR,
            FieldType::Double => DOUBLE,
            FieldType::Float => FLOAT,
            FieldType::Int => INT,
            FieldType::Long => LONG,
            FieldType::Short => SHORT,
            FieldType::Boolean => BOOLEAN,
            FieldType::Object(class_name) => self.resolve(class_name),
            FieldType::Array(component) => {
                TypeHandle::array_of(self.resolve_field_type(component))
            }
        }
    }

    fn resolve_uncached(&self, name: &str) -> TypeHandle {
        match name {
            "B" => return BYTE,
            "C" => return CHAR,
            "D" => return DOUBLE,
            "F" => return FLOAT,
            "I" => return INT,
            "J" => return LONG,
            "S" => return SHORT,
            "Z" => return BOOLEAN,
            "V" => return TypeHandle::Void,
            _ => {}
        }

        if let Some(component) = name.strip_prefix('[') {
            return TypeHandle::array_of(self.resolve(component));
        }

        let reference_name = name
            .strip_prefix('L')
            .and_then(|rest| rest.strip_suffix(';'))
            .unwrap_or(name);

        if is_internal_name(reference_name) {
            TypeHandle::Reference(Arc::from(reference_name))
        } else {
            TypeHandle::Unresolved(Arc::from(name))
        }
    }
}

fn is_internal_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '/'))
}
