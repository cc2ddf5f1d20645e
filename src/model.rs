use std::sync::Arc;

use crate::classfile::ReferenceKind;
use crate::descriptor::parse_method_descriptor;
use crate::error::Result;
use crate::types::{self, TypeHandle, TypeResolver};

/// A node of the reconstructed syntax tree. The set of kinds is closed;
/// handlers match on variants instead of downcasting.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Constant(Constant),
    LocalVariable(LocalVariableReference),
    Binary(BinaryOperation),
    MethodCall(MethodCall),
    FieldReference(FieldReference),
    VariableAssignment(VariableAssignment),
    FieldAssignment(FieldAssignment),
    Return,
    ReturnValue(ReturnValue),
    AllocateInstance(AllocateInstance),
    NewInstance(NewInstance),
    NewArray(NewArray),
    ArrayStore(ArrayStore),
    ArrayLoad(ArrayLoad),
    Cast(Cast),
    Lambda(Lambda),
    Branch(Branch),
    Jump(Jump),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Constant,
    LocalVariable,
    Binary,
    MethodCall,
    FieldReference,
    VariableAssignment,
    FieldAssignment,
    Return,
    ReturnValue,
    AllocateInstance,
    NewInstance,
    NewArray,
    ArrayStore,
    ArrayLoad,
    Cast,
    Lambda,
    Branch,
    Jump,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(Arc<str>),
    Class(TypeHandle),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub value: ConstantValue,
    pub value_type: TypeHandle,
}

impl Constant {
    pub fn int(value: i32) -> Self {
        Self {
            value: ConstantValue::Int(value),
            value_type: types::INT,
        }
    }

    pub fn long(value: i64) -> Self {
        Self {
            value: ConstantValue::Long(value),
            value_type: types::LONG,
        }
    }

    pub fn float(value: f32) -> Self {
        Self {
            value: ConstantValue::Float(value),
            value_type: types::FLOAT,
        }
    }

    pub fn double(value: f64) -> Self {
        Self {
            value: ConstantValue::Double(value),
            value_type: types::DOUBLE,
        }
    }

    pub fn string(value: Arc<str>) -> Self {
        Self {
            value: ConstantValue::String(value),
            value_type: TypeHandle::Reference(Arc::from("java/lang/String")),
        }
    }

    pub fn class(class_type: TypeHandle) -> Self {
        Self {
            value: ConstantValue::Class(class_type),
            value_type: TypeHandle::Reference(Arc::from("java/lang/Class")),
        }
    }

    pub fn null() -> Self {
        Self {
            value: ConstantValue::Null,
            value_type: TypeHandle::Reference(Arc::from("java/lang/Object")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariableReference {
    pub name: Arc<str>,
    pub var_type: TypeHandle,
    pub slot: u16,
}

/// Binary operators, including the comparison subset produced by branch
/// instructions and the three-way `Compare` produced by the numeric cmp
/// instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorType {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
    Compare,
}

impl OperatorType {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            OperatorType::Eq
                | OperatorType::Ne
                | OperatorType::Lt
                | OperatorType::Ge
                | OperatorType::Gt
                | OperatorType::Le
        )
    }

    /// The complementary comparison, or `None` for operators that have no
    /// inverse.
    pub fn invert(self) -> Option<OperatorType> {
        Some(match self {
            OperatorType::Eq => OperatorType::Ne,
            OperatorType::Ne => OperatorType::Eq,
            OperatorType::Lt => OperatorType::Ge,
            OperatorType::Ge => OperatorType::Lt,
            OperatorType::Gt => OperatorType::Le,
            OperatorType::Le => OperatorType::Gt,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOperation {
    pub left: Box<Element>,
    pub operator: OperatorType,
    pub right: Box<Element>,
    pub result_type: TypeHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub parameters: Vec<TypeHandle>,
    pub return_type: Option<TypeHandle>,
}

impl MethodSignature {
    pub fn from_descriptor(descriptor: &str, resolver: &TypeResolver) -> Result<Self> {
        let parsed = parse_method_descriptor(descriptor)?;

        Ok(Self {
            parameters: parsed
                .parameters()
                .iter()
                .map(|parameter| resolver.resolve_field_type(parameter))
                .collect(),
            return_type: parsed
                .return_type()
                .as_ref()
                .map(|return_type| resolver.resolve_field_type(return_type)),
        })
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// The return type with `void` made explicit.
    pub fn return_type_handle(&self) -> TypeHandle {
        self.return_type.clone().unwrap_or(TypeHandle::Void)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub target_type: TypeHandle,
    pub method_name: Arc<str>,
    pub signature: MethodSignature,
    /// The receiver; `None` for static calls.
    pub target: Option<Box<Element>>,
    pub arguments: Vec<Element>,
    pub expression_type: TypeHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldReference {
    /// The instance being read; `None` for static fields.
    pub target: Option<Box<Element>>,
    pub declaring_type: TypeHandle,
    pub field_type: TypeHandle,
    pub field_name: Arc<str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableAssignment {
    pub value: Box<Element>,
    pub slot: u16,
    pub variable_name: Arc<str>,
    pub variable_type: TypeHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldAssignment {
    pub field_reference: FieldReference,
    pub value: Box<Element>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnValue {
    pub value: Box<Element>,
}

/// A bare allocation, pending its constructor call.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocateInstance {
    pub instance_type: TypeHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInstance {
    pub instance_type: TypeHandle,
    pub constructor_signature: MethodSignature,
    pub arguments: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayInitializer {
    pub index: i32,
    pub value: Element,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewArray {
    pub array_type: TypeHandle,
    pub component_type: TypeHandle,
    pub length: Box<Element>,
    pub initializers: Vec<ArrayInitializer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayStore {
    pub array: Box<Element>,
    pub index: Box<Element>,
    pub value: Box<Element>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLoad {
    pub array: Box<Element>,
    pub index: Box<Element>,
    pub component_type: TypeHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cast {
    pub value: Box<Element>,
    pub cast_type: TypeHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    /// The bound receiver, popped when the backing method is invoked in a
    /// receiver-bound style.
    pub self_expression: Option<Box<Element>>,
    pub kind: ReferenceKind,
    pub functional_interface: TypeHandle,
    pub functional_method_name: Arc<str>,
    pub interface_signature: MethodSignature,
    pub declaring_class: TypeHandle,
    pub backing_method_name: Arc<str>,
    pub backing_signature: MethodSignature,
    /// Captured locals, in invocation order.
    pub captures: Vec<LocalVariableReference>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub left: Box<Element>,
    pub operator: OperatorType,
    pub right: Box<Element>,
    pub target_pc: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Jump {
    pub target_pc: u32,
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Constant(_) => ElementKind::Constant,
            Element::LocalVariable(_) => ElementKind::LocalVariable,
            Element::Binary(_) => ElementKind::Binary,
            Element::MethodCall(_) => ElementKind::MethodCall,
            Element::FieldReference(_) => ElementKind::FieldReference,
            Element::VariableAssignment(_) => ElementKind::VariableAssignment,
            Element::FieldAssignment(_) => ElementKind::FieldAssignment,
            Element::Return => ElementKind::Return,
            Element::ReturnValue(_) => ElementKind::ReturnValue,
            Element::AllocateInstance(_) => ElementKind::AllocateInstance,
            Element::NewInstance(_) => ElementKind::NewInstance,
            Element::NewArray(_) => ElementKind::NewArray,
            Element::ArrayStore(_) => ElementKind::ArrayStore,
            Element::ArrayLoad(_) => ElementKind::ArrayLoad,
            Element::Cast(_) => ElementKind::Cast,
            Element::Lambda(_) => ElementKind::Lambda,
            Element::Branch(_) => ElementKind::Branch,
            Element::Jump(_) => ElementKind::Jump,
        }
    }

    /// Whether this element may stand alone as a top-level statement.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            Element::MethodCall(_)
                | Element::VariableAssignment(_)
                | Element::FieldAssignment(_)
                | Element::Return
                | Element::ReturnValue(_)
                | Element::NewInstance(_)
                | Element::ArrayStore(_)
                | Element::Branch(_)
                | Element::Jump(_)
        )
    }

    /// The static type of this element when used as an expression; `Void`
    /// for pure statements and void calls.
    pub fn type_handle(&self) -> TypeHandle {
        match self {
            Element::Constant(constant) => constant.value_type.clone(),
            Element::LocalVariable(variable) => variable.var_type.clone(),
            Element::Binary(binary) => binary.result_type.clone(),
            Element::MethodCall(call) => call.expression_type.clone(),
            Element::FieldReference(field) => field.field_type.clone(),
            Element::VariableAssignment(assignment) => assignment.variable_type.clone(),
            Element::FieldAssignment(assignment) => {
                assignment.field_reference.field_type.clone()
            }
            Element::AllocateInstance(allocation) => allocation.instance_type.clone(),
            Element::NewInstance(instance) => instance.instance_type.clone(),
            Element::NewArray(array) => array.array_type.clone(),
            Element::ArrayLoad(load) => load.component_type.clone(),
            Element::Cast(cast) => cast.cast_type.clone(),
            Element::Lambda(lambda) => lambda.functional_interface.clone(),
            Element::Return
            | Element::ReturnValue(_)
            | Element::ArrayStore(_)
            | Element::Branch(_)
            | Element::Jump(_) => TypeHandle::Void,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Element::Constant(constant) => Some(constant),
            _ => None,
        }
    }

    pub fn as_local_variable(&self) -> Option<&LocalVariableReference> {
        match self {
            Element::LocalVariable(variable) => Some(variable),
            _ => None,
        }
    }

    pub fn as_method_call(&self) -> Option<&MethodCall> {
        match self {
            Element::MethodCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_allocate_instance(&self) -> Option<&AllocateInstance> {
        match self {
            Element::AllocateInstance(allocation) => Some(allocation),
            _ => None,
        }
    }

    pub fn as_new_array(&self) -> Option<&NewArray> {
        match self {
            Element::NewArray(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_cast(&self) -> Option<&Cast> {
        match self {
            Element::Cast(cast) => Some(cast),
            _ => None,
        }
    }

    pub fn as_lambda(&self) -> Option<&Lambda> {
        match self {
            Element::Lambda(lambda) => Some(lambda),
            _ => None,
        }
    }

    pub fn as_branch(&self) -> Option<&Branch> {
        match self {
            Element::Branch(branch) => Some(branch),
            _ => None,
        }
    }

    /// Searches this element and its sub-expressions for a `Lambda` whose
    /// backing method has the given name.
    pub fn find_lambda(&self, backing_method_name: &str) -> Option<&Lambda> {
        match self {
            Element::Lambda(lambda) => {
                if &*lambda.backing_method_name == backing_method_name {
                    Some(lambda)
                } else {
                    lambda
                        .self_expression
                        .as_deref()
                        .and_then(|e| e.find_lambda(backing_method_name))
                }
            }
            Element::Binary(binary) => binary
                .left
                .find_lambda(backing_method_name)
                .or_else(|| binary.right.find_lambda(backing_method_name)),
            Element::MethodCall(call) => call
                .target
                .as_deref()
                .and_then(|e| e.find_lambda(backing_method_name))
                .or_else(|| {
                    call.arguments
                        .iter()
                        .find_map(|e| e.find_lambda(backing_method_name))
                }),
            Element::FieldReference(field) => field
                .target
                .as_deref()
                .and_then(|e| e.find_lambda(backing_method_name)),
            Element::VariableAssignment(assignment) => {
                assignment.value.find_lambda(backing_method_name)
            }
            Element::FieldAssignment(assignment) => assignment
                .field_reference
                .target
                .as_deref()
                .and_then(|e| e.find_lambda(backing_method_name))
                .or_else(|| assignment.value.find_lambda(backing_method_name)),
            Element::ReturnValue(return_value) => {
                return_value.value.find_lambda(backing_method_name)
            }
            Element::NewInstance(instance) => instance
                .arguments
                .iter()
                .find_map(|e| e.find_lambda(backing_method_name)),
            Element::NewArray(array) => array
                .length
                .find_lambda(backing_method_name)
                .or_else(|| {
                    array
                        .initializers
                        .iter()
                        .find_map(|initializer| {
                            initializer.value.find_lambda(backing_method_name)
                        })
                }),
            Element::ArrayStore(store) => store
                .array
                .find_lambda(backing_method_name)
                .or_else(|| store.index.find_lambda(backing_method_name))
                .or_else(|| store.value.find_lambda(backing_method_name)),
            Element::ArrayLoad(load) => load
                .array
                .find_lambda(backing_method_name)
                .or_else(|| load.index.find_lambda(backing_method_name)),
            Element::Cast(cast) => cast.value.find_lambda(backing_method_name),
            Element::Branch(branch) => branch
                .left
                .find_lambda(backing_method_name)
                .or_else(|| branch.right.find_lambda(backing_method_name)),
            Element::Constant(_)
            | Element::LocalVariable(_)
            | Element::Return
            | Element::AllocateInstance(_)
            | Element::Jump(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str) -> Element {
        Element::LocalVariable(LocalVariableReference {
            name: Arc::from(name),
            var_type: types::INT,
            slot: 1,
        })
    }

    #[test]
    fn test_statement_subset() {
        assert!(Element::Return.is_statement());
        assert!(
            Element::VariableAssignment(VariableAssignment {
                value: Box::new(Element::Constant(Constant::int(1))),
                slot: 1,
                variable_name: Arc::from("n"),
                variable_type: types::INT,
            })
            .is_statement()
        );

        assert!(!Element::Constant(Constant::int(1)).is_statement());
        assert!(!local("n").is_statement());
        assert!(
            !Element::Cast(Cast {
                value: Box::new(local("n")),
                cast_type: types::LONG,
            })
            .is_statement()
        );
    }

    #[test]
    fn test_operator_inversion() {
        assert_eq!(OperatorType::Ne.invert(), Some(OperatorType::Eq));
        assert_eq!(OperatorType::Lt.invert(), Some(OperatorType::Ge));
        assert_eq!(OperatorType::Le.invert(), Some(OperatorType::Gt));
        assert_eq!(OperatorType::Plus.invert(), None);
        assert_eq!(OperatorType::Compare.invert(), None);
    }

    #[test]
    fn test_comparison_type_is_boolean() {
        let comparison = Element::Binary(BinaryOperation {
            left: Box::new(local("a")),
            operator: OperatorType::Eq,
            right: Box::new(Element::Constant(Constant::int(0))),
            result_type: types::BOOLEAN,
        });

        assert_eq!(comparison.type_handle(), types::BOOLEAN);
    }

    #[test]
    fn test_method_signature_from_descriptor() {
        let resolver = TypeResolver::new();
        let signature =
            MethodSignature::from_descriptor("(Ljava/lang/String;I)V", &resolver).unwrap();

        assert_eq!(signature.parameter_count(), 2);
        assert_eq!(signature.parameters[1], types::INT);
        assert_eq!(signature.return_type_handle(), TypeHandle::Void);
    }

    #[test]
    fn test_find_lambda_in_nested_expression() {
        let resolver = TypeResolver::new();
        let lambda = Lambda {
            self_expression: None,
            kind: ReferenceKind::InvokeStatic,
            functional_interface: resolver.resolve("java/util/function/Supplier"),
            functional_method_name: Arc::from("get"),
            interface_signature: MethodSignature::from_descriptor("()Ljava/lang/Object;", &resolver)
                .unwrap(),
            declaring_class: resolver.resolve("Example"),
            backing_method_name: Arc::from("lambda$run$0"),
            backing_signature: MethodSignature::from_descriptor("()Ljava/lang/Object;", &resolver)
                .unwrap(),
            captures: vec![],
        };

        let statement = Element::VariableAssignment(VariableAssignment {
            value: Box::new(Element::Cast(Cast {
                value: Box::new(Element::Lambda(lambda)),
                cast_type: resolver.resolve("java/util/function/Supplier"),
            })),
            slot: 1,
            variable_name: Arc::from("supplier"),
            variable_type: resolver.resolve("java/util/function/Supplier"),
        });

        assert!(statement.find_lambda("lambda$run$0").is_some());
        assert!(statement.find_lambda("lambda$run$1").is_none());
    }
}
