use std::sync::Arc;

use crate::consts::opcodes;
use crate::decompile::code_stream::CodeStream;
use crate::decompile::config::{
    DecompilationStateSelector, DecompilerConfigurationBuilder, Priority,
};
use crate::decompile::context::DecompilationContext;
use crate::error::{Error, Result};
use crate::model::{
    ArrayInitializer, ArrayLoad, ArrayStore, Constant, ConstantValue, Element, ElementKind,
    FieldReference, NewArray,
};
use crate::types::{self, TypeHandle};

pub(crate) fn configure(builder: &mut DecompilerConfigurationBuilder) {
    // a freshly allocated array already stands for the duplicated value
    builder
        .on(opcodes::DUP)
        .with_priority(Priority::High)
        .when(DecompilationStateSelector::element_is_stacked(
            ElementKind::NewArray,
        ))
        .then(|_, _, _| Ok(true));

    builder.on(opcodes::NEWARRAY).then(|context, stream, _| {
        let component_type = primitive_component(stream.next_unsigned_byte()?)?;
        let length = context.pop()?;

        context.push(Element::NewArray(NewArray {
            array_type: TypeHandle::array_of(component_type.clone()),
            component_type,
            length: Box::new(length),
            initializers: Vec::new(),
        }));

        Ok(true)
    });

    builder.on(opcodes::ANEWARRAY).then(|context, stream, _| {
        let index = stream.next_unsigned_short()?;
        let class_name = context.class_file().constant_pool().class_name(index)?;
        let component_type = context.type_resolver().resolve(&class_name);
        let length = context.pop()?;

        context.push(Element::NewArray(NewArray {
            array_type: TypeHandle::array_of(component_type.clone()),
            component_type,
            length: Box::new(length),
            initializers: Vec::new(),
        }));

        if matches!(stream.peek_instruction(), Ok(opcode) if opcode == opcodes::DUP) {
            stream.commit();
        }

        Ok(true)
    });

    builder
        .on_range(opcodes::IASTORE, opcodes::SASTORE)
        .then(|context, _, _| {
            store(context)?;
            Ok(true)
        });

    for (opcode, component_type) in [
        (opcodes::IALOAD, types::INT),
        (opcodes::LALOAD, types::LONG),
        (opcodes::FALOAD, types::FLOAT),
        (opcodes::DALOAD, types::DOUBLE),
        (opcodes::BALOAD, types::BOOLEAN),
        (opcodes::CALOAD, types::CHAR),
        (opcodes::SALOAD, types::SHORT),
    ] {
        builder.on(opcode).then(move |context, _, _| {
            load(context, component_type.clone())?;
            Ok(true)
        });
    }

    builder.on(opcodes::AALOAD).then(|context, _, _| {
        let index = context.pop()?;
        let array = context.pop()?;
        let component_type = reference_component(context, &array)?;

        context.push(Element::ArrayLoad(ArrayLoad {
            array: Box::new(array),
            index: Box::new(index),
            component_type,
        }));

        Ok(true)
    });

    builder.on(opcodes::ARRAYLENGTH).then(|context, _, _| {
        let array = context.pop()?;
        let declaring_type = array.type_handle();

        context.push(Element::FieldReference(FieldReference {
            target: Some(Box::new(array)),
            declaring_type,
            field_type: types::INT,
            field_name: Arc::from("length"),
        }));

        Ok(true)
    });
}

fn primitive_component(type_code: u8) -> Result<TypeHandle> {
    Ok(match type_code {
        4 => types::BOOLEAN,
        5 => types::CHAR,
        6 => types::FLOAT,
        7 => types::DOUBLE,
        8 => types::BYTE,
        9 => types::SHORT,
        10 => types::INT,
        11 => types::LONG,
        other => {
            return Err(Error::format(format!(
                "invalid primitive array type code {other}"
            )));
        }
    })
}

/// The component type carried by a reference-array value. A value whose type
/// never resolved keeps its raw descriptor, so arrays can still be peeled by
/// stripping one `[`.
fn reference_component(context: &DecompilationContext, array: &Element) -> Result<TypeHandle> {
    match array.type_handle() {
        TypeHandle::Array(component) => Ok(component.as_ref().clone()),
        TypeHandle::Unresolved(name) if name.starts_with('[') => {
            Ok(context.type_resolver().resolve(&name[1..]))
        }
        other => Err(Error::format(format!("aaload on non-array value {other}"))),
    }
}

fn load(context: &mut DecompilationContext, component_type: TypeHandle) -> Result<()> {
    let index = context.pop()?;
    let array = context.pop()?;

    context.push(Element::ArrayLoad(ArrayLoad {
        array: Box::new(array),
        index: Box::new(index),
        component_type,
    }));

    Ok(())
}

/// A store into an array still being built is folded into its initializer
/// list; a store into anything else is a standalone statement.
fn store(context: &mut DecompilationContext) -> Result<()> {
    let value = context.pop()?;
    let index = context.pop()?;
    let array = context.pop()?;

    if let Element::NewArray(mut array) = array {
        let position = match index.as_constant() {
            Some(Constant {
                value: ConstantValue::Int(position),
                ..
            }) => *position,
            _ => {
                return Err(Error::format(
                    "array initializer index is not an int constant",
                ));
            }
        };

        array.initializers.push(ArrayInitializer {
            index: position,
            value,
        });
        context.push(Element::NewArray(array));

        return Ok(());
    }

    context.enlist(Element::ArrayStore(ArrayStore {
        array: Box::new(array),
        index: Box::new(index),
        value: Box::new(value),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::config::DecompilerConfiguration;
    use crate::decompile::fixtures::{self, MethodBuilder, PoolBuilder};
    use crate::model::LocalVariableReference;
    use crate::types::TypeResolver;

    fn configuration() -> DecompilerConfiguration {
        let mut builder = DecompilerConfiguration::builder();
        configure(&mut builder);
        builder.build()
    }

    fn context_with_pool(pool: PoolBuilder) -> DecompilationContext {
        let method = MethodBuilder::new("run", "()V")
            .code(vec![opcodes::RETURN])
            .build();
        let class_file = fixtures::class_file("Example", pool.entries(), vec![method.clone()]);
        DecompilationContext::new(class_file, method, Arc::new(TypeResolver::new()), 0)
    }

    fn context() -> DecompilationContext {
        context_with_pool(PoolBuilder::new())
    }

    fn int_array(length: i32) -> Element {
        Element::NewArray(NewArray {
            array_type: TypeHandle::array_of(types::INT),
            component_type: types::INT,
            length: Box::new(Element::Constant(Constant::int(length))),
            initializers: Vec::new(),
        })
    }

    fn array_variable() -> Element {
        Element::LocalVariable(LocalVariableReference {
            name: Arc::from("values"),
            var_type: TypeHandle::array_of(types::INT),
            slot: 1,
        })
    }

    #[test]
    fn test_newarray_pushes_primitive_array() {
        let mut context = context();
        let mut stream = CodeStream::new(&[10]);
        context.push(Element::Constant(Constant::int(3)));

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::NEWARRAY)
            .unwrap();

        assert_eq!(context.pop().unwrap(), int_array(3));
    }

    #[test]
    fn test_newarray_rejects_unknown_type_code() {
        let mut context = context();
        let mut stream = CodeStream::new(&[99]);
        context.push(Element::Constant(Constant::int(3)));

        let error = configuration()
            .try_decompile(&mut context, &mut stream, opcodes::NEWARRAY)
            .unwrap_err();

        assert!(matches!(error, Error::Format(_)), "{error:?}");
    }

    #[test]
    fn test_anewarray_consumes_trailing_dup() {
        let mut pool = PoolBuilder::new();
        let class = pool.class("java/lang/String");
        let mut context = context_with_pool(pool);
        let index = class.to_be_bytes();
        let operands = [index[0], index[1], opcodes::DUP];
        let mut stream = CodeStream::new(&operands);
        context.push(Element::Constant(Constant::int(2)));

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::ANEWARRAY)
            .unwrap();

        let Element::NewArray(array) = context.pop().unwrap() else {
            panic!("not an array allocation");
        };
        assert_eq!(
            array.component_type,
            TypeHandle::Reference(Arc::from("java/lang/String"))
        );
        assert_eq!(stream.pc(), 3);
    }

    #[test]
    fn test_dup_over_pending_array_is_swallowed() {
        let mut context = context();
        let mut stream = CodeStream::new(&[]);
        context.push(int_array(1));

        let handled = configuration()
            .try_decompile(&mut context, &mut stream, opcodes::DUP)
            .unwrap();

        assert!(handled);
        assert_eq!(context.stacked_expressions().len(), 1);
    }

    #[test]
    fn test_store_into_pending_array_folds_into_initializers() {
        let mut context = context();
        let mut stream = CodeStream::new(&[]);
        context.push(int_array(2));
        context.push(Element::Constant(Constant::int(0)));
        context.push(Element::Constant(Constant::int(41)));

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::IASTORE)
            .unwrap();

        let Element::NewArray(array) = context.pop().unwrap() else {
            panic!("not an array allocation");
        };
        assert_eq!(
            array.initializers,
            vec![ArrayInitializer {
                index: 0,
                value: Element::Constant(Constant::int(41)),
            }]
        );
    }

    #[test]
    fn test_store_into_pending_array_needs_constant_index() {
        let mut context = context();
        let mut stream = CodeStream::new(&[]);
        context.push(int_array(2));
        context.push(array_variable());
        context.push(Element::Constant(Constant::int(41)));

        let error = configuration()
            .try_decompile(&mut context, &mut stream, opcodes::IASTORE)
            .unwrap_err();

        assert!(matches!(error, Error::Format(_)), "{error:?}");
    }

    #[test]
    fn test_store_into_variable_enlists_statement() {
        let mut context = context();
        let mut stream = CodeStream::new(&[]);
        context.push(array_variable());
        context.push(Element::Constant(Constant::int(0)));
        context.push(Element::Constant(Constant::int(41)));

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::IASTORE)
            .unwrap();

        assert_eq!(
            context.statements()[0].element(),
            &Element::ArrayStore(ArrayStore {
                array: Box::new(array_variable()),
                index: Box::new(Element::Constant(Constant::int(0))),
                value: Box::new(Element::Constant(Constant::int(41))),
            })
        );
    }

    #[test]
    fn test_typed_load_pushes_array_load() {
        let mut context = context();
        let mut stream = CodeStream::new(&[]);
        context.push(array_variable());
        context.push(Element::Constant(Constant::int(1)));

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::IALOAD)
            .unwrap();

        assert_eq!(
            context.pop().unwrap(),
            Element::ArrayLoad(ArrayLoad {
                array: Box::new(array_variable()),
                index: Box::new(Element::Constant(Constant::int(1))),
                component_type: types::INT,
            })
        );
    }

    #[test]
    fn test_aaload_derives_component_from_array_type() {
        let string_array = Element::LocalVariable(LocalVariableReference {
            name: Arc::from("names"),
            var_type: TypeHandle::array_of(TypeHandle::Reference(Arc::from("java/lang/String"))),
            slot: 1,
        });
        let mut context = context();
        let mut stream = CodeStream::new(&[]);
        context.push(string_array);
        context.push(Element::Constant(Constant::int(0)));

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::AALOAD)
            .unwrap();

        let Element::ArrayLoad(load) = context.pop().unwrap() else {
            panic!("not an array load");
        };
        assert_eq!(
            load.component_type,
            TypeHandle::Reference(Arc::from("java/lang/String"))
        );
    }

    #[test]
    fn test_aaload_on_non_array_fails() {
        let mut context = context();
        let mut stream = CodeStream::new(&[]);
        context.push(Element::Constant(Constant::int(1)));
        context.push(Element::Constant(Constant::int(0)));

        let error = configuration()
            .try_decompile(&mut context, &mut stream, opcodes::AALOAD)
            .unwrap_err();

        assert!(matches!(error, Error::Format(_)), "{error:?}");
    }

    #[test]
    fn test_arraylength_reads_like_a_field() {
        let mut context = context();
        let mut stream = CodeStream::new(&[]);
        context.push(array_variable());

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::ARRAYLENGTH)
            .unwrap();

        assert_eq!(
            context.pop().unwrap(),
            Element::FieldReference(FieldReference {
                target: Some(Box::new(array_variable())),
                declaring_type: TypeHandle::array_of(types::INT),
                field_type: types::INT,
                field_name: Arc::from("length"),
            })
        );
    }
}
