use std::sync::Arc;

use crate::consts::opcodes;
use crate::decompile::code_stream::CodeStream;
use crate::decompile::config::DecompilerConfigurationBuilder;
use crate::decompile::context::DecompilationContext;
use crate::error::{Error, Result};
use crate::model::{
    BinaryOperation, Constant, Element, LocalVariableReference, OperatorType, VariableAssignment,
};
use crate::types;

pub(crate) fn configure(builder: &mut DecompilerConfigurationBuilder) {
    builder
        .on_each(&[
            opcodes::ILOAD,
            opcodes::LLOAD,
            opcodes::FLOAD,
            opcodes::DLOAD,
            opcodes::ALOAD,
        ])
        .then(|context, stream, _| {
            let slot = u16::from(stream.next_unsigned_byte()?);
            load(context, slot)?;
            Ok(true)
        });

    // the short forms pack the slot into the opcode, four per type
    builder
        .on_range(opcodes::ILOAD_0, opcodes::ALOAD_3)
        .then(|context, _, opcode| {
            load(context, u16::from((opcode - opcodes::ILOAD_0) % 4))?;
            Ok(true)
        });

    builder
        .on_each(&[
            opcodes::ISTORE,
            opcodes::LSTORE,
            opcodes::FSTORE,
            opcodes::DSTORE,
            opcodes::ASTORE,
        ])
        .then(|context, stream, _| {
            let slot = u16::from(stream.next_unsigned_byte()?);
            store(context, slot)?;
            Ok(true)
        });

    builder
        .on_range(opcodes::ISTORE_0, opcodes::ASTORE_3)
        .then(|context, _, opcode| {
            store(context, u16::from((opcode - opcodes::ISTORE_0) % 4))?;
            Ok(true)
        });

    builder.on(opcodes::IINC).then(increment);
}

/// Resolves `slot` against the local variable table. Loads resolve at the
/// instruction itself; stores resolve one byte further on, because the
/// table entry of the assigned variable only begins after the store.
fn variable_reference(
    context: &DecompilationContext,
    slot: u16,
    pc: u32,
) -> Result<LocalVariableReference> {
    let variable = context
        .method()
        .local_variable(slot, pc)
        .ok_or(Error::LocalVariableUnavailable { slot, pc })?;

    Ok(LocalVariableReference {
        name: Arc::clone(variable.name()),
        var_type: context.type_resolver().resolve(variable.descriptor()),
        slot,
    })
}

fn load(context: &mut DecompilationContext, slot: u16) -> Result<()> {
    let variable = variable_reference(context, slot, context.pc())?;
    context.push(Element::LocalVariable(variable));
    Ok(())
}

fn store(context: &mut DecompilationContext, slot: u16) -> Result<()> {
    let variable = variable_reference(context, slot, context.pc() + 1)?;
    let value = context.pop()?;

    context.enlist(Element::VariableAssignment(VariableAssignment {
        value: Box::new(value),
        slot,
        variable_name: variable.name,
        variable_type: variable.var_type,
    }))
}

fn increment(
    context: &mut DecompilationContext,
    stream: &mut CodeStream<'_>,
    _: u8,
) -> Result<bool> {
    let slot = u16::from(stream.next_unsigned_byte()?);
    let delta = i32::from(stream.next_byte()?);
    let variable = variable_reference(context, slot, context.pc())?;

    let value = Element::Binary(BinaryOperation {
        left: Box::new(Element::LocalVariable(variable.clone())),
        operator: OperatorType::Plus,
        right: Box::new(Element::Constant(Constant::int(delta))),
        result_type: types::INT,
    });

    context.enlist(Element::VariableAssignment(VariableAssignment {
        value: Box::new(value),
        slot,
        variable_name: variable.name,
        variable_type: variable.var_type,
    }))?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::config::DecompilerConfiguration;
    use crate::decompile::fixtures::{self, MethodBuilder};
    use crate::types::TypeResolver;

    fn configuration() -> DecompilerConfiguration {
        let mut builder = DecompilerConfiguration::builder();
        configure(&mut builder);
        builder.build()
    }

    fn context_with(method: crate::classfile::MethodInfo) -> DecompilationContext {
        let class_file = fixtures::class_file("Example", Vec::new(), vec![method.clone()]);
        DecompilationContext::new(class_file, method, Arc::new(TypeResolver::new()), 0)
    }

    #[test]
    fn test_slot_coded_load_pushes_local_variable() {
        let method = MethodBuilder::new("run", "()V")
            .code(vec![opcodes::ILOAD_1, opcodes::RETURN])
            .local(0, 2, "count", "I", 1)
            .build();
        let mut context = context_with(method);
        let mut stream = CodeStream::new(&[]);

        let handled = configuration()
            .try_decompile(&mut context, &mut stream, opcodes::ILOAD_1)
            .unwrap();

        assert!(handled);
        assert_eq!(
            context.pop().unwrap(),
            Element::LocalVariable(LocalVariableReference {
                name: Arc::from("count"),
                var_type: types::INT,
                slot: 1,
            })
        );
    }

    #[test]
    fn test_operand_coded_load_reads_slot_from_stream() {
        let method = MethodBuilder::new("run", "()V")
            .code(vec![opcodes::ALOAD, 4, opcodes::RETURN])
            .local(0, 3, "name", "Ljava/lang/String;", 4)
            .build();
        let mut context = context_with(method);
        let mut stream = CodeStream::new(&[4]);

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::ALOAD)
            .unwrap();

        let variable = context.pop().unwrap();
        assert_eq!(
            variable.as_local_variable().map(|v| v.slot),
            Some(4),
            "{variable:?}"
        );
    }

    #[test]
    fn test_load_without_table_entry_fails() {
        let method = MethodBuilder::new("run", "()V")
            .code(vec![opcodes::ILOAD_2, opcodes::RETURN])
            .build();
        let mut context = context_with(method);
        let mut stream = CodeStream::new(&[]);

        let error = configuration()
            .try_decompile(&mut context, &mut stream, opcodes::ILOAD_2)
            .unwrap_err();

        assert!(matches!(
            error,
            Error::LocalVariableUnavailable { slot: 2, pc: 0 }
        ));
    }

    #[test]
    fn test_store_enlists_assignment() {
        let method = MethodBuilder::new("run", "()V")
            .code(vec![opcodes::ICONST_2, opcodes::ISTORE_1, opcodes::RETURN])
            .local(2, 1, "count", "I", 1)
            .build();
        let mut context = context_with(method);
        let mut stream = CodeStream::new(&[]);
        context.advance(1);
        context.push(Element::Constant(Constant::int(2)));

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::ISTORE_1)
            .unwrap();

        assert!(!context.has_stacked_expressions());
        assert_eq!(
            context.statements()[0].element(),
            &Element::VariableAssignment(VariableAssignment {
                value: Box::new(Element::Constant(Constant::int(2))),
                slot: 1,
                variable_name: Arc::from("count"),
                variable_type: types::INT,
            })
        );
    }

    #[test]
    fn test_store_resolves_table_entry_at_following_pc() {
        // the entry begins only after the store instruction
        let method = MethodBuilder::new("run", "()V")
            .code(vec![opcodes::ICONST_0, opcodes::ISTORE_0, opcodes::RETURN])
            .local(2, 1, "value", "I", 0)
            .build();
        let mut context = context_with(method);
        let mut stream = CodeStream::new(&[]);
        context.advance(1);
        context.push(Element::Constant(Constant::int(0)));

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::ISTORE_0)
            .unwrap();

        assert_eq!(context.statements().len(), 1);
    }

    #[test]
    fn test_iinc_enlists_incrementing_assignment() {
        let method = MethodBuilder::new("run", "()V")
            .code(vec![opcodes::IINC, 1, 5, opcodes::RETURN])
            .local(0, 4, "i", "I", 1)
            .build();
        let mut context = context_with(method);
        let mut stream = CodeStream::new(&[1, 5]);

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::IINC)
            .unwrap();

        let variable = LocalVariableReference {
            name: Arc::from("i"),
            var_type: types::INT,
            slot: 1,
        };
        assert_eq!(
            context.statements()[0].element(),
            &Element::VariableAssignment(VariableAssignment {
                value: Box::new(Element::Binary(BinaryOperation {
                    left: Box::new(Element::LocalVariable(variable)),
                    operator: OperatorType::Plus,
                    right: Box::new(Element::Constant(Constant::int(5))),
                    result_type: types::INT,
                })),
                slot: 1,
                variable_name: Arc::from("i"),
                variable_type: types::INT,
            })
        );
    }

    #[test]
    fn test_iinc_with_negative_delta() {
        let method = MethodBuilder::new("run", "()V")
            .code(vec![opcodes::IINC, 1, 0xff, opcodes::RETURN])
            .local(0, 4, "i", "I", 1)
            .build();
        let mut context = context_with(method);
        let mut stream = CodeStream::new(&[1, 0xff]);

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::IINC)
            .unwrap();

        let statement = context.statements()[0].element().clone();
        let Element::VariableAssignment(assignment) = statement else {
            panic!("not an assignment: {statement:?}");
        };
        let Element::Binary(operation) = *assignment.value else {
            panic!("not a binary operation");
        };
        assert_eq!(*operation.right, Element::Constant(Constant::int(-1)));
    }
}
