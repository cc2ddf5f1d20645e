use crate::consts::opcodes;
use crate::decompile::config::DecompilerConfigurationBuilder;
use crate::decompile::context::DecompilationContext;
use crate::error::{Error, Result};
use crate::model::{AllocateInstance, Element, MethodCall, NewInstance};

pub(crate) fn configure(builder: &mut DecompilerConfigurationBuilder) {
    builder.on(opcodes::NEW).then(|context, stream, _| {
        let index = stream.next_unsigned_short()?;
        let class_name = context.class_file().constant_pool().class_name(index)?;
        let instance_type = context.type_resolver().resolve(&class_name);

        context.push(Element::AllocateInstance(AllocateInstance { instance_type }));

        // the allocation stands for the constructed value, so the copy the
        // compiler feeds to <init> is folded away by consuming its dup here
        if stream.next_instruction()? != opcodes::DUP {
            return Err(Error::format(format!(
                "allocation of {class_name} is not followed by dup"
            )));
        }

        Ok(true)
    });

    builder.after(opcodes::INVOKESPECIAL).then(|context, _, _| {
        if !pending_constructor_call(context) {
            return Ok(());
        }

        if let Element::MethodCall(MethodCall {
            signature,
            target: Some(target),
            arguments,
            ..
        }) = context.pop()?
        {
            if let Element::AllocateInstance(allocation) = *target {
                context.push(Element::NewInstance(NewInstance {
                    instance_type: allocation.instance_type,
                    constructor_signature: signature,
                    arguments,
                }));
            }
        }

        Ok(())
    });
}

/// Whether the stack top is a `<init>` call on a pending allocation. Plain
/// `super(...)`/`this(...)` delegation targets a local variable instead and
/// keeps its call form.
fn pending_constructor_call(context: &DecompilationContext) -> bool {
    matches!(
        context.peek(),
        Ok(Element::MethodCall(call))
            if &*call.method_name == "<init>"
                && matches!(call.target.as_deref(), Some(Element::AllocateInstance(_)))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::code_stream::CodeStream;
    use crate::decompile::config::DecompilerConfiguration;
    use crate::decompile::fixtures::{self, MethodBuilder, PoolBuilder};
    use crate::model::{Constant, LocalVariableReference, MethodSignature};
    use crate::types::{TypeHandle, TypeResolver};
    use std::sync::Arc;

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

    #[test]
    fn test_new_pushes_allocation_and_consumes_dup() {
        let mut pool = PoolBuilder::new();
        let class = pool.class("java/lang/StringBuilder");
        let mut context = context_with_pool(pool);
        let index = class.to_be_bytes();
        let operands = [index[0], index[1], opcodes::DUP];
        let mut stream = CodeStream::new(&operands);

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::NEW)
            .unwrap();

        assert_eq!(
            context.pop().unwrap(),
            Element::AllocateInstance(AllocateInstance {
                instance_type: TypeHandle::Reference(Arc::from("java/lang/StringBuilder")),
            })
        );
        // the dup byte is gone from the stream
        assert_eq!(stream.pc(), 3);
    }

    #[test]
    fn test_new_without_dup_fails() {
        let mut pool = PoolBuilder::new();
        let class = pool.class("java/lang/StringBuilder");
        let mut context = context_with_pool(pool);
        let index = class.to_be_bytes();
        let operands = [index[0], index[1], opcodes::NOP];
        let mut stream = CodeStream::new(&operands);

        let error = configuration()
            .try_decompile(&mut context, &mut stream, opcodes::NEW)
            .unwrap_err();

        assert!(matches!(error, Error::Format(_)), "{error:?}");
    }

    #[test]
    fn test_constructor_call_folds_into_new_instance() {
        let mut context = context_with_pool(PoolBuilder::new());
        let mut stream = CodeStream::new(&[]);
        let instance_type = TypeHandle::Reference(Arc::from("java/lang/StringBuilder"));
        context.push(Element::MethodCall(MethodCall {
            target_type: instance_type.clone(),
            method_name: Arc::from("<init>"),
            signature: MethodSignature {
                parameters: vec![crate::types::INT],
                return_type: None,
            },
            target: Some(Box::new(Element::AllocateInstance(AllocateInstance {
                instance_type: instance_type.clone(),
            }))),
            arguments: vec![Element::Constant(Constant::int(16))],
            expression_type: instance_type.clone(),
        }));

        configuration()
            .apply_after(&mut context, &mut stream, opcodes::INVOKESPECIAL)
            .unwrap();

        assert_eq!(
            context.pop().unwrap(),
            Element::NewInstance(NewInstance {
                instance_type,
                constructor_signature: MethodSignature {
                    parameters: vec![crate::types::INT],
                    return_type: None,
                },
                arguments: vec![Element::Constant(Constant::int(16))],
            })
        );
    }

    #[test]
    fn test_super_delegation_keeps_its_call_form() {
        let mut context = context_with_pool(PoolBuilder::new());
        let mut stream = CodeStream::new(&[]);
        context.push(Element::MethodCall(MethodCall {
            target_type: TypeHandle::Reference(Arc::from("java/lang/Object")),
            method_name: Arc::from("<init>"),
            signature: MethodSignature {
                parameters: Vec::new(),
                return_type: None,
            },
            target: Some(Box::new(Element::LocalVariable(LocalVariableReference {
                name: Arc::from("this"),
                var_type: TypeHandle::Reference(Arc::from("Example")),
                slot: 0,
            }))),
            arguments: Vec::new(),
            expression_type: TypeHandle::Reference(Arc::from("java/lang/Object")),
        }));

        configuration()
            .apply_after(&mut context, &mut stream, opcodes::INVOKESPECIAL)
            .unwrap();

        assert!(matches!(
            context.pop().unwrap(),
            Element::MethodCall(call) if call.target.is_some()
        ));
    }

    #[test]
    fn test_enhancement_tolerates_an_empty_stack() {
        let mut context = context_with_pool(PoolBuilder::new());
        let mut stream = CodeStream::new(&[]);

        configuration()
            .apply_after(&mut context, &mut stream, opcodes::INVOKESPECIAL)
            .unwrap();

        assert!(!context.has_stacked_expressions());
    }
}
