use crate::consts::opcodes;
use crate::decompile::config::{
    DecompilationStateSelector, DecompilerConfigurationBuilder, Priority,
};
use crate::error::Result;
use crate::model::{Cast, Element, ElementKind};

pub(crate) fn configure(builder: &mut DecompilerConfigurationBuilder) {
    builder.on(opcodes::CHECKCAST).then(|context, stream, _| {
        let index = stream.next_unsigned_short()?;
        let class_name = context.class_file().constant_pool().class_name(index)?;
        let cast_type = context.type_resolver().resolve(&class_name);
        let value = context.pop()?;

        context.push(Element::Cast(Cast {
            value: Box::new(value),
            cast_type,
        }));

        Ok(true)
    });

    // discarding a cast discards only the cast; the value it wrapped is
    // still live and must not be reduced along with it
    builder
        .on(opcodes::POP)
        .with_priority(Priority::High)
        .when(DecompilationStateSelector::element_is_stacked(
            ElementKind::Cast,
        ))
        .then(|context, _, _| {
            let Element::Cast(cast) = context.pop()? else {
                return Ok(false);
            };

            context.push(*cast.value);
            Ok(true)
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::code_stream::CodeStream;
    use crate::decompile::config::DecompilerConfiguration;
    use crate::decompile::context::DecompilationContext;
    use crate::decompile::fixtures::{self, MethodBuilder, PoolBuilder};
    use crate::model::{Constant, LocalVariableReference};
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

    fn value() -> Element {
        Element::LocalVariable(LocalVariableReference {
            name: Arc::from("value"),
            var_type: TypeHandle::Reference(Arc::from("java/lang/Object")),
            slot: 1,
        })
    }

    #[test]
    fn test_checkcast_wraps_the_stack_top() {
        let mut pool = PoolBuilder::new();
        let class = pool.class("java/lang/String");
        let mut context = context_with_pool(pool);
        let operand = class.to_be_bytes();
        let mut stream = CodeStream::new(&operand);
        context.push(value());

        configuration()
            .try_decompile(&mut context, &mut stream, opcodes::CHECKCAST)
            .unwrap();

        assert_eq!(
            context.pop().unwrap(),
            Element::Cast(Cast {
                value: Box::new(value()),
                cast_type: TypeHandle::Reference(Arc::from("java/lang/String")),
            })
        );
    }

    #[test]
    fn test_pop_unwraps_a_stacked_cast() {
        let mut context = context_with_pool(PoolBuilder::new());
        let mut stream = CodeStream::new(&[]);
        context.push(Element::Cast(Cast {
            value: Box::new(value()),
            cast_type: TypeHandle::Reference(Arc::from("java/lang/String")),
        }));

        let handled = configuration()
            .try_decompile(&mut context, &mut stream, opcodes::POP)
            .unwrap();

        assert!(handled);
        assert_eq!(context.pop().unwrap(), value());
    }

    #[test]
    fn test_pop_without_cast_falls_through() {
        let mut context = context_with_pool(PoolBuilder::new());
        let mut stream = CodeStream::new(&[]);
        context.push(Element::Constant(Constant::int(1)));

        let handled = configuration()
            .try_decompile(&mut context, &mut stream, opcodes::POP)
            .unwrap();

        assert!(!handled);
    }
}
