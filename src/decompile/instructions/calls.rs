use crate::classfile::MethodRefDescriptor;
use crate::consts::opcodes;
use crate::decompile::code_stream::CodeStream;
use crate::decompile::config::DecompilerConfigurationBuilder;
use crate::decompile::context::DecompilationContext;
use crate::error::{Error, Result};
use crate::model::{Element, MethodCall, MethodSignature};

pub(crate) fn configure(builder: &mut DecompilerConfigurationBuilder) {
    builder
        .on_each(&[opcodes::INVOKEVIRTUAL, opcodes::INVOKESPECIAL])
        .then(|context, stream, _| {
            let index = stream.next_unsigned_short()?;
            let reference = context.class_file().constant_pool().method_ref(index)?;
            invoke(context, reference, false)?;
            Ok(true)
        });

    builder.on(opcodes::INVOKESTATIC).then(|context, stream, _| {
        let index = stream.next_unsigned_short()?;
        let reference = context.class_file().constant_pool().method_ref(index)?;
        invoke(context, reference, true)?;
        Ok(true)
    });

    builder
        .on(opcodes::INVOKEINTERFACE)
        .then(|context, stream, _| {
            let index = stream.next_unsigned_short()?;
            let reference = context
                .class_file()
                .constant_pool()
                .interface_method_ref(index)?;
            invoke(context, reference, false)?;

            // the historical operand layout: an argument count that must not
            // be zero, then a byte that must be zero
            if stream.next_unsigned_byte()? == 0 {
                return Err(Error::format(
                    "interface call count operand must not be zero",
                ));
            }
            if stream.next_unsigned_byte()? != 0 {
                return Err(Error::format(
                    "interface call operands must end with a zero byte",
                ));
            }

            Ok(true)
        });
}

fn invoke(
    context: &mut DecompilationContext,
    reference: MethodRefDescriptor,
    is_static: bool,
) -> Result<()> {
    let resolver = context.type_resolver();
    let signature = MethodSignature::from_descriptor(&reference.descriptor, resolver)?;
    let target_type = resolver.resolve(&reference.class_name);
    let is_void = signature.return_type.is_none();

    // a constructor call produces the constructed instance, not `void`
    let expression_type = if &*reference.name == "<init>" {
        target_type.clone()
    } else {
        signature.return_type_handle()
    };

    let mut arguments = Vec::with_capacity(signature.parameter_count());
    for _ in 0..signature.parameter_count() {
        arguments.push(context.pop()?);
    }
    arguments.reverse();

    let target = if is_static {
        None
    } else {
        Some(Box::new(context.pop()?))
    };

    context.push(Element::MethodCall(MethodCall {
        target_type,
        method_name: reference.name,
        signature,
        target,
        arguments,
        expression_type,
    }));

    // nothing can consume the missing value, so the call is a statement
    if is_static && is_void {
        context.reduce_all()?;
    }

    Ok(())
}
