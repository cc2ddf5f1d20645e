use crate::consts::opcodes;
use crate::decompile::code_stream::CodeStream;
use crate::decompile::config::DecompilerConfigurationBuilder;
use crate::decompile::context::DecompilationContext;
use crate::error::Result;
use crate::model::{Element, FieldAssignment, FieldReference};

pub(crate) fn configure(builder: &mut DecompilerConfigurationBuilder) {
    builder
        .on_each(&[opcodes::GETFIELD, opcodes::GETSTATIC])
        .then(|context, stream, opcode| {
            let reference = field_reference(context, stream, opcode == opcodes::GETSTATIC)?;
            context.push(Element::FieldReference(reference));
            Ok(true)
        });

    builder
        .on_each(&[opcodes::PUTFIELD, opcodes::PUTSTATIC])
        .then(|context, stream, opcode| {
            let index = stream.next_unsigned_short()?;
            let descriptor = context.class_file().constant_pool().field_ref(index)?;

            let value = context.pop()?;
            let target = if opcode == opcodes::PUTSTATIC {
                None
            } else {
                Some(Box::new(context.pop()?))
            };

            let resolver = context.type_resolver();
            let reference = FieldReference {
                target,
                declaring_type: resolver.resolve(&descriptor.class_name),
                field_type: resolver.resolve(&descriptor.descriptor),
                field_name: descriptor.name,
            };

            context.enlist(Element::FieldAssignment(FieldAssignment {
                field_reference: reference,
                value: Box::new(value),
            }))?;

            Ok(true)
        });
}

fn field_reference(
    context: &mut DecompilationContext,
    stream: &mut CodeStream<'_>,
    is_static: bool,
) -> Result<FieldReference> {
    let index = stream.next_unsigned_short()?;
    let descriptor = context.class_file().constant_pool().field_ref(index)?;

    let target = if is_static {
        None
    } else {
        Some(Box::new(context.pop()?))
    };

    let resolver = context.type_resolver();

    Ok(FieldReference {
        target,
        declaring_type: resolver.resolve(&descriptor.class_name),
        field_type: resolver.resolve(&descriptor.descriptor),
        field_name: descriptor.name,
    })
}
