use std::sync::Arc;

use crate::classfile::ReferenceKind;
use crate::consts::opcodes;
use crate::decompile::code_stream::CodeStream;
use crate::decompile::config::DecompilerConfigurationBuilder;
use crate::decompile::context::DecompilationContext;
use crate::error::{Error, Result};
use crate::model::{Element, Lambda, LocalVariableReference, MethodSignature};
use crate::types::TypeHandle;

pub(crate) fn configure(builder: &mut DecompilerConfigurationBuilder) {
    builder
        .on(opcodes::INVOKEDYNAMIC)
        .then(|context, stream, _| {
            // only the pool index; the two zero bytes that follow decode as
            // nops on the next iterations
            let index = stream.next_unsigned_short()?;
            link_lambda(context, index)?;
            Ok(true)
        });

    builder.after(opcodes::INVOKEDYNAMIC).then(|context, _, _| {
        discard_synthetic_null_check(context)
    });
}

/// Rebuilds a lambda expression or method reference from a dynamic call
/// site produced by the standard lambda factory. The bootstrap arguments
/// carry the functional method type, a handle to the compiler-generated
/// backing method and the instantiated method type; anything else is some
/// other kind of dynamic linkage and is reported as unsupported.
fn link_lambda(context: &mut DecompilationContext, index: u16) -> Result<()> {
    let class_file = Arc::clone(context.class_file());
    let pool = class_file.constant_pool();
    let resolver = Arc::clone(context.type_resolver());

    let call_site = pool.invoke_dynamic(index)?;
    let bootstrap = class_file.bootstrap_method(call_site.bootstrap_method_attr_index)?;
    pool.method_handle(bootstrap.method_ref)?;

    let &[functional_index, handle_index, instantiated_index] = bootstrap.arguments.as_slice()
    else {
        return Err(Error::UnsupportedCallSite(format!(
            "expected 3 bootstrap arguments, found {}",
            bootstrap.arguments.len()
        )));
    };

    let functional_descriptor = pool.method_type(functional_index).map_err(|_| {
        Error::UnsupportedCallSite("bootstrap argument 0 is not a method type".to_owned())
    })?;
    let handle = pool.method_handle(handle_index).map_err(|_| {
        Error::UnsupportedCallSite("bootstrap argument 1 is not a method handle".to_owned())
    })?;
    pool.method_type(instantiated_index).map_err(|_| {
        Error::UnsupportedCallSite("bootstrap argument 2 is not a method type".to_owned())
    })?;

    let functional_signature = MethodSignature::from_descriptor(&functional_descriptor, &resolver)?;
    let backing_signature = MethodSignature::from_descriptor(&handle.descriptor, &resolver)?;
    let invoke_signature = MethodSignature::from_descriptor(&call_site.descriptor, &resolver)?;

    // backing parameters beyond the functional method's own are values the
    // compiler prepended for captured locals
    let capture_count = backing_signature
        .parameter_count()
        .saturating_sub(functional_signature.parameter_count());

    let mut captures: Vec<LocalVariableReference> = Vec::with_capacity(capture_count);
    for _ in 0..capture_count {
        match context.pop()? {
            Element::LocalVariable(variable) => captures.push(variable),
            other => {
                return Err(Error::UnsupportedCallSite(format!(
                    "captured value is not a local variable: {other:?}"
                )));
            }
        }
    }
    captures.reverse();

    let self_expression = pop_bound_receiver(
        context,
        handle.kind,
        &invoke_signature,
        &backing_signature,
    )?;

    context.push(Element::Lambda(Lambda {
        self_expression,
        kind: handle.kind,
        functional_interface: invoke_signature.return_type_handle(),
        functional_method_name: call_site.name,
        interface_signature: functional_signature,
        declaring_class: resolver.resolve(&handle.class_name),
        backing_method_name: handle.name,
        backing_signature,
        captures,
    }));

    Ok(())
}

/// Pops the receiver a bound reference like `str::length` was linked
/// against. Receiver-bound sites consume exactly one stack value, typed as
/// the call site's first parameter.
fn pop_bound_receiver(
    context: &mut DecompilationContext,
    kind: ReferenceKind,
    invoke_signature: &MethodSignature,
    backing_signature: &MethodSignature,
) -> Result<Option<Box<Element>>> {
    let count = if kind == ReferenceKind::InvokeSpecial {
        1
    } else {
        invoke_signature
            .parameter_count()
            .saturating_sub(backing_signature.parameter_count())
    };

    if count == 0 {
        return Ok(None);
    }

    if count > 1 {
        return Err(Error::format(format!(
            "dynamic call site binds {count} receivers"
        )));
    }

    let value = context.pop()?;
    let Some(expected) = invoke_signature.parameters.first() else {
        return Err(Error::format(
            "receiver-bound call site without parameters",
        ));
    };

    if value.type_handle() != *expected {
        return Err(Error::format(format!(
            "bound receiver type {} does not match call site parameter {expected}",
            value.type_handle()
        )));
    }

    Ok(Some(Box::new(value)))
}

/// Removes the `Object.getClass()` statement the compiler plants before a
/// receiver-bound reference purely for its null check.
fn discard_synthetic_null_check(context: &mut DecompilationContext) -> Result<()> {
    let receiver_bound = matches!(
        context.peek(),
        Ok(Element::Lambda(lambda)) if lambda.kind == ReferenceKind::InvokeVirtual
    );
    if !receiver_bound {
        return Ok(());
    }

    let discard = context.statements().last().is_some_and(|statement| {
        matches!(
            statement.element(),
            Element::MethodCall(call)
                if &*call.method_name == "getClass"
                    && call.target_type == TypeHandle::Reference(Arc::from("java/lang/Object"))
        )
    });

    if discard {
        context.remove_statement(context.statements().len() - 1)?;
    }

    Ok(())
}
