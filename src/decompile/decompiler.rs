use std::sync::Arc;

use tracing::trace;

use crate::classfile::{ClassFile, ConstantPoolInfo, MethodInfo};
use crate::consts::opcodes;
use crate::error::{Error, Result};
use crate::model::{
    BinaryOperation, Constant, ConstantValue, Element, Jump, OperatorType, ReturnValue,
};
use crate::types::{self, TypeResolver};

use super::code_stream::CodeStream;
use super::config::DecompilerConfiguration;
use super::context::DecompilationContext;
use super::instructions;

/// Reconstructs statements from method byte code by symbolically executing
/// it against an operand stack of expression fragments.
pub struct Decompiler {
    configuration: DecompilerConfiguration,
    core_configuration: DecompilerConfiguration,
    type_resolver: Arc<TypeResolver>,
}

impl Decompiler {
    /// A decompiler that consults `configuration` ahead of the built-in
    /// handlers, so callers can shadow any opcode.
    pub fn new(configuration: DecompilerConfiguration) -> Self {
        Self {
            configuration,
            core_configuration: core_configuration(),
            type_resolver: Arc::new(TypeResolver::new()),
        }
    }

    pub fn decompile(
        &self,
        class_file: &Arc<ClassFile>,
        method: &MethodInfo,
        stream: &mut CodeStream<'_>,
    ) -> Result<Vec<Element>> {
        self.decompile_with_callback(class_file, method, stream, |_| {})
    }

    /// Decompiles like [`Decompiler::decompile`], reporting the context to
    /// `progress` after every handled instruction.
    pub fn decompile_with_callback(
        &self,
        class_file: &Arc<ClassFile>,
        method: &MethodInfo,
        stream: &mut CodeStream<'_>,
        mut progress: impl FnMut(&DecompilationContext),
    ) -> Result<Vec<Element>> {
        let mut context = DecompilationContext::new(
            Arc::clone(class_file),
            method.clone(),
            Arc::clone(&self.type_resolver),
            stream.pc(),
        );

        loop {
            for callback in context.advance(stream.pc()) {
                callback(&mut context)?;
            }

            if context.aborted() {
                break;
            }

            let opcode = match stream.next_instruction() {
                Ok(opcode) => opcode,
                Err(Error::EndOfCode) => break,
                Err(error) => return Err(error),
            };

            trace!(
                pc = context.pc(),
                mnemonic = opcodes::mnemonic(opcode),
                "decompiling"
            );

            self.configuration.apply_before(&mut context, stream, opcode)?;
            self.core_configuration
                .apply_before(&mut context, stream, opcode)?;

            let handled = self.configuration.try_decompile(&mut context, stream, opcode)?
                || self
                    .core_configuration
                    .try_decompile(&mut context, stream, opcode)?
                || decompile_default(&mut context, stream, opcode)?;

            if !handled {
                return Err(Error::UnhandledOpcode {
                    opcode,
                    mnemonic: opcodes::mnemonic(opcode),
                    method: method.name().to_string(),
                });
            }

            self.configuration.apply_after(&mut context, stream, opcode)?;
            self.core_configuration
                .apply_after(&mut context, stream, opcode)?;

            progress(&context);
        }

        context.reduce_all()?;

        Ok(context.into_statements())
    }
}

impl Default for Decompiler {
    fn default() -> Self {
        Self::new(DecompilerConfiguration::empty())
    }
}

fn core_configuration() -> DecompilerConfiguration {
    let mut builder = DecompilerConfiguration::builder();

    instructions::variables::configure(&mut builder);
    instructions::operators::configure(&mut builder);
    instructions::fields::configure(&mut builder);
    instructions::calls::configure(&mut builder);
    instructions::instantiation::configure(&mut builder);
    instructions::arrays::configure(&mut builder);
    instructions::casts::configure(&mut builder);
    instructions::invoke_dynamic::configure(&mut builder);

    builder.build()
}

/// The opcodes simple enough to live in one match instead of a registered
/// delegation. Returns `false` for anything it does not know.
fn decompile_default(
    context: &mut DecompilationContext,
    stream: &mut CodeStream<'_>,
    opcode: u8,
) -> Result<bool> {
    match opcode {
        opcodes::NOP => {}
        opcodes::ACONST_NULL => context.push(Element::Constant(Constant::null())),
        opcodes::ICONST_M1..=opcodes::ICONST_5 => {
            let value = i32::from(opcode) - i32::from(opcodes::ICONST_0);
            context.push(Element::Constant(Constant::int(value)));
        }
        opcodes::LCONST_0 | opcodes::LCONST_1 => {
            let value = i64::from(opcode - opcodes::LCONST_0);
            context.push(Element::Constant(Constant::long(value)));
        }
        opcodes::FCONST_0..=opcodes::FCONST_2 => {
            let value = f32::from(opcode - opcodes::FCONST_0);
            context.push(Element::Constant(Constant::float(value)));
        }
        opcodes::DCONST_0 | opcodes::DCONST_1 => {
            let value = f64::from(opcode - opcodes::DCONST_0);
            context.push(Element::Constant(Constant::double(value)));
        }
        opcodes::BIPUSH => {
            let value = i32::from(stream.next_byte()?);
            context.push(Element::Constant(Constant::int(value)));
        }
        opcodes::SIPUSH => {
            let value = i32::from(stream.next_signed_short()?);
            context.push(Element::Constant(Constant::int(value)));
        }
        opcodes::LDC => {
            let index = u16::from(stream.next_unsigned_byte()?);
            push_single_width_constant(context, index)?;
        }
        opcodes::LDC_W => {
            let index = stream.next_unsigned_short()?;
            push_single_width_constant(context, index)?;
        }
        opcodes::LDC2_W => {
            let index = stream.next_unsigned_short()?;
            push_double_width_constant(context, index)?;
        }
        opcodes::POP => {
            context.reduce()?;
        }
        opcodes::POP2 => {
            // two category-1 values, or one category-2 value and nothing more
            if context.reduce()? {
                context.reduce()?;
            }
        }
        opcodes::DUP => {
            let top = context.peek()?.clone();
            context.push(top);
        }
        opcodes::DUP_X1 => {
            let top = context.peek()?.clone();
            context.insert(-2, top)?;
        }
        opcodes::GOTO => decompile_goto(context, stream)?,
        opcodes::IRETURN..=opcodes::ARETURN => {
            let value = context.pop()?;
            context.enlist(Element::ReturnValue(ReturnValue {
                value: Box::new(value),
            }))?;
        }
        opcodes::RETURN => context.enlist(Element::Return)?,
        _ => return Ok(false),
    }

    Ok(true)
}

fn push_single_width_constant(context: &mut DecompilationContext, index: u16) -> Result<()> {
    let class_file = Arc::clone(context.class_file());
    let pool = class_file.constant_pool();

    let constant = match pool.entry(index)? {
        ConstantPoolInfo::Integer(value) => Constant::int(*value),
        ConstantPoolInfo::Float(value) => Constant::float(*value),
        ConstantPoolInfo::String { string_index } => Constant::string(pool.utf8(*string_index)?),
        ConstantPoolInfo::Class { .. } => {
            let name = pool.class_name(index)?;
            Constant::class(context.type_resolver().resolve(&name))
        }
        other => {
            return Err(Error::format(format!(
                "ldc cannot load a {other:?} pool entry"
            )));
        }
    };

    context.push(Element::Constant(constant));
    Ok(())
}

fn push_double_width_constant(context: &mut DecompilationContext, index: u16) -> Result<()> {
    let constant = match context.class_file().constant_pool().entry(index)? {
        ConstantPoolInfo::Long(value) => Constant::long(*value),
        ConstantPoolInfo::Double(value) => Constant::double(*value),
        other => {
            return Err(Error::format(format!(
                "ldc2_w requires a long or double entry, found {other:?}"
            )));
        }
    };

    context.push(Element::Constant(constant));
    Ok(())
}

fn decompile_goto(context: &mut DecompilationContext, stream: &mut CodeStream<'_>) -> Result<()> {
    let pc = context.pc();

    // the jump a compiler plants at the end of a try block; handler blocks
    // are not reconstructed, so keep what was recovered up to here
    if context.method().exception_table_entry_ending_at(pc).is_some() {
        context.abort();
        return Ok(());
    }

    let offset = stream.next_signed_short()?;
    let target_pc = match pc.checked_add_signed(i32::from(offset)) {
        // backward jumps close loops, which are not reconstructed either
        Some(target) if target > pc => target,
        _ => {
            context.abort();
            return Ok(());
        }
    };

    if context.has_stacked_expressions() {
        context.look_ahead(target_pc, fold_alternate_values);
        return Ok(());
    }

    context.enlist(Element::Jump(Jump { target_pc }))
}

/// Runs where the two paths of a conditional rejoin. The compiler encodes
/// `a == b` as a branch that leaves 1 on the fall-through path and 0 on the
/// taken path; that exact shape is folded back into a boolean expression.
/// Every other rejoining shape means control flow this decompiler does not
/// model, and aborts.
fn fold_alternate_values(context: &mut DecompilationContext) -> Result<()> {
    let taken = context.pop()?;
    let fall_through = context.pop()?;
    let canonical = is_int_constant(&taken, 0) && is_int_constant(&fall_through, 1);

    let branch = match context.statements().last().map(|s| s.element()) {
        Some(Element::Branch(branch)) if branch.operator == OperatorType::Ne => {
            Some(branch.clone())
        }
        _ => None,
    };

    match branch {
        Some(branch) if canonical => {
            context.remove_statement(context.statements().len() - 1)?;
            context.push(Element::Binary(BinaryOperation {
                left: branch.left,
                operator: OperatorType::Eq,
                right: branch.right,
                result_type: types::BOOLEAN,
            }));
        }
        _ => context.abort(),
    }

    Ok(())
}

fn is_int_constant(element: &Element, expected: i32) -> bool {
    matches!(
        element.as_constant(),
        Some(Constant {
            value: ConstantValue::Int(value),
            ..
        }) if *value == expected
    )
}
