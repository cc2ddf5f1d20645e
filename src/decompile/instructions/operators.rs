use crate::consts::opcodes;
use crate::decompile::code_stream::CodeStream;
use crate::decompile::config::DecompilerConfigurationBuilder;
use crate::decompile::context::DecompilationContext;
use crate::error::{Error, Result};
use crate::model::{BinaryOperation, Branch, Constant, Element, OperatorType};
use crate::types::{self, TypeHandle};

pub(crate) fn configure(builder: &mut DecompilerConfigurationBuilder) {
    // each arithmetic family is four consecutive opcodes, one per width
    for (base, operator) in [
        (opcodes::IADD, OperatorType::Plus),
        (opcodes::ISUB, OperatorType::Minus),
        (opcodes::IMUL, OperatorType::Multiply),
        (opcodes::IDIV, OperatorType::Divide),
        (opcodes::IREM, OperatorType::Modulo),
    ] {
        for (offset, result_type) in [types::INT, types::LONG, types::FLOAT, types::DOUBLE]
            .into_iter()
            .enumerate()
        {
            builder
                .on(base + offset as u8)
                .then(binary_operator(operator, result_type));
        }
    }

    // long/float/double comparisons produce the three-way -1/0/1 int
    builder
        .on_each(&[
            opcodes::LCMP,
            opcodes::FCMPL,
            opcodes::FCMPG,
            opcodes::DCMPL,
            opcodes::DCMPG,
        ])
        .then(binary_operator(OperatorType::Compare, types::INT));

    for (opcode, operator) in [
        (opcodes::IFEQ, OperatorType::Eq),
        (opcodes::IFNE, OperatorType::Ne),
        (opcodes::IFLT, OperatorType::Lt),
        (opcodes::IFGE, OperatorType::Ge),
        (opcodes::IFGT, OperatorType::Gt),
        (opcodes::IFLE, OperatorType::Le),
    ] {
        builder.on(opcode).then(zero_comparison_branch(operator));
    }

    for (opcode, operator) in [
        (opcodes::IF_ICMPEQ, OperatorType::Eq),
        (opcodes::IF_ICMPNE, OperatorType::Ne),
        (opcodes::IF_ICMPLT, OperatorType::Lt),
        (opcodes::IF_ICMPGE, OperatorType::Ge),
        (opcodes::IF_ICMPGT, OperatorType::Gt),
        (opcodes::IF_ICMPLE, OperatorType::Le),
        (opcodes::IF_ACMPEQ, OperatorType::Eq),
        (opcodes::IF_ACMPNE, OperatorType::Ne),
    ] {
        builder.on(opcode).then(comparison_branch(operator));
    }
}

fn binary_operator(
    operator: OperatorType,
    result_type: TypeHandle,
) -> impl Fn(&mut DecompilationContext, &mut CodeStream<'_>, u8) -> Result<bool> + Send + Sync {
    move |context, _, _| {
        let right = context.pop()?;
        let left = context.pop()?;

        context.push(Element::Binary(BinaryOperation {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            result_type: result_type.clone(),
        }));

        Ok(true)
    }
}

fn comparison_branch(
    operator: OperatorType,
) -> impl Fn(&mut DecompilationContext, &mut CodeStream<'_>, u8) -> Result<bool> + Send + Sync {
    move |context, stream, _| {
        let target_pc = branch_target(context.pc(), stream.next_signed_short()?)?;
        let right = context.pop()?;
        let left = context.pop()?;

        context.enlist(Element::Branch(Branch {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            target_pc,
        }))?;

        Ok(true)
    }
}

fn zero_comparison_branch(
    operator: OperatorType,
) -> impl Fn(&mut DecompilationContext, &mut CodeStream<'_>, u8) -> Result<bool> + Send + Sync {
    move |context, stream, _| {
        let target_pc = branch_target(context.pc(), stream.next_signed_short()?)?;
        let value = context.pop()?;

        context.enlist(Element::Branch(Branch {
            left: Box::new(value),
            operator,
            right: Box::new(Element::Constant(Constant::int(0))),
            target_pc,
        }))?;

        Ok(true)
    }
}

fn branch_target(pc: u32, offset: i16) -> Result<u32> {
    pc.checked_add_signed(i32::from(offset))
        .ok_or_else(|| Error::format(format!("branch target out of range at pc {pc}")))
}
