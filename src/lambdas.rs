use std::sync::Arc;

use tracing::debug;

use crate::classfile::{ClassFile, LocalVariable, MethodInfo};
use crate::decompile::{CodeStream, Decompiler};
use crate::error::{Error, Result};
use crate::model::Lambda;

/// Locates the method in which the lambda backed by `backing_method` was
/// declared, by decompiling candidate siblings until one of them contains a
/// lambda expression referencing the backing method.
pub fn find_lambda_declaration(
    decompiler: &Decompiler,
    class_file: &Arc<ClassFile>,
    backing_method: &MethodInfo,
) -> Result<Option<(MethodInfo, Lambda)>> {
    if !backing_method.is_lambda_backing() {
        return Err(Error::format(format!(
            "method {}.{} does not back a lambda expression",
            class_file.name(),
            backing_method.name()
        )));
    }

    for candidate in declaration_candidates(decompiler, class_file, backing_method) {
        let Ok(code_attribute) = candidate.code() else {
            continue;
        };

        debug!(
            candidate = &**candidate.name(),
            backing = &**backing_method.name(),
            "scanning for lambda declaration"
        );

        let code = Arc::clone(code_attribute.code());
        let mut stream = CodeStream::new(&code);
        let statements = decompiler.decompile(class_file, &candidate, &mut stream)?;

        let lambda = statements
            .iter()
            .find_map(|statement| statement.find_lambda(backing_method.name()));

        if let Some(lambda) = lambda {
            let lambda = lambda.clone();
            return Ok(Some((candidate, lambda)));
        }
    }

    Ok(None)
}

fn declaration_candidates(
    decompiler: &Decompiler,
    class_file: &Arc<ClassFile>,
    backing_method: &MethodInfo,
) -> Vec<MethodInfo> {
    let backing_name = backing_method.name();

    if backing_name.starts_with("lambda$null$") {
        // a lambda declared inside another lambda; neither line numbers nor
        // the name convention identify the container, so every backing method
        // is a candidate, completed with its own captures where possible
        return class_file
            .methods()
            .iter()
            .filter(|method| method.is_lambda_backing() && method.name() != backing_name)
            .map(|method| {
                with_captured_variables(decompiler, class_file, method)
                    .unwrap_or_else(|_| method.clone())
            })
            .collect();
    }

    let backing_range = backing_method.line_number_range();

    class_file
        .methods()
        .iter()
        .filter(|candidate| match (backing_range, candidate.line_number_range()) {
            (Some((from, to)), Some((candidate_from, candidate_to))) => {
                candidate_from <= from && candidate_to >= to
            }
            _ => true,
        })
        .filter(|candidate| backing_name.starts_with(&format!("lambda${}", candidate.name())))
        .cloned()
        .collect()
}

/// Returns a copy of `method` whose local variable table covers the
/// variables its lambda captured, so that loads of captured slots resolve
/// during decompilation. The capture list comes from the declaration site.
pub fn with_captured_variables(
    decompiler: &Decompiler,
    class_file: &Arc<ClassFile>,
    method: &MethodInfo,
) -> Result<MethodInfo> {
    let Some((_, lambda)) = find_lambda_declaration(decompiler, class_file, method)? else {
        return Err(Error::format(format!(
            "lambda declaration of backing method {} not found in class file {}",
            method.name(),
            class_file.name()
        )));
    };

    if lambda.captures.is_empty() {
        return Ok(method.clone());
    }

    let mut variables: Vec<LocalVariable> = method
        .local_variable_table()
        .map(|table| table.to_vec())
        .unwrap_or_default();

    // a bound receiver occupies slot 0 of the backing method, shifting
    // every captured variable up by one
    let offset = u16::from(lambda.self_expression.is_some());

    for (position, capture) in lambda.captures.iter().enumerate() {
        // synthesized entries span the whole body so that slot lookups
        // succeed at any pc
        variables.push(LocalVariable::new(
            0,
            u16::MAX,
            Arc::clone(&capture.name),
            Arc::from(capture.var_type.descriptor()),
            offset + position as u16,
        ));
    }

    variables.sort_by_key(|variable| variable.index());

    Ok(method.with_local_variable_table(variables))
}
