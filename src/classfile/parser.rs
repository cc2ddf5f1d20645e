use std::sync::Arc;

use nom::{
    IResult, Parser,
    bytes::complete::{tag, take},
    combinator::eof,
    error_position,
    multi::count,
    number::complete::{be_f32, be_f64, be_i32, be_i64, be_u16, be_u32, u8},
};
use once_cell::sync::OnceCell;
use tracing::warn;

use crate::consts::{ClassAccessFlag, FieldAccessFlag, MethodAccessFlag};
use crate::error::{Error, Result};

use super::attributes::{
    AttributeInfo, BootstrapMethod, CodeAttribute, ExceptionTableItem, LineNumberTableItem,
    LocalVariable,
};
use super::constant_pool::{ConstantPool, ConstantPoolInfo};
use super::java_str;
use super::structs::{ClassFile, FieldInfo, MethodInfo};

const MAGIC: [u8; 4] = [0xca, 0xfe, 0xba, 0xbe];

/// Reads a complete class file. Fails on a bad magic number, an
/// unrecognized constant pool tag, or any structural mismatch.
pub fn parse_class_file(input: &[u8]) -> Result<ClassFile> {
    if input.len() < MAGIC.len() || input[..MAGIC.len()] != MAGIC {
        return Err(Error::format("not a class file: bad magic number"));
    }

    match class_file(input) {
        Ok((_, class_file)) => Ok(class_file),
        Err(_) => Err(Error::format("malformed class file")),
    }
}

/// Decodes the body of a `BootstrapMethods` attribute.
pub(crate) fn parse_bootstrap_methods(input: &[u8]) -> Result<Vec<BootstrapMethod>> {
    match bootstrap_methods(input) {
        Ok((_, methods)) => Ok(methods),
        Err(_) => Err(Error::format("malformed BootstrapMethods attribute")),
    }
}

fn fail<'a, T>(input: &'a [u8]) -> IResult<&'a [u8], T> {
    Err(nom::Err::Error(error_position!(
        input,
        nom::error::ErrorKind::Verify
    )))
}

fn class_file(input: &[u8]) -> IResult<&[u8], ClassFile> {
    let (input, (minor, major)) = parse_header(input)?;
    let (input, constant_pool) = parse_constant_pool(input)?;

    let (input, access_flags) = be_u16(input)?;
    let (input, this_class) = be_u16(input)?;
    let (input, super_class) = be_u16(input)?;
    let (input, interfaces) = parse_interfaces(input, &constant_pool)?;
    let (input, fields) = parse_fields(input, &constant_pool)?;
    let (input, methods) = parse_methods(input, &constant_pool)?;
    let (input, attributes) = parse_attributes(input, &constant_pool)?;

    eof(input)?;

    let this_class = match constant_pool.class_name(this_class) {
        Ok(name) => name,
        Err(_) => return fail(input),
    };
    let super_class = if super_class == 0 {
        None
    } else {
        match constant_pool.class_name(super_class) {
            Ok(name) => Some(name),
            Err(_) => return fail(input),
        }
    };

    Ok((
        input,
        ClassFile {
            minor_version: minor,
            major_version: major,
            // extra bits allowed
            access_flags: ClassAccessFlag::from_bits_retain(access_flags),
            this_class,
            super_class,
            constant_pool,
            interfaces,
            fields,
            methods,
            attributes,
            bootstrap_methods: OnceCell::new(),
        },
    ))
}

fn parse_header(input: &[u8]) -> IResult<&[u8], (u16, u16)> {
    let (input, _) = tag(&MAGIC[..]).parse(input)?;
    let (input, minor) = be_u16(input)?;
    let (input, major) = be_u16(input)?;
    Ok((input, (minor, major)))
}

fn parse_constant_pool(input: &[u8]) -> IResult<&[u8], ConstantPool> {
    let (mut input, constant_pool_count) = be_u16(input)?;

    let mut entries = Vec::with_capacity(constant_pool_count.saturating_sub(1) as usize);

    while entries.len() + 1 < constant_pool_count as usize {
        let constant;
        (input, constant) = parse_constant(input)?;
        let need_placeholder = matches!(
            constant,
            ConstantPoolInfo::Long(_) | ConstantPoolInfo::Double(_)
        );
        entries.push(constant);
        if need_placeholder {
            entries.push(ConstantPoolInfo::Placeholder);
        }
    }

    Ok((input, ConstantPool::from_entries(entries)))
}

fn parse_constant(mut input: &[u8]) -> IResult<&[u8], ConstantPoolInfo> {
    let tag;
    (input, tag) = u8(input)?;
    let cp_info = match tag {
        1 => {
            let length;
            (input, length) = be_u16(input)?;
            let bytes;
            (input, bytes) = take(length).parse(input)?;
            match java_str::decode_utf8(bytes) {
                Ok(text) => ConstantPoolInfo::Utf8(text),
                Err(_) => return fail(input),
            }
        }
        3 => {
            let value;
            (input, value) = be_i32(input)?;
            ConstantPoolInfo::Integer(value)
        }
        4 => {
            let value;
            (input, value) = be_f32(input)?;
            ConstantPoolInfo::Float(value)
        }
        5 => {
            let value;
            (input, value) = be_i64(input)?;
            ConstantPoolInfo::Long(value)
        }
        6 => {
            let value;
            (input, value) = be_f64(input)?;
            ConstantPoolInfo::Double(value)
        }
        7 => {
            let name_index;
            (input, name_index) = be_u16(input)?;
            ConstantPoolInfo::Class { name_index }
        }
        8 => {
            let string_index;
            (input, string_index) = be_u16(input)?;
            ConstantPoolInfo::String { string_index }
        }
        9 => {
            let (class_index, name_and_type_index);
            (input, class_index) = be_u16(input)?;
            (input, name_and_type_index) = be_u16(input)?;
            ConstantPoolInfo::Fieldref {
                class_index,
                name_and_type_index,
            }
        }
        10 => {
            let (class_index, name_and_type_index);
            (input, class_index) = be_u16(input)?;
            (input, name_and_type_index) = be_u16(input)?;
            ConstantPoolInfo::Methodref {
                class_index,
                name_and_type_index,
            }
        }
        11 => {
            let (class_index, name_and_type_index);
            (input, class_index) = be_u16(input)?;
            (input, name_and_type_index) = be_u16(input)?;
            ConstantPoolInfo::InterfaceMethodref {
                class_index,
                name_and_type_index,
            }
        }
        12 => {
            let (name_index, descriptor_index);
            (input, name_index) = be_u16(input)?;
            (input, descriptor_index) = be_u16(input)?;
            ConstantPoolInfo::NameAndType {
                name_index,
                descriptor_index,
            }
        }
        15 => {
            let (reference_kind, reference_index);
            (input, reference_kind) = u8(input)?;
            (input, reference_index) = be_u16(input)?;
            ConstantPoolInfo::MethodHandle {
                reference_kind,
                reference_index,
            }
        }
        16 => {
            let descriptor_index;
            (input, descriptor_index) = be_u16(input)?;
            ConstantPoolInfo::MethodType { descriptor_index }
        }
        18 => {
            let (bootstrap_method_attr_index, name_and_type_index);
            (input, bootstrap_method_attr_index) = be_u16(input)?;
            (input, name_and_type_index) = be_u16(input)?;
            ConstantPoolInfo::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            }
        }
        _ => {
            warn!(tag, "unrecognized constant pool tag");
            return fail(input);
        }
    };
    Ok((input, cp_info))
}

fn parse_interfaces<'a>(
    input: &'a [u8],
    pool: &ConstantPool,
) -> IResult<&'a [u8], Vec<Arc<str>>> {
    let (input, interface_count) = be_u16(input)?;
    let (input, indices) = count(be_u16, interface_count as usize).parse(input)?;

    let mut interfaces = Vec::with_capacity(indices.len());
    for index in indices {
        match pool.class_name(index) {
            Ok(name) => interfaces.push(name),
            Err(_) => return fail(input),
        }
    }

    Ok((input, interfaces))
}

fn parse_fields<'a>(input: &'a [u8], pool: &ConstantPool) -> IResult<&'a [u8], Vec<FieldInfo>> {
    let (input, field_count) = be_u16(input)?;
    let (input, fields) = count(parse_field(pool), field_count as usize).parse(input)?;
    Ok((input, fields))
}

fn parse_field(pool: &ConstantPool) -> impl FnMut(&[u8]) -> IResult<&[u8], FieldInfo> + '_ {
    move |input| {
        let (input, access_flags) = be_u16(input)?;
        let (input, name_index) = be_u16(input)?;
        let (input, descriptor_index) = be_u16(input)?;
        let (input, attributes) = parse_attributes(input, pool)?;

        let (name, descriptor) = match (pool.utf8(name_index), pool.utf8(descriptor_index)) {
            (Ok(name), Ok(descriptor)) => (name, descriptor),
            _ => return fail(input),
        };

        Ok((
            input,
            FieldInfo {
                access_flags: FieldAccessFlag::from_bits_retain(access_flags),
                name,
                descriptor,
                attributes,
            },
        ))
    }
}

fn parse_methods<'a>(input: &'a [u8], pool: &ConstantPool) -> IResult<&'a [u8], Vec<MethodInfo>> {
    let (input, method_count) = be_u16(input)?;
    let (input, methods) = count(parse_method(pool), method_count as usize).parse(input)?;
    Ok((input, methods))
}

fn parse_method(pool: &ConstantPool) -> impl FnMut(&[u8]) -> IResult<&[u8], MethodInfo> + '_ {
    move |input| {
        let (input, access_flags) = be_u16(input)?;
        let (input, name_index) = be_u16(input)?;
        let (input, descriptor_index) = be_u16(input)?;
        let (input, attributes) = parse_attributes(input, pool)?;

        let (name, descriptor) = match (pool.utf8(name_index), pool.utf8(descriptor_index)) {
            (Ok(name), Ok(descriptor)) => (name, descriptor),
            _ => return fail(input),
        };

        Ok((
            input,
            MethodInfo {
                access_flags: MethodAccessFlag::from_bits_retain(access_flags),
                name,
                descriptor,
                attributes,
                parsed_descriptor: OnceCell::new(),
            },
        ))
    }
}

fn parse_attributes<'a>(
    input: &'a [u8],
    pool: &ConstantPool,
) -> IResult<&'a [u8], Vec<AttributeInfo>> {
    let (input, attributes_count) = be_u16(input)?;
    let (input, attributes) =
        count(parse_attribute(pool), attributes_count as usize).parse(input)?;
    Ok((input, attributes))
}

fn parse_attribute(pool: &ConstantPool) -> impl FnMut(&[u8]) -> IResult<&[u8], AttributeInfo> + '_ {
    move |input| {
        let (input, attribute_name_index) = be_u16(input)?;
        let (input, attribute_length) = be_u32(input)?;

        let mut input = input;

        let attribute_name = match pool.utf8(attribute_name_index) {
            Ok(name) => name,
            Err(_) => return fail(input),
        };

        let attribute_info = match &*attribute_name {
            "Code" => {
                let (max_stack, max_locals);
                (input, max_stack) = be_u16(input)?;
                (input, max_locals) = be_u16(input)?;

                let (code_length, code);
                (input, code_length) = be_u32(input)?;
                (input, code) = take(code_length).parse(input)?;

                let (exception_table_length, exception_table);
                (input, exception_table_length) = be_u16(input)?;
                (input, exception_table) = count(
                    parse_exception_table(pool),
                    exception_table_length as usize,
                )
                .parse(input)?;

                let attributes;
                (input, attributes) = parse_attributes(input, pool)?;

                AttributeInfo::Code(CodeAttribute {
                    max_stack,
                    max_locals,
                    code: Arc::from(code),
                    exception_table,
                    attributes,
                })
            }
            "SourceFile" => {
                let sourcefile_index;
                (input, sourcefile_index) = be_u16(input)?;
                match pool.utf8(sourcefile_index) {
                    Ok(name) => AttributeInfo::SourceFile(name),
                    Err(_) => return fail(input),
                }
            }
            "LineNumberTable" => {
                let (table_length, table);
                (input, table_length) = be_u16(input)?;
                (input, table) =
                    count(parse_line_number_item, table_length as usize).parse(input)?;
                AttributeInfo::LineNumberTable(table)
            }
            "LocalVariableTable" => {
                let (table_length, table);
                (input, table_length) = be_u16(input)?;
                (input, table) =
                    count(parse_local_variable(pool), table_length as usize).parse(input)?;
                AttributeInfo::LocalVariableTable(table)
            }
            "BootstrapMethods" => {
                let info;
                (input, info) = take(attribute_length).parse(input)?;
                AttributeInfo::BootstrapMethods(Arc::from(info))
            }
            _ => {
                let info;
                (input, info) = take(attribute_length).parse(input)?;
                AttributeInfo::Unknown {
                    name: attribute_name.clone(),
                    info: Arc::from(info),
                }
            }
        };

        Ok((input, attribute_info))
    }
}

fn parse_exception_table(
    pool: &ConstantPool,
) -> impl FnMut(&[u8]) -> IResult<&[u8], ExceptionTableItem> + '_ {
    move |input| {
        let (input, start_pc) = be_u16(input)?;
        let (input, end_pc) = be_u16(input)?;
        let (input, handler_pc) = be_u16(input)?;
        let (input, catch_type) = be_u16(input)?;

        let catch_type = if catch_type == 0 {
            None
        } else {
            match pool.class_name(catch_type) {
                Ok(name) => Some(name),
                Err(_) => return fail(input),
            }
        };

        Ok((
            input,
            ExceptionTableItem {
                start_pc,
                end_pc,
                handler_pc,
                catch_type,
            },
        ))
    }
}

fn parse_line_number_item(input: &[u8]) -> IResult<&[u8], LineNumberTableItem> {
    let (input, start_pc) = be_u16(input)?;
    let (input, line_number) = be_u16(input)?;
    Ok((
        input,
        LineNumberTableItem {
            start_pc,
            line_number,
        },
    ))
}

fn parse_local_variable(
    pool: &ConstantPool,
) -> impl FnMut(&[u8]) -> IResult<&[u8], LocalVariable> + '_ {
    move |input| {
        let (input, start_pc) = be_u16(input)?;
        let (input, length) = be_u16(input)?;
        let (input, name_index) = be_u16(input)?;
        let (input, descriptor_index) = be_u16(input)?;
        let (input, index) = be_u16(input)?;

        let (name, descriptor) = match (pool.utf8(name_index), pool.utf8(descriptor_index)) {
            (Ok(name), Ok(descriptor)) => (name, descriptor),
            _ => return fail(input),
        };

        Ok((
            input,
            LocalVariable {
                start_pc,
                length,
                name,
                descriptor,
                index,
            },
        ))
    }
}

fn bootstrap_methods(input: &[u8]) -> IResult<&[u8], Vec<BootstrapMethod>> {
    let (input, num_methods) = be_u16(input)?;
    let (input, methods) = count(parse_bootstrap_method, num_methods as usize).parse(input)?;
    eof(input)?;
    Ok((input, methods))
}

fn parse_bootstrap_method(input: &[u8]) -> IResult<&[u8], BootstrapMethod> {
    let (input, method_ref) = be_u16(input)?;
    let (input, argument_count) = be_u16(input)?;
    let (input, arguments) = count(be_u16, argument_count as usize).parse(input)?;
    Ok((input, BootstrapMethod { method_ref, arguments }))
}
