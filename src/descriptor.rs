use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_until,
    character::complete::{char, one_of},
    combinator::{eof, map},
    multi::many0,
    sequence::delimited,
};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor(pub(crate) FieldType);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub(crate) parameters: Vec<FieldType>,
    pub(crate) return_type: ReturnType,
}

pub type ReturnType = Option<FieldType>;

#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum FieldType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Object(String),
    Short,
    Boolean,
    Array(Box<FieldType>),
}

impl FieldDescriptor {
    pub fn field_type(&self) -> &FieldType {
        &self.0
    }
}

impl MethodDescriptor {
    pub fn parameters(&self) -> &[FieldType] {
        &self.parameters
    }

    pub fn return_type(&self) -> &ReturnType {
        &self.return_type
    }
}

/// Parses a field descriptor such as `Ljava/lang/String;` or `[I`.
pub fn parse_field_descriptor(input: &str) -> Result<FieldDescriptor> {
    let (_, descriptor) =
        field_descriptor(input).map_err(|_| bad_descriptor("field", input))?;
    Ok(descriptor)
}

/// Parses a method descriptor such as `(ILjava/lang/Object;)V`.
pub fn parse_method_descriptor(input: &str) -> Result<MethodDescriptor> {
    let (_, descriptor) =
        method_descriptor(input).map_err(|_| bad_descriptor("method", input))?;
    Ok(descriptor)
}

fn bad_descriptor(kind: &str, input: &str) -> Error {
    Error::format(format!("invalid {kind} descriptor: {input:?}"))
}

fn field_descriptor(input: &str) -> IResult<&str, FieldDescriptor> {
    let (input, field_type) = parse_field_type(input)?;
    eof(input)?;
    Ok((input, FieldDescriptor(field_type)))
}

fn method_descriptor(input: &str) -> IResult<&str, MethodDescriptor> {
    let (input, parameters) =
        delimited(char('('), many0(parse_field_type), char(')')).parse(input)?;

    let (input, return_type) = parse_return_type(input)?;

    eof(input)?;
    Ok((
        input,
        MethodDescriptor {
            parameters,
            return_type,
        },
    ))
}

fn parse_return_type(input: &str) -> IResult<&str, ReturnType> {
    alt((map(parse_field_type, Some), parse_void_type)).parse(input)
}

fn parse_field_type(input: &str) -> IResult<&str, FieldType> {
    alt((parse_base_type, parse_object_type, parse_array_type)).parse(input)
}

fn parse_base_type(input: &str) -> IResult<&str, FieldType> {
    let (input, ch) = one_of("BCDFIJSZ").parse(input)?;
    let field_type = match ch {
        'B' => FieldType::Byte,
        'C' => FieldType::Char,
        'D' => FieldType::Double,
        'F' => FieldType::Float,
        'I' => FieldType::Int,
        'J' => FieldType::Long,
        'S' => FieldType::Short,
        'Z' => FieldType::Boolean,
        _ => unreachable!(),
    };
    Ok((input, field_type))
}

fn parse_object_type(input: &str) -> IResult<&str, FieldType> {
    let (input, _) = char('L').parse(input)?;

    let (input, class_name) = take_until(";").parse(input)?;

    let (input, _) = char(';').parse(input)?;

    Ok((input, FieldType::Object(class_name.to_string())))
}

fn parse_array_type(input: &str) -> IResult<&str, FieldType> {
    let (input, _) = char('[').parse(input)?;

    let (input, field_type) = parse_field_type(input)?;

    Ok((input, FieldType::Array(Box::new(field_type))))
}

fn parse_void_type(input: &str) -> IResult<&str, ReturnType> {
    let (input, _) = char('V').parse(input)?;
    Ok((input, None))
}
