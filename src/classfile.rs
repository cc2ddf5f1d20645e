mod attributes;
mod constant_pool;
mod java_str;
mod parser;
mod structs;

pub use attributes::*;
pub use constant_pool::*;
pub use parser::parse_class_file;
pub use structs::*;
