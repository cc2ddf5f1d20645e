pub(crate) mod arrays;
pub(crate) mod calls;
pub(crate) mod casts;
pub(crate) mod fields;
pub(crate) mod instantiation;
pub(crate) mod invoke_dynamic;
pub(crate) mod operators;
pub(crate) mod variables;
