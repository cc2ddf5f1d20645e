pub mod classfile;
pub mod consts;
pub mod decompile;
pub mod descriptor;
pub mod error;
pub mod lambdas;
pub mod model;
pub mod types;
