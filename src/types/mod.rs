//! Type model shared by the analyzer and the optimizer

pub mod type_system;

pub use type_system::{FunctionType, StructId, Type};
