//! Middle-end module - decorated AST, optimization and printing

pub mod ast;
pub mod ast_printer;
pub mod optimize;
