//! Quill compiler core
//!
//! Parses Quill source, checks it against the language's static rules and
//! produces a decorated, optimized AST.

pub mod frontend;
pub mod middle;
pub mod stdlib;
pub mod types;
pub mod utils;

use log::debug;

pub use frontend::parser::parse;
pub use frontend::semantic::analyze;
pub use middle::ast::Program;
pub use middle::ast_printer::print_ast;
pub use middle::optimize::{optimize, Optimize, Optimizer};
pub use utils::{Error, Result, Span};

/// Library-level compile settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Run the optimizer after analysis
    pub optimize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { optimize: true }
    }
}

/// Parse, analyze and (unless disabled) optimize one compilation unit
pub fn compile(source: &str, options: &CompileOptions) -> Result<Program> {
    let tree = parse(source)?;
    debug!("parsed {} top-level statements", tree.statements.len());

    let program = analyze(&tree)?;
    if !options.optimize {
        return Ok(program);
    }
    Ok(optimize(program))
}
