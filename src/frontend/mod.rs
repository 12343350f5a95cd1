//! Frontend module - Lexer, Parser, Scopes, Semantic Analysis

pub mod token;
pub mod lexer;
pub mod syntax;
pub mod parser;
pub mod scope;
pub mod semantic;
