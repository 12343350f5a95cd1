//! Standard library table
//!
//! Read-only description of every entity pre-declared in the root scope.
//! The table carries types only; each program gets its own entity ids when
//! the root scope installs it.

use crate::types::{FunctionType, Type};

/// What a builtin name denotes
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinKind {
    /// A read-only variable
    Constant(Type),
    Function(FunctionType),
}

/// One standard library entity
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinEntry {
    pub name: &'static str,
    /// Additional names bound to the same entity
    pub aliases: &'static [&'static str],
    pub kind: BuiltinKind,
}

/// Registry of all standard library entities, in declaration order
pub struct BuiltinRegistry {
    entries: Vec<BuiltinEntry>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let mut registry = Self { entries: Vec::new() };
        registry.register_all();
        registry
    }

    fn register_all(&mut self) {
        self.register_constant("π", &["pi"], Type::Number);

        // Math functions
        for name in ["sqrt", "sin", "cos", "exp", "ln"] {
            self.register_function(name, vec![Type::Number], Type::Number);
        }
        self.register_function("hypot", vec![Type::Number, Type::Number], Type::Number);

        // Any-typed helpers
        self.register_function("length", vec![Type::Any], Type::Number);
        self.register_function("toString", vec![Type::Any], Type::String);
    }

    fn register_constant(&mut self, name: &'static str, aliases: &'static [&'static str], ty: Type) {
        self.entries.push(BuiltinEntry {
            name,
            aliases,
            kind: BuiltinKind::Constant(ty),
        });
    }

    fn register_function(&mut self, name: &'static str, params: Vec<Type>, ret: Type) {
        self.entries.push(BuiltinEntry {
            name,
            aliases: &[],
            kind: BuiltinKind::Function(FunctionType::new(params, ret)),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuiltinEntry> {
        self.entries.iter()
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}
