//! Type System for Quill

use serde::Serialize;

/// Index of a struct (or class) type in the program's entity arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StructId(pub usize);

/// A resolved Quill type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Type {
    Number,
    String,
    Bool,
    Void,
    /// Universal target type; only standard library parameters use it
    Any,
    Array(Box<Type>),
    /// Struct and class types compare by identity
    Struct(StructId),
    Function(FunctionType),
}

/// Signature of a function entity or function-typed value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub ret: Box<Type>,
}

impl FunctionType {
    pub fn new(params: Vec<Type>, ret: Type) -> Self {
        Self { params, ret: Box::new(ret) }
    }
}

impl Type {
    /// Create an array type
    pub fn array(base: Type) -> Self {
        Self::Array(Box::new(base))
    }

    /// Create a function type
    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Self::Function(FunctionType::new(params, ret))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Number)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    pub fn is_numeric_or_string(&self) -> bool {
        matches!(self, Self::Number | Self::String)
    }

    /// Element type of an array type
    pub fn base(&self) -> Option<&Type> {
        match self {
            Self::Array(base) => Some(base),
            _ => None,
        }
    }

    /// Structural equivalence.
    ///
    /// Recursion only descends through array and function types; struct
    /// types are compared by id, so this terminates on recursive structs.
    pub fn is_equivalent(&self, other: &Type) -> bool {
        match (self, other) {
            (Self::Number, Self::Number)
            | (Self::String, Self::String)
            | (Self::Bool, Self::Bool)
            | (Self::Void, Self::Void)
            | (Self::Any, Self::Any) => true,
            (Self::Array(a), Self::Array(b)) => a.is_equivalent(b),
            (Self::Struct(a), Self::Struct(b)) => a == b,
            (Self::Function(f), Self::Function(g)) => {
                f.params.len() == g.params.len()
                    && f.params.iter().zip(&g.params).all(|(p, q)| p.is_equivalent(q))
                    && f.ret.is_equivalent(&g.ret)
            }
            _ => false,
        }
    }

    /// `self` may be stored into a slot of type `target`
    pub fn is_assignable_to(&self, target: &Type) -> bool {
        matches!(target, Self::Any) || self.is_equivalent(target)
    }
}
