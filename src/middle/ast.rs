//! Decorated program representation
//!
//! Produced by the semantic analyzer, rewritten by the optimizer. Named
//! entities (variables, functions, struct types) live in an arena owned by
//! the [`Program`] and are referenced by id, so identity is an index compare.

use serde::Serialize;

use crate::types::{FunctionType, StructId, Type};

pub use crate::frontend::syntax::{BinOp, RangeOp, UnOp};

// ==================== Entities ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VariableId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub name: String,
    pub read_only: bool,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Function {
    pub name: String,
    /// Placeholder until the parameters have been analyzed
    pub ty: FunctionType,
    pub builtin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

/// A struct or class type; also the entity that constructs its values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructType {
    pub name: String,
    /// Empty until the declaration's fields have been analyzed
    pub fields: Vec<Field>,
    pub is_class: bool,
}

/// Arena of every entity declared in one program
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Entities {
    pub variables: Vec<Variable>,
    pub functions: Vec<Function>,
    pub structs: Vec<StructType>,
}

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, variable: Variable) -> VariableId {
        self.variables.push(variable);
        VariableId(self.variables.len() - 1)
    }

    pub fn add_function(&mut self, function: Function) -> FunctionId {
        self.functions.push(function);
        FunctionId(self.functions.len() - 1)
    }

    pub fn add_struct(&mut self, ty: StructType) -> StructId {
        self.structs.push(ty);
        StructId(self.structs.len() - 1)
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.0]
    }

    pub fn struct_type(&self, id: StructId) -> &StructType {
        &self.structs[id.0]
    }

    pub fn struct_type_mut(&mut self, id: StructId) -> &mut StructType {
        &mut self.structs[id.0]
    }

    /// Look up a field of a struct type by name
    pub fn field(&self, id: StructId, name: &str) -> Option<&Field> {
        self.struct_type(id).fields.iter().find(|f| f.name == name)
    }

    /// Type of the struct's constructor: one parameter per field
    pub fn constructor_type(&self, id: StructId) -> FunctionType {
        let params = self.struct_type(id).fields.iter().map(|f| f.ty.clone()).collect();
        FunctionType::new(params, Type::Struct(id))
    }

    /// Source-level spelling of a type
    pub fn describe(&self, ty: &Type) -> String {
        match ty {
            Type::Number => "number".to_string(),
            Type::String => "string".to_string(),
            Type::Bool => "boolean".to_string(),
            Type::Void => "void".to_string(),
            Type::Any => "any".to_string(),
            Type::Array(base) => format!("[{}]", self.describe(base)),
            Type::Struct(id) => self.struct_type(*id).name.clone(),
            Type::Function(f) => {
                let params: Vec<String> = f.params.iter().map(|p| self.describe(p)).collect();
                format!("({})->{}", params.join(","), self.describe(&f.ret))
            }
        }
    }
}

// ==================== Program ====================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub entities: Entities,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    FunctionDeclaration {
        function: FunctionId,
        params: Vec<VariableId>,
        body: Vec<Stmt>,
    },
    VariableDeclaration {
        variable: VariableId,
        initializer: Option<Expr>,
    },
    StructDeclaration(StructId),
    ClassDeclaration(StructId),
    /// `if t { .. } else { .. }`
    If {
        test: Expr,
        consequent: Vec<Stmt>,
        alternate: Vec<Stmt>,
    },
    /// `if t { .. }`
    ShortIf {
        test: Expr,
        consequent: Vec<Stmt>,
    },
    /// `if t { .. } else if ..`
    NestedIf {
        test: Expr,
        consequent: Vec<Stmt>,
        else_if: Box<Stmt>,
    },
    ForRange {
        iterator: VariableId,
        low: Expr,
        op: RangeOp,
        high: Expr,
        body: Vec<Stmt>,
    },
    ForCollection {
        iterator: VariableId,
        collection: Expr,
        body: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    TryCatch {
        body: Vec<Stmt>,
        error: Option<VariableId>,
        handler: Vec<Stmt>,
    },
    Print(Expr),
    Increment(Expr),
    Decrement(Expr),
    Assignment {
        target: Expr,
        source: Expr,
    },
    /// A call evaluated for its effect
    Call(Expr),
}

impl Stmt {
    /// Whether this statement can sit in a `NestedIf`'s `else if` slot
    pub fn is_conditional(&self) -> bool {
        matches!(self, Stmt::If { .. } | Stmt::ShortIf { .. } | Stmt::NestedIf { .. })
    }
}

// ==================== Expressions ====================

/// An expression together with its resolved type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    Number(f64),
    String(String),
    Bool(bool),
    Variable(VariableId),
    Function(FunctionId),
    /// A struct type used as its own constructor
    Struct(StructId),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Array(Vec<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        field: String,
    },
    Subscript {
        array: Box<Expr>,
        index: Box<Expr>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Self { kind, ty }
    }

    pub fn number(value: f64) -> Self {
        Self::new(ExprKind::Number(value), Type::Number)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExprKind::String(value.into()), Type::String)
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(ExprKind::Bool(value), Type::Bool)
    }

    pub fn variable(id: VariableId, ty: Type) -> Self {
        Self::new(ExprKind::Variable(id), ty)
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr, ty: Type) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn unary(op: UnOp, operand: Expr, ty: Type) -> Self {
        Self::new(ExprKind::Unary { op, operand: Box::new(operand) }, ty)
    }

    /// Value of a number literal
    pub fn as_number(&self) -> Option<f64> {
        match self.kind {
            ExprKind::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Value of a boolean literal
    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            ExprKind::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_number(&self, value: f64) -> bool {
        self.as_number() == Some(value)
    }

    /// `[T]()` or an array literal with no elements
    pub fn is_empty_array(&self) -> bool {
        matches!(&self.kind, ExprKind::Array(elements) if elements.is_empty())
    }
}
