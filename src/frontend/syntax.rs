//! Parse tree for Quill
//!
//! One node per grammar rule, carrying source spans but no semantic
//! information. The semantic analyzer destructures it by exhaustive match.

use std::fmt;

use serde::Serialize;

use crate::utils::Span;

/// A complete program (compilation unit)
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// An identifier occurrence
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// Type annotation as written
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `number`, `Point`, ...
    Named(Ident),
    /// `[T]`
    Array(Box<TypeExpr>, Span),
    /// `(T, U) -> R`
    Function {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
        span: Span,
    },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named(ident) => ident.span,
            TypeExpr::Array(_, span) | TypeExpr::Function { span, .. } => *span,
        }
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Struct or class field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Code block
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// What follows `else`
#[derive(Debug, Clone, PartialEq)]
pub enum Else {
    Block(Block),
    If(Box<Stmt>),
}

/// Statement
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let|const name [: type] [= expr];`
    VarDecl {
        name: Ident,
        read_only: bool,
        ty: Option<TypeExpr>,
        init: Option<Expr>,
        span: Span,
    },
    /// `fn name(params) [: type] { .. }`
    FnDecl {
        name: Ident,
        params: Vec<Param>,
        ret: Option<TypeExpr>,
        body: Block,
        span: Span,
    },
    /// `struct Name { .. }` or `class Name { .. }`
    StructDecl {
        name: Ident,
        fields: Vec<FieldDecl>,
        is_class: bool,
        span: Span,
    },
    If {
        test: Expr,
        consequent: Block,
        alternate: Option<Else>,
        span: Span,
    },
    While {
        test: Expr,
        body: Block,
        span: Span,
    },
    /// `for i in low ... high { .. }`
    ForRange {
        iterator: Ident,
        low: Expr,
        op: RangeOp,
        high: Expr,
        body: Block,
        span: Span,
    },
    /// `for x in collection { .. }`
    ForCollection {
        iterator: Ident,
        collection: Expr,
        body: Block,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    TryCatch {
        body: Block,
        error: Option<Ident>,
        handler: Block,
        span: Span,
    },
    Print {
        value: Expr,
        span: Span,
    },
    Increment {
        target: Expr,
        span: Span,
    },
    Decrement {
        target: Expr,
        span: Span,
    },
    Assign {
        target: Expr,
        value: Expr,
        span: Span,
    },
    /// A call used as a statement
    Call {
        call: Expr,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl { span, .. }
            | Stmt::FnDecl { span, .. }
            | Stmt::StructDecl { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::ForRange { span, .. }
            | Stmt::ForCollection { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::TryCatch { span, .. }
            | Stmt::Print { span, .. }
            | Stmt::Increment { span, .. }
            | Stmt::Decrement { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::Call { span, .. } => *span,
            Stmt::Break(span) | Stmt::Continue(span) => *span,
        }
    }
}

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64, Span),
    String(String, Span),
    Bool(bool, Span),
    Ident(Ident),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        span: Span,
    },
    /// `[a, b, c]`
    Array {
        elements: Vec<Expr>,
        span: Span,
    },
    /// `[T]()`
    EmptyArray {
        ty: TypeExpr,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Member {
        object: Box<Expr>,
        field: Ident,
        span: Span,
    },
    Subscript {
        array: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number(_, span) | Expr::String(_, span) | Expr::Bool(_, span) => *span,
            Expr::Ident(ident) => ident.span,
            Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Array { span, .. }
            | Expr::EmptyArray { span, .. }
            | Expr::Call { span, .. }
            | Expr::Member { span, .. }
            | Expr::Subscript { span, .. } => *span,
        }
    }
}

// ==================== Operators ====================

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    pub fn is_ordering(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::Or | BinOp::And)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "**",
        };
        write!(f, "{}", s)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnOp {
    /// -x
    Neg,
    /// !x
    Not,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "!"),
        }
    }
}

/// Range loop operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RangeOp {
    /// `...`, high bound included
    Inclusive,
    /// `..<`, high bound excluded
    Exclusive,
}

impl fmt::Display for RangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeOp::Inclusive => write!(f, "..."),
            RangeOp::Exclusive => write!(f, "..<"),
        }
    }
}
