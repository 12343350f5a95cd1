//! Token definitions for Quill

use crate::utils::Span;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn eof(span: Span) -> Self {
        Self { kind: TokenKind::Eof, span }
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ============ Keywords ============
    /// let
    Let,
    /// const
    Const,
    /// fn
    Fn,
    /// struct
    Struct,
    /// class
    Class,
    /// if
    If,
    /// else
    Else,
    /// while
    While,
    /// for
    For,
    /// in
    In,
    /// return
    Return,
    /// break
    Break,
    /// continue
    Continue,
    /// try
    Try,
    /// catch
    Catch,
    /// print
    Print,
    /// true
    True,
    /// false
    False,

    // ============ Identifiers and Literals ============
    /// Identifier (variable, function, struct or type name)
    Ident(String),
    /// Number literal
    NumberLit(f64),
    /// String literal
    StringLit(String),

    // ============ Operators ============
    /// +
    Plus,
    /// ++
    PlusPlus,
    /// -
    Minus,
    /// --
    MinusMinus,
    /// *
    Star,
    /// **
    StarStar,
    /// /
    Slash,
    /// =
    Eq,
    /// ==
    EqEq,
    /// !=
    Ne,
    /// <
    Lt,
    /// <=
    Le,
    /// >
    Gt,
    /// >=
    Ge,
    /// &&
    AndAnd,
    /// ||
    OrOr,
    /// !
    Not,
    /// ->
    Arrow,
    /// .
    Dot,
    /// ...
    DotDotDot,
    /// ..<
    DotDotLt,

    // ============ Delimiters ============
    /// (
    LParen,
    /// )
    RParen,
    /// {
    LBrace,
    /// }
    RBrace,
    /// [
    LBracket,
    /// ]
    RBracket,
    /// ,
    Comma,
    /// :
    Colon,
    /// ;
    Semicolon,

    // ============ Special ============
    /// End of file
    Eof,
    /// Unknown/invalid character
    Unknown(char),
    /// String literal missing its closing quote
    UnterminatedString,
}

impl TokenKind {
    /// Source text of a fixed-spelling token (keyword, operator or delimiter)
    pub fn spelling(&self) -> Option<&'static str> {
        let text = match self {
            TokenKind::Let => "let",
            TokenKind::Const => "const",
            TokenKind::Fn => "fn",
            TokenKind::Struct => "struct",
            TokenKind::Class => "class",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Return => "return",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Print => "print",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Plus => "+",
            TokenKind::PlusPlus => "++",
            TokenKind::Minus => "-",
            TokenKind::MinusMinus => "--",
            TokenKind::Star => "*",
            TokenKind::StarStar => "**",
            TokenKind::Slash => "/",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::Ne => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Not => "!",
            TokenKind::Arrow => "->",
            TokenKind::Dot => ".",
            TokenKind::DotDotDot => "...",
            TokenKind::DotDotLt => "..<",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Ident(_)
            | TokenKind::NumberLit(_)
            | TokenKind::StringLit(_)
            | TokenKind::Eof
            | TokenKind::Unknown(_)
            | TokenKind::UnterminatedString => return None,
        };
        Some(text)
    }

    /// Try to convert an identifier to a keyword
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        match s {
            "let" => Some(TokenKind::Let),
            "const" => Some(TokenKind::Const),
            "fn" => Some(TokenKind::Fn),
            "struct" => Some(TokenKind::Struct),
            "class" => Some(TokenKind::Class),
            "if" => Some(TokenKind::If),
            "else" => Some(TokenKind::Else),
            "while" => Some(TokenKind::While),
            "for" => Some(TokenKind::For),
            "in" => Some(TokenKind::In),
            "return" => Some(TokenKind::Return),
            "break" => Some(TokenKind::Break),
            "continue" => Some(TokenKind::Continue),
            "try" => Some(TokenKind::Try),
            "catch" => Some(TokenKind::Catch),
            "print" => Some(TokenKind::Print),
            "true" => Some(TokenKind::True),
            "false" => Some(TokenKind::False),
            _ => None,
        }
    }

    /// Binding power of a binary operator (for Pratt parsing).
    /// Returns None if not a binary operator.
    pub fn binary_precedence(&self) -> Option<u8> {
        match self {
            TokenKind::OrOr => Some(1),
            TokenKind::AndAnd => Some(2),
            TokenKind::EqEq | TokenKind::Ne => Some(3),
            TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge => Some(4),
            TokenKind::Plus | TokenKind::Minus => Some(5),
            TokenKind::Star | TokenKind::Slash => Some(6),
            // Right-associative, binds tighter than unary minus on its left
            TokenKind::StarStar => Some(8),
            _ => None,
        }
    }

    /// Human-readable spelling for diagnostics
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::NumberLit(n) => format!("number {}", n),
            TokenKind::StringLit(s) => format!("string \"{}\"", s),
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Unknown(c) => format!("character '{}'", c),
            TokenKind::UnterminatedString => "unterminated string".to_string(),
            other => match other.spelling() {
                Some(text) => format!("'{}'", text),
                None => format!("{:?}", other),
            },
        }
    }
}
