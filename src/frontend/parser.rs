//! Parser for Quill
//!
//! Recursive descent parser with Pratt parsing for expressions.

use crate::frontend::lexer::Lexer;
use crate::frontend::syntax::*;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// Binding power of prefix `-` and `!`; `**` binds tighter
const UNARY_BP: u8 = 7;

/// Parse a complete source text
pub fn parse(source: &str) -> Result<Program> {
    Parser::new(Lexer::new(source)).parse_program()
}

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Create a new parser from a lexer
    pub fn new(mut lexer: Lexer) -> Self {
        Self {
            tokens: lexer.tokenize(),
            pos: 0,
        }
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        // The lexer always ends the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn previous_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Error located at the current token
    fn unexpected(&self, expected: &str) -> Error {
        let token = self.current();
        let message = match &token.kind {
            TokenKind::Unknown(c) => format!("Unexpected character '{}'", c),
            TokenKind::UnterminatedString => "Unterminated string".to_string(),
            other => format!("Expected {}, found {}", expected, other.describe()),
        };
        Error::syntax(message, token.span)
    }

    fn expect(&mut self, expected: TokenKind, what: &str) -> Result<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.current().clone();
        if let TokenKind::Ident(name) = token.kind {
            self.advance();
            Ok(Ident { name, span: token.span })
        } else {
            Err(self.unexpected("an identifier"))
        }
    }

    // ==================== Statements ====================

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            statements.push(self.parse_stmt()?);
        }
        Ok(Program { statements })
    }

    fn parse_block(&mut self) -> Result<Block> {
        let start = self.expect(TokenKind::LBrace, "'{'")?.span;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_stmt()?);
        }
        let end = self.expect(TokenKind::RBrace, "'}'")?.span;
        Ok(Block { stmts, span: start.merge(&end) })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.current_kind() {
            TokenKind::Let | TokenKind::Const => self.parse_var_decl(),
            TokenKind::Fn => self.parse_function(),
            TokenKind::Struct | TokenKind::Class => self.parse_struct(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Return => {
                let start = self.advance().span;
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Return { value, span: start.merge(&self.previous_span()) })
            }
            TokenKind::Break => {
                let start = self.advance().span;
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Break(start))
            }
            TokenKind::Continue => {
                let start = self.advance().span;
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Continue(start))
            }
            TokenKind::Print => {
                let start = self.advance().span;
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Print { value, span: start.merge(&self.previous_span()) })
            }
            _ => self.parse_simple_stmt(),
        }
    }

    /// `let|const name [: type] [= expr];`
    fn parse_var_decl(&mut self) -> Result<Stmt> {
        let start = self.advance();
        let read_only = matches!(start.kind, TokenKind::Const);
        let name = self.parse_ident()?;
        let ty = if self.consume(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.consume(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::VarDecl {
            name,
            read_only,
            ty,
            init,
            span: start.span.merge(&self.previous_span()),
        })
    }

    /// `fn name(a: T, ...) [: R] { .. }`
    fn parse_function(&mut self) -> Result<Stmt> {
        let start = self.advance().span;
        let name = self.parse_ident()?;

        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            let param_name = self.parse_ident()?;
            self.expect(TokenKind::Colon, "':'")?;
            let ty = self.parse_type()?;
            let span = param_name.span.merge(&ty.span());
            params.push(Param { name: param_name, ty, span });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;

        let ret = if self.consume(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;
        Ok(Stmt::FnDecl {
            name,
            params,
            ret,
            span: start.merge(&body.span),
            body,
        })
    }

    /// `struct Name { f: T, ... }`
    fn parse_struct(&mut self) -> Result<Stmt> {
        let start = self.advance();
        let is_class = matches!(start.kind, TokenKind::Class);
        let name = self.parse_ident()?;

        self.expect(TokenKind::LBrace, "'{'")?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let field_name = self.parse_ident()?;
            self.expect(TokenKind::Colon, "':'")?;
            let ty = self.parse_type()?;
            let span = field_name.span.merge(&ty.span());
            fields.push(FieldDecl { name: field_name, ty, span });
            if !self.consume(&TokenKind::Comma) {
                self.consume(&TokenKind::Semicolon);
            }
        }
        let end = self.expect(TokenKind::RBrace, "'}'")?.span;

        Ok(Stmt::StructDecl {
            name,
            fields,
            is_class,
            span: start.span.merge(&end),
        })
    }

    /// `if e { .. } [else { .. } | else if ..]`
    fn parse_if(&mut self) -> Result<Stmt> {
        let start = self.expect(TokenKind::If, "'if'")?.span;
        let test = self.parse_expr()?;
        let consequent = self.parse_block()?;

        let alternate = if self.consume(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(Else::If(Box::new(self.parse_if()?)))
            } else {
                Some(Else::Block(self.parse_block()?))
            }
        } else {
            None
        };

        Ok(Stmt::If {
            test,
            consequent,
            alternate,
            span: start.merge(&self.previous_span()),
        })
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        let start = self.advance().span;
        let test = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::While {
            test,
            span: start.merge(&body.span),
            body,
        })
    }

    /// `for i in low ... high { .. }`, `for i in low ..< high { .. }` or `for x in coll { .. }`
    fn parse_for(&mut self) -> Result<Stmt> {
        let start = self.advance().span;
        let iterator = self.parse_ident()?;
        self.expect(TokenKind::In, "'in'")?;
        let first = self.parse_expr()?;

        let op = match self.current_kind() {
            TokenKind::DotDotDot => Some(RangeOp::Inclusive),
            TokenKind::DotDotLt => Some(RangeOp::Exclusive),
            _ => None,
        };

        match op {
            Some(op) => {
                self.advance();
                let high = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt::ForRange {
                    iterator,
                    low: first,
                    op,
                    high,
                    span: start.merge(&body.span),
                    body,
                })
            }
            None => {
                let body = self.parse_block()?;
                Ok(Stmt::ForCollection {
                    iterator,
                    collection: first,
                    span: start.merge(&body.span),
                    body,
                })
            }
        }
    }

    /// `try { .. } catch [e] { .. }`
    fn parse_try(&mut self) -> Result<Stmt> {
        let start = self.advance().span;
        let body = self.parse_block()?;
        self.expect(TokenKind::Catch, "'catch'")?;
        let error = if matches!(self.current_kind(), TokenKind::Ident(_)) {
            Some(self.parse_ident()?)
        } else {
            None
        };
        let handler = self.parse_block()?;
        Ok(Stmt::TryCatch {
            body,
            error,
            span: start.merge(&handler.span),
            handler,
        })
    }

    /// Assignment, `++`, `--` or a call, each ending in `;`
    fn parse_simple_stmt(&mut self) -> Result<Stmt> {
        let target = self.parse_expr()?;
        let start = target.span();

        let stmt = match self.current_kind() {
            TokenKind::Eq => {
                self.advance();
                let value = self.parse_expr()?;
                let span = start.merge(&value.span());
                Stmt::Assign { target, value, span }
            }
            TokenKind::PlusPlus => {
                let span = start.merge(&self.advance().span);
                Stmt::Increment { target, span }
            }
            TokenKind::MinusMinus => {
                let span = start.merge(&self.advance().span);
                Stmt::Decrement { target, span }
            }
            _ if matches!(target, Expr::Call { .. }) => Stmt::Call { call: target, span: start },
            _ => return Err(self.unexpected("'=', '++', '--' or a call")),
        };

        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(stmt)
    }

    // ==================== Types ====================

    /// `number | string | boolean | void | Name | [T] | (T, ...) -> R`
    fn parse_type(&mut self) -> Result<TypeExpr> {
        match self.current_kind() {
            TokenKind::Ident(_) => Ok(TypeExpr::Named(self.parse_ident()?)),
            TokenKind::LBracket => {
                let start = self.advance().span;
                let base = self.parse_type()?;
                let end = self.expect(TokenKind::RBracket, "']'")?.span;
                Ok(TypeExpr::Array(Box::new(base), start.merge(&end)))
            }
            TokenKind::LParen => {
                let start = self.advance().span;
                let mut params = Vec::new();
                while !self.check(&TokenKind::RParen) && !self.is_at_end() {
                    params.push(self.parse_type()?);
                    if !self.consume(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "')'")?;
                self.expect(TokenKind::Arrow, "'->'")?;
                let ret = self.parse_type()?;
                let span = start.merge(&ret.span());
                Ok(TypeExpr::Function {
                    params,
                    ret: Box::new(ret),
                    span,
                })
            }
            _ => Err(self.unexpected("a type")),
        }
    }

    // ==================== Expressions ====================

    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    /// Parse expression with binding power (Pratt parsing)
    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        let mut left = self.parse_prefix()?;

        loop {
            let op_kind = self.current_kind().clone();
            let Some(bp) = op_kind.binary_precedence() else {
                break;
            };

            if bp < min_bp {
                break;
            }

            self.advance();
            let op = Self::token_to_binop(&op_kind);

            // Right-associative for exponentiation
            let next_bp = if op == BinOp::Pow { bp } else { bp + 1 };

            let right = self.parse_expr_bp(next_bp)?;
            let span = left.span().merge(&right.span());

            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn token_to_binop(kind: &TokenKind) -> BinOp {
        match kind {
            TokenKind::OrOr => BinOp::Or,
            TokenKind::AndAnd => BinOp::And,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::Ne => BinOp::Ne,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Le => BinOp::Le,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            // binary_precedence admits nothing else
            _ => BinOp::Pow,
        }
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        let op = match self.current_kind() {
            TokenKind::Minus => UnOp::Neg,
            TokenKind::Not => UnOp::Not,
            _ => {
                let primary = self.parse_primary()?;
                return self.parse_postfix(primary);
            }
        };
        let start = self.advance().span;
        let operand = self.parse_expr_bp(UNARY_BP)?;
        Ok(Expr::Unary {
            op,
            span: start.merge(&operand.span()),
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current().clone();

        let expr = match token.kind {
            TokenKind::NumberLit(n) => {
                self.advance();
                Expr::Number(n, token.span)
            }
            TokenKind::StringLit(s) => {
                self.advance();
                Expr::String(s, token.span)
            }
            TokenKind::True => {
                self.advance();
                Expr::Bool(true, token.span)
            }
            TokenKind::False => {
                self.advance();
                Expr::Bool(false, token.span)
            }
            TokenKind::Ident(_) => Expr::Ident(self.parse_ident()?),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                inner
            }
            TokenKind::LBracket => self.parse_array()?,
            _ => return Err(self.unexpected("an expression")),
        };

        Ok(expr)
    }

    /// `[T]()` or `[a, b, ...]`
    fn parse_array(&mut self) -> Result<Expr> {
        let start = self.advance().span;

        let saved = self.pos;
        if let Some(ty) = self.try_empty_array_type() {
            return Ok(Expr::EmptyArray {
                ty,
                span: start.merge(&self.previous_span()),
            });
        }
        self.pos = saved;

        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            elements.push(self.parse_expr()?);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBracket, "']'")?.span;
        Ok(Expr::Array {
            elements,
            span: start.merge(&end),
        })
    }

    /// Recognize `T]()` after an opening bracket; the caller rewinds on None
    fn try_empty_array_type(&mut self) -> Option<TypeExpr> {
        let ty = self.parse_type().ok()?;
        for kind in [TokenKind::RBracket, TokenKind::LParen, TokenKind::RParen] {
            if !self.consume(&kind) {
                return None;
            }
        }
        Some(ty)
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr> {
        loop {
            if self.consume(&TokenKind::LParen) {
                let mut args = Vec::new();
                while !self.check(&TokenKind::RParen) && !self.is_at_end() {
                    args.push(self.parse_expr()?);
                    if !self.consume(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "')'")?;
                expr = Expr::Call {
                    span: expr.span().merge(&self.previous_span()),
                    callee: Box::new(expr),
                    args,
                };
            } else if self.consume(&TokenKind::Dot) {
                let field = self.parse_ident()?;
                expr = Expr::Member {
                    span: expr.span().merge(&field.span),
                    object: Box::new(expr),
                    field,
                };
            } else if self.consume(&TokenKind::LBracket) {
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket, "']'")?;
                expr = Expr::Subscript {
                    span: expr.span().merge(&self.previous_span()),
                    array: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_stmt(source: &str) -> Stmt {
        parse(source).unwrap().statements.remove(0)
    }

    fn print_value(source: &str) -> Expr {
        match first_stmt(source) {
            Stmt::Print { value, .. } => value,
            other => panic!("expected print, got {:?}", other),
        }
    }

    #[test]
    fn test_declarations() {
        let program = parse(
            "let x: number = 1;\nconst s = \"hi\";\nfn f(a: number, b: [string]): boolean { return true; }\nstruct P { x: number, y: number }\nclass C { }",
        )
        .unwrap();
        assert_eq!(program.statements.len(), 5);
        assert!(matches!(&program.statements[1], Stmt::VarDecl { read_only: true, ty: None, .. }));
        assert!(matches!(&program.statements[2], Stmt::FnDecl { params, ret: Some(_), .. } if params.len() == 2));
        assert!(matches!(&program.statements[3], Stmt::StructDecl { fields, is_class: false, .. } if fields.len() == 2));
        assert!(matches!(&program.statements[4], Stmt::StructDecl { is_class: true, .. }));
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 == 7 || false  =>  ((1 + (2 * 3)) == 7) || false
        let Expr::Binary { op: BinOp::Or, left, .. } = print_value("print 1 + 2 * 3 == 7 || false;") else {
            panic!("expected ||");
        };
        let Expr::Binary { op: BinOp::Eq, left, .. } = *left else {
            panic!("expected ==");
        };
        assert!(matches!(*left, Expr::Binary { op: BinOp::Add, ref right, .. }
            if matches!(**right, Expr::Binary { op: BinOp::Mul, .. })));
    }

    #[test]
    fn test_power_is_right_associative_and_binds_over_negation() {
        let Expr::Binary { op: BinOp::Pow, right, .. } = print_value("print 2 ** 3 ** 2;") else {
            panic!("expected **");
        };
        assert!(matches!(*right, Expr::Binary { op: BinOp::Pow, .. }));

        let Expr::Unary { op: UnOp::Neg, operand, .. } = print_value("print -2 ** 2;") else {
            panic!("expected negation");
        };
        assert!(matches!(*operand, Expr::Binary { op: BinOp::Pow, .. }));
    }

    #[test]
    fn test_postfix_chain() {
        let value = print_value("print a.b[0](1, 2);");
        let Expr::Call { callee, args, .. } = value else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(*callee, Expr::Subscript { ref array, .. } if matches!(**array, Expr::Member { .. })));
    }

    #[test]
    fn test_typed_empty_array_and_literal() {
        assert!(matches!(print_value("print [number]();"), Expr::EmptyArray { ty: TypeExpr::Named(_), .. }));
        assert!(matches!(print_value("print [[string]]();"), Expr::EmptyArray { ty: TypeExpr::Array(..), .. }));
        assert!(matches!(print_value("print [x];"), Expr::Array { ref elements, .. } if elements.len() == 1));
        assert!(matches!(print_value("print [1, 2, 3];"), Expr::Array { ref elements, .. } if elements.len() == 3));
    }

    #[test]
    fn test_function_type_annotation() {
        let Stmt::VarDecl { ty: Some(TypeExpr::Function { params, .. }), .. } = first_stmt("let f: (number, string) -> boolean;")
        else {
            panic!("expected function type");
        };
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_control_flow() {
        let Stmt::If { alternate: Some(Else::If(nested)), .. } = first_stmt("if a { } else if b { } else { }") else {
            panic!("expected else-if chain");
        };
        assert!(matches!(*nested, Stmt::If { alternate: Some(Else::Block(_)), .. }));

        assert!(matches!(first_stmt("for i in 1 ... 10 { }"), Stmt::ForRange { op: RangeOp::Inclusive, .. }));
        assert!(matches!(first_stmt("for i in 0 ..< n { }"), Stmt::ForRange { op: RangeOp::Exclusive, .. }));
        assert!(matches!(first_stmt("for x in xs { }"), Stmt::ForCollection { .. }));
        assert!(matches!(first_stmt("while true { break; continue; }"), Stmt::While { body, .. } if body.stmts.len() == 2));
        assert!(matches!(first_stmt("try { } catch e { }"), Stmt::TryCatch { error: Some(_), .. }));
        assert!(matches!(first_stmt("try { } catch { }"), Stmt::TryCatch { error: None, .. }));
    }

    #[test]
    fn test_simple_statements() {
        assert!(matches!(first_stmt("x++;"), Stmt::Increment { .. }));
        assert!(matches!(first_stmt("x--;"), Stmt::Decrement { .. }));
        assert!(matches!(first_stmt("p.x = 3;"), Stmt::Assign { target: Expr::Member { .. }, .. }));
        assert!(matches!(first_stmt("f(1);"), Stmt::Call { .. }));
        assert!(matches!(first_stmt("return;"), Stmt::Return { value: None, .. }));
    }

    #[test]
    fn test_bare_expression_is_rejected() {
        let err = parse("x + 1;").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }

    #[test]
    fn test_syntax_error_location() {
        let err = parse("let x = 1;\nlet = 2;").unwrap_err();
        let span = err.span();
        assert_eq!((span.line, span.column), (2, 5));
        assert!(err.message().contains("Expected an identifier"));
    }

    #[test]
    fn test_found_token_uses_source_spelling() {
        let err = parse("fn f() { print 1 }").unwrap_err();
        assert_eq!(err.message(), "Expected ';', found '}'");
        let err = parse("let x = 1 let y = 2;").unwrap_err();
        assert_eq!(err.message(), "Expected ';', found 'let'");
    }

    #[test]
    fn test_lexical_errors_surface_as_syntax_errors() {
        assert!(parse("print 1 # 2;").unwrap_err().message().contains("Unexpected character '#'"));
        assert!(parse("print \"abc").unwrap_err().message().contains("Unterminated string"));
    }
}
