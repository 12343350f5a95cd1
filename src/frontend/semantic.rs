//! Semantic Analysis for Quill
//!
//! Performs:
//! - Name resolution through the scope chain
//! - Type checking of every expression
//! - Declaration rules (uniqueness, const initializers, struct placement)
//! - Control-flow placement of break / continue / return
//!
//! The output is the decorated AST; the first violation aborts the pass.

use std::collections::HashSet;

use log::{debug, trace};

use crate::frontend::scope::{Context, Entity};
use crate::frontend::syntax;
use crate::middle::ast::{self, Entities, Expr, ExprKind, Field, Function, StructType, Variable};
use crate::types::{FunctionType, StructId, Type};
use crate::utils::{Error, Result, Span};

/// Analyze a parse tree into a decorated program
pub fn analyze(program: &syntax::Program) -> Result<ast::Program> {
    SemanticAnalyzer::new().analyze(program)
}

/// The semantic analyzer
///
/// Owns the entity arena being built; scope frames are passed explicitly.
pub struct SemanticAnalyzer {
    entities: Entities,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self {
            entities: Entities::new(),
        }
    }

    /// Analyze a complete program
    pub fn analyze(mut self, program: &syntax::Program) -> Result<ast::Program> {
        let mut root = Context::root(&mut self.entities);
        let statements = self.block(&program.statements, &mut root)?;

        debug!(
            "analyzed {} top-level statements ({} variables, {} functions, {} structs)",
            statements.len(),
            self.entities.variables.len(),
            self.entities.functions.len(),
            self.entities.structs.len()
        );

        Ok(ast::Program {
            statements,
            entities: self.entities,
        })
    }

    fn block(&mut self, stmts: &[syntax::Stmt], ctx: &mut Context<'_>) -> Result<Vec<ast::Stmt>> {
        stmts.iter().map(|stmt| self.stmt(stmt, ctx)).collect()
    }

    // ==================== Declarations ====================

    fn check_not_declared(&self, name: &syntax::Ident, ctx: &Context<'_>) -> Result<()> {
        if ctx.declares(&name.name) {
            return Err(Error::semantic(
                format!("Identifier {} already declared", name.name),
                name.span,
            ));
        }
        Ok(())
    }

    fn check_not_void(&self, ty: &Type, span: Span) -> Result<()> {
        if ty.is_void() {
            return Err(Error::semantic("Variables cannot have type void", span));
        }
        Ok(())
    }

    fn check_assignable(&self, source: &Expr, target: &Type, span: Span) -> Result<()> {
        if !source.ty.is_assignable_to(target) {
            return Err(Error::semantic(
                format!(
                    "Cannot assign a {} to a {}",
                    self.entities.describe(&source.ty),
                    self.entities.describe(target)
                ),
                span,
            ));
        }
        Ok(())
    }

    fn variable_declaration(
        &mut self,
        name: &syntax::Ident,
        read_only: bool,
        annotation: Option<&syntax::TypeExpr>,
        init: Option<&syntax::Expr>,
        span: Span,
        ctx: &mut Context<'_>,
    ) -> Result<ast::Stmt> {
        if read_only && init.is_none() {
            return Err(Error::semantic("Const declarations require an initializer", span));
        }
        self.check_not_declared(name, ctx)?;

        // The initializer cannot see the variable it initializes
        let initializer = init.map(|e| self.expr(e, ctx)).transpose()?;

        let ty = match (annotation, &initializer) {
            (Some(annotation), _) => {
                let ty = self.resolve_type(annotation, ctx)?;
                if let (Some(value), Some(expr)) = (&initializer, init) {
                    self.check_assignable(value, &ty, expr.span())?;
                }
                ty
            }
            (None, Some(value)) => value.ty.clone(),
            (None, None) => {
                return Err(Error::semantic(
                    format!("Cannot infer type of {} without an initializer", name.name),
                    name.span,
                ))
            }
        };
        self.check_not_void(&ty, span)?;

        let variable = self.entities.add_variable(Variable {
            name: name.name.clone(),
            read_only,
            ty,
        });
        ctx.add(name.name.clone(), Entity::Variable(variable));
        trace!("declared variable {} as {:?}", name.name, variable);

        Ok(ast::Stmt::VariableDeclaration { variable, initializer })
    }

    fn function_declaration(
        &mut self,
        name: &syntax::Ident,
        params: &[syntax::Param],
        ret: Option<&syntax::TypeExpr>,
        body: &syntax::Block,
        ctx: &mut Context<'_>,
    ) -> Result<ast::Stmt> {
        self.check_not_declared(name, ctx)?;

        // Bind the name first so the body can call it; the type is filled in
        // once the parameters are known
        let function = self.entities.add_function(Function {
            name: name.name.clone(),
            ty: FunctionType::new(Vec::new(), Type::Void),
            builtin: false,
        });
        ctx.add(name.name.clone(), Entity::Function(function));
        trace!("declared function {} as {:?}", name.name, function);

        let ret = match ret {
            Some(ty) => self.resolve_type(ty, ctx)?,
            None => Type::Void,
        };

        let mut body_ctx = ctx.function_body(function);
        let mut param_ids = Vec::with_capacity(params.len());
        let mut param_types = Vec::with_capacity(params.len());
        for param in params {
            self.check_not_declared(&param.name, &body_ctx)?;
            let ty = self.resolve_type(&param.ty, &body_ctx)?;
            self.check_not_void(&ty, param.span)?;
            let id = self.entities.add_variable(Variable {
                name: param.name.name.clone(),
                read_only: false,
                ty: ty.clone(),
            });
            body_ctx.add(param.name.name.clone(), Entity::Variable(id));
            param_ids.push(id);
            param_types.push(ty);
        }

        self.entities.function_mut(function).ty = FunctionType::new(param_types, ret);

        let body = self.block(&body.stmts, &mut body_ctx)?;

        Ok(ast::Stmt::FunctionDeclaration {
            function,
            params: param_ids,
            body,
        })
    }

    fn struct_declaration(
        &mut self,
        name: &syntax::Ident,
        fields: &[syntax::FieldDecl],
        is_class: bool,
        span: Span,
        ctx: &mut Context<'_>,
    ) -> Result<ast::Stmt> {
        if ctx.function().is_some() {
            return Err(Error::semantic(
                "Struct declarations must be at top level or in a block outside functions",
                span,
            ));
        }
        self.check_not_declared(name, ctx)?;

        // Bind the name first so field types can mention it
        let id = self.entities.add_struct(StructType {
            name: name.name.clone(),
            fields: Vec::new(),
            is_class,
        });
        ctx.add(name.name.clone(), Entity::Struct(id));
        trace!("declared struct {} as {:?}", name.name, id);

        // Fields resolve in their own frame so nothing leaks out
        let field_ctx = ctx.block();
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(fields.len());
        for field in fields {
            if !seen.insert(field.name.name.as_str()) {
                return Err(Error::semantic("Fields must be distinct", field.name.span));
            }
            resolved.push(Field {
                name: field.name.name.clone(),
                ty: self.resolve_type(&field.ty, &field_ctx)?,
            });
        }

        self.entities.struct_type_mut(id).fields = resolved;

        if self.contains_struct(id, id, &mut HashSet::new()) {
            return Err(Error::semantic("Struct type must not be self-containing", name.span));
        }

        Ok(if is_class {
            ast::Stmt::ClassDeclaration(id)
        } else {
            ast::Stmt::StructDeclaration(id)
        })
    }

    /// Whether `outer` holds a value of struct `target` through its struct
    /// fields, directly or transitively. Arrays and functions do not count.
    fn contains_struct(&self, outer: StructId, target: StructId, visited: &mut HashSet<StructId>) -> bool {
        if !visited.insert(outer) {
            return false;
        }
        self.entities.struct_type(outer).fields.iter().any(|field| match field.ty {
            Type::Struct(inner) => inner == target || self.contains_struct(inner, target, visited),
            _ => false,
        })
    }

    // ==================== Statements ====================

    fn stmt(&mut self, stmt: &syntax::Stmt, ctx: &mut Context<'_>) -> Result<ast::Stmt> {
        match stmt {
            syntax::Stmt::VarDecl {
                name,
                read_only,
                ty,
                init,
                span,
            } => self.variable_declaration(name, *read_only, ty.as_ref(), init.as_ref(), *span, ctx),

            syntax::Stmt::FnDecl {
                name, params, ret, body, ..
            } => self.function_declaration(name, params, ret.as_ref(), body, ctx),

            syntax::Stmt::StructDecl {
                name,
                fields,
                is_class,
                span,
            } => self.struct_declaration(name, fields, *is_class, *span, ctx),

            syntax::Stmt::If {
                test,
                consequent,
                alternate,
                ..
            } => {
                let test = self.condition(test, ctx)?;
                let consequent = self.block(&consequent.stmts, &mut ctx.block())?;
                Ok(match alternate {
                    None => ast::Stmt::ShortIf { test, consequent },
                    Some(syntax::Else::Block(alternate)) => ast::Stmt::If {
                        test,
                        consequent,
                        alternate: self.block(&alternate.stmts, &mut ctx.block())?,
                    },
                    Some(syntax::Else::If(else_if)) => ast::Stmt::NestedIf {
                        test,
                        consequent,
                        else_if: Box::new(self.stmt(else_if, ctx)?),
                    },
                })
            }

            syntax::Stmt::While { test, body, .. } => {
                let test = self.condition(test, ctx)?;
                let body = self.block(&body.stmts, &mut ctx.loop_body())?;
                Ok(ast::Stmt::While { test, body })
            }

            syntax::Stmt::ForRange {
                iterator,
                low,
                op,
                high,
                body,
                ..
            } => {
                let low = self.number_operand(low, ctx)?;
                let high = self.number_operand(high, ctx)?;
                let mut body_ctx = ctx.loop_body();
                let iterator = self.loop_iterator(iterator, Type::Number, &mut body_ctx);
                let body = self.block(&body.stmts, &mut body_ctx)?;
                Ok(ast::Stmt::ForRange {
                    iterator,
                    low,
                    op: *op,
                    high,
                    body,
                })
            }

            syntax::Stmt::ForCollection {
                iterator,
                collection,
                body,
                ..
            } => {
                let span = collection.span();
                let collection = self.expr(collection, ctx)?;
                let Some(base) = collection.ty.base().cloned() else {
                    return Err(Error::semantic("Expected an array", span));
                };
                let mut body_ctx = ctx.loop_body();
                let iterator = self.loop_iterator(iterator, base, &mut body_ctx);
                let body = self.block(&body.stmts, &mut body_ctx)?;
                Ok(ast::Stmt::ForCollection {
                    iterator,
                    collection,
                    body,
                })
            }

            syntax::Stmt::Return { value, span } => self.return_statement(value.as_ref(), *span, ctx),

            syntax::Stmt::Break(span) => {
                if !ctx.in_loop() {
                    return Err(Error::semantic("Break can only appear in a loop", *span));
                }
                Ok(ast::Stmt::Break)
            }

            syntax::Stmt::Continue(span) => {
                if !ctx.in_loop() {
                    return Err(Error::semantic("Continue can only appear in a loop", *span));
                }
                Ok(ast::Stmt::Continue)
            }

            syntax::Stmt::TryCatch {
                body, error, handler, ..
            } => {
                let body = self.block(&body.stmts, &mut ctx.block())?;
                let mut handler_ctx = ctx.block();
                let error = error.as_ref().map(|name| {
                    let id = self.entities.add_variable(Variable {
                        name: name.name.clone(),
                        read_only: true,
                        ty: Type::String,
                    });
                    handler_ctx.add(name.name.clone(), Entity::Variable(id));
                    id
                });
                let handler = self.block(&handler.stmts, &mut handler_ctx)?;
                Ok(ast::Stmt::TryCatch { body, error, handler })
            }

            syntax::Stmt::Print { value, .. } => Ok(ast::Stmt::Print(self.expr(value, ctx)?)),

            syntax::Stmt::Increment { target, .. } => {
                let target = self.writable(target, ctx)?;
                Ok(ast::Stmt::Increment(target))
            }

            syntax::Stmt::Decrement { target, .. } => {
                let target = self.writable(target, ctx)?;
                Ok(ast::Stmt::Decrement(target))
            }

            syntax::Stmt::Assign { target, value, .. } => {
                let target_expr = self.writable_target(target, ctx)?;
                let source = self.expr(value, ctx)?;
                self.check_assignable(&source, &target_expr.ty, value.span())?;
                Ok(ast::Stmt::Assignment {
                    target: target_expr,
                    source,
                })
            }

            syntax::Stmt::Call { call, .. } => Ok(ast::Stmt::Call(self.expr(call, ctx)?)),
        }
    }

    /// Declare a read-only loop iterator in the loop's own frame
    fn loop_iterator(&mut self, name: &syntax::Ident, ty: Type, body_ctx: &mut Context<'_>) -> ast::VariableId {
        let id = self.entities.add_variable(Variable {
            name: name.name.clone(),
            read_only: true,
            ty,
        });
        body_ctx.add(name.name.clone(), Entity::Variable(id));
        id
    }

    fn return_statement(&mut self, value: Option<&syntax::Expr>, span: Span, ctx: &mut Context<'_>) -> Result<ast::Stmt> {
        let Some(function) = ctx.function() else {
            return Err(Error::semantic("Return can only appear in a function", span));
        };
        let ret = (*self.entities.function(function).ty.ret).clone();

        match value {
            Some(value) => {
                if ret.is_void() {
                    return Err(Error::semantic("Cannot return a value from this function", span));
                }
                let expr = self.expr(value, ctx)?;
                self.check_assignable(&expr, &ret, value.span())?;
                Ok(ast::Stmt::Return(Some(expr)))
            }
            None if ret.is_void() => Ok(ast::Stmt::Return(None)),
            None => Err(Error::semantic("Something should be returned", span)),
        }
    }

    /// Assignment target: a mutable variable, a field or an array element
    fn writable_target(&mut self, target: &syntax::Expr, ctx: &mut Context<'_>) -> Result<Expr> {
        let span = target.span();
        let expr = self.expr(target, ctx)?;
        match &expr.kind {
            ExprKind::Variable(id) => {
                let variable = self.entities.variable(*id);
                if variable.read_only {
                    return Err(Error::semantic(
                        format!("Cannot assign to constant {}", variable.name),
                        span,
                    ));
                }
            }
            ExprKind::Member { .. } | ExprKind::Subscript { .. } => {}
            _ => return Err(Error::semantic("Cannot assign to this expression", span)),
        }
        Ok(expr)
    }

    /// Target of `++` / `--`: writable and numeric
    fn writable(&mut self, target: &syntax::Expr, ctx: &mut Context<'_>) -> Result<Expr> {
        let expr = self.writable_target(target, ctx)?;
        if !expr.ty.is_number() {
            return Err(Error::semantic("Expected a number", target.span()));
        }
        Ok(expr)
    }

    // ==================== Expressions ====================

    fn condition(&mut self, expr: &syntax::Expr, ctx: &mut Context<'_>) -> Result<Expr> {
        let analyzed = self.expr(expr, ctx)?;
        if !analyzed.ty.is_bool() {
            return Err(Error::semantic("Expected a boolean", expr.span()));
        }
        Ok(analyzed)
    }

    fn number_operand(&mut self, expr: &syntax::Expr, ctx: &mut Context<'_>) -> Result<Expr> {
        let analyzed = self.expr(expr, ctx)?;
        if !analyzed.ty.is_number() {
            return Err(Error::semantic("Expected a number", expr.span()));
        }
        Ok(analyzed)
    }

    fn expr(&mut self, expr: &syntax::Expr, ctx: &mut Context<'_>) -> Result<Expr> {
        match expr {
            syntax::Expr::Number(n, _) => Ok(Expr::number(*n)),
            syntax::Expr::String(s, _) => Ok(Expr::string(s.clone())),
            syntax::Expr::Bool(b, _) => Ok(Expr::boolean(*b)),
            syntax::Expr::Ident(ident) => self.identifier(ident, ctx),

            syntax::Expr::Binary { op, left, right, .. } => self.binary(*op, left, right, ctx),

            syntax::Expr::Unary { op, operand, .. } => {
                let (analyzed, ty) = match op {
                    ast::UnOp::Neg => (self.number_operand(operand, ctx)?, Type::Number),
                    ast::UnOp::Not => (self.condition(operand, ctx)?, Type::Bool),
                };
                Ok(Expr::unary(*op, analyzed, ty))
            }

            syntax::Expr::Array { elements, span } => {
                let analyzed = elements
                    .iter()
                    .map(|e| self.expr(e, ctx))
                    .collect::<Result<Vec<_>>>()?;
                let Some(first) = analyzed.first() else {
                    return Err(Error::semantic("Type expected", *span));
                };
                let base = first.ty.clone();
                if analyzed.iter().any(|e| !e.ty.is_equivalent(&base)) {
                    return Err(Error::semantic("Not all elements have the same type", *span));
                }
                Ok(Expr::new(ExprKind::Array(analyzed), Type::array(base)))
            }

            syntax::Expr::EmptyArray { ty, .. } => {
                let base = self.resolve_type(ty, ctx)?;
                Ok(Expr::new(ExprKind::Array(Vec::new()), Type::array(base)))
            }

            syntax::Expr::Call { callee, args, span } => self.call(callee, args, *span, ctx),

            syntax::Expr::Member { object, field, .. } => {
                let object = self.expr(object, ctx)?;
                let ty = match &object.ty {
                    Type::Struct(id) => self.entities.field(*id, &field.name).map(|f| f.ty.clone()),
                    _ => None,
                };
                let Some(ty) = ty else {
                    return Err(Error::semantic("No such field", field.span));
                };
                Ok(Expr::new(
                    ExprKind::Member {
                        object: Box::new(object),
                        field: field.name.clone(),
                    },
                    ty,
                ))
            }

            syntax::Expr::Subscript { array, index, .. } => {
                let array_span = array.span();
                let array = self.expr(array, ctx)?;
                let Some(base) = array.ty.base().cloned() else {
                    return Err(Error::semantic("Expected an array", array_span));
                };
                let index = self.number_operand(index, ctx)?;
                Ok(Expr::new(
                    ExprKind::Subscript {
                        array: Box::new(array),
                        index: Box::new(index),
                    },
                    base,
                ))
            }
        }
    }

    fn identifier(&mut self, ident: &syntax::Ident, ctx: &Context<'_>) -> Result<Expr> {
        let entity = ctx.lookup(&ident.name).ok_or_else(|| {
            Error::semantic(format!("Identifier {} not declared", ident.name), ident.span)
        })?;

        match entity {
            Entity::Variable(id) => Ok(Expr::variable(*id, self.entities.variable(*id).ty.clone())),
            Entity::Function(id) => Ok(Expr::new(
                ExprKind::Function(*id),
                Type::Function(self.entities.function(*id).ty.clone()),
            )),
            Entity::Struct(id) => Ok(Expr::new(
                ExprKind::Struct(*id),
                Type::Function(self.entities.constructor_type(*id)),
            )),
            Entity::Type(_) => Err(Error::semantic(
                format!("Type {} cannot be used as a value", ident.name),
                ident.span,
            )),
        }
    }

    fn binary(
        &mut self,
        op: ast::BinOp,
        left: &syntax::Expr,
        right: &syntax::Expr,
        ctx: &mut Context<'_>,
    ) -> Result<Expr> {
        use ast::BinOp;

        let (l, r, ty) = match op {
            BinOp::Or | BinOp::And => {
                let l = self.condition(left, ctx)?;
                let r = self.condition(right, ctx)?;
                (l, r, Type::Bool)
            }
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Pow => {
                let l = self.number_operand(left, ctx)?;
                let r = self.number_operand(right, ctx)?;
                (l, r, Type::Number)
            }
            BinOp::Add | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let l = self.expr(left, ctx)?;
                if !l.ty.is_numeric_or_string() {
                    return Err(Error::semantic("Expected a number or string", left.span()));
                }
                let r = self.expr(right, ctx)?;
                if !r.ty.is_equivalent(&l.ty) {
                    return Err(Error::semantic("Operands do not have the same type", right.span()));
                }
                let ty = if op == BinOp::Add { l.ty.clone() } else { Type::Bool };
                (l, r, ty)
            }
            BinOp::Eq | BinOp::Ne => {
                let l = self.expr(left, ctx)?;
                let r = self.expr(right, ctx)?;
                if !r.ty.is_equivalent(&l.ty) {
                    return Err(Error::semantic("Operands do not have the same type", right.span()));
                }
                (l, r, Type::Bool)
            }
        };

        Ok(Expr::binary(op, l, r, ty))
    }

    fn call(&mut self, callee: &syntax::Expr, args: &[syntax::Expr], span: Span, ctx: &mut Context<'_>) -> Result<Expr> {
        let callee = self.expr(callee, ctx)?;
        let Type::Function(signature) = callee.ty.clone() else {
            return Err(Error::semantic("Call of non-function", span));
        };

        if signature.params.len() != args.len() {
            return Err(Error::semantic(
                format!(
                    "{} argument(s) required but {} passed",
                    signature.params.len(),
                    args.len()
                ),
                span,
            ));
        }

        let mut analyzed = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(&signature.params) {
            let expr = self.expr(arg, ctx)?;
            self.check_assignable(&expr, param, arg.span())?;
            analyzed.push(expr);
        }

        Ok(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args: analyzed,
            },
            *signature.ret,
        ))
    }

    // ==================== Types ====================

    fn resolve_type(&self, ty: &syntax::TypeExpr, ctx: &Context<'_>) -> Result<Type> {
        match ty {
            syntax::TypeExpr::Named(ident) => match ctx.lookup(&ident.name) {
                Some(Entity::Type(t)) => Ok(t.clone()),
                Some(Entity::Struct(id)) => Ok(Type::Struct(*id)),
                Some(_) => Err(Error::semantic("Type expected", ident.span)),
                None => Err(Error::semantic(
                    format!("Identifier {} not declared", ident.name),
                    ident.span,
                )),
            },
            syntax::TypeExpr::Array(base, _) => Ok(Type::array(self.resolve_type(base, ctx)?)),
            syntax::TypeExpr::Function { params, ret, .. } => {
                let params = params
                    .iter()
                    .map(|p| self.resolve_type(p, ctx))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Type::function(params, self.resolve_type(ret, ctx)?))
            }
        }
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::parse;
    use pretty_assertions::assert_eq;

    fn check(source: &str) -> Result<ast::Program> {
        analyze(&parse(source)?)
    }

    fn accepts(source: &str) {
        if let Err(err) = check(source) {
            panic!("expected {:?} to be accepted, got {}", source, err);
        }
    }

    fn rejects(source: &str, message: &str) {
        match check(source) {
            Ok(_) => panic!("expected {:?} to be rejected with {:?}", source, message),
            Err(err) => {
                assert!(matches!(err, Error::Semantic { .. }), "not a semantic error: {}", err);
                assert!(
                    err.message().contains(message),
                    "expected {:?}, got {:?}",
                    message,
                    err.message()
                );
            }
        }
    }

    #[test]
    fn test_variable_declarations() {
        accepts("let x = 1; const y: string = \"a\"; let z: [number];");
        rejects("let x = 1; let x = 2;", "Identifier x already declared");
        rejects("const c: number;", "Const declarations require an initializer");
        rejects("let n;", "Cannot infer type of n without an initializer");
        rejects("let v: void;", "Variables cannot have type void");
        rejects("let s: string = 1;", "Cannot assign a number to a string");
        rejects("let t: unknown = 1;", "Identifier unknown not declared");
        rejects("let t: sqrt = 1;", "Type expected");
    }

    #[test]
    fn test_initializer_cannot_see_its_variable() {
        rejects("let x = x + 1;", "Identifier x not declared");
    }

    #[test]
    fn test_declared_types_are_recorded() {
        let program = check("let a = [1, 2]; const s = \"q\";").unwrap();
        let a = program
            .entities
            .variables
            .iter()
            .find(|v| v.name == "a")
            .unwrap();
        assert_eq!(a.ty, Type::array(Type::Number));
        assert!(!a.read_only);
        let ast::Stmt::VariableDeclaration { variable, .. } = &program.statements[1] else {
            panic!("expected a declaration");
        };
        assert!(program.entities.variable(*variable).read_only);
    }

    #[test]
    fn test_operator_types() {
        accepts("print 1 + 2 * 3 - 4 / 5 ** 6;");
        accepts("print \"a\" + \"b\";");
        accepts("print \"a\" < \"b\" && 1 <= 2 || !(3 == 4);");
        rejects("print true + 1;", "Expected a number or string");
        rejects("print 1 + \"a\";", "Operands do not have the same type");
        rejects("print \"a\" - \"b\";", "Expected a number");
        rejects("print -true;", "Expected a number");
        rejects("print 1 && true;", "Expected a boolean");
        rejects("print !1;", "Expected a boolean");
        rejects("print 1 == \"1\";", "Operands do not have the same type");
        rejects("print \"a\" > 1;", "Operands do not have the same type");
    }

    #[test]
    fn test_expression_types() {
        let program = check("print 1 < 2; print \"x\" + \"y\"; print -3;").unwrap();
        let types: Vec<Type> = program
            .statements
            .iter()
            .map(|s| match s {
                ast::Stmt::Print(e) => e.ty.clone(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(types, vec![Type::Bool, Type::String, Type::Number]);
    }

    #[test]
    fn test_conditions_must_be_boolean() {
        rejects("if 1 { }", "Expected a boolean");
        rejects("while \"yes\" { }", "Expected a boolean");
        accepts("if true { } else if false { } else { }");
    }

    #[test]
    fn test_scope_discipline() {
        rejects("if true { let x = 1; } print x;", "Identifier x not declared");
        rejects("while false { let y = 1; } print y;", "Identifier y not declared");
        rejects("fn f() { let z = 1; } print z;", "Identifier z not declared");
        rejects("for i in 1 ... 3 { } print i;", "Identifier i not declared");
        rejects("fn f(a: number) { } print a;", "Identifier a not declared");
        // Shadowing in a nested frame is allowed
        accepts("let x = 1; if true { let x = \"two\"; print x; } print x + 1;");
        accepts("let x = 1; fn f() { let x = true; }");
        rejects("fn f(a: number) { let a = 2; }", "Identifier a already declared");
    }

    #[test]
    fn test_struct_declarations() {
        accepts("struct P { x: number, y: number } let p = P(1, 2); print p.x + p.y;");
        accepts("class Node { value: number; label: string }");
        rejects("struct P { x: number, x: string }", "Fields must be distinct");
        rejects("struct P { x: number } print P(1).y;", "No such field");
        rejects("print 1.x;", "No such field");
        rejects("struct P { x: number } struct P { y: number }", "Identifier P already declared");
        rejects("fn f() { struct S { } }", "Struct declarations must be at top level or in a block outside functions");
        rejects("fn f() { if true { class C { } } }", "Struct declarations must be at top level or in a block outside functions");
        accepts("if true { struct S { a: number } }");
    }

    #[test]
    fn test_struct_fields_do_not_leak() {
        rejects("struct P { x: number } print x;", "Identifier x not declared");
    }

    #[test]
    fn test_struct_self_containment() {
        rejects("struct A { a: A }", "Struct type must not be self-containing");
        // B is not yet declared while A's fields are analyzed
        rejects("struct A { b: B } struct B { a: A }", "Identifier B not declared");
        // Containment through an earlier struct
        accepts("struct B { n: number } struct A { b: B, again: B }");
        // Array indirection breaks containment
        accepts("struct A { children: [A] }");
        accepts("struct A { f: (A) -> A }");
    }

    fn struct_chain(analyzer: &mut SemanticAnalyzer, names: &[&str]) -> Vec<StructId> {
        let ids: Vec<StructId> = names
            .iter()
            .map(|name| {
                analyzer.entities.add_struct(StructType {
                    name: name.to_string(),
                    fields: vec![],
                    is_class: false,
                })
            })
            .collect();
        for pair in ids.windows(2) {
            analyzer.entities.struct_type_mut(pair[0]).fields = vec![Field {
                name: "next".to_string(),
                ty: Type::Struct(pair[1]),
            }];
        }
        ids
    }

    #[test]
    fn test_containment_is_transitive() {
        let mut analyzer = SemanticAnalyzer::new();
        let ids = struct_chain(&mut analyzer, &["A", "B"]);
        let (a, b) = (ids[0], ids[1]);
        analyzer.entities.struct_type_mut(b).fields = vec![Field {
            name: "back".to_string(),
            ty: Type::Struct(a),
        }];
        assert!(analyzer.contains_struct(a, a, &mut HashSet::new()));
        assert!(analyzer.contains_struct(b, b, &mut HashSet::new()));

        let mut analyzer = SemanticAnalyzer::new();
        let ids = struct_chain(&mut analyzer, &["A", "B", "C"]);
        assert!(!analyzer.contains_struct(ids[0], ids[0], &mut HashSet::new()));
        assert!(analyzer.contains_struct(ids[0], ids[2], &mut HashSet::new()));
        assert!(!analyzer.contains_struct(ids[2], ids[0], &mut HashSet::new()));
    }

    #[test]
    fn test_constructor_calls() {
        rejects("struct P { x: number } let p = P();", "1 argument(s) required but 0 passed");
        rejects("struct P { x: number } let p = P(\"a\");", "Cannot assign a string to a number");
        let program = check("struct P { x: number } let p = P(3);").unwrap();
        let ast::Stmt::VariableDeclaration { initializer: Some(init), .. } = &program.statements[1] else {
            panic!("expected initialized declaration");
        };
        assert!(matches!(init.ty, Type::Struct(_)));
    }

    #[test]
    fn test_assignments() {
        accepts("let x = 1; x = 2; x++; x--;");
        accepts("struct P { x: number } const p = P(1); p.x = 5; p.x++;");
        accepts("let a = [1, 2]; a[0] = 3; a[1]--;");
        rejects("const c = 1; c = 2;", "Cannot assign to constant c");
        rejects("const c = 1; c++;", "Cannot assign to constant c");
        rejects("print pi; pi = 3;", "Cannot assign to constant π");
        rejects("let s = \"a\"; s++;", "Expected a number");
        rejects("let x = 1; x = \"one\";", "Cannot assign a string to a number");
        rejects("fn f() { } f = f;", "Cannot assign to this expression");
        rejects("for i in 0 ..< 3 { i = 1; }", "Cannot assign to constant i");
    }

    #[test]
    fn test_loops_and_jumps() {
        accepts("while true { break; }");
        accepts("for i in 1 ... 10 { if i > 5 { continue; } }");
        accepts("for s in [\"a\", \"b\"] { print s + \"!\"; }");
        rejects("break;", "Break can only appear in a loop");
        rejects("if true { continue; }", "Continue can only appear in a loop");
        // A function body leaves the enclosing loop
        rejects("while true { fn f() { break; } }", "Break can only appear in a loop");
        rejects("for i in 1 ... \"z\" { }", "Expected a number");
        rejects("for x in 5 { }", "Expected an array");
    }

    #[test]
    fn test_returns() {
        accepts("fn f(): number { return 1; }");
        accepts("fn g() { return; }");
        rejects("return;", "Return can only appear in a function");
        rejects("fn f(): number { return; }", "Something should be returned");
        rejects("fn f(): number { return \"x\"; }", "Cannot assign a string to a number");
        // A loop inside a function still sees the function
        accepts("fn f(): number { while true { return 1; } return 0; }");
    }

    #[test]
    fn test_void_function_returning_value() {
        let err = check("fn f(): void {\n  return 1;\n}").unwrap_err();
        assert_eq!(err.message(), "Cannot return a value from this function");
        let span = err.span();
        assert_eq!((span.line, span.column), (2, 3));
    }

    #[test]
    fn test_call_to_undeclared_function() {
        let err = check("let x = 1;\nprint   g(x);").unwrap_err();
        assert!(matches!(err, Error::Semantic { .. }));
        assert!(err.message().contains("not declared"));
        let span = err.span();
        assert_eq!((span.line, span.column), (2, 9));
    }

    #[test]
    fn test_calls() {
        accepts("print sqrt(2) + hypot(3, 4) + length([1, 2]) + length(\"abc\");");
        accepts("print toString([true]) + \"!\";");
        rejects("print sqrt(1, 2);", "1 argument(s) required but 2 passed");
        rejects("print sqrt(\"4\");", "Cannot assign a string to a number");
        rejects("let x = 1; x(2);", "Call of non-function");
        rejects("let v = f(); fn f() { }", "Identifier f not declared");
    }

    #[test]
    fn test_function_values() {
        accepts("let g: (number) -> number = sqrt; print g(2);");
        rejects("let g: (number, number) -> number = sqrt;", "Cannot assign a (number)->number to a (number,number)->number");
        // No variance: a function over any is not a function over number
        rejects("let g: (number) -> number = length;", "Cannot assign a (any)->number to a (number)->number");
    }

    #[test]
    fn test_recursion_through_two_phase_declaration() {
        accepts("fn fact(n: number): number { if n <= 1 { return 1; } return n * fact(n - 1); }");
        rejects("fn f(n: number): number { return f(); }", "1 argument(s) required but 0 passed");
    }

    #[test]
    fn test_arrays() {
        accepts("let a = [[1], [2, 3]]; print a[1][0];");
        accepts("let e = [string](); for s in e { print s; }");
        rejects("let a = [1, \"2\"];", "Not all elements have the same type");
        rejects("let a = [];", "Type expected");
        rejects("let n = 3; print n[0];", "Expected an array");
        rejects("let a = [1]; print a[\"0\"];", "Expected a number");
    }

    #[test]
    fn test_try_catch() {
        accepts("try { print 1; } catch e { print e; }");
        accepts("try { } catch { }");
        rejects("try { } catch e { } print e;", "Identifier e not declared");
    }

    #[test]
    fn test_type_name_is_not_a_value() {
        rejects("print number;", "Type number cannot be used as a value");
    }

    #[test]
    fn test_nested_if_shape() {
        let program = check("if true { } else if false { print 1; }").unwrap();
        let ast::Stmt::NestedIf { else_if, .. } = &program.statements[0] else {
            panic!("expected nested if");
        };
        assert!(matches!(**else_if, ast::Stmt::ShortIf { .. }));
    }
}
