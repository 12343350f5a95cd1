//! AST Optimizer for Quill
//!
//! A single bottom-up rewrite: children are optimized first, then one local
//! rule is tried on the rebuilt node. Statements rewrite to a list (empty
//! means removed), expressions to an expression. Rules that discard a
//! condition or collection assume it has no side effects, which holds for
//! the literals they match.

use log::{debug, trace};

use crate::middle::ast::*;
use crate::types::Type;

/// A node the optimizer can rewrite
pub trait Optimize {
    type Output;

    fn optimize_with(self, optimizer: &mut Optimizer) -> Self::Output;
}

/// Optimize any node: a program, a statement list, a statement or an expression
pub fn optimize<N: Optimize>(node: N) -> N::Output {
    let mut optimizer = Optimizer::new();
    let output = node.optimize_with(&mut optimizer);
    debug!("optimizer applied {} rewrites", optimizer.rewrites());
    output
}

/// The optimizer - counts the rewrites it applies
#[derive(Debug, Default)]
pub struct Optimizer {
    rewrites: usize,
}

impl Optimizer {
    pub fn new() -> Self {
        Self { rewrites: 0 }
    }

    /// Number of rules applied so far
    pub fn rewrites(&self) -> usize {
        self.rewrites
    }

    fn applied(&mut self, rule: &str) {
        self.rewrites += 1;
        trace!("rewrite: {}", rule);
    }

    // ==================== Statements ====================

    pub fn stmts(&mut self, stmts: Vec<Stmt>) -> Vec<Stmt> {
        stmts.into_iter().flat_map(|s| self.stmt(s)).collect()
    }

    pub fn stmt(&mut self, stmt: Stmt) -> Vec<Stmt> {
        match stmt {
            Stmt::FunctionDeclaration { function, params, body } => vec![Stmt::FunctionDeclaration {
                function,
                params,
                body: self.stmts(body),
            }],

            Stmt::VariableDeclaration { variable, initializer } => vec![Stmt::VariableDeclaration {
                variable,
                initializer: initializer.map(|e| self.expr(e)),
            }],

            Stmt::StructDeclaration(_) | Stmt::ClassDeclaration(_) | Stmt::Break | Stmt::Continue => vec![stmt],

            Stmt::If { test, consequent, alternate } => {
                let test = self.expr(test);
                let consequent = self.stmts(consequent);
                let alternate = self.stmts(alternate);
                match test.as_bool() {
                    Some(true) => {
                        self.applied("if true");
                        consequent
                    }
                    Some(false) => {
                        self.applied("if false");
                        alternate
                    }
                    None => vec![Stmt::If { test, consequent, alternate }],
                }
            }

            Stmt::ShortIf { test, consequent } => {
                let test = self.expr(test);
                let consequent = self.stmts(consequent);
                match test.as_bool() {
                    Some(true) => {
                        self.applied("if true without else");
                        consequent
                    }
                    Some(false) => {
                        self.applied("if false without else");
                        Vec::new()
                    }
                    None => vec![Stmt::ShortIf { test, consequent }],
                }
            }

            Stmt::NestedIf { test, consequent, else_if } => {
                let test = self.expr(test);
                let consequent = self.stmts(consequent);
                let mut else_if = self.stmt(*else_if);
                match test.as_bool() {
                    Some(true) => {
                        self.applied("if true with else if");
                        consequent
                    }
                    Some(false) => {
                        self.applied("if false with else if");
                        else_if
                    }
                    None if else_if.is_empty() => {
                        self.applied("else if removed");
                        vec![Stmt::ShortIf { test, consequent }]
                    }
                    None if else_if.len() == 1 && else_if[0].is_conditional() => {
                        let else_if = Box::new(else_if.remove(0));
                        vec![Stmt::NestedIf { test, consequent, else_if }]
                    }
                    None => {
                        self.applied("else if became else");
                        vec![Stmt::If {
                            test,
                            consequent,
                            alternate: else_if,
                        }]
                    }
                }
            }

            Stmt::ForRange { iterator, low, op, high, body } => {
                let low = self.expr(low);
                let high = self.expr(high);
                let body = self.stmts(body);
                if let (Some(l), Some(h)) = (low.as_number(), high.as_number()) {
                    if l > h {
                        self.applied("empty range loop");
                        return Vec::new();
                    }
                }
                vec![Stmt::ForRange { iterator, low, op, high, body }]
            }

            Stmt::ForCollection { iterator, collection, body } => {
                let collection = self.expr(collection);
                let body = self.stmts(body);
                if collection.is_empty_array() {
                    self.applied("loop over empty array");
                    return Vec::new();
                }
                vec![Stmt::ForCollection { iterator, collection, body }]
            }

            Stmt::While { test, body } => {
                let test = self.expr(test);
                let body = self.stmts(body);
                if test.as_bool() == Some(false) {
                    self.applied("while false");
                    return Vec::new();
                }
                vec![Stmt::While { test, body }]
            }

            Stmt::Return(value) => vec![Stmt::Return(value.map(|e| self.expr(e)))],

            Stmt::TryCatch { body, error, handler } => vec![Stmt::TryCatch {
                body: self.stmts(body),
                error,
                handler: self.stmts(handler),
            }],

            Stmt::Print(e) => vec![Stmt::Print(self.expr(e))],
            Stmt::Increment(e) => vec![Stmt::Increment(self.expr(e))],
            Stmt::Decrement(e) => vec![Stmt::Decrement(self.expr(e))],

            Stmt::Assignment { target, source } => {
                let target = self.expr(target);
                let source = self.expr(source);
                if let (ExprKind::Variable(t), ExprKind::Variable(s)) = (&target.kind, &source.kind) {
                    if t == s {
                        self.applied("self assignment");
                        return Vec::new();
                    }
                }
                vec![Stmt::Assignment { target, source }]
            }

            Stmt::Call(e) => vec![Stmt::Call(self.expr(e))],
        }
    }

    // ==================== Expressions ====================

    pub fn expr(&mut self, expr: Expr) -> Expr {
        let Expr { kind, ty } = expr;
        match kind {
            ExprKind::Binary { op, left, right } => {
                let left = self.expr(*left);
                let right = self.expr(*right);
                self.binary(op, left, right, ty)
            }

            ExprKind::Unary { op, operand } => {
                let operand = self.expr(*operand);
                let folded = match (op, &operand.kind) {
                    (UnOp::Neg, ExprKind::Number(n)) => Some(Expr::number(-*n)),
                    (UnOp::Not, ExprKind::Bool(b)) => Some(Expr::boolean(!*b)),
                    _ => None,
                };
                match folded {
                    Some(literal) => {
                        self.applied("fold unary");
                        literal
                    }
                    None => Expr::unary(op, operand, ty),
                }
            }

            ExprKind::Array(elements) => {
                let elements = elements.into_iter().map(|e| self.expr(e)).collect();
                Expr::new(ExprKind::Array(elements), ty)
            }

            ExprKind::Call { callee, args } => {
                let callee = Box::new(self.expr(*callee));
                let args = args.into_iter().map(|e| self.expr(e)).collect();
                Expr::new(ExprKind::Call { callee, args }, ty)
            }

            ExprKind::Member { object, field } => Expr::new(
                ExprKind::Member {
                    object: Box::new(self.expr(*object)),
                    field,
                },
                ty,
            ),

            ExprKind::Subscript { array, index } => Expr::new(
                ExprKind::Subscript {
                    array: Box::new(self.expr(*array)),
                    index: Box::new(self.expr(*index)),
                },
                ty,
            ),

            leaf @ (ExprKind::Number(_)
            | ExprKind::String(_)
            | ExprKind::Bool(_)
            | ExprKind::Variable(_)
            | ExprKind::Function(_)
            | ExprKind::Struct(_)) => Expr::new(leaf, ty),
        }
    }

    /// Simplify a binary node whose operands are already optimized
    fn binary(&mut self, op: BinOp, left: Expr, right: Expr, ty: Type) -> Expr {
        if let (Some(l), Some(r)) = (left.as_number(), right.as_number()) {
            if let Some(folded) = Self::fold_binop(op, l, r) {
                self.applied("constant folding");
                return folded;
            }
        }

        match op {
            BinOp::Or => {
                if left.as_bool() == Some(false) {
                    self.applied("false ||");
                    return right;
                }
                if right.as_bool() == Some(false) {
                    self.applied("|| false");
                    return left;
                }
            }
            BinOp::And => {
                if left.as_bool() == Some(true) {
                    self.applied("true &&");
                    return right;
                }
                if right.as_bool() == Some(true) {
                    self.applied("&& true");
                    return left;
                }
            }
            _ => {
                if let Some(simplified) = self.identity(op, &left, &right) {
                    return simplified;
                }
            }
        }

        Expr::binary(op, left, right, ty)
    }

    /// Evaluate an operator over two number literals
    fn fold_binop(op: BinOp, l: f64, r: f64) -> Option<Expr> {
        let value = match op {
            BinOp::Add => l + r,
            BinOp::Sub => l - r,
            BinOp::Mul => l * r,
            BinOp::Div => l / r,
            BinOp::Pow => l.powf(r),
            BinOp::Lt => return Some(Expr::boolean(l < r)),
            BinOp::Le => return Some(Expr::boolean(l <= r)),
            BinOp::Eq => return Some(Expr::boolean(l == r)),
            BinOp::Ne => return Some(Expr::boolean(l != r)),
            BinOp::Ge => return Some(Expr::boolean(l >= r)),
            BinOp::Gt => return Some(Expr::boolean(l > r)),
            BinOp::Or | BinOp::And => return None,
        };
        Some(Expr::number(value))
    }

    /// Algebraic identities with one literal side
    fn identity(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Option<Expr> {
        let (rule, result) = match op {
            BinOp::Add if right.is_number(0.0) => ("x + 0", left.clone()),
            BinOp::Add if left.is_number(0.0) => ("0 + x", right.clone()),
            BinOp::Sub if right.is_number(0.0) => ("x - 0", left.clone()),
            BinOp::Sub if left.is_number(0.0) => ("0 - x", Expr::unary(UnOp::Neg, right.clone(), Type::Number)),
            BinOp::Mul if right.is_number(1.0) => ("x * 1", left.clone()),
            BinOp::Mul if left.is_number(1.0) => ("1 * x", right.clone()),
            BinOp::Mul if right.is_number(0.0) || left.is_number(0.0) => ("x * 0", Expr::number(0.0)),
            BinOp::Div if left.is_number(0.0) => ("0 / x", Expr::number(0.0)),
            BinOp::Div if right.is_number(1.0) => ("x / 1", left.clone()),
            BinOp::Pow if right.is_number(0.0) => ("x ** 0", Expr::number(1.0)),
            BinOp::Pow if left.is_number(1.0) => ("1 ** x", Expr::number(1.0)),
            _ => return None,
        };
        self.applied(rule);
        Some(result)
    }
}

impl Optimize for Program {
    type Output = Program;

    fn optimize_with(self, optimizer: &mut Optimizer) -> Program {
        Program {
            statements: optimizer.stmts(self.statements),
            entities: self.entities,
        }
    }
}

impl Optimize for Vec<Stmt> {
    type Output = Vec<Stmt>;

    fn optimize_with(self, optimizer: &mut Optimizer) -> Vec<Stmt> {
        optimizer.stmts(self)
    }
}

impl Optimize for Stmt {
    type Output = Vec<Stmt>;

    fn optimize_with(self, optimizer: &mut Optimizer) -> Vec<Stmt> {
        optimizer.stmt(self)
    }
}

impl Optimize for Expr {
    type Output = Expr;

    fn optimize_with(self, optimizer: &mut Optimizer) -> Expr {
        optimizer.expr(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{parser::parse, semantic::analyze};
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Expr {
        Expr::number(n)
    }

    fn x() -> Expr {
        Expr::variable(VariableId(0), Type::Number)
    }

    fn flag() -> Expr {
        Expr::variable(VariableId(1), Type::Bool)
    }

    fn bin(op: BinOp, l: Expr, r: Expr) -> Expr {
        let ty = if op.is_ordering() || op.is_logical() || matches!(op, BinOp::Eq | BinOp::Ne) {
            Type::Bool
        } else {
            Type::Number
        };
        Expr::binary(op, l, r, ty)
    }

    fn print(e: Expr) -> Stmt {
        Stmt::Print(e)
    }

    fn program(source: &str) -> Program {
        analyze(&parse(source).unwrap()).unwrap()
    }

    #[test]
    fn test_folding_matches_direct_evaluation() {
        let values = [-3.5, -1.0, 0.0, 0.5, 1.0, 2.0, 7.0];
        let ops = [
            BinOp::Add,
            BinOp::Sub,
            BinOp::Mul,
            BinOp::Div,
            BinOp::Pow,
            BinOp::Lt,
            BinOp::Le,
            BinOp::Eq,
            BinOp::Ne,
            BinOp::Ge,
            BinOp::Gt,
        ];
        for &a in &values {
            for &b in &values {
                for op in ops {
                    let folded = optimize(bin(op, num(a), num(b)));
                    let expected = match op {
                        BinOp::Add => num(a + b),
                        BinOp::Sub => num(a - b),
                        BinOp::Mul => num(a * b),
                        BinOp::Div => num(a / b),
                        BinOp::Pow => num(a.powf(b)),
                        BinOp::Lt => Expr::boolean(a < b),
                        BinOp::Le => Expr::boolean(a <= b),
                        BinOp::Eq => Expr::boolean(a == b),
                        BinOp::Ne => Expr::boolean(a != b),
                        BinOp::Ge => Expr::boolean(a >= b),
                        BinOp::Gt => Expr::boolean(a > b),
                        _ => unreachable!(),
                    };
                    match (folded.as_number(), expected.as_number()) {
                        (Some(f), Some(e)) if f.is_nan() && e.is_nan() => {}
                        _ => assert_eq!(folded, expected, "{} {} {}", a, op, b),
                    }
                }
            }
        }
    }

    #[test]
    fn test_identities_keep_operand() {
        for e in [
            bin(BinOp::Add, x(), num(0.0)),
            bin(BinOp::Add, num(0.0), x()),
            bin(BinOp::Sub, x(), num(0.0)),
            bin(BinOp::Mul, x(), num(1.0)),
            bin(BinOp::Mul, num(1.0), x()),
            bin(BinOp::Div, x(), num(1.0)),
        ] {
            let optimized = optimize(e);
            assert_eq!(optimized, x());
            assert_eq!(optimized.ty, Type::Number);
        }
    }

    #[test]
    fn test_identities_to_constants() {
        assert_eq!(optimize(bin(BinOp::Mul, x(), num(0.0))), num(0.0));
        assert_eq!(optimize(bin(BinOp::Mul, num(0.0), x())), num(0.0));
        assert_eq!(optimize(bin(BinOp::Div, num(0.0), x())), num(0.0));
        assert_eq!(optimize(bin(BinOp::Pow, x(), num(0.0))), num(1.0));
        assert_eq!(optimize(bin(BinOp::Pow, num(1.0), x())), num(1.0));
        assert_eq!(
            optimize(bin(BinOp::Sub, num(0.0), x())),
            Expr::unary(UnOp::Neg, x(), Type::Number)
        );
    }

    #[test]
    fn test_no_identity_without_literal() {
        let e = bin(BinOp::Mul, x(), x());
        assert_eq!(optimize(e.clone()), e);
        let e = bin(BinOp::Div, x(), num(0.0));
        assert_eq!(optimize(e.clone()), e);
    }

    #[test]
    fn test_nested_folding_is_bottom_up() {
        // (x * 0) + (2 ** 3)  =>  0 + 8  =>  8
        let e = bin(
            BinOp::Add,
            bin(BinOp::Mul, x(), num(0.0)),
            bin(BinOp::Pow, num(2.0), num(3.0)),
        );
        assert_eq!(optimize(e), num(8.0));
    }

    #[test]
    fn test_short_circuit_chains() {
        let f = Expr::boolean(false);
        let t = Expr::boolean(true);
        assert_eq!(optimize(bin(BinOp::Or, f.clone(), flag())), flag());
        assert_eq!(optimize(bin(BinOp::Or, flag(), f.clone())), flag());
        assert_eq!(optimize(bin(BinOp::And, t.clone(), flag())), flag());
        assert_eq!(optimize(bin(BinOp::And, flag(), t.clone())), flag());
        // false || (flag || false) || false
        let chain = bin(
            BinOp::Or,
            bin(BinOp::Or, f.clone(), bin(BinOp::Or, flag(), f.clone())),
            f.clone(),
        );
        assert_eq!(optimize(chain), flag());
        // true || flag is left alone
        let e = bin(BinOp::Or, t.clone(), flag());
        assert_eq!(optimize(e.clone()), e);
    }

    #[test]
    fn test_unary_folding() {
        assert_eq!(optimize(Expr::unary(UnOp::Neg, num(4.0), Type::Number)), num(-4.0));
        assert_eq!(optimize(Expr::unary(UnOp::Not, Expr::boolean(true), Type::Bool)), Expr::boolean(false));
        let e = Expr::unary(UnOp::Neg, x(), Type::Number);
        assert_eq!(optimize(e.clone()), e);
    }

    #[test]
    fn test_if_with_literal_test() {
        let s1 = vec![print(num(1.0))];
        let s2 = vec![print(num(2.0)), print(num(3.0))];
        let taken = optimize(Stmt::If {
            test: Expr::boolean(true),
            consequent: s1.clone(),
            alternate: s2.clone(),
        });
        assert_eq!(taken, s1);
        let other = optimize(Stmt::If {
            test: bin(BinOp::Lt, num(2.0), num(1.0)),
            consequent: s1,
            alternate: s2.clone(),
        });
        assert_eq!(other, s2);
    }

    #[test]
    fn test_short_if() {
        let body = vec![print(x())];
        assert_eq!(
            optimize(Stmt::ShortIf { test: Expr::boolean(false), consequent: body.clone() }),
            vec![]
        );
        assert_eq!(
            optimize(Stmt::ShortIf { test: Expr::boolean(true), consequent: body.clone() }),
            body
        );
    }

    #[test]
    fn test_nested_if_rebuilt_when_else_if_changes() {
        let body = vec![print(x())];
        // else if false { .. } disappears
        let short = optimize(Stmt::NestedIf {
            test: flag(),
            consequent: body.clone(),
            else_if: Box::new(Stmt::ShortIf { test: Expr::boolean(false), consequent: body.clone() }),
        });
        assert_eq!(short, vec![Stmt::ShortIf { test: flag(), consequent: body.clone() }]);

        // else if true { .. } becomes a plain else
        let plain = optimize(Stmt::NestedIf {
            test: flag(),
            consequent: vec![],
            else_if: Box::new(Stmt::ShortIf { test: Expr::boolean(true), consequent: body.clone() }),
        });
        assert_eq!(plain, vec![Stmt::If { test: flag(), consequent: vec![], alternate: body.clone() }]);

        // literal outer test picks a side
        let inner = Stmt::ShortIf { test: flag(), consequent: body.clone() };
        let picked = optimize(Stmt::NestedIf {
            test: Expr::boolean(false),
            consequent: vec![],
            else_if: Box::new(inner.clone()),
        });
        assert_eq!(picked, vec![inner]);
    }

    #[test]
    fn test_dead_loops() {
        assert_eq!(optimize(Stmt::While { test: Expr::boolean(false), body: vec![print(x())] }), vec![]);
        let empty = Expr::new(ExprKind::Array(vec![]), Type::array(Type::Number));
        assert_eq!(
            optimize(Stmt::ForCollection { iterator: VariableId(2), collection: empty, body: vec![Stmt::Break] }),
            vec![]
        );
        let live = Stmt::ForRange {
            iterator: VariableId(2),
            low: num(1.0),
            op: RangeOp::Exclusive,
            high: num(1.0),
            body: vec![],
        };
        assert_eq!(optimize(live.clone()), vec![live]);
    }

    #[test]
    fn test_self_assignment_removed() {
        assert_eq!(optimize(Stmt::Assignment { target: x(), source: x() }), vec![]);
        let other = Stmt::Assignment {
            target: x(),
            source: Expr::variable(VariableId(5), Type::Number),
        };
        assert_eq!(optimize(other.clone()), vec![other]);
    }

    #[test]
    fn test_scenario_constant_initializer() {
        let optimized = optimize(program("let x: number = 3 * 7;"));
        let Stmt::VariableDeclaration { initializer, .. } = &optimized.statements[0] else {
            panic!("expected a declaration");
        };
        assert_eq!(initializer.as_ref(), Some(&num(21.0)));
    }

    #[test]
    fn test_scenario_if_true_keeps_consequent() {
        let optimized = optimize(program("if true { print 1; print 2; } else { print 3; }"));
        assert_eq!(optimized.statements, vec![print(num(1.0)), print(num(2.0))]);
    }

    #[test]
    fn test_scenario_while_false() {
        let optimized = optimize(program("while false { print 1; }"));
        assert_eq!(optimized.statements, vec![]);
    }

    #[test]
    fn test_scenario_descending_inclusive_range() {
        let optimized = optimize(program("for i in 5 ... 3 { print i; }"));
        assert_eq!(optimized.statements, vec![]);
    }

    #[test]
    fn test_bodies_are_optimized() {
        let optimized = optimize(program(
            "fn f(a: number): number { while false { } return a * 1; }\ntry { print 0 + 1; } catch e { if false { print e; } }",
        ));
        let Stmt::FunctionDeclaration { params, body, .. } = &optimized.statements[0] else {
            panic!("expected a function");
        };
        assert_eq!(body, &vec![Stmt::Return(Some(Expr::variable(params[0], Type::Number)))]);
        let Stmt::TryCatch { body, handler, .. } = &optimized.statements[1] else {
            panic!("expected try/catch");
        };
        assert_eq!(body, &vec![print(num(1.0))]);
        assert_eq!(handler, &vec![]);
    }

    #[test]
    fn test_idempotence() {
        for source in [
            "let x = 1; let b = x > 0; print (x + 0) * (2 - 1) + -(3); if b || false { x = x; } else if true { print x ** 0; }",
            "fn f(n: number): number { if n < 1 { return 0 - n; } else if false { return 1; } return f(n - 1) / 1; }",
            "let a = [number](); for v in a { print v; } for i in 10 ..< 2 { } while !false && true { break; }",
            "struct P { x: number } let p = P(2 * 3); p.x = p.x * 0; print p.x + 0;",
        ] {
            let once = optimize(program(source));
            let twice = optimize(once.clone());
            assert_eq!(once, twice, "not a fixed point for {:?}", source);
        }
    }

    #[test]
    fn test_rewrite_count() {
        let mut optimizer = Optimizer::new();
        let e = bin(BinOp::Add, bin(BinOp::Mul, x(), num(1.0)), num(0.0));
        assert_eq!(e.optimize_with(&mut optimizer), x());
        assert_eq!(optimizer.rewrites(), 2);
    }
}
