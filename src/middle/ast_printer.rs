//! AST Printer - Pretty print decorated Quill programs
//!
//! Outputs source-like text for debugging. Every entity is printed with its
//! arena index as a suffix (`x_4`), so distinct entities never share a name.

use crate::middle::ast::*;
use crate::types::Type;

/// Pretty printer for the decorated AST
pub struct AstPrinter<'a> {
    entities: &'a Entities,
    output: String,
    indent: usize,
}

impl<'a> AstPrinter<'a> {
    pub fn new(entities: &'a Entities) -> Self {
        Self {
            entities,
            output: String::new(),
            indent: 0,
        }
    }

    /// Print a whole program to string
    pub fn print_program(mut self, program: &Program) -> String {
        self.print_stmts(&program.statements);
        self.output
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.output.push_str("  ");
        }
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn print_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.print_stmt(stmt);
        }
    }

    /// Print `header {`, the indented body, then `}`
    fn print_block(&mut self, header: &str, body: &[Stmt]) {
        self.line(&format!("{} {{", header));
        self.indent += 1;
        self.print_stmts(body);
        self.indent -= 1;
        self.line("}");
    }

    fn print_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDeclaration { function, params, body } => {
                let f = self.entities.function(*function);
                let params: Vec<String> = params
                    .iter()
                    .map(|p| format!("{}: {}", self.variable(*p), self.type_str(&self.entities.variable(*p).ty)))
                    .collect();
                let header = format!(
                    "fn {}({}): {}",
                    self.function(*function),
                    params.join(", "),
                    self.type_str(&f.ty.ret)
                );
                self.print_block(&header, body);
            }
            Stmt::VariableDeclaration { variable, initializer } => {
                let v = self.entities.variable(*variable);
                let keyword = if v.read_only { "const" } else { "let" };
                let mut text = format!("{} {}: {}", keyword, self.variable(*variable), self.type_str(&v.ty));
                if let Some(init) = initializer {
                    text.push_str(" = ");
                    text.push_str(&self.expr_str(init));
                }
                text.push(';');
                self.line(&text);
            }
            Stmt::StructDeclaration(id) | Stmt::ClassDeclaration(id) => {
                let s = self.entities.struct_type(*id);
                let keyword = if s.is_class { "class" } else { "struct" };
                let fields: Vec<String> = s
                    .fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name, self.type_str(&f.ty)))
                    .collect();
                self.line(&format!("{} {}_{} {{ {} }}", keyword, s.name, id.0, fields.join(", ")));
            }
            Stmt::If { test, consequent, alternate } => {
                self.print_block(&format!("if {}", self.expr_str(test)), consequent);
                self.print_block("else", alternate);
            }
            Stmt::ShortIf { test, consequent } => {
                self.print_block(&format!("if {}", self.expr_str(test)), consequent);
            }
            Stmt::NestedIf { test, consequent, else_if } => {
                self.print_block(&format!("if {}", self.expr_str(test)), consequent);
                self.line("else");
                self.print_stmt(else_if);
            }
            Stmt::ForRange { iterator, low, op, high, body } => {
                let header = format!(
                    "for {} in {} {} {}",
                    self.variable(*iterator),
                    self.expr_str(low),
                    op,
                    self.expr_str(high)
                );
                self.print_block(&header, body);
            }
            Stmt::ForCollection { iterator, collection, body } => {
                let header = format!("for {} in {}", self.variable(*iterator), self.expr_str(collection));
                self.print_block(&header, body);
            }
            Stmt::While { test, body } => {
                self.print_block(&format!("while {}", self.expr_str(test)), body);
            }
            Stmt::Return(None) => self.line("return;"),
            Stmt::Return(Some(e)) => self.line(&format!("return {};", self.expr_str(e))),
            Stmt::Break => self.line("break;"),
            Stmt::Continue => self.line("continue;"),
            Stmt::TryCatch { body, error, handler } => {
                self.print_block("try", body);
                let header = match error {
                    Some(e) => format!("catch {}", self.variable(*e)),
                    None => "catch".to_string(),
                };
                self.print_block(&header, handler);
            }
            Stmt::Print(e) => self.line(&format!("print {};", self.expr_str(e))),
            Stmt::Increment(e) => self.line(&format!("{}++;", self.expr_str(e))),
            Stmt::Decrement(e) => self.line(&format!("{}--;", self.expr_str(e))),
            Stmt::Assignment { target, source } => {
                self.line(&format!("{} = {};", self.expr_str(target), self.expr_str(source)))
            }
            Stmt::Call(e) => self.line(&format!("{};", self.expr_str(e))),
        }
    }

    fn variable(&self, id: VariableId) -> String {
        format!("{}_{}", self.entities.variable(id).name, id.0)
    }

    fn function(&self, id: FunctionId) -> String {
        let f = self.entities.function(id);
        if f.builtin {
            f.name.clone()
        } else {
            format!("{}_{}", f.name, id.0)
        }
    }

    fn expr_str(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Number(n) => n.to_string(),
            ExprKind::String(s) => format!("{:?}", s),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Variable(id) => self.variable(*id),
            ExprKind::Function(id) => self.function(*id),
            ExprKind::Struct(id) => format!("{}_{}", self.entities.struct_type(*id).name, id.0),
            ExprKind::Binary { op, left, right } => {
                format!("({} {} {})", self.expr_str(left), op, self.expr_str(right))
            }
            ExprKind::Unary { op, operand } => match operand.kind {
                // `--x` would read as a decrement
                ExprKind::Unary { .. } => format!("{}({})", op, self.expr_str(operand)),
                _ => format!("{}{}", op, self.expr_str(operand)),
            },
            ExprKind::Array(elements) if elements.is_empty() => {
                format!("{}()", self.type_str(&expr.ty))
            }
            ExprKind::Array(elements) => {
                let elements: Vec<String> = elements.iter().map(|e| self.expr_str(e)).collect();
                format!("[{}]", elements.join(", "))
            }
            ExprKind::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(|e| self.expr_str(e)).collect();
                format!("{}({})", self.expr_str(callee), args.join(", "))
            }
            ExprKind::Member { object, field } => format!("{}.{}", self.expr_str(object), field),
            ExprKind::Subscript { array, index } => {
                format!("{}[{}]", self.expr_str(array), self.expr_str(index))
            }
        }
    }

    fn type_str(&self, ty: &Type) -> String {
        self.entities.describe(ty)
    }
}

/// Print a program as text
pub fn print_ast(program: &Program) -> String {
    AstPrinter::new(&program.entities).print_program(program)
}
