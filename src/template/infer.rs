//! Usage inference over a parsed template AST
//!
//! Walks the statement tree recording how each free variable is used, then
//! converts the accumulated usages to Var schemas. Loop targets, `set`
//! bindings and builtin names are bound, not free.

use crate::schema::{AdditionalProps, Var};
use indexmap::IndexMap;
use minijinja::machinery::ast;
use minijinja::value::ValueKind;

/// Names the template engine provides; never reported as free variables.
const BUILTINS: &[&str] = &["loop", "range", "namespace", "dict"];

/// How a (sub)expression's value is consumed at one usage site.
#[derive(Debug, Clone, Default, PartialEq)]
enum Usage {
    #[default]
    Unknown,
    String,
    Number,
    Boolean,
    Object(IndexMap<String, Usage>),
    Array(Box<Usage>),
}

impl Usage {
    fn property(name: &str, usage: Usage) -> Usage {
        let mut props = IndexMap::new();
        props.insert(name.to_string(), usage);
        Usage::Object(props)
    }

    /// Combine two observed usages of the same variable. A structured usage
    /// wins over a scalar one; conflicting scalars resolve to string.
    fn merge(self, other: Usage) -> Usage {
        match (self, other) {
            (Usage::Unknown, usage) | (usage, Usage::Unknown) => usage,
            (Usage::Object(mut left), Usage::Object(right)) => {
                for (name, usage) in right {
                    if let Some(slot) = left.get_mut(&name) {
                        let prev = std::mem::take(slot);
                        *slot = prev.merge(usage);
                    } else {
                        left.insert(name, usage);
                    }
                }
                Usage::Object(left)
            }
            (Usage::Array(left), Usage::Array(right)) => {
                Usage::Array(Box::new(left.merge(*right)))
            }
            (Usage::Object(props), _) | (_, Usage::Object(props)) => Usage::Object(props),
            (Usage::Array(element), _) | (_, Usage::Array(element)) => Usage::Array(element),
            (left, right) if left == right => left,
            _ => Usage::String,
        }
    }

    fn into_var(self) -> Var {
        let mut var = match self {
            Usage::Unknown | Usage::String => Var::string(),
            Usage::Number => Var::number(),
            Usage::Boolean => Var::boolean(),
            Usage::Object(props) => Var {
                additional_properties: AdditionalProps::Named(
                    props
                        .into_iter()
                        .map(|(name, usage)| usage.into_var().with_name(name))
                        .collect(),
                ),
                ..Var::object()
            },
            Usage::Array(element) => Var::array(vec![element.into_var()]),
        };
        var.required = true;
        var
    }
}

#[derive(Default)]
struct Inference {
    /// Free variables, in first-seen order.
    roots: IndexMap<String, Usage>,
    /// Template-level `set` bindings.
    locals: IndexMap<String, Usage>,
    /// Innermost-last stack of loop/with scopes.
    scopes: Vec<IndexMap<String, Usage>>,
}

impl Inference {
    fn record(&mut self, name: &str, usage: Usage) {
        if BUILTINS.contains(&name) {
            return;
        }
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                let prev = std::mem::take(slot);
                *slot = prev.merge(usage);
                return;
            }
        }
        if let Some(slot) = self.locals.get_mut(name) {
            let prev = std::mem::take(slot);
            *slot = prev.merge(usage);
            return;
        }
        let slot = self.roots.entry(name.to_string()).or_default();
        let prev = std::mem::take(slot);
        *slot = prev.merge(usage);
    }

    fn visit_body(&mut self, body: &[ast::Stmt<'_>]) {
        for stmt in body {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &ast::Stmt<'_>) {
        match stmt {
            ast::Stmt::Template(template) => self.visit_body(&template.children),
            ast::Stmt::EmitExpr(emit) => self.visit_expr(&emit.expr, Usage::String),
            ast::Stmt::EmitRaw(_) => {}
            ast::Stmt::ForLoop(for_loop) => {
                let mut scope = IndexMap::new();
                collect_target_names(&for_loop.target, &mut scope);
                self.scopes.push(scope);
                if let Some(filter) = &for_loop.filter_expr {
                    self.visit_expr(filter, Usage::Boolean);
                }
                self.visit_body(&for_loop.body);
                self.visit_body(&for_loop.else_body);
                let scope = self.scopes.pop().unwrap_or_default();
                // the element schema is whatever the loop targets were used as
                let element = scope
                    .into_values()
                    .fold(Usage::Unknown, |acc, usage| acc.merge(usage));
                self.visit_expr(&for_loop.iter, Usage::Array(Box::new(element)));
            }
            ast::Stmt::IfCond(if_cond) => {
                self.visit_expr(&if_cond.expr, Usage::Boolean);
                self.visit_body(&if_cond.true_body);
                self.visit_body(&if_cond.false_body);
            }
            ast::Stmt::WithBlock(with_block) => {
                let mut scope = IndexMap::new();
                for (target, value) in &with_block.assignments {
                    self.visit_expr(value, Usage::Unknown);
                    collect_target_names(target, &mut scope);
                }
                self.scopes.push(scope);
                self.visit_body(&with_block.body);
                self.scopes.pop();
            }
            ast::Stmt::Set(set) => {
                self.visit_expr(&set.expr, Usage::Unknown);
                collect_target_names(&set.target, &mut self.locals);
            }
            ast::Stmt::SetBlock(set_block) => {
                if let Some(filter) = &set_block.filter {
                    self.visit_expr(filter, Usage::Unknown);
                }
                self.visit_body(&set_block.body);
                collect_target_names(&set_block.target, &mut self.locals);
            }
            ast::Stmt::AutoEscape(auto_escape) => {
                self.visit_expr(&auto_escape.enabled, Usage::Boolean);
                self.visit_body(&auto_escape.body);
            }
            ast::Stmt::FilterBlock(filter_block) => {
                self.visit_expr(&filter_block.filter, Usage::Unknown);
                self.visit_body(&filter_block.body);
            }
            _ => {}
        }
    }

    fn visit_expr(&mut self, expr: &ast::Expr<'_>, usage: Usage) {
        match expr {
            ast::Expr::Var(var) => self.record(var.id, usage),
            ast::Expr::Const(_) => {}
            ast::Expr::GetAttr(get_attr) => {
                self.visit_expr(&get_attr.expr, Usage::property(get_attr.name, usage));
            }
            ast::Expr::GetItem(get_item) => {
                if let ast::Expr::Const(constant) = &get_item.subscript_expr {
                    if let Some(key) = constant.value.as_str() {
                        self.visit_expr(&get_item.expr, Usage::property(key, usage));
                        return;
                    }
                    if constant.value.kind() == ValueKind::Number {
                        self.visit_expr(&get_item.expr, Usage::Array(Box::new(usage)));
                        return;
                    }
                }
                self.visit_expr(&get_item.subscript_expr, Usage::Unknown);
                self.visit_expr(&get_item.expr, Usage::Array(Box::new(usage)));
            }
            ast::Expr::Slice(slice) => {
                self.visit_expr(&slice.expr, Usage::Array(Box::new(Usage::Unknown)));
                for bound in [&slice.start, &slice.stop, &slice.step].into_iter().flatten() {
                    self.visit_expr(bound, Usage::Number);
                }
            }
            ast::Expr::UnaryOp(unary) => {
                let operand = match unary.op {
                    ast::UnaryOpKind::Not => Usage::Boolean,
                    ast::UnaryOpKind::Neg => Usage::Number,
                };
                self.visit_expr(&unary.expr, operand);
            }
            ast::Expr::BinOp(binop) => self.visit_binop(binop),
            ast::Expr::IfExpr(if_expr) => {
                self.visit_expr(&if_expr.test_expr, Usage::Boolean);
                self.visit_expr(&if_expr.true_expr, usage.clone());
                if let Some(false_expr) = &if_expr.false_expr {
                    self.visit_expr(false_expr, usage);
                }
            }
            ast::Expr::Filter(filter) => {
                if let Some(inner) = &filter.expr {
                    self.visit_expr(inner, Usage::Unknown);
                }
                for arg in &filter.args {
                    match arg {
                        ast::CallArg::Pos(expr)
                        | ast::CallArg::PosSplat(expr)
                        | ast::CallArg::KwargSplat(expr) => self.visit_expr(expr, Usage::Unknown),
                        ast::CallArg::Kwarg(_, expr) => self.visit_expr(expr, Usage::Unknown),
                    }
                }
            }
            ast::Expr::Test(test) => {
                self.visit_expr(&test.expr, Usage::Unknown);
                for arg in &test.args {
                    match arg {
                        ast::CallArg::Pos(expr)
                        | ast::CallArg::PosSplat(expr)
                        | ast::CallArg::KwargSplat(expr) => self.visit_expr(expr, Usage::Unknown),
                        ast::CallArg::Kwarg(_, expr) => self.visit_expr(expr, Usage::Unknown),
                    }
                }
            }
            ast::Expr::Call(call) => {
                // a bare callee name is a function, not a data variable
                if !matches!(&call.expr, ast::Expr::Var(_)) {
                    self.visit_expr(&call.expr, Usage::Unknown);
                }
                for arg in &call.args {
                    match arg {
                        ast::CallArg::Pos(expr)
                        | ast::CallArg::PosSplat(expr)
                        | ast::CallArg::KwargSplat(expr) => self.visit_expr(expr, Usage::Unknown),
                        ast::CallArg::Kwarg(_, expr) => self.visit_expr(expr, Usage::Unknown),
                    }
                }
            }
            ast::Expr::List(list) => {
                for item in &list.items {
                    self.visit_expr(item, Usage::Unknown);
                }
            }
            ast::Expr::Map(map) => {
                for key in &map.keys {
                    self.visit_expr(key, Usage::Unknown);
                }
                for value in &map.values {
                    self.visit_expr(value, Usage::Unknown);
                }
            }
            _ => {}
        }
    }

    fn visit_binop(&mut self, binop: &ast::BinOp<'_>) {
        use ast::BinOpKind;
        let (left, right) = match binop.op {
            BinOpKind::Add
            | BinOpKind::Sub
            | BinOpKind::Mul
            | BinOpKind::Div
            | BinOpKind::FloorDiv
            | BinOpKind::Rem
            | BinOpKind::Pow => (Usage::Number, Usage::Number),
            BinOpKind::Concat => (Usage::String, Usage::String),
            BinOpKind::ScAnd | BinOpKind::ScOr => (Usage::Boolean, Usage::Boolean),
            BinOpKind::In => (Usage::Unknown, Usage::Array(Box::new(Usage::Unknown))),
            BinOpKind::Eq
            | BinOpKind::Ne
            | BinOpKind::Lt
            | BinOpKind::Lte
            | BinOpKind::Gt
            | BinOpKind::Gte => (Usage::Unknown, Usage::Unknown),
        };
        self.visit_expr(&binop.left, left);
        self.visit_expr(&binop.right, right);
    }
}

/// Bindable names introduced by a loop/with/set target, including tuple
/// unpacking.
fn collect_target_names(target: &ast::Expr<'_>, scope: &mut IndexMap<String, Usage>) {
    match target {
        ast::Expr::Var(var) => {
            scope.insert(var.id.to_string(), Usage::Unknown);
        }
        ast::Expr::List(list) => {
            for item in &list.items {
                collect_target_names(item, scope);
            }
        }
        _ => {}
    }
}

/// One Var per free variable of the parsed template, in first-seen order.
pub(super) fn infer_template(stmt: &ast::Stmt<'_>) -> Vec<Var> {
    let mut inference = Inference::default();
    inference.visit_stmt(stmt);
    inference
        .roots
        .into_iter()
        .map(|(name, usage)| usage.into_var().with_name(name))
        .collect()
}
