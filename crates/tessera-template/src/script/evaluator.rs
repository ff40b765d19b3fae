/*
 * evaluator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Artifact interpreter.
//!
//! Executes a parsed artifact against a [`TemplateContext`], appending output
//! to a buffer. Evaluation runs in one flat scope seeded from the caller's
//! data: loop variables and assignments stay visible after the construct that
//! set them.

use std::cmp::Ordering;

use super::ast::{
    AssignOp, BinaryOp, Conditional, Expr, ForLoop, Foreach, ScriptNode, Stmt, UnaryOp, WhileLoop,
};
use super::builtins;
use crate::context::{TemplateContext, TemplateValue};
use crate::error::{TemplateError, TemplateResult};

/// Options controlling execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    /// Treat undefined variables as errors instead of null.
    pub strict: bool,
    /// Iteration limit for a single `for` or `while` loop.
    pub max_loop_iterations: usize,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            strict: false,
            max_loop_iterations: 100_000,
        }
    }
}

/// Interpreter state for one execution.
pub struct Evaluator {
    scope: TemplateContext,
    options: ExecOptions,
}

impl Evaluator {
    pub fn new(scope: TemplateContext, options: ExecOptions) -> Self {
        Self { scope, options }
    }

    pub fn scope(&self) -> &TemplateContext {
        &self.scope
    }

    pub fn run(&mut self, nodes: &[ScriptNode], out: &mut String) -> TemplateResult<()> {
        for node in nodes {
            self.run_node(node, out)?;
        }
        Ok(())
    }

    fn run_node(&mut self, node: &ScriptNode, out: &mut String) -> TemplateResult<()> {
        match node {
            ScriptNode::Literal(text) => {
                out.push_str(text);
                Ok(())
            }
            ScriptNode::Echo(echo) => {
                let value = self.eval(&echo.expr, echo.line)?;
                out.push_str(&value.render());
                Ok(())
            }
            ScriptNode::Statements(block) => self.run_statements(&block.stmts, block.line),
            ScriptNode::Conditional(c) => self
                .run_conditional(c, out)
                .map_err(|e| frame(e, format!("if at line {}", c.line))),
            ScriptNode::Foreach(f) => self
                .run_foreach(f, out)
                .map_err(|e| frame(e, format!("foreach at line {}", f.line))),
            ScriptNode::ForLoop(f) => self
                .run_for(f, out)
                .map_err(|e| frame(e, format!("for at line {}", f.line))),
            ScriptNode::WhileLoop(w) => self
                .run_while(w, out)
                .map_err(|e| frame(e, format!("while at line {}", w.line))),
        }
    }

    fn run_conditional(&mut self, c: &Conditional, out: &mut String) -> TemplateResult<()> {
        for (condition, body) in &c.branches {
            if self.eval(condition, c.line)?.is_truthy() {
                return self.run(body, out);
            }
        }
        match &c.else_branch {
            Some(body) => self.run(body, out),
            None => Ok(()),
        }
    }

    fn run_foreach(&mut self, f: &Foreach, out: &mut String) -> TemplateResult<()> {
        let iterable = self.eval(&f.iterable, f.line)?;
        let pairs = builtins::iterate(&iterable).ok_or_else(|| {
            TemplateError::evaluation(
                format!("cannot iterate over {}", iterable.type_name()),
                f.line,
            )
        })?;

        for (key, value) in pairs {
            if let Some(key_name) = &f.key {
                self.scope.insert(key_name.clone(), key);
            }
            self.scope.insert(f.value.clone(), value);
            self.run(&f.body, out)?;
        }
        Ok(())
    }

    fn run_for(&mut self, f: &ForLoop, out: &mut String) -> TemplateResult<()> {
        self.run_statements(&f.init, f.line)?;
        let mut iterations = 0;
        loop {
            if let Some(condition) = &f.condition {
                if !self.eval(condition, f.line)?.is_truthy() {
                    return Ok(());
                }
            }
            self.count_iteration(&mut iterations, f.line)?;
            self.run(&f.body, out)?;
            self.run_statements(&f.step, f.line)?;
        }
    }

    fn run_while(&mut self, w: &WhileLoop, out: &mut String) -> TemplateResult<()> {
        let mut iterations = 0;
        while self.eval(&w.condition, w.line)?.is_truthy() {
            self.count_iteration(&mut iterations, w.line)?;
            self.run(&w.body, out)?;
        }
        Ok(())
    }

    fn count_iteration(&self, iterations: &mut usize, line: usize) -> TemplateResult<()> {
        *iterations += 1;
        if *iterations > self.options.max_loop_iterations {
            return Err(TemplateError::evaluation(
                format!(
                    "loop exceeded {} iterations",
                    self.options.max_loop_iterations
                ),
                line,
            ));
        }
        Ok(())
    }

    fn run_statements(&mut self, stmts: &[Stmt], line: usize) -> TemplateResult<()> {
        for stmt in stmts {
            match stmt {
                Stmt::Assign { name, op, value } => {
                    let rhs = self.eval(value, line)?;
                    let new_value = match op {
                        AssignOp::Set => rhs,
                        AssignOp::Add => add(&self.lookup(name, line)?, &rhs, line)?,
                        AssignOp::Sub => {
                            arithmetic(BinaryOp::Sub, &self.lookup(name, line)?, &rhs, line)?
                        }
                    };
                    self.scope.insert(name.clone(), new_value);
                }
                Stmt::Increment(name) | Stmt::Decrement(name) => {
                    let current = to_number(&self.lookup(name, line)?, "++", line)?;
                    let delta = if matches!(stmt, Stmt::Increment(_)) { 1.0 } else { -1.0 };
                    self.scope.insert(name.clone(), TemplateValue::Number(current + delta));
                }
                Stmt::Expr(expr) => {
                    self.eval(expr, line)?;
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str, line: usize) -> TemplateResult<TemplateValue> {
        match self.scope.get(name) {
            Some(value) => Ok(value.clone()),
            None if self.options.strict => Err(TemplateError::evaluation(
                format!("undefined variable '{}'", name),
                line,
            )),
            None => Ok(TemplateValue::Null),
        }
    }

    /// Evaluate an expression in the current scope.
    pub fn eval(&self, expr: &Expr, line: usize) -> TemplateResult<TemplateValue> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::List(items) => Ok(TemplateValue::List(
                items
                    .iter()
                    .map(|item| self.eval(item, line))
                    .collect::<TemplateResult<_>>()?,
            )),
            Expr::Variable(name) => self.lookup(name, line),
            Expr::Member(base, field) => {
                let base = self.eval(base, line)?;
                Ok(base.get_path(&[field.as_str()]).cloned().unwrap_or_default())
            }
            Expr::Index(base, index) => {
                let base = self.eval(base, line)?;
                let index = self.eval(index, line)?;
                Ok(base
                    .get_path(&[index.render().as_str()])
                    .cloned()
                    .unwrap_or_default())
            }
            Expr::Unary(UnaryOp::Not, operand) => {
                Ok(TemplateValue::Bool(!self.eval(operand, line)?.is_truthy()))
            }
            Expr::Unary(UnaryOp::Neg, operand) => {
                let n = to_number(&self.eval(operand, line)?, "-", line)?;
                Ok(TemplateValue::Number(-n))
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                let result = self.eval(lhs, line)?.is_truthy() && self.eval(rhs, line)?.is_truthy();
                Ok(TemplateValue::Bool(result))
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                let result = self.eval(lhs, line)?.is_truthy() || self.eval(rhs, line)?.is_truthy();
                Ok(TemplateValue::Bool(result))
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs, line)?;
                let rhs = self.eval(rhs, line)?;
                binary(*op, &lhs, &rhs, line)
            }
            Expr::Ternary(condition, then, otherwise) => {
                if self.eval(condition, line)?.is_truthy() {
                    self.eval(then, line)
                } else {
                    self.eval(otherwise, line)
                }
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, line))
                    .collect::<TemplateResult<Vec<_>>>()?;
                builtins::call(name, args, self.options.max_loop_iterations, line)
            }
        }
    }
}

/// Record an enclosing construct on an evaluation error.
fn frame(err: TemplateError, description: String) -> TemplateError {
    match err {
        TemplateError::Evaluation {
            message,
            line,
            mut trace,
        } => {
            trace.push(description);
            TemplateError::Evaluation {
                message,
                line,
                trace,
            }
        }
        other => other,
    }
}

fn binary(
    op: BinaryOp,
    lhs: &TemplateValue,
    rhs: &TemplateValue,
    line: usize,
) -> TemplateResult<TemplateValue> {
    match op {
        BinaryOp::Add => add(lhs, rhs, line),
        BinaryOp::Concat => Ok(TemplateValue::String(lhs.render() + &rhs.render())),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, lhs, rhs, line)
        }
        BinaryOp::Eq => Ok(TemplateValue::Bool(loose_eq(lhs, rhs))),
        BinaryOp::NotEq => Ok(TemplateValue::Bool(!loose_eq(lhs, rhs))),
        BinaryOp::Identical => Ok(TemplateValue::Bool(lhs == rhs)),
        BinaryOp::NotIdentical => Ok(TemplateValue::Bool(lhs != rhs)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = compare(lhs, rhs, op, line)?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::LtEq => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(TemplateValue::Bool(result))
        }
        BinaryOp::And | BinaryOp::Or => {
            Ok(TemplateValue::Bool(lhs.is_truthy() && rhs.is_truthy()))
        }
    }
}

/// `+`: numeric addition, list concatenation, otherwise string concatenation.
fn add(lhs: &TemplateValue, rhs: &TemplateValue, line: usize) -> TemplateResult<TemplateValue> {
    use TemplateValue::*;
    match (lhs, rhs) {
        (List(a), List(b)) => Ok(List(a.iter().chain(b.iter()).cloned().collect())),
        (String(_), _) | (_, String(_)) => Ok(String(lhs.render() + &rhs.render())),
        _ => arithmetic(BinaryOp::Add, lhs, rhs, line),
    }
}

fn arithmetic(
    op: BinaryOp,
    lhs: &TemplateValue,
    rhs: &TemplateValue,
    line: usize,
) -> TemplateResult<TemplateValue> {
    let a = to_number(lhs, op.symbol(), line)?;
    let b = to_number(rhs, op.symbol(), line)?;
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => {
            return Err(TemplateError::evaluation("division by zero", line));
        }
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => {
            return Err(TemplateError::evaluation(
                format!("'{}' is not an arithmetic operator", op.symbol()),
                line,
            ));
        }
    };
    Ok(TemplateValue::Number(result))
}

fn to_number(value: &TemplateValue, op: &str, line: usize) -> TemplateResult<f64> {
    match value {
        TemplateValue::Null => Ok(0.0),
        TemplateValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        TemplateValue::Number(n) => Ok(*n),
        TemplateValue::String(s) => s.trim().parse::<f64>().map_err(|_| {
            TemplateError::evaluation(
                format!("cannot use non-numeric string '{}' with '{}'", s, op),
                line,
            )
        }),
        other => Err(TemplateError::evaluation(
            format!("unsupported operand type {} for '{}'", other.type_name(), op),
            line,
        )),
    }
}

fn loose_eq(lhs: &TemplateValue, rhs: &TemplateValue) -> bool {
    use TemplateValue::*;
    match (lhs, rhs) {
        (Number(n), String(s)) | (String(s), Number(n)) => {
            s.trim().parse::<f64>().is_ok_and(|parsed| parsed == *n)
        }
        (Bool(b), other) | (other, Bool(b)) => *b == other.is_truthy(),
        (Null, other) | (other, Null) => !other.is_truthy(),
        _ => lhs == rhs,
    }
}

fn compare(
    lhs: &TemplateValue,
    rhs: &TemplateValue,
    op: BinaryOp,
    line: usize,
) -> TemplateResult<Ordering> {
    if let (TemplateValue::String(a), TemplateValue::String(b)) = (lhs, rhs) {
        return Ok(a.cmp(b));
    }
    let a = to_number(lhs, op.symbol(), line)?;
    let b = to_number(rhs, op.symbol(), line)?;
    a.partial_cmp(&b).ok_or_else(|| {
        TemplateError::evaluation(format!("cannot compare {} and {}", a, b), line)
    })
}
