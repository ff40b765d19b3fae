/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Syntax tree for compiled artifacts.
//!
//! A compiled artifact is parsed once into a list of [`ScriptNode`]s. Every
//! node carries the artifact line it started on, which is what render
//! failure reports point at.

use crate::context::TemplateValue;

/// A node in the artifact tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptNode {
    /// Passthrough text.
    Literal(String),

    /// `<?= expr ?>`
    Echo(Echo),

    /// `<?tpl a = 1; b++ ?>`
    Statements(Statements),

    /// `if(c): ... elseif(c): ... else: ... endif;`
    Conditional(Conditional),

    /// `foreach(items as k => v): ... endforeach;`
    Foreach(Foreach),

    /// `for(init; cond; step): ... endfor;`
    ForLoop(ForLoop),

    /// `while(c): ... endwhile;`
    WhileLoop(WhileLoop),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Echo {
    pub expr: Expr,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statements {
    pub stmts: Vec<Stmt>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    /// (condition, body) pairs for the `if`/`elseif` branches.
    pub branches: Vec<(Expr, Vec<ScriptNode>)>,
    pub else_branch: Option<Vec<ScriptNode>>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Foreach {
    pub iterable: Expr,
    pub key: Option<String>,
    pub value: String,
    pub body: Vec<ScriptNode>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub init: Vec<Stmt>,
    /// A missing condition loops until the iteration limit.
    pub condition: Option<Expr>,
    pub step: Vec<Stmt>,
    pub body: Vec<ScriptNode>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileLoop {
    pub condition: Expr,
    pub body: Vec<ScriptNode>,
    pub line: usize,
}

/// A simple statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign {
        name: String,
        op: AssignOp,
        value: Expr,
    },
    Increment(String),
    Decrement(String),
    /// An expression evaluated for nothing but its errors.
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(TemplateValue),
    List(Vec<Expr>),
    Variable(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Identical,
    NotIdentical,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Concat,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Identical => "===",
            BinaryOp::NotIdentical => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Concat => "~",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}
