/*
 * expr.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tokenizer and parser for the code inside artifact blocks.
//!
//! Expressions are parsed by precedence climbing. Lowest to highest:
//!
//! | Level | Operators |
//! |-------|-----------|
//! | 0 | `c ? a : b` (right associative) |
//! | 1 | `\|\|`, `or` |
//! | 2 | `&&`, `and` |
//! | 3 | `==`, `!=`, `===`, `!==` |
//! | 4 | `<`, `<=`, `>`, `>=` |
//! | 5 | `+`, `-`, `~` |
//! | 6 | `*`, `/`, `%` |
//! | 7 | unary `!`, `not`, `-` |
//! | 8 | `.field`, `[index]`, `name(args)` |

use super::ast::{AssignOp, BinaryOp, Expr, Stmt, UnaryOp};
use crate::context::TemplateValue;
use crate::error::{TemplateError, TemplateResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    /// An identifier, with any leading `$` removed.
    Ident(String),
    Punct(&'static str),
}

const PUNCTUATION: [&str; 32] = [
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "++", "--", "=>", "(", ")", "[",
    "]", ",", ".", ":", "?", ";", "+", "-", "*", "/", "%", "~", "!", "=", "<", ">",
];

pub fn tokenize(source: &str) -> TemplateResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c.is_ascii_digit() {
            let mut end = i;
            let mut seen_dot = false;
            while let Some(&(j, d)) = chars.peek() {
                let fraction = d == '.'
                    && !seen_dot
                    && source[j + 1..].chars().next().is_some_and(|n| n.is_ascii_digit());
                if d.is_ascii_digit() || fraction {
                    seen_dot |= d == '.';
                    end = j + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let number = source[i..end]
                .parse::<f64>()
                .map_err(|_| TemplateError::syntax(format!("invalid number '{}'", &source[i..end])))?;
            tokens.push(Token::Number(number));
            continue;
        }

        if c == '\'' || c == '"' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, d)) = chars.next() {
                match d {
                    '\\' => match chars.next() {
                        Some((_, 'n')) => value.push('\n'),
                        Some((_, 't')) => value.push('\t'),
                        Some((_, other)) => value.push(other),
                        None => break,
                    },
                    d if d == c => {
                        closed = true;
                        break;
                    }
                    d => value.push(d),
                }
            }
            if !closed {
                return Err(TemplateError::syntax("unterminated string literal"));
            }
            tokens.push(Token::Str(value));
            continue;
        }

        if c == '$' || c == '_' || c.is_alphabetic() {
            chars.next();
            let start = if c == '$' { i + 1 } else { i };
            let mut end = i + c.len_utf8();
            while let Some(&(j, d)) = chars.peek() {
                if d == '_' || d.is_alphanumeric() {
                    end = j + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            if start >= end {
                return Err(TemplateError::syntax("'$' must be followed by a name"));
            }
            tokens.push(Token::Ident(source[start..end].to_string()));
            continue;
        }

        let rest = &source[i..];
        match PUNCTUATION.iter().copied().find(|p| rest.starts_with(p)) {
            Some(p) => {
                for _ in 0..p.len() {
                    chars.next();
                }
                tokens.push(Token::Punct(p));
            }
            None => {
                return Err(TemplateError::syntax(format!("unexpected character '{}'", c)));
            }
        }
    }

    Ok(tokens)
}

/// Cursor over a token list.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(source: &str) -> TemplateResult<Self> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    pub fn eat_punct(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_punct(&mut self, punct: &str) -> TemplateResult<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", punct)))
        }
    }

    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(name)) if name == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_ident(&mut self) -> TemplateResult<String> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    /// Error unless every token was consumed.
    pub fn finish(&self) -> TemplateResult<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected("end of code"))
        }
    }

    pub fn unexpected(&self, expected: &str) -> TemplateError {
        let found = match self.peek() {
            Some(Token::Number(n)) => n.to_string(),
            Some(Token::Str(s)) => format!("'{}'", s),
            Some(Token::Ident(name)) => name.clone(),
            Some(Token::Punct(p)) => format!("'{}'", p),
            None => "end of code".to_string(),
        };
        TemplateError::syntax(format!("expected {}, found {}", expected, found))
    }

    /// Parse `;`-separated statements up to the end of the code.
    pub fn statements(&mut self) -> TemplateResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            while self.eat_punct(";") {}
            if self.at_end() {
                return Ok(stmts);
            }
            stmts.push(self.statement()?);
            if !self.eat_punct(";") {
                return Ok(stmts);
            }
        }
    }

    /// Parse `,`-separated statements (a `for` head clause) up to `terminator`.
    ///
    /// The terminator itself is not consumed.
    pub fn clause(&mut self, terminator: &str) -> TemplateResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == terminator) {
            return Ok(stmts);
        }
        loop {
            stmts.push(self.statement()?);
            if !self.eat_punct(",") {
                return Ok(stmts);
            }
        }
    }

    fn statement(&mut self) -> TemplateResult<Stmt> {
        if let (Some(Token::Ident(name)), Some(Token::Punct(op))) = (self.peek(), self.peek_at(1)) {
            let name = name.clone();
            let op = *op;
            match op {
                "=" | "+=" | "-=" => {
                    self.pos += 2;
                    let value = self.expression()?;
                    let op = match op {
                        "=" => AssignOp::Set,
                        "+=" => AssignOp::Add,
                        _ => AssignOp::Sub,
                    };
                    return Ok(Stmt::Assign { name, op, value });
                }
                "++" => {
                    self.pos += 2;
                    return Ok(Stmt::Increment(name));
                }
                "--" => {
                    self.pos += 2;
                    return Ok(Stmt::Decrement(name));
                }
                _ => {}
            }
        }
        Ok(Stmt::Expr(self.expression()?))
    }

    pub fn expression(&mut self) -> TemplateResult<Expr> {
        let condition = self.binary(1)?;
        if self.eat_punct("?") {
            let then = self.expression()?;
            self.expect_punct(":")?;
            let otherwise = self.expression()?;
            return Ok(Expr::Ternary(
                Box::new(condition),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(condition)
    }

    fn peek_binary(&self) -> Option<(BinaryOp, u8)> {
        let op = match self.peek()? {
            Token::Punct(p) => match *p {
                "||" => BinaryOp::Or,
                "&&" => BinaryOp::And,
                "==" => BinaryOp::Eq,
                "!=" => BinaryOp::NotEq,
                "===" => BinaryOp::Identical,
                "!==" => BinaryOp::NotIdentical,
                "<" => BinaryOp::Lt,
                "<=" => BinaryOp::LtEq,
                ">" => BinaryOp::Gt,
                ">=" => BinaryOp::GtEq,
                "+" => BinaryOp::Add,
                "-" => BinaryOp::Sub,
                "~" => BinaryOp::Concat,
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                "%" => BinaryOp::Rem,
                _ => return None,
            },
            Token::Ident(word) => match word.as_str() {
                "or" => BinaryOp::Or,
                "and" => BinaryOp::And,
                _ => return None,
            },
            _ => return None,
        };
        let precedence = match op {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Identical | BinaryOp::NotIdentical => 3,
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => 4,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Concat => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 6,
        };
        Some((op, precedence))
    }

    fn binary(&mut self, min_precedence: u8) -> TemplateResult<Expr> {
        let mut lhs = self.unary()?;
        while let Some((op, precedence)) = self.peek_binary() {
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(precedence + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> TemplateResult<Expr> {
        if self.eat_punct("!") || self.eat_keyword("not") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.eat_punct("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> TemplateResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct(".") {
                let field = match self.advance() {
                    Some(Token::Ident(name)) => name,
                    Some(Token::Number(n)) if n.fract() == 0.0 && n >= 0.0 => (n as u64).to_string(),
                    _ => {
                        self.pos -= 1;
                        return Err(self.unexpected("a field name after '.'"));
                    }
                };
                expr = Expr::Member(Box::new(expr), field);
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> TemplateResult<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(TemplateValue::Number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(TemplateValue::String(s))),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(TemplateValue::Bool(true))),
                "false" => Ok(Expr::Literal(TemplateValue::Bool(false))),
                "null" => Ok(Expr::Literal(TemplateValue::Null)),
                _ if self.eat_punct("(") => {
                    let args = self.arguments(")")?;
                    Ok(Expr::Call(name, args))
                }
                _ => Ok(Expr::Variable(name)),
            },
            Some(Token::Punct("(")) => {
                let inner = self.expression()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            Some(Token::Punct("[")) => Ok(Expr::List(self.arguments("]")?)),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.unexpected("an expression"))
            }
        }
    }

    fn arguments(&mut self, close: &str) -> TemplateResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat_punct(close) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat_punct(close) {
                return Ok(args);
            }
            self.expect_punct(",")?;
        }
    }
}

/// Parse a complete expression.
pub fn parse_expression(source: &str) -> TemplateResult<Expr> {
    let mut parser = Parser::new(source)?;
    let expr = parser.expression()?;
    parser.eat_punct(";");
    parser.finish()?;
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Variable(name.to_string()))
    }

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("$a.b >= 1.5 && 'x\\'y'").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::Punct("."),
                Token::Ident("b".into()),
                Token::Punct(">="),
                Token::Number(1.5),
                Token::Punct("&&"),
                Token::Str("x'y".into()),
            ]
        );
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("a || b && !c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Or,
                var("a"),
                Box::new(Expr::Binary(
                    BinaryOp::And,
                    var("b"),
                    Box::new(Expr::Unary(UnaryOp::Not, var("c")))
                ))
            )
        );
    }

    #[test]
    fn test_left_associative_subtraction() {
        let expr = parse_expression("a - b - c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(BinaryOp::Sub, var("a"), var("b"))),
                var("c")
            )
        );
    }

    #[test]
    fn test_member_index_and_call() {
        let expr = parse_expression("upper(user.names[0])").unwrap();
        assert_eq!(
            expr,
            Expr::Call(
                "upper".into(),
                vec![Expr::Index(
                    Box::new(Expr::Member(var("user"), "names".into())),
                    Box::new(Expr::Literal(TemplateValue::Number(0.0)))
                )]
            )
        );
    }

    #[test]
    fn test_statements() {
        let mut parser = Parser::new("$i = 0; $i++; total += price").unwrap();
        let stmts = parser.statements().unwrap();
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[1], Stmt::Increment("i".into()));
        assert!(matches!(&stmts[2], Stmt::Assign { op: AssignOp::Add, .. }));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse_expression("a b").is_err());
        assert!(parse_expression("(a").is_err());
        assert!(parse_expression("'open").is_err());
    }
}
