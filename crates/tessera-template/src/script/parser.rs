/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Artifact parser.
//!
//! Splits compiled text into passthrough literals and code blocks, parses
//! each block, and folds the flat sequence of control heads and tails into a
//! tree.

use super::ast::{
    Conditional, Echo, Expr, ForLoop, Foreach, ScriptNode, Statements, Stmt, WhileLoop,
};
use super::expr::{Parser, parse_expression};
use crate::error::{TemplateError, TemplateResult};

/// Opening of an echo block.
pub const ECHO_OPEN: &str = "<?=";
/// Opening of a code block.
pub const CODE_OPEN: &str = "<?tpl";
/// Opening of a comment block.
pub const COMMENT_OPEN: &str = "<?#";
/// Closing of every block.
pub const BLOCK_CLOSE: &str = "?>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Echo,
    Code,
    Comment,
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Text(&'a str),
    Block {
        kind: BlockKind,
        code: &'a str,
        line: usize,
    },
}

/// Split artifact text into literal and block segments.
fn segments(source: &str) -> TemplateResult<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while let Some(rel) = source[pos..].find("<?") {
        let start = pos + rel;
        let rest = &source[start..];
        let (kind, body_start) = if rest.starts_with(ECHO_OPEN) {
            (BlockKind::Echo, start + ECHO_OPEN.len())
        } else if rest.starts_with(COMMENT_OPEN) {
            (BlockKind::Comment, start + COMMENT_OPEN.len())
        } else if rest.starts_with(CODE_OPEN)
            && rest[CODE_OPEN.len()..]
                .chars()
                .next()
                .is_some_and(char::is_whitespace)
        {
            (BlockKind::Code, start + CODE_OPEN.len())
        } else {
            // `<?xml` and friends are plain text.
            pos = start + 2;
            continue;
        };

        let line = 1 + source[..start].matches('\n').count();
        let close = match kind {
            BlockKind::Comment => source[body_start..].find(BLOCK_CLOSE).map(|i| body_start + i),
            _ => find_close(source, body_start),
        }
        .ok_or_else(|| TemplateError::Syntax {
            message: format!("unterminated code block on line {}", line),
        })?;

        if text_start < start {
            segments.push(Segment::Text(&source[text_start..start]));
        }
        segments.push(Segment::Block {
            kind,
            code: &source[body_start..close],
            line,
        });

        pos = close + BLOCK_CLOSE.len();
        if kind != BlockKind::Echo {
            if source[pos..].starts_with("\r\n") {
                pos += 2;
            } else if source[pos..].starts_with('\n') {
                pos += 1;
            }
        }
        text_start = pos;
    }

    if text_start < source.len() {
        segments.push(Segment::Text(&source[text_start..]));
    }
    Ok(segments)
}

/// Offset of the `?>` closing a code block, skipping quoted strings.
fn find_close(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if source[i..].starts_with(BLOCK_CLOSE) => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

/// A parsed code block.
#[derive(Debug, PartialEq)]
enum Instruction {
    If(Expr),
    ElseIf(Expr),
    Else,
    EndIf,
    Foreach {
        iterable: Expr,
        key: Option<String>,
        value: String,
    },
    EndForeach,
    For {
        init: Vec<Stmt>,
        condition: Option<Expr>,
        step: Vec<Stmt>,
    },
    EndFor,
    While(Expr),
    EndWhile,
    Statements(Vec<Stmt>),
}

fn parse_instruction(code: &str) -> TemplateResult<Instruction> {
    let mut p = Parser::new(code)?;

    let instruction = if p.eat_keyword("if") {
        Instruction::If(head_condition(&mut p)?)
    } else if p.eat_keyword("elseif") {
        Instruction::ElseIf(head_condition(&mut p)?)
    } else if p.eat_keyword("else") {
        p.eat_punct(":");
        Instruction::Else
    } else if p.eat_keyword("foreach") {
        p.expect_punct("(")?;
        let iterable = p.expression()?;
        if !p.eat_keyword("as") {
            return Err(p.unexpected("'as'"));
        }
        let first = p.expect_ident()?;
        let (key, value) = if p.eat_punct("=>") {
            (Some(first), p.expect_ident()?)
        } else {
            (None, first)
        };
        p.expect_punct(")")?;
        p.eat_punct(":");
        Instruction::Foreach {
            iterable,
            key,
            value,
        }
    } else if p.eat_keyword("for") {
        p.expect_punct("(")?;
        let init = p.clause(";")?;
        p.expect_punct(";")?;
        let condition = if p.eat_punct(";") {
            None
        } else {
            let c = p.expression()?;
            p.expect_punct(";")?;
            Some(c)
        };
        let step = p.clause(")")?;
        p.expect_punct(")")?;
        p.eat_punct(":");
        Instruction::For {
            init,
            condition,
            step,
        }
    } else if p.eat_keyword("while") {
        Instruction::While(head_condition(&mut p)?)
    } else if p.eat_keyword("endif") {
        Instruction::EndIf
    } else if p.eat_keyword("endforeach") {
        Instruction::EndForeach
    } else if p.eat_keyword("endfor") {
        Instruction::EndFor
    } else if p.eat_keyword("endwhile") {
        Instruction::EndWhile
    } else {
        Instruction::Statements(p.statements()?)
    };

    p.eat_punct(";");
    p.finish()?;
    Ok(instruction)
}

fn head_condition(p: &mut Parser) -> TemplateResult<Expr> {
    p.expect_punct("(")?;
    let condition = p.expression()?;
    p.expect_punct(")")?;
    p.eat_punct(":");
    Ok(condition)
}

#[derive(Debug)]
enum OpenBlock {
    If {
        done: Vec<(Expr, Vec<ScriptNode>)>,
        /// `None` once `else` has been seen.
        condition: Option<Expr>,
    },
    Foreach {
        iterable: Expr,
        key: Option<String>,
        value: String,
    },
    For {
        init: Vec<Stmt>,
        condition: Option<Expr>,
        step: Vec<Stmt>,
    },
    While(Expr),
}

impl OpenBlock {
    fn name(&self) -> &'static str {
        match self {
            OpenBlock::If { .. } => "if",
            OpenBlock::Foreach { .. } => "foreach",
            OpenBlock::For { .. } => "for",
            OpenBlock::While(_) => "while",
        }
    }
}

#[derive(Debug)]
struct Frame {
    block: OpenBlock,
    body: Vec<ScriptNode>,
    line: usize,
}

#[derive(Debug, Default)]
struct TreeBuilder {
    root: Vec<ScriptNode>,
    stack: Vec<Frame>,
}

impl TreeBuilder {
    fn push(&mut self, node: ScriptNode) {
        match self.stack.last_mut() {
            Some(frame) => frame.body.push(node),
            None => self.root.push(node),
        }
    }

    fn open(&mut self, block: OpenBlock, line: usize) {
        self.stack.push(Frame {
            block,
            body: Vec::new(),
            line,
        });
    }

    fn close(&mut self, expected: &str, line: usize) -> TemplateResult<Frame> {
        match self.stack.pop() {
            Some(frame) if frame.block.name() == expected => Ok(frame),
            Some(frame) => Err(TemplateError::Syntax {
                message: format!(
                    "end{} on line {} closes {} opened on line {}",
                    expected,
                    line,
                    frame.block.name(),
                    frame.line
                ),
            }),
            None => Err(mismatch(&format!("end{}", expected), expected, line)),
        }
    }

    fn current_if(&mut self, keyword: &str, line: usize) -> TemplateResult<&mut Frame> {
        match self.stack.last_mut() {
            Some(frame) if matches!(frame.block, OpenBlock::If { condition: Some(_), .. }) => {
                Ok(frame)
            }
            _ => Err(mismatch(keyword, "if", line)),
        }
    }

    fn apply(&mut self, instruction: Instruction, line: usize) -> TemplateResult<()> {
        match instruction {
            Instruction::Statements(stmts) => {
                if !stmts.is_empty() {
                    self.push(ScriptNode::Statements(Statements { stmts, line }));
                }
            }
            Instruction::If(condition) => self.open(
                OpenBlock::If {
                    done: Vec::new(),
                    condition: Some(condition),
                },
                line,
            ),
            Instruction::ElseIf(next) => {
                let frame = self.current_if("elseif", line)?;
                let body = std::mem::take(&mut frame.body);
                if let OpenBlock::If { done, condition } = &mut frame.block {
                    if let Some(previous) = condition.replace(next) {
                        done.push((previous, body));
                    }
                }
            }
            Instruction::Else => {
                let frame = self.current_if("else", line)?;
                let body = std::mem::take(&mut frame.body);
                if let OpenBlock::If { done, condition } = &mut frame.block {
                    if let Some(previous) = condition.take() {
                        done.push((previous, body));
                    }
                }
            }
            Instruction::EndIf => {
                let frame = self.close("if", line)?;
                if let OpenBlock::If {
                    mut done,
                    condition,
                } = frame.block
                {
                    let else_branch = match condition {
                        Some(last) => {
                            done.push((last, frame.body));
                            None
                        }
                        None => Some(frame.body),
                    };
                    self.push(ScriptNode::Conditional(Conditional {
                        branches: done,
                        else_branch,
                        line: frame.line,
                    }));
                }
            }
            Instruction::Foreach {
                iterable,
                key,
                value,
            } => self.open(
                OpenBlock::Foreach {
                    iterable,
                    key,
                    value,
                },
                line,
            ),
            Instruction::EndForeach => {
                let frame = self.close("foreach", line)?;
                if let OpenBlock::Foreach {
                    iterable,
                    key,
                    value,
                } = frame.block
                {
                    self.push(ScriptNode::Foreach(Foreach {
                        iterable,
                        key,
                        value,
                        body: frame.body,
                        line: frame.line,
                    }));
                }
            }
            Instruction::For {
                init,
                condition,
                step,
            } => self.open(
                OpenBlock::For {
                    init,
                    condition,
                    step,
                },
                line,
            ),
            Instruction::EndFor => {
                let frame = self.close("for", line)?;
                if let OpenBlock::For {
                    init,
                    condition,
                    step,
                } = frame.block
                {
                    self.push(ScriptNode::ForLoop(ForLoop {
                        init,
                        condition,
                        step,
                        body: frame.body,
                        line: frame.line,
                    }));
                }
            }
            Instruction::While(condition) => self.open(OpenBlock::While(condition), line),
            Instruction::EndWhile => {
                let frame = self.close("while", line)?;
                if let OpenBlock::While(condition) = frame.block {
                    self.push(ScriptNode::WhileLoop(WhileLoop {
                        condition,
                        body: frame.body,
                        line: frame.line,
                    }));
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> TemplateResult<Vec<ScriptNode>> {
        match self.stack.last() {
            Some(frame) => Err(TemplateError::Syntax {
                message: format!(
                    "{} opened on line {} is never closed",
                    frame.block.name(),
                    frame.line
                ),
            }),
            None => Ok(self.root),
        }
    }
}

fn mismatch(keyword: &str, block: &str, line: usize) -> TemplateError {
    TemplateError::Syntax {
        message: format!("{} on line {} without an open {}", keyword, line, block),
    }
}

fn with_line(err: TemplateError, line: usize) -> TemplateError {
    match err {
        TemplateError::Syntax { message } => TemplateError::Syntax {
            message: format!("{} (line {})", message, line),
        },
        other => other,
    }
}

/// Parse artifact text into a node tree.
pub fn parse(source: &str) -> TemplateResult<Vec<ScriptNode>> {
    let mut builder = TreeBuilder::default();

    for segment in segments(source)? {
        match segment {
            Segment::Text(text) => builder.push(ScriptNode::Literal(text.to_string())),
            Segment::Block {
                kind: BlockKind::Comment,
                ..
            } => {}
            Segment::Block {
                kind: BlockKind::Echo,
                code,
                line,
            } => {
                let expr = parse_expression(code).map_err(|e| with_line(e, line))?;
                builder.push(ScriptNode::Echo(Echo { expr, line }));
            }
            Segment::Block {
                kind: BlockKind::Code,
                code,
                line,
            } => {
                let instruction = parse_instruction(code).map_err(|e| with_line(e, line))?;
                builder.apply(instruction, line)?;
            }
        }
    }

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TemplateValue;

    #[test]
    fn test_segments_swallow_newline_after_code() {
        let segs = segments("a\n<?tpl x = 1 ?>\nb<?= x ?>\nc").unwrap();
        assert_eq!(
            segs,
            vec![
                Segment::Text("a\n"),
                Segment::Block {
                    kind: BlockKind::Code,
                    code: " x = 1 ",
                    line: 2
                },
                Segment::Text("b"),
                Segment::Block {
                    kind: BlockKind::Echo,
                    code: " x ",
                    line: 3
                },
                Segment::Text("\nc"),
            ]
        );
    }

    #[test]
    fn test_xml_prolog_is_text() {
        let nodes = parse("<?xml version=\"1.0\"?>\n<a/>").unwrap();
        assert_eq!(
            nodes,
            vec![ScriptNode::Literal("<?xml version=\"1.0\"?>\n<a/>".into())]
        );
    }

    #[test]
    fn test_close_inside_string() {
        let nodes = parse("<?= 'a?>b' ?>").unwrap();
        assert_eq!(
            nodes,
            vec![ScriptNode::Echo(Echo {
                expr: Expr::Literal(TemplateValue::from("a?>b")),
                line: 1
            })]
        );
    }

    #[test]
    fn test_if_elseif_else_tree() {
        let nodes =
            parse("<?tpl if(a): ?>A<?tpl elseif(b): ?>B<?tpl else: ?>C<?tpl endif; ?>").unwrap();
        match &nodes[..] {
            [ScriptNode::Conditional(c)] => {
                assert_eq!(c.branches.len(), 2);
                assert_eq!(c.else_branch, Some(vec![ScriptNode::Literal("C".into())]));
            }
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_foreach_with_key() {
        let nodes = parse("<?tpl foreach($rows as $i => $row): ?>x<?tpl endforeach; ?>").unwrap();
        match &nodes[..] {
            [ScriptNode::Foreach(f)] => {
                assert_eq!(f.key.as_deref(), Some("i"));
                assert_eq!(f.value, "row");
            }
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_for_head() {
        let nodes = parse("<?tpl for($i = 0; $i < 3; $i++): ?><?= i ?><?tpl endfor; ?>").unwrap();
        match &nodes[..] {
            [ScriptNode::ForLoop(f)] => {
                assert_eq!(f.init.len(), 1);
                assert!(f.condition.is_some());
                assert_eq!(f.step, vec![Stmt::Increment("i".into())]);
            }
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_end() {
        let err = parse("<?tpl if(a): ?>\n<?tpl endforeach; ?>").unwrap_err();
        assert!(err.to_string().contains("closes if opened on line 1"));
    }

    #[test]
    fn test_unclosed_block() {
        let err = parse("<?tpl while(a): ?>").unwrap_err();
        assert!(err.to_string().contains("never closed"));
    }

    #[test]
    fn test_unterminated_block() {
        assert!(parse("a <?= b").is_err());
    }
}
