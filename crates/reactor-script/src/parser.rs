//! Statement parser
//!
//! ```text
//! program   := statement*
//! statement := "set" NAME "=" expr NL
//!            | "global" NAME "=" expr NL
//!            | "if" expr NL block ("else" NL block)? "end" NL
//!            | "stop" NL
//!            | VERB expr* NL
//! expr      := STRING | INT | FLOAT | "true" | "false" | "null" | $var | ${placeholder}
//! ```

use std::vec::IntoIter;

use reactor_engine::{EVENT_VAR, ParseError, Parsed, Value};

use crate::lexer::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Set { name: String, value: Expr },
    Global { name: String, value: Expr },
    Call { verb: String, args: Vec<Expr>, line: usize },
    If { cond: Expr, then: Vec<Stmt>, otherwise: Vec<Stmt> },
    Stop,
}

/// A compiled script
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Stmt>,
}

struct Parser {
    tokens: IntoIter<Token>,
    warnings: Vec<(usize, String)>,
    last_line: usize,
}

/// What ended a block
enum Terminator {
    Eof,
    Else,
    End,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.next()?;
        self.last_line = token.line;
        Some(token)
    }

    fn error(&self, line: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            line,
            message: message.into(),
        }
    }

    fn expect_newline(&mut self, after: &str) -> Result<(), ParseError> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Newline,
                ..
            }) => Ok(()),
            Some(token) => Err(self.error(
                token.line,
                format!("unexpected {:?} after `{}`", token.kind, after),
            )),
            None => Ok(()),
        }
    }

    fn expr(&mut self, token: Token) -> Result<Expr, ParseError> {
        Ok(match token.kind {
            TokenKind::Str(s) => Expr::Literal(Value::Str(s)),
            TokenKind::Int(i) => Expr::Literal(Value::Int(i)),
            TokenKind::Float(f) => Expr::Literal(Value::Float(f)),
            TokenKind::Var(name) => Expr::Var(name),
            TokenKind::Placeholder(name) => Expr::Placeholder(name),
            TokenKind::Word(word) => match word.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                // Bare words are string literals
                _ => Expr::Literal(Value::Str(word)),
            },
            TokenKind::Equals | TokenKind::Newline => {
                return Err(self.error(token.line, "expected a value"));
            }
        })
    }

    fn single_expr(&mut self, line: usize) -> Result<Expr, ParseError> {
        let token = self
            .next()
            .ok_or_else(|| self.error(line, "expected a value"))?;
        self.expr(token)
    }

    fn assignment(&mut self, keyword: &str, line: usize) -> Result<(String, Expr), ParseError> {
        let name = match self.next() {
            Some(Token {
                kind: TokenKind::Word(name),
                ..
            }) => name,
            _ => return Err(self.error(line, format!("`{}` needs a variable name", keyword))),
        };
        match self.next() {
            Some(Token {
                kind: TokenKind::Equals,
                ..
            }) => {}
            _ => return Err(self.error(line, "expected `=`")),
        }
        let value = self.single_expr(line)?;
        self.expect_newline(keyword)?;
        Ok((name, value))
    }

    fn block(&mut self) -> Result<(Vec<Stmt>, Terminator), ParseError> {
        let mut body = Vec::new();
        let mut stopped_at: Option<usize> = None;
        let mut warned = false;

        while let Some(token) = self.next() {
            let line = token.line;
            let word = match token.kind {
                TokenKind::Word(word) => word,
                TokenKind::Newline => continue,
                other => {
                    let message = format!("expected a statement, found {:?}", other);
                    return Err(self.error(line, message));
                }
            };

            match word.as_str() {
                "else" => {
                    self.expect_newline("else")?;
                    return Ok((body, Terminator::Else));
                }
                "end" => {
                    self.expect_newline("end")?;
                    return Ok((body, Terminator::End));
                }
                _ => {}
            }

            if let (Some(stop_line), false) = (stopped_at, warned) {
                self.warnings.push((
                    line,
                    format!("unreachable statement after `stop` on line {}", stop_line),
                ));
                warned = true;
            }

            let stmt = match word.as_str() {
                "set" => {
                    let (name, value) = self.assignment("set", line)?;
                    if name == EVENT_VAR {
                        let message =
                            format!("assigning `{}` hides the triggering event", EVENT_VAR);
                        self.warnings.push((line, message));
                    }
                    Stmt::Set { name, value }
                }
                "global" => {
                    let (name, value) = self.assignment("global", line)?;
                    Stmt::Global { name, value }
                }
                "if" => {
                    let cond = self.single_expr(line)?;
                    self.expect_newline("if")?;
                    let (then, terminator) = self.block()?;
                    let otherwise = match terminator {
                        Terminator::End => Vec::new(),
                        Terminator::Else => match self.block()? {
                            (otherwise, Terminator::End) => otherwise,
                            (_, Terminator::Else) => {
                                return Err(self.error(self.last_line, "duplicate `else`"));
                            }
                            (_, Terminator::Eof) => {
                                return Err(self.error(line, "`if` without matching `end`"));
                            }
                        },
                        Terminator::Eof => {
                            return Err(self.error(line, "`if` without matching `end`"));
                        }
                    };
                    Stmt::If {
                        cond,
                        then,
                        otherwise,
                    }
                }
                "stop" => {
                    self.expect_newline("stop")?;
                    stopped_at.get_or_insert(line);
                    Stmt::Stop
                }
                _ => {
                    let mut args = Vec::new();
                    while let Some(token) = self.next() {
                        if token.kind == TokenKind::Newline {
                            break;
                        }
                        args.push(self.expr(token)?);
                    }
                    Stmt::Call {
                        verb: word,
                        args,
                        line,
                    }
                }
            };
            body.push(stmt);
        }

        Ok((body, Terminator::Eof))
    }
}

pub fn parse(tokens: Vec<Token>) -> Result<Parsed<Program>, ParseError> {
    let mut parser = Parser {
        tokens: tokens.into_iter(),
        warnings: Vec::new(),
        last_line: 1,
    };

    let (body, terminator) = parser.block()?;
    match terminator {
        Terminator::Eof => {}
        Terminator::Else => return Err(parser.error(parser.last_line, "`else` outside of `if`")),
        Terminator::End => return Err(parser.error(parser.last_line, "`end` outside of `if`")),
    }

    let mut parsed = Parsed::new(Program { body });
    for (line, message) in parser.warnings {
        parsed = parsed.with_warning(line, message);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn compile(source: &str) -> Result<Parsed<Program>, ParseError> {
        parse(lex(source).unwrap())
    }

    #[test]
    fn test_parse_statements() {
        let source = "set who = $player\nglobal visits = 1\ngreet $who \"welcome\" ${now}\nstop";
        let parsed = compile(source).unwrap();
        assert!(parsed.warnings.is_empty());
        assert_eq!(
            parsed.ast.body,
            vec![
                Stmt::Set {
                    name: "who".into(),
                    value: Expr::Var("player".into())
                },
                Stmt::Global {
                    name: "visits".into(),
                    value: Expr::Literal(Value::Int(1))
                },
                Stmt::Call {
                    verb: "greet".into(),
                    args: vec![
                        Expr::Var("who".into()),
                        Expr::Literal(Value::from("welcome")),
                        Expr::Placeholder("now".into()),
                    ],
                    line: 3,
                },
                Stmt::Stop,
            ]
        );
    }

    #[test]
    fn test_parse_if_else() {
        let parsed = compile("if $vip\n  log gold\nelse\n  log plain\nend\nlog done").unwrap();
        let body = parsed.ast.body;
        assert_eq!(body.len(), 2);
        match &body[0] {
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                assert_eq!(cond, &Expr::Var("vip".into()));
                assert_eq!(then.len(), 1);
                assert_eq!(otherwise.len(), 1);
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_warnings() {
        let parsed = compile("set event = 1\nstop\nlog never\nlog again").unwrap();
        let lines: Vec<_> = parsed.warnings.iter().map(|w| w.line).collect();
        assert_eq!(lines, vec![1, 3]);
        assert!(parsed.warnings[1].message.contains("line 2"));
    }

    #[test]
    fn test_stop_inside_branch_does_not_warn_outside() {
        let parsed = compile("if $x\nstop\nend\nlog after").unwrap();
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_errors() {
        assert_eq!(compile("set = 1").unwrap_err().message, "`set` needs a variable name");
        assert_eq!(compile("set x 1").unwrap_err().message, "expected `=`");
        assert_eq!(compile("if $x\nlog a").unwrap_err().message, "`if` without matching `end`");
        assert_eq!(compile("end").unwrap_err().message, "`end` outside of `if`");
        assert_eq!(compile("log a\n\"oops\"").unwrap_err().line, 2);
        assert!(compile("stop now").is_err());
    }
}
