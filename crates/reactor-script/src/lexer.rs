use reactor_engine::LexError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Bare identifier: keywords, verb names, variable names after `set`
    Word(String),
    Str(String),
    Int(i64),
    Float(f64),
    /// `$name`
    Var(String),
    /// `${name}`
    Placeholder(String),
    Equals,
    Newline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl Cursor<'_> {
    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> LexError {
        LexError {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Split source into tokens, one `Newline` closing every non-empty line
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut cursor = Cursor {
        chars: source.chars().peekable(),
        line: 1,
        column: 1,
    };
    let mut tokens: Vec<Token> = Vec::new();

    while let Some(c) = cursor.peek() {
        let (line, column) = (cursor.line, cursor.column);
        let push = |tokens: &mut Vec<Token>, kind| tokens.push(Token { kind, line, column });

        match c {
            '\n' => {
                cursor.bump();
                if tokens.last().is_some_and(|t| t.kind != TokenKind::Newline) {
                    push(&mut tokens, TokenKind::Newline);
                }
            }
            c if c.is_whitespace() => {
                cursor.bump();
            }
            '#' => {
                cursor.take_while(|c| c != '\n');
            }
            '=' => {
                cursor.bump();
                push(&mut tokens, TokenKind::Equals);
            }
            '"' => {
                cursor.bump();
                let mut text = String::new();
                loop {
                    match cursor.bump() {
                        Some('"') => break,
                        Some('\\') => match cursor.bump() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(other @ ('"' | '\\')) => text.push(other),
                            Some(other) => {
                                return Err(cursor.error(
                                    cursor.line,
                                    cursor.column - 1,
                                    format!("unknown escape `\\{}`", other),
                                ));
                            }
                            None => return Err(cursor.error(line, column, "unterminated string")),
                        },
                        Some('\n') | None => {
                            return Err(cursor.error(line, column, "unterminated string"));
                        }
                        Some(other) => text.push(other),
                    }
                }
                push(&mut tokens, TokenKind::Str(text));
            }
            '$' => {
                cursor.bump();
                if cursor.peek() == Some('{') {
                    cursor.bump();
                    let name = cursor.take_while(is_ident);
                    if cursor.bump() != Some('}') || name.is_empty() {
                        return Err(cursor.error(
                            line,
                            column,
                            "malformed placeholder, expected `${name}`",
                        ));
                    }
                    push(&mut tokens, TokenKind::Placeholder(name));
                } else {
                    let name = cursor.take_while(is_ident);
                    if name.is_empty() {
                        return Err(cursor.error(
                            line,
                            column,
                            "expected a variable name after `$`",
                        ));
                    }
                    push(&mut tokens, TokenKind::Var(name));
                }
            }
            c if c.is_ascii_digit() || c == '-' => {
                let text = cursor.take_while(|c| c.is_ascii_digit() || c == '.' || c == '-');
                let invalid = || cursor.error(line, column, format!("invalid number `{}`", text));
                let kind = if text.contains('.') {
                    text.parse().map(TokenKind::Float).map_err(|_| invalid())?
                } else {
                    text.parse().map(TokenKind::Int).map_err(|_| invalid())?
                };
                push(&mut tokens, kind);
            }
            c if is_ident_start(c) => {
                let word = cursor.take_while(is_ident);
                push(&mut tokens, TokenKind::Word(word));
            }
            other => {
                return Err(cursor.error(line, column, format!("unexpected character `{}`", other)));
            }
        }
    }

    if tokens.last().is_some_and(|t| t.kind != TokenKind::Newline) {
        let (line, column) = (cursor.line, cursor.column);
        tokens.push(Token {
            kind: TokenKind::Newline,
            line,
            column,
        });
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_statement() {
        assert_eq!(
            kinds("set greeting = \"hi there\" # trailing\nsay $greeting ${now} 3 -1.5"),
            vec![
                TokenKind::Word("set".into()),
                TokenKind::Word("greeting".into()),
                TokenKind::Equals,
                TokenKind::Str("hi there".into()),
                TokenKind::Newline,
                TokenKind::Word("say".into()),
                TokenKind::Var("greeting".into()),
                TokenKind::Placeholder("now".into()),
                TokenKind::Int(3),
                TokenKind::Float(-1.5),
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_blank_lines_and_comments_collapse() {
        assert_eq!(
            kinds("\n\n# only a comment\n\nstop\n\n"),
            vec![TokenKind::Word("stop".into()), TokenKind::Newline]
        );
        assert!(kinds("").is_empty());
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            kinds(r#"log "a\"b\\c\nd""#)[1],
            TokenKind::Str("a\"b\\c\nd".into())
        );
    }

    #[test]
    fn test_positions() {
        let tokens = lex("stop\n  log $x").unwrap();
        let var = &tokens[3];
        assert_eq!(var.kind, TokenKind::Var("x".into()));
        assert_eq!((var.line, var.column), (2, 7));
    }

    #[test]
    fn test_errors() {
        let err = lex("log \"open").unwrap_err();
        assert_eq!((err.line, err.column), (1, 5));
        assert_eq!(err.message, "unterminated string");

        assert!(lex("log ${now").is_err());
        assert!(lex("log $").is_err());
        assert!(lex("log 1-2-").is_err());
        assert_eq!(lex("log @").unwrap_err().message, "unexpected character `@`");
    }
}
