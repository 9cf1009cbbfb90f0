use reactor_engine::{
    Flow, Interception, Interpreter, Interrupter, Language, LexError, ParseError, Parsed,
    ScriptError, Value,
};

use crate::lexer::{self, Token};
use crate::parser::{self, Expr, Program, Stmt};

/// The reference trigger language
#[derive(Debug, Default, Clone, Copy)]
pub struct ReactorScript;

impl ReactorScript {
    pub fn new() -> Self {
        Self
    }
}

impl Language for ReactorScript {
    type Token = Token;
    type Ast = Program;

    fn lex(&self, source: &str) -> Result<Vec<Token>, LexError> {
        lexer::lex(source)
    }

    fn parse(&self, tokens: Vec<Token>) -> Result<Parsed<Program>, ParseError> {
        parser::parse(tokens)
    }

    fn run(
        &self,
        ast: &Program,
        interp: &mut Interpreter,
        interrupter: &mut dyn Interrupter,
    ) -> Result<(), ScriptError> {
        Machine { interp, interrupter }.block(&ast.body)?;
        Ok(())
    }
}

struct Machine<'a, 'i> {
    interp: &'a mut Interpreter,
    interrupter: &'a mut (dyn Interrupter + 'i),
}

impl Machine<'_, '_> {
    fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            // Unbound variables read as null
            Expr::Var(name) => Ok(self.interp.var(name).cloned().unwrap_or_default()),
            Expr::Placeholder(name) => self.interp.resolve_placeholder(name, &[]),
        }
    }

    fn block(&mut self, body: &[Stmt]) -> Result<Flow, ScriptError> {
        for stmt in body {
            if self.stmt(stmt)? == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<Flow, ScriptError> {
        match stmt {
            Stmt::Set { name, value } => {
                let value = self.eval(value)?;
                self.interp.set_var(name.clone(), value);
                Ok(Flow::Continue)
            }
            Stmt::Global { name, value } => {
                let value = self.eval(value)?;
                self.interp.set_global(name.clone(), value);
                Ok(Flow::Continue)
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.is_truthy() {
                    self.block(then)
                } else {
                    self.block(otherwise)
                }
            }
            Stmt::Stop => Ok(Flow::Stop),
            Stmt::Call { verb, args, line } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;

                match self.interrupter.intercept(&mut *self.interp, verb, &args)? {
                    Interception::Handled => return Ok(Flow::Continue),
                    Interception::Stop => return Ok(Flow::Stop),
                    Interception::Pass => {}
                }

                tracing::trace!(target: "script", "line {}: {} {:?}", line, verb, args);
                self.interp.call_verb(verb, &args)
            }
        }
    }
}
