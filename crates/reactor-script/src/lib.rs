//! Line-oriented scripting language for reactor triggers
//!
//! One statement per line: `set`, `global`, `if`/`else`/`end`, `stop`, or a
//! verb call. Arguments are literals, `$variables` or `${placeholders}`.

pub mod builtins;
pub mod interpreter;
pub mod lexer;
pub mod parser;

pub use interpreter::ReactorScript;
pub use lexer::{Token, TokenKind};
pub use parser::{Expr, Program, Stmt};

use reactor_engine::{BuildError, Engine, EngineBuilder};

/// Builder for an engine running [`ReactorScript`]
pub fn engine_builder() -> EngineBuilder<ReactorScript> {
    Engine::builder(ReactorScript::new())
}

/// Build the engine and register the standard verbs and placeholders
pub fn build_engine(
    builder: EngineBuilder<ReactorScript>,
) -> Result<Engine<ReactorScript>, BuildError> {
    let engine = builder.build()?;
    builtins::install(engine.extensions());
    Ok(engine)
}
