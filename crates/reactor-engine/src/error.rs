use std::error::Error as StdError;
use std::path::PathBuf;
use std::time::Duration;

/// Raised by a [`crate::Language`] lexer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}, column {column}: {message}")]
pub struct LexError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Raised by a [`crate::Language`] parser
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

/// The shared extension maps could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("the engine owning the extension maps has shut down")]
    EngineGone,
}

/// Script text could not be turned into a runnable form
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("failed to lex script `{script}`")]
    Lex {
        script: String,
        #[source]
        source: LexError,
    },
    #[error("failed to parse script `{script}`")]
    Parse {
        script: String,
        #[source]
        source: ParseError,
    },
    #[error("failed to compile script `{script}`")]
    Bind {
        script: String,
        #[source]
        source: BindError,
    },
}

/// Failure while a compiled script is being interpreted
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("unknown verb `{0}`")]
    UnknownVerb(String),
    #[error("unknown placeholder `{0}`")]
    UnknownPlaceholder(String),
    #[error("verb `{name}` failed")]
    Verb {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("placeholder `{name}` failed")]
    Placeholder {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("{0}")]
    Message(String),
    #[error("script panicked: {0}")]
    Panicked(String),
}

/// Everything that reaches the [`crate::ExceptionSink`]
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("Trigger [{trigger}] produced an error!")]
    Runtime {
        trigger: String,
        #[source]
        source: ScriptError,
    },
    #[error("Took too long to process Trigger [{trigger}]! Is the main thread lagging? (waited {budget:?})")]
    TimedOut { trigger: String, budget: Duration },
    #[error("Could not bind Trigger [{trigger}]!")]
    Bind {
        trigger: String,
        #[source]
        source: BindError,
    },
    #[error("Main thread is not accepting work for Trigger [{trigger}]!")]
    MainThreadGone { trigger: String },
}

impl TriggerError {
    pub fn trigger(&self) -> &str {
        match self {
            TriggerError::Runtime { trigger, .. }
            | TriggerError::TimedOut { trigger, .. }
            | TriggerError::Bind { trigger, .. }
            | TriggerError::MainThreadGone { trigger } => trigger,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TriggerError::TimedOut { .. })
    }
}

/// Trigger construction failures
#[derive(Debug, thiserror::Error)]
pub enum TriggerInitError {
    #[error("Failed to initialize Trigger [{trigger}]!")]
    Compile {
        trigger: String,
        #[source]
        source: CompileError,
    },
    #[error("container size {slots} must be a non-zero multiple of 9 no larger than {max}")]
    InvalidSlots { slots: usize, max: usize },
    #[error("container Trigger [{trigger}] has no slot count")]
    MissingSlots { trigger: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read config {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

/// Errors building an [`crate::Engine`]
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to start the async worker pool")]
    Runtime(#[source] std::io::Error),
    #[error("failed to spawn the main thread")]
    MainThread(#[source] std::io::Error),
}

/// Render an error with its full cause chain: `outer: inner: root`
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        cause = inner.source();
    }
    out
}
