use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::CompileError;
use crate::language::{Language, Warning};

/// Source text together with the AST derived from it
///
/// A unit is never edited in place. Recompiling builds a new unit, and the
/// owning trigger swaps it in only once the compile succeeds.
pub struct ScriptUnit<L: Language> {
    name: String,
    source: String,
    ast: L::Ast,
    location: Option<PathBuf>,
    warnings: Vec<Warning>,
}

impl<L: Language> ScriptUnit<L> {
    /// Lex and parse `source`
    ///
    /// Warnings do not fail the compile; they are logged and kept on the unit.
    pub fn compile(
        language: &L,
        name: impl Into<String>,
        source: impl Into<String>,
        location: Option<PathBuf>,
    ) -> Result<Self, CompileError> {
        let name = name.into();
        let source = source.into();

        let tokens = language.lex(&source).map_err(|source| CompileError::Lex {
            script: name.clone(),
            source,
        })?;
        let parsed = language
            .parse(tokens)
            .map_err(|source| CompileError::Parse {
                script: name.clone(),
                source,
            })?;

        for warning in &parsed.warnings {
            warn!(
                target: "script",
                "Script `{}` line {}: {}",
                name,
                warning.line,
                warning.message
            );
        }
        debug!(target: "script", "Compiled script `{}`", name);

        Ok(Self {
            name,
            source,
            ast: parsed.ast,
            location,
            warnings: parsed.warnings,
        })
    }

    /// Compile `source` under `name` as a replacement for this unit, keeping
    /// its location
    pub fn recompile(
        &self,
        language: &L,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self, CompileError> {
        Self::compile(language, name, source, self.location.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &L::Ast {
        &self.ast
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

impl<L: Language> fmt::Debug for ScriptUnit<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptUnit")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockLanguage;

    #[test]
    fn test_compile_keeps_source_and_warnings() {
        let unit = ScriptUnit::compile(
            &MockLanguage,
            "greet",
            "warn unused\ncall hello",
            Some(PathBuf::from("triggers/greet.rs")),
        )
        .unwrap();

        assert_eq!(unit.name(), "greet");
        assert_eq!(unit.source(), "warn unused\ncall hello");
        assert_eq!(unit.ast().len(), 2);
        assert_eq!(unit.location(), Some(Path::new("triggers/greet.rs")));
        assert_eq!(unit.warnings().len(), 1);
        assert_eq!(unit.warnings()[0].line, 1);
    }

    #[test]
    fn test_lex_and_parse_failures_are_tagged() {
        let lex = ScriptUnit::compile(&MockLanguage, "bad", "!oops", None).unwrap_err();
        assert!(matches!(lex, CompileError::Lex { ref script, .. } if script == "bad"));

        let parse = ScriptUnit::compile(&MockLanguage, "bad", "jump", None).unwrap_err();
        assert!(matches!(parse, CompileError::Parse { .. }));
    }

    #[test]
    fn test_recompile_leaves_original_untouched_on_failure() {
        let unit = ScriptUnit::compile(&MockLanguage, "door", "call open", None).unwrap();

        assert!(unit.recompile(&MockLanguage, "door", "jump").is_err());
        assert_eq!(unit.source(), "call open");

        let next = unit.recompile(&MockLanguage, "gate", "call close").unwrap();
        assert_eq!(next.name(), "gate");
        assert_eq!(next.source(), "call close");
        assert_eq!(unit.name(), "door");
    }
}
