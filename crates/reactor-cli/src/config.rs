use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use reactor_engine::{ConfigLoadError, EngineConfig, TriggerDefinition, Value};
use serde::{Deserialize, Serialize};
use tracing::info;

const MAX_LOG_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to `<data dir>/logs/<component>.log`
    #[serde(default)]
    pub file: bool,

    /// Directive used when `RUST_LOG` is unset (default: "info")
    #[serde(default = "default_filter")]
    pub filter: String,

    /// The log file is truncated on startup once it grows past this
    #[serde(default = "default_max_size")]
    pub max_size_bytes: u64,
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_max_size() -> u64 {
    MAX_LOG_SIZE
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: false,
            filter: default_filter(),
            max_size_bytes: default_max_size(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReactorConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Variables visible to every activation
    #[serde(default)]
    pub shared: BTreeMap<String, toml::Value>,

    #[serde(default)]
    pub triggers: Vec<TriggerDefinition>,
}

pub const EXAMPLE_CONFIG: &str = r#"# Reactor configuration

[engine]
sync_timeout_ms = 3000

[logging]
file = false
filter = "info"

[shared]
server = "local"

[[triggers]]
name = "greet"
script = """
log "hello from" $server
say "Welcome," $player
cooldown 5
"""

[[triggers]]
name = "warp"
kind = "command"
sync = true
aliases = ["w"]
permissions = ["reactor.warp"]
script = """
if $args
  say "Warping to" $args
else
  say "Usage: warp <place>"
end
"""

[[triggers]]
name = "shop"
kind = "container"
slots = 9
items = [
  { slot = 0, kind = "bread", amount = 3 },
  { slot = 8, kind = "barrier", label = "Close" },
]
script = """
say $player $trigger $inventory
"""
"#;

impl ReactorConfig {
    /// `<config dir>/reactor.toml`, if a home directory can be found
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "reactor")
            .map(|dirs| dirs.config_dir().join("reactor.toml"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigLoadError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Write [`EXAMPLE_CONFIG`] to `path`, refusing to overwrite unless `force`
    pub fn write_example(path: &Path, force: bool) -> anyhow::Result<()> {
        if path.exists() && !force {
            anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, EXAMPLE_CONFIG)?;
        info!("Created example config at {}", path.display());
        Ok(())
    }

    /// The `[shared]` table converted to script values
    pub fn shared_vars(&self) -> Vec<(String, Value)> {
        self.shared
            .iter()
            .map(|(key, value)| (key.clone(), to_value(value)))
            .collect()
    }
}

/// Convert a TOML value into a script value
///
/// Tables have no script counterpart and are kept as their TOML text.
pub fn to_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::Str(dt.to_string()),
        toml::Value::Array(items) => Value::List(items.iter().map(to_value).collect()),
        toml::Value::Table(table) => Value::Str(table.to_string()),
    }
}

/// Parse a `key=value` CLI argument; integers, floats and booleans are
/// recognised, anything else is a string
pub fn parse_assignment(raw: &str) -> anyhow::Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected key=value, got `{}`", raw))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("empty variable name in `{}`", raw);
    }

    let value = value.trim();
    let value = if let Ok(i) = value.parse::<i64>() {
        Value::Int(i)
    } else if let Ok(f) = value.parse::<f64>() {
        Value::Float(f)
    } else if let Ok(b) = value.parse::<bool>() {
        Value::Bool(b)
    } else {
        Value::from(value)
    };
    Ok((key.to_string(), value))
}
