pub mod config;
pub mod console;
pub mod logging;
pub mod session;

pub use config::{LoggingConfig, ReactorConfig};
pub use console::{CliEvent, Console, ConsoleHost};
pub use logging::init_logging;
pub use session::Session;
