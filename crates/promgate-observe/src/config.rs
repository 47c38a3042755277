use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::object::{LoggerFormat, LoggerLevel};

/// Logger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directives, e.g. `"info"` or `"promgate_http=debug,info"`.
    pub level: LoggerLevel,
    /// Print event targets (module paths).
    pub with_targets: bool,
    /// Color text output; ignored unless stdout is a terminal.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            with_targets: true,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// `use_color` and stdout is a terminal. Evaluate at init time, not at parse time.
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }
}
