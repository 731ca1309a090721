use flexi_logger::{Logger, LoggerHandle};

use crate::error::{Error, Result};

/// Logs to stderr at `base_level` unless `RUST_LOG` says otherwise.
/// Keep the returned handle alive for the lifetime of the program.
pub fn setup_logging(base_level: &str) -> Result<LoggerHandle> {
    Logger::try_with_env_or_str(base_level)
        .map_err(|e| Error::Configuration(format!("invalid log specification '{}': {}", base_level, e)))?
        .log_to_stderr()
        .start()
        .map_err(|e| Error::Configuration(format!("logger initialization failed: {}", e)))
}

pub fn level_for(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}
