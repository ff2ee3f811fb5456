//! Logging bootstrap for embedding binaries.
//!
//! # Responsibility
//! - Start the process-wide stderr logger exactly once.
//! - Normalize user-supplied level names onto the supported set.
//!
//! # Invariants
//! - Re-initialization with the same level is a no-op.
//! - Re-initialization with a different level is rejected; the first
//!   configuration wins for the process lifetime.

use flexi_logger::{Logger, LoggerHandle};
use once_cell::sync::OnceCell;

static LOGGING: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: String,
    _handle: LoggerHandle,
}

/// Starts stderr logging at `level`.
///
/// Unknown level names fall back to `info`; `warning` is accepted as
/// an alias for `warn`.
pub fn init_logging(level: &str) -> Result<(), String> {
    let normalized = normalize_level(level);
    if let Some(state) = LOGGING.get() {
        if state.level == normalized {
            return Ok(());
        }
        return Err(format!(
            "logging already initialized with level `{}`, refusing `{normalized}`",
            state.level
        ));
    }

    let handle = Logger::try_with_str(&normalized)
        .map_err(|err| format!("invalid log level spec `{normalized}`: {err}"))?
        .log_to_stderr()
        .start()
        .map_err(|err| format!("cannot start logger: {err}"))?;

    LOGGING
        .set(LoggingState {
            level: normalized,
            _handle: handle,
        })
        .map_err(|_| "logging state already set".to_string())?;
    Ok(())
}

fn normalize_level(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    match lowered.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => lowered,
        "warning" => "warn".to_string(),
        _ => "info".to_string(),
    }
}
