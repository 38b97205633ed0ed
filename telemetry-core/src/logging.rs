//! Structured logging, built the way `flux::logging` already builds it: a `sloggers`
//! `LoggerConfig` deserialized from a small TOML fragment via `serdeconv`, yielding a root
//! `slog::Logger`. Re-exports the `slog` macros so call sites elsewhere in this crate write
//! `logging::warn!(log, "..."; "key" => value)`.

pub use slog::{debug, error, info, o, trace, warn, Logger};

use sloggers::Config;

/// Destination for diagnostic output. `Terminal` is the default; `Null` is used in tests so
/// the test suite doesn't spam stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    Terminal,
    Null,
}

/// Builds the root logger. Setup failures here (a malformed level string, say) are
/// programmer errors in this crate, not host misconfiguration, so this panics rather than
/// returning a `SetupError`, mirroring `flux::logging::init`'s own `.unwrap()`.
pub fn init(destination: LogDestination, level: &str) -> Logger {
    let toml = match destination {
        LogDestination::Terminal => format!(
            "type = \"terminal\"\nlevel = \"{level}\"\ndestination = \"stderr\"",
            level = level
        ),
        LogDestination::Null => "type = \"null\"".to_string(),
    };

    let config: sloggers::LoggerConfig =
        serdeconv::from_toml_str(&toml).expect("invalid logger configuration");

    config.build_logger().expect("failed to build logger")
}

/// A logger that discards everything, for call sites (tests, `Default` impls) that need a
/// `Logger` but don't care where it goes.
pub fn discard() -> Logger {
    Logger::root(slog::Discard, o!())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_destination_builds_without_panicking() {
        let log = init(LogDestination::Null, "debug");
        info!(log, "smoke test");
    }

    #[test]
    fn discard_logger_is_silent() {
        let log = discard();
        warn!(log, "nobody sees this");
    }
}
