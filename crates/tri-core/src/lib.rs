// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

pub mod events;

/// Logs an unrecoverable condition. Does not stop the process: callers still
/// have to return their failure and let the top level decide.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {
        ::tracing::error!(fatal = true, $($arg)+)
    };
}

/// The six severities the engine logs with. `Fatal` has no tracing
/// counterpart and is emitted as a tagged `error` event by [`fatal!`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Fatal,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Fatal,
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Fatal => "fatal",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// EnvFilter directive that lets this level and everything above through.
    pub fn filter_directive(self) -> &'static str {
        match self {
            LogLevel::Fatal | LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown log level `{0}` (expected fatal, error, warn, info, debug or trace)")]
pub struct LogLevelError(pub String);

impl FromStr for LogLevel {
    type Err = LogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LogLevelError(s.to_owned()))
    }
}

/// Installs the global fmt subscriber. `RUST_LOG` takes precedence over
/// `default_level`. Safe to call more than once.
pub fn init_tracing(default_level: LogLevel) {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.filter_directive()));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_level_case_insensitively() {
        for level in LogLevel::ALL {
            assert_eq!(level.as_str().parse::<LogLevel>(), Ok(level));
            assert_eq!(
                level.as_str().to_uppercase().parse::<LogLevel>(),
                Ok(level)
            );
        }
        assert_eq!(" debug ".parse::<LogLevel>(), Ok(LogLevel::Debug));
    }

    #[test]
    fn rejects_unknown_level() {
        let err = "verbose".parse::<LogLevel>().unwrap_err();
        assert_eq!(err, LogLevelError("verbose".into()));
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn fatal_filters_like_error() {
        assert_eq!(LogLevel::Fatal.filter_directive(), "error");
        assert_eq!(LogLevel::Trace.filter_directive(), "trace");
        assert!(LogLevel::Fatal < LogLevel::Trace);
    }

    #[test]
    fn init_twice_is_harmless() {
        init_tracing(LogLevel::Warn);
        init_tracing(LogLevel::Trace);
        fatal!("still running after {}", "fatal");
    }
}
