// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Structured logging setup shared by all netcell crates.

use std::io::Write;
use std::process;
use std::str::FromStr;

use slog::{o, Drain, Level};

/// Creates a logger which prints output to the terminal (standard error),
/// for interactive use by the control binary.
pub fn create_term_logger(level: Level) -> (slog::Logger, slog_async::AsyncGuard) {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator)
        .build()
        .filter_level(level)
        .fuse();

    let (drain, guard) = slog_async::Async::new(drain).build_with_guard();
    let logger = slog::Logger::root(drain.fuse(), o!());

    (logger, guard)
}

/// Creates a JSON logger writing to the given writer, with the standard
/// identification fields attached to every record.
pub fn create_logger<W>(
    name: &str,
    source: &str,
    level: Level,
    writer: W,
) -> (slog::Logger, slog_async::AsyncGuard)
where
    W: Write + Send + Sync + 'static,
{
    let drain = slog_json::Json::new(writer)
        .add_default_keys()
        .build()
        .filter_level(level)
        .fuse();

    let (drain, guard) = slog_async::Async::new(drain).build_with_guard();
    let logger = slog::Logger::root(
        drain.fuse(),
        o!(
            "version" => env!("CARGO_PKG_VERSION"),
            "name" => name.to_string(),
            "source" => source.to_string(),
            "pid" => process::id().to_string(),
        ),
    );

    (logger, guard)
}

/// Parses a log level name ("trace", "debug", "info", ...) into a
/// `slog::Level`.
pub fn level_from_str(level: &str) -> Result<Level, String> {
    Level::from_str(level).map_err(|_| format!("invalid log level: {:?}", level))
}

/// Defines a local macro (named by the first argument) which returns the
/// scope logger annotated with the given subsystem name. Crates invoke this
/// once at the top of their `lib.rs`:
///
/// ```ignore
/// logging::logger_with_subsystem!(sl, "fabric");
/// ```
///
/// and then log with `info!(sl!(), "...")`.
#[macro_export]
macro_rules! logger_with_subsystem {
    ($name:ident, $subsystem:expr) => {
        macro_rules! $name {
            () => {
                slog_scope::logger().new(slog::o!("subsystem" => $subsystem))
            };
        }
    };
}
