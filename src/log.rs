//! Process logging for taskplan.
//!
//! Diagnostics only: the simulation's execution log is data returned to the
//! caller and never goes through here.
//!
//! - ERROR: a command could not run (store unreadable, bad config)
//! - WARN: recoverable conditions (oracle failures, drain fallback, round cap)
//! - INFO: run start and finish
//! - DEBUG: round heartbeats and admission decisions
//! - TRACE: every execution event as it is appended
//!
//! `--debug` or `TASKPLAN_DEBUG=1` raises the level to DEBUG.
//! `TASKPLAN_LOG=<level>` picks any level explicitly and wins over both.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

const DEBUG_ENV: &str = "TASKPLAN_DEBUG";
const LEVEL_ENV: &str = "TASKPLAN_LOG";
const LOG_FILE: &str = "taskplan.log";

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static SINK: Mutex<Option<Sink>> = Mutex::new(None);

struct Sink {
    path: PathBuf,
    file: File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// Level implied by the CLI flag and the environment.
fn resolve_level(debug_flag: bool, debug_env: Option<&str>, level_env: Option<&str>) -> LogLevel {
    if let Some(level) = level_env.and_then(|v| v.parse().ok()) {
        return level;
    }
    let env_debug = debug_env
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if debug_flag || env_debug {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

/// Log to `~/.taskplan/taskplan.log`, truncating it.
///
/// Without a home directory logging stays disabled; the CLI still works.
pub fn init_with_debug(debug: bool) {
    let level = resolve_level(
        debug,
        std::env::var(DEBUG_ENV).ok().as_deref(),
        std::env::var(LEVEL_ENV).ok().as_deref(),
    );
    set_level(level);

    if let Some(dir) = dirs::home_dir().map(|h| h.join(".taskplan")) {
        if std::fs::create_dir_all(&dir).is_ok() {
            let _ = init_at(&dir.join(LOG_FILE));
        }
    }
}

/// Log to `path`, truncating it. Replaces any previous sink.
pub fn init_at(path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    if let Ok(mut sink) = SINK.lock() {
        *sink = Some(Sink {
            path: path.to_path_buf(),
            file,
        });
    }
    Ok(())
}

/// Where log lines currently go, if anywhere.
pub fn path() -> Option<PathBuf> {
    SINK.lock().ok()?.as_ref().map(|s| s.path.clone())
}

pub fn set_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::SeqCst);
}

pub fn level() -> LogLevel {
    LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
}

pub fn enabled(level: LogLevel) -> bool {
    level <= self::level()
}

/// Append one line at `level`. A poisoned or missing sink drops the line.
pub fn write(level: LogLevel, msg: &str) {
    if !enabled(level) {
        return;
    }
    if let Ok(mut guard) = SINK.lock() {
        if let Some(sink) = guard.as_mut() {
            let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
            let _ = writeln!(sink.file, "[{}] [{}] {}", timestamp, level.as_str(), msg);
        }
    }
}

#[macro_export]
macro_rules! tplog {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::LogLevel::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! tplog_error {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::LogLevel::Error, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! tplog_warn {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::LogLevel::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! tplog_debug {
    ($($arg:tt)*) => {
        if $crate::log::enabled($crate::log::LogLevel::Debug) {
            $crate::log::write($crate::log::LogLevel::Debug, &format!($($arg)*))
        }
    };
}

/// Skips formatting entirely below TRACE; it runs once per execution event.
#[macro_export]
macro_rules! tplog_trace {
    ($($arg:tt)*) => {
        if $crate::log::enabled($crate::log::LogLevel::Trace) {
            $crate::log::write($crate::log::LogLevel::Trace, &format!($($arg)*))
        }
    };
}
