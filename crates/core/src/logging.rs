//! Centralized logging configuration for the emulator.
//!
//! # Architecture
//!
//! - **LogConfig**: Thread-safe global configuration using atomic operations
//! - **LogLevel**: Hierarchical log levels (Off < Error < Warn < Info < Debug < Trace)
//! - **LogCategory**: Per-component categories (CPU, Bus, Video, Audio, ...)
//! - **log()**: Common logging function with lazy message construction
//!
//! Levels are normally configured once at startup from a filter string such
//! as `bus=debug,video=trace,info`, either directly with
//! [`LogConfig::apply_spec`] or from the `EMU_LOG` environment variable via
//! [`LogConfig::from_env`]. A bare level sets the global fallback; a
//! `category=level` pair overrides one category.
//!
//! # Usage
//!
//! ```rust
//! use emu_core::logging::{log, LogCategory, LogLevel};
//!
//! // Log with lazy evaluation (zero cost when disabled)
//! log(LogCategory::Bus, LogLevel::Debug, || {
//!     format!("bank switch at {:04X}", 0x6000)
//! });
//! ```

use std::collections::VecDeque;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Environment variable read by [`LogConfig::from_env`]
pub const LOG_ENV_VAR: &str = "EMU_LOG";

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

impl FromStr for LogLevel {
    type Err = LogSpecError;

    /// Parse log level from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Ok(LogLevel::Off),
            "error" | "err" | "1" => Ok(LogLevel::Error),
            "warn" | "warning" | "2" => Ok(LogLevel::Warn),
            "info" | "3" => Ok(LogLevel::Info),
            "debug" | "4" => Ok(LogLevel::Debug),
            "trace" | "5" => Ok(LogLevel::Trace),
            _ => Err(LogSpecError::UnknownLevel(s.to_string())),
        }
    }
}

/// Log category for different emulator components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// CPU execution and register state
    Cpu,
    /// Bus/memory access, slot and bank switching
    Bus,
    /// Video chip registers and rendering
    Video,
    /// Sound chip
    Audio,
    /// Interrupts and frame boundaries
    Interrupts,
    /// Save state chunks
    Snapshot,
    /// Unimplemented features/stubs
    Stubs,
}

impl LogCategory {
    pub const ALL: [LogCategory; 7] = [
        LogCategory::Cpu,
        LogCategory::Bus,
        LogCategory::Video,
        LogCategory::Audio,
        LogCategory::Interrupts,
        LogCategory::Snapshot,
        LogCategory::Stubs,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            LogCategory::Cpu => "cpu",
            LogCategory::Bus => "bus",
            LogCategory::Video => "video",
            LogCategory::Audio => "audio",
            LogCategory::Interrupts => "interrupts",
            LogCategory::Snapshot => "snapshot",
            LogCategory::Stubs => "stubs",
        }
    }
}

impl FromStr for LogCategory {
    type Err = LogSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        match lower.as_str() {
            "vdp" | "ppu" => return Ok(LogCategory::Video),
            "psg" | "apu" => return Ok(LogCategory::Audio),
            "irq" => return Ok(LogCategory::Interrupts),
            _ => {}
        }
        LogCategory::ALL
            .into_iter()
            .find(|c| c.name() == lower)
            .ok_or_else(|| LogSpecError::UnknownCategory(s.to_string()))
    }
}

const CATEGORY_COUNT: usize = LogCategory::ALL.len();

/// Errors from parsing a logging filter string
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogSpecError {
    #[error("unknown log level '{0}'")]
    UnknownLevel(String),
    #[error("unknown log category '{0}'")]
    UnknownCategory(String),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Per-category sliding window rate limiter
struct RateLimiter {
    max_logs_per_second: AtomicUsize,
    window: Mutex<[CategoryWindow; CATEGORY_COUNT]>,
}

#[derive(Default)]
struct CategoryWindow {
    timestamps: VecDeque<Instant>,
    dropped: usize,
    last_drop_report: Option<Instant>,
}

impl RateLimiter {
    fn new(max_logs_per_second: usize) -> Self {
        Self {
            max_logs_per_second: AtomicUsize::new(max_logs_per_second),
            window: Mutex::new(Default::default()),
        }
    }

    /// Returns (allowed, dropped_count) where dropped_count is Some(n) if
    /// a drop summary should be emitted now
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let mut windows = lock(&self.window);
        let w = &mut windows[category.index()];

        while let Some(&front) = w.timestamps.front() {
            if now.duration_since(front) > Duration::from_secs(1) {
                w.timestamps.pop_front();
            } else {
                break;
            }
        }

        if w.timestamps.len() < self.max_logs_per_second.load(Ordering::Relaxed) {
            w.timestamps.push_back(now);
            if w.dropped > 0 {
                let dropped = std::mem::take(&mut w.dropped);
                w.last_drop_report = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        w.dropped += 1;
        let due = w
            .last_drop_report
            .map_or(true, |last| now.duration_since(last) >= Duration::from_secs(1));
        if due {
            w.last_drop_report = Some(now);
            (false, Some(std::mem::take(&mut w.dropped)))
        } else {
            (false, None)
        }
    }
}

type Sink = Box<dyn Write + Send>;

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    category_levels: [AtomicU8; CATEGORY_COUNT],
    sink: Mutex<Option<Sink>>,
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// All logging disabled, 60 messages per second per category
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            category_levels: Default::default(),
            sink: Mutex::new(None),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.category_levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.category_levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category level other than Off wins over the global level.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.get_global_level()
        }
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Set the maximum logs per second per category
    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .max_logs_per_second
            .store(max_logs_per_second, Ordering::Relaxed);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.max_logs_per_second.load(Ordering::Relaxed)
    }

    /// Apply a comma separated filter such as `bus=debug,video=trace,info`.
    ///
    /// The whole string is validated before anything changes.
    pub fn apply_spec(&self, spec: &str) -> Result<(), LogSpecError> {
        let mut global = None;
        let mut overrides = Vec::new();
        for directive in spec.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.split_once('=') {
                Some((category, level)) => {
                    overrides.push((category.trim().parse()?, level.trim().parse()?));
                }
                None => global = Some(directive.parse()?),
            }
        }

        if let Some(level) = global {
            self.set_global_level(level);
        }
        for (category, level) in overrides {
            self.set_level(category, level);
        }
        Ok(())
    }

    /// Configure levels from `EMU_LOG` if it is set.
    pub fn from_env(&self) -> Result<(), LogSpecError> {
        match std::env::var(LOG_ENV_VAR) {
            Ok(spec) => self.apply_spec(&spec),
            Err(_) => Ok(()),
        }
    }

    /// Redirect output to `writer` instead of stderr
    pub fn set_writer(&self, writer: Sink) {
        *lock(&self.sink) = Some(writer);
    }

    /// Go back to stderr
    pub fn clear_writer(&self) {
        *lock(&self.sink) = None;
    }

    fn write_message(&self, message: &str) {
        let mut sink = lock(&self.sink);
        match sink.as_mut() {
            Some(writer) => {
                if writeln!(writer, "{}", message).is_err() {
                    eprintln!("{}", message);
                }
            }
            None => eprintln!("{}", message),
        }
    }

    fn emit<F>(&self, category: LogCategory, level: LogLevel, message_fn: F)
    where
        F: FnOnce() -> String,
    {
        if !self.should_log(category, level) {
            return;
        }
        let (allowed, dropped) = self.rate_limiter.should_allow(category);
        if let Some(count) = dropped.filter(|&n| n > 0) {
            self.write_message(&format!(
                "[{}] WARNING: Rate limit exceeded, {} log message(s) dropped in the last second",
                category.name(),
                count
            ));
        }
        if allowed {
            self.write_message(&format!("[{}] {:?}: {}", category.name(), level, message_fn()));
        }
    }
}

/// Log a message with the specified category and level
///
/// The message is lazily evaluated via a closure, so formatting only occurs
/// when logging is enabled for the given category and level. Each category
/// is rate limited; dropped messages are summarized once per second.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    LogConfig::global().emit(category, level, message_fn);
}
