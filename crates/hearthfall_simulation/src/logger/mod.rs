//! Глобальный logger симуляции.
//!
//! Вызовы идут через `crate::log(..)` / `crate::log_info(..)` и т.д.
//! Printer подменяемый (тесты, headless binary); по умолчанию всё уходит в `tracing`.

use once_cell::sync::Lazy;
use std::sync::{Mutex, MutexGuard};

static LOGGER: Lazy<Mutex<Option<Box<dyn LogPrinter>>>> = Lazy::new(|| Mutex::new(None));

pub static LOGGER_LEVEL: Lazy<Mutex<LogLevel>> = Lazy::new(|| Mutex::new(LogLevel::Debug));

// Poisoned mutex не должен ронять симуляцию из-за лога
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn set_logger(logger: Box<dyn LogPrinter>) {
    *lock(&LOGGER) = Some(logger);
}

pub fn set_log_level(level: LogLevel) {
    *lock(&LOGGER_LEVEL) = level;
}

pub fn set_logger_if_needed(logger: Box<dyn LogPrinter>) {
    let mut guard = lock(&LOGGER);
    if guard.is_none() {
        *guard = Some(logger);
    }
}

#[derive(Debug, Clone, Copy)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl PartialOrd for LogLevel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LogLevel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_int().cmp(&other.as_int())
    }
}

impl PartialEq for LogLevel {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for LogLevel {}

impl LogLevel {
    pub fn as_str(&self) -> &str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn as_int(&self) -> i32 {
        match self {
            LogLevel::Debug => 0,
            LogLevel::Info => 1,
            LogLevel::Warning => 2,
            LogLevel::Error => 3,
        }
    }
}

pub trait LogPrinter: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

pub fn log(message: &str) {
    log_with_level(LogLevel::Debug, message);
}

pub fn log_info(message: &str) {
    log_with_level(LogLevel::Info, message);
}

pub fn log_warning(message: &str) {
    log_with_level(LogLevel::Warning, message);
}

pub fn log_error(message: &str) {
    log_with_level(LogLevel::Error, message);
}

pub fn log_with_level(level: LogLevel, message: &str) {
    if level < *lock(&LOGGER_LEVEL) {
        return;
    }

    if let Some(logger) = lock(&LOGGER).as_ref() {
        logger.log(level, message);
    }
}

/// Printer по умолчанию: пробрасывает в `tracing` (subscriber ставит binary).
pub struct TracingLogger;

impl LogPrinter for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warning => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
    }
}

/// Printer для отладки без subscriber'а (timestamp добавляем сами).
pub struct ConsoleLogger;

impl LogPrinter for ConsoleLogger {
    fn log(&self, level: LogLevel, message: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        println!("[{}] [{}] {}", timestamp, level.as_str(), message);
    }
}

pub fn init_logger() {
    set_logger_if_needed(Box::new(TracingLogger));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct CapturePrinter(Arc<Mutex<Vec<String>>>);

    impl LogPrinter for CapturePrinter {
        fn log(&self, level: LogLevel, message: &str) {
            lock(&self.0).push(format!("{} {}", level.as_str(), message));
        }
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert_eq!(LogLevel::Info, LogLevel::Info);
    }

    #[test]
    fn test_level_filter_and_printer_swap() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        set_logger(Box::new(CapturePrinter(captured.clone())));
        set_log_level(LogLevel::Warning);

        log("debug message");
        log_warning("warning message");

        set_log_level(LogLevel::Debug);
        set_logger(Box::new(TracingLogger));

        let lines = lock(&captured);
        assert!(lines.iter().any(|l| l == "WARNING warning message"));
        assert!(!lines.iter().any(|l| l.contains("debug message")));
    }
}
