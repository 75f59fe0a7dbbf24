use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

// ===== Уровни логгирования =====

/// Уровни важности в порядке syslog: `Emergency` самый серьёзный.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Emergency => "emergency",
            LogLevel::Alert => "alert",
            LogLevel::Critical => "critical",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Notice => "notice",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    fn from_index(index: usize) -> LogLevel {
        match index {
            0 => LogLevel::Emergency,
            1 => LogLevel::Alert,
            2 => LogLevel::Critical,
            3 => LogLevel::Error,
            4 => LogLevel::Warning,
            5 => LogLevel::Notice,
            6 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== Глобальный уровень фильтрации =====

static GLOBAL_LOG_LEVEL: AtomicUsize = AtomicUsize::new(LogLevel::Debug as usize); // по умолчанию всё

/// Порог для всего процесса; поверх него действует `LogConfig::min_level`.
pub fn set_global_log_level(level: LogLevel) {
    GLOBAL_LOG_LEVEL.store(level as usize, Ordering::SeqCst);
}

pub fn global_log_level() -> LogLevel {
    LogLevel::from_index(GLOBAL_LOG_LEVEL.load(Ordering::SeqCst))
}

pub(crate) fn should_log(level: LogLevel, min_level: LogLevel) -> bool {
    level <= min_level && level <= global_log_level()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_tags_are_lowercase() {
        assert_eq!(LogLevel::Info.as_str(), "info");
        assert_eq!(LogLevel::Emergency.to_string(), "emergency");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(LogLevel::Error < LogLevel::Info);
        assert!(should_log(LogLevel::Error, LogLevel::Warning));
        assert!(!should_log(LogLevel::Debug, LogLevel::Info));
    }

    #[test]
    fn test_index_round_trip() {
        assert_eq!(LogLevel::from_index(LogLevel::Notice as usize), LogLevel::Notice);
        assert_eq!(LogLevel::from_index(99), LogLevel::Debug);
    }
}
