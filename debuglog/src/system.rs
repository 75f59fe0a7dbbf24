use crate::level::LogLevel;
use std::sync::Mutex;

// ===== Системный канал (платформозависимо) =====

#[cfg(target_os = "linux")]
type SystemLogger = syslog::Logger<syslog::LoggerBackend, syslog::Formatter3164>;

/// Запасной канал для сбоев, которые некому вернуть: syslog на Linux,
/// stderr на остальных платформах.
pub struct SystemChannel {
    app_name: String,
    #[cfg(target_os = "linux")]
    logger: Option<Mutex<SystemLogger>>,
    #[cfg(not(target_os = "linux"))]
    logger: Option<Mutex<()>>,
}

impl SystemChannel {
    pub fn new(app_name: &str) -> Self {
        SystemChannel {
            app_name: app_name.to_owned(),
            logger: Self::init_system_logger(app_name),
        }
    }

    /// Канал без syslog, только stderr.
    pub fn stderr_only(app_name: &str) -> Self {
        SystemChannel {
            app_name: app_name.to_owned(),
            logger: None,
        }
    }

    #[cfg(target_os = "linux")]
    fn init_system_logger(app_name: &str) -> Option<Mutex<SystemLogger>> {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_USER,
            hostname: None,
            process: app_name.to_owned(),
            pid: std::process::id(),
        };
        syslog::unix(formatter).ok().map(Mutex::new)
    }

    #[cfg(not(target_os = "linux"))]
    fn init_system_logger(_app_name: &str) -> Option<Mutex<()>> {
        None
    }

    pub fn report(&self, level: LogLevel, message: &str) {
        if !self.report_to_system(level, message) {
            eprintln!("[{}] [{}] {}", self.app_name, level, message);
        }
    }

    #[cfg(target_os = "linux")]
    fn report_to_system(&self, level: LogLevel, message: &str) -> bool {
        let Some(ref logger) = self.logger else {
            return false;
        };
        let mut logger = logger.lock().unwrap();
        let result = match level {
            LogLevel::Emergency => logger.emerg(message),
            LogLevel::Alert => logger.alert(message),
            LogLevel::Critical => logger.crit(message),
            LogLevel::Error => logger.err(message),
            LogLevel::Warning => logger.warning(message),
            LogLevel::Notice => logger.notice(message),
            LogLevel::Info => logger.info(message),
            LogLevel::Debug => logger.debug(message),
        };
        result.is_ok()
    }

    #[cfg(not(target_os = "linux"))]
    fn report_to_system(&self, _level: LogLevel, _message: &str) -> bool {
        false
    }
}

impl std::fmt::Debug for SystemChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemChannel")
            .field("app_name", &self.app_name)
            .field("syslog", &self.logger.is_some())
            .finish()
    }
}
