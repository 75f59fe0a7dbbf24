mod config;
mod error;
mod level;
mod system;
mod trace;

pub use config::{generate_log_file_hash, log_file_name, LogConfig};
pub use error::LogError;
pub use level::{global_log_level, set_global_log_level, LogLevel};
pub use system::SystemChannel;
pub use trace::{
    capture, format_backtrace, format_backtrace_with, format_text_exception, parse_backtrace,
    parse_debug_trace, parse_exception_trace, ArgValue, CallType, DebugTraceFrame,
    ExceptionTraceFrame, FormatOptions, StackFrame,
};

use chrono::{DateTime, Local};
use level::should_log;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::error::Error;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const APP_NAME: &str = "debuglog";

// ===== Логгер =====

/// Логгер, привязанный к одному файлу. Каждая запись открывает файл на
/// дозапись, пишет строку целиком и закрывает его; буфера между вызовами нет,
/// поэтому разные логгеры одного файла чередуются в порядке вызовов.
#[derive(Debug, Clone)]
pub struct Logger {
    path: PathBuf,
    min_level: LogLevel,
    channel: Arc<SystemChannel>,
    failures: Arc<AtomicUsize>,
}

impl Logger {
    pub fn filename(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, level: LogLevel, message: &str) -> Result<(), LogError> {
        if !should_log(level, self.min_level) {
            return Ok(());
        }
        let line = format_log_line(level, message);
        append_line(&self.path, &line)
    }

    pub fn debug(&self, message: &str) -> Result<(), LogError> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> Result<(), LogError> {
        self.log(LogLevel::Info, message)
    }

    pub fn notice(&self, message: &str) -> Result<(), LogError> {
        self.log(LogLevel::Notice, message)
    }

    pub fn warning(&self, message: &str) -> Result<(), LogError> {
        self.log(LogLevel::Warning, message)
    }

    pub fn error(&self, message: &str) -> Result<(), LogError> {
        self.log(LogLevel::Error, message)
    }

    /// Сообщение и текст ошибки с бэктрейсом одной записью.
    pub fn log_exception<E: Error + ?Sized>(
        &self,
        level: LogLevel,
        message: &str,
        err: &E,
        frames: &[StackFrame],
    ) -> Result<(), LogError> {
        let text = format!("{}\n{}", message, format_text_exception(err, frames));
        self.log(level, &text)
    }

    /// Как `log`, но сбой учитывается в счётчике фабрики и уходит в
    /// системный канал. Возвращает `true`, если запись удалась.
    pub fn log_or_escalate(&self, level: LogLevel, message: &str) -> bool {
        match self.log(level, message) {
            Ok(()) => true,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                self.channel
                    .report(LogLevel::Error, &format!("Failed to write debug log: {}", e));
                false
            }
        }
    }
}

fn format_log_line(level: LogLevel, message: &str) -> String {
    let now = Local::now();
    format!(
        "[{}] [{}] {}\n",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level.as_str(),
        message.trim_end_matches(|c: char| c == '\r' || c == '\n')
    )
}

fn append_line(path: &Path, line: &str) -> Result<(), LogError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir).map_err(|source| LogError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
    }

    // Дескриптор живёт только внутри этого блока и закрывается при любом выходе.
    let write = || -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.flush()
    };

    write().map_err(|source| LogError::Write {
        path: path.to_path_buf(),
        source,
    })
}

// ===== Фабрика логгеров =====

/// Выдаёт логгеры по префиксу. Путь для префикса вычисляется один раз и
/// запоминается; при первом вычислении устаревший файл ротируется.
#[derive(Debug)]
pub struct DebugLogFactory {
    config: LogConfig,
    paths: Mutex<HashMap<String, PathBuf>>,
    channel: Arc<SystemChannel>,
    failures: Arc<AtomicUsize>,
}

impl DebugLogFactory {
    pub fn new(config: LogConfig) -> Self {
        Self::with_channel(config, SystemChannel::stderr_only(APP_NAME))
    }

    /// Фабрика, сообщающая о своих сбоях в syslog.
    pub fn with_system_log(config: LogConfig, app_name: &str) -> Self {
        Self::with_channel(config, SystemChannel::new(app_name))
    }

    fn with_channel(config: LogConfig, channel: SystemChannel) -> Self {
        DebugLogFactory {
            config,
            paths: Mutex::new(HashMap::new()),
            channel: Arc::new(channel),
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Количество записей, потерянных через `Logger::log_or_escalate`.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn log_file_path(&self, prefix: Option<&str>) -> Result<PathBuf, LogError> {
        let key = prefix.unwrap_or_default().to_owned();
        let mut paths = self.paths.lock().unwrap();
        if let Some(path) = paths.get(&key) {
            return Ok(path.clone());
        }

        let path = self.config.log_file_path(prefix)?;
        if let Err(e) = self.rotate_if_stale(&path) {
            // Ротация не обязательна: продолжаем писать в старый файл.
            self.channel.report(LogLevel::Warning, &e.to_string());
        }
        paths.insert(key, path.clone());
        Ok(path)
    }

    pub fn create_logger(&self, prefix: Option<&str>) -> Result<Logger, LogError> {
        Ok(Logger {
            path: self.log_file_path(prefix)?,
            min_level: self.config.min_level,
            channel: Arc::clone(&self.channel),
            failures: Arc::clone(&self.failures),
        })
    }

    /// Запись в файл по умолчанию без удержания логгера.
    pub fn log_message(&self, message: &str) -> Result<(), LogError> {
        self.log_message_with(message, None, LogLevel::Info)
    }

    pub fn log_message_with(
        &self,
        message: &str,
        prefix: Option<&str>,
        level: LogLevel,
    ) -> Result<(), LogError> {
        self.create_logger(prefix)?.log(level, message)
    }

    fn rotate_if_stale(&self, path: &Path) -> Result<(), LogError> {
        let Some(max_bytes) = self.config.rotate_size else {
            return Ok(());
        };
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(_) => return Ok(()),
        };

        let now = Local::now();
        let stale_month = match meta.modified() {
            Ok(modified) => {
                let modified: DateTime<Local> = modified.into();
                modified.format("%Y%m").to_string() < now.format("%Y%m").to_string()
            }
            Err(_) => false,
        };

        if !stale_month && meta.len() <= max_bytes {
            return Ok(());
        }

        let mut rotated = path.as_os_str().to_owned();
        rotated.push(format!(".{}", now.format("%Y%m%d%H%M")));
        fs::rename(path, &rotated).map_err(|source| LogError::Rotate {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ===== Глобальная фабрика =====

static GLOBAL_FACTORY: Lazy<Mutex<Option<Arc<DebugLogFactory>>>> =
    Lazy::new(|| Mutex::new(None));

/// Задаёт конфигурацию для статических функций. Повторный вызов заменяет
/// фабрику вместе с запомненными путями.
pub fn init_global(config: LogConfig) {
    init_global_factory(DebugLogFactory::new(config));
}

pub fn init_global_factory(factory: DebugLogFactory) {
    *GLOBAL_FACTORY.lock().unwrap() = Some(Arc::new(factory));
}

fn global_factory() -> Result<Arc<DebugLogFactory>, LogError> {
    GLOBAL_FACTORY
        .lock()
        .unwrap()
        .as_ref()
        .map(Arc::clone)
        .ok_or(LogError::NotInitialized)
}

pub fn create_debug_logger(prefix: Option<&str>) -> Result<Logger, LogError> {
    global_factory()?.create_logger(prefix)
}

pub fn debug_log_message(message: &str) -> Result<(), LogError> {
    global_factory()?.log_message(message)
}

pub fn debug_log_message_with(
    message: &str,
    prefix: Option<&str>,
    level: LogLevel,
) -> Result<(), LogError> {
    global_factory()?.log_message_with(message, prefix, level)
}

// ===== Макросы =====

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::LogLevel::Debug, &format!($($arg)*))
    };
}
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::LogLevel::Info, &format!($($arg)*))
    };
}
#[macro_export]
macro_rules! notice {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::LogLevel::Notice, &format!($($arg)*))
    };
}
#[macro_export]
macro_rules! warning {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::LogLevel::Warning, &format!($($arg)*))
    };
}
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::LogLevel::Error, &format!($($arg)*))
    };
}
#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::LogLevel::Critical, &format!($($arg)*))
    };
}

// ===== Глобальные макросы =====

#[macro_export]
macro_rules! glog {
    ($($arg:tt)*) => {
        $crate::debug_log_message(&format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn factory(dir: &TempDir) -> DebugLogFactory {
        DebugLogFactory::new(LogConfig::new(dir.path()).with_site_key("test-key"))
    }

    #[test]
    fn test_same_prefix_same_path() {
        let dir = TempDir::new().unwrap();
        let factory = factory(&dir);
        let a = factory.create_logger(Some("my-test")).unwrap();
        let b = factory.create_logger(Some("my-test")).unwrap();
        assert_eq!(a.filename(), b.filename());

        let hash = generate_log_file_hash(factory.config());
        let expected = dir.path().join(format!("CiviCRM.1_my-test.{}.log", hash));
        assert_eq!(a.filename(), expected.as_path());
    }

    #[test]
    fn test_separate_factories_agree_on_path() {
        let dir = TempDir::new().unwrap();
        let a = factory(&dir).create_logger(None).unwrap();
        let b = factory(&dir).create_logger(None).unwrap();
        assert_eq!(a.filename(), b.filename());
    }

    #[test]
    fn test_line_format() {
        let dir = TempDir::new().unwrap();
        let logger = factory(&dir).create_logger(Some("my-test")).unwrap();
        logger.info("Mary had a little lamb").unwrap();
        logger.info("Little lamb").unwrap();

        let contents = fs::read_to_string(logger.filename()).unwrap();
        assert!(contents.find("[info] Mary had a little lamb").unwrap() > 10);
        assert!(contents.contains("[info] Little lamb"));

        let re = Regex::new(r"^\[\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3}\] \[info\] Little lamb$").unwrap();
        assert!(contents.lines().any(|l| re.is_match(l)));
    }

    #[test]
    fn test_trailing_newline_not_doubled() {
        let dir = TempDir::new().unwrap();
        let logger = factory(&dir).create_logger(None).unwrap();
        logger.info("with newline\n").unwrap();
        let contents = fs::read_to_string(logger.filename()).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.ends_with("with newline\n"));
    }

    #[test]
    fn test_interleaved_loggers_keep_call_order() {
        let dir = TempDir::new().unwrap();
        let factory = factory(&dir);
        factory.log_message("static-1").unwrap();
        let first = factory.create_logger(None).unwrap();
        factory.log_message("static-2").unwrap();
        first.info("obj-1").unwrap();
        factory.log_message("static-3").unwrap();
        let second = factory.create_logger(None).unwrap();
        second.info("obj-2").unwrap();
        factory.log_message("static-4").unwrap();

        let contents = fs::read_to_string(first.filename()).unwrap();
        let re = Regex::new(r"(?s)static-1.*static-2.*obj-1.*static-3.*obj-2.*static-4").unwrap();
        assert!(re.is_match(&contents));
        assert_eq!(contents.lines().count(), 6);
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let logger = DebugLogFactory::new(LogConfig::new(&nested))
            .create_logger(None)
            .unwrap();
        logger.info("hello").unwrap();
        assert!(logger.filename().starts_with(&nested));
        assert!(logger.filename().exists());
    }

    #[test]
    fn test_unusable_directory_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();

        let factory = DebugLogFactory::new(LogConfig::new(blocker.join("logs")));
        let logger = factory.create_logger(None).unwrap();
        assert!(matches!(logger.info("lost"), Err(LogError::CreateDir { .. })));

        assert!(!logger.log_or_escalate(LogLevel::Info, "lost again"));
        assert_eq!(factory.failures(), 1);
    }

    #[test]
    fn test_min_level_filters_before_io() {
        let dir = TempDir::new().unwrap();
        let factory = DebugLogFactory::new(LogConfig::new(dir.path()).with_min_level(LogLevel::Notice));
        let logger = factory.create_logger(None).unwrap();
        logger.debug("noise").unwrap();
        assert!(!logger.filename().exists());
        logger.warning("kept").unwrap();
        assert!(fs::read_to_string(logger.filename()).unwrap().contains("[warning] kept"));
    }

    #[test]
    fn test_invalid_prefix() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            factory(&dir).create_logger(Some("../up")),
            Err(LogError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn test_oversized_file_rotated_on_first_use() {
        let dir = TempDir::new().unwrap();
        let config = LogConfig::new(dir.path()).with_rotate_size(Some(16));
        let path = config.log_file_path(None).unwrap();
        fs::write(&path, "x".repeat(64)).unwrap();

        let factory = DebugLogFactory::new(config);
        let logger = factory.create_logger(None).unwrap();
        assert!(!logger.filename().exists());

        let rotated: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".log."))
            .collect();
        assert_eq!(rotated.len(), 1);

        // путь уже запомнен, повторной ротации нет
        fs::write(logger.filename(), "y".repeat(64)).unwrap();
        let again = factory.create_logger(None).unwrap();
        assert_eq!(fs::read_to_string(again.filename()).unwrap().len(), 64);
    }

    #[test]
    fn test_last_month_file_rotated() {
        let dir = TempDir::new().unwrap();
        let config = LogConfig::new(dir.path());
        let path = config.log_file_path(Some("cron")).unwrap();
        fs::write(&path, "old\n").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(62 * 24 * 3600))
            .unwrap();
        drop(file);

        let logger = DebugLogFactory::new(config).create_logger(Some("cron")).unwrap();
        assert!(!logger.filename().exists());
    }

    #[test]
    fn test_rotation_disabled() {
        let dir = TempDir::new().unwrap();
        let config = LogConfig::new(dir.path()).with_rotate_size(None);
        let path = config.log_file_path(None).unwrap();
        fs::write(&path, "x".repeat(1024)).unwrap();
        let logger = DebugLogFactory::new(config).create_logger(None).unwrap();
        assert!(logger.filename().exists());
    }

    #[test]
    fn test_log_exception_single_entry() {
        let dir = TempDir::new().unwrap();
        let logger = factory(&dir).create_logger(None).unwrap();
        let err = io::Error::new(io::ErrorKind::NotFound, "the error");
        let frames = vec![StackFrame::new("civicrm_invoke").at("civicrm.module", 10)];
        logger
            .log_exception(LogLevel::Notice, "There was an error!", &err, &frames)
            .unwrap();

        let contents = fs::read_to_string(logger.filename()).unwrap();
        assert_eq!(contents.matches("[notice]").count(), 1);
        assert!(contents.contains("[notice] There was an error!\n"));
        assert!(contents.contains(": \"the error\""));
        assert!(contents.contains("#0 civicrm_invoke()  called at [civicrm.module:10]"));
    }

    #[test]
    fn test_macros_format_arguments() {
        let dir = TempDir::new().unwrap();
        let logger = factory(&dir).create_logger(Some("macro")).unwrap();
        crate::info!(logger, "contact {} saved", 42).unwrap();
        crate::error!(logger, "{} failed", "sync").unwrap();
        let contents = fs::read_to_string(logger.filename()).unwrap();
        assert!(contents.contains("[info] contact 42 saved"));
        assert!(contents.contains("[error] sync failed"));
    }

    #[test]
    fn test_every_level_macro_writes_its_tag() {
        let dir = TempDir::new().unwrap();
        let logger = factory(&dir).create_logger(Some("levels")).unwrap();
        crate::debug!(logger, "d{}", 1).unwrap();
        crate::notice!(logger, "n{}", 2).unwrap();
        crate::warning!(logger, "w{}", 3).unwrap();
        crate::critical!(logger, "c{}", 4).unwrap();
        let contents = fs::read_to_string(logger.filename()).unwrap();
        let re = Regex::new(r"(?s)\[debug\] d1.*\[notice\] n2.*\[warning\] w3.*\[critical\] c4").unwrap();
        assert!(re.is_match(&contents));
    }
}
