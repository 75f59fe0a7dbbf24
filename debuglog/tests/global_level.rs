// Глобальный порог действует на весь процесс: отдельный бинарник.

use debuglog::{global_log_level, set_global_log_level, DebugLogFactory, LogConfig, LogLevel};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_global_threshold_filters_every_logger() {
    assert_eq!(global_log_level(), LogLevel::Debug);

    let dir = TempDir::new().unwrap();
    let factory = DebugLogFactory::new(LogConfig::new(dir.path()));
    let logger = factory.create_logger(None).unwrap();

    set_global_log_level(LogLevel::Warning);
    assert_eq!(global_log_level(), LogLevel::Warning);
    logger.info("dropped").unwrap();
    logger.debug("dropped too").unwrap();
    assert!(!logger.filename().exists());

    logger.error("kept").unwrap();
    factory.log_message("static dropped").unwrap();

    set_global_log_level(LogLevel::Debug);
    logger.debug("back again").unwrap();

    let contents = fs::read_to_string(logger.filename()).unwrap();
    assert!(!contents.contains("dropped"));
    assert!(contents.contains("[error] kept"));
    assert!(contents.contains("[debug] back again"));
    assert_eq!(contents.lines().count(), 2);
}
