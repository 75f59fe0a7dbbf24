// example_mixed — статическая запись и явный логгер пишут в один файл

use debuglog::{create_debug_logger, debug_log_message, glog, info, init_global, LogConfig, LogLevel};

const LOG_DIR: &str = "logs";
const SITE_KEY: &str = "example-site-key";

fn main() {
    // 1. Инициализация: конфигурация передаётся явно
    init_global(LogConfig::new(LOG_DIR).with_site_key(SITE_KEY));

    // 2. Старый стиль: статическая функция без логгера на руках
    if let Err(e) = debug_log_message("static-1") {
        eprintln!("[FATAL] Cannot write debug log: {}", e);
        std::process::exit(1);
    }

    // 3. Новый стиль: логгер из фабрики, тот же файл
    let logger = match create_debug_logger(None) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("[FATAL] Cannot create debug logger: {}", e);
            std::process::exit(1);
        }
    };

    // Ошибки не теряем: пишем в stderr и продолжаем
    if let Err(e) = glog!("static-{}", 2) {
        eprintln!("Failed to write debug log: {}", e);
    }
    if let Err(e) = info!(logger, "obj-{}", 1) {
        eprintln!("Failed to write debug log: {}", e);
    }
    if let Err(e) = debug_log_message("static-3") {
        eprintln!("Failed to write debug log: {}", e);
    }
    logger.log_or_escalate(LogLevel::Info, "obj-2");

    // 4. Отдельный поток с префиксом
    if let Ok(ipn) = create_debug_logger(Some("ipn")) {
        ipn.log_or_escalate(LogLevel::Notice, "payment notification received");
        println!("IPN log: {}", ipn.filename().display());
    }

    println!("Debug log: {}", logger.filename().display());
}
