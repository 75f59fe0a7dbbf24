// example_backtrace — ошибка с цепочкой причин и бэктрейсом в лог

use debuglog::{capture, parse_exception_trace, DebugLogFactory, LogConfig, LogLevel};
use std::fmt;
use std::io;

const APP_NAME: &str = "example_backtrace";

#[derive(Debug)]
struct ImportError {
    row: usize,
    cause: io::Error,
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "import failed at row {}", self.row)
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

fn import_contacts() -> Result<(), ImportError> {
    Err(ImportError {
        row: 17,
        cause: io::Error::new(io::ErrorKind::UnexpectedEof, "truncated CSV"),
    })
}

fn main() {
    let factory = DebugLogFactory::with_system_log(
        LogConfig::new("logs").with_site_key("example-site-key"),
        APP_NAME,
    );

    let logger = match factory.create_logger(Some("import")) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("[FATAL] Cannot create debug logger: {}", e);
            std::process::exit(1);
        }
    };

    // Трасса текущего стека
    if let Err(e) = import_contacts() {
        let frames = capture();
        logger.log_or_escalate(LogLevel::Info, "capturing trace for failed import");
        if let Err(log_err) = logger.log_exception(LogLevel::Error, "Import aborted", &e, &frames) {
            eprintln!("Failed to log exception: {}", log_err);
        }
    }

    // Трасса, пришедшая снаружи в виде JSON
    let external = r#"[
        {"function": "run", "class": "CRM_Import_Parser", "type": "->", "file": "Parser.php", "line": 88},
        {"function": "connect", "class": "DB", "type": "::", "args": ["mysql://user:secret@db/civicrm"]}
    ]"#;
    match parse_exception_trace(external) {
        Ok(frames) => {
            let text = debuglog::format_backtrace(&frames);
            logger.log_or_escalate(LogLevel::Debug, &text);
        }
        Err(e) => eprintln!("Bad trace: {}", e),
    }

    println!("Failures: {}", factory.failures());
    println!("See {}", logger.filename().display());
}
