// example_workers — несколько потоков, каждый со своим логгером на один файл

use debuglog::{DebugLogFactory, LogConfig, LogLevel, Logger};
use std::thread;
use std::time::Duration;

pub struct Worker {
    id: u32,
    log: Logger, // свой экземпляр, тот же путь
}

impl Worker {
    pub fn new(id: u32, log: Logger) -> Self {
        Self { id, log }
    }

    pub fn run(&self) {
        self.log
            .log_or_escalate(LogLevel::Info, &format!("Worker {} started", self.id));

        thread::sleep(Duration::from_millis(20 + (self.id as u64) * 30));

        if self.id % 2 == 1 {
            self.log.log_or_escalate(
                LogLevel::Warning,
                &format!("Worker {} detected odd workload", self.id),
            );
        }

        self.log
            .log_or_escalate(LogLevel::Info, &format!("Worker {} finished", self.id));
    }
}

fn main() {
    let factory = DebugLogFactory::new(LogConfig::new("logs").with_site_key("example-site-key"));

    let mut handles = vec![];
    for i in 0..4 {
        let logger = match factory.create_logger(Some("workers")) {
            Ok(l) => l,
            Err(e) => {
                eprintln!("[FATAL] Cannot create debug logger: {}", e);
                std::process::exit(1);
            }
        };
        handles.push(thread::spawn(move || Worker::new(i, logger).run()));
    }

    for h in handles {
        let _ = h.join();
    }

    if factory.failures() > 0 {
        eprintln!("{} log writes failed", factory.failures());
    }

    if let Ok(path) = factory.log_file_path(Some("workers")) {
        println!("All workers finished, see {}", path.display());
    }
}
