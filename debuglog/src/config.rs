use crate::error::LogError;
use crate::level::LogLevel;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const DEFAULT_ROTATE_SIZE: u64 = 256 * 1024 * 1024;
const NO_SITE_KEY: &str = "NO_SITE_KEY";

// ===== Конфигурация =====

/// Всё, от чего зависит путь к файлу лога. Передаётся явно.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub domain_id: u32,
    pub site_key: Option<String>,
    pub base_url: String,
    pub hash_filenames: bool,
    pub rotate_size: Option<u64>,
    pub min_level: LogLevel,
}

impl LogConfig {
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Self {
        LogConfig {
            log_dir: log_dir.as_ref().to_path_buf(),
            domain_id: 1,
            site_key: None,
            base_url: String::new(),
            hash_filenames: true,
            rotate_size: Some(DEFAULT_ROTATE_SIZE),
            min_level: LogLevel::Debug,
        }
    }

    pub fn with_domain_id(mut self, domain_id: u32) -> Self {
        self.domain_id = domain_id;
        self
    }

    pub fn with_site_key(mut self, site_key: &str) -> Self {
        self.site_key = Some(site_key.to_owned());
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_owned();
        self
    }

    pub fn with_hash_filenames(mut self, enabled: bool) -> Self {
        self.hash_filenames = enabled;
        self
    }

    /// `None` отключает ротацию полностью.
    pub fn with_rotate_size(mut self, max_bytes: Option<u64>) -> Self {
        self.rotate_size = max_bytes;
        self
    }

    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Полный путь к файлу лога для префикса.
    pub fn log_file_path(&self, prefix: Option<&str>) -> Result<PathBuf, LogError> {
        Ok(self.log_dir.join(log_file_name(self, prefix)?))
    }
}

// ===== Имя файла =====

/// Короткий стабильный хеш конфигурации: 24 hex-символа из середины SHA-256.
pub fn generate_log_file_hash(config: &LogConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.site_key.as_deref().unwrap_or(NO_SITE_KEY).as_bytes());
    hasher.update([0u8]);
    hasher.update(config.base_url.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[8..32].to_owned()
}

/// `CiviCRM.<domain>_<prefix>.<hash>.log`; без префикса `CiviCRM.<domain>.<hash>.log`.
pub fn log_file_name(config: &LogConfig, prefix: Option<&str>) -> Result<String, LogError> {
    let mut name = format!("CiviCRM.{}", config.domain_id);

    if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
        validate_prefix(prefix)?;
        name.push('_');
        name.push_str(prefix);
    }

    if config.hash_filenames {
        name.push('.');
        name.push_str(&generate_log_file_hash(config));
    }

    name.push_str(".log");
    Ok(name)
}

fn validate_prefix(prefix: &str) -> Result<(), LogError> {
    let bad = prefix.contains("..")
        || prefix.chars().any(|c| c == '/' || c == '\\' || c.is_whitespace());
    if bad {
        return Err(LogError::InvalidPrefix(prefix.to_owned()));
    }
    Ok(())
}
