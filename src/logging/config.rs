use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Формат вывода событий.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Настройки файлового sink'а (ежедневная ротация).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub dir: PathBuf,
    pub prefix: String,
    pub format: LogFormat,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень (`trace`, `debug`, `info`, ...).
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    /// Уровни для отдельных target'ов, например `subpub::pubsub = "debug"`.
    pub targets: BTreeMap<String, String>,
    /// Файловый sink; `None` — только консоль.
    pub file: Option<FileConfig>,
}

impl LoggingConfig {
    /// Директива для `EnvFilter`: базовый уровень плюс уровни target'ов.
    pub fn build_filter_directive(&self) -> String {
        let mut directive = self.level.clone();
        for (target, level) in &self.targets {
            directive.push(',');
            directive.push_str(target);
            directive.push('=');
            directive.push_str(level);
        }
        directive
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            prefix: "subpub.log".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            with_ansi: true,
            targets: BTreeMap::new(),
            file: None,
        }
    }
}
