use std::{path::Path, time::Duration};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{error::SettingsError, logging::LoggingConfig};

/// Префикс переменных окружения: `SUBPUB__SUBPUB__BUFFER_SIZE=300`.
const ENV_PREFIX: &str = "SUBPUB";
const ENV_SEPARATOR: &str = "__";

/// Настройки сетевого фронтенда.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub listen_addr: String,
}

/// Настройки шины сообщений.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// Ёмкость очереди каждой подписки.
    pub buffer_size: usize,
    /// Сколько ждать завершения воркеров при остановке.
    pub shutdown_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub subpub: BusSettings,
    pub logging: LoggingConfig,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl BusSettings {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Settings {
    /// Загружает настройки: значения по умолчанию, затем файл (если
    /// указан и существует), затем переменные окружения с префиксом
    /// `SUBPUB`.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with(path, Self::environment())
    }

    /// То же, что [`Settings::load`], но с явно заданным источником
    /// окружения.
    pub fn load_with(
        path: Option<&Path>,
        env: Environment,
    ) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            // Отсутствующий файл не ошибка: остаются умолчания и окружение.
            builder = builder.add_source(File::from(path).required(false));
        }

        let settings: Self = builder.add_source(env).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Источник переменных окружения процесса.
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.subpub.buffer_size == 0 {
            return Err(SettingsError::Invalid {
                field: "subpub.buffer_size",
                reason: "must be a positive integer".into(),
            });
        }
        if self.subpub.shutdown_timeout_ms == 0 {
            return Err(SettingsError::Invalid {
                field: "subpub.shutdown_timeout_ms",
                reason: "must be a positive integer".into(),
            });
        }
        if self.server.listen_addr.trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "server.listen_addr",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:50051".to_string(),
        }
    }
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            buffer_size: 100,
            shutdown_timeout_ms: 5_000,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
