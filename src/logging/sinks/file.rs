use std::fs;

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling::daily};
use tracing_subscriber::{layer::Layer as LayerTrait, registry::LookupSpan};

use crate::{
    error::LoggingError,
    logging::{config::FileConfig, formatter},
};

/// Файловый слой с ежедневной ротацией и неблокирующей записью.
///
/// Возвращённый `WorkerGuard` нужно держать до конца работы процесса:
/// при его drop буфер сбрасывается на диск.
pub fn layer<S>(
    config: &FileConfig
) -> Result<(Box<dyn LayerTrait<S> + Send + Sync>, WorkerGuard), LoggingError>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    fs::create_dir_all(&config.dir).map_err(|source| LoggingError::LogDir {
        path: config.dir.clone(),
        source,
    })?;

    let file_appender = daily(&config.dir, &config.prefix);
    let (writer, guard) = non_blocking(file_appender);

    let layer = formatter::build_formatter(config.format, false, writer);
    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    /// Тест проверяет, что слой создаёт каталог и пишет в файл с
    /// заданным префиксом.
    #[test]
    fn test_file_layer_writes_into_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = FileConfig {
            dir: dir.path().join("nested"),
            prefix: "test.log".into(),
            ..Default::default()
        };

        let (layer, guard) = layer::<Registry>(&cfg).unwrap();
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("line for the file sink");
        });
        drop(guard);

        let entries: Vec<_> = fs::read_dir(&cfg.dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(
            entries.iter().any(|name| name.starts_with("test.log")),
            "got: {entries:?}"
        );
    }
}
