//! Сервер subpub
//!
//! Поднимает шину сообщений и TCP-фронтенд построчного протокола,
//! останавливается по сигналу завершения.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use subpub::{init_logging, signals, Bus, ErrorExt, PubSubService, Server, Settings};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "subpub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "subpub - in-process publish/subscribe server", long_about = None)]
struct Cli {
    /// Путь к файлу настроек
    #[arg(
        short,
        long,
        env = "CONFIG_PATH",
        help = "Файл настроек (YAML/TOML/JSON); отсутствующий файл пропускается"
    )]
    config: Option<PathBuf>,
    /// Адрес прослушивания
    #[arg(short, long, help = "Переопределяет server.listen_addr из настроек")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(listen) = cli.listen {
        settings.server.listen_addr = listen;
    }

    let logging = init_logging(&settings.logging).context("failed to initialise logging")?;

    let bus = Bus::new(settings.subpub.buffer_size);
    let service = PubSubService::new(bus.clone());

    let server = Server::bind(&settings.server.listen_addr, service)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.listen_addr))?;
    info!(
        addr = %server.local_addr()?,
        buffer_size = settings.subpub.buffer_size,
        "subpub server listening"
    );

    server
        .run(async {
            if let Err(err) = signals::wait_for_shutdown_signal().await {
                warn!(error = %err, "Failed to install signal handlers, shutting down");
            }
        })
        .await;

    let timeout = settings.subpub.shutdown_timeout();
    match bus.close(timeout).await {
        Ok(()) => info!("subpub closed"),
        Err(err) => error!(
            error = %err,
            status = %err.status_code(),
            timeout_ms = settings.subpub.shutdown_timeout_ms,
            "subpub close did not finish in time"
        ),
    }

    logging.shutdown();
    Ok(())
}
