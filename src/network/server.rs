use std::{future::Future, io, net::SocketAddr, time::Duration};

use tokio::{net::TcpListener, select, sync::watch, task::JoinSet, time::timeout};
use tracing::{debug, info, warn};

use super::connection::ConnectionHandler;
use crate::service::PubSubService;

/// Сколько ждать закрытия открытых соединений после остановки приёма.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP-сервер построчного протокола.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    service: PubSubService,
    drain_timeout: Duration,
}

impl Server {
    pub async fn bind(
        addr: &str,
        service: PubSubService,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            service,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        })
    }

    /// Задаёт время ожидания закрытия соединений при остановке.
    pub fn with_drain_timeout(
        mut self,
        drain_timeout: Duration,
    ) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Принимает соединения, пока не завершится `shutdown`.
    ///
    /// После остановки приёма активные соединения получают сигнал,
    /// отправляют клиенту уведомление и закрываются; их подписки
    /// снимаются. Возврат происходит, когда все соединения закрыты или
    /// истёк `drain_timeout` (оставшиеся задачи тогда прерываются).
    pub async fn run<F>(
        self,
        shutdown: F,
    ) where
        F: Future<Output = ()>,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        let mut connection_id: u32 = 0;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => break,
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(err) = joined {
                        warn!(error = %err, "Connection task failed");
                    }
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, addr)) => {
                        connection_id = connection_id.wrapping_add(1);
                        info!(connection_id, %addr, "Connection established");

                        let handler = ConnectionHandler::new(
                            connection_id,
                            socket,
                            addr,
                            self.service.clone(),
                            shutdown_rx.clone(),
                        );
                        connections.spawn(async move {
                            match handler.run().await {
                                Ok(()) => debug!(connection_id, %addr, "Connection closed"),
                                Err(err) => warn!(connection_id, %addr, error = %err, "Connection closed with error"),
                            }
                        });
                    }
                    Err(err) => {
                        warn!(error = %err, "Failed to accept connection");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }

        drop(self.listener);
        info!(
            active_connections = connections.len(),
            "Server stopped accepting connections"
        );
        let _ = shutdown_tx.send(true);

        let drained = timeout(self.drain_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => info!("All connections closed gracefully"),
            Err(_) => {
                warn!(
                    stuck = connections.len(),
                    timeout_ms = self.drain_timeout.as_millis() as u64,
                    "Shutdown timeout reached, aborting remaining connections"
                );
                connections.shutdown().await;
            }
        }
    }
}
