use std::{io, net::SocketAddr, time::Duration};

use subpub_error::{ErrorExt, ServiceError};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    select,
    sync::{mpsc, watch},
    time::timeout,
};
use tracing::{debug, trace, warn};

use crate::service::{Event, PubSubService};

/// Таймаут записи ответа.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// Ёмкость канала между обработчиком подписки и сокетом.
const STREAM_BUFFER: usize = 64;

/// Команда построчного протокола.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Quit,
    Publish { key: String, data: String },
    Subscribe { key: String },
}

impl Command {
    /// Разбирает одну строку запроса. Имя команды регистронезависимо.
    pub fn parse(line: &str) -> Result<Self, ServiceError> {
        let line = line.trim();
        let (name, rest) = match line.split_once(' ') {
            Some((name, rest)) => (name, rest.trim_start()),
            None => (line, ""),
        };

        match name.to_ascii_uppercase().as_str() {
            "PING" => Ok(Self::Ping),
            "QUIT" => Ok(Self::Quit),
            "PUBLISH" => {
                let (key, data) = rest.split_once(' ').unwrap_or((rest, ""));
                if key.is_empty() {
                    return Err(ServiceError::MissingKey);
                }
                Ok(Self::Publish {
                    key: key.to_string(),
                    data: data.to_string(),
                })
            }
            "SUBSCRIBE" => {
                if rest.is_empty() {
                    return Err(ServiceError::MissingKey);
                }
                if rest.contains(char::is_whitespace) {
                    return Err(ServiceError::Protocol(
                        "SUBSCRIBE takes exactly one key".into(),
                    ));
                }
                Ok(Self::Subscribe {
                    key: rest.to_string(),
                })
            }
            "" => Err(ServiceError::Protocol("empty command".into())),
            other => Err(ServiceError::Protocol(format!("unknown command '{other}'"))),
        }
    }
}

/// Строка `EVENT <key> <data>` для потока подписки.
///
/// Обратная косая черта в данных удваивается, CR и LF заменяются на
/// `\r` и `\n`: одно сообщение шины всегда занимает одну строку
/// протокола.
pub fn event_frame(event: &Event) -> String {
    let data = String::from_utf8_lossy(&event.data);
    let mut line = String::with_capacity(7 + event.key.len() + data.len());
    line.push_str("EVENT ");
    line.push_str(&event.key);
    line.push(' ');
    for ch in data.chars() {
        match ch {
            '\\' => line.push_str("\\\\"),
            '\r' => line.push_str("\\r"),
            '\n' => line.push_str("\\n"),
            other => line.push(other),
        }
    }
    line
}

/// Обработчик отдельного соединения.
pub(crate) struct ConnectionHandler {
    connection_id: u32,
    addr: SocketAddr,
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    service: PubSubService,
    shutdown: watch::Receiver<bool>,
}

impl ConnectionHandler {
    pub(crate) fn new(
        connection_id: u32,
        socket: TcpStream,
        addr: SocketAddr,
        service: PubSubService,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        // Разделяем socket на части для чтения и записи
        let (read_half, write_half) = socket.into_split();
        Self {
            connection_id,
            addr,
            lines: BufReader::new(read_half).lines(),
            writer: write_half,
            service,
            shutdown,
        }
    }

    /// Основной цикл обработки соединения: команды до `QUIT`, закрытия
    /// клиентом, остановки сервера или перехода в режим подписки.
    pub(crate) async fn run(mut self) -> Result<(), ServiceError> {
        loop {
            select! {
                _ = self.shutdown.changed() => {
                    self.send("-ERR Server shutting down").await?;
                    return Ok(());
                }
                line = self.lines.next_line() => {
                    let Some(line) = line? else {
                        debug!(connection_id = self.connection_id, addr = %self.addr, "Client closed connection");
                        return Ok(());
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    trace!(connection_id = self.connection_id, command = line.trim(), "Received command");

                    match Command::parse(&line) {
                        Ok(Command::Ping) => self.send("+PONG").await?,
                        Ok(Command::Quit) => {
                            self.send("+OK").await?;
                            return Ok(());
                        }
                        Ok(Command::Publish { key, data }) => match self.service.publish(&key, data) {
                            Ok(()) => self.send("+OK").await?,
                            Err(err) => self.send_error(&err).await?,
                        },
                        Ok(Command::Subscribe { key }) => return self.stream(&key).await,
                        Err(err) => self.send_error(&err).await?,
                    }
                }
            }
        }
    }

    /// Режим подписки: события темы пишутся в сокет, пока клиент не
    /// закроет соединение, сервер не остановится или шина не закроется.
    async fn stream(
        mut self,
        key: &str,
    ) -> Result<(), ServiceError> {
        let (tx, mut rx) = mpsc::channel::<Event>(STREAM_BUFFER);
        let guard = match self.service.open_stream(key, tx) {
            Ok(guard) => guard,
            Err(err) => return self.send_error(&err).await,
        };
        self.send("+OK").await?;
        debug!(connection_id = self.connection_id, key, "Connection switched to streaming");

        loop {
            select! {
                event = rx.recv() => {
                    // Отправители живут в обработчике подписки: `None`
                    // означает, что воркер завершился (шина закрыта).
                    let Some(event) = event else { break };
                    self.send(&event_frame(&event)).await?;
                }
                line = self.lines.next_line() => match line {
                    // Во время стрима входящие строки игнорируются.
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => break,
                },
                _ = self.shutdown.changed() => {
                    // Клиент мог уже уйти; ошибка записи здесь не важна.
                    let _ = self.send("-ERR Server shutting down").await;
                    break;
                }
            }
        }

        guard.close();
        Ok(())
    }

    async fn send_error(
        &mut self,
        err: &ServiceError,
    ) -> Result<(), ServiceError> {
        warn!(connection_id = self.connection_id, error = %err, "Request failed");
        let line = format!("-ERR {}", err.client_message());
        self.send(&line).await
    }

    async fn send(
        &mut self,
        line: &str,
    ) -> Result<(), ServiceError> {
        let frame = format!("{line}\r\n");
        match timeout(WRITE_TIMEOUT, self.writer.write_all(frame.as_bytes())).await {
            Ok(res) => res.map_err(ServiceError::from),
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timeout").into()),
        }
    }
}
