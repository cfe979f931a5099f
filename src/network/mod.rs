//! Сетевой модуль: TCP-фронтенд сервиса с построчным текстовым
//! протоколом.
//!
//! ## Подмодули
//!
//! - `server`: приём соединений и остановка по сигналу.
//! - `connection`: разбор команд и обработка отдельного соединения.
//!
//! ## Протокол
//!
//! Команды разделяются переводом строки, ответы завершаются `\r\n`:
//!
//! - `PING` → `+PONG`
//! - `PUBLISH <key> <data...>` → `+OK`
//! - `SUBSCRIBE <key>` → `+OK`, затем поток строк `EVENT <key> <data>` до
//!   закрытия соединения клиентом
//! - `QUIT` → `+OK` и закрытие соединения
//!
//! Ошибки возвращаются как `-ERR <сообщение>`.

pub mod connection;
pub mod server;

pub use connection::Command;
pub use server::Server;
