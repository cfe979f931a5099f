//! Подсистема Publish–Subscribe (pub/sub).
//!
//! Внутрипроцессная шина: темы (строковые ключи) отображаются на очереди
//! подписчиков, публикация раздаёт сообщение всем текущим подписчикам
//! темы.
//!
//! - `bus`: фасад [`Bus`] — подписка, публикация, закрытие.
//! - `queue` (приватный): ограниченная FIFO-очередь подписчика.
//! - `subscription`: хендл [`Subscription`] и цикл воркера.
//! - `registry` (приватный): тема → список подписок под одним замком.
//! - `dispatch`: алгоритм публикации и [`BusStats`].
//! - `lifecycle` (приватный): счётчик воркеров и закрытие с дедлайном.
//! - `message`: [`Message`].

pub mod bus;
pub mod dispatch;
mod lifecycle;
pub mod message;
mod queue;
mod registry;
pub mod subscription;

pub use bus::Bus;
pub use dispatch::BusStats;
pub use message::Message;
pub use subscription::Subscription;
