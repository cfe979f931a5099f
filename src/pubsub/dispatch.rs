use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use bytes::Bytes;
use subpub_error::PushError;

use super::{subscription::SubscriptionInner, Message};

/// Снимок статистики публикаций.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Общее количество вызовов `publish`.
    pub published: u64,
    /// Сообщения, принятые в очереди подписчиков.
    pub delivered: u64,
    /// Сообщения, отброшенные из-за заполненного буфера.
    pub dropped: u64,
}

/// Алгоритм публикации: попытка неблокирующей вставки в очередь каждого
/// подписчика из снимка.
#[derive(Debug, Default)]
pub(crate) struct Dispatcher {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Раздаёт `payload` подписчикам.
    ///
    /// Публикатор никогда не ждёт: при заполненной очереди сообщение для
    /// этого подписчика отбрасывается с записью в лог, остальные
    /// подписчики получают его как обычно.
    pub(crate) fn dispatch(
        &self,
        subject: &str,
        subscribers: &[Arc<SubscriptionInner>],
        payload: Bytes,
    ) {
        self.published.fetch_add(1, Ordering::Relaxed);

        let Some(first) = subscribers.first() else {
            return;
        };
        let message = Message::new(first.subject().clone(), payload);

        for subscriber in subscribers {
            match subscriber.push(message.clone()) {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(PushError::Full) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        subject,
                        subscription_id = subscriber.id(),
                        "subpub buffer is full, message dropped"
                    );
                }
                Err(PushError::Closed) => {
                    // Гонка с отпиской или закрытием шины допустима.
                    tracing::trace!(
                        subject,
                        subscription_id = subscriber.id(),
                        "subscriber closed during publish"
                    );
                }
            }
        }
    }

    pub(crate) fn stats(&self) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
