use std::{
    fmt,
    future::Future,
    sync::{Arc, Weak},
};

use subpub_error::PushError;

use super::{
    bus::Shared,
    lifecycle::WorkerGuard,
    queue::{Queue, QueueReceiver},
    Message,
};

/// Внутреннее состояние подписки, разделяемое реестром, публикаторами
/// и пользовательским хендлом.
///
/// Мьютекс очереди служит собственным замком подписки: флаг закрытия
/// живёт под ним и не зависит от замка реестра.
#[derive(Debug)]
pub(crate) struct SubscriptionInner {
    id: u64,
    subject: Arc<str>,
    queue: Queue<Message>,
}

impl SubscriptionInner {
    pub(crate) fn new(
        id: u64,
        subject: Arc<str>,
        queue: Queue<Message>,
    ) -> Self {
        Self { id, subject, queue }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn subject(&self) -> &Arc<str> {
        &self.subject
    }

    pub(crate) fn push(
        &self,
        message: Message,
    ) -> Result<(), PushError> {
        self.queue.push(message)
    }

    /// Закрывает очередь подписки. `true` только для первого вызова.
    pub(crate) fn close(&self) -> bool {
        self.queue.close()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Хендл подписки на тему.
///
/// Подписка живёт, пока не будет вызван [`Subscription::unsubscribe`]
/// или не закроется шина. Drop хендла подписку не отменяет.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
    shared: Weak<Shared>,
}

impl Subscription {
    pub(crate) fn new(
        inner: Arc<SubscriptionInner>,
        shared: Weak<Shared>,
    ) -> Self {
        Self { inner, shared }
    }

    /// Отписка от темы.
    ///
    /// Закрывает очередь (воркер дообработает уже принятые сообщения и
    /// завершится), затем удаляет подписку из реестра. Повторные вызовы
    /// ничего не делают.
    pub fn unsubscribe(&self) {
        // После закрытия очередь не сообщает размер буфера.
        let pending = self.inner.pending();
        if !self.inner.close() {
            return;
        }

        if let Some(shared) = self.shared.upgrade() {
            shared.registry.remove(&self.inner);
        }

        tracing::debug!(
            subject = %self.inner.subject,
            subscription_id = self.inner.id,
            pending,
            "unsubscribed"
        );
    }

    /// Уникальный в пределах шины идентификатор подписки.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn subject(&self) -> &str {
        &self.inner.subject
    }

    /// Закрыта ли очередь подписки (отпиской или закрытием шины).
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("subject", &self.inner.subject)
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

/// Цикл воркера подписки.
///
/// Обработчик вызывается строго последовательно, по одному сообщению.
/// Цикл завершается, когда очередь закрыта и вычитана; `guard` при этом
/// уменьшает счётчик активных воркеров (в том числе при панике
/// обработчика).
pub(crate) async fn run_worker<F, Fut>(
    mut rx: QueueReceiver<Message>,
    handler: F,
    guard: WorkerGuard,
    subscription_id: u64,
) where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut handled = 0u64;
    while let Some(message) = rx.pop().await {
        handler(message).await;
        handled += 1;
    }

    tracing::trace!(subscription_id, handled, "subscription worker exited");
    drop(guard);
}
