use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::Bytes;
use subpub_error::BusResult;

use super::{
    dispatch::{BusStats, Dispatcher},
    lifecycle::{self, WorkerTracker},
    queue,
    registry::Registry,
    subscription::{self, Subscription, SubscriptionInner},
    Message,
};

/// Состояние шины, разделяемое клонами [`Bus`] и хендлами подписок.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) registry: Registry,
    workers: Arc<WorkerTracker>,
    dispatcher: Dispatcher,
    capacity: usize,
    next_id: AtomicU64,
}

/// Внутрипроцессная шина publish/subscribe.
///
/// Каждая подписка обслуживается собственной tokio-задачей, которая
/// вычитывает ограниченную очередь и последовательно вызывает обработчик.
/// Публикация никогда не блокируется: если очередь подписчика заполнена,
/// сообщение для него отбрасывается (at-most-once).
///
/// `Bus` дешево клонируется; все клоны работают с одной и той же шиной.
#[derive(Debug, Clone)]
pub struct Bus {
    shared: Arc<Shared>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Bus {
    /// Создаёт шину, в которой очередь каждой подписки вмещает
    /// `capacity` сообщений.
    ///
    /// # Panics
    /// Паникует, если `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "subpub buffer capacity must be positive");
        Self {
            shared: Arc::new(Shared {
                registry: Registry::new(),
                workers: Arc::new(WorkerTracker::new()),
                dispatcher: Dispatcher::new(),
                capacity,
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Подписывает `handler` на тему `subject`.
    ///
    /// Обработчик вызывается один раз на каждое принятое сообщение, строго
    /// последовательно, до отписки или закрытия шины.
    ///
    /// # Errors
    /// [`BusError::AlreadyClosed`](subpub_error::BusError::AlreadyClosed),
    /// если шина уже закрыта.
    ///
    /// # Panics
    /// Воркер запускается через `tokio::spawn`, поэтому метод нужно
    /// вызывать внутри Tokio runtime.
    pub fn subscribe<F, Fut>(
        &self,
        subject: &str,
        handler: F,
    ) -> BusResult<Subscription>
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (queue, rx) = queue::bounded(self.shared.capacity);
        let inner = Arc::new(SubscriptionInner::new(id, Arc::from(subject), queue));

        let guard = self
            .shared
            .registry
            .insert(inner.clone(), &self.shared.workers)?;
        tokio::spawn(subscription::run_worker(rx, handler, guard, id));

        tracing::debug!(subject, subscription_id = id, "subscribed");
        Ok(Subscription::new(inner, Arc::downgrade(&self.shared)))
    }

    /// Публикует `payload` всем текущим подписчикам темы.
    ///
    /// Всегда завершается успехом: отсутствие подписчиков, переполненные
    /// очереди и закрытая шина ошибкой не считаются.
    pub fn publish(
        &self,
        subject: &str,
        payload: impl Into<Bytes>,
    ) -> BusResult<()> {
        let subscribers = self.shared.registry.snapshot(subject);
        self.shared
            .dispatcher
            .dispatch(subject, &subscribers, payload.into());
        Ok(())
    }

    /// Закрывает шину и ждёт завершения воркеров не дольше `deadline`.
    ///
    /// См. [`Bus::close_with`].
    pub async fn close(
        &self,
        deadline: Duration,
    ) -> BusResult<()> {
        self.close_with(tokio::time::sleep(deadline)).await
    }

    /// Закрывает шину и ждёт завершения воркеров, пока не завершится
    /// `cancel`.
    ///
    /// Повторный вызов (в том числе во время ожидания первого) сразу
    /// возвращает `Ok(())`. Шина считается закрытой с момента первого
    /// вызова, даже если он вернул ошибку: новые подписки отклоняются, а
    /// уже принятые сообщения дообрабатываются в фоне.
    ///
    /// # Errors
    /// [`BusError::DeadlineExceeded`](subpub_error::BusError::DeadlineExceeded),
    /// если `cancel` завершился раньше воркеров.
    pub async fn close_with<F>(
        &self,
        cancel: F,
    ) -> BusResult<()>
    where
        F: Future<Output = ()>,
    {
        lifecycle::shutdown(&self.shared.registry, &self.shared.workers, cancel).await
    }

    pub fn is_closed(&self) -> bool {
        self.shared.registry.is_closed()
    }

    /// Ёмкость очереди каждой подписки.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn stats(&self) -> BusStats {
        self.shared.dispatcher.stats()
    }

    /// Количество подписок на тему.
    pub fn subscriber_count(
        &self,
        subject: &str,
    ) -> usize {
        self.shared.registry.subscriber_count(subject)
    }

    /// Количество тем, на которые есть хотя бы одна подписка.
    pub fn subject_count(&self) -> usize {
        self.shared.registry.subject_count()
    }

    /// Количество воркеров, которые ещё не завершились.
    pub fn active_workers(&self) -> usize {
        self.shared.workers.active()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use subpub_error::BusError;
    use tokio::{sync::mpsc, time::timeout};

    use super::*;

    fn collecting_handler(
        tx: mpsc::UnboundedSender<Message>
    ) -> impl Fn(Message) -> std::future::Ready<()> + Send + Sync + 'static {
        move |msg| {
            let _ = tx.send(msg);
            std::future::ready(())
        }
    }

    /// Тест проверяет доставку сообщений в порядке публикации.
    #[tokio::test]
    async fn test_publish_and_receive_in_order() {
        let bus = Bus::new(10);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = bus.subscribe("test", collecting_handler(tx)).unwrap();

        bus.publish("test", "msg1").unwrap();
        bus.publish("test", "msg2").unwrap();

        for expected in ["msg1", "msg2"] {
            let msg = timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("timed out")
                .expect("no message");
            assert_eq!(&*msg.subject, "test");
            assert_eq!(msg.payload_lossy(), expected);
        }

        let stats = bus.stats();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.dropped, 0);
    }

    /// Тест проверяет, что публикация в тему без подписчиков — no-op.
    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = Bus::new(5);
        bus.publish("nochan", "z").unwrap();
        assert_eq!(bus.subject_count(), 0);
        assert_eq!(bus.stats().delivered, 0);
    }

    /// Тест проверяет, что сообщения одной темы не попадают в другую.
    #[tokio::test]
    async fn test_subjects_are_isolated() {
        let bus = Bus::new(5);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = bus.subscribe("a", collecting_handler(tx)).unwrap();

        bus.publish("b", "other").unwrap();
        bus.publish("a", "mine").unwrap();

        let msg = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload_lossy(), "mine");
        assert!(rx.try_recv().is_err());
    }

    /// Тест проверяет, что подписка на закрытую шину отклоняется.
    #[tokio::test]
    async fn test_subscribe_after_close() {
        let bus = Bus::new(5);
        bus.close(Duration::from_secs(1)).await.unwrap();
        assert!(bus.is_closed());

        let err = bus.subscribe("test", |_| async {}).unwrap_err();
        assert_eq!(err, BusError::AlreadyClosed);
        assert_eq!(err.to_string(), "subpub is closed");
    }

    /// Тест проверяет, что после успешного закрытия обработчик больше не
    /// вызывается, а публикация остаётся no-op.
    #[tokio::test]
    async fn test_no_delivery_after_close() {
        let bus = Bus::new(5);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _sub = bus
            .subscribe("t", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            })
            .unwrap();

        bus.publish("t", "before").unwrap();
        bus.close(Duration::from_secs(1)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        bus.publish("t", "after").unwrap();
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.active_workers(), 0);
    }

    /// Тест проверяет, что клон шины разделяет состояние.
    #[tokio::test]
    async fn test_clone_shares_state() {
        let bus = Bus::new(3);
        let other = bus.clone();
        let _sub = bus.subscribe("shared", |_| async {}).unwrap();

        assert_eq!(other.subscriber_count("shared"), 1);
        assert_eq!(other.capacity(), 3);
        other.close(Duration::from_secs(1)).await.unwrap();
        assert!(bus.is_closed());
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn test_zero_capacity_panics() {
        let _ = Bus::new(0);
    }
}
