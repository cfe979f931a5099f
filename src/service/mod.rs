//! Сервисный слой поверх шины: один входящий поток подписки — ровно
//! одна подписка на шине, один запрос публикации — ровно одна
//! публикация.

use std::future::Future;

use bytes::Bytes;
use subpub_error::ServiceError;
use tokio::sync::mpsc;

use crate::pubsub::{Bus, Message, Subscription};

/// Событие, отправляемое в исходящий поток клиента.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub key: String,
    pub data: Bytes,
}

impl From<Message> for Event {
    fn from(msg: Message) -> Self {
        Self {
            key: msg.subject.to_string(),
            data: msg.payload,
        }
    }
}

/// Открытый поток подписки. Отписка при [`StreamGuard::close`] или drop.
#[derive(Debug)]
pub struct StreamGuard {
    subscription: Subscription,
}

impl StreamGuard {
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Закрывает поток; отписка выполняется в `Drop`.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
        tracing::debug!(
            key = self.subscription.subject(),
            subscription_id = self.subscription.id(),
            "stream closed"
        );
    }
}

#[derive(Debug, Clone)]
pub struct PubSubService {
    bus: Bus,
}

impl PubSubService {
    pub fn new(bus: Bus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Подписывает исходящий поток `sink` на тему `key`.
    ///
    /// Каждое сообщение шины пересылается в `sink`; если получатель уже
    /// ушёл, ошибка логируется и подписка продолжает жить до закрытия
    /// потока.
    pub fn open_stream(
        &self,
        key: &str,
        sink: mpsc::Sender<Event>,
    ) -> Result<StreamGuard, ServiceError> {
        if key.is_empty() {
            return Err(ServiceError::MissingKey);
        }

        let subscription = self
            .bus
            .subscribe(key, move |msg| {
                let sink = sink.clone();
                async move {
                    if let Err(err) = sink.send(Event::from(msg)).await {
                        tracing::warn!(key = %err.0.key, "Error sending event: stream is gone");
                    }
                }
            })
            .map_err(ServiceError::Subscribe)?;

        tracing::debug!(key, subscription_id = subscription.id(), "stream opened");
        Ok(StreamGuard { subscription })
    }

    /// Полный цикл потоковой подписки: подписка, ожидание окончания
    /// контекста потока (`until`) или ухода получателя, отписка.
    pub async fn subscribe<F>(
        &self,
        key: &str,
        sink: mpsc::Sender<Event>,
        until: F,
    ) -> Result<(), ServiceError>
    where
        F: Future<Output = ()>,
    {
        let watcher = sink.clone();
        let guard = self.open_stream(key, sink)?;

        tokio::select! {
            _ = until => {}
            _ = watcher.closed() => {}
        }

        guard.close();
        Ok(())
    }

    /// Публикует `data` в тему `key`.
    pub fn publish(
        &self,
        key: &str,
        data: impl Into<Bytes>,
    ) -> Result<(), ServiceError> {
        if key.is_empty() {
            return Err(ServiceError::MissingKey);
        }
        self.bus.publish(key, data).map_err(ServiceError::Publish)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use subpub_error::{BusError, ErrorExt, StatusCode};
    use tokio::{sync::oneshot, time::timeout};

    use super::*;

    /// Тест проверяет, что опубликованное сообщение приходит в поток.
    #[tokio::test]
    async fn test_stream_receives_published_event() {
        let service = PubSubService::new(Bus::new(10));
        let (tx, mut rx) = mpsc::channel(4);
        let guard = service.open_stream("test", tx).unwrap();

        service.publish("test", "hello").unwrap();

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out")
            .expect("no event");
        assert_eq!(event.key, "test");
        assert_eq!(event.data, Bytes::from_static(b"hello"));
        drop(guard);
    }

    /// Тест проверяет, что явное закрытие потока снимает подписку.
    #[tokio::test]
    async fn test_stream_guard_close_unsubscribes() {
        let bus = Bus::new(4);
        let service = PubSubService::new(bus.clone());
        let (tx, _rx) = mpsc::channel(4);

        let guard = service.open_stream("closing", tx).unwrap();
        let subscription = guard.subscription().clone();
        assert_eq!(bus.subscriber_count("closing"), 1);

        guard.close();
        assert!(subscription.is_closed());
        assert_eq!(bus.subscriber_count("closing"), 0);
    }

    /// Тест проверяет, что окончание контекста потока снимает подписку.
    #[tokio::test]
    async fn test_subscribe_unsubscribes_when_context_ends() {
        let bus = Bus::new(10);
        let service = PubSubService::new(bus.clone());
        let (tx, _rx) = mpsc::channel(4);
        let (done_tx, done_rx) = oneshot::channel::<()>();

        let task = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .subscribe("ctx", tx, async {
                        let _ = done_rx.await;
                    })
                    .await
            })
        };

        tokio::task::yield_now().await;
        assert_eq!(bus.subscriber_count("ctx"), 1);

        done_tx.send(()).unwrap();
        timeout(Duration::from_secs(1), task)
            .await
            .expect("timed out")
            .expect("join failed")
            .unwrap();
        assert_eq!(bus.subscriber_count("ctx"), 0);
    }

    /// Тест проверяет, что уход получателя тоже завершает подписку.
    #[tokio::test]
    async fn test_subscribe_ends_when_receiver_dropped() {
        let bus = Bus::new(10);
        let service = PubSubService::new(bus.clone());
        let (tx, rx) = mpsc::channel(4);
        drop(rx);

        timeout(
            Duration::from_secs(1),
            service.subscribe("gone", tx, std::future::pending()),
        )
        .await
        .expect("timed out")
        .unwrap();
        assert_eq!(bus.subscriber_count("gone"), 0);
    }

    /// Тест проверяет, что подписка на закрытую шину превращается во
    /// внутреннюю ошибку сервиса.
    #[tokio::test]
    async fn test_subscribe_on_closed_bus() {
        let bus = Bus::new(10);
        bus.close(Duration::from_secs(1)).await.unwrap();
        let service = PubSubService::new(bus);
        let (tx, _rx) = mpsc::channel(1);

        let err = service
            .subscribe("test", tx, std::future::ready(()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Subscribe(BusError::AlreadyClosed)));
        assert_eq!(err.status_code(), StatusCode::Internal);
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected() {
        let service = PubSubService::new(Bus::new(1));
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(
            service.open_stream("", tx),
            Err(ServiceError::MissingKey)
        ));
        assert!(matches!(
            service.publish("", "x"),
            Err(ServiceError::MissingKey)
        ));
    }
}
