use parking_lot::Mutex;
use subpub_error::PushError;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Создаёт ограниченную FIFO-очередь заданной ёмкости.
///
/// Возвращает сторону записи (разделяемую между публикаторами) и
/// сторону чтения, которой владеет единственный воркер подписки.
pub(crate) fn bounded<T>(capacity: usize) -> (Queue<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        Queue {
            tx: Mutex::new(Some(tx)),
        },
        QueueReceiver { rx },
    )
}

/// Сторона записи очереди подписчика.
///
/// `None` внутри мьютекса означает закрытую очередь; переход
/// открыта → закрыта происходит ровно один раз.
#[derive(Debug)]
pub(crate) struct Queue<T> {
    tx: Mutex<Option<mpsc::Sender<T>>>,
}

/// Сторона чтения очереди подписчика.
#[derive(Debug)]
pub(crate) struct QueueReceiver<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> Queue<T> {
    /// Неблокирующая вставка.
    pub(crate) fn push(
        &self,
        item: T,
    ) -> Result<(), PushError> {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(PushError::Closed);
        };
        tx.try_send(item).map_err(|err| match err {
            TrySendError::Full(_) => PushError::Full,
            TrySendError::Closed(_) => PushError::Closed,
        })
    }

    /// Закрывает очередь. Возвращает `true`, только если закрытие
    /// выполнил именно этот вызов.
    ///
    /// Уже принятые элементы остаются в буфере и будут вычитаны.
    pub(crate) fn close(&self) -> bool {
        self.tx.lock().take().is_some()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Количество элементов в буфере открытой очереди. После
    /// [`Queue::close`] всегда `0`: отправитель уже отпущен.
    pub(crate) fn len(&self) -> usize {
        self.tx
            .lock()
            .as_ref()
            .map_or(0, |tx| tx.max_capacity() - tx.capacity())
    }
}

impl<T> QueueReceiver<T> {
    /// Ждёт следующий элемент.
    ///
    /// Возвращает `None`, когда очередь закрыта и буфер полностью
    /// вычитан.
    pub(crate) async fn pop(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}
