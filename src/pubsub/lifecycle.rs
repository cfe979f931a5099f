use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use subpub_error::{BusError, BusResult};
use tokio::sync::Notify;

use super::registry::Registry;

/// Счётчик активных воркеров подписок.
///
/// Увеличивается при запуске воркера, уменьшается при его завершении;
/// ожидающие [`WorkerTracker::wait_idle`] будятся, когда счётчик
/// достигает нуля.
#[derive(Debug, Default)]
pub(crate) struct WorkerTracker {
    active: AtomicUsize,
    idle: Notify,
}

/// Guard одного воркера; при drop уменьшает счётчик.
#[derive(Debug)]
pub(crate) struct WorkerGuard {
    tracker: Arc<WorkerTracker>,
}

impl WorkerTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enter(self: &Arc<Self>) -> WorkerGuard {
        self.active.fetch_add(1, Ordering::AcqRel);
        WorkerGuard {
            tracker: Arc::clone(self),
        }
    }

    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Ждёт, пока не останется ни одного активного воркера.
    pub(crate) async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Регистрируемся до проверки счётчика, чтобы не потерять
            // уведомление между проверкой и ожиданием.
            notified.as_mut().enable();

            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn leave(&self) {
        if self.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.tracker.leave();
    }
}

/// Закрытие шины.
///
/// Под замком реестра переводит шину в закрытое состояние и закрывает
/// все очереди, затем ждёт завершения воркеров, соревнуясь с `cancel`.
/// Если `cancel` сработал раньше, возвращает
/// [`BusError::DeadlineExceeded`]; незавершённые воркеры продолжают
/// вычитывать уже принятые сообщения в фоне.
pub(crate) async fn shutdown<F>(
    registry: &Registry,
    workers: &WorkerTracker,
    cancel: F,
) -> BusResult<()>
where
    F: Future<Output = ()>,
{
    let Some(closed) = registry.close_all() else {
        tracing::debug!("subpub already closed");
        return Ok(());
    };

    tracing::info!(
        closed_subscriptions = closed,
        active_workers = workers.active(),
        "closing subpub"
    );

    tokio::select! {
        biased;
        _ = workers.wait_idle() => {
            tracing::info!("subpub closed, all workers drained");
            Ok(())
        }
        _ = cancel => {
            let pending = workers.active();
            tracing::warn!(pending, "subpub close deadline exceeded, workers keep draining");
            Err(BusError::DeadlineExceeded { pending })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    /// Тест проверяет, что без воркеров ожидание завершается сразу.
    #[tokio::test]
    async fn test_wait_idle_without_workers() {
        let tracker = WorkerTracker::new();
        timeout(Duration::from_millis(50), tracker.wait_idle())
            .await
            .expect("must not wait");
    }

    /// Тест проверяет, что ожидание будится, когда уходит последний
    /// воркер.
    #[tokio::test]
    async fn test_wait_idle_wakes_on_last_guard() {
        let tracker = Arc::new(WorkerTracker::new());
        let g1 = tracker.enter();
        let g2 = tracker.enter();
        assert_eq!(tracker.active(), 2);

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_idle().await })
        };

        drop(g1);
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(g2);
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("timed out")
            .expect("join failed");
        assert_eq!(tracker.active(), 0);
    }

    /// Тест проверяет, что закрытие пустого реестра завершается успехом, а
    /// повторное — сразу успехом.
    #[tokio::test]
    async fn test_shutdown_empty_registry() {
        let registry = Registry::new();
        let tracker = WorkerTracker::new();

        shutdown(&registry, &tracker, std::future::pending())
            .await
            .unwrap();
        assert!(registry.is_closed());
        shutdown(&registry, &tracker, std::future::pending())
            .await
            .unwrap();
    }

    /// Тест проверяет, что при сработавшем `cancel` возвращается
    /// `DeadlineExceeded` с числом незавершённых воркеров.
    #[tokio::test]
    async fn test_shutdown_reports_pending_workers() {
        let registry = Registry::new();
        let tracker = Arc::new(WorkerTracker::new());
        let _stuck = tracker.enter();

        let err = shutdown(&registry, &tracker, std::future::ready(()))
            .await
            .unwrap_err();
        assert_eq!(err, BusError::DeadlineExceeded { pending: 1 });
    }
}
