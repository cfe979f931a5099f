use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use subpub_error::{BusError, BusResult};

use super::{
    lifecycle::{WorkerGuard, WorkerTracker},
    subscription::SubscriptionInner,
};

type SubjectKey = Arc<str>;

#[derive(Debug, Default)]
struct RegistryState {
    /// Флаг закрытия шины; меняется false → true ровно один раз.
    closed: bool,
    subjects: HashMap<SubjectKey, Vec<Arc<SubscriptionInner>>>,
}

/// Реестр подписок: тема → список подписок.
///
/// Все структурные изменения идут под одним замком. Обработчики под ним
/// никогда не вызываются.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Регистрирует подписку и резервирует под неё воркера.
    ///
    /// Проверка флага, вставка и увеличение счётчика воркеров выполняются
    /// атомарно относительно [`Registry::close_all`].
    pub(crate) fn insert(
        &self,
        subscription: Arc<SubscriptionInner>,
        workers: &Arc<WorkerTracker>,
    ) -> BusResult<WorkerGuard> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BusError::AlreadyClosed);
        }

        state
            .subjects
            .entry(subscription.subject().clone())
            .or_default()
            .push(subscription);

        Ok(workers.enter())
    }

    /// Удаляет подписку из списка её темы. Пустые темы удаляются.
    ///
    /// Если подписки уже нет (например, реестр очищен закрытием), ничего
    /// не делает.
    pub(crate) fn remove(
        &self,
        subscription: &Arc<SubscriptionInner>,
    ) {
        let mut state = self.state.lock();
        let subject = subscription.subject();

        let now_empty = match state.subjects.get_mut(subject) {
            Some(list) => {
                list.retain(|s| !Arc::ptr_eq(s, subscription));
                list.is_empty()
            }
            None => false,
        };

        if now_empty {
            state.subjects.remove(subject);
        }
    }

    /// Копия текущего списка подписчиков темы.
    ///
    /// Замок держится только на время копирования.
    pub(crate) fn snapshot(
        &self,
        subject: &str,
    ) -> Vec<Arc<SubscriptionInner>> {
        self.state
            .lock()
            .subjects
            .get(subject)
            .cloned()
            .unwrap_or_default()
    }

    /// Помечает реестр закрытым, закрывает все ещё открытые очереди и
    /// очищает реестр.
    ///
    /// Возвращает `None`, если реестр уже был закрыт, иначе число очередей,
    /// закрытых этим вызовом.
    pub(crate) fn close_all(&self) -> Option<usize> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        state.closed = true;

        let mut closed = 0;
        for (_, subscriptions) in state.subjects.drain() {
            for subscription in subscriptions {
                // Конкурентная отписка могла успеть закрыть очередь сама.
                if subscription.close() {
                    closed += 1;
                }
            }
        }

        Some(closed)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub(crate) fn subscriber_count(
        &self,
        subject: &str,
    ) -> usize {
        self.state.lock().subjects.get(subject).map_or(0, Vec::len)
    }

    pub(crate) fn subject_count(&self) -> usize {
        self.state.lock().subjects.len()
    }
}
