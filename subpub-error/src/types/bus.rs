use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки операций шины сообщений.
///
/// Переполнение очереди подписчика ошибкой не является: такое сообщение
/// отбрасывается и попадает только в лог.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Подписка после того, как шина была закрыта.
    #[error("subpub is closed")]
    AlreadyClosed,

    /// Ожидание завершения воркеров не уложилось в отведённый срок.
    #[error("close deadline exceeded with {pending} worker(s) still draining")]
    DeadlineExceeded { pending: usize },
}

/// Ошибка неблокирующей вставки в очередь подписчика.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError {
    /// Буфер заполнен, сообщение отброшено.
    #[error("subscriber buffer is full")]
    Full,

    /// Очередь уже закрыта.
    #[error("subscriber queue is closed")]
    Closed,
}

impl ErrorExt for BusError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyClosed => StatusCode::BusClosed,
            Self::DeadlineExceeded { .. } => StatusCode::Timeout,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
