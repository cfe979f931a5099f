use std::{any::Any, io};

use thiserror::Error;

use crate::{BusError, ErrorExt, StatusCode};

/// Ошибки сервисного слоя, который связывает шину с клиентскими потоками.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to subscribe: {0}")]
    Subscribe(#[source] BusError),

    #[error("failed to publish: {0}")]
    Publish(#[source] BusError),

    #[error("subject key must not be empty")]
    MissingKey,

    #[error("malformed request: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

impl ErrorExt for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            // Отказ шины клиенту виден как внутренняя ошибка сервиса.
            Self::Subscribe(_) | Self::Publish(_) => StatusCode::Internal,
            Self::MissingKey => StatusCode::MissingSubject,
            Self::Protocol(_) => StatusCode::ProtocolError,
            Self::Transport(_) => StatusCode::Io,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
