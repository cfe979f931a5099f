use std::sync::Arc;

use bytes::Bytes;

/// Сообщение, доставляемое обработчикам подписчиков.
///
/// Шина не навязывает полезной нагрузке никакой схемы. Клонирование
/// дешёвое: и тема, и `payload` разделяются по ссылке.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: Arc<str>,
    pub payload: Bytes,
}

impl Message {
    pub fn new(
        subject: impl Into<Arc<str>>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
        }
    }

    /// Полезная нагрузка как UTF-8 строка (с заменой невалидных байт).
    pub fn payload_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
