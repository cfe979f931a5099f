use std::fmt;

use num_enum::TryFromPrimitive;

/// Коды статуса для категоризации ошибок.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 6xxx: Сеть / IO
/// - 9xxx: Pub/Sub
///
/// `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,
    InvalidConfig = 1006,

    // === 6xxx: Сеть/IO ===
    Io = 6000,
    ConnectionClosed = 6001,
    Timeout = 6002,
    ProtocolError = 6003,

    // === 9xxx: Pub/Sub ===
    BusClosed = 9000,
    MissingSubject = 9001,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Является ли код ошибкой со стороны клиента.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidArgs | Self::MissingSubject | Self::ProtocolError)
    }

    /// Имеет ли смысл повторить операцию позже.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет конвертацию через `TryFrom<u32>` и `from_u32`.
    #[test]
    fn test_from_try_from_u32() {
        let n = StatusCode::BusClosed.code();
        assert_eq!(StatusCode::try_from(n).unwrap(), StatusCode::BusClosed);
        assert!(StatusCode::from_u32(99999).is_none());
    }

    #[test]
    fn test_code_and_into() {
        let n: u32 = StatusCode::Timeout.into();
        assert_eq!(n, 6002);
    }

    /// Тест проверяет классификацию клиентских и повторяемых ошибок.
    #[test]
    fn test_classification() {
        assert!(StatusCode::MissingSubject.is_client_error());
        assert!(!StatusCode::BusClosed.is_client_error());
        assert!(StatusCode::Timeout.is_retryable());
        assert!(!StatusCode::BusClosed.is_retryable());
    }

    /// Тест проверяет, что `Display` содержит имя варианта и числовой код.
    #[test]
    fn test_display_contains_name_and_code() {
        let s = StatusCode::BusClosed.to_string();
        assert!(s.contains("BusClosed"), "got: {s}");
        assert!(s.contains("9000"), "got: {s}");
    }
}
