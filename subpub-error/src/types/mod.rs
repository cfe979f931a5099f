pub mod bus;
pub mod service;

// Публичный экспорт всех типов ошибок из вложенных модулей, чтобы
// упростить доступ к ним из внешнего кода.
pub use bus::*;
pub use service::*;
