//! Граница между state machine клиента и реальным сокетом.
//!
//! Транспорт только открывает/закрывает соединение и пишет кадры. Всё, что
//! приходит от сети (open/message/error/close), доставляется хостом обратно
//! в клиент как [`TransportEvent`] в порядке получения.

use url::Url;

use crate::error::TransportError;

/// Номер соединения внутри одного транспорта. Растёт на каждый `open`
pub type ConnectionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Соединение установлено (handshake завершён)
    Opened,
    /// Текстовый кадр от сервера
    Message(String),
    /// Ошибка соединения. Не означает закрытие: за ней придёт `Closed`
    Error(String),
    /// Соединение закрыто (любой стороной)
    Closed,
}

pub trait Transport {
    /// Начать подключение. Результат придёт событием `Opened` или `Error` + `Closed`.
    /// `Err` здесь означает, что попытка не стартовала вовсе.
    fn open(&mut self, url: &Url) -> Result<ConnectionId, TransportError>;

    /// Отправить текстовый кадр в текущее соединение
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Закрыть текущее соединение. Повторный вызов безопасен
    fn close(&mut self);

    /// Соединение, чьи события сейчас актуальны
    fn current(&self) -> Option<ConnectionId>;
}
