use thiserror::Error;

/// Ошибки транспортного уровня
#[derive(Debug, Error)]
pub enum TransportError {
    /// Нет открытого соединения
    #[error("transport is not connected")]
    NotConnected,

    /// Ошибки сокета
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake не прошёл
    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    /// URL не пригоден для подключения
    #[error("bad endpoint url: {0}")]
    Url(String),

    /// Ошибка websocket после установки соединения
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// I/O поток соединения завершился
    #[error("connection worker is gone")]
    WorkerGone,
}
