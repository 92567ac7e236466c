use thiserror::Error;

/// Верхнеуровневый тип ошибок крейта
#[derive(Debug, Error)]
pub enum CoreError {
    /// Ошибки протокола
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Ошибки вычисления адреса эндпоинта
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// Ошибки протокола (JSON-кадры)
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Кадр не является валидным JSON нужной формы
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Нет поля `type`
    #[error("missing message type")]
    MissingType,

    /// Пустое поле `type`
    #[error("empty message type")]
    EmptyType,

    /// `data` не совпадает с ожидаемой формой для данного типа
    #[error("invalid payload for `{kind}`: {reason}")]
    InvalidPayload {
        /// тип сообщения
        kind: String,
        /// причина
        reason: String,
    },
}

/// Ошибки построения URL эндпоинта
#[derive(Debug, Error)]
pub enum EndpointError {
    /// origin не парсится как URL
    #[error("invalid origin: {0}")]
    InvalidOrigin(#[from] url::ParseError),

    /// Схема origin не http/https/ws/wss
    #[error("unsupported origin scheme: {0}")]
    UnsupportedScheme(String),

    /// У origin нет хоста
    #[error("origin has no host")]
    MissingHost,
}

/// Ошибки fan-out хаба
#[derive(Debug, Error)]
pub enum HubError {
    /// Подписчик с таким id уже зарегистрирован
    #[error("subscriber already exists: {0}")]
    SubscriberAlreadyExists(u64),
}
