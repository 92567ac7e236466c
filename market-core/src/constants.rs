use std::time::Duration;

/// Интервал keep-alive ping, пока соединение открыто
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Фиксированная задержка перед повторным подключением (без backoff)
pub const RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Путь push-эндпоинта на хосте origin
pub const STREAM_PATH: &str = "/ws";

/// Канал снапшотов рыночных индексов
pub const MARKET_INDICES_CHANNEL: &str = "market-indices";

/// Канал новостей
pub const NEWS_CHANNEL: &str = "news";

/// Канал рыночного сентимента
pub const SENTIMENT_CHANNEL: &str = "sentiment";
