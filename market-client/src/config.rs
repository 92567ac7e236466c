use std::time::Duration;

use market_core::endpoint::stream_url;
use market_core::hub::DEFAULT_SUBSCRIBER_CAPACITY;
use market_core::{CoreError, PING_INTERVAL, RECONNECT_DELAY};
use url::Url;

/// Настройки клиента потока котировок
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Готовый URL эндпоинта (`ws://` или `wss://`)
    pub url: Url,
    /// Непрозрачный id пользователя для `authenticate`
    pub user_id: Option<String>,
    pub auto_reconnect: bool,
    pub ping_interval: Duration,
    /// Фиксированная, без роста между попытками
    pub reconnect_delay: Duration,
    /// Подписки, которые уйдут при первом открытии
    pub symbols: Vec<String>,
    pub channels: Vec<String>,
    /// Ёмкость очереди событий на одного наблюдателя
    pub observer_capacity: usize,
}

impl ClientConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            user_id: None,
            auto_reconnect: true,
            ping_interval: PING_INTERVAL,
            reconnect_delay: RECONNECT_DELAY,
            symbols: Vec::new(),
            channels: Vec::new(),
            observer_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }

    /// URL эндпоинта выводится из origin: https -> wss, http -> ws
    pub fn from_origin(origin: &str) -> Result<Self, CoreError> {
        Ok(Self::new(stream_url(origin)?))
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_auto_reconnect(mut self, on: bool) -> Self {
        self.auto_reconnect = on;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols.extend(symbols.into_iter().map(Into::into));
        self
    }

    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels.extend(channels.into_iter().map(Into::into));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_protocol_constants() {
        let cfg = ClientConfig::from_origin("https://app.example.com").unwrap();
        assert_eq!(cfg.url.as_str(), "wss://app.example.com/ws");
        assert!(cfg.auto_reconnect);
        assert_eq!(cfg.ping_interval, Duration::from_secs(30));
        assert_eq!(cfg.reconnect_delay, Duration::from_millis(5000));
        assert!(cfg.user_id.is_none());
    }

    #[test]
    fn builder_accumulates_subscriptions() {
        let cfg = ClientConfig::from_origin("http://localhost:8080")
            .unwrap()
            .with_user_id("u-1")
            .with_symbols(["AAPL"])
            .with_symbols(vec!["MSFT".to_string()])
            .with_channels(["market-indices"])
            .with_auto_reconnect(false);

        assert_eq!(cfg.symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(cfg.channels, vec!["market-indices"]);
        assert_eq!(cfg.user_id.as_deref(), Some("u-1"));
        assert!(!cfg.auto_reconnect);
    }

    #[test]
    fn bad_origin_is_reported() {
        assert!(ClientConfig::from_origin("mailto:someone@example.com").is_err());
    }
}
