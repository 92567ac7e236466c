use std::collections::BTreeSet;
use std::fmt;

use market_core::symbols::{normalize_channel, normalize_symbol};

/// Фаза жизненного цикла соединения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// Ничего не открыто и ничего не запланировано
    #[default]
    Idle,
    /// `open` отправлен транспорту, ждём `Opened`
    Connecting,
    Open,
    /// Соединение потеряно, ждём таймер переподключения
    Reconnecting,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::Idle => "idle",
            LinkState::Connecting => "connecting",
            LinkState::Open => "open",
            LinkState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// Статус для потребителей: `{connected, reconnecting, error}`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub reconnecting: bool,
    pub error: Option<String>,
}

impl ConnectionStatus {
    /// `retrying` — текущая попытка подключения восстанавливает потерянное
    /// соединение: для потребителя это всё ещё "reconnecting" до `Opened`
    pub(crate) fn from_link(state: LinkState, retrying: bool, error: Option<&str>) -> Self {
        Self {
            connected: state == LinkState::Open,
            reconnecting: match state {
                LinkState::Reconnecting => true,
                LinkState::Connecting => retrying,
                LinkState::Idle | LinkState::Open => false,
            },
            error: error.map(str::to_string),
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "connected={} reconnecting={}",
            self.connected, self.reconnecting
        )?;
        if let Some(e) = &self.error {
            write!(f, " error={e:?}")?;
        }
        Ok(())
    }
}

/// Разница, которую надо отправить серверу
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDelta {
    pub symbols: Vec<String>,
    pub channels: Vec<String>,
}

impl SubscriptionDelta {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.channels.is_empty()
    }
}

/// Набор подписок. Клиент — источник истины: при каждом открытии
/// соединения набор отправляется заново целиком.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscriptions {
    symbols: BTreeSet<String>,
    channels: BTreeSet<String>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет записи, возвращает только реально новые
    pub fn merge<S, C>(&mut self, symbols: &[S], channels: &[C]) -> SubscriptionDelta
    where
        S: AsRef<str>,
        C: AsRef<str>,
    {
        let mut delta = SubscriptionDelta::default();

        for s in symbols.iter().filter_map(|s| normalize_symbol(s.as_ref())) {
            if self.symbols.insert(s.clone()) {
                delta.symbols.push(s);
            }
        }
        for c in channels.iter().filter_map(|c| normalize_channel(c.as_ref())) {
            if self.channels.insert(c.clone()) {
                delta.channels.push(c);
            }
        }

        delta
    }

    /// Удаляет записи, возвращает только реально удалённые
    pub fn remove<S, C>(&mut self, symbols: &[S], channels: &[C]) -> SubscriptionDelta
    where
        S: AsRef<str>,
        C: AsRef<str>,
    {
        let mut delta = SubscriptionDelta::default();

        for s in symbols.iter().filter_map(|s| normalize_symbol(s.as_ref())) {
            if self.symbols.remove(&s) {
                delta.symbols.push(s);
            }
        }
        for c in channels.iter().filter_map(|c| normalize_channel(c.as_ref())) {
            if self.channels.remove(&c) {
                delta.channels.push(c);
            }
        }

        delta
    }

    /// Полный набор для replay после переподключения
    pub fn full(&self) -> SubscriptionDelta {
        SubscriptionDelta {
            symbols: self.symbols.iter().cloned().collect(),
            channels: self.channels.iter().cloned().collect(),
        }
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        normalize_symbol(symbol).is_some_and(|s| self.symbols.contains(&s))
    }

    pub fn contains_channel(&self, channel: &str) -> bool {
        self.channels.contains(channel.trim())
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.channels.is_empty()
    }
}
