//! Источник времени для таймеров клиента.
//!
//! Клиент сам не спит и не заводит системных таймеров: он хранит дедлайны
//! и сверяет их с [`Clock::now`]. В тестах время двигается вручную через
//! [`ManualClock`].

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

pub trait Clock {
    /// Монотонное время для дедлайнов
    fn now(&self) -> Instant;

    /// Стеночное время для `lastUpdate`, если сервер не прислал timestamp
    fn utc_now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Виртуальные часы: стоят на месте, пока их не сдвинут
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<(Instant, DateTime<Utc>)>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(utc: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new((Instant::now(), utc))),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.0 += by;
        if let Ok(delta) = chrono::Duration::from_std(by) {
            guard.1 += delta;
        }
    }

    fn read(&self) -> (Instant, DateTime<Utc>) {
        match self.inner.lock() {
            Ok(g) => *g,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.read().0
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.read().1
    }
}
