use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::error::HubError;

/// Идентификатор подписчика хаба
pub type SubscriberId = u64;

/// Ёмкость очереди подписчика по умолчанию
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// Итог одной рассылки
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastStats {
    pub sent: usize,
    pub dropped_full: usize,
    pub dropped_dead: usize,
}

impl BroadcastStats {
    pub fn is_lossy(&self) -> bool {
        self.dropped_full + self.dropped_dead > 0
    }
}

impl fmt::Display for BroadcastStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sent={} dropped_full={} dropped_dead={}",
            self.sent, self.dropped_full, self.dropped_dead
        )
    }
}

/// Fan-out одного события на много независимых читателей.
///
/// У каждого подписчика своя bounded-очередь: медленный читатель теряет
/// события, но не тормозит остальных. Отвалившиеся (drop receiver)
/// вычищаются при следующей рассылке.
pub struct Hub<T> {
    subscribers: Mutex<HashMap<SubscriberId, Sender<Arc<T>>>>,
    capacity: usize,
}

impl<T> Default for Hub<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl<T> Hub<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, Sender<Arc<T>>>> {
        match self.subscribers.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(), // продолжаем, несмотря на poison
        }
    }

    pub fn add_subscriber(&self, id: SubscriberId) -> Result<Receiver<Arc<T>>, HubError> {
        match self.lock().entry(id) {
            Entry::Vacant(e) => {
                let (tx, rx) = crossbeam_channel::bounded(self.capacity);
                e.insert(tx);
                Ok(rx)
            }
            Entry::Occupied(_) => Err(HubError::SubscriberAlreadyExists(id)),
        }
    }

    pub fn remove_subscriber(&self, id: SubscriberId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn broadcast(&self, item: T) -> BroadcastStats {
        self.broadcast_arc(Arc::new(item))
    }

    pub fn broadcast_arc(&self, item: Arc<T>) -> BroadcastStats {
        // рассылаем по снимку, чтобы не держать lock во время try_send
        let snapshot: Vec<(SubscriberId, Sender<Arc<T>>)> = self
            .lock()
            .iter()
            .map(|(&id, tx)| (id, tx.clone()))
            .collect();

        let mut stats = BroadcastStats::default();
        let mut dead = Vec::new();

        for (id, tx) in &snapshot {
            match tx.try_send(item.clone()) {
                Ok(()) => stats.sent += 1,
                Err(TrySendError::Full(_)) => stats.dropped_full += 1,
                Err(TrySendError::Disconnected(_)) => dead.push(*id),
            }
        }

        stats.dropped_dead = dead.len();
        if !dead.is_empty() {
            let mut subs = self.lock();
            for id in dead {
                subs.remove(&id);
            }
        }

        stats
    }
}
