//! Транспорт-заглушка: ничего не открывает, только записывает вызовы.

use url::Url;

use crate::error::TransportError;
use crate::transport::{ConnectionId, Transport};

#[derive(Debug, Default)]
pub struct FakeTransport {
    pub opens: usize,
    pub closes: usize,
    pub sent: Vec<String>,
    pub urls: Vec<Url>,
    /// `open` вернёт ошибку, пока флаг поднят
    pub fail_open: bool,
    current: Option<ConnectionId>,
    next_id: ConnectionId,
}

impl Transport for FakeTransport {
    fn open(&mut self, url: &Url) -> Result<ConnectionId, TransportError> {
        self.opens += 1;
        self.urls.push(url.clone());

        if self.fail_open {
            self.current = None;
            return Err(TransportError::Handshake("refused by test".into()));
        }

        self.next_id += 1;
        self.current = Some(self.next_id);
        Ok(self.next_id)
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        if self.current.is_none() {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(text.to_string());
        Ok(())
    }

    fn close(&mut self) {
        if self.current.take().is_some() {
            self.closes += 1;
        }
    }

    fn current(&self) -> Option<ConnectionId> {
        self.current
    }
}
