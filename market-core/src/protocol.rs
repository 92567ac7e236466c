use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::{IndexSnapshot, Quote};

/// Сообщения клиент -> сервер.
///
/// ```text
/// {"type":"authenticate","userId":"u-1"}
/// {"type":"subscribe","symbols":["AAPL"],"channels":["market-indices"]}
/// {"type":"unsubscribe","symbols":["AAPL"],"channels":[]}
/// {"type":"ping"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Authenticate {
        #[serde(rename = "userId")]
        user_id: String,
    },
    Subscribe {
        #[serde(default)]
        symbols: Vec<String>,
        #[serde(default)]
        channels: Vec<String>,
    },
    Unsubscribe {
        #[serde(default)]
        symbols: Vec<String>,
        #[serde(default)]
        channels: Vec<String>,
    },
    Ping,
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

pub const KIND_CONNECTION: &str = "connection";
pub const KIND_INITIAL_PRICES: &str = "initial-prices";
pub const KIND_PRICE: &str = "price";
pub const KIND_INDEX: &str = "index";
pub const KIND_NEWS: &str = "news";
pub const KIND_SENTIMENT: &str = "sentiment";
pub const KIND_PONG: &str = "pong";

/// Пачка котировок из `price` / `initial-prices`.
///
/// Записи без символа или цены не валят всю пачку: они пропускаются,
/// их число лежит в `skipped`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuoteBatch {
    pub quotes: Vec<Quote>,
    pub skipped: usize,
}

impl From<Vec<Quote>> for QuoteBatch {
    fn from(quotes: Vec<Quote>) -> Self {
        Self { quotes, skipped: 0 }
    }
}

/// Сообщения сервер -> клиент, различаются по полю `type`
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Connection {
        message: Option<String>,
    },
    InitialPrices {
        timestamp: Option<String>,
        batch: QuoteBatch,
    },
    Price {
        timestamp: Option<String>,
        batch: QuoteBatch,
    },
    Index {
        timestamp: Option<String>,
        indices: Vec<IndexSnapshot>,
    },
    News {
        timestamp: Option<String>,
        data: Value,
    },
    Sentiment {
        timestamp: Option<String>,
        data: Value,
    },
    Pong {
        timestamp: Option<String>,
    },
    /// Неизвестный тип: клиент логирует и игнорирует
    Unknown {
        kind: String,
    },
}

impl ServerMessage {
    /// Значение поля `type`
    pub fn kind(&self) -> &str {
        match self {
            ServerMessage::Connection { .. } => KIND_CONNECTION,
            ServerMessage::InitialPrices { .. } => KIND_INITIAL_PRICES,
            ServerMessage::Price { .. } => KIND_PRICE,
            ServerMessage::Index { .. } => KIND_INDEX,
            ServerMessage::News { .. } => KIND_NEWS,
            ServerMessage::Sentiment { .. } => KIND_SENTIMENT,
            ServerMessage::Pong { .. } => KIND_PONG,
            ServerMessage::Unknown { kind } => kind.as_str(),
        }
    }
}

/// Сырой кадр на проводе
#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Разбирает входящий текстовый кадр
pub fn parse_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    let frame: Frame = serde_json::from_str(text)?;

    let kind = frame.kind.ok_or(ProtocolError::MissingType)?;
    if kind.trim().is_empty() {
        return Err(ProtocolError::EmptyType);
    }

    let timestamp = frame.timestamp;

    let msg = match kind.as_str() {
        KIND_CONNECTION => ServerMessage::Connection {
            message: frame.message,
        },
        KIND_INITIAL_PRICES => ServerMessage::InitialPrices {
            timestamp,
            batch: decode_quotes(&kind, frame.data)?,
        },
        KIND_PRICE => ServerMessage::Price {
            timestamp,
            batch: decode_quotes(&kind, frame.data)?,
        },
        KIND_INDEX => ServerMessage::Index {
            timestamp,
            indices: decode_indices(&kind, frame.data)?,
        },
        KIND_NEWS => ServerMessage::News {
            timestamp,
            data: frame.data,
        },
        KIND_SENTIMENT => ServerMessage::Sentiment {
            timestamp,
            data: frame.data,
        },
        KIND_PONG => ServerMessage::Pong { timestamp },
        _ => ServerMessage::Unknown { kind },
    };

    Ok(msg)
}

/// Сериализует исходящее серверное сообщение
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    let frame = match msg {
        ServerMessage::Connection { message } => Frame {
            kind: Some(KIND_CONNECTION.to_string()),
            timestamp: None,
            data: Value::Null,
            message: message.clone(),
        },
        ServerMessage::InitialPrices { timestamp, batch }
        | ServerMessage::Price { timestamp, batch } => Frame {
            kind: Some(msg.kind().to_string()),
            timestamp: timestamp.clone(),
            data: serde_json::to_value(&batch.quotes)?,
            message: None,
        },
        ServerMessage::Index { timestamp, indices } => Frame {
            kind: Some(KIND_INDEX.to_string()),
            timestamp: timestamp.clone(),
            data: serde_json::to_value(indices)?,
            message: None,
        },
        ServerMessage::News { timestamp, data } | ServerMessage::Sentiment { timestamp, data } => {
            Frame {
                kind: Some(msg.kind().to_string()),
                timestamp: timestamp.clone(),
                data: data.clone(),
                message: None,
            }
        }
        ServerMessage::Pong { timestamp } => Frame {
            kind: Some(KIND_PONG.to_string()),
            timestamp: timestamp.clone(),
            data: Value::Null,
            message: None,
        },
        ServerMessage::Unknown { kind } => Frame {
            kind: Some(kind.clone()),
            timestamp: None,
            data: Value::Null,
            message: None,
        },
    };

    Ok(serde_json::to_string(&frame)?)
}

fn decode_quotes(kind: &str, data: Value) -> Result<QuoteBatch, ProtocolError> {
    let records = match data {
        Value::Array(items) => items,
        // одиночный объект = пачка из одной записи
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(ProtocolError::InvalidPayload {
                kind: kind.to_string(),
                reason: format!("expected array of quotes, got {}", value_kind(&other)),
            });
        }
    };

    let mut batch = QuoteBatch::default();
    for rec in records {
        match serde_json::from_value::<Quote>(rec) {
            Ok(q) if !q.symbol.trim().is_empty() => batch.quotes.push(q),
            _ => batch.skipped += 1,
        }
    }

    Ok(batch)
}

fn decode_indices(kind: &str, data: Value) -> Result<Vec<IndexSnapshot>, ProtocolError> {
    if !data.is_array() {
        return Err(ProtocolError::InvalidPayload {
            kind: kind.to_string(),
            reason: format!("expected array of indices, got {}", value_kind(&data)),
        });
    }

    // снапшот целиком или ничего: частичный список индексов хуже старого
    serde_json::from_value(data).map_err(|e| ProtocolError::InvalidPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
