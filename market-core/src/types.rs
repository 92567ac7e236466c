use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Последняя котировка по символу.
///
/// Сервер может присылать дополнительные поля (объём, high/low и т.д.),
/// они сохраняются в `extra` как есть.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Quote {
    /// Котировка только с ценой
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change: None,
            change_percent: None,
            timestamp: None,
            extra: Map::new(),
        }
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2}", self.symbol, self.price)?;
        if let Some(pct) = self.change_percent {
            write!(f, " ({pct:+.2}%)")?;
        }
        Ok(())
    }
}

/// Снапшот одного рыночного индекса
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSnapshot {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub change_percent: f64,
}

impl IndexSnapshot {
    pub fn new(name: impl Into<String>, price: f64, change_percent: f64) -> Self {
        Self {
            name: name.into(),
            price,
            change_percent,
        }
    }
}

impl fmt::Display for IndexSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2} ({:+.2}%)", self.name, self.price, self.change_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quote_keeps_unknown_fields_in_extra() {
        let q: Quote = serde_json::from_value(json!({
            "symbol": "AAPL",
            "price": 189.5,
            "changePercent": 1.25,
            "volume": 1200
        }))
        .unwrap();

        assert_eq!(q.symbol, "AAPL");
        assert_eq!(q.change_percent, Some(1.25));
        assert_eq!(q.change, None);
        assert_eq!(q.extra.get("volume"), Some(&json!(1200)));
    }

    #[test]
    fn quote_serializes_without_empty_optionals() {
        let v = serde_json::to_value(Quote::new("MSFT", 50.0)).unwrap();
        assert_eq!(v, json!({"symbol": "MSFT", "price": 50.0}));
    }

    #[test]
    fn display_formats_percent_with_sign() {
        let idx = IndexSnapshot::new("DOW", 38_000.0, -0.5);
        assert_eq!(idx.to_string(), "DOW 38000.00 (-0.50%)");
    }
}
