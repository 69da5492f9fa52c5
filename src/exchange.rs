use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order state as reported by the exchange. Only `Filled` and `Canceled` are
/// terminal for the poller; everything else means "keep waiting".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Open,
    Filled,
    Canceled,
    Other(String),
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" | "pending" => OrderStatus::Open,
            "filled" => OrderStatus::Filled,
            "canceled" | "cancelled" => OrderStatus::Canceled,
            _ => OrderStatus::Other(raw),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Open => "open".to_string(),
            OrderStatus::Filled => "filled".to_string(),
            OrderStatus::Canceled => "canceled".to_string(),
            OrderStatus::Other(raw) => raw,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "OPEN"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Canceled => write!(f, "CANCELED"),
            OrderStatus::Other(raw) => write!(f, "{}", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    Rejected(String),
    Network(String),
    RateLimited(String),
    Other(String),
}

impl ExchangeError {
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ExchangeError::RateLimited(_) => true,
            other => {
                let text = other.to_string();
                text.contains("429") || text.contains("Too Many Requests")
            }
        }
    }
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExchangeError::Rejected(e) => write!(f, "order rejected: {}", e),
            ExchangeError::Network(e) => write!(f, "network error: {}", e),
            ExchangeError::RateLimited(e) => write!(f, "rate limited (429): {}", e),
            ExchangeError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl Error for ExchangeError {}

/// Narrow view of the exchange API used by the executor. Calls are
/// request/response; the executor awaits each one before issuing the next.
#[async_trait]
pub trait ExchangeClient {
    async fn place_market_order(
        &self,
        market: &str,
        side: OrderSide,
        size: Decimal,
        price: Decimal,
        reduce_only: bool,
    ) -> Result<PlacedOrder, ExchangeError>;

    async fn get_order_status(&self, order_id: &str) -> Result<OrderStatus, ExchangeError>;

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_side_flips() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn status_parses_exchange_vocabulary() {
        let parsed: Vec<OrderStatus> =
            serde_yaml::from_str("[pending, open, filled, cancelled, canceled, untriggered]")
                .unwrap();
        assert_eq!(
            parsed,
            vec![
                OrderStatus::Open,
                OrderStatus::Open,
                OrderStatus::Filled,
                OrderStatus::Canceled,
                OrderStatus::Canceled,
                OrderStatus::Other("untriggered".to_string()),
            ]
        );
    }

    #[test]
    fn rate_limit_detected_from_message() {
        assert!(ExchangeError::Network("HTTP 429 Too Many Requests".to_string()).is_rate_limited());
        assert!(ExchangeError::RateLimited("slow down".to_string()).is_rate_limited());
        assert!(!ExchangeError::Rejected("insufficient margin".to_string()).is_rate_limited());
    }
}
