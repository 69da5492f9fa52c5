use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::config::ExecutorConfig;
use crate::exchange::{ExchangeClient, ExchangeError, OrderSide, OrderStatus, PlacedOrder};
use crate::notifier::Notifier;
use crate::ports::scripted_exchange::ScriptedExchange;
use crate::rate_limit_notifier::RateLimitNotifier;

/// Exchange backend selected at startup, with rate-limit reporting on every
/// call.
pub struct ExchangeClientBox {
    pub inner: Box<dyn ExchangeClient + Send + Sync>,
    rate_limit: RateLimitNotifier,
}

impl ExchangeClientBox {
    pub fn new(
        inner: Box<dyn ExchangeClient + Send + Sync>,
        rate_limit: RateLimitNotifier,
    ) -> Self {
        Self { inner, rate_limit }
    }

    pub fn create(
        cfg: &ExecutorConfig,
        notifier: Arc<dyn Notifier + Send + Sync>,
    ) -> Result<Self, ExchangeError> {
        let rate_limit = RateLimitNotifier::new(&cfg.notifier.token_name, notifier);
        match cfg.exchange_name.as_str() {
            "scripted" => {
                let path = cfg.scripted_exchange_file.as_deref().ok_or_else(|| {
                    ExchangeError::Other("scripted exchange requires a script file".to_owned())
                })?;
                let exchange = ScriptedExchange::from_yaml_path(path)?;
                Ok(Self::new(Box::new(exchange), rate_limit))
            }
            other => Err(ExchangeError::Other(format!(
                "Unsupported exchange '{}'",
                other
            ))),
        }
    }

    async fn report_rate_limit(&self, operation: &str, detail: &str, err: &ExchangeError) {
        if err.is_rate_limited() {
            let context = format!("{} ({})", operation, detail);
            self.rate_limit.notify(&context, &err.to_string()).await;
        }
    }
}

#[async_trait]
impl ExchangeClient for ExchangeClientBox {
    async fn place_market_order(
        &self,
        market: &str,
        side: OrderSide,
        size: Decimal,
        price: Decimal,
        reduce_only: bool,
    ) -> Result<PlacedOrder, ExchangeError> {
        let result = self
            .inner
            .place_market_order(market, side, size, price, reduce_only)
            .await;
        if let Err(ref err) = result {
            self.report_rate_limit(
                "place_market_order",
                &format!("{} | side={} size={}", market, side, size),
                err,
            )
            .await;
        }
        result
    }

    async fn get_order_status(&self, order_id: &str) -> Result<OrderStatus, ExchangeError> {
        let result = self.inner.get_order_status(order_id).await;
        if let Err(ref err) = result {
            self.report_rate_limit("get_order_status", order_id, err)
                .await;
        }
        result
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        let result = self.inner.cancel_order(order_id).await;
        if let Err(ref err) = result {
            self.report_rate_limit("cancel_order", &format!("order_id={}", order_id), err)
                .await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::scripted_exchange::ScriptedOrder;
    use crate::testutil::RecordingNotifier;
    use rust_decimal_macros::dec;

    fn boxed(exchange: ScriptedExchange, notifier: Arc<RecordingNotifier>) -> ExchangeClientBox {
        ExchangeClientBox::new(
            Box::new(exchange),
            RateLimitNotifier::new("ETH/BTC", notifier),
        )
    }

    #[tokio::test]
    async fn rate_limited_placement_notifies_operator() {
        let exchange = ScriptedExchange::new();
        exchange.script(
            "ETH-USD",
            ScriptedOrder::rejected("HTTP 429 Too Many Requests"),
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let client = boxed(exchange, notifier.clone());

        let result = client
            .place_market_order("ETH-USD", OrderSide::Buy, dec!(1), dec!(2000), false)
            .await;

        assert!(result.is_err());
        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("[ETH/BTC] Rate limit - place_market_order"));
    }

    #[tokio::test]
    async fn ordinary_rejection_is_passed_through_silently() {
        let exchange = ScriptedExchange::new();
        exchange.script("ETH-USD", ScriptedOrder::rejected("insufficient margin"));
        let notifier = Arc::new(RecordingNotifier::default());
        let client = boxed(exchange, notifier.clone());

        let err = client
            .place_market_order("ETH-USD", OrderSide::Buy, dec!(1), dec!(2000), false)
            .await
            .unwrap_err();

        assert_eq!(err, ExchangeError::Rejected("insufficient margin".to_string()));
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn unsupported_exchange_name_is_rejected() {
        let cfg = ExecutorConfig {
            exchange_name: "dydx".to_string(),
            scripted_exchange_file: None,
            poll: Default::default(),
            notifier: Default::default(),
            log: crate::config::LogConfig {
                timezone_offset_secs: 0,
                log_file: None,
            },
            pair_trade_file: "pair.yaml".to_string(),
        };
        let notifier = Arc::new(RecordingNotifier::default());
        assert!(ExchangeClientBox::create(&cfg, notifier).is_err());
    }
}
