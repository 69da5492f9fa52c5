use std::sync::Arc;
use tokio::time::sleep;

use crate::config::PollConfig;
use crate::exchange::{ExchangeClient, OrderStatus};
use crate::pairtrade::{OrderOutcome, PairStatus, PairTrade};

/// Confirms a single order by polling its status a bounded number of times.
///
/// Each of the `attempts` iterations queries the exchange once and, unless a
/// terminal state was seen, waits `interval`. One last query follows without
/// a wait; if the order still isn't filled it is canceled here so it cannot
/// fill later behind our back.
pub struct OrderPoller {
    exchange: Arc<dyn ExchangeClient + Send + Sync>,
    poll: PollConfig,
}

impl OrderPoller {
    pub fn new(exchange: Arc<dyn ExchangeClient + Send + Sync>, poll: PollConfig) -> Self {
        Self { exchange, poll }
    }

    pub async fn confirm(&self, trade: &mut PairTrade, order_id: &str) -> OrderOutcome {
        let pair = trade.pair_label();

        for attempt in 1..=self.poll.attempts {
            match self.query(order_id).await {
                Some(OrderStatus::Canceled) => {
                    log::info!("{} - Order cancelled... order_id={}", pair, order_id);
                    trade.pair_status = PairStatus::Failed;
                    return OrderOutcome::Failed;
                }
                Some(OrderStatus::Filled) => {
                    log::info!("{} - Order filled... order_id={}", pair, order_id);
                    trade.pair_status = PairStatus::Filled;
                    return OrderOutcome::Live;
                }
                status => {
                    log::debug!(
                        "[POLL] {} order_id={} attempt={}/{} status={} waiting {:?}",
                        pair,
                        order_id,
                        attempt,
                        self.poll.attempts,
                        status.map(|s| s.to_string()).unwrap_or_else(|| "unknown".into()),
                        self.poll.interval
                    );
                }
            }
            sleep(self.poll.interval).await;
        }

        let final_status = self.query(order_id).await;
        if final_status == Some(OrderStatus::Filled) {
            log::info!("{} - Order filled... order_id={}", pair, order_id);
            trade.pair_status = PairStatus::Filled;
            return OrderOutcome::Live;
        }

        if let Err(e) = self.exchange.cancel_order(order_id).await {
            log::error!("[ORDER] cancel failed for {}: {}", order_id, e);
        }
        trade.pair_status = PairStatus::Error;
        log::info!("{} - Order error...", pair);
        log::info!(
            "{} - Actual Status = {}",
            pair,
            final_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".into())
        );
        OrderOutcome::Error
    }

    // A failed status lookup is not terminal; it just uses up the iteration.
    async fn query(&self, order_id: &str) -> Option<OrderStatus> {
        match self.exchange.get_order_status(order_id).await {
            Ok(status) => Some(status),
            Err(e) => {
                log::warn!("[POLL] status lookup failed for {}: {}", order_id, e);
                None
            }
        }
    }
}
