use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::abort_guard::AbortGuard;
use crate::config::PollConfig;
use crate::exchange::{ExchangeClient, ExchangeError, OrderSide};
use crate::trade::execution::order_poller::OrderPoller;

const CLOSE_PRIMARY_LEG: &str = "close_primary_leg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairStatus {
    Pending,
    Filled,
    Failed,
    Error,
}

impl fmt::Display for PairStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PairStatus::Pending => write!(f, "PENDING"),
            PairStatus::Filled => write!(f, "FILLED"),
            PairStatus::Failed => write!(f, "FAILED"),
            PairStatus::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOutcome {
    Live,
    Failed,
    // not terminal in time, canceled by us
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Primary,
    Secondary,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Leg::Primary => write!(f, "Primary leg"),
            Leg::Secondary => write!(f, "Secondary leg"),
        }
    }
}

impl FromStr for Leg {
    type Err = ExecutionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary" | "m1" | "market_1" => Ok(Leg::Primary),
            "secondary" | "m2" | "market_2" => Ok(Leg::Secondary),
            _ => Err(ExecutionError::InvalidLeg(s.to_string())),
        }
    }
}

/// Order fields for one leg. Placing a new order for the leg overwrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegOrder {
    pub order_id: Option<String>,
    pub size: Decimal,
    pub side: OrderSide,
    pub placed_at: Option<DateTime<Utc>>,
}

impl LegOrder {
    pub fn new(size: Decimal, side: OrderSide) -> Self {
        Self {
            order_id: None,
            size,
            side,
            placed_at: None,
        }
    }
}

/// Tracks one pair-trade lifecycle. Created by the caller, mutated in place
/// by the executor; `pair_status` and `comments` describe the latest event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairTrade {
    pub primary_market: String,
    pub secondary_market: String,
    pub hedge_ratio: f64,
    pub z_score: f64,
    pub half_life: f64,
    pub primary: LegOrder,
    pub secondary: LegOrder,
    pub pair_status: PairStatus,
    pub comments: String,
}

impl PairTrade {
    pub fn leg(&self, leg: Leg) -> &LegOrder {
        match leg {
            Leg::Primary => &self.primary,
            Leg::Secondary => &self.secondary,
        }
    }

    pub fn leg_mut(&mut self, leg: Leg) -> &mut LegOrder {
        match leg {
            Leg::Primary => &mut self.primary,
            Leg::Secondary => &mut self.secondary,
        }
    }

    pub fn market(&self, leg: Leg) -> &str {
        match leg {
            Leg::Primary => &self.primary_market,
            Leg::Secondary => &self.secondary_market,
        }
    }

    pub fn pair_label(&self) -> String {
        format!("{} vs {}", self.primary_market, self.secondary_market)
    }

    fn mark_error(&mut self, comments: String) {
        self.pair_status = PairStatus::Error;
        self.comments = comments;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegPrices {
    pub primary: Decimal,
    pub secondary: Decimal,
    pub failsafe: Decimal,
}

impl LegPrices {
    pub fn for_leg(&self, leg: Leg) -> Decimal {
        match leg {
            Leg::Primary => self.primary,
            Leg::Secondary => self.secondary,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LegRequest {
    pub size: Decimal,
    pub side: OrderSide,
}

#[derive(Debug, Deserialize)]
pub struct PairTradeRequest {
    pub primary_market: String,
    pub secondary_market: String,
    #[serde(default)]
    pub hedge_ratio: f64,
    #[serde(default)]
    pub z_score: f64,
    #[serde(default)]
    pub half_life: f64,
    pub primary: LegRequest,
    pub secondary: LegRequest,
    pub prices: LegPrices,
}

impl PairTradeRequest {
    pub fn from_yaml_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)
            .with_context(|| format!("failed to open pair trade {}", path_ref.display()))?;
        serde_yaml::from_reader(file)
            .with_context(|| format!("failed to parse pair trade {}", path_ref.display()))
    }

    pub fn into_parts(self) -> (PairTrade, LegPrices) {
        let trade = PairTrade {
            primary_market: self.primary_market,
            secondary_market: self.secondary_market,
            hedge_ratio: self.hedge_ratio,
            z_score: self.z_score,
            half_life: self.half_life,
            primary: LegOrder::new(self.primary.size, self.primary.side),
            secondary: LegOrder::new(self.secondary.size, self.secondary.side),
            pair_status: PairStatus::Pending,
            comments: String::new(),
        };
        (trade, self.prices)
    }
}

#[derive(Debug)]
pub enum ExecutionError {
    Placement {
        leg: Leg,
        market: String,
        source: ExchangeError,
    },
    UnconfirmedUnwind {
        market: String,
    },
    InvalidLeg(String),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::Placement {
                leg,
                market,
                source,
            } => write!(f, "{} order on {} failed: {}", leg, market, source),
            ExecutionError::UnconfirmedUnwind { market } => {
                write!(f, "Could not close primary leg for {}.", market)
            }
            ExecutionError::InvalidLeg(raw) => {
                write!(f, "leg must be either primary or secondary, got '{}'", raw)
            }
        }
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExecutionError::Placement { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Opens both legs of a pair in sequence and unwinds the primary leg when the
/// secondary one cannot be established.
pub struct PairTradeExecutor {
    exchange: Arc<dyn ExchangeClient + Send + Sync>,
    poller: OrderPoller,
    guard: AbortGuard,
}

impl PairTradeExecutor {
    pub fn new(
        exchange: Arc<dyn ExchangeClient + Send + Sync>,
        poll: PollConfig,
        guard: AbortGuard,
    ) -> Self {
        let poller = OrderPoller::new(exchange.clone(), poll);
        Self {
            exchange,
            poller,
            guard,
        }
    }

    /// Runs the whole lifecycle and returns the final pair status. Leg
    /// failures are absorbed here; only a failed unwind escapes, and that one
    /// is handled by the abort guard.
    pub async fn open_trades(&self, trade: &mut PairTrade, prices: &LegPrices) -> PairStatus {
        if !self.open_leg_and_confirm(trade, prices, Leg::Primary).await {
            return trade.pair_status;
        }
        if !self.open_leg_and_confirm(trade, prices, Leg::Secondary).await {
            self.guard
                .run(CLOSE_PRIMARY_LEG, self.close_primary_leg(trade, prices))
                .await;
        }
        trade.pair_status
    }

    pub async fn open_leg_and_confirm(
        &self,
        trade: &mut PairTrade,
        prices: &LegPrices,
        leg: Leg,
    ) -> bool {
        let market = trade.market(leg).to_string();
        let order = trade.leg(leg);
        log::info!("{} : Placing order...", market);
        log::info!(
            "Side: {}, Size: {}, Price: {}",
            order.side,
            order.size,
            prices.for_leg(leg)
        );

        let order_id = match self.open_leg(trade, prices, leg).await {
            Ok(order_id) => order_id,
            Err(e) => {
                log::error!("[ORDER] {} {} placement failed: {}", leg, market, e);
                return false;
            }
        };

        let outcome = self.poller.confirm(trade, &order_id).await;
        if outcome != OrderOutcome::Live {
            log::info!("{} : Order failed. outcome={:?}", market, outcome);
            trade.mark_error(format!("{}: Order failed.", market));
            return false;
        }
        true
    }

    pub async fn open_leg(
        &self,
        trade: &mut PairTrade,
        prices: &LegPrices,
        leg: Leg,
    ) -> std::result::Result<String, ExecutionError> {
        let market = trade.market(leg).to_string();
        let LegOrder { side, size, .. } = *trade.leg(leg);
        let price = prices.for_leg(leg);

        match self
            .exchange
            .place_market_order(&market, side, size, price, false)
            .await
        {
            Ok(placed) => {
                let order = trade.leg_mut(leg);
                order.order_id = Some(placed.order_id.clone());
                order.placed_at = Some(Utc::now());
                log::info!(
                    "[ORDER] {} {} placed order_id={} side={} size={} price={}",
                    leg,
                    market,
                    placed.order_id,
                    side,
                    size,
                    price
                );
                Ok(placed.order_id)
            }
            Err(e) => {
                trade.mark_error(format!("{} {} - {}.", leg, market, e));
                Err(ExecutionError::Placement {
                    leg,
                    market,
                    source: e,
                })
            }
        }
    }

    /// Flattens the primary leg with a reduce-only order at the failsafe
    /// price. Any error returned here is unrecoverable.
    pub async fn close_primary_leg(
        &self,
        trade: &mut PairTrade,
        prices: &LegPrices,
    ) -> std::result::Result<(), ExecutionError> {
        let market = trade.primary_market.clone();
        let side = trade.primary.side.opposite();
        let size = trade.primary.size;

        log::warn!(
            "[UNWIND] {} closing primary leg side={} size={} failsafe_price={}",
            market,
            side,
            size,
            prices.failsafe
        );

        let placed = match self
            .exchange
            .place_market_order(&market, side, size, prices.failsafe, true)
            .await
        {
            Ok(placed) => placed,
            Err(e) => {
                trade.mark_error(format!(
                    "{}: Order failed. Could not place close order - {}.",
                    market, e
                ));
                return Err(ExecutionError::Placement {
                    leg: Leg::Primary,
                    market,
                    source: e,
                });
            }
        };

        let outcome = self.poller.confirm(trade, &placed.order_id).await;
        if outcome == OrderOutcome::Live {
            // The pair itself still failed; the poller's fill mark is for the
            // unwind order only.
            trade.pair_status = PairStatus::Error;
            log::info!(
                "[UNWIND] {} primary leg closed order_id={}",
                market,
                placed.order_id
            );
            return Ok(());
        }

        trade.mark_error(format!(
            "{}: Order failed. Could not close primary leg.",
            market
        ));
        Err(ExecutionError::UnconfirmedUnwind { market })
    }
}
