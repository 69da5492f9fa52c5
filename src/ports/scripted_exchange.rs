use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::BufReader;
use std::sync::{Mutex, MutexGuard};

use crate::exchange::{ExchangeClient, ExchangeError, OrderSide, OrderStatus, PlacedOrder};

/// Behaviour of one order placed on the scripted exchange.
///
/// `statuses` are handed out one per status query; the last entry repeats
/// once the script runs out. An empty script never leaves the open state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptedOrder {
    #[serde(default)]
    pub reject: Option<String>,
    #[serde(default)]
    pub statuses: Vec<OrderStatus>,
    #[serde(skip)]
    status_error: Option<ExchangeError>,
}

impl ScriptedOrder {
    pub fn statuses(statuses: Vec<OrderStatus>) -> Self {
        Self {
            statuses,
            ..Default::default()
        }
    }

    pub fn rejected(reason: &str) -> Self {
        Self {
            reject: Some(reason.to_string()),
            ..Default::default()
        }
    }

    /// Every status query for this order fails with `err`.
    pub fn with_status_error(mut self, err: ExchangeError) -> Self {
        self.status_error = Some(err);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub market: String,
    pub side: OrderSide,
    pub size: Decimal,
    pub price: Decimal,
    pub reduce_only: bool,
    pub order_id: Option<String>,
}

#[derive(Debug)]
struct OrderState {
    script: ScriptedOrder,
    queries: usize,
}

#[derive(Debug, Default)]
struct ExchangeState {
    scripts: HashMap<String, VecDeque<ScriptedOrder>>,
    orders: HashMap<String, OrderState>,
    placements: Vec<Placement>,
    cancels: Vec<String>,
    next_id: usize,
}

/// In-process exchange that replays per-market order scripts. Orders on a
/// market consume that market's scripts in placement order; a market with no
/// script left fills on the first query.
#[derive(Debug, Default)]
pub struct ScriptedExchange {
    state: Mutex<ExchangeState>,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_path(path: &str) -> Result<Self, ExchangeError> {
        let file = File::open(path)
            .map_err(|e| ExchangeError::Other(format!("failed to open script file: {}", e)))?;
        let scripts: HashMap<String, Vec<ScriptedOrder>> =
            serde_yaml::from_reader(BufReader::new(file)).map_err(|e| {
                ExchangeError::Other(format!("failed to parse script file '{}': {}", path, e))
            })?;

        let exchange = Self::new();
        for (market, orders) in scripts {
            for order in orders {
                exchange.script(&market, order);
            }
        }
        Ok(exchange)
    }

    pub fn script(&self, market: &str, order: ScriptedOrder) {
        self.state()
            .scripts
            .entry(market.to_string())
            .or_default()
            .push_back(order);
    }

    pub fn placements(&self) -> Vec<Placement> {
        self.state().placements.clone()
    }

    pub fn cancels(&self) -> Vec<String> {
        self.state().cancels.clone()
    }

    pub fn status_queries(&self, order_id: &str) -> usize {
        self.state()
            .orders
            .get(order_id)
            .map(|o| o.queries)
            .unwrap_or(0)
    }

    fn state(&self) -> MutexGuard<'_, ExchangeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ExchangeClient for ScriptedExchange {
    async fn place_market_order(
        &self,
        market: &str,
        side: OrderSide,
        size: Decimal,
        price: Decimal,
        reduce_only: bool,
    ) -> Result<PlacedOrder, ExchangeError> {
        let mut state = self.state();
        let script = state
            .scripts
            .get_mut(market)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| ScriptedOrder::statuses(vec![OrderStatus::Filled]));

        let mut placement = Placement {
            market: market.to_string(),
            side,
            size,
            price,
            reduce_only,
            order_id: None,
        };

        if let Some(reason) = script.reject.clone() {
            state.placements.push(placement);
            return Err(ExchangeError::Rejected(reason));
        }

        let order_id = format!("scripted-{}", state.next_id);
        state.next_id += 1;
        placement.order_id = Some(order_id.clone());
        state.placements.push(placement);
        state
            .orders
            .insert(order_id.clone(), OrderState { script, queries: 0 });

        Ok(PlacedOrder { order_id })
    }

    async fn get_order_status(&self, order_id: &str) -> Result<OrderStatus, ExchangeError> {
        let mut state = self.state();
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| ExchangeError::Other(format!("unknown order {}", order_id)))?;

        let index = order.queries;
        order.queries += 1;
        if let Some(err) = &order.script.status_error {
            return Err(err.clone());
        }
        let statuses = &order.script.statuses;
        Ok(statuses
            .get(index)
            .or_else(|| statuses.last())
            .cloned()
            .unwrap_or(OrderStatus::Open))
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        self.state().cancels.push(order_id.to_string());
        Ok(())
    }
}
