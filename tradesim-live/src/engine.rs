//! Risk-gated batch execution against a broker.
//!
//! One [`ExecutionEngine::execute_orders`] call is one decision cycle. The
//! portfolio lock is held for the whole batch, across every awaited health,
//! fundamentals and broker call, so concurrent batches serialize instead of
//! double-counting cash. Nothing escapes a batch: failures become
//! [`RejectedOrder`]s and hard stops become [`ExecutionReport::halted`].

use crate::collaborators::{Broker, BrokerError, FundamentalsSource, HealthProbe};
use crate::scenario::ScenarioHandle;
use crate::sector_cache::SectorCache;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tradesim_core::domain::{
    Direction, ExitReason, Instrument, OrderSide, Portfolio, Position, PositionSide, Signal,
    TradeRecord, DEFAULT_LOT_SIZE,
};
use tradesim_core::fill::{close_position, increase_position, marketable, open_position};
use tradesim_core::risk::{
    ExposureBreach, ExposureLimits, HaltReason, MarketConditions, RiskGate, RiskScenario,
};
use tradesim_core::sizers::{lot_quantity, quantity_for, KellySizer};

pub const DEFAULT_MIN_ORDER_AMOUNT: f64 = 100.0;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_PROTECTIVE_STOP_PCT: f64 = 0.05;

/// One instruction for the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: String,
    pub signal: Signal,
    /// Sentiment in `[-1, 1]`, nudging the Kelly win probability.
    #[serde(default)]
    pub sentiment: f64,
    /// Historical win rate for this symbol, if known.
    #[serde(default)]
    pub win_rate: Option<f64>,
}

impl TradeSignal {
    pub fn new(symbol: impl Into<String>, signal: Signal) -> Self {
        Self {
            symbol: symbol.into(),
            signal,
            sentiment: 0.0,
            win_rate: None,
        }
    }

    pub fn buy(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Signal::Scalar(1.0))
    }

    pub fn sell(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Signal::Scalar(-1.0))
    }

    pub fn with_sentiment(mut self, sentiment: f64) -> Self {
        self.sentiment = sentiment;
        self
    }

    pub fn with_win_rate(mut self, win_rate: f64) -> Self {
        self.win_rate = Some(win_rate);
        self
    }

    /// Order side, or `None` for a neutral scalar.
    pub fn side(&self) -> Option<OrderSide> {
        match self.signal {
            Signal::Order(order) => Some(order.side),
            Signal::Scalar(_) => match self.signal.direction() {
                Direction::Long => Some(OrderSide::Buy),
                Direction::Short => Some(OrderSide::Sell),
                Direction::Neutral => None,
            },
        }
    }
}

/// Market state for one decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub date: NaiveDate,
    pub prices: HashMap<String, f64>,
    #[serde(default)]
    pub conditions: MarketConditions,
}

impl MarketSnapshot {
    pub fn new(date: NaiveDate, prices: HashMap<String, f64>) -> Self {
        Self {
            date,
            prices,
            conditions: MarketConditions::default(),
        }
    }

    pub fn with_conditions(mut self, conditions: MarketConditions) -> Self {
        self.conditions = conditions;
        self
    }

    fn price(&self, symbol: &str) -> Option<f64> {
        self.prices
            .get(symbol)
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Drop every BUY; SELLs still go through.
    pub safe_mode: bool,
    pub limits: ExposureLimits,
    pub min_order_amount: f64,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub protective_stop_pct: f64,
    /// Win rate used when a signal carries none.
    pub default_win_rate: Option<f64>,
    pub instruments: BTreeMap<String, Instrument>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            safe_mode: false,
            limits: ExposureLimits::default(),
            min_order_amount: DEFAULT_MIN_ORDER_AMOUNT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            protective_stop_pct: DEFAULT_PROTECTIVE_STOP_PCT,
            default_win_rate: None,
            instruments: BTreeMap::new(),
        }
    }
}

impl ExecutionConfig {
    fn lot_size(&self, symbol: &str) -> f64 {
        self.instruments
            .get(symbol)
            .map(|i| i.lot_size)
            .unwrap_or(DEFAULT_LOT_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub broker: String,
    pub attempts: u32,
    pub protective_stop: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedOrder {
    pub symbol: String,
    pub side: Option<OrderSide>,
    pub reason: RejectReason,
}

/// Why a single order was dropped. The rest of the batch carries on.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("safe mode blocks new buys")]
    SafeMode,

    #[error("no usable market price")]
    MissingPrice,

    #[error("invalid order: {message}")]
    InvalidOrder { message: String },

    #[error("order not marketable at {price:.4}")]
    NotMarketable { price: f64 },

    #[error("sizing: {message}")]
    Sizing { message: String },

    #[error("order amount {amount:.2} below minimum {minimum:.2}")]
    BelowMinimum { amount: f64, minimum: f64 },

    #[error("cost {cost:.2} exceeds cash {cash:.2}")]
    InsufficientCash { cost: f64, cash: f64 },

    #[error(transparent)]
    Exposure(ExposureBreach),

    #[error("no long position to sell")]
    NoPosition,

    #[error("broker failed after {attempts} attempt(s): {message}")]
    Broker { attempts: u32, message: String },
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub executed: Vec<ExecutedOrder>,
    pub rejected: Vec<RejectedOrder>,
    /// Set when the whole batch was refused.
    pub halted: Option<HaltReason>,
    /// Equity after the batch, at snapshot prices.
    pub equity: f64,
}

impl ExecutionReport {
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }
}

struct Dispatched {
    broker: String,
    attempts: u32,
}

pub struct ExecutionEngine {
    portfolio: Mutex<Portfolio>,
    scenario: ScenarioHandle,
    config: ExecutionConfig,
    paper: Arc<dyn Broker>,
    live: Option<Arc<dyn Broker>>,
    health: Arc<dyn HealthProbe>,
    sectors: SectorCache,
}

impl ExecutionEngine {
    pub fn new(
        portfolio: Portfolio,
        scenario: ScenarioHandle,
        config: ExecutionConfig,
        paper: Arc<dyn Broker>,
        health: Arc<dyn HealthProbe>,
        fundamentals: Arc<dyn FundamentalsSource>,
    ) -> Self {
        Self {
            portfolio: Mutex::new(portfolio),
            scenario,
            config,
            paper,
            live: None,
            health,
            sectors: SectorCache::new(fundamentals),
        }
    }

    /// Route buys through `live` instead of the paper broker.
    pub fn with_live_broker(mut self, live: Arc<dyn Broker>) -> Self {
        self.live = Some(live);
        self
    }

    pub fn scenario(&self) -> &ScenarioHandle {
        &self.scenario
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn sector_cache(&self) -> &SectorCache {
        &self.sectors
    }

    /// Copy of the portfolio, taken under the lock.
    pub async fn portfolio_snapshot(&self) -> Portfolio {
        self.portfolio.lock().await.clone()
    }

    /// Run one batch of signals through the gate and out to the broker.
    pub async fn execute_orders(
        &self,
        signals: &[TradeSignal],
        market: &MarketSnapshot,
    ) -> ExecutionReport {
        let mut portfolio = self.portfolio.lock().await;
        let scenario = self.scenario.snapshot();
        let gate = RiskGate::new(portfolio.initial_capital, scenario);
        let mut report = ExecutionReport::default();

        let health = self.health.check().await;
        if !health.is_healthy() {
            let reason = HaltReason::Unhealthy {
                disk_ok: health.disk_ok,
                memory_ok: health.memory_ok,
                api_ok: health.api_ok,
            };
            warn!(%reason, "batch aborted");
            report.halted = Some(reason);
            report.equity = portfolio.equity(&market.prices);
            return report;
        }

        let mut pending = Vec::with_capacity(signals.len());
        for signal in signals {
            match signal.side() {
                None => debug!(symbol = %signal.symbol, "neutral signal skipped"),
                Some(OrderSide::Buy) if self.config.safe_mode => {
                    reject(&mut report, signal, Some(OrderSide::Buy), RejectReason::SafeMode);
                }
                Some(side) => pending.push((signal, side)),
            }
        }

        let equity = portfolio.equity(&market.prices);
        if let Err(reason) = gate.check_halt(equity, &market.conditions) {
            warn!(%reason, equity, "batch halted");
            report.halted = Some(reason);
            report.equity = equity;
            return report;
        }

        if let Some(live) = &self.live {
            if let Some(balance) = live.balance().await {
                if gate.balance_diverges(balance, portfolio.cash) {
                    warn!(
                        live = balance,
                        paper = portfolio.cash,
                        "live balance diverges from paper cash"
                    );
                }
            }
        }

        let factor = gate.sizing_factor(equity, &market.conditions, &portfolio.equity_history);
        debug!(factor, scenario = %scenario.name, "sizing factor");

        for (signal, side) in pending {
            let outcome = match side {
                OrderSide::Buy => {
                    self.buy(&mut portfolio, signal, market, &scenario, equity, factor)
                        .await
                }
                OrderSide::Sell => self.sell(&mut portfolio, signal, market).await,
            };
            match outcome {
                Ok(order) => report.executed.push(order),
                Err(reason) => reject(&mut report, signal, Some(side), reason),
            }
        }

        report.equity = portfolio.equity(&market.prices);
        portfolio.record_equity(report.equity);
        info!(
            executed = report.executed.len(),
            rejected = report.rejected.len(),
            equity = report.equity,
            cash = portfolio.cash,
            "batch complete"
        );
        report
    }

    /// Close every long whose price is at or below its protective stop.
    pub async fn enforce_stops(&self, market: &MarketSnapshot) -> Vec<TradeRecord> {
        let mut portfolio = self.portfolio.lock().await;
        let triggered: Vec<(String, f64, f64)> = portfolio
            .open_positions()
            .filter(|p| p.side() == Some(PositionSide::Long))
            .filter_map(|p| {
                let stop = p.protective_stop?;
                let price = market.price(&p.symbol)?;
                (price <= stop).then(|| (p.symbol.clone(), p.quantity, price))
            })
            .collect();

        let mut closed = Vec::new();
        for (symbol, quantity, price) in triggered {
            if let Err(reason) = self.dispatch_sell(&symbol, quantity, price).await {
                warn!(%symbol, %reason, "protective stop not executed");
                continue;
            }
            let Portfolio {
                cash, positions, ..
            } = &mut *portfolio;
            let Some(position) = positions.get_mut(&symbol) else {
                continue;
            };
            if let Some((_, trade)) =
                close_position(position, cash, price, market.date, ExitReason::StopLoss)
            {
                info!(%symbol, price, return_pct = trade.return_pct, "protective stop hit");
                closed.push(trade);
            }
        }
        portfolio.trades.extend(closed.iter().cloned());
        closed
    }

    async fn buy(
        &self,
        portfolio: &mut Portfolio,
        signal: &TradeSignal,
        market: &MarketSnapshot,
        scenario: &RiskScenario,
        equity: f64,
        factor: f64,
    ) -> Result<ExecutedOrder, RejectReason> {
        let symbol = signal.symbol.as_str();
        let price = self.resolve_price(signal, market)?;
        let lot_size = self.config.lot_size(symbol);

        let explicit = match signal.signal {
            Signal::Order(order) => order.quantity,
            Signal::Scalar(_) => None,
        };
        let quantity = match explicit {
            Some(quantity) => lot_quantity(quantity, lot_size),
            None => {
                let decision = KellySizer::new(scenario.max_position_pct).calculate_size(
                    symbol,
                    equity,
                    signal.win_rate.or(self.config.default_win_rate),
                    signal.sentiment,
                );
                let fraction = (decision.fraction * factor).min(scenario.max_position_pct);
                quantity_for(equity * fraction, price, lot_size)
            }
        }
        .map_err(|e| RejectReason::Sizing {
            message: e.to_string(),
        })?;

        let cost = quantity * price;
        if cost < self.config.min_order_amount {
            return Err(RejectReason::BelowMinimum {
                amount: cost,
                minimum: self.config.min_order_amount,
            });
        }
        if cost > portfolio.cash {
            return Err(RejectReason::InsufficientCash {
                cost,
                cash: portfolio.cash,
            });
        }

        let holdings = portfolio.exposures(&market.prices);
        let mut sectors = HashMap::new();
        for held in holdings.keys().map(String::as_str).chain([symbol]) {
            if let Some(sector) = self.sector_of(held).await {
                sectors.insert(held.to_string(), sector);
            }
        }
        self.config
            .limits
            .check(symbol, cost, equity, &holdings, &sectors)
            .map_err(RejectReason::Exposure)?;

        let dispatched = self.dispatch_buy(symbol, quantity, price).await?;

        let Portfolio {
            cash, positions, ..
        } = portfolio;
        let position = positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::flat(symbol));
        let fill = if position.is_flat() {
            open_position(
                position,
                cash,
                PositionSide::Long,
                quantity,
                price,
                market.date,
            )
        } else {
            increase_position(position, cash, quantity, price, market.date)
        };
        let stop = price * (1.0 - self.config.protective_stop_pct);
        position.protective_stop = Some(stop);
        debug!(%symbol, quantity, price, cash_delta = fill.cash_delta, stop, "buy filled");

        Ok(ExecutedOrder {
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            quantity,
            price,
            broker: dispatched.broker,
            attempts: dispatched.attempts,
            protective_stop: Some(stop),
        })
    }

    async fn sell(
        &self,
        portfolio: &mut Portfolio,
        signal: &TradeSignal,
        market: &MarketSnapshot,
    ) -> Result<ExecutedOrder, RejectReason> {
        let symbol = signal.symbol.as_str();
        let price = self.resolve_price(signal, market)?;
        let quantity = match portfolio.position(symbol) {
            Some(p) if p.side() == Some(PositionSide::Long) => p.quantity,
            _ => return Err(RejectReason::NoPosition),
        };

        let dispatched = self.dispatch_sell(symbol, quantity, price).await?;

        let Portfolio {
            cash,
            positions,
            trades,
            ..
        } = portfolio;
        let Some(position) = positions.get_mut(symbol) else {
            return Err(RejectReason::NoPosition);
        };
        let Some((fill, trade)) =
            close_position(position, cash, price, market.date, ExitReason::Signal)
        else {
            return Err(RejectReason::NoPosition);
        };
        debug!(%symbol, quantity, price, cash_delta = fill.cash_delta, "sell filled");
        trades.push(trade);

        Ok(ExecutedOrder {
            symbol: symbol.to_string(),
            side: OrderSide::Sell,
            quantity,
            price,
            broker: dispatched.broker,
            attempts: dispatched.attempts,
            protective_stop: None,
        })
    }

    /// Market price, checked against the descriptor's trigger when there is one.
    fn resolve_price(
        &self,
        signal: &TradeSignal,
        market: &MarketSnapshot,
    ) -> Result<f64, RejectReason> {
        let price = market
            .price(&signal.symbol)
            .ok_or(RejectReason::MissingPrice)?;
        if let Signal::Order(order) = signal.signal {
            order.validate().map_err(|e| RejectReason::InvalidOrder {
                message: e.to_string(),
            })?;
            if !marketable(&order, price) {
                return Err(RejectReason::NotMarketable { price });
            }
        }
        Ok(price)
    }

    async fn sector_of(&self, symbol: &str) -> Option<String> {
        match self.config.instruments.get(symbol) {
            Some(Instrument {
                sector: Some(sector),
                ..
            }) => Some(sector.clone()),
            _ => self.sectors.sector(symbol).await,
        }
    }

    async fn dispatch_buy(
        &self,
        symbol: &str,
        quantity: f64,
        price: f64,
    ) -> Result<Dispatched, RejectReason> {
        let broker = self.live.as_ref().unwrap_or(&self.paper);
        self.with_retries(broker.as_ref(), |b| async move {
            Ok(b.buy(symbol, quantity, price).await)
        })
        .await
    }

    /// Sells never reach the live broker; they go to paper.
    async fn dispatch_sell(
        &self,
        symbol: &str,
        quantity: f64,
        price: f64,
    ) -> Result<Dispatched, RejectReason> {
        if let Some(live) = &self.live {
            warn!(%symbol, broker = live.name(), "live sell path unsupported, skipping live");
        }
        self.with_retries(self.paper.as_ref(), |b| b.sell(symbol, quantity, price))
            .await
    }

    /// Up to `max_attempts` tries with a fixed delay. Unsupported is final.
    async fn with_retries<'b, F, Fut>(
        &self,
        broker: &'b dyn Broker,
        mut attempt: F,
    ) -> Result<Dispatched, RejectReason>
    where
        F: FnMut(&'b dyn Broker) -> Fut,
        Fut: std::future::Future<Output = Result<bool, BrokerError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last = String::from("declined");
        for n in 1..=max_attempts {
            match attempt(broker).await {
                Ok(true) => {
                    return Ok(Dispatched {
                        broker: broker.name().to_string(),
                        attempts: n,
                    })
                }
                Ok(false) => last = format!("{} declined", broker.name()),
                Err(e) => {
                    last = e.to_string();
                    if !e.is_retryable() {
                        return Err(RejectReason::Broker {
                            attempts: n,
                            message: last,
                        });
                    }
                }
            }
            warn!(broker = broker.name(), attempt = n, max_attempts, %last, "broker attempt failed");
            if n < max_attempts && !self.config.retry_delay.is_zero() {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }
        Err(RejectReason::Broker {
            attempts: max_attempts,
            message: last,
        })
    }
}

fn reject(
    report: &mut ExecutionReport,
    signal: &TradeSignal,
    side: Option<OrderSide>,
    reason: RejectReason,
) {
    warn!(symbol = %signal.symbol, %reason, "order rejected");
    report.rejected.push(RejectedOrder {
        symbol: signal.symbol.clone(),
        side,
        reason,
    });
}
