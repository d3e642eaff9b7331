//! Execution engine behaviour against in-memory collaborators.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tradesim_core::domain::{ExitReason, OrderDescriptor, OrderSide, Portfolio, Signal};
use tradesim_core::risk::{
    ExposureBreach, ExposureLimits, HaltReason, MarketConditions, RiskScenario, ScenarioName,
};
use tradesim_live::{
    Broker, BrokerError, ExecutionConfig, ExecutionEngine, HealthStatus, MarketSnapshot,
    PaperBroker, RejectReason, ScenarioHandle, StaticFundamentals, StaticHealth, TradeSignal,
};

// ─── Fixtures ───────────────────────────────────────────────────────

const CAPITAL: f64 = 1_000_000.0;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

fn market(prices: &[(&str, f64)]) -> MarketSnapshot {
    MarketSnapshot::new(
        date(),
        prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
    )
}

fn config() -> ExecutionConfig {
    ExecutionConfig {
        retry_delay: Duration::ZERO,
        ..ExecutionConfig::default()
    }
}

/// Portfolio with `holdings` of (symbol, quantity, entry price) bought out of `CAPITAL`.
fn portfolio_with(holdings: &[(&str, f64, f64)]) -> Portfolio {
    let mut portfolio = Portfolio::new(CAPITAL);
    for (symbol, quantity, price) in holdings {
        let slot = portfolio.slot_mut(symbol);
        slot.quantity = *quantity;
        slot.entry_price = *price;
        slot.highest_price = *price;
        portfolio.cash -= quantity * price;
    }
    portfolio
}

struct Harness {
    engine: ExecutionEngine,
    paper: Arc<PaperBroker>,
    fundamentals: Arc<StaticFundamentals>,
}

fn harness(portfolio: Portfolio, config: ExecutionConfig) -> Harness {
    harness_with(portfolio, config, HashMap::new(), HealthStatus::healthy())
}

fn harness_with(
    portfolio: Portfolio,
    config: ExecutionConfig,
    sectors: HashMap<String, String>,
    health: HealthStatus,
) -> Harness {
    let paper = Arc::new(PaperBroker::new());
    let fundamentals = Arc::new(StaticFundamentals::new(sectors));
    let engine = ExecutionEngine::new(
        portfolio,
        ScenarioHandle::new(RiskScenario::neutral()),
        config,
        paper.clone(),
        Arc::new(StaticHealth(health)),
        fundamentals.clone(),
    );
    Harness {
        engine,
        paper,
        fundamentals,
    }
}

fn buy_qty(symbol: &str, quantity: f64) -> TradeSignal {
    TradeSignal::new(
        symbol,
        Signal::Order(OrderDescriptor::market(OrderSide::Buy).with_quantity(quantity)),
    )
}

/// Declines the first `failures` buys, then accepts.
struct FlakyBroker {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl Broker for FlakyBroker {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn buy(&self, _symbol: &str, _quantity: f64, _price: f64) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst) >= self.failures
    }

    async fn sell(&self, _symbol: &str, _quantity: f64, _price: f64) -> Result<bool, BrokerError> {
        Err(BrokerError::Unavailable {
            broker: "flaky".into(),
            reason: "offline".into(),
        })
    }
}

/// Live account that can buy but not sell.
struct LiveBroker {
    balance: f64,
}

#[async_trait]
impl Broker for LiveBroker {
    fn name(&self) -> &str {
        "live"
    }

    async fn buy(&self, _symbol: &str, _quantity: f64, _price: f64) -> bool {
        true
    }

    async fn sell(&self, _symbol: &str, _quantity: f64, _price: f64) -> Result<bool, BrokerError> {
        Err(BrokerError::Unsupported {
            broker: "live".into(),
        })
    }

    async fn balance(&self) -> Option<f64> {
        Some(self.balance)
    }
}

/// Live account that would accept sells if asked.
#[derive(Default)]
struct WillingLiveBroker {
    sells: AtomicUsize,
}

#[async_trait]
impl Broker for WillingLiveBroker {
    fn name(&self) -> &str {
        "live"
    }

    async fn buy(&self, _symbol: &str, _quantity: f64, _price: f64) -> bool {
        true
    }

    async fn sell(&self, _symbol: &str, _quantity: f64, _price: f64) -> Result<bool, BrokerError> {
        self.sells.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

// ─── Sizing and protective stops ────────────────────────────────────

#[tokio::test]
async fn kelly_buy_is_capped_and_gets_a_protective_stop() {
    let h = harness(Portfolio::new(CAPITAL), config());
    let report = h
        .engine
        .execute_orders(&[TradeSignal::buy("AAPL")], &market(&[("AAPL", 100.0)]))
        .await;

    assert!(report.rejected.is_empty(), "{:?}", report.rejected);
    let order = &report.executed[0];
    // Half-Kelly at the default win rate is 0.125, capped at 0.10 of equity.
    assert_eq!(order.quantity, 1_000.0);
    assert_eq!(order.broker, "paper");
    assert_eq!(order.attempts, 1);
    let stop = order.protective_stop.unwrap();
    assert!((stop - 95.0).abs() < 1e-9);

    let portfolio = h.engine.portfolio_snapshot().await;
    assert!((portfolio.cash - 900_000.0).abs() < 1e-6);
    assert_eq!(portfolio.position("AAPL").unwrap().protective_stop, Some(stop));
    assert_eq!(portfolio.equity_history.len(), 1);
    assert_eq!(h.paper.orders().len(), 1);
}

#[tokio::test]
async fn win_rate_below_cap_sizes_uncapped() {
    let h = harness(Portfolio::new(CAPITAL), config());
    let signal = TradeSignal::buy("AAPL").with_win_rate(0.5);
    let report = h
        .engine
        .execute_orders(&[signal], &market(&[("AAPL", 100.0)]))
        .await;
    // kelly = (1.5 * 0.5 - 0.5) / 1.5 = 1/6, halved: 83,333.33 -> 833 shares.
    assert_eq!(report.executed[0].quantity, 833.0);
}

#[tokio::test]
async fn conservative_swap_applies_to_the_next_batch() {
    let h = harness(Portfolio::new(CAPITAL), config());
    let previous = h.engine.scenario().swap(RiskScenario::conservative());
    assert_eq!(previous.name, ScenarioName::Neutral);

    let report = h
        .engine
        .execute_orders(&[TradeSignal::buy("AAPL")], &market(&[("AAPL", 100.0)]))
        .await;
    assert_eq!(report.executed[0].quantity, 500.0);
}

#[tokio::test]
async fn enforce_stops_closes_breached_longs() {
    let h = harness(Portfolio::new(CAPITAL), config());
    h.engine
        .execute_orders(&[TradeSignal::buy("AAPL")], &market(&[("AAPL", 100.0)]))
        .await;

    let untouched = h.engine.enforce_stops(&market(&[("AAPL", 96.0)])).await;
    assert!(untouched.is_empty());

    let closed = h.engine.enforce_stops(&market(&[("AAPL", 94.0)])).await;
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].exit_reason, ExitReason::StopLoss);
    assert!((closed[0].return_pct + 0.06).abs() < 1e-12);

    let portfolio = h.engine.portfolio_snapshot().await;
    assert!(!portfolio.has_position("AAPL"));
    assert_eq!(portfolio.trades.len(), 1);
    assert!((portfolio.cash - (900_000.0 + 94_000.0)).abs() < 1e-6);
}

// ─── Per-order rejections ───────────────────────────────────────────

#[tokio::test]
async fn instrument_exposure_rejects_order() {
    // 90k held on 1M equity, a 50k order would take AAPL to 14%.
    let h = harness(portfolio_with(&[("AAPL", 900.0, 100.0)]), config());
    let report = h
        .engine
        .execute_orders(&[buy_qty("AAPL", 500.0)], &market(&[("AAPL", 100.0)]))
        .await;

    assert!(report.executed.is_empty());
    assert!(matches!(
        &report.rejected[0].reason,
        RejectReason::Exposure(ExposureBreach::Instrument { symbol, .. }) if symbol == "AAPL"
    ));
    assert!(h.paper.orders().is_empty());
}

#[tokio::test]
async fn sector_exposure_rejects_order() {
    let sectors: HashMap<String, String> = ["AAPL", "MSFT", "GOOG"]
        .iter()
        .map(|s| (s.to_string(), "Technology".to_string()))
        .collect();
    let portfolio = portfolio_with(&[("AAPL", 1_500.0, 100.0), ("MSFT", 1_000.0, 100.0)]);
    let h = harness_with(portfolio, config(), sectors, HealthStatus::healthy());

    let prices = market(&[("AAPL", 100.0), ("MSFT", 100.0), ("GOOG", 100.0)]);
    let report = h
        .engine
        .execute_orders(&[buy_qty("GOOG", 600.0)], &prices)
        .await;

    assert!(matches!(
        &report.rejected[0].reason,
        RejectReason::Exposure(ExposureBreach::Sector { sector, .. }) if sector == "Technology"
    ));
}

#[tokio::test]
async fn sector_lookups_are_cached_across_batches() {
    let sectors = HashMap::from([("AAPL".to_string(), "Technology".to_string())]);
    let h = harness_with(
        Portfolio::new(CAPITAL),
        config(),
        sectors,
        HealthStatus::healthy(),
    );
    let prices = market(&[("AAPL", 100.0)]);

    h.engine.execute_orders(&[buy_qty("AAPL", 10.0)], &prices).await;
    h.engine.execute_orders(&[buy_qty("AAPL", 10.0)], &prices).await;

    assert_eq!(h.fundamentals.lookups(), 1);
    let position = h.engine.portfolio_snapshot().await;
    assert_eq!(position.position("AAPL").unwrap().quantity, 20.0);
}

#[tokio::test]
async fn unfillable_orders_are_rejected_and_batch_continues() {
    let h = harness(portfolio_with(&[("MSFT", 10.0, 50.0)]), config());
    let signals = [
        TradeSignal::buy("NOPRICE"),
        buy_qty("AAPL", 0.5),
        buy_qty("AAPL", 1.0),
        TradeSignal::sell("TSLA"),
        TradeSignal::new(
            "AAPL",
            Signal::Order(OrderDescriptor::limit(OrderSide::Buy, 90.0).with_quantity(5.0)),
        ),
        TradeSignal::new("AAPL", Signal::Scalar(0.1)),
        TradeSignal::sell("MSFT"),
    ];
    let prices = market(&[("AAPL", 50.0), ("TSLA", 200.0), ("MSFT", 55.0)]);
    let report = h.engine.execute_orders(&signals, &prices).await;

    let reasons: Vec<&RejectReason> = report.rejected.iter().map(|r| &r.reason).collect();
    assert_eq!(reasons.len(), 4);
    assert_eq!(reasons[0], &RejectReason::MissingPrice);
    assert!(matches!(reasons[1], RejectReason::Sizing { .. }));
    assert!(matches!(reasons[2], RejectReason::BelowMinimum { .. }));
    assert_eq!(reasons[3], &RejectReason::NoPosition);

    // The limit buy at 90 is marketable at 50, the neutral scalar is skipped.
    assert_eq!(report.executed.len(), 2);
    assert_eq!(report.executed[0].quantity, 5.0);
    assert_eq!(report.executed[1].side, OrderSide::Sell);
}

#[tokio::test]
async fn limit_buy_above_market_is_not_marketable() {
    let h = harness(Portfolio::new(CAPITAL), config());
    let signal = TradeSignal::new(
        "AAPL",
        Signal::Order(OrderDescriptor::limit(OrderSide::Buy, 90.0).with_quantity(5.0)),
    );
    let report = h
        .engine
        .execute_orders(&[signal], &market(&[("AAPL", 100.0)]))
        .await;
    assert_eq!(
        report.rejected[0].reason,
        RejectReason::NotMarketable { price: 100.0 }
    );
}

#[tokio::test]
async fn safe_mode_drops_buys_but_keeps_sells() {
    let cfg = ExecutionConfig {
        safe_mode: true,
        ..config()
    };
    let h = harness(portfolio_with(&[("MSFT", 100.0, 50.0)]), cfg);
    let report = h
        .engine
        .execute_orders(
            &[TradeSignal::buy("AAPL"), TradeSignal::sell("MSFT")],
            &market(&[("AAPL", 100.0), ("MSFT", 55.0)]),
        )
        .await;

    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].reason, RejectReason::SafeMode);
    assert_eq!(report.executed.len(), 1);
    assert_eq!(report.executed[0].symbol, "MSFT");

    let portfolio = h.engine.portfolio_snapshot().await;
    assert_eq!(portfolio.trades.len(), 1);
    assert_eq!(portfolio.trades[0].exit_reason, ExitReason::Signal);
}

// ─── Batch halts ────────────────────────────────────────────────────

#[tokio::test]
async fn drawdown_halts_the_batch() {
    let mut portfolio = Portfolio::new(CAPITAL);
    portfolio.cash = 800_000.0;
    let h = harness(portfolio, config());
    let report = h
        .engine
        .execute_orders(&[TradeSignal::buy("AAPL")], &market(&[("AAPL", 100.0)]))
        .await;

    assert!(report.executed.is_empty());
    assert!(matches!(report.halted, Some(HaltReason::Drawdown { .. })));
    assert!(h.paper.orders().is_empty());
}

#[tokio::test]
async fn circuit_breaker_halts_the_batch() {
    let h = harness(Portfolio::new(CAPITAL), config());
    let snapshot = market(&[("AAPL", 100.0)]).with_conditions(MarketConditions {
        index_change: -0.06,
        volatility_index: 20.0,
    });
    let report = h
        .engine
        .execute_orders(&[TradeSignal::buy("AAPL")], &snapshot)
        .await;
    assert_eq!(
        report.halted,
        Some(HaltReason::CircuitBreaker {
            index_change: -0.06
        })
    );
    assert!(report.executed.is_empty());
}

#[tokio::test]
async fn failed_health_check_aborts_before_anything_else() {
    let health = HealthStatus {
        disk_ok: true,
        memory_ok: true,
        api_ok: false,
    };
    let h = harness_with(Portfolio::new(CAPITAL), config(), HashMap::new(), health);
    let report = h
        .engine
        .execute_orders(&[TradeSignal::buy("AAPL")], &market(&[("AAPL", 100.0)]))
        .await;

    assert!(matches!(
        report.halted,
        Some(HaltReason::Unhealthy { api_ok: false, .. })
    ));
    assert!(report.executed.is_empty());
    assert!(report.rejected.is_empty());
    assert!(h.engine.portfolio_snapshot().await.equity_history.is_empty());
}

// ─── Brokers ────────────────────────────────────────────────────────

fn flaky_engine(failures: usize) -> ExecutionEngine {
    harness(Portfolio::new(CAPITAL), config())
        .engine
        .with_live_broker(Arc::new(FlakyBroker {
            failures,
            calls: AtomicUsize::new(0),
        }))
}

#[tokio::test]
async fn broker_retries_until_accepted() {
    let engine = flaky_engine(2);
    let report = engine
        .execute_orders(&[buy_qty("AAPL", 10.0)], &market(&[("AAPL", 100.0)]))
        .await;
    assert_eq!(report.executed[0].attempts, 3);
    assert_eq!(report.executed[0].broker, "flaky");
}

#[tokio::test]
async fn broker_gives_up_after_three_attempts() {
    let engine = flaky_engine(5);
    let report = engine
        .execute_orders(&[buy_qty("AAPL", 10.0)], &market(&[("AAPL", 100.0)]))
        .await;
    assert!(report.executed.is_empty());
    assert!(matches!(
        report.rejected[0].reason,
        RejectReason::Broker { attempts: 3, .. }
    ));
    let portfolio = engine.portfolio_snapshot().await;
    assert_eq!(portfolio.cash, CAPITAL);
    assert!(!portfolio.has_position("AAPL"));
}

#[tokio::test]
async fn unsupported_live_sell_falls_back_to_paper() {
    let h = harness(portfolio_with(&[("MSFT", 100.0, 50.0)]), config());
    let paper = h.paper.clone();
    let engine = h
        .engine
        .with_live_broker(Arc::new(LiveBroker { balance: 995_000.0 }));

    let report = engine
        .execute_orders(&[TradeSignal::sell("MSFT")], &market(&[("MSFT", 55.0)]))
        .await;

    assert_eq!(report.executed.len(), 1);
    assert_eq!(report.executed[0].broker, "paper");
    let orders = paper.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Sell);

    let portfolio = engine.portfolio_snapshot().await;
    assert!((portfolio.cash - (995_000.0 + 5_500.0)).abs() < 1e-6);
    assert!((portfolio.trades[0].return_pct - 0.1).abs() < 1e-12);
}

#[tokio::test]
async fn sells_skip_a_willing_live_broker() {
    let mut portfolio = portfolio_with(&[("MSFT", 100.0, 50.0), ("AAPL", 100.0, 100.0)]);
    portfolio.slot_mut("AAPL").protective_stop = Some(95.0);
    let h = harness(portfolio, config());
    let paper = h.paper.clone();
    let live = Arc::new(WillingLiveBroker::default());
    let engine = h.engine.with_live_broker(live.clone());

    let report = engine
        .execute_orders(&[TradeSignal::sell("MSFT")], &market(&[("MSFT", 55.0)]))
        .await;
    assert_eq!(report.executed.len(), 1);
    assert_eq!(report.executed[0].broker, "paper");

    let closed = engine.enforce_stops(&market(&[("AAPL", 94.0)])).await;
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].exit_reason, ExitReason::StopLoss);

    assert_eq!(live.sells.load(Ordering::SeqCst), 0);
    let orders = paper.orders();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.side == OrderSide::Sell));
}

// ─── Concurrency ────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_batches_do_not_double_spend_cash() {
    let cfg = ExecutionConfig {
        limits: ExposureLimits {
            max_per_ticker_pct: 1.0,
            max_per_sector_pct: 1.0,
        },
        ..config()
    };
    let h = harness(Portfolio::new(CAPITAL), cfg);
    let prices = market(&[("AAPL", 100.0)]);
    let first = [buy_qty("AAPL", 6_000.0)];
    let second = [buy_qty("AAPL", 6_000.0)];

    let (a, b) = tokio::join!(
        h.engine.execute_orders(&first, &prices),
        h.engine.execute_orders(&second, &prices),
    );

    assert_eq!(a.executed.len() + b.executed.len(), 1);
    let rejected: Vec<_> = a.rejected.iter().chain(b.rejected.iter()).collect();
    assert_eq!(rejected.len(), 1);
    assert!(matches!(
        rejected[0].reason,
        RejectReason::InsufficientCash { .. }
    ));

    let portfolio = h.engine.portfolio_snapshot().await;
    assert!((portfolio.cash - 400_000.0).abs() < 1e-6);
    assert_eq!(portfolio.equity_history.len(), 2);
}
