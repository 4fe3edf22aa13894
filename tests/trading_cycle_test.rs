use async_trait::async_trait;
use perpbot::api::{
    CandleSource, ExchangeTrading, OrderAck, OrderRequest, PositionRecord, RetryPolicy,
    TriggerDirection,
};
use perpbot::config::SnapshotSource;
use perpbot::db::{InMemorySnapshotStore, SnapshotStore};
use perpbot::error::ExchangeError;
use perpbot::execution::{
    BracketExecutor, BracketLeg, CycleOutcome, FeatureFeed, PositionGuard, TradingCycle,
};
use perpbot::indicators::{CrossDirection, CrossEvent, FeatureSnapshot, Momentum};
use perpbot::models::{Candle, Side, Signal, Symbol, Timeframe};
use perpbot::strategy::MtfSignalEngine;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==================== Fake exchange ====================

#[derive(Default)]
struct FakeExchange {
    positions: Mutex<Option<Result<Vec<PositionRecord>, ExchangeError>>>,
    candle_error: Option<ExchangeError>,
    reject_triggers: Vec<f64>,
    orders: Mutex<Vec<OrderRequest>>,
    position_calls: AtomicU32,
    candle_calls: AtomicU32,
}

impl FakeExchange {
    fn flat() -> Self {
        Self {
            positions: Mutex::new(Some(Ok(vec![]))),
            ..Self::default()
        }
    }

    fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandleSource for FakeExchange {
    async fn get_candles(
        &self,
        _symbol: &Symbol,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.candle_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.candle_error {
            return Err(e.clone());
        }
        Ok(create_test_candles(timeframe, limit))
    }
}

#[async_trait]
impl ExchangeTrading for FakeExchange {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let mut orders = self.orders.lock().unwrap();
        orders.push(order.clone());
        if let Some(trigger) = order.params.trigger_price {
            if self.reject_triggers.contains(&trigger) {
                return Err(ExchangeError::Rejected {
                    code: 110017,
                    message: "reduce-only rule not satisfied".to_string(),
                });
            }
        }
        Ok(OrderAck {
            order_id: format!("fake-{}", orders.len()),
        })
    }

    async fn get_positions(&self, _symbol: &Symbol) -> Result<Vec<PositionRecord>, ExchangeError> {
        self.position_calls.fetch_add(1, Ordering::SeqCst);
        self.positions
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(vec![]))
    }
}

// ==================== Fixtures ====================

fn create_test_candles(timeframe: Timeframe, count: usize) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            let close = 1.0 + (i as f64 * 0.7).sin() * 0.01;
            Candle {
                timestamp: 1_700_000_000_000 + i as i64 * timeframe.duration_ms(),
                open: close - 0.001,
                high: close + 0.005,
                low: close - 0.005,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Open time of the current 1m bar, fresh for every timeframe
fn current_minute() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    now - now % 60_000
}

fn neutral_snapshot() -> FeatureSnapshot {
    FeatureSnapshot {
        timestamp: current_minute(),
        last_close: 1.0,
        ema: Some(1.0),
        sma: Some(1.0),
        ema_fast: Some(1.0),
        ema_slow: Some(1.0),
        ema_cross: CrossDirection::None,
        recent_ema_cross: None,
        ema_slope: Some(0.0),
        rsi: Some(50.0),
        macd: Some(0.0),
        macd_signal: Some(0.0),
        macd_hist: Some(0.0),
        stoch_k: Some(50.0),
        stoch_d: Some(50.0),
        stoch_cross: None,
        cci: Some(0.0),
        momentum: Momentum::Neutral,
        atr: Some(0.02),
        atr_pct: Some(2.0),
        bb_upper: Some(1.05),
        bb_middle: Some(1.0),
        bb_lower: Some(0.95),
        bb_width: Some(0.1),
        near_upper_band: false,
        adx: Some(30.0),
        adx_slope: Some(0.1),
        obv: 10_000.0,
        obv_slope: 0.0,
        vwap: Some(1.0),
        volume_avg_20: Some(1000.0),
        volume_spike: Some(1.0),
        swing_high: Some(1.06),
        swing_low: Some(0.94),
        patterns: Vec::new(),
    }
}

fn trending(up: bool) -> FeatureSnapshot {
    let sign = if up { 1.0 } else { -1.0 };
    FeatureSnapshot {
        ema: Some(1.0 + sign * 0.05),
        ema_slope: Some(sign * 0.01),
        macd_hist: Some(sign * 0.002),
        ..neutral_snapshot()
    }
}

/// 1m pullback to the lower band inside a 15m/5m uptrend
fn bull_pullback() -> FeatureSnapshot {
    FeatureSnapshot {
        bb_lower: Some(0.999),
        rsi: Some(40.0),
        stoch_cross: Some(CrossEvent {
            direction: CrossDirection::Bullish,
            bars_ago: 1,
        }),
        vwap: Some(1.002),
        obv_slope: 500.0,
        ema_slope: Some(0.001),
        macd_hist: Some(0.001),
        ..neutral_snapshot()
    }
}

async fn seeded_store(
    symbol: &Symbol,
    m1: FeatureSnapshot,
    m5: FeatureSnapshot,
    m15: FeatureSnapshot,
) -> Arc<InMemorySnapshotStore> {
    let store = Arc::new(InMemorySnapshotStore::new());
    store.save(symbol, Timeframe::M1, &m1).await.unwrap();
    store.save(symbol, Timeframe::M5, &m5).await.unwrap();
    store.save(symbol, Timeframe::M15, &m15).await.unwrap();
    store
}

fn build_cycle(
    exchange: Arc<FakeExchange>,
    store: Option<Arc<InMemorySnapshotStore>>,
) -> TradingCycle {
    let symbol = Symbol::new("CORE/USDT:USDT");
    let timeout = Duration::from_secs(1);

    let mut feed = FeatureFeed::new(
        exchange.clone(),
        RetryPolicy::new(2, Duration::from_millis(1)),
        100,
    );
    if let Some(store) = store {
        feed = feed.with_store(store, SnapshotSource::Store, false);
    }

    TradingCycle::new(
        symbol.clone(),
        PositionGuard::new(exchange.clone(), timeout),
        feed,
        Arc::new(MtfSignalEngine::default()),
        BracketExecutor::new(exchange, symbol, 1.0, timeout),
    )
}

// ==================== Scenarios ====================

#[tokio::test]
async fn test_bull_setup_places_full_bracket() {
    let symbol = Symbol::new("COREUSDT");
    let store = seeded_store(&symbol, bull_pullback(), trending(true), trending(true)).await;
    let exchange = Arc::new(FakeExchange::flat());

    let outcome = build_cycle(exchange.clone(), Some(store)).run_once().await;

    let (decision, result) = match outcome {
        CycleOutcome::Executed { decision, result } => (decision, result),
        other => panic!("expected execution, got {:?}", other),
    };
    assert_eq!(decision.signal(), Signal::Buy);
    assert!(result.all_placed());

    let orders = exchange.orders();
    assert_eq!(orders.len(), 3);
    assert_eq!(orders[0].side, Side::Buy);
    assert_eq!(orders[0].price, Some(1.0));
    assert_eq!(orders[1].side, Side::Sell);
    assert_eq!(orders[1].params.trigger_direction, Some(TriggerDirection::Above));
    assert_eq!(orders[2].side, Side::Sell);
    assert_eq!(orders[2].params.trigger_direction, Some(TriggerDirection::Below));
    assert!(orders[1..].iter().all(|o| o.params.reduce_only));
}

#[tokio::test]
async fn test_take_profit_failure_keeps_entry_and_stop() {
    let symbol = Symbol::new("COREUSDT");
    let store = seeded_store(&symbol, bull_pullback(), trending(true), trending(true)).await;
    let exchange = Arc::new(FakeExchange {
        reject_triggers: vec![1.04],
        ..FakeExchange::flat()
    });

    let outcome = build_cycle(exchange.clone(), Some(store)).run_once().await;

    let (decision, result) = match outcome {
        CycleOutcome::Executed { decision, result } => (decision, result),
        other => panic!("expected execution, got {:?}", other),
    };
    let trade = decision.as_trade().unwrap();
    // 15m upper band is farther than 2x ATR
    assert_eq!(trade.take_profit.level, 1.04);
    assert_eq!(result.entry.order_id(), Some("fake-1"));
    assert!(result
        .take_profit
        .error_message()
        .unwrap()
        .contains("reduce-only"));
    assert_eq!(result.stop_loss.order_id(), Some("fake-3"));
    assert_eq!(result.failed_legs(), vec![BracketLeg::TakeProfit]);
}

#[tokio::test]
async fn test_position_query_error_skips_cycle() {
    let exchange = Arc::new(FakeExchange {
        positions: Mutex::new(Some(Err(ExchangeError::Network("connection reset".into())))),
        ..FakeExchange::default()
    });

    let outcome = build_cycle(exchange.clone(), None).run_once().await;

    assert_eq!(outcome, CycleOutcome::ExposureOpen);
    assert_eq!(exchange.position_calls.load(Ordering::SeqCst), 1);
    assert_eq!(exchange.candle_calls.load(Ordering::SeqCst), 0);
    assert!(exchange.orders().is_empty());
}

#[tokio::test]
async fn test_open_position_skips_cycle() {
    let exchange = Arc::new(FakeExchange {
        positions: Mutex::new(Some(Ok(vec![PositionRecord {
            symbol: "COREUSDT".to_string(),
            side: Some(Side::Sell),
            size: 3.0,
        }]))),
        ..FakeExchange::default()
    });

    let outcome = build_cycle(exchange.clone(), None).run_once().await;

    assert_eq!(outcome, CycleOutcome::ExposureOpen);
    assert_eq!(exchange.candle_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_timeframe_disagreement_waits() {
    let symbol = Symbol::new("COREUSDT");
    let store = seeded_store(&symbol, bull_pullback(), trending(false), trending(true)).await;
    let exchange = Arc::new(FakeExchange::flat());

    let outcome = build_cycle(exchange.clone(), Some(store)).run_once().await;

    let decision = match outcome {
        CycleOutcome::Decided(decision) => decision,
        other => panic!("expected WAIT, got {:?}", other),
    };
    assert_eq!(decision.signal(), Signal::Wait);
    assert_eq!(decision.confidence_score(), 55);
    assert!(exchange.orders().is_empty());
}

#[tokio::test]
async fn test_missing_stored_timeframe_waits() {
    let symbol = Symbol::new("COREUSDT");
    let store = Arc::new(InMemorySnapshotStore::new());
    store.save(&symbol, Timeframe::M1, &bull_pullback()).await.unwrap();
    store.save(&symbol, Timeframe::M15, &trending(true)).await.unwrap();
    let exchange = Arc::new(FakeExchange::flat());

    let outcome = build_cycle(exchange.clone(), Some(store)).run_once().await;

    let decision = match outcome {
        CycleOutcome::Decided(decision) => decision,
        other => panic!("expected WAIT, got {:?}", other),
    };
    assert_eq!(decision.confidence_score(), 0);
    assert!(decision.reasoning().contains("5m"), "{}", decision.reasoning());
}

#[tokio::test]
async fn test_stale_stored_snapshot_waits() {
    let symbol = Symbol::new("COREUSDT");
    let day_old = FeatureSnapshot {
        timestamp: current_minute() - 86_400_000,
        ..bull_pullback()
    };
    let store = seeded_store(&symbol, day_old, trending(true), trending(true)).await;
    let exchange = Arc::new(FakeExchange::flat());

    let outcome = build_cycle(exchange.clone(), Some(store)).run_once().await;

    let decision = match outcome {
        CycleOutcome::Decided(decision) => decision,
        other => panic!("expected WAIT, got {:?}", other),
    };
    assert_eq!(decision.signal(), Signal::Wait);
    assert_eq!(decision.confidence_score(), 0);
    assert!(decision.reasoning().contains("1m"), "{}", decision.reasoning());
    assert!(exchange.orders().is_empty());
}

#[tokio::test]
async fn test_torn_stored_set_waits() {
    let symbol = Symbol::new("COREUSDT");
    // Within the 15m age limit but two buckets behind the 1m snapshot
    let lagging = FeatureSnapshot {
        timestamp: current_minute() - 1_800_000,
        ..trending(true)
    };
    let store = seeded_store(&symbol, bull_pullback(), trending(true), lagging).await;
    let exchange = Arc::new(FakeExchange::flat());

    let outcome = build_cycle(exchange.clone(), Some(store)).run_once().await;

    let decision = match outcome {
        CycleOutcome::Decided(decision) => decision,
        other => panic!("expected WAIT, got {:?}", other),
    };
    assert_eq!(decision.confidence_score(), 0);
    assert!(decision.reasoning().contains("15m"), "{}", decision.reasoning());
    assert!(exchange.orders().is_empty());
}

#[tokio::test]
async fn test_live_feed_runs_decision() {
    let exchange = Arc::new(FakeExchange::flat());

    let outcome = build_cycle(exchange.clone(), None).run_once().await;

    assert!(
        matches!(outcome, CycleOutcome::Decided(_) | CycleOutcome::Executed { .. }),
        "{:?}",
        outcome
    );
    assert_eq!(exchange.candle_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_fatal_candle_error_fails_cycle() {
    let exchange = Arc::new(FakeExchange {
        candle_error: Some(ExchangeError::InvalidSymbol("COREUSDT".into())),
        ..FakeExchange::flat()
    });

    let outcome = build_cycle(exchange.clone(), None).run_once().await;

    assert!(matches!(outcome, CycleOutcome::Failed(ref e) if e.contains("invalid symbol")));
    assert!(exchange.orders().is_empty());
}

#[tokio::test]
async fn test_loop_stops_on_shutdown() {
    let exchange = Arc::new(FakeExchange {
        positions: Mutex::new(Some(Ok(vec![PositionRecord {
            symbol: "COREUSDT".to_string(),
            side: Some(Side::Buy),
            size: 1.0,
        }]))),
        ..FakeExchange::default()
    });
    let cycle = build_cycle(exchange.clone(), None);

    cycle
        .run(
            Duration::from_millis(20),
            tokio::time::sleep(Duration::from_millis(70)),
        )
        .await;

    let cycles = exchange.position_calls.load(Ordering::SeqCst);
    assert!((2..=5).contains(&cycles), "ran {} cycles", cycles);
}
