use serde::{Deserialize, Serialize};
use std::fmt;

use crate::indicators::{CandlePattern, CrossDirection, FeatureSnapshot};
use crate::models::{Side, Timeframe};
use crate::strategy::decision::round_price;
use crate::strategy::{Decision, RiskLevel, Strategy, TimeframeSnapshots, TradeDecision};

/// Thresholds of the multi-timeframe decision rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub adx_trend_min: f64,         // Trend filter and weak-trend conflict
    pub adx_strong: f64,            // OBV divergence costs half above this (15m)
    pub rsi_buy_max: f64,           // BUY after EMA cross needs RSI below, neutral band low edge
    pub rsi_sell_min: f64,          // SELL after EMA cross needs RSI above, neutral band high edge
    pub ema_cross_max_bars: usize,  // EMA8/21 cross must be fewer bars ago than this
    pub stoch_cross_max_bars: usize, // Stochastic cross must be fewer bars ago than this
    pub band_tag_atr_ratio: f64,    // Close within ratio * ATR of a band counts as a tag
    pub max_vwap_distance_pct: f64, // Veto beyond this distance from VWAP
    pub stop_loss_atr_mult: f64,
    pub take_profit_atr_mult: f64,
    pub base_score: f64,
    pub confirmation_bonus: f64,
    pub conflict_penalty: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            adx_trend_min: 20.0,
            adx_strong: 25.0,
            rsi_buy_max: 45.0,
            rsi_sell_min: 55.0,
            ema_cross_max_bars: 2,
            stoch_cross_max_bars: 3,
            band_tag_atr_ratio: 0.1,
            max_vwap_distance_pct: 0.5,
            stop_loss_atr_mult: 1.5,
            take_profit_atr_mult: 2.0,
            base_score: 55.0,
            confirmation_bonus: 8.0,
            conflict_penalty: 5.0,
        }
    }
}

/// Trend state of one timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Bull,
    Bear,
    Neither,
}

impl Trend {
    pub fn side(&self) -> Option<Side> {
        match self {
            Trend::Bull => Some(Side::Buy),
            Trend::Bear => Some(Side::Sell),
            Trend::Neither => None,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bull => f.write_str("Bull"),
            Trend::Bear => f.write_str("Bear"),
            Trend::Neither => f.write_str("Neither"),
        }
    }
}

/// Bull: EMA > SMA, EMA rising, MACD histogram > 0, ADX >= min.
/// Bear mirrors the first three; ADX is a strength gate for both.
pub fn classify_trend(snapshot: &FeatureSnapshot, config: &SignalConfig) -> Trend {
    let (Some(ema), Some(sma), Some(slope), Some(hist), Some(adx)) = (
        snapshot.ema,
        snapshot.sma,
        snapshot.ema_slope,
        snapshot.macd_hist,
        snapshot.adx,
    ) else {
        return Trend::Neither;
    };

    if adx < config.adx_trend_min {
        Trend::Neither
    } else if ema > sma && slope > 0.0 && hist > 0.0 {
        Trend::Bull
    } else if ema < sma && slope < 0.0 && hist < 0.0 {
        Trend::Bear
    } else {
        Trend::Neither
    }
}

fn fmt_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.4}", v),
        None => "n/a".to_string(),
    }
}

fn describe_trend(snapshot: &FeatureSnapshot) -> String {
    format!(
        "EMA {} vs SMA {}, EMA slope {}, MACD hist {}, ADX {}",
        fmt_value(snapshot.ema),
        fmt_value(snapshot.sma),
        fmt_value(snapshot.ema_slope),
        fmt_value(snapshot.macd_hist),
        fmt_value(snapshot.adx)
    )
}

/// Multi-timeframe rule engine: 15m/5m trend filter, 1m entry timing,
/// volume confirmation, ATR/Bollinger risk levels and point scoring
pub struct MtfSignalEngine {
    config: SignalConfig,
}

impl MtfSignalEngine {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    fn rule_wait(&self, reasoning: String) -> Decision {
        tracing::debug!("WAIT: {}", reasoning);
        let score = self.config.base_score.round().clamp(0.0, 100.0) as u8;
        Decision::wait(score, reasoning)
    }

    /// Decide from the three timeframe snapshots
    pub fn decide_snapshots(
        &self,
        m1: &FeatureSnapshot,
        m5: &FeatureSnapshot,
        m15: &FeatureSnapshot,
    ) -> Decision {
        let cfg = &self.config;

        // ==================== TREND FILTER ====================
        let trend_15m = classify_trend(m15, cfg);
        let trend_5m = classify_trend(m5, cfg);

        let side = match (trend_15m, trend_5m) {
            (Trend::Bull, Trend::Bull) | (Trend::Bear, Trend::Bear) => match trend_15m.side() {
                Some(side) => side,
                None => return self.rule_wait("Trend filter undecided".to_string()),
            },
            _ => {
                return self.rule_wait(format!(
                    "Trend filter: 15m {} ({}) vs 5m {} ({}); both must agree on Bull or Bear",
                    trend_15m,
                    describe_trend(m15),
                    trend_5m,
                    describe_trend(m5)
                ));
            }
        };

        let sign = side.sign();
        let wanted_cross = match side {
            Side::Buy => CrossDirection::Bullish,
            Side::Sell => CrossDirection::Bearish,
        };
        let close = m1.last_close;

        // ==================== ENTRY TIMING (1m) ====================
        let (band, band_name) = match side {
            Side::Buy => (m1.bb_lower, "lower"),
            Side::Sell => (m1.bb_upper, "upper"),
        };
        let band_tag = band.is_some_and(|band| {
            let beyond = (close - band) * sign <= 0.0;
            let touching = m1
                .atr
                .is_some_and(|atr| (close - band).abs() < cfg.band_tag_atr_ratio * atr);
            beyond || touching
        });

        let fresh_ema_cross = m1
            .recent_ema_cross
            .filter(|e| e.direction == wanted_cross && e.bars_ago < cfg.ema_cross_max_bars);
        let rsi_allows_cross = m1.rsi.is_some_and(|rsi| match side {
            Side::Buy => rsi < cfg.rsi_buy_max,
            Side::Sell => rsi > cfg.rsi_sell_min,
        });
        let cross_entry = fresh_ema_cross.is_some() && rsi_allows_cross;

        if !band_tag && !cross_entry {
            return self.rule_wait(format!(
                "{} trend on 15m/5m but no 1m entry: close {:.4} does not tag {} band {}, \
                 EMA8/21 cross {} with RSI {}",
                trend_15m,
                close,
                band_name,
                fmt_value(band),
                match m1.recent_ema_cross {
                    Some(e) => format!("{:?} {} bars ago", e.direction, e.bars_ago),
                    None => "absent".to_string(),
                },
                fmt_value(m1.rsi)
            ));
        }

        let stoch_cross = m1
            .stoch_cross
            .filter(|e| e.direction == wanted_cross && e.bars_ago < cfg.stoch_cross_max_bars);
        let Some(stoch_cross) = stoch_cross else {
            return self.rule_wait(format!(
                "{} setup without Stochastic confirmation: no {:?} %K/%D cross in the last {} candles (%K {}, %D {})",
                side,
                wanted_cross,
                cfg.stoch_cross_max_bars,
                fmt_value(m1.stoch_k),
                fmt_value(m1.stoch_d)
            ));
        };

        // ==================== VOLUME CONFIRMATION ====================
        let vwap_distance_pct = match m1.vwap {
            Some(vwap) if close > 0.0 => (close - vwap).abs() / close * 100.0,
            _ => {
                return self.rule_wait(format!(
                    "{} setup vetoed: VWAP undefined (no traded volume), close {:.4}",
                    side, close
                ));
            }
        };
        if vwap_distance_pct > cfg.max_vwap_distance_pct {
            return self.rule_wait(format!(
                "{} setup vetoed: close {:.4} is {:.4}% from VWAP {}, limit {:.2}%",
                side,
                close,
                vwap_distance_pct,
                fmt_value(m1.vwap),
                cfg.max_vwap_distance_pct
            ));
        }

        let obv_direction = m1.obv_slope * sign;
        let obv_aligned = obv_direction > 0.0;
        let obv_divergent = obv_direction < 0.0;
        let adx_15m = m15.adx.unwrap_or(0.0);
        let obv_penalty = if !obv_divergent {
            0.0
        } else if adx_15m >= cfg.adx_strong {
            cfg.conflict_penalty / 2.0
        } else {
            cfg.conflict_penalty
        };

        // ==================== RISK LEVELS ====================
        let Some(atr_15m) = m15.atr.filter(|atr| *atr > 0.0) else {
            return Decision::wait(
                0,
                format!("{} setup but ATR(15m) is undefined; cannot place stop-loss", side),
            );
        };

        let entry_price = round_price(close);
        let stop_distance = cfg.stop_loss_atr_mult * atr_15m;
        let stop_loss = RiskLevel::new(
            entry_price - sign * stop_distance,
            format!("{:.1}x ATR(15m) {:.4} from entry", cfg.stop_loss_atr_mult, atr_15m),
        );

        let atr_target = cfg.take_profit_atr_mult * atr_15m;
        let nearest_band = [m15.bb_lower, m15.bb_middle, m15.bb_upper]
            .into_iter()
            .flatten()
            .map(|line| (line - entry_price) * sign)
            .filter(|distance| *distance > 0.0)
            .fold(None, |nearest: Option<f64>, d| Some(nearest.map_or(d, |n| n.min(d))));

        let take_profit = match nearest_band {
            Some(distance) if distance < atr_target => RiskLevel::new(
                entry_price + sign * distance,
                format!(
                    "nearest 15m Bollinger band {:.4} away, inside {:.1}x ATR(15m) {:.4}",
                    distance, cfg.take_profit_atr_mult, atr_target
                ),
            ),
            _ => RiskLevel::new(
                entry_price + sign * atr_target,
                format!("{:.1}x ATR(15m) {:.4} from entry", cfg.take_profit_atr_mult, atr_15m),
            ),
        };

        // ==================== SCORING ====================
        let confirmations = [
            ("trend match", true),
            (
                "EMA slope",
                m1.ema_slope.is_some_and(|slope| slope * sign > 0.0),
            ),
            (
                "MACD histogram",
                m1.macd_hist.is_some_and(|hist| hist * sign > 0.0),
            ),
            ("OBV slope", obv_aligned),
            ("Stochastic cross", true),
        ];
        let confirmed: Vec<&str> = confirmations
            .iter()
            .filter(|(_, hit)| *hit)
            .map(|(name, _)| *name)
            .collect();

        let contradicting: Vec<CandlePattern> = m1
            .patterns
            .iter()
            .copied()
            .filter(|p| p.contradicts(side.as_signal()))
            .collect();

        let mut penalties: Vec<String> = Vec::new();
        let mut penalty_points = 0.0;
        if let Some(adx) = m1.adx.filter(|adx| *adx < cfg.adx_trend_min) {
            penalties.push(format!("ADX {:.2} < {:.0}", adx, cfg.adx_trend_min));
            penalty_points += cfg.conflict_penalty;
        }
        if obv_divergent {
            penalties.push(format!(
                "OBV divergence -{:.1} (15m ADX {:.2})",
                obv_penalty, adx_15m
            ));
            penalty_points += obv_penalty;
        }
        if let Some(rsi) = m1
            .rsi
            .filter(|rsi| *rsi >= cfg.rsi_buy_max && *rsi <= cfg.rsi_sell_min)
        {
            penalties.push(format!("RSI {:.2} in neutral band", rsi));
            penalty_points += cfg.conflict_penalty;
        }
        if !contradicting.is_empty() {
            let names: Vec<&str> = contradicting.iter().map(|p| p.as_str()).collect();
            penalties.push(format!("contrary pattern {}", names.join("/")));
            penalty_points += cfg.conflict_penalty;
        }

        let raw_score = cfg.base_score + cfg.confirmation_bonus * confirmed.len() as f64
            - penalty_points;
        let confidence_score = raw_score.round().clamp(0.0, 100.0) as u8;

        let trigger = if band_tag {
            format!("close {:.4} tagged {} band {}", close, band_name, fmt_value(band))
        } else {
            format!(
                "EMA8/21 {:?} cross {} bars ago with RSI {}",
                wanted_cross,
                fresh_ema_cross.map_or(0, |e| e.bars_ago),
                fmt_value(m1.rsi)
            )
        };

        let reasoning = format!(
            "{side} on aligned {trend} trend (15m: {t15}; 5m: {t5}). Entry {entry:.4}: {trigger}; \
             Stochastic {dir:?} cross {bars} bars ago (%K {k}, %D {d}). VWAP distance {vwap:.4}%, \
             OBV slope {obv:.4}. Score {score}: base {base:.0} + {bonus:.0} x {n} [{confirmed}], \
             penalties [{penalties}]. SL {sl:.4} ({sl_why}); TP {tp:.4} ({tp_why}).",
            side = side.as_signal(),
            trend = trend_15m,
            t15 = describe_trend(m15),
            t5 = describe_trend(m5),
            entry = entry_price,
            trigger = trigger,
            dir = stoch_cross.direction,
            bars = stoch_cross.bars_ago,
            k = fmt_value(m1.stoch_k),
            d = fmt_value(m1.stoch_d),
            vwap = vwap_distance_pct,
            obv = m1.obv_slope,
            score = confidence_score,
            base = cfg.base_score,
            bonus = cfg.confirmation_bonus,
            n = confirmed.len(),
            confirmed = confirmed.join(", "),
            penalties = penalties.join(", "),
            sl = stop_loss.level,
            sl_why = stop_loss.rationale,
            tp = take_profit.level,
            tp_why = take_profit.rationale,
        );

        tracing::info!(
            signal = %side.as_signal(),
            score = confidence_score,
            entry = entry_price,
            stop_loss = stop_loss.level,
            take_profit = take_profit.level,
            "Actionable decision"
        );

        Decision::Actionable(TradeDecision {
            side,
            confidence_score,
            entry_price,
            stop_loss,
            take_profit,
            reasoning,
        })
    }
}

impl Default for MtfSignalEngine {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

impl Strategy for MtfSignalEngine {
    fn decide(&self, snapshots: &TimeframeSnapshots) -> Decision {
        match (
            snapshots.get(Timeframe::M1),
            snapshots.get(Timeframe::M5),
            snapshots.get(Timeframe::M15),
        ) {
            (Some(m1), Some(m5), Some(m15)) => self.decide_snapshots(m1, m5, m15),
            _ => {
                let missing: Vec<&str> = snapshots
                    .missing(self.required_timeframes())
                    .iter()
                    .map(|tf| tf.as_str())
                    .collect();
                tracing::warn!("Missing feature snapshots: {}", missing.join(", "));
                Decision::wait(
                    0,
                    format!(
                        "No feature snapshot for {}; cannot evaluate trend and entry",
                        missing.join(", ")
                    ),
                )
            }
        }
    }

    fn name(&self) -> &str {
        "Multi-Timeframe Trend Pullback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{CrossEvent, Momentum};
    use crate::models::Signal;
    use crate::strategy::Confidence;

    fn create_test_snapshot() -> FeatureSnapshot {
        FeatureSnapshot {
            timestamp: 1_700_000_000_000,
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

    fn trending(trend: Trend) -> FeatureSnapshot {
        let sign = if trend == Trend::Bull { 1.0 } else { -1.0 };
        FeatureSnapshot {
            ema: Some(1.0 + sign * 0.05),
            sma: Some(1.0),
            ema_slope: Some(sign * 0.01),
            macd_hist: Some(sign * 0.002),
            adx: Some(30.0),
            ..create_test_snapshot()
        }
    }

    /// 15m, 5m and 1m snapshots that produce a full-confidence BUY
    fn bull_setup() -> (FeatureSnapshot, FeatureSnapshot, FeatureSnapshot) {
        let m15 = FeatureSnapshot {
            atr: Some(0.02),
            bb_lower: Some(0.95),
            bb_middle: Some(1.01),
            bb_upper: Some(1.06),
            ..trending(Trend::Bull)
        };
        let m5 = trending(Trend::Bull);
        let m1 = FeatureSnapshot {
            last_close: 1.0,
            bb_lower: Some(0.999),
            atr: Some(0.02),
            rsi: Some(40.0),
            stoch_cross: Some(CrossEvent {
                direction: CrossDirection::Bullish,
                bars_ago: 1,
            }),
            vwap: Some(1.002),
            obv_slope: 500.0,
            ema_slope: Some(0.001),
            macd_hist: Some(0.001),
            adx: Some(30.0),
            ..create_test_snapshot()
        };
        (m1, m5, m15)
    }

    fn bear_setup() -> (FeatureSnapshot, FeatureSnapshot, FeatureSnapshot) {
        let m15 = FeatureSnapshot {
            atr: Some(0.02),
            bb_lower: Some(0.94),
            bb_middle: Some(0.99),
            bb_upper: Some(1.05),
            ..trending(Trend::Bear)
        };
        let m5 = trending(Trend::Bear);
        let m1 = FeatureSnapshot {
            last_close: 1.0,
            bb_upper: Some(1.001),
            atr: Some(0.02),
            rsi: Some(60.0),
            stoch_cross: Some(CrossEvent {
                direction: CrossDirection::Bearish,
                bars_ago: 0,
            }),
            vwap: Some(0.998),
            obv_slope: -500.0,
            ema_slope: Some(-0.001),
            macd_hist: Some(-0.001),
            adx: Some(30.0),
            ..create_test_snapshot()
        };
        (m1, m5, m15)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_trend_classification() {
        let config = SignalConfig::default();
        assert_eq!(classify_trend(&trending(Trend::Bull), &config), Trend::Bull);
        assert_eq!(classify_trend(&trending(Trend::Bear), &config), Trend::Bear);

        let weak = FeatureSnapshot {
            adx: Some(19.9),
            ..trending(Trend::Bear)
        };
        assert_eq!(classify_trend(&weak, &config), Trend::Neither);

        let mixed = FeatureSnapshot {
            macd_hist: Some(-0.001),
            ..trending(Trend::Bull)
        };
        assert_eq!(classify_trend(&mixed, &config), Trend::Neither);

        let undefined = FeatureSnapshot {
            sma: None,
            ..trending(Trend::Bull)
        };
        assert_eq!(classify_trend(&undefined, &config), Trend::Neither);
    }

    #[test]
    fn test_full_confidence_buy() {
        let (m1, m5, m15) = bull_setup();
        let decision = MtfSignalEngine::default().decide_snapshots(&m1, &m5, &m15);

        assert_eq!(decision.signal(), Signal::Buy);
        assert_eq!(decision.confidence_score(), 95);
        assert_eq!(decision.confidence(), Confidence::High);

        let trade = decision.as_trade().unwrap();
        assert_close(trade.entry_price, 1.0);
        assert_close(trade.stop_loss.level, 0.97);
        // 15m middle band is 0.01 away, closer than 2x ATR = 0.04
        assert_close(trade.take_profit.level, 1.01);
        assert!(trade.reasoning.contains("0.9990"), "{}", trade.reasoning);
        assert!(trade.reasoning.contains("Score 95"));
    }

    #[test]
    fn test_full_confidence_sell() {
        let (m1, m5, m15) = bear_setup();
        let decision = MtfSignalEngine::default().decide_snapshots(&m1, &m5, &m15);

        assert_eq!(decision.signal(), Signal::Sell);
        assert_eq!(decision.confidence_score(), 95);

        let trade = decision.as_trade().unwrap();
        assert_close(trade.stop_loss.level, 1.03);
        assert_close(trade.take_profit.level, 0.99);
    }

    #[test]
    fn test_take_profit_falls_back_to_atr() {
        let (m1, m5, mut m15) = bull_setup();
        m15.bb_lower = Some(0.90);
        m15.bb_middle = Some(0.95);
        m15.bb_upper = Some(0.99);

        let decision = MtfSignalEngine::default().decide_snapshots(&m1, &m5, &m15);
        assert_close(decision.as_trade().unwrap().take_profit.level, 1.04);
    }

    #[test]
    fn test_trend_disagreement_waits() {
        // 15m Bull, 5m Bear: WAIT whatever the 1m says
        let (m1, _, m15) = bull_setup();
        let m5 = trending(Trend::Bear);
        let decision = MtfSignalEngine::default().decide_snapshots(&m1, &m5, &m15);

        assert_eq!(decision.signal(), Signal::Wait);
        assert_eq!(decision.confidence_score(), 55);
        assert_eq!(decision.confidence(), Confidence::Medium);
        assert!(decision.reasoning().contains("15m Bull"));
        assert!(decision.reasoning().contains("5m Bear"));
        assert!(decision.as_trade().is_none());
    }

    #[test]
    fn test_missing_timeframe_waits_with_zero_score() {
        let (m1, _, m15) = bull_setup();
        let snapshots = TimeframeSnapshots {
            m1: Some(m1),
            m5: None,
            m15: Some(m15),
        };
        let decision = MtfSignalEngine::default().decide(&snapshots);

        assert_eq!(decision.signal(), Signal::Wait);
        assert_eq!(decision.confidence_score(), 0);
        assert_eq!(decision.confidence(), Confidence::Low);
        assert!(decision.reasoning().contains("5m"));
    }

    #[test]
    fn test_ema_cross_entry_requires_low_rsi() {
        let (mut m1, m5, m15) = bull_setup();
        m1.bb_lower = Some(0.9);
        m1.recent_ema_cross = Some(CrossEvent {
            direction: CrossDirection::Bullish,
            bars_ago: 1,
        });

        let engine = MtfSignalEngine::default();
        assert_eq!(engine.decide_snapshots(&m1, &m5, &m15).signal(), Signal::Buy);

        m1.rsi = Some(47.0);
        assert_eq!(engine.decide_snapshots(&m1, &m5, &m15).signal(), Signal::Wait);

        m1.rsi = Some(40.0);
        m1.recent_ema_cross = Some(CrossEvent {
            direction: CrossDirection::Bullish,
            bars_ago: 2,
        });
        assert_eq!(engine.decide_snapshots(&m1, &m5, &m15).signal(), Signal::Wait);
    }

    #[test]
    fn test_requires_stochastic_cross() {
        let (mut m1, m5, m15) = bull_setup();
        let engine = MtfSignalEngine::default();

        m1.stoch_cross = Some(CrossEvent {
            direction: CrossDirection::Bullish,
            bars_ago: 3,
        });
        assert_eq!(engine.decide_snapshots(&m1, &m5, &m15).signal(), Signal::Wait);

        m1.stoch_cross = Some(CrossEvent {
            direction: CrossDirection::Bearish,
            bars_ago: 0,
        });
        let decision = engine.decide_snapshots(&m1, &m5, &m15);
        assert_eq!(decision.signal(), Signal::Wait);
        assert!(decision.reasoning().contains("Stochastic"));
    }

    #[test]
    fn test_vwap_veto() {
        let (mut m1, m5, m15) = bull_setup();
        let engine = MtfSignalEngine::default();

        m1.vwap = Some(1.01);
        let decision = engine.decide_snapshots(&m1, &m5, &m15);
        assert_eq!(decision.signal(), Signal::Wait);
        assert!(decision.reasoning().contains("VWAP"));

        m1.vwap = None;
        assert_eq!(engine.decide_snapshots(&m1, &m5, &m15).signal(), Signal::Wait);
    }

    #[test]
    fn test_obv_divergence_penalty_depends_on_15m_adx() {
        let (mut m1, m5, mut m15) = bull_setup();
        m1.obv_slope = -500.0;
        let engine = MtfSignalEngine::default();

        // Lost OBV confirmation (-8) plus half penalty (-2.5): 84.5 rounds to 85
        let decision = engine.decide_snapshots(&m1, &m5, &m15);
        assert_eq!(decision.signal(), Signal::Buy);
        assert_eq!(decision.confidence_score(), 85);

        m15.adx = Some(22.0);
        let decision = engine.decide_snapshots(&m1, &m5, &m15);
        assert_eq!(decision.signal(), Signal::Buy);
        assert_eq!(decision.confidence_score(), 82);
    }

    #[test]
    fn test_conflicts_reduce_score() {
        let (mut m1, m5, m15) = bull_setup();
        m1.rsi = Some(50.0);
        m1.adx = Some(15.0);
        m1.patterns = vec![CandlePattern::ShootingStar, CandlePattern::Doji];
        m1.ema_slope = Some(-0.001);

        let decision = MtfSignalEngine::default().decide_snapshots(&m1, &m5, &m15);

        // 55 + 4 * 8 - 3 * 5
        assert_eq!(decision.signal(), Signal::Buy);
        assert_eq!(decision.confidence_score(), 72);
        assert_eq!(decision.confidence(), Confidence::Medium);
        assert!(decision.reasoning().contains("shooting_star"));
    }

    #[test]
    fn test_score_is_clamped() {
        let (m1, m5, m15) = bull_setup();
        let engine = MtfSignalEngine::new(SignalConfig {
            confirmation_bonus: 20.0,
            ..SignalConfig::default()
        });

        let decision = engine.decide_snapshots(&m1, &m5, &m15);
        assert_eq!(decision.confidence_score(), 100);
        assert_eq!(decision.confidence(), Confidence::High);
    }

    #[test]
    fn test_undefined_atr_waits() {
        let (m1, m5, mut m15) = bull_setup();
        m15.atr = None;

        let decision = MtfSignalEngine::default().decide_snapshots(&m1, &m5, &m15);
        assert_eq!(decision.signal(), Signal::Wait);
        assert_eq!(decision.confidence_score(), 0);
    }
}
