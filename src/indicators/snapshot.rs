use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;
use crate::indicators::adx::adx_series;
use crate::indicators::atr::{atr_percent, calculate_atr};
use crate::indicators::bollinger::calculate_bollinger;
use crate::indicators::cci::calculate_cci;
use crate::indicators::crossover::{cross_at, last_cross, CrossDirection, CrossEvent};
use crate::indicators::macd::calculate_macd;
use crate::indicators::market_analysis::{
    calculate_average_volume, calculate_vwap, obv_series, swing_levels, volume_spike_ratio,
};
use crate::indicators::moving_average::{ema_series, slope, sma_series};
use crate::indicators::patterns::{detect_patterns, CandlePattern};
use crate::indicators::rsi::calculate_rsi;
use crate::indicators::stochastic::stochastic_series;
use crate::models::Candle;

pub const TREND_PERIOD: usize = 21;
pub const FAST_EMA_PERIOD: usize = 8;
pub const SLOW_EMA_PERIOD: usize = 21;
pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const ADX_PERIOD: usize = 14;
pub const CCI_PERIOD: usize = 20;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD: f64 = 2.0;
pub const VOLUME_AVG_PERIOD: usize = 20;
pub const SWING_LOOKBACK: usize = 10;
/// How far back crosses are reported in `recent_ema_cross` / `stoch_cross`
pub const CROSS_LOOKBACK: usize = 5;

const MIN_CANDLES: usize = 2;

/// Price vs EMA21 combined with RSI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Momentum {
    Bullish,
    Bearish,
    Neutral,
}

impl Momentum {
    pub fn classify(close: f64, ema: Option<f64>, rsi: Option<f64>) -> Self {
        match (ema, rsi) {
            (Some(ema), Some(rsi)) if close > ema && rsi > 55.0 => Momentum::Bullish,
            (Some(ema), Some(rsi)) if close < ema && rsi < 45.0 => Momentum::Bearish,
            _ => Momentum::Neutral,
        }
    }
}

/// Indicator picture of one timeframe at its latest candle
///
/// `None` marks a value that could not be computed (too few candles, zero
/// volume, flat range). Snapshots are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub timestamp: i64,
    pub last_close: f64,

    // Trend
    pub ema: Option<f64>,
    pub sma: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub ema_cross: CrossDirection,
    pub recent_ema_cross: Option<CrossEvent>,
    pub ema_slope: Option<f64>,

    // Momentum
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub stoch_cross: Option<CrossEvent>,
    pub cci: Option<f64>,
    pub momentum: Momentum,

    // Volatility
    pub atr: Option<f64>,
    pub atr_pct: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_width: Option<f64>,
    pub near_upper_band: bool,

    // Trend strength
    pub adx: Option<f64>,
    pub adx_slope: Option<f64>,

    // Volume
    pub obv: f64,
    pub obv_slope: f64,
    pub vwap: Option<f64>,
    pub volume_avg_20: Option<f64>,
    pub volume_spike: Option<f64>,

    // Structure
    pub swing_high: Option<f64>,
    pub swing_low: Option<f64>,
    pub patterns: Vec<CandlePattern>,
}

/// Check ordering and OHLC consistency of a candle series
pub fn validate_series(candles: &[Candle]) -> Result<(), IndicatorError> {
    for (i, c) in candles.iter().enumerate() {
        let values = [c.open, c.high, c.low, c.close, c.volume];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(IndicatorError::InvalidSeries(format!(
                "candle {} ({}) has a negative or non-finite value",
                i, c.timestamp
            )));
        }

        if c.high < c.open.max(c.close).max(c.low) || c.low > c.open.min(c.close).min(c.high) {
            return Err(IndicatorError::InvalidSeries(format!(
                "candle {} ({}) violates high/low bounds",
                i, c.timestamp
            )));
        }

        if i > 0 && c.timestamp <= candles[i - 1].timestamp {
            return Err(IndicatorError::InvalidSeries(format!(
                "timestamps not strictly ascending at index {} ({} after {})",
                i,
                c.timestamp,
                candles[i - 1].timestamp
            )));
        }
    }

    Ok(())
}

/// Compute the full feature snapshot for the latest candle
pub fn compute_snapshot(candles: &[Candle]) -> Result<FeatureSnapshot, IndicatorError> {
    if candles.len() < MIN_CANDLES {
        return Err(IndicatorError::InsufficientData {
            have: candles.len(),
            need: MIN_CANDLES,
        });
    }
    validate_series(candles)?;

    let last = candles[candles.len() - 1];
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let last_index = closes.len() - 1;

    // Trend
    let ema_trend = ema_series(&closes, TREND_PERIOD);
    let sma_trend = sma_series(&closes, TREND_PERIOD);
    let ema_fast = ema_series(&closes, FAST_EMA_PERIOD);
    let ema_slow = ema_series(&closes, SLOW_EMA_PERIOD);
    let ema = ema_trend[last_index];

    // Momentum
    let rsi = calculate_rsi(&closes, RSI_PERIOD);
    let macd = calculate_macd(&closes, 12, 26, 9);
    let stoch = stochastic_series(candles, 14, 3, 3);
    let (stoch_k, stoch_d) = stoch.last();

    // Volatility
    let atr = calculate_atr(candles, ATR_PERIOD);
    let bands = calculate_bollinger(&closes, BOLLINGER_PERIOD, BOLLINGER_STD);
    let near_upper_band = match (bands, atr) {
        (Some(b), Some(atr)) => (last.close - b.upper).abs() < 0.1 * atr,
        _ => false,
    };

    // Trend strength
    let adx_readings: Vec<Option<f64>> = adx_series(candles, ADX_PERIOD)
        .into_iter()
        .map(|r| r.map(|r| r.adx))
        .collect();

    // Volume
    let obv = obv_series(candles);
    let obv_last = obv[last_index];
    let obv_slope = obv_last - obv[last_index - 1];

    let swings = swing_levels(candles, SWING_LOOKBACK);

    Ok(FeatureSnapshot {
        timestamp: last.timestamp,
        last_close: last.close,
        ema,
        sma: sma_trend[last_index],
        ema_fast: ema_fast[last_index],
        ema_slow: ema_slow[last_index],
        ema_cross: cross_at(&ema_fast, &ema_slow, last_index),
        recent_ema_cross: last_cross(&ema_fast, &ema_slow, CROSS_LOOKBACK),
        ema_slope: slope(&ema_trend),
        rsi,
        macd: macd.map(|m| m.macd),
        macd_signal: macd.map(|m| m.signal),
        macd_hist: macd.map(|m| m.histogram),
        stoch_k,
        stoch_d,
        stoch_cross: last_cross(&stoch.k, &stoch.d, CROSS_LOOKBACK),
        cci: calculate_cci(candles, CCI_PERIOD),
        momentum: Momentum::classify(last.close, ema, rsi),
        atr,
        atr_pct: atr.and_then(|atr| atr_percent(atr, last.close)),
        bb_upper: bands.map(|b| b.upper),
        bb_middle: bands.map(|b| b.middle),
        bb_lower: bands.map(|b| b.lower),
        bb_width: bands.map(|b| b.width()),
        near_upper_band,
        adx: adx_readings[last_index],
        adx_slope: slope(&adx_readings),
        obv: obv_last,
        obv_slope,
        vwap: calculate_vwap(candles),
        volume_avg_20: calculate_average_volume(candles, VOLUME_AVG_PERIOD),
        volume_spike: volume_spike_ratio(candles, VOLUME_AVG_PERIOD),
        swing_high: swings.map(|(high, _)| high),
        swing_low: swings.map(|(_, low)| low),
        patterns: detect_patterns(candles),
    })
}
