/// Volume flow and price structure
///
/// On-balance volume, VWAP over the supplied window, volume averages and
/// spike ratios, and swing high/low levels. Divisions by zero volume produce
/// `None` rather than a zero.

use crate::models::Candle;

/// On-balance volume at every candle, starting from 0
pub fn obv_series(candles: &[Candle]) -> Vec<f64> {
    let mut series = Vec::with_capacity(candles.len());
    let mut obv = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        if i > 0 {
            let prev_close = candles[i - 1].close;
            if candle.close > prev_close {
                obv += candle.volume;
            } else if candle.close < prev_close {
                obv -= candle.volume;
            }
        }
        series.push(obv);
    }

    series
}

/// Volume-weighted average price of the whole window
///
/// Uses the typical price (high + low + close) / 3. Returns `None` when the
/// window traded no volume.
pub fn calculate_vwap(candles: &[Candle]) -> Option<f64> {
    let total_volume: f64 = candles.iter().map(|c| c.volume).sum();
    if total_volume <= 0.0 {
        return None;
    }

    let weighted: f64 = candles.iter().map(|c| c.typical_price() * c.volume).sum();
    Some(weighted / total_volume)
}

/// Calculate average volume over a period
pub fn calculate_average_volume(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let start_idx = candles.len().saturating_sub(period);
    let recent_candles = &candles[start_idx..];

    let total_volume: f64 = recent_candles.iter().map(|c| c.volume).sum();
    Some(total_volume / period as f64)
}

/// Ratio of the last candle's volume to the `period` average (current candle included)
pub fn volume_spike_ratio(candles: &[Candle], period: usize) -> Option<f64> {
    let avg_volume = calculate_average_volume(candles, period)?;
    if avg_volume <= 0.0 {
        return None;
    }

    let current_volume = candles.last()?.volume;
    Some(current_volume / avg_volume)
}

/// Highest high and lowest low over the last `lookback` candles
pub fn swing_levels(candles: &[Candle], lookback: usize) -> Option<(f64, f64)> {
    if lookback == 0 || candles.len() < lookback {
        return None;
    }

    let recent_candles = &candles[candles.len() - lookback..];
    let swing_high = recent_candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let swing_low = recent_candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);

    Some((swing_high, swing_low))
}
