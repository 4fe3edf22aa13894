/// Average Directional Index (ADX) - Measures trend strength
///
/// ADX ranges from 0 to 100:
/// - ADX > 25: Strong trend (bull or bear)
/// - ADX 20-25: Moderate trend
/// - ADX < 20: Weak trend / choppy / ranging market
///
/// Also returns +DI and -DI to determine trend direction:
/// - +DI > -DI: Uptrend
/// - -DI > +DI: Downtrend

use crate::indicators::atr::true_ranges;
use crate::models::Candle;

/// One ADX reading with its directional components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxReading {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

/// Calculate ADX, +DI, and -DI for trend strength and direction
///
/// Returns (adx, plus_di, minus_di) or None if insufficient data
pub fn calculate_adx(candles: &[Candle], period: usize) -> Option<(f64, f64, f64)> {
    adx_series(candles, period)
        .last()
        .copied()
        .flatten()
        .map(|r| (r.adx, r.plus_di, r.minus_di))
}

/// ADX at every candle index.
///
/// DX needs `period` true ranges before the first smoothed value and ADX
/// smooths `period` DX values, so the first reading lands at index
/// `2 * period - 1`. Earlier entries are `None`.
pub fn adx_series(candles: &[Candle], period: usize) -> Vec<Option<AdxReading>> {
    let mut series = vec![None; candles.len()];
    if period == 0 || candles.len() < 2 * period {
        return series;
    }

    // Step 1: Calculate True Range (TR) and Directional Movement (+DM, -DM)
    let trs = true_ranges(candles);
    let mut plus_dms = Vec::with_capacity(trs.len());
    let mut minus_dms = Vec::with_capacity(trs.len());

    for w in candles.windows(2) {
        let up_move = w[1].high - w[0].high;
        let down_move = w[0].low - w[1].low;

        plus_dms.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dms.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
    }

    // Step 2: Smooth True Range and Directional Movements (Wilder's smoothing)
    let smoothed_tr = wilder_smooth_series(&trs, period);
    let smoothed_plus_dm = wilder_smooth_series(&plus_dms, period);
    let smoothed_minus_dm = wilder_smooth_series(&minus_dms, period);

    // Step 3: +DI, -DI and DX for each smoothed step
    let directional: Vec<(f64, f64, f64)> = smoothed_tr
        .iter()
        .zip(&smoothed_plus_dm)
        .zip(&smoothed_minus_dm)
        .map(|((&tr, &plus_dm), &minus_dm)| {
            let (plus_di, minus_di) = if tr > 0.0 {
                (plus_dm / tr * 100.0, minus_dm / tr * 100.0)
            } else {
                (0.0, 0.0)
            };
            let di_sum = plus_di + minus_di;
            let dx = if di_sum > 0.0 {
                (plus_di - minus_di).abs() / di_sum * 100.0
            } else {
                0.0
            };
            (plus_di, minus_di, dx)
        })
        .collect();

    // Step 4: ADX is the Wilder-smoothed DX
    let dx_values: Vec<f64> = directional.iter().map(|d| d.2).collect();
    let adx_values = wilder_smooth_series(&dx_values, period);

    // smoothed_tr[0] corresponds to candle index `period`; adx_values[0] to
    // directional index `period - 1`
    let first_candle = 2 * period - 1;
    for (offset, adx) in adx_values.into_iter().enumerate() {
        let (plus_di, minus_di, _) = directional[period - 1 + offset];
        series[first_candle + offset] = Some(AdxReading {
            adx,
            plus_di,
            minus_di,
        });
    }

    series
}

/// Wilder's smoothing method (similar to EMA but using Wilder's formula)
///
/// First value is the simple average of the first `period` values.
fn wilder_smooth_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let mut smoothed = values[..period].iter().sum::<f64>() / period as f64;
    let mut series = Vec::with_capacity(values.len() - period + 1);
    series.push(smoothed);

    for value in &values[period..] {
        smoothed = (smoothed * (period as f64 - 1.0) + value) / period as f64;
        series.push(smoothed);
    }

    series
}
