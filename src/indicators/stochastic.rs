/// Stochastic oscillator (%K / %D)
///
/// Raw %K = 100 * (close - lowest low) / (highest high - lowest low) over
/// `k_period`. %K is the SMA of raw %K over `smooth_k`, %D the SMA of %K over
/// `d_period`. A window with no range (highest high == lowest low) leaves
/// raw %K undefined.

use crate::models::Candle;

#[derive(Debug, Clone, PartialEq)]
pub struct StochasticSeries {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

impl StochasticSeries {
    pub fn last(&self) -> (Option<f64>, Option<f64>) {
        (
            self.k.last().copied().flatten(),
            self.d.last().copied().flatten(),
        )
    }
}

pub fn stochastic_series(
    candles: &[Candle],
    k_period: usize,
    smooth_k: usize,
    d_period: usize,
) -> StochasticSeries {
    let n = candles.len();
    let mut raw_k = vec![None; n];

    if k_period > 0 && n >= k_period {
        for i in (k_period - 1)..n {
            let window = &candles[i + 1 - k_period..=i];
            let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            let range = highest - lowest;

            if range > 0.0 {
                raw_k[i] = Some(100.0 * (candles[i].close - lowest) / range);
            }
        }
    }

    let k = rolling_mean(&raw_k, smooth_k);
    let d = rolling_mean(&k, d_period);

    StochasticSeries { k, d }
}

/// Trailing mean over `period` values, undefined if any value in the window is undefined
fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let sum: Option<f64> = window.iter().copied().sum();
        out[i] = sum.map(|s| s / period as f64);
    }

    out
}
