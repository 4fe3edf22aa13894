/// Moving Average Convergence Divergence
///
/// MACD line = EMA(fast) - EMA(slow), signal = EMA(signal) of the MACD line,
/// histogram = MACD - signal.

use crate::indicators::moving_average::{ema_of_defined, ema_series};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD at every index; `None` until the signal line is seeded
pub fn macd_series(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<Option<Macd>> {
    let fast_ema = ema_series(prices, fast);
    let slow_ema = ema_series(prices, slow);

    let macd_line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let signal_line = ema_of_defined(&macd_line, signal);

    macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(Macd {
                macd: *m,
                signal: *s,
                histogram: m - s,
            }),
            _ => None,
        })
        .collect()
}

/// Latest MACD reading, `None` with fewer than `slow + signal - 1` prices
pub fn calculate_macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    macd_series(prices, fast, slow, signal).last().copied().flatten()
}
