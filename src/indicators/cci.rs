use crate::models::Candle;

/// Commodity Channel Index
///
/// CCI = (TP - SMA(TP)) / (0.015 * mean absolute deviation of TP), over the
/// last `period` candles. Undefined when the mean deviation is zero.
pub fn calculate_cci(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let typical: Vec<f64> = candles[candles.len() - period..]
        .iter()
        .map(Candle::typical_price)
        .collect();

    let mean = typical.iter().sum::<f64>() / period as f64;
    let mean_deviation = typical.iter().map(|tp| (tp - mean).abs()).sum::<f64>() / period as f64;

    if mean_deviation == 0.0 {
        return None;
    }

    let last = typical[typical.len() - 1];
    Some((last - mean) / (0.015 * mean_deviation))
}
