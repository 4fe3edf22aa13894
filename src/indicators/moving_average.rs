/// Calculate Simple Moving Average (SMA)
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA)
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    ema_series(prices, period).last().copied().flatten()
}

/// SMA at every index, `None` until `period` prices are available.
///
/// Output has the same length as `prices`.
pub fn sma_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut series = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return series;
    }

    let mut window_sum: f64 = prices[..period].iter().sum();
    series[period - 1] = Some(window_sum / period as f64);

    for i in period..prices.len() {
        window_sum += prices[i] - prices[i - period];
        series[i] = Some(window_sum / period as f64);
    }

    series
}

/// EMA at every index, seeded with the SMA of the first `period` prices.
///
/// Output has the same length as `prices`; entries before the seed are `None`.
pub fn ema_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut series = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return series;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    // Start with SMA
    let mut ema = prices[..period].iter().sum::<f64>() / period as f64;
    series[period - 1] = Some(ema);

    for (i, price) in prices.iter().enumerate().skip(period) {
        ema = (price - ema) * multiplier + ema;
        series[i] = Some(ema);
    }

    series
}

/// EMA over a series that may contain undefined leading values.
///
/// Used for signal lines (MACD, Stochastic %D) computed on top of other
/// indicators. Leading `None`s are skipped; a `None` after the seed breaks
/// the series and everything after it stays undefined.
pub fn ema_of_defined(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let start = match values.iter().position(Option::is_some) {
        Some(idx) => idx,
        None => return vec![None; values.len()],
    };

    let mut defined = Vec::with_capacity(values.len() - start);
    for value in &values[start..] {
        match value {
            Some(v) => defined.push(*v),
            None => break,
        }
    }

    let mut series = vec![None; values.len()];
    for (offset, value) in ema_series(&defined, period).into_iter().enumerate() {
        series[start + offset] = value;
    }
    series
}

/// Last-step change of a series, `None` if either end is undefined
pub fn slope(series: &[Option<f64>]) -> Option<f64> {
    match series {
        [.., Some(prev), Some(last)] => Some(last - prev),
        _ => None,
    }
}
