// Technical indicators module
// Turns a candle series into a FeatureSnapshot (trend, momentum, volatility,
// volume, structure and candlestick patterns)

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod crossover;
pub mod macd;
pub mod market_analysis;
pub mod moving_average;
pub mod patterns;
pub mod rsi;
pub mod snapshot;
pub mod stochastic;

pub use adx::{adx_series, calculate_adx, AdxReading};
pub use atr::{atr_percent, calculate_atr, calculate_atr_series};
pub use bollinger::{calculate_bollinger, BollingerBands};
pub use cci::calculate_cci;
pub use crossover::{last_cross, CrossDirection, CrossEvent};
pub use macd::{calculate_macd, Macd};
pub use market_analysis::{
    calculate_average_volume, calculate_vwap, obv_series, swing_levels, volume_spike_ratio,
};
pub use moving_average::{calculate_ema, calculate_sma, ema_series, sma_series};
pub use patterns::{detect_patterns, CandlePattern, PatternBias};
pub use rsi::calculate_rsi;
pub use snapshot::{compute_snapshot, validate_series, FeatureSnapshot, Momentum};
pub use stochastic::{stochastic_series, StochasticSeries};
