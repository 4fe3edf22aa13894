use serde::{Deserialize, Serialize};

/// Direction of a fast/slow line crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossDirection {
    Bullish,
    Bearish,
    None,
}

/// A cross that happened `bars_ago` candles before the latest one (0 = latest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossEvent {
    pub direction: CrossDirection,
    pub bars_ago: usize,
}

/// Cross direction between index `i - 1` and `i`
///
/// Bullish when fast moves from strictly below to strictly above slow,
/// bearish for the reverse. Undefined values on either candle mean no cross.
pub fn cross_at(fast: &[Option<f64>], slow: &[Option<f64>], i: usize) -> CrossDirection {
    if i == 0 || i >= fast.len() || i >= slow.len() {
        return CrossDirection::None;
    }

    match (fast[i - 1], slow[i - 1], fast[i], slow[i]) {
        (Some(pf), Some(ps), Some(cf), Some(cs)) => {
            if pf < ps && cf > cs {
                CrossDirection::Bullish
            } else if pf > ps && cf < cs {
                CrossDirection::Bearish
            } else {
                CrossDirection::None
            }
        }
        _ => CrossDirection::None,
    }
}

/// Most recent cross within the last `lookback` candles
pub fn last_cross(fast: &[Option<f64>], slow: &[Option<f64>], lookback: usize) -> Option<CrossEvent> {
    let len = fast.len().min(slow.len());
    if len < 2 {
        return None;
    }

    (0..lookback.min(len - 1)).find_map(|bars_ago| {
        match cross_at(fast, slow, len - 1 - bars_ago) {
            CrossDirection::None => None,
            direction => Some(CrossEvent { direction, bars_ago }),
        }
    })
}
