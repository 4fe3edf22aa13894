/// Candlestick pattern recognition
///
/// Each predicate is a pure function of the last two or three candles'
/// open/high/low/close. Thresholds:
/// - small body: body < 30% of the candle's range
/// - doji: body <= 10% of the range
/// - long wick: wick > 2x body

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Candle, Signal};

const SMALL_BODY_RATIO: f64 = 0.3;
const DOJI_BODY_RATIO: f64 = 0.1;
const LONG_WICK_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandlePattern {
    BullishEngulfing,
    BearishEngulfing,
    Hammer,
    Doji,
    BullishHarami,
    BearishHarami,
    ShootingStar,
    MorningStar,
    EveningStar,
    ThreeWhiteSoldiers,
    ThreeBlackCrows,
    ThreeInsideUp,
    ThreeInsideDown,
}

/// Which way a pattern leans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternBias {
    Bullish,
    Bearish,
    Neutral,
}

impl CandlePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandlePattern::BullishEngulfing => "bullish_engulfing",
            CandlePattern::BearishEngulfing => "bearish_engulfing",
            CandlePattern::Hammer => "hammer",
            CandlePattern::Doji => "doji",
            CandlePattern::BullishHarami => "bullish_harami",
            CandlePattern::BearishHarami => "bearish_harami",
            CandlePattern::ShootingStar => "shooting_star",
            CandlePattern::MorningStar => "morning_star",
            CandlePattern::EveningStar => "evening_star",
            CandlePattern::ThreeWhiteSoldiers => "three_white_soldiers",
            CandlePattern::ThreeBlackCrows => "three_black_crows",
            CandlePattern::ThreeInsideUp => "three_inside_up",
            CandlePattern::ThreeInsideDown => "three_inside_down",
        }
    }

    pub fn bias(&self) -> PatternBias {
        match self {
            CandlePattern::BullishEngulfing
            | CandlePattern::Hammer
            | CandlePattern::BullishHarami
            | CandlePattern::MorningStar
            | CandlePattern::ThreeWhiteSoldiers
            | CandlePattern::ThreeInsideUp => PatternBias::Bullish,
            CandlePattern::BearishEngulfing
            | CandlePattern::BearishHarami
            | CandlePattern::ShootingStar
            | CandlePattern::EveningStar
            | CandlePattern::ThreeBlackCrows
            | CandlePattern::ThreeInsideDown => PatternBias::Bearish,
            CandlePattern::Doji => PatternBias::Neutral,
        }
    }

    /// True when the pattern leans against the given signal
    pub fn contradicts(&self, signal: Signal) -> bool {
        matches!(
            (self.bias(), signal),
            (PatternBias::Bearish, Signal::Buy) | (PatternBias::Bullish, Signal::Sell)
        )
    }
}

impl fmt::Display for CandlePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// All patterns matching the end of the series, in catalog order
///
/// Two-candle patterns need at least 2 candles, three-candle patterns at
/// least 3; shorter series simply match nothing.
pub fn detect_patterns(candles: &[Candle]) -> Vec<CandlePattern> {
    let mut detected = Vec::new();
    if candles.len() < 2 {
        return detected;
    }

    let n = candles.len();
    let prev = &candles[n - 2];
    let curr = &candles[n - 1];

    let two_candle: [(CandlePattern, bool); 7] = [
        (CandlePattern::BullishEngulfing, is_bullish_engulfing(prev, curr)),
        (CandlePattern::BearishEngulfing, is_bearish_engulfing(prev, curr)),
        (CandlePattern::Hammer, is_hammer(curr)),
        (CandlePattern::Doji, is_doji(curr)),
        (CandlePattern::BullishHarami, is_bullish_harami(prev, curr)),
        (CandlePattern::BearishHarami, is_bearish_harami(prev, curr)),
        (CandlePattern::ShootingStar, is_shooting_star(curr)),
    ];
    detected.extend(two_candle.iter().filter(|(_, hit)| *hit).map(|(p, _)| *p));

    if n >= 3 {
        let first = &candles[n - 3];
        let three_candle: [(CandlePattern, bool); 6] = [
            (CandlePattern::MorningStar, is_morning_star(first, prev, curr)),
            (CandlePattern::EveningStar, is_evening_star(first, prev, curr)),
            (
                CandlePattern::ThreeWhiteSoldiers,
                [first, prev, curr].iter().all(|c| c.is_bullish()),
            ),
            (
                CandlePattern::ThreeBlackCrows,
                [first, prev, curr].iter().all(|c| c.is_bearish()),
            ),
            (CandlePattern::ThreeInsideUp, is_three_inside_up(first, prev, curr)),
            (CandlePattern::ThreeInsideDown, is_three_inside_down(first, prev, curr)),
        ];
        detected.extend(three_candle.iter().filter(|(_, hit)| *hit).map(|(p, _)| *p));
    }

    detected
}

fn has_small_body(candle: &Candle) -> bool {
    candle.body() < candle.range() * SMALL_BODY_RATIO
}

fn is_bullish_engulfing(prev: &Candle, curr: &Candle) -> bool {
    prev.is_bearish() && curr.is_bullish() && curr.close > prev.open && curr.open < prev.close
}

fn is_bearish_engulfing(prev: &Candle, curr: &Candle) -> bool {
    prev.is_bullish() && curr.is_bearish() && curr.open > prev.close && curr.close < prev.open
}

fn is_hammer(curr: &Candle) -> bool {
    let body = curr.body();
    has_small_body(curr)
        && curr.lower_wick() > body * LONG_WICK_MULTIPLIER
        && curr.upper_wick() < body
}

fn is_shooting_star(curr: &Candle) -> bool {
    let body = curr.body();
    has_small_body(curr)
        && curr.upper_wick() > body * LONG_WICK_MULTIPLIER
        && curr.lower_wick() < body
}

fn is_doji(curr: &Candle) -> bool {
    curr.body() <= DOJI_BODY_RATIO * curr.range()
}

fn is_bullish_harami(prev: &Candle, curr: &Candle) -> bool {
    prev.is_bearish() && curr.is_bullish() && curr.open > prev.close && curr.close < prev.open
}

fn is_bearish_harami(prev: &Candle, curr: &Candle) -> bool {
    prev.is_bullish() && curr.is_bearish() && curr.close > prev.open && curr.open < prev.close
}

fn is_morning_star(first: &Candle, middle: &Candle, curr: &Candle) -> bool {
    first.is_bearish()
        && has_small_body(middle)
        && curr.is_bullish()
        && curr.close > (first.open + first.close) / 2.0
}

fn is_evening_star(first: &Candle, middle: &Candle, curr: &Candle) -> bool {
    first.is_bullish()
        && has_small_body(middle)
        && curr.is_bearish()
        && curr.close < (first.open + first.close) / 2.0
}

fn is_three_inside_up(first: &Candle, middle: &Candle, curr: &Candle) -> bool {
    is_bullish_harami(first, middle) && curr.is_bullish() && curr.close > first.open
}

fn is_three_inside_down(first: &Candle, middle: &Candle, curr: &Candle) -> bool {
    is_bearish_harami(first, middle) && curr.is_bearish() && curr.close < first.open
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: 0,
            open,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_bullish_engulfing() {
        let candles = vec![candle(105.0, 106.0, 99.0, 100.0), candle(99.0, 108.0, 98.0, 107.0)];
        let patterns = detect_patterns(&candles);

        assert!(patterns.contains(&CandlePattern::BullishEngulfing));
        assert!(!patterns.contains(&CandlePattern::BearishEngulfing));
    }

    #[test]
    fn test_hammer() {
        // body 1, lower wick 7, upper wick 0.5, range 8.5
        let candles = vec![candle(105.0, 106.0, 100.0, 104.0), candle(100.0, 101.5, 93.0, 101.0)];
        let patterns = detect_patterns(&candles);

        assert!(patterns.contains(&CandlePattern::Hammer));
        assert!(!patterns.contains(&CandlePattern::ShootingStar));
    }

    #[test]
    fn test_shooting_star_and_doji_thresholds() {
        // body 1, upper wick 8, lower wick 0.5, range 9.5 -> body > 10% so no doji
        let candles = vec![candle(100.0, 101.0, 99.0, 100.5), candle(101.0, 110.0, 100.5, 102.0)];
        let patterns = detect_patterns(&candles);
        assert!(patterns.contains(&CandlePattern::ShootingStar));
        assert!(!patterns.contains(&CandlePattern::Doji));

        let candles = vec![candle(100.0, 101.0, 99.0, 100.5), candle(100.0, 105.0, 95.0, 100.5)];
        assert!(detect_patterns(&candles).contains(&CandlePattern::Doji));
    }

    #[test]
    fn test_morning_star() {
        let candles = vec![
            candle(110.0, 111.0, 99.0, 100.0),
            candle(99.5, 101.0, 97.0, 99.0),
            candle(100.0, 108.0, 99.0, 107.0),
        ];
        assert!(detect_patterns(&candles).contains(&CandlePattern::MorningStar));
    }

    #[test]
    fn test_three_soldiers_and_crows() {
        let rising = vec![
            candle(100.0, 103.0, 99.0, 102.0),
            candle(102.0, 105.0, 101.0, 104.0),
            candle(104.0, 107.0, 103.0, 106.0),
        ];
        assert!(detect_patterns(&rising).contains(&CandlePattern::ThreeWhiteSoldiers));

        let falling = vec![
            candle(106.0, 107.0, 103.0, 104.0),
            candle(104.0, 105.0, 101.0, 102.0),
            candle(102.0, 103.0, 99.0, 100.0),
        ];
        assert!(detect_patterns(&falling).contains(&CandlePattern::ThreeBlackCrows));
    }

    #[test]
    fn test_three_inside_up() {
        let candles = vec![
            candle(110.0, 111.0, 99.0, 100.0),
            candle(102.0, 106.0, 101.0, 105.0),
            candle(105.0, 113.0, 104.0, 112.0),
        ];
        let patterns = detect_patterns(&candles);

        assert!(patterns.contains(&CandlePattern::ThreeInsideUp));
        assert!(!patterns.contains(&CandlePattern::ThreeInsideDown));
    }

    #[test]
    fn test_short_series_skips_three_candle_patterns() {
        assert!(detect_patterns(&[candle(100.0, 101.0, 99.0, 100.5)]).is_empty());

        let candles = vec![candle(100.0, 103.0, 99.0, 102.0), candle(102.0, 105.0, 101.0, 104.0)];
        assert!(!detect_patterns(&candles).contains(&CandlePattern::ThreeWhiteSoldiers));
    }

    #[test]
    fn test_contradiction() {
        assert!(CandlePattern::ShootingStar.contradicts(Signal::Buy));
        assert!(!CandlePattern::ShootingStar.contradicts(Signal::Sell));
        assert!(CandlePattern::Hammer.contradicts(Signal::Sell));
        assert!(!CandlePattern::Doji.contradicts(Signal::Buy));
        assert_eq!(
            serde_json::to_string(&CandlePattern::ThreeWhiteSoldiers).unwrap(),
            "\"three_white_soldiers\""
        );
    }
}
