use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Side, Signal};

/// Decimal places kept on every price in a decision
pub const PRICE_DECIMALS: u32 = 4;

/// Confidence bucket derived from the numeric score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// High >= 75, Medium 45-74, Low < 45
    pub fn from_score(score: u8) -> Self {
        match score {
            75..=u8::MAX => Confidence::High,
            45..=74 => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => f.write_str("High"),
            Confidence::Medium => f.write_str("Medium"),
            Confidence::Low => f.write_str("Low"),
        }
    }
}

/// Round a price to `PRICE_DECIMALS` places
pub fn round_price(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(PRICE_DECIMALS))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// A stop-loss or take-profit level with the reason it was chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLevel {
    pub level: f64,
    pub rationale: String,
}

impl RiskLevel {
    pub fn new(level: f64, rationale: impl Into<String>) -> Self {
        Self {
            level: round_price(level),
            rationale: rationale.into(),
        }
    }
}

/// A BUY or SELL decision with its full bracket
#[derive(Debug, Clone, PartialEq)]
pub struct TradeDecision {
    pub side: Side,
    pub confidence_score: u8,
    pub entry_price: f64,
    pub stop_loss: RiskLevel,
    pub take_profit: RiskLevel,
    pub reasoning: String,
}

/// Output of the decision engine
///
/// The confidence label is always derived from the score, so the two can
/// never disagree. Price fields only exist on the actionable variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "DecisionRecord", try_from = "DecisionRecord")]
pub enum Decision {
    Wait { confidence_score: u8, reasoning: String },
    Actionable(TradeDecision),
}

impl Decision {
    pub fn wait(confidence_score: u8, reasoning: impl Into<String>) -> Self {
        Decision::Wait {
            confidence_score: confidence_score.min(100),
            reasoning: reasoning.into(),
        }
    }

    pub fn signal(&self) -> Signal {
        match self {
            Decision::Wait { .. } => Signal::Wait,
            Decision::Actionable(trade) => trade.side.as_signal(),
        }
    }

    pub fn confidence_score(&self) -> u8 {
        match self {
            Decision::Wait {
                confidence_score, ..
            } => *confidence_score,
            Decision::Actionable(trade) => trade.confidence_score,
        }
    }

    pub fn confidence(&self) -> Confidence {
        Confidence::from_score(self.confidence_score())
    }

    pub fn reasoning(&self) -> &str {
        match self {
            Decision::Wait { reasoning, .. } => reasoning,
            Decision::Actionable(trade) => &trade.reasoning,
        }
    }

    pub fn is_actionable(&self) -> bool {
        matches!(self, Decision::Actionable(_))
    }

    pub fn as_trade(&self) -> Option<&TradeDecision> {
        match self {
            Decision::Wait { .. } => None,
            Decision::Actionable(trade) => Some(trade),
        }
    }
}

/// Flat JSON shape of a decision, as logged and handed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub signal: Signal,
    pub confidence: Confidence,
    pub confidence_score: u8,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<RiskLevel>,
    pub take_profit: Option<RiskLevel>,
    pub reasoning: String,
}

impl From<Decision> for DecisionRecord {
    fn from(decision: Decision) -> Self {
        let confidence = decision.confidence();
        match decision {
            Decision::Wait {
                confidence_score,
                reasoning,
            } => DecisionRecord {
                signal: Signal::Wait,
                confidence,
                confidence_score,
                entry_price: None,
                stop_loss: None,
                take_profit: None,
                reasoning,
            },
            Decision::Actionable(trade) => DecisionRecord {
                signal: trade.side.as_signal(),
                confidence,
                confidence_score: trade.confidence_score,
                entry_price: Some(trade.entry_price),
                stop_loss: Some(trade.stop_loss),
                take_profit: Some(trade.take_profit),
                reasoning: trade.reasoning,
            },
        }
    }
}

impl TryFrom<DecisionRecord> for Decision {
    type Error = String;

    fn try_from(record: DecisionRecord) -> Result<Self, Self::Error> {
        if record.confidence_score > 100 {
            return Err(format!("confidence_score {} out of range", record.confidence_score));
        }
        if Confidence::from_score(record.confidence_score) != record.confidence {
            return Err(format!(
                "confidence {} does not match score {}",
                record.confidence, record.confidence_score
            ));
        }

        let side = match record.signal {
            Signal::Wait => {
                if record.entry_price.is_some()
                    || record.stop_loss.is_some()
                    || record.take_profit.is_some()
                {
                    return Err("WAIT decision must not carry prices".to_string());
                }
                return Ok(Decision::Wait {
                    confidence_score: record.confidence_score,
                    reasoning: record.reasoning,
                });
            }
            Signal::Buy => Side::Buy,
            Signal::Sell => Side::Sell,
        };

        match (record.entry_price, record.stop_loss, record.take_profit) {
            (Some(entry_price), Some(stop_loss), Some(take_profit)) => {
                Ok(Decision::Actionable(TradeDecision {
                    side,
                    confidence_score: record.confidence_score,
                    entry_price,
                    stop_loss,
                    take_profit,
                    reasoning: record.reasoning,
                }))
            }
            _ => Err(format!(
                "{} decision requires entry_price, stop_loss and take_profit",
                record.signal
            )),
        }
    }
}
