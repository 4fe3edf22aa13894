// Trading strategy module
pub mod decision;
pub mod signals;

pub use decision::{Confidence, Decision, DecisionRecord, RiskLevel, TradeDecision};
pub use signals::{MtfSignalEngine, SignalConfig, Trend};

use crate::indicators::FeatureSnapshot;
use crate::models::Timeframe;

/// One fused set of per-timeframe snapshots taken in the same pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeframeSnapshots {
    pub m1: Option<FeatureSnapshot>,
    pub m5: Option<FeatureSnapshot>,
    pub m15: Option<FeatureSnapshot>,
}

impl TimeframeSnapshots {
    pub fn get(&self, timeframe: Timeframe) -> Option<&FeatureSnapshot> {
        match timeframe {
            Timeframe::M1 => self.m1.as_ref(),
            Timeframe::M5 => self.m5.as_ref(),
            Timeframe::M15 => self.m15.as_ref(),
        }
    }

    pub fn insert(&mut self, timeframe: Timeframe, snapshot: FeatureSnapshot) {
        *self.slot_mut(timeframe) = Some(snapshot);
    }

    pub fn remove(&mut self, timeframe: Timeframe) -> Option<FeatureSnapshot> {
        self.slot_mut(timeframe).take()
    }

    fn slot_mut(&mut self, timeframe: Timeframe) -> &mut Option<FeatureSnapshot> {
        match timeframe {
            Timeframe::M1 => &mut self.m1,
            Timeframe::M5 => &mut self.m5,
            Timeframe::M15 => &mut self.m15,
        }
    }

    /// Required timeframes that have no snapshot
    pub fn missing(&self, required: &[Timeframe]) -> Vec<Timeframe> {
        required
            .iter()
            .copied()
            .filter(|tf| self.get(*tf).is_none())
            .collect()
    }
}

/// Base trait for all decision strategies
pub trait Strategy: Send + Sync {
    /// Fuse the timeframe snapshots into one decision
    fn decide(&self, snapshots: &TimeframeSnapshots) -> Decision;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Timeframes this strategy reads
    fn required_timeframes(&self) -> &[Timeframe] {
        &Timeframe::ALL
    }
}
