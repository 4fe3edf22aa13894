// Order execution and cycle orchestration module
pub mod cycle;
pub mod executor;
pub mod feature_feed;
pub mod position_guard;

pub use cycle::{CycleOutcome, TradingCycle};
pub use executor::{BracketExecutor, BracketLeg, BracketOrderResult, ExitLeg, LegOutcome};
pub use feature_feed::FeatureFeed;
pub use position_guard::PositionGuard;
