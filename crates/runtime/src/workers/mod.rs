//! Worker tasks that back the runtime orchestration.
//!
//! The reward worker delivers closed raids' rewards, and the expiry worker
//! closes raids whose window passed without anyone reading them.

mod expiry;
mod rewards;

pub use expiry::ExpiryWorker;
pub use rewards::{RewardCommand, RewardWorker};
