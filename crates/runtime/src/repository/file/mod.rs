//! File-based repository implementations.

mod log;
mod raid;

pub use log::AppendLog;
pub use raid::FileRaidRepository;
