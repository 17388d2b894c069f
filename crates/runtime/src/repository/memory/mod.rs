//! In-memory repository implementations for testing and development.

mod raid;

pub use raid::InMemoryRaidRepository;
