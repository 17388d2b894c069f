//! Runtime orchestration for the shared-boss raid ledger.
//!
//! This crate wires the pure rules from `raid-core` to storage, concurrency
//! control and background workers. Consumers embed [`Runtime`] and serve
//! requests through the cloneable [`RaidHandle`].
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`api`] exposes the types downstream clients interact with
//! - [`ledger`] commits attacks with optimistic concurrency
//! - [`lifecycle`] claims raid closure and hands off rewards
//! - [`events`] provides topic-based event bus for flexible event routing
//! - [`repository`] stores raids and attack logs
//! - [`workers`] keeps background tasks internal to the crate
pub mod api;
pub mod clock;
pub mod config;
pub mod events;
pub mod ledger;
pub mod lifecycle;
pub mod repository;
pub mod rewards;
pub mod runtime;
pub mod xp;

mod workers;

pub use api::{
    AttackReceipt, AttackRequest, ErrorKind, RaidHandle, RaidSelector, RaidStatusView, Result,
    RuntimeError,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RetryPolicy, RuntimeConfig};
pub use events::{AttackEvent, Event, EventBus, LifecycleEvent, RewardEvent, Topic};
pub use ledger::{CommittedAttack, RaidLedger};
pub use lifecycle::LifecycleManager;
pub use repository::{
    FileRaidRepository, InMemoryRaidRepository, RaidRepository, RepositoryError, VersionedRaid,
};
pub use rewards::{
    DispatchState, LoggingDistributor, RewardBatch, RewardDistributor, RewardError, RewardOutbox,
};
pub use runtime::{Runtime, RuntimeBuilder};
pub use xp::{LinearXp, XpPolicy};
