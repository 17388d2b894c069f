//! High-level runtime orchestrator.
//!
//! The runtime owns background workers, wires up the repository, ledger and
//! event bus, and exposes a builder-based API for clients.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use raid_core::{ItemCatalog, StaticItemCatalog};

use crate::api::{RaidHandle, Result, RuntimeError};
use crate::clock::{Clock, SystemClock};
use crate::config::RuntimeConfig;
use crate::events::EventBus;
use crate::ledger::RaidLedger;
use crate::lifecycle::LifecycleManager;
use crate::repository::{FileRaidRepository, InMemoryRaidRepository, RaidRepository};
use crate::rewards::{LoggingDistributor, RewardDistributor, RewardOutbox};
use crate::workers::{ExpiryWorker, RewardCommand, RewardWorker};
use crate::xp::{LinearXp, XpPolicy};

/// Main runtime that owns the raid workers
///
/// Design: Runtime owns workers and coordinates shutdown.
/// [`RaidHandle`] provides a cloneable façade for clients.
pub struct Runtime {
    handle: RaidHandle,
    reward_tx: mpsc::Sender<RewardCommand>,
    reward_worker_handle: JoinHandle<()>,
    expiry_worker: Option<(watch::Sender<bool>, JoinHandle<()>)>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    ///
    /// The handle can be shared across clients and async tasks.
    pub fn handle(&self) -> RaidHandle {
        self.handle.clone()
    }

    /// Shutdown the runtime gracefully
    ///
    /// Stops the expiry sweep, then lets the reward worker drain the batches
    /// queued before this call.
    pub async fn shutdown(self) -> Result<()> {
        if let Some((shutdown_tx, handle)) = self.expiry_worker {
            let _ = shutdown_tx.send(true);
            handle.await.map_err(|source| RuntimeError::WorkerJoin {
                worker: "expiry",
                source,
            })?;
        }

        // A closed channel means the worker already stopped.
        let _ = self.reward_tx.send(RewardCommand::Shutdown).await;
        self.reward_worker_handle
            .await
            .map_err(|source| RuntimeError::WorkerJoin {
                worker: "reward",
                source,
            })?;

        Ok(())
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    repository: Option<Arc<dyn RaidRepository>>,
    catalog: Option<Arc<dyn ItemCatalog>>,
    distributor: Option<Arc<dyn RewardDistributor>>,
    clock: Option<Arc<dyn Clock>>,
    xp_policy: Option<Arc<dyn XpPolicy>>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            repository: None,
            catalog: None,
            distributor: None,
            clock: None,
            xp_policy: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the raid repository
    ///
    /// Defaults to a [`FileRaidRepository`] when `config.data_dir` is set and
    /// an [`InMemoryRaidRepository`] otherwise.
    pub fn repository(mut self, repository: impl RaidRepository + 'static) -> Self {
        self.repository = Some(Arc::new(repository));
        self
    }

    /// Share an existing repository, e.g. to inspect it from tests
    pub fn shared_repository(mut self, repository: Arc<dyn RaidRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Set the item catalog used to resolve attack loadouts
    pub fn catalog(mut self, catalog: impl ItemCatalog + 'static) -> Self {
        self.catalog = Some(Arc::new(catalog));
        self
    }

    /// Set the reward distributor (defaults to [`LoggingDistributor`])
    pub fn reward_distributor(mut self, distributor: impl RewardDistributor + 'static) -> Self {
        self.distributor = Some(Arc::new(distributor));
        self
    }

    /// Share an existing distributor, e.g. a test double the caller inspects
    pub fn shared_reward_distributor(mut self, distributor: Arc<dyn RewardDistributor>) -> Self {
        self.distributor = Some(distributor);
        self
    }

    /// Set the time source (defaults to [`SystemClock`])
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the XP policy (defaults to [`LinearXp`])
    pub fn xp_policy(mut self, policy: impl XpPolicy + 'static) -> Self {
        self.xp_policy = Some(Arc::new(policy));
        self
    }

    /// Build the runtime and start its workers
    ///
    /// With `config.data_dir` set the reward outbox is journaled under
    /// `rewards/`, and any hand-off left unfinished by a previous run is
    /// queued again before this returns.
    pub async fn build(self) -> Result<Runtime> {
        let config = self.config;

        let repo: Arc<dyn RaidRepository> = match (self.repository, &config.data_dir) {
            (Some(repo), _) => repo,
            (None, Some(dir)) => Arc::new(FileRaidRepository::new(dir)?),
            (None, None) => Arc::new(InMemoryRaidRepository::new()),
        };
        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(StaticItemCatalog::new()));
        let distributor = self
            .distributor
            .unwrap_or_else(|| Arc::new(LoggingDistributor));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let xp = self
            .xp_policy
            .unwrap_or_else(|| Arc::new(LinearXp::default()));
        let seed = config.rng_seed.unwrap_or_else(rand::random);

        let event_bus = EventBus::with_capacity(config.event_buffer_size);
        let outbox = Arc::new(match &config.data_dir {
            Some(dir) => RewardOutbox::open(dir.join("rewards").join("outbox.log"))?,
            None => RewardOutbox::new(),
        });
        let (reward_tx, reward_rx) = mpsc::channel(config.command_buffer_size);

        let ledger = RaidLedger::new(Arc::clone(&repo), config.retry.clone());
        let lifecycle = LifecycleManager::new(
            ledger.clone(),
            Arc::clone(&repo),
            Arc::clone(&outbox),
            reward_tx.clone(),
            event_bus.clone(),
        );

        let reward_worker = RewardWorker::new(
            distributor,
            outbox,
            config.reward_retry.clone(),
            reward_rx,
            event_bus.clone(),
        );
        let reward_worker_handle = tokio::spawn(async move {
            reward_worker.run().await;
        });

        // Raids closed by a previous process whose batches never reached the
        // worker.
        lifecycle.reconcile()?;

        let expiry_worker = config.expiry_interval.map(|interval| {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let worker =
                ExpiryWorker::new(lifecycle.clone(), Arc::clone(&clock), interval, shutdown_rx);
            let handle = tokio::spawn(async move {
                worker.run().await;
            });
            (shutdown_tx, handle)
        });

        tracing::info!(
            leaderboard_size = config.leaderboard_size,
            max_attempts = config.retry.max_attempts,
            expiry_sweep = config.expiry_interval.is_some(),
            "Raid runtime started"
        );

        let handle = RaidHandle {
            repo,
            catalog,
            ledger,
            lifecycle,
            event_bus,
            clock,
            xp,
            combat: Arc::new(config.combat),
            leaderboard_size: config.leaderboard_size,
            seed,
            nonce: Arc::new(AtomicU64::new(0)),
        };

        Ok(Runtime {
            handle,
            reward_tx,
            reward_worker_handle,
            expiry_worker,
        })
    }
}
