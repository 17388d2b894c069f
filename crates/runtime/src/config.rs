//! Runtime configuration and environment loading.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use raid_core::CombatParams;

/// Bounded exponential backoff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. At least 1.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Policy for optimistic ledger commits: many short retries.
    pub const fn ledger() -> Self {
        Self {
            max_attempts: 16,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(50),
        }
    }

    /// Policy for reward dispatch: few, slower retries.
    pub const fn reward() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }

    /// Delay before attempt `attempt + 1`, after `attempt` failures.
    ///
    /// Doubles from `base_backoff`, caps at `max_backoff`, and adds up to 50%
    /// random jitter so colliding writers spread out.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);
        let jitter_ceiling = delay.as_micros() as u64 / 2;
        if jitter_ceiling == 0 {
            return delay;
        }
        delay + Duration::from_micros(rand::thread_rng().gen_range(0..=jitter_ceiling))
    }
}

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Damage curve parameters.
    pub combat: CombatParams,
    /// Retry policy for conflicting ledger commits.
    pub retry: RetryPolicy,
    /// Retry policy for reward dispatch.
    pub reward_retry: RetryPolicy,
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
    /// Period of the background expiry sweep; `None` disables the worker.
    pub expiry_interval: Option<Duration>,
    /// Default size of leaderboard snapshots.
    pub leaderboard_size: usize,
    /// Directory for the file repository; `None` keeps raids in memory.
    pub data_dir: Option<PathBuf>,
    /// Base seed for damage rolls; random when unset.
    pub rng_seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            combat: CombatParams::default(),
            retry: RetryPolicy::ledger(),
            reward_retry: RetryPolicy::reward(),
            event_buffer_size: 256,
            command_buffer_size: 32,
            expiry_interval: Some(Duration::from_secs(5)),
            leaderboard_size: 10,
            data_dir: None,
            rng_seed: None,
        }
    }
}

impl RuntimeConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `RAID_MAX_ATTEMPTS` - Ledger commit attempts before giving up (default: 16)
    /// - `RAID_BACKOFF_MS` - Initial ledger retry backoff (default: 1)
    /// - `RAID_MAX_BACKOFF_MS` - Ledger retry backoff cap (default: 50)
    /// - `RAID_REWARD_MAX_ATTEMPTS` - Reward dispatch attempts per batch (default: 3)
    /// - `RAID_REWARD_BACKOFF_MS` - Initial reward retry backoff (default: 200)
    /// - `RAID_EVENT_BUFFER` - Per-topic event buffer (default: 256)
    /// - `RAID_COMMAND_BUFFER` - Reward worker queue size (default: 32)
    /// - `RAID_EXPIRY_INTERVAL_MS` - Expiry sweep period, 0 disables (default: 5000)
    /// - `RAID_LEADERBOARD_SIZE` - Leaderboard snapshot size (default: 10)
    /// - `RAID_DATA_DIR` - Enables the file repository in this directory
    /// - `RAID_RNG_SEED` - Fixed base seed for damage rolls
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(attempts) = parse::<u32>(lookup("RAID_MAX_ATTEMPTS")) {
            config.retry.max_attempts = attempts.max(1);
        }
        if let Some(ms) = parse::<u64>(lookup("RAID_BACKOFF_MS")) {
            config.retry.base_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(lookup("RAID_MAX_BACKOFF_MS")) {
            config.retry.max_backoff = Duration::from_millis(ms);
        }

        if let Some(attempts) = parse::<u32>(lookup("RAID_REWARD_MAX_ATTEMPTS")) {
            config.reward_retry.max_attempts = attempts.max(1);
        }
        if let Some(ms) = parse::<u64>(lookup("RAID_REWARD_BACKOFF_MS")) {
            config.reward_retry.base_backoff = Duration::from_millis(ms);
        }

        if let Some(capacity) = parse::<usize>(lookup("RAID_EVENT_BUFFER")) {
            config.event_buffer_size = capacity.max(1);
        }
        if let Some(capacity) = parse::<usize>(lookup("RAID_COMMAND_BUFFER")) {
            config.command_buffer_size = capacity.max(1);
        }

        if let Some(ms) = parse::<u64>(lookup("RAID_EXPIRY_INTERVAL_MS")) {
            config.expiry_interval = (ms > 0).then(|| Duration::from_millis(ms));
        }

        if let Some(size) = parse::<usize>(lookup("RAID_LEADERBOARD_SIZE")) {
            config.leaderboard_size = size.max(1);
        }

        config.data_dir = lookup("RAID_DATA_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);
        config.rng_seed = parse::<u64>(lookup("RAID_RNG_SEED"));

        config
    }

    /// Platform data directory for persisted raids, if one can be determined.
    pub fn default_data_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "global-raid")
            .map(|dirs| dirs.data_dir().join("raids"))
    }
}

fn parse<T>(value: Option<String>) -> Option<T>
where
    T: std::str::FromStr,
{
    value?.trim().parse().ok()
}
