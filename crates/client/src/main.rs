//! Global raid simulation binary.
//!
//! Composition root that assembles the raid runtime, seeds the jQuery Titan
//! raid, and drives concurrent simulated attackers at it. A JSON report of the
//! outcome is printed to stdout; logs go to stderr and a session log file.
//!
//! # Examples
//!
//! ```bash
//! # 64 attackers against a small boss, reproducible rolls
//! cargo run -p raid-client -- --attackers 64 --hp 20000 --seed 42
//!
//! # Persist raids to the platform data directory
//! cargo run -p raid-client -- --persist
//! ```

mod logging;
mod sim;

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use raid_runtime::{Clock, Event, RewardEvent, Runtime, RuntimeConfig, Topic};

/// Simulate a shared-boss global raid
#[derive(Parser, Debug)]
#[command(name = "raid-sim")]
#[command(about = "Simulate a shared-boss global raid", long_about = None)]
#[command(version)]
struct Args {
    /// Number of concurrent attackers
    #[arg(long, default_value_t = 32, env = "RAID_SIM_ATTACKERS")]
    attackers: u32,

    /// Attacks each attacker attempts before leaving
    #[arg(long, default_value_t = 50, env = "RAID_SIM_ATTACKS")]
    attacks: u32,

    /// Boss max HP
    #[arg(long, default_value_t = 100_000)]
    hp: u64,

    /// Length of the raid window in hours
    #[arg(long, default_value_t = 72)]
    window_hours: u64,

    /// Persist raids under RAID_DATA_DIR or the platform data directory
    #[arg(long)]
    persist: bool,

    /// Base seed for damage rolls and attacker loadouts
    #[arg(long, env = "RAID_RNG_SEED")]
    seed: Option<u64>,

    /// Log directory (defaults to the platform cache directory)
    #[arg(long, env = "RAID_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let session_id = format!(
        "session_{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
    );
    let _guard = logging::setup_logging(args.log_dir.clone(), &session_id)?;

    let mut config = RuntimeConfig::from_env();
    if args.seed.is_some() {
        config.rng_seed = args.seed;
    }
    if args.persist && config.data_dir.is_none() {
        let dir = RuntimeConfig::default_data_dir()
            .context("no platform data directory, set RAID_DATA_DIR")?;
        config.data_dir = Some(dir);
    }

    tracing::info!(
        attackers = args.attackers,
        attacks = args.attacks,
        hp = args.hp,
        persistence = config.data_dir.is_some(),
        "Starting raid simulation"
    );

    let runtime = Runtime::builder()
        .config(config)
        .catalog(sim::catalog())
        .build()
        .await?;
    let handle = runtime.handle();
    let mut rewards = handle.subscribe(Topic::Reward);

    let now = handle.clock().now();
    let window = Duration::from_secs(args.window_hours.saturating_mul(3_600));
    let raid_id = handle.create_raid(sim::titan(now, args.hp, window))?;

    let base_seed = args.seed.unwrap_or_else(rand::random);
    let tasks: Vec<_> = (0..args.attackers)
        .map(|i| {
            tokio::spawn(sim::run_attacker(
                handle.clone(),
                raid_id,
                format!("dev-{i:03}"),
                args.attacks,
                base_seed ^ u64::from(i),
            ))
        })
        .collect();

    let mut totals = sim::AttackerTally::default();
    for task in tasks {
        totals.absorb(task.await?);
    }

    let status = handle.status(raid_id).await?;
    if status.status.is_terminal() {
        // Give the reward worker a moment to report before printing.
        match tokio::time::timeout(Duration::from_secs(5), rewards.recv()).await {
            Ok(Ok(Event::Reward(RewardEvent::RewardFailed { error, .. }))) => {
                tracing::warn!(raid = %raid_id, error = %error, "Rewards not delivered");
            }
            Ok(_) => {}
            Err(_) => tracing::warn!(raid = %raid_id, "Timed out waiting for reward outcome"),
        }
    }

    let report = serde_json::json!({
        "raid": status,
        "attackers": args.attackers,
        "attacks_landed": totals.landed,
        "attacks_rejected": totals.rejected,
        "conflicts": totals.conflicts,
        "killing_blows": totals.killing_blows,
        "credited_damage": totals.damage,
        "reward": handle.reward_status(raid_id),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    runtime.shutdown().await?;
    tracing::info!("Simulation complete");
    Ok(())
}
