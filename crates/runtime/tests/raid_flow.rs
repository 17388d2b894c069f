//! End-to-end raid scenarios driven through the public handle.
//!
//! Every test pins the clock, disables critical hits and uses a boss with no
//! defense at the speed baseline, so an item with attack `X` deals exactly `X`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use raid_core::{
    BossProfile, BossStats, DamageRoll, InactiveReason, ItemDefinition, ItemStats, Raid, RaidId,
    RaidRewards, RaidSpec, RaidStatus, StaticItemCatalog, Timestamp, UserId,
};
use raid_runtime::{
    AttackRequest, DispatchState, ErrorKind, Event, FileRaidRepository, LifecycleEvent,
    ManualClock, RaidHandle, RaidRepository, RaidSelector, RetryPolicy, RewardBatch,
    RewardDistributor, RewardError, RewardEvent, Runtime, RuntimeConfig, RuntimeError, Topic,
};
use tokio::sync::broadcast;

const START: Timestamp = Timestamp(1_000);
const END: Timestamp = Timestamp(100_000);

fn spec(max_hp: u64, starts_at: Timestamp, ends_at: Timestamp) -> RaidSpec {
    RaidSpec {
        boss: BossProfile {
            name: "jQuery Titan".into(),
            title: "The Legacy Framework Awakens".into(),
            description: "A massive legacy framework rises from deprecated code.".into(),
            target_category: Some("frontend".into()),
        },
        stats: BossStats {
            attack: 50,
            defense: 0,
            speed: 20,
        },
        max_hp,
        starts_at,
        ends_at,
        rewards: RaidRewards {
            participation_xp: 100,
            victory_xp: 500,
            top_damager_title: Some("Legacy Slayer".into()),
        },
    }
}

fn catalog() -> StaticItemCatalog {
    [("p1", 1), ("p40", 40), ("p60", 60), ("p70", 70)]
        .into_iter()
        .map(|(id, attack)| ItemDefinition::new(id, Some(ItemStats { attack, speed: 0 })))
        .collect()
}

fn config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.combat.crit_chance_pct = 0;
    config.expiry_interval = None;
    config.rng_seed = Some(7);
    config.reward_retry = RetryPolicy {
        max_attempts: 2,
        base_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
    };
    config
}

async fn start_with(
    clock: Arc<ManualClock>,
    distributor: Option<Arc<dyn RewardDistributor>>,
) -> Runtime {
    let mut builder = Runtime::builder()
        .config(config())
        .catalog(catalog())
        .clock(clock);
    if let Some(distributor) = distributor {
        builder = builder.shared_reward_distributor(distributor);
    }
    builder.build().await.expect("runtime should start")
}

async fn start(clock: Arc<ManualClock>) -> Runtime {
    start_with(clock, None).await
}

fn attack(raid: RaidId, user: &str, items: &[&str]) -> AttackRequest {
    AttackRequest::new(raid, user, items.iter().copied())
}

async fn next_event(rx: &mut broadcast::Receiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event should arrive in time")
        .expect("event channel should stay open")
}

#[derive(Default)]
struct CountingDistributor {
    calls: AtomicU32,
    failing: AtomicBool,
}

#[async_trait]
impl RewardDistributor for CountingDistributor {
    async fn distribute(&self, _batch: &RewardBatch) -> Result<(), RewardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RewardError::Unavailable("reward service down".into()));
        }
        Ok(())
    }
}

/// Distributor that takes a while per batch and records what it delivered.
#[derive(Default)]
struct SlowDistributor {
    delivered: std::sync::Mutex<Vec<RaidId>>,
}

#[async_trait]
impl RewardDistributor for SlowDistributor {
    async fn distribute(&self, batch: &RewardBatch) -> Result<(), RewardError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.delivered.lock().unwrap().push(batch.raid_id);
        Ok(())
    }
}

fn is_delivered(handle: &RaidHandle, raid_id: RaidId) -> bool {
    matches!(
        handle.reward_status(raid_id),
        Some(DispatchState::Delivered { .. })
    )
}

async fn wait_for_delivery(handle: &RaidHandle, raid_id: RaidId) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !is_delivered(handle, raid_id) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("rewards should be delivered in time");
}

async fn create(handle: &RaidHandle, max_hp: u64) -> RaidId {
    handle
        .create_raid(spec(max_hp, START, END))
        .expect("raid should be created")
}

#[tokio::test]
async fn damage_accumulates_and_ranks_participants() {
    let clock = Arc::new(ManualClock::new(START));
    let runtime = start(Arc::clone(&clock)).await;
    let handle = runtime.handle();
    let raid_id = create(&handle, 1_000).await;

    for _ in 0..3 {
        handle
            .attack(attack(raid_id, "alice", &["p40"]))
            .await
            .expect("attack should land");
    }
    let receipt = handle
        .attack(attack(raid_id, "bob", &["p60"]))
        .await
        .expect("attack should land");

    assert_eq!(receipt.damage, 60);
    assert_eq!(receipt.boss_hp, 1_000 - 180);
    assert_eq!(receipt.user_total, 60);
    assert!(!receipt.killing_blow);
    assert_eq!(receipt.xp_earned, 6);

    let board = handle.leaderboard(raid_id, 10).await.expect("leaderboard");
    let order: Vec<_> = board
        .iter()
        .map(|s| (s.user_id.as_str(), s.damage, s.rank))
        .collect();
    assert_eq!(order, vec![("alice", 120, 1), ("bob", 60, 2)]);

    let status = handle.status(raid_id).await.expect("status");
    assert_eq!(status.status, RaidStatus::Active);
    assert_eq!(status.current_hp, 820);
    assert_eq!(status.participant_count, 2);
    assert_eq!(status.time_remaining_ms, END.0 - START.0);

    let log = handle.attack_log(raid_id).expect("attack log");
    let seqs: Vec<_> = log.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3]);

    runtime.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn killing_blow_is_clamped_and_closes_the_raid() {
    let clock = Arc::new(ManualClock::new(START));
    let distributor = Arc::new(CountingDistributor::default());
    let runtime = start_with(
        Arc::clone(&clock),
        Some(distributor.clone() as Arc<dyn RewardDistributor>),
    )
    .await;
    let handle = runtime.handle();
    let mut lifecycle = handle.subscribe(Topic::Lifecycle);
    let mut rewards = handle.subscribe(Topic::Reward);
    let raid_id = create(&handle, 100).await;
    assert!(matches!(
        next_event(&mut lifecycle).await,
        Event::Lifecycle(LifecycleEvent::RaidCreated { .. })
    ));

    handle
        .attack(attack(raid_id, "alice", &["p70"]))
        .await
        .expect("first hit");
    let receipt = handle
        .attack(attack(raid_id, "bob", &["p60"]))
        .await
        .expect("killing blow");

    assert_eq!(receipt.damage, 30);
    assert_eq!(receipt.requested_damage, 60);
    assert!(receipt.killing_blow);
    assert_eq!(receipt.boss_hp, 0);

    match next_event(&mut lifecycle).await {
        Event::Lifecycle(LifecycleEvent::RaidClosed {
            raid_id: closed,
            status,
            participants,
            ..
        }) => {
            assert_eq!(closed, raid_id);
            assert_eq!(status, RaidStatus::Defeated);
            assert_eq!(participants, 2);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(
        next_event(&mut rewards).await,
        Event::Reward(RewardEvent::RewardDelivered { attempts: 1, .. })
    ));
    assert_eq!(
        handle.reward_status(raid_id),
        Some(DispatchState::Delivered { attempts: 1 })
    );

    let err = handle
        .attack(attack(raid_id, "carol", &["p1"]))
        .await
        .expect_err("raid is over");
    assert_eq!(err.kind(), ErrorKind::InactiveRaid);
    assert!(matches!(
        err,
        RuntimeError::InactiveRaid {
            reason: InactiveReason::Defeated,
            ..
        }
    ));

    // Passing the window afterwards must not close the raid a second time.
    clock.set(END);
    assert!(handle.sweep_expired().await.expect("sweep").is_empty());
    let raid = handle.raid(raid_id).await.expect("raid");
    assert_eq!(raid.status(), RaidStatus::Defeated);
    assert_eq!(raid.credited_damage(), 100);

    runtime.shutdown().await.expect("shutdown");
    assert_eq!(distributor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn attack_after_window_expires_the_raid() {
    let clock = Arc::new(ManualClock::new(START));
    let runtime = start(Arc::clone(&clock)).await;
    let handle = runtime.handle();
    let raid_id = create(&handle, 100).await;

    handle
        .attack(attack(raid_id, "alice", &["p60"]))
        .await
        .expect("hit inside the window");

    clock.set(END);
    let err = handle
        .attack(attack(raid_id, "alice", &["p60"]))
        .await
        .expect_err("window has closed");
    assert!(matches!(
        err,
        RuntimeError::InactiveRaid {
            reason: InactiveReason::Expired,
            ..
        }
    ));

    let status = handle.status(raid_id).await.expect("status");
    assert_eq!(status.status, RaidStatus::Expired);
    assert_eq!(status.current_hp, 40);
    assert_eq!(status.time_remaining_ms, 0);
    assert_eq!(handle.attack_log(raid_id).expect("log").len(), 1);

    let history = handle.raid_history(10).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id(), raid_id);
    assert_eq!(history[0].closed_at(), Some(END));

    runtime.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn reads_expire_overdue_raids() {
    let clock = Arc::new(ManualClock::new(START));
    let runtime = start(Arc::clone(&clock)).await;
    let handle = runtime.handle();
    let raid_id = create(&handle, 100).await;

    clock.set(END.plus_millis(1));
    let raid = handle.raid(raid_id).await.expect("raid");
    assert_eq!(raid.status(), RaidStatus::Expired);
    assert!(handle.sweep_expired().await.expect("sweep").is_empty());

    runtime.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn invalid_loadouts_never_reach_the_ledger() {
    let clock = Arc::new(ManualClock::new(START));
    let runtime = start(Arc::clone(&clock)).await;
    let handle = runtime.handle();
    let raid_id = create(&handle, 100).await;

    let cases: [&[&str]; 4] = [
        &[],
        &["p1", "p1"],
        &["unknown"],
        &["p1", "p40", "p60", "p70", "p1", "p40"],
    ];
    for items in cases {
        let err = handle
            .attack(attack(raid_id, "alice", items))
            .await
            .expect_err("loadout should be rejected");
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "items: {items:?}");
    }

    assert!(handle.attack_log(raid_id).expect("log").is_empty());
    assert_eq!(handle.raid(raid_id).await.expect("raid").current_hp(), 100);

    runtime.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn unknown_raid_is_not_found() {
    let clock = Arc::new(ManualClock::new(START));
    let runtime = start(Arc::clone(&clock)).await;
    let handle = runtime.handle();

    let err = handle
        .attack(attack(RaidId(42), "alice", &["p1"]))
        .await
        .expect_err("no such raid");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = handle
        .attack(AttackRequest::new(RaidSelector::Active, "alice", ["p1"]))
        .await
        .expect_err("nothing is running");
    assert!(matches!(err, RuntimeError::NoActiveRaid));

    runtime.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn upcoming_raids_reject_attacks_until_they_start() {
    let clock = Arc::new(ManualClock::new(START));
    let runtime = start(Arc::clone(&clock)).await;
    let handle = runtime.handle();
    let later = handle
        .create_raid(spec(100, Timestamp(50_000), Timestamp(90_000)))
        .expect("raid");
    let soon = handle
        .create_raid(spec(100, Timestamp(5_000), Timestamp(90_000)))
        .expect("raid");

    let upcoming: Vec<_> = handle
        .upcoming_raids()
        .expect("upcoming")
        .iter()
        .map(|raid| raid.id())
        .collect();
    assert_eq!(upcoming, vec![soon, later]);

    let err = handle
        .attack(attack(soon, "alice", &["p1"]))
        .await
        .expect_err("not started");
    assert!(matches!(
        err,
        RuntimeError::InactiveRaid {
            reason: InactiveReason::NotStarted,
            ..
        }
    ));
    assert!(matches!(
        handle.status(RaidSelector::Active).await,
        Err(RuntimeError::NoActiveRaid)
    ));

    clock.set(Timestamp(5_000));
    let receipt = handle
        .attack(AttackRequest::new(RaidSelector::Active, "alice", ["p1"]))
        .await
        .expect("raid has started");
    assert_eq!(receipt.raid_id, soon);
    assert_eq!(handle.upcoming_raids().expect("upcoming").len(), 1);

    runtime.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn active_selector_skips_and_expires_overdue_raids() {
    let clock = Arc::new(ManualClock::new(START));
    let runtime = start(Arc::clone(&clock)).await;
    let handle = runtime.handle();
    let short = handle
        .create_raid(spec(100, START, Timestamp(2_000)))
        .expect("raid");
    let long = handle
        .create_raid(spec(100, Timestamp(1_500), END))
        .expect("raid");

    assert_eq!(
        handle.status(RaidSelector::Active).await.expect("status").raid_id,
        short
    );

    clock.set(Timestamp(2_000));
    assert_eq!(
        handle.status(RaidSelector::Active).await.expect("status").raid_id,
        long
    );
    assert_eq!(
        handle.raid(short).await.expect("raid").status(),
        RaidStatus::Expired
    );

    runtime.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failed_rewards_keep_the_outcome_and_can_be_retried() {
    let clock = Arc::new(ManualClock::new(START));
    let distributor = Arc::new(CountingDistributor::default());
    distributor.failing.store(true, Ordering::SeqCst);
    let runtime = start_with(
        Arc::clone(&clock),
        Some(distributor.clone() as Arc<dyn RewardDistributor>),
    )
    .await;
    let handle = runtime.handle();
    let mut rewards = handle.subscribe(Topic::Reward);
    let raid_id = create(&handle, 40).await;

    handle
        .attack(attack(raid_id, "alice", &["p40"]))
        .await
        .expect("killing blow");

    match next_event(&mut rewards).await {
        Event::Reward(RewardEvent::RewardFailed { raid_id: failed, attempts, .. }) => {
            assert_eq!(failed, raid_id);
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(
        handle.reward_status(raid_id),
        Some(DispatchState::Failed { attempts: 2, .. })
    ));
    assert_eq!(
        handle.raid(raid_id).await.expect("raid").status(),
        RaidStatus::Defeated
    );

    distributor.failing.store(false, Ordering::SeqCst);
    assert_eq!(handle.retry_failed_rewards().expect("retry"), 1);
    assert!(matches!(
        next_event(&mut rewards).await,
        Event::Reward(RewardEvent::RewardDelivered { attempts: 1, .. })
    ));
    assert_eq!(handle.retry_failed_rewards().expect("retry"), 0);

    runtime.shutdown().await.expect("shutdown");
    assert_eq!(distributor.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn user_stats_span_raids() {
    let clock = Arc::new(ManualClock::new(START));
    let runtime = start(Arc::clone(&clock)).await;
    let handle = runtime.handle();
    let won = create(&handle, 60).await;
    let open = create(&handle, 1_000).await;

    handle
        .attack(attack(won, "alice", &["p70"]))
        .await
        .expect("killing blow");
    handle
        .attack(attack(open, "alice", &["p40"]))
        .await
        .expect("hit");
    handle
        .attack(attack(open, "alice", &["p1"]))
        .await
        .expect("hit");
    handle
        .attack(attack(open, "bob", &["p60"]))
        .await
        .expect("hit");

    let stats = handle.user_stats(&UserId::from("alice")).expect("stats");
    assert_eq!(stats.raids_participated, 2);
    assert_eq!(stats.victories, 1);
    assert_eq!(stats.total_damage, 101);
    assert_eq!(stats.total_attacks, 3);
    assert_eq!(stats.best_attack, 60);

    let standing = handle
        .standing(open, &UserId::from("alice"))
        .await
        .expect("standing")
        .expect("alice attacked");
    assert_eq!(standing.rank, 2);
    assert_eq!(standing.damage, 41);
    assert!(
        handle
            .standing(open, &UserId::from("carol"))
            .await
            .expect("standing")
            .is_none()
    );

    runtime.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn file_repository_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(START));
    let mut config = config();
    config.data_dir = Some(dir.path().to_path_buf());

    let runtime = Runtime::builder()
        .config(config.clone())
        .catalog(catalog())
        .clock(clock.clone())
        .build()
        .await
        .expect("runtime");
    let handle = runtime.handle();
    let raid_id = create(&handle, 500).await;
    handle
        .attack(attack(raid_id, "alice", &["p60"]))
        .await
        .expect("hit");
    handle
        .attack(attack(raid_id, "bob", &["p40", "p1"]))
        .await
        .expect("hit");
    runtime.shutdown().await.expect("shutdown");

    let runtime = Runtime::builder()
        .config(config)
        .catalog(catalog())
        .clock(clock)
        .build()
        .await
        .expect("runtime");
    let handle = runtime.handle();

    let raid = handle.raid(raid_id).await.expect("raid survives restart");
    assert_eq!(raid.current_hp(), 500 - 101);
    assert!(raid.is_conserved());
    assert_eq!(handle.attack_log(raid_id).expect("log").len(), 2);

    let next = create(&handle, 10).await;
    assert_ne!(next, raid_id);

    runtime.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn killing_blow_on_a_full_reward_queue_is_handed_off_later() {
    let clock = Arc::new(ManualClock::new(START));
    let distributor = Arc::new(SlowDistributor::default());
    let mut config = config();
    config.command_buffer_size = 1;
    let runtime = Runtime::builder()
        .config(config)
        .catalog(catalog())
        .clock(clock)
        .shared_reward_distributor(distributor.clone())
        .build()
        .await
        .expect("runtime");
    let handle = runtime.handle();
    let raids = [
        create(&handle, 40).await,
        create(&handle, 40).await,
        create(&handle, 40).await,
    ];

    for &raid_id in &raids[..2] {
        handle
            .attack(attack(raid_id, "alice", &["p40"]))
            .await
            .expect("killing blow");
    }
    // The caller gives up on the last killing blow; its outcome must stand.
    let _ = tokio::time::timeout(
        Duration::from_millis(50),
        handle.attack(attack(raids[2], "bob", &["p40"])),
    )
    .await;

    let last = handle.raid(raids[2]).await.expect("raid");
    assert_eq!(last.status(), RaidStatus::Defeated);
    assert_eq!(last.current_hp(), 0);
    assert!(matches!(
        handle.reward_status(raids[2]),
        Some(DispatchState::Failed { attempts: 0, .. })
    ));

    for _ in 0..50 {
        handle.sweep_expired().await.expect("sweep");
        if raids.iter().all(|&raid_id| is_delivered(&handle, raid_id)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    for &raid_id in &raids {
        assert_eq!(
            handle.reward_status(raid_id),
            Some(DispatchState::Delivered { attempts: 1 })
        );
    }

    runtime.shutdown().await.expect("shutdown");
    let mut delivered = distributor.delivered.lock().unwrap().clone();
    delivered.sort();
    assert_eq!(delivered, raids.to_vec());
}

#[tokio::test]
async fn defeat_committed_before_a_crash_is_rewarded_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raid_id = {
        // The commit lands, then the process dies before the hand-off.
        let repo = FileRaidRepository::new(dir.path()).expect("repo");
        let raid_id = repo.next_id().expect("id");
        let mut raid = Raid::new(raid_id, spec(40, START, END), START).expect("raid");
        repo.insert(&raid).expect("insert");
        let outcome = raid
            .apply_attack(
                &UserId::from("alice"),
                DamageRoll {
                    damage: 40,
                    is_critical: false,
                },
                &[],
                START,
            )
            .expect("killing blow");
        assert!(outcome.killing_blow);
        repo.commit(0, &raid, Some(&outcome.record)).expect("commit");
        raid_id
    };

    let mut config = config();
    config.data_dir = Some(dir.path().to_path_buf());
    let restart = |distributor: Arc<CountingDistributor>| {
        Runtime::builder()
            .config(config.clone())
            .catalog(catalog())
            .clock(Arc::new(ManualClock::new(START)))
            .shared_reward_distributor(distributor)
            .build()
    };

    let distributor = Arc::new(CountingDistributor::default());
    let runtime = restart(distributor.clone()).await.expect("runtime");
    let handle = runtime.handle();
    wait_for_delivery(&handle, raid_id).await;
    runtime.shutdown().await.expect("shutdown");
    assert_eq!(distributor.calls.load(Ordering::SeqCst), 1);

    // Delivery state is journaled; a second restart sends nothing.
    let distributor = Arc::new(CountingDistributor::default());
    let runtime = restart(distributor.clone()).await.expect("runtime");
    let handle = runtime.handle();
    assert_eq!(
        handle.reward_status(raid_id),
        Some(DispatchState::Delivered { attempts: 1 })
    );
    assert!(handle.sweep_expired().await.expect("sweep").is_empty());
    runtime.shutdown().await.expect("shutdown");
    assert_eq!(distributor.calls.load(Ordering::SeqCst), 0);
}
