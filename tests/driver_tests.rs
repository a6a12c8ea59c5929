
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use flockmatch::config::ServerConfig;
use flockmatch::error::MatchmakingError;
use flockmatch::matchmaking::{Matchmaker, MemorySink, SubmitOutcome};
use flockmatch::node::Node;
use flockmatch::registry::{MatchStatus, SessionRegistry};
use flockmatch::scheduler::ManualClock;
use test_harness::{sheep, test_matchmaking_config, wolf};

#[tokio::test]
async fn test_driver_runs_final_flush_then_refuses_work() {
    let clock = Arc::new(ManualClock::new(0));
    let sink = Arc::new(MemorySink::new());
    let (matchmaker, engine) =
        Matchmaker::new(test_matchmaking_config(), clock, sink.clone()).unwrap();

    // Queued before the driver ever ticks; shutdown is already requested.
    matchmaker.submit(sheep(1, 1000).as_test()).unwrap();
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    Node::driver_loop(matchmaker.clone(), engine, 10, shutdown).await;

    assert_eq!(sink.formed().len(), 1);
    assert!(matches!(
        matchmaker.submit(wolf(2, 1000)),
        Err(MatchmakingError::EngineStopped)
    ));
    assert!(matches!(
        matchmaker.queue_depth().await,
        Err(MatchmakingError::EngineStopped)
    ));
}

#[tokio::test]
async fn test_driver_answers_callers() {
    let clock = Arc::new(ManualClock::new(0));
    let (matchmaker, engine) =
        Matchmaker::new(test_matchmaking_config(), clock, Arc::new(MemorySink::new())).unwrap();

    let shutdown = CancellationToken::new();
    let driver = tokio::spawn(Node::driver_loop(
        matchmaker.clone(),
        engine,
        1,
        shutdown.clone(),
    ));

    matchmaker.submit(sheep(1, 1000)).unwrap();
    matchmaker.submit(sheep(2, 1000)).unwrap();
    let depth = matchmaker.queue_depth().await.unwrap();
    assert_eq!(depth.sheep, 2);

    let cancelled = matchmaker.cancel(2).await.unwrap();
    assert!(cancelled.found);
    assert_eq!(matchmaker.queue_depth().await.unwrap().sheep, 1);

    shutdown.cancel();
    driver.await.unwrap();
}

#[tokio::test]
async fn test_registry_follows_engine_events() {
    let clock = Arc::new(ManualClock::new(0));
    let sink = Arc::new(MemorySink::new());
    let mut config = test_matchmaking_config();
    config.max_wait_ticks = 50;
    let (matchmaker, mut engine) = Matchmaker::new(config, clock.clone(), sink.clone()).unwrap();
    let registry = SessionRegistry::new();

    matchmaker.submit(sheep(1, 1000)).unwrap();
    matchmaker.submit(wolf(2, 1010)).unwrap();
    matchmaker.submit(sheep(3, 5000)).unwrap();
    matchmaker.flush(&mut engine);
    engine.match_pending();

    clock.set(100);
    engine.expire_stale();

    for event in sink.drain() {
        registry.apply(&event).await;
    }

    let one = registry.get(1).await.unwrap();
    assert!(matches!(one.status, MatchStatus::Matched { opponent_id: 2, .. }));
    let three = registry.get(3).await.unwrap();
    assert_eq!(three.status, MatchStatus::Expired);
    assert_eq!(registry.len().await, 3);

    // A resubmission is announced after the old match, so it wins.
    matchmaker.submit(sheep(1, 1200)).unwrap();
    matchmaker.flush(&mut engine);
    for event in sink.drain() {
        registry.apply(&event).await;
    }
    assert_eq!(registry.get(1).await.unwrap().status, MatchStatus::Pending);
    assert!(matches!(
        registry.get(2).await.unwrap().status,
        MatchStatus::Matched { opponent_id: 1, .. }
    ));
}

#[tokio::test]
async fn test_extreme_rank_test_request_is_answered() {
    let clock = Arc::new(ManualClock::new(0));
    let (matchmaker, mut engine) =
        Matchmaker::new(test_matchmaking_config(), clock, Arc::new(MemorySink::new())).unwrap();

    for _ in 0..20 {
        let caller = matchmaker.clone();
        let request = sheep(1, i64::MAX).as_test();
        let pending = tokio::spawn(async move { caller.submit_and_wait(request).await });
        while matchmaker.jobs().pending() == 0 {
            tokio::task::yield_now().await;
        }
        let stats = matchmaker.flush(&mut engine);
        assert_eq!(stats.failed, 0);
        assert!(matches!(
            pending.await.unwrap(),
            Ok(SubmitOutcome::ResolvedAgainstBot(_))
        ));
    }
}

#[test]
fn test_node_rejects_invalid_config() {
    let config = ServerConfig::default().with_driver_interval(0);
    assert!(matches!(
        Node::new(config),
        Err(MatchmakingError::InvalidConfig(_))
    ));
}
