
use std::collections::HashSet;
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use flockmatch::matchmaking::{Faction, MatchEvent, MatchRequest, SubmitOutcome};
use test_harness::{sheep, test_matchmaking_config, wolf, Harness};

#[test]
fn test_widening_window_eventually_pairs() {
    let mut h = Harness::started(test_matchmaking_config());

    h.submit(sheep(1, 1000));
    h.submit(wolf(2, 1060));
    h.flush();

    // Width 50 at age 0, 55 at age 100: still too far apart.
    h.flush_at(100);
    assert!(h.formed().is_empty());
    assert_eq!(h.engine.queue_depth().total(), 2);

    // Width 60 at age 200.
    h.flush_at(200);
    let formed = h.formed();
    assert_eq!(formed.len(), 1);
    assert_eq!(formed[0].sheep.user_id, 1);
    assert_eq!(formed[0].wolf.user_id, 2);
    assert_eq!(formed[0].rank_gap(), 60);
    assert_eq!(formed[0].formed_at_tick, 200);
    assert_eq!(h.engine.queue_depth().total(), 0);
}

#[test]
fn test_duplicate_submission_keeps_latest_rank() {
    let mut h = Harness::new(test_matchmaking_config());

    h.submit(sheep(7, 1000));
    h.submit(sheep(7, 1300));
    h.flush();

    let depth = h.engine.queue_depth();
    assert_eq!(depth.sheep, 1);
    assert_eq!(depth.wolf, 0);
    assert_eq!(h.engine.queued(7).map(|r| r.rank_point), Some(1300));
}

#[tokio::test]
async fn test_duplicate_submission_reports_replacement() {
    let mut h = Harness::new(test_matchmaking_config());
    h.submit(sheep(7, 1000));
    h.flush();

    let mm = h.matchmaker.clone();
    let pending = tokio::spawn(async move { mm.submit_and_wait(wolf(7, 900)).await });
    while h.matchmaker.jobs().pending() == 0 {
        tokio::task::yield_now().await;
    }
    h.flush();

    assert_eq!(pending.await.unwrap().unwrap(), SubmitOutcome::Replaced);
    let depth = h.engine.queue_depth();
    assert_eq!((depth.sheep, depth.wolf), (0, 1));
}

#[test]
fn test_cancel_unknown_user_leaves_queues_alone() {
    let mut h = Harness::new(test_matchmaking_config());
    h.submit(sheep(1, 1000));
    h.submit(wolf(2, 1500));
    h.flush();
    h.events();
    let before = h.engine.queue_depth();

    let result = h.engine.cancel(7);
    assert!(!result.found);
    assert_eq!(result.user_id, 7);
    assert_eq!(h.engine.queue_depth(), before);
    assert!(h.events().is_empty());
}

#[test]
fn test_cancel_removes_queued_request() {
    let mut h = Harness::new(test_matchmaking_config());
    h.submit(sheep(7, 1000));
    h.flush();
    h.events();

    assert!(h.engine.cancel(7).found);
    assert_eq!(h.engine.queue_depth().total(), 0);
    assert_eq!(h.events(), vec![MatchEvent::Cancelled { user_id: 7 }]);
}

#[test]
fn test_test_request_resolves_against_bot_without_queueing() {
    let mut h = Harness::started(test_matchmaking_config());

    h.submit(sheep(7, 1000).as_test());
    h.flush();

    assert_eq!(h.engine.queue_depth().total(), 0);
    let formed = h.formed();
    assert_eq!(formed.len(), 1);
    let result = &formed[0];
    assert!(result.is_test);
    assert_eq!(result.sheep.user_id, 7);
    assert!(result.wolf.is_test);
    assert!(result.wolf.is_bot);
    assert_ne!(result.wolf.user_id, 7);
    assert!(result.rank_gap() <= 50);
    assert_eq!(result.formed_at_tick, 0);
}

#[test]
fn test_real_request_never_pairs_with_bot() {
    let mut h = Harness::started(test_matchmaking_config());

    h.submit(wolf(1, 1000));
    h.submit(sheep(2, 1000).as_test());
    h.flush();
    h.flush_at(100);

    // The test request got its bot; the real wolf is still waiting.
    let formed = h.formed();
    assert_eq!(formed.len(), 1);
    assert_eq!(formed[0].sheep.user_id, 2);
    assert_eq!(h.engine.queue_depth().wolf, 1);
    assert!(h.engine.queued(1).is_some());
}

#[test]
fn test_oldest_anchor_pairs_first() {
    let mut h = Harness::started(test_matchmaking_config());

    h.submit(wolf(10, 1030));
    h.flush_at(0);
    h.submit(wolf(11, 1020));
    h.flush_at(10);
    h.submit(wolf(12, 980));
    h.flush_at(20);
    h.submit(sheep(1, 1000));
    h.flush_at(30);

    h.flush_at(100);
    let formed = h.formed();

    // Wolves 11 and 12 are closer in rank, but wolf 10 has waited longest.
    assert_eq!(formed.len(), 1);
    assert_eq!(formed[0].wolf.user_id, 10);
    assert_eq!(formed[0].sheep.user_id, 1);
}

#[test]
fn test_equal_gap_prefers_longest_waiting_partner() {
    let mut h = Harness::started(test_matchmaking_config());

    h.submit(sheep(1, 1000));
    h.flush_at(0);
    h.submit(wolf(21, 1020));
    h.flush_at(5);
    h.submit(wolf(20, 980));
    h.flush_at(10);

    h.flush_at(100);
    let formed = h.formed();
    assert_eq!(formed.len(), 1);
    assert_eq!(formed[0].wolf.user_id, 21);
}

#[test]
fn test_stale_requests_expire() {
    let mut h = Harness::started(test_matchmaking_config());

    h.submit(sheep(1, 100));
    h.submit(wolf(2, 3000));
    h.flush();

    // Exactly at the limit is not yet expired.
    h.flush_at(1_000);
    assert_eq!(h.engine.queue_depth().total(), 2);

    h.flush_at(1_100);
    assert_eq!(h.engine.queue_depth().total(), 0);
    let expired: Vec<u64> = h
        .events()
        .into_iter()
        .filter_map(|e| match e {
            MatchEvent::Expired(request) => Some(request.user_id),
            _ => None,
        })
        .collect();
    assert_eq!(expired, vec![1, 2]);
    assert!(h.formed().is_empty());
}

#[test]
fn test_sweep_keeps_rearming() {
    let mut h = Harness::started(test_matchmaking_config());
    assert_eq!(h.matchmaker.jobs().pending(), 1);

    for tick in (100..=1_000).step_by(100) {
        h.flush_at(tick);
        assert_eq!(h.matchmaker.jobs().pending(), 1);
    }

    // Arming twice does not double the sweep.
    h.matchmaker.start().unwrap();
    h.flush();
    assert_eq!(h.matchmaker.jobs().pending(), 1);
}

#[test]
fn test_no_submission_matched_twice() {
    let mut h = Harness::started(test_matchmaking_config());
    let mut rng = StdRng::seed_from_u64(42);

    // Users resubmit often, so replacement and matching interleave.
    let mut tick = 0;
    for _ in 0..400 {
        let user_id = rng.gen_range(1..=60);
        let faction = if rng.gen_bool(0.5) {
            Faction::Sheep
        } else {
            Faction::Wolf
        };
        h.submit(MatchRequest::new(user_id, faction, rng.gen_range(900..1100)));
        if rng.gen_bool(0.1) {
            h.matchmaker
                .jobs()
                .push_fn("cancel", move |engine| {
                    engine.cancel(user_id);
                });
        }
        tick += rng.gen_range(0..40);
        h.flush_at(tick);
    }

    let mut matched: Vec<(u64, u64)> = Vec::new();
    for result in h.formed() {
        assert_ne!(result.sheep.faction, result.wolf.faction);
        matched.push((result.sheep.user_id, result.sheep.seq));
        matched.push((result.wolf.user_id, result.wolf.seq));
    }

    // Each accepted submission is matched at most once.
    let unique: HashSet<_> = matched.iter().collect();
    assert_eq!(unique.len(), matched.len());

    // A user is never queued in both factions at once.
    let queued: usize = (1..=60).filter(|id| h.engine.queued(*id).is_some()).count();
    assert_eq!(queued, h.engine.queue_depth().total());
}

#[test]
fn test_concurrent_submitters_single_owner() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 100;

    let mut h = Harness::new(test_matchmaking_config());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let mm = h.matchmaker.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let user_id = t * PER_THREAD + i + 1;
                    // All on one faction so nothing pairs and all stay queued.
                    mm.submit(sheep(user_id, 1000)).unwrap();
                }
            })
        })
        .collect();

    while handles.iter().any(|handle| !handle.is_finished()) {
        h.flush();
        thread::yield_now();
    }
    for handle in handles {
        handle.join().unwrap();
    }
    h.flush();

    assert_eq!(h.engine.queue_depth().sheep as u64, THREADS * PER_THREAD);
    assert_eq!(h.engine.queue_depth().wolf, 0);
}

#[test]
fn test_rank_deltas_favor_underdog() {
    let mut h = Harness::new(test_matchmaking_config());
    h.submit(sheep(1, 1000));
    h.submit(wolf(2, 1040));
    h.flush();

    let formed = h.engine.match_pending();
    assert_eq!(formed.len(), 1);
    let deltas = formed[0].deltas;
    assert!(deltas.sheep_win > deltas.wolf_win);
    assert!(deltas.sheep_loss > deltas.wolf_loss);
    assert_eq!(deltas.sheep_win + deltas.wolf_loss, 0);
    assert_eq!(deltas.wolf_win + deltas.sheep_loss, 0);
}
