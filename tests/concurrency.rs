use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use repo_state::{
    Commit, HeadState, KeySet, RepoStorePatch, StateHub, StateHubConfig, StateKey, TagList,
    WorkingDirState,
};

/// One distinct field per thread.
fn single_field_patch(i: usize) -> RepoStorePatch {
    let p = RepoStorePatch::new();
    match i {
        0 => p.with_status(WorkingDirState::default()),
        1 => p.with_head(HeadState::default()),
        2 => p.with_long_status("long"),
        3 => p.with_short_status("short"),
        4 => p.with_branches(Vec::new()),
        5 => p.with_remotes(BTreeMap::from([("origin".to_string(), "url".to_string())])),
        6 => p.with_local_tags(TagList::default()),
        7 => p.with_last_local_branch_for_rebase(Some("main".to_string())),
        8 => p.with_last_remote_used(Some("origin".to_string())),
        9 => p.with_last_remote_used_for_push(Some("origin".to_string())),
        10 => p.with_last_remote_used_with_option_all(Some("upstream".to_string())),
        11 => p.with_last_reset_mode_used(Some("--hard".to_string())),
        12 => p.with_short_hash_length(7),
        13 => p.with_stashes(Vec::new()),
        14 => p.with_recent_commits(vec![Commit {
            hash: "abc".to_string(),
            message: "m".to_string(),
        }]),
        _ => p.with_descriptions(BTreeMap::new()),
    }
}

#[test]
fn concurrent_single_field_updates_are_never_lost() {
    const THREADS: usize = 16;

    for _ in 0..20 {
        let hub = Arc::new(StateHub::new(StateHubConfig::default()));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let hub = Arc::clone(&hub);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    hub.update("/shared", single_field_patch(i))
                })
            })
            .collect();

        let mut union = KeySet::new();
        for h in handles {
            union = union.union(&h.join().unwrap());
        }

        let state = hub.get("/shared").snapshot();
        assert_eq!(union.len(), THREADS);
        assert_eq!(state.present_keys(), KeySet::all());
        assert_eq!(state.short_hash_length, Some(7));
        assert_eq!(state.last_reset_mode_used.as_deref(), Some("--hard"));
        assert_eq!(state.remotes.as_ref().map(BTreeMap::len), Some(1));
    }
}

#[test]
fn every_update_is_delivered_exactly_once_under_contention() {
    const THREADS: usize = 8;
    const UPDATES: usize = 200;

    let hub = Arc::new(StateHub::new(StateHubConfig {
        slow_callback_threshold: None,
        ..StateHubConfig::default()
    }));
    let hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&hits);
    let _sub = hub.subscribe("*", StateKey::ShortStatus, move |_, _| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    thread::scope(|s| {
        for t in 0..THREADS {
            let hub = &hub;
            s.spawn(move || {
                for u in 0..UPDATES {
                    let repo = format!("/repo/{}", (t + u) % 4);
                    hub.update(&repo, RepoStorePatch::new().with_short_status(format!("{t}:{u}")));
                }
            });
        }
    });

    assert_eq!(hits.load(Ordering::SeqCst), THREADS * UPDATES);
    assert_eq!(hub.stats().updates, (THREADS * UPDATES) as u64);
    assert_eq!(hub.repo_paths().len(), 4);
}

#[test]
fn subscribe_and_unsubscribe_race_with_dispatch() {
    let hub = Arc::new(StateHub::new(StateHubConfig {
        slow_callback_threshold: None,
        ..StateHubConfig::default()
    }));
    let stable_hits = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&stable_hits);
    let _stable = hub.subscribe("/r", StateKey::Head, move |_, _| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let stop = Arc::new(AtomicBool::new(false));

    let churn = {
        let hub = Arc::clone(&hub);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut cycles = 0usize;
            while !stop.load(Ordering::Relaxed) {
                let sub = hub.subscribe("/r", StateKey::Head, |_, _| Ok(()));
                let watch = hub.watch_with_capacity("*", KeySet::all(), 1);
                sub.unsubscribe();
                drop(watch);
                cycles += 1;
            }
            cycles
        })
    };

    for i in 0..500 {
        hub.update(
            "/r",
            RepoStorePatch::new().with_head(HeadState {
                ahead: i,
                ..HeadState::default()
            }),
        );
    }
    stop.store(true, Ordering::Relaxed);
    let cycles = churn.join().unwrap();

    assert!(cycles > 0);
    assert_eq!(stable_hits.load(Ordering::SeqCst), 500);
    assert_eq!(hub.subscriber_count(), 1);
}

#[test]
fn concurrent_remember_branch_keeps_two_slots() {
    let hub = Arc::new(StateHub::new(StateHubConfig::default()));

    thread::scope(|s| {
        for t in 0..8 {
            let hub = &hub;
            s.spawn(move || {
                for u in 0..100 {
                    hub.remember_branch("/r", &format!("b{t}-{u}"));
                }
            });
        }
    });

    let state = hub.get("/r").snapshot();
    assert_eq!(state.last_branches.len(), 2);
    assert!(state.last_branches.iter().all(|slot| slot.is_some()));
}

#[test]
fn first_touch_from_many_threads_creates_one_entry() {
    let hub = Arc::new(StateHub::new(StateHubConfig::default()));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let hub = Arc::clone(&hub);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                hub.get("/lazy")
            })
        })
        .collect();

    let states: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(states.windows(2).all(|w| w[0].ptr_eq(&w[1])));
    assert_eq!(hub.repo_paths(), ["/lazy"]);
}

#[test]
fn blocked_callback_observes_a_racing_later_update() {
    let hub = Arc::new(StateHub::new(StateHubConfig {
        slow_callback_threshold: None,
        ..StateHubConfig::default()
    }));
    let entered = Arc::new(Barrier::new(2));
    let resume = Arc::new(Barrier::new(2));
    let first_call = Arc::new(AtomicBool::new(true));
    let observed = Arc::new(parking_lot::Mutex::new(None));

    let _sub = {
        let (entered, resume) = (Arc::clone(&entered), Arc::clone(&resume));
        let (first_call, observed) = (Arc::clone(&first_call), Arc::clone(&observed));
        hub.subscribe("/r", StateKey::ShortStatus, move |_, state| {
            if first_call.swap(false, Ordering::SeqCst) {
                entered.wait();
                resume.wait();
                *observed.lock() = state.read().short_status.clone();
            }
            Ok(())
        })
    };

    let first = {
        let hub = Arc::clone(&hub);
        thread::spawn(move || hub.update("/r", RepoStorePatch::new().with_short_status("first")))
    };

    entered.wait();
    hub.update("/r", RepoStorePatch::new().with_short_status("second"));
    resume.wait();
    first.join().unwrap();

    assert_eq!(observed.lock().as_deref(), Some("second"));
}
