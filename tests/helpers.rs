
use anyhow::bail;
use common::*;
use fanout::{
    for_each_limited, for_each_sequential, for_each_sequential_indexed, set_global_multiprogress, CancelToken,
    FanOut, FanOutError, FanOutOptions,
};
use indicatif::{MultiProgress, ProgressDrawTarget};
use std::sync::Arc;

/// Sequential iteration visits items in order and stops at the first error.
#[test]
fn sequential_stops_at_first_error() {
    let shards = ["users_1", "users_2", "users_3", "users_4"];
    let mut seen = Vec::new();

    let err = for_each_sequential(&shards, |name| {
        seen.push(name.to_string());
        if *name == "users_3" {
            bail!("migration failed on {name}");
        }
        Ok(())
    })
    .unwrap_err();

    assert_eq!(seen, vec!["users_1", "users_2", "users_3"]);
    assert_eq!(err.root_cause().to_string(), "migration failed on users_3");
    assert!(format!("{err:#}").starts_with("item 2 failed"));
}

#[test]
fn sequential_indexed_passes_positions() {
    let items = vec![10, 20, 30];
    let mut pairs = Vec::new();
    for_each_sequential_indexed(&items, |v, i| {
        pairs.push((i, *v));
        Ok(())
    })
    .unwrap();
    assert_eq!(pairs, vec![(0, 10), (1, 20), (2, 30)]);

    let empty: Vec<u8> = Vec::new();
    for_each_sequential(&empty, |_| bail!("never called")).unwrap();
}

/// The slice adapter bounds in-flight calls and visits every element once.
#[test]
fn for_each_limited_covers_slice() {
    let items: Vec<usize> = (100..130).collect();
    let probe = Probe::new();
    for_each_limited(&items, 4, |v| {
        probe.track(*v, || sleep_ms(3));
        Ok(())
    })
    .unwrap();
    assert!(probe.peak() <= 4);
    assert_eq!(probe.calls_sorted(), items);
    probe.assert_quiescent();

    // A limit of 0 or 1 runs in order on the caller's thread.
    let order = parking_lot::Mutex::new(Vec::new());
    for_each_limited(&items[..5], 0, |v| {
        order.lock().push(*v);
        Ok(())
    })
    .unwrap();
    assert_eq!(order.into_inner(), vec![100, 101, 102, 103, 104]);
}

#[test]
fn options_parse_from_json_with_defaults() {
    let opts = FanOutOptions::from_json_str(r#"{ "max_parallel": 3, "label": "backfill" }"#).unwrap();
    assert_eq!(opts.max_parallel, 3);
    assert_eq!(opts.label.as_deref(), Some("backfill"));
    assert!(!opts.progress);
    assert_eq!(opts.thread_name_prefix, None);

    let defaults = FanOutOptions::from_json_str("{}").unwrap();
    assert_eq!(defaults, FanOutOptions::default());
    assert!(defaults.max_parallel >= 1);

    assert!(FanOutOptions::from_json_str(r#"{ "max_parallel": "lots" }"#).is_err());
}

#[test]
fn options_load_from_file_and_drive_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fanout.json");
    std::fs::write(&path, r#"{ "max_parallel": 2, "thread_name_prefix": "cfg" }"#).unwrap();

    let opts = FanOutOptions::from_json_file(&path).unwrap();
    let summary = FanOut::with_options(opts).run(4, |_| Ok(())).unwrap();
    assert_eq!(summary.max_parallel, 2);
    assert_eq!(summary.completed, 4);

    let missing = dir.path().join("nope.json");
    let err = FanOutOptions::from_json_file(&missing).unwrap_err();
    assert!(err.to_string().contains("nope.json"));
}

#[test]
fn builder_round_trips_options() {
    let fan = FanOut::new()
        .max_parallel(7)
        .progress(false)
        .progress_label("Syncing")
        .label("sync")
        .thread_name_prefix("sync");
    let opts = fan.options();
    assert_eq!(opts.max_parallel, 7);
    assert_eq!(opts.progress_label.as_deref(), Some("Syncing"));
    assert_eq!(opts.label.as_deref(), Some("sync"));
    assert_eq!(opts.thread_name_prefix.as_deref(), Some("sync"));

    let json = serde_json::to_value(opts).unwrap();
    assert_eq!(json["max_parallel"], 7);
}

/// The summary serializes for reporting.
#[test]
fn summary_serializes() {
    let summary = FanOut::new().max_parallel(3).label("report").run(9, |_| Ok(())).unwrap();
    let v = serde_json::to_value(&summary).unwrap();
    assert_eq!(v["items"], 9);
    assert_eq!(v["completed"], 9);
    assert_eq!(v["dispatched"], 9);
    assert_eq!(v["max_parallel"], 3);
}

/// Route every bar in this test binary to a hidden draw target. The global hook
/// keeps the first `MultiProgress` installed, so repeated calls are harmless.
fn hidden_progress() -> Arc<MultiProgress> {
    let mp = Arc::new(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()));
    set_global_multiprogress(Arc::clone(&mp));
    mp
}

/// A successful run with a progress bar still returns the full summary.
#[test]
fn progress_run_succeeds() {
    hidden_progress();
    let summary = FanOut::new()
        .max_parallel(3)
        .progress(true)
        .progress_label("Syncing shards")
        .run(12, |_| {
            sleep_ms(1);
            Ok(())
        })
        .unwrap();
    assert_eq!(summary.completed, 12);
    assert_eq!(summary.dispatched, 12);
}

/// A failing run with a progress bar returns the failing item's error.
#[test]
fn progress_run_reports_failure() {
    hidden_progress();
    let err = FanOut::new()
        .max_parallel(2)
        .progress(true)
        .label("sync")
        .run(8, |i| if i == 2 { bail!("shard 2 offline") } else { Ok(()) })
        .unwrap_err();
    assert_eq!(err.to_string(), "work item 2 failed");
    assert_eq!(err.root_cause().to_string(), "shard 2 offline");
}

/// A cancelled run with a progress bar returns `Cancelled` without running anything.
#[test]
fn progress_run_reports_cancel() {
    hidden_progress();
    let token = CancelToken::new();
    token.cancel();
    let err = FanOut::new()
        .max_parallel(2)
        .progress(true)
        .cancel_token(token)
        .run(5, |_| Ok(()))
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<FanOutError>(),
        Some(&FanOutError::Cancelled { completed: 0, dispatched: 0 })
    );
}

/// Bars attach to an installed `MultiProgress`, and two runs can share it.
#[test]
fn progress_runs_share_global_multiprogress() {
    let mp = hidden_progress();
    assert!(mp.is_hidden());

    let (a, b) = std::thread::scope(|s| {
        let a = s.spawn(|| FanOut::new().max_parallel(2).progress(true).progress_label("a").run(6, |_| Ok(())));
        let b = s.spawn(|| FanOut::new().max_parallel(2).progress(true).progress_label("b").run(4, |_| Ok(())));
        (a.join().unwrap(), b.join().unwrap())
    });
    assert_eq!(a.unwrap().completed, 6);
    assert_eq!(b.unwrap().completed, 4);
}
