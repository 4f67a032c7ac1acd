use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use serial_liveplot::{BoundPolicy, Palette, SeriesStore};

#[test]
fn snapshots_never_tear_while_recording() {
    const BOUND: usize = 200;
    let store = SeriesStore::new(BoundPolicy::Count { max_samples: BOUND }, Palette::default());
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let store = store.clone();
        let done = done.clone();
        thread::spawn(move || {
            for i in 0..20_000u32 {
                let t = f64::from(i);
                store.record("x", t, t);
            }
            done.store(true, Ordering::Release);
        })
    };

    let mut last_len = 0usize;
    while !done.load(Ordering::Acquire) {
        let Some(snap) = store.snapshot("x") else {
            continue;
        };
        let len = snap.samples.len();
        assert!(len <= BOUND, "bound exceeded: {len}");
        // Once full, the buffer stays full.
        assert!(len >= last_len.min(BOUND), "length went from {last_len} to {len}");
        last_len = len;
        // Each sample was written atomically with value == timestamp, and
        // samples are contiguous and ordered.
        for pair in snap.samples.windows(2) {
            assert_eq!(pair[1].timestamp, pair[0].timestamp + 1.0);
        }
        assert!(snap.samples.iter().all(|s| s.value == s.timestamp));
    }
    writer.join().expect("writer");

    let snap = store.snapshot("x").expect("series");
    assert_eq!(snap.samples.len(), BOUND);
    assert_eq!(snap.samples.last().map(|s| s.value), Some(19_999.0));
}

#[test]
fn visibility_toggles_race_with_writes() {
    let store = SeriesStore::default();
    store.record("v", 0.0, 0.0);

    let writer = {
        let store = store.clone();
        thread::spawn(move || {
            for i in 1..2_000 {
                store.record("v", f64::from(i), f64::from(i));
            }
        })
    };
    for _ in 0..1_000 {
        store.toggle("v");
    }
    writer.join().expect("writer");

    // An even number of toggles leaves the series visible with all data.
    assert_eq!(store.is_visible("v"), Some(true));
    assert_eq!(store.snapshot("v").map(|s| s.samples.len()), Some(1000));
}
