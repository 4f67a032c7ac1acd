//! Per-label rolling sample buffers shared by the ingestion thread and the UI.
//!
//! A [`SeriesStore`] is a cheap-to-clone handle around one mutex. All
//! operations hold the lock only for in-memory work (append and trim, flag
//! update, copy-out), so the render loop never waits on I/O.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;

use egui::Color32;

use crate::color_scheme::Palette;
use crate::config::BoundPolicy;
use crate::events::{EventController, EventKind, PlotterEvent, SeriesMeta};

/// One measurement: seconds since the Unix epoch (see [`now_secs`]), and the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Current time in seconds since the Unix epoch.
///
/// The wall clock is read once per process; after that time advances with
/// [`Instant`], so a stepped system clock never moves timestamps backwards.
pub fn now_secs() -> f64 {
    static ANCHOR: OnceLock<(f64, Instant)> = OnceLock::new();
    let (epoch, started) = ANCHOR.get_or_init(|| {
        let epoch = chrono::Utc::now().timestamp_micros() as f64 * 1e-6;
        (epoch, Instant::now())
    });
    epoch + started.elapsed().as_secs_f64()
}

/// Owned, consistent copy of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSnapshot {
    pub label: String,
    pub samples: Vec<Sample>,
    pub visible: bool,
    pub color: Color32,
}

/// Canonical form of a label; lookups are case-insensitive.
pub fn normalize_label(label: &str) -> String {
    label.to_lowercase()
}

struct Series {
    samples: VecDeque<Sample>,
    visible: bool,
    color: Color32,
}

impl Series {
    fn new(color: Color32) -> Self {
        Self {
            samples: VecDeque::new(),
            visible: true,
            color,
        }
    }

    /// Append keeping timestamps non-decreasing, then trim to `bound`.
    ///
    /// Under a window bound, a sample older than the whole window means the
    /// time source jumped back; the history is dropped and trimming follows
    /// the new timeline.
    fn push(&mut self, mut sample: Sample, bound: BoundPolicy) {
        if let Some(last) = self.samples.back().map(|s| s.timestamp) {
            if let BoundPolicy::Window { window_secs } = bound {
                if sample.timestamp < last - window_secs {
                    tracing::warn!(
                        from = last,
                        to = sample.timestamp,
                        "time went backwards past the window, dropping history"
                    );
                    self.samples.clear();
                }
            }
            if sample.timestamp < last && !self.samples.is_empty() {
                sample.timestamp = last;
            }
        }
        self.samples.push_back(sample);
        self.enforce(bound);
    }

    fn enforce(&mut self, bound: BoundPolicy) {
        match bound {
            BoundPolicy::Count { max_samples } => {
                while self.samples.len() > max_samples {
                    self.samples.pop_front();
                }
            }
            BoundPolicy::Window { window_secs } => {
                let Some(newest) = self.samples.back().map(|s| s.timestamp) else {
                    return;
                };
                let cutoff = newest - window_secs;
                while self.samples.front().is_some_and(|s| s.timestamp < cutoff) {
                    self.samples.pop_front();
                }
            }
        }
    }

    fn snapshot(&self, label: &str) -> SeriesSnapshot {
        SeriesSnapshot {
            label: label.to_string(),
            samples: self.samples.iter().copied().collect(),
            visible: self.visible,
            color: self.color,
        }
    }
}

struct StoreInner {
    series: HashMap<String, Series>,
    /// Labels in first-seen order; also the colour index.
    order: Vec<String>,
    palette: Palette,
    bound: BoundPolicy,
}

/// Shared map from label to bounded sample history and visibility flag.
#[derive(Clone)]
pub struct SeriesStore {
    inner: Arc<Mutex<StoreInner>>,
    events: Option<EventController>,
}

impl SeriesStore {
    pub fn new(bound: BoundPolicy, palette: Palette) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                series: HashMap::new(),
                order: Vec::new(),
                palette,
                bound,
            })),
            events: None,
        }
    }

    /// Emit `SERIES_*` and `DATA_CLEARED` events through `events`.
    pub fn with_events(mut self, events: EventController) -> Self {
        self.events = Some(events);
        self
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // A panic elsewhere never leaves a series half-trimmed, so the data is usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PlotterEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    pub fn bound(&self) -> BoundPolicy {
        self.lock().bound
    }

    /// Append a sample to `label`, creating the series on first sight.
    ///
    /// Returns `true` when a new series was created. Non-finite values are
    /// dropped.
    pub fn record(&self, label: &str, value: f64, timestamp: f64) -> bool {
        if !value.is_finite() || !timestamp.is_finite() {
            tracing::trace!(label, value, timestamp, "dropping non-finite sample");
            return false;
        }
        let key = normalize_label(label);
        let added = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let added = if inner.series.contains_key(&key) {
                None
            } else {
                let color = inner.palette.color_for(inner.order.len());
                inner.order.push(key.clone());
                inner.series.insert(key.clone(), Series::new(color));
                Some(color)
            };
            let bound = inner.bound;
            if let Some(series) = inner.series.get_mut(&key) {
                series.push(Sample::new(timestamp, value), bound);
            }
            added
        };

        match added {
            Some(color) => {
                tracing::info!(label = %key, ?color, "series added");
                self.emit(PlotterEvent::series_added(&key, color));
                true
            }
            None => false,
        }
    }

    /// Show or hide a series. Returns `false` if the label is unknown.
    pub fn set_visible(&self, label: &str, visible: bool) -> bool {
        let key = normalize_label(label);
        let color = {
            let mut inner = self.lock();
            match inner.series.get_mut(&key) {
                Some(series) => {
                    series.visible = visible;
                    series.color
                }
                None => return false,
            }
        };
        tracing::info!(label = %key, visible, "series visibility changed");
        let kind = if visible {
            EventKind::SERIES_SHOWN
        } else {
            EventKind::SERIES_HIDDEN
        };
        let mut evt = PlotterEvent::new(kind);
        evt.series = Some(SeriesMeta {
            label: key,
            color,
            visible,
        });
        self.emit(evt);
        true
    }

    /// Flip visibility; returns the new state, or `None` for an unknown label.
    pub fn toggle(&self, label: &str) -> Option<bool> {
        let key = normalize_label(label);
        let next = !self.lock().series.get(&key)?.visible;
        self.set_visible(&key, next).then_some(next)
    }

    pub fn is_visible(&self, label: &str) -> Option<bool> {
        self.lock()
            .series
            .get(&normalize_label(label))
            .map(|s| s.visible)
    }

    /// Consistent copy of one series, or `None` if the label is unknown.
    pub fn snapshot(&self, label: &str) -> Option<SeriesSnapshot> {
        let key = normalize_label(label);
        self.lock().series.get(&key).map(|s| s.snapshot(&key))
    }

    /// Copies of every series in first-seen order, under one lock.
    pub fn snapshots(&self) -> Vec<SeriesSnapshot> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|label| inner.series.get(label).map(|s| s.snapshot(label)))
            .collect()
    }

    /// Label, colour and visibility of every series, without copying samples.
    pub fn series_info(&self) -> Vec<SeriesMeta> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|label| {
                inner.series.get(label).map(|s| SeriesMeta {
                    label: label.clone(),
                    color: s.color,
                    visible: s.visible,
                })
            })
            .collect()
    }

    /// Known labels in first-seen order.
    pub fn all_labels(&self) -> Vec<String> {
        self.lock().order.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().order.is_empty()
    }

    /// Use `palette` for series created from now on; existing series keep
    /// their colour.
    pub fn set_palette(&self, palette: Palette) {
        self.lock().palette = palette;
    }

    /// Remove every series and restart colour assignment.
    pub fn reset(&self) {
        let removed = {
            let mut inner = self.lock();
            let n = inner.order.len();
            inner.series.clear();
            inner.order.clear();
            n
        };
        tracing::debug!(removed, "series store cleared");
        self.emit(PlotterEvent::new(EventKind::DATA_CLEARED));
    }
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self::new(BoundPolicy::default(), Palette::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventFilter;

    fn count_store(max_samples: usize) -> SeriesStore {
        SeriesStore::new(BoundPolicy::Count { max_samples }, Palette::default())
    }

    #[test]
    fn first_sample_creates_visible_series() {
        let store = SeriesStore::default();
        assert!(store.record("temp", 21.5, 1.0));
        assert!(!store.record("temp", 22.0, 2.0));

        let snap = store.snapshot("temp").expect("series");
        assert!(snap.visible);
        assert_eq!(snap.samples, vec![Sample::new(1.0, 21.5), Sample::new(2.0, 22.0)]);
    }

    #[test]
    fn labels_are_case_insensitive() {
        let store = SeriesStore::default();
        store.record("Temp", 1.0, 1.0);
        store.record("TEMP", 2.0, 2.0);
        assert_eq!(store.all_labels(), vec!["temp".to_string()]);
        assert_eq!(store.snapshot("tEmP").map(|s| s.samples.len()), Some(2));
    }

    #[test]
    fn count_bound_keeps_most_recent() {
        let store = count_store(1000);
        for i in 0..1001 {
            store.record("temp", i as f64, i as f64);
        }
        let snap = store.snapshot("temp").expect("series");
        assert_eq!(snap.samples.len(), 1000);
        assert_eq!(snap.samples[0], Sample::new(1.0, 1.0));
        assert_eq!(snap.samples[999], Sample::new(1000.0, 1000.0));
    }

    #[test]
    fn window_bound_drops_old_samples() {
        let store = SeriesStore::new(BoundPolicy::Window { window_secs: 10.0 }, Palette::default());
        for t in 0..=25 {
            store.record("hum", t as f64, t as f64);
        }
        let snap = store.snapshot("hum").expect("series");
        let first = snap.samples.first().expect("non-empty");
        assert_eq!(first.timestamp, 15.0);
        assert_eq!(snap.samples.len(), 11);
    }

    #[test]
    fn backwards_timestamps_are_clamped() {
        let store = SeriesStore::default();
        store.record("a", 1.0, 10.0);
        store.record("a", 2.0, 9.0);
        let snap = store.snapshot("a").expect("series");
        assert_eq!(snap.samples[1], Sample::new(10.0, 2.0));
    }

    #[test]
    fn window_bound_survives_clock_step_back() {
        let store = SeriesStore::new(BoundPolicy::Window { window_secs: 10.0 }, Palette::default());
        store.record("a", 0.0, 1000.0);
        for i in 0..5000 {
            store.record("a", 1.0, 100.0 + 0.1 * i as f64);
        }
        let snap = store.snapshot("a").expect("series");
        assert!(snap.samples.len() <= 101, "retained {}", snap.samples.len());
        let last = snap.samples.last().expect("non-empty").timestamp;
        assert!((last - 599.9).abs() < 1e-6, "{last}");
        assert!(snap.samples.iter().all(|s| s.timestamp >= last - 10.0));
    }

    #[test]
    fn small_step_back_is_still_clamped_under_window() {
        let store = SeriesStore::new(BoundPolicy::Window { window_secs: 10.0 }, Palette::default());
        store.record("a", 1.0, 50.0);
        store.record("a", 2.0, 45.0);
        let snap = store.snapshot("a").expect("series");
        assert_eq!(snap.samples, vec![Sample::new(50.0, 1.0), Sample::new(50.0, 2.0)]);
    }

    #[test]
    fn now_secs_never_goes_backwards() {
        let a = now_secs();
        let b = now_secs();
        assert!(b >= a);
        assert!(a > 1_600_000_000.0);
    }

    #[test]
    fn colors_follow_first_seen_order_and_cycle() {
        let palette = Palette::new(vec![Color32::RED, Color32::GREEN]);
        let store = SeriesStore::new(BoundPolicy::default(), palette);
        for label in ["a", "b", "c"] {
            store.record(label, 0.0, 0.0);
        }
        let colors: Vec<Color32> = store.snapshots().iter().map(|s| s.color).collect();
        assert_eq!(colors, vec![Color32::RED, Color32::GREEN, Color32::RED]);
        assert_eq!(store.all_labels(), vec!["a", "b", "c"]);
    }

    #[test]
    fn new_palette_applies_to_later_series_only() {
        let store = SeriesStore::new(BoundPolicy::default(), Palette::new(vec![Color32::RED]));
        store.record("a", 0.0, 0.0);
        store.set_palette(Palette::new(vec![Color32::BLUE]));
        store.record("b", 0.0, 0.0);
        let colors: Vec<Color32> = store.series_info().iter().map(|m| m.color).collect();
        assert_eq!(colors, vec![Color32::RED, Color32::BLUE]);
    }

    #[test]
    fn unknown_label_visibility_is_noop() {
        let store = SeriesStore::default();
        assert!(!store.set_visible("ghost", false));
        assert_eq!(store.toggle("ghost"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn toggle_preserves_data() {
        let store = SeriesStore::default();
        for i in 0..5 {
            store.record("v", i as f64, i as f64);
        }
        let before = store.snapshot("v").expect("series").samples;
        assert_eq!(store.toggle("v"), Some(false));
        assert_eq!(store.is_visible("v"), Some(false));
        assert_eq!(store.toggle("v"), Some(true));
        assert_eq!(store.snapshot("v").expect("series").samples, before);
    }

    #[test]
    fn series_info_lists_metadata_in_order() {
        let store = SeriesStore::default();
        store.record("b", 1.0, 1.0);
        store.record("a", 1.0, 1.0);
        store.set_visible("a", false);
        let info = store.series_info();
        let labels: Vec<&str> = info.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "a"]);
        assert!(info[0].visible && !info[1].visible);
    }

    #[test]
    fn non_finite_values_are_dropped() {
        let store = SeriesStore::default();
        assert!(!store.record("x", f64::NAN, 1.0));
        assert!(store.is_empty());
    }

    #[test]
    fn reset_clears_and_restarts_colors() {
        let store = SeriesStore::default();
        store.record("a", 0.0, 0.0);
        let first_color = store.snapshot("a").expect("series").color;
        store.record("b", 0.0, 0.0);
        store.reset();
        assert!(store.is_empty());
        store.record("b", 0.0, 0.0);
        assert_eq!(store.snapshot("b").expect("series").color, first_color);
    }

    #[test]
    fn events_are_emitted() {
        let events = EventController::new();
        let rx = events.subscribe(EventFilter::only(
            EventKind::SERIES_ADDED | EventKind::SERIES_HIDDEN | EventKind::DATA_CLEARED,
        ));
        let store = SeriesStore::default().with_events(events);

        store.record("temp", 1.0, 1.0);
        store.record("temp", 2.0, 2.0);
        store.set_visible("temp", false);
        store.reset();

        let kinds: Vec<EventKind> = rx.try_iter().map(|e| e.kinds).collect();
        assert_eq!(
            kinds,
            vec![EventKind::SERIES_ADDED, EventKind::SERIES_HIDDEN, EventKind::DATA_CLEARED]
        );
    }
}
