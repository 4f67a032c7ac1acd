//! Render loop: turns store snapshots into drawable frames.
//!
//! [`build_frame`] is a pure function of the store contents and `now`; the
//! same inputs always give an equal [`Frame`]. [`RenderLoop`] adds the fixed
//! period on top of it and publishes each produced frame as `FRAME_READY`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use egui::Color32;

use crate::config::PlotterConfig;
use crate::events::{EventController, EventKind, PlotterEvent};
use crate::store::SeriesStore;

/// Coordinates for one visible series, `[t_seconds, value]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesLine {
    pub label: String,
    pub color: Color32,
    pub points: Vec<[f64; 2]>,
}

/// Everything the display needs for one redraw.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Visible series in first-seen order, restricted to the trailing window.
    pub series: Vec<SeriesLine>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    /// Wall-clock time the frame was built for.
    pub now: f64,
}

impl Frame {
    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }
}

/// Axis policy parameters, taken from [`PlotterConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub time_window_secs: f64,
    pub y_padding: f64,
    pub default_y_range: (f64, f64),
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from(&PlotterConfig::default())
    }
}

impl From<&PlotterConfig> for RenderSettings {
    fn from(cfg: &PlotterConfig) -> Self {
        Self {
            time_window_secs: cfg.time_window_secs,
            y_padding: cfg.y_padding,
            default_y_range: (cfg.default_y_range[0], cfg.default_y_range[1]),
        }
    }
}

/// Padded Y range for data spanning `[min, max]`.
///
/// A flat line gets a band of 10 % of its magnitude (1.0 around zero) so the
/// axis never collapses.
pub fn padded_range(min: f64, max: f64, padding: f64) -> (f64, f64) {
    let span = max - min;
    let pad = if span > 0.0 {
        span * padding
    } else if min != 0.0 {
        min.abs() * 0.1
    } else {
        1.0
    };
    (min - pad, max + pad)
}

/// Build the frame for wall-clock time `now`.
pub fn build_frame(store: &SeriesStore, settings: &RenderSettings, now: f64) -> Frame {
    let x_lo = now - settings.time_window_secs;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    let series: Vec<SeriesLine> = store
        .snapshots()
        .into_iter()
        .filter(|snap| snap.visible)
        .map(|snap| {
            // Samples are time-ordered, so the window is a contiguous slice.
            let start = snap.samples.partition_point(|s| s.timestamp < x_lo);
            let end = snap.samples.partition_point(|s| s.timestamp <= now);
            let points: Vec<[f64; 2]> = snap.samples[start..end.max(start)]
                .iter()
                .map(|s| [s.timestamp, s.value])
                .collect();
            for p in &points {
                y_min = y_min.min(p[1]);
                y_max = y_max.max(p[1]);
            }
            SeriesLine {
                label: snap.label,
                color: snap.color,
                points,
            }
        })
        .collect();

    let y_range = if y_min <= y_max {
        padded_range(y_min, y_max, settings.y_padding)
    } else {
        settings.default_y_range
    };

    Frame {
        series,
        x_range: (x_lo, now),
        y_range,
        now,
    }
}

/// Fixed-period driver around [`build_frame`].
///
/// Runs on the UI thread: the caller polls it every UI update and gets a
/// new frame at most once per period.
pub struct RenderLoop {
    settings: RenderSettings,
    period: Duration,
    last_tick: Option<Instant>,
    last_frame: Option<Arc<Frame>>,
    events: Option<EventController>,
}

impl RenderLoop {
    pub fn new(settings: RenderSettings, period: Duration) -> Self {
        Self {
            settings,
            period,
            last_tick: None,
            last_frame: None,
            events: None,
        }
    }

    pub fn from_config(cfg: &PlotterConfig) -> Self {
        Self::new(RenderSettings::from(cfg), cfg.refresh_period())
    }

    /// Publish every produced frame as `FRAME_READY`.
    pub fn with_events(mut self, events: EventController) -> Self {
        self.events = Some(events);
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Time left until the next frame is due.
    pub fn time_until_next(&self, at: Instant) -> Duration {
        match self.last_tick {
            Some(last) => self.period.saturating_sub(at.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Produce a new frame if a period has passed since the last one.
    pub fn poll(&mut self, store: &SeriesStore, at: Instant, now: f64) -> Option<Arc<Frame>> {
        if !self.time_until_next(at).is_zero() {
            return None;
        }
        self.last_tick = Some(at);
        let frame = Arc::new(build_frame(store, &self.settings, now));
        tracing::trace!(
            series = frame.series.len(),
            points = frame.point_count(),
            "frame built"
        );
        if let Some(events) = &self.events {
            let mut evt = PlotterEvent::new(EventKind::FRAME_READY);
            evt.frame = Some(frame.clone());
            events.emit(evt);
        }
        self.last_frame = Some(frame.clone());
        Some(frame)
    }

    /// Most recent frame, for redraws between periods.
    pub fn last_frame(&self) -> Option<Arc<Frame>> {
        self.last_frame.clone()
    }

    /// Forget the last frame, e.g. after the store was cleared.
    pub fn invalidate(&mut self) {
        self.last_tick = None;
        self.last_frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventFilter;

    fn settings() -> RenderSettings {
        RenderSettings {
            time_window_secs: 10.0,
            y_padding: 0.1,
            default_y_range: (-10.0, 10.0),
        }
    }

    #[test]
    fn empty_store_uses_default_range() {
        let store = SeriesStore::default();
        let frame = build_frame(&store, &settings(), 100.0);
        assert!(frame.series.is_empty());
        assert_eq!(frame.x_range, (90.0, 100.0));
        assert_eq!(frame.y_range, (-10.0, 10.0));
    }

    #[test]
    fn points_outside_window_are_excluded() {
        let store = SeriesStore::default();
        for t in 80..=100 {
            store.record("temp", t as f64, t as f64);
        }
        let frame = build_frame(&store, &settings(), 100.0);
        let line = &frame.series[0];
        assert_eq!(line.points.first(), Some(&[90.0, 90.0]));
        assert_eq!(line.points.len(), 11);
        // min 90, max 100, 10 % padding of the span
        assert_eq!(frame.y_range, (89.0, 101.0));
    }

    #[test]
    fn hidden_series_do_not_affect_y_range() {
        let store = SeriesStore::default();
        store.record("a", 1.0, 99.0);
        store.record("a", 3.0, 99.5);
        store.record("b", 1000.0, 99.0);
        store.set_visible("b", false);
        let frame = build_frame(&store, &settings(), 100.0);
        assert_eq!(frame.series.len(), 1);
        assert_eq!(frame.series[0].label, "a");
        let (lo, hi) = frame.y_range;
        assert!((lo - 0.8).abs() < 1e-9 && (hi - 3.2).abs() < 1e-9, "{lo} {hi}");
    }

    #[test]
    fn flat_series_gets_nonzero_range() {
        assert_eq!(padded_range(5.0, 5.0, 0.1), (4.5, 5.5));
        assert_eq!(padded_range(0.0, 0.0, 0.1), (-1.0, 1.0));
    }

    #[test]
    fn samples_after_now_are_excluded() {
        let store = SeriesStore::default();
        store.record("a", 1.0, 95.0);
        store.record("a", 500.0, 130.0);
        let frame = build_frame(&store, &settings(), 100.0);
        assert_eq!(frame.series[0].points, vec![[95.0, 1.0]]);
        assert_eq!(frame.y_range, (0.9, 1.1));
    }

    #[test]
    fn stale_data_falls_back_to_default_range() {
        let store = SeriesStore::default();
        store.record("a", 50.0, 10.0);
        let frame = build_frame(&store, &settings(), 100.0);
        assert_eq!(frame.series[0].points.len(), 0);
        assert_eq!(frame.y_range, (-10.0, 10.0));
    }

    #[test]
    fn build_frame_is_idempotent() {
        let store = SeriesStore::default();
        store.record("a", 1.0, 95.0);
        store.record("b", 2.0, 96.0);
        let a = build_frame(&store, &settings(), 100.0);
        let b = build_frame(&store, &settings(), 100.0);
        assert_eq!(a, b);
    }

    #[test]
    fn render_loop_respects_period_and_publishes() {
        let events = EventController::new();
        let rx = events.subscribe(EventFilter::only(EventKind::FRAME_READY));
        let store = SeriesStore::default();
        let mut render =
            RenderLoop::new(settings(), Duration::from_millis(50)).with_events(events);

        let t0 = Instant::now();
        assert!(render.poll(&store, t0, 100.0).is_some());
        assert!(render.poll(&store, t0 + Duration::from_millis(10), 100.0).is_none());
        assert!(render.last_frame().is_some());
        assert!(render.poll(&store, t0 + Duration::from_millis(50), 100.05).is_some());

        let frames: Vec<_> = rx.try_iter().collect();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|e| e.frame.is_some()));
    }
}
