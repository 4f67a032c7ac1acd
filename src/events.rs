//! Events emitted by the plotting core.
//!
//! The UI (or any other observer) subscribes through [`EventController`] and
//! receives [`PlotterEvent`]s on an `mpsc` channel. Each event carries a set
//! of [`EventKind`] bits, so one occurrence can match several categories: an
//! unexpected link loss is both `DISCONNECTED` and `ERROR`.
//!
//! A subscriber's [`EventFilter`] is an OR mask: an event is delivered when
//! `(event.kinds & filter) != 0`.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use egui::Color32;

use crate::render::Frame;
use crate::serial::ConnectionConfig;

// ─────────────────────────────────────────────────────────────────────────────
// EventKind – bitflags
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKind(pub u32);

impl EventKind {
    /// A label was seen for the first time.
    pub const SERIES_ADDED: Self = Self(1 << 0);
    pub const SERIES_SHOWN: Self = Self(1 << 1);
    pub const SERIES_HIDDEN: Self = Self(1 << 2);
    /// All series were removed (reset or reconnect).
    pub const DATA_CLEARED: Self = Self(1 << 3);
    pub const CONNECTED: Self = Self(1 << 4);
    pub const DISCONNECTED: Self = Self(1 << 5);
    /// Something the user should see, e.g. a port that failed to open.
    pub const ERROR: Self = Self(1 << 6);
    /// The render loop produced a new frame.
    pub const FRAME_READY: Self = Self(1 << 7);

    pub const ALL: Self = Self(u32::MAX);

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for EventKind {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for EventKind {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "EMPTY");
        }
        if *self == EventKind::ALL {
            return write!(f, "ALL");
        }
        let pairs: &[(EventKind, &str)] = &[
            (EventKind::SERIES_ADDED, "SERIES_ADDED"),
            (EventKind::SERIES_SHOWN, "SERIES_SHOWN"),
            (EventKind::SERIES_HIDDEN, "SERIES_HIDDEN"),
            (EventKind::DATA_CLEARED, "DATA_CLEARED"),
            (EventKind::CONNECTED, "CONNECTED"),
            (EventKind::DISCONNECTED, "DISCONNECTED"),
            (EventKind::ERROR, "ERROR"),
            (EventKind::FRAME_READY, "FRAME_READY"),
        ];
        let mut names = Vec::new();
        let mut known = 0u32;
        for (kind, name) in pairs {
            known |= kind.0;
            if self.contains(*kind) {
                names.push((*name).to_string());
            }
        }
        let extra = self.0 & !known;
        if extra != 0 {
            names.push(format!("0x{:x}", extra));
        }
        write!(f, "{}", names.join("|"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Series metadata for `SERIES_*` events.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesMeta {
    pub label: String,
    pub color: Color32,
    pub visible: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// PlotterEvent
// ─────────────────────────────────────────────────────────────────────────────

/// One event; the `Option` fields carry data for the kinds that are set.
#[derive(Debug, Clone)]
pub struct PlotterEvent {
    pub kinds: EventKind,
    /// Seconds since the controller was created; set on emit.
    pub timestamp: f64,
    pub series: Option<SeriesMeta>,
    pub connection: Option<ConnectionConfig>,
    pub message: Option<String>,
    pub frame: Option<Arc<Frame>>,
}

impl PlotterEvent {
    pub fn new(kinds: EventKind) -> Self {
        Self {
            kinds,
            timestamp: 0.0,
            series: None,
            connection: None,
            message: None,
            frame: None,
        }
    }

    pub fn series_added(label: &str, color: Color32) -> Self {
        let mut evt = Self::new(EventKind::SERIES_ADDED);
        evt.series = Some(SeriesMeta {
            label: label.to_string(),
            color,
            visible: true,
        });
        evt
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        let mut evt = Self::new(EventKind::ERROR);
        evt.message = Some(message.into());
        evt
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventFilter
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct EventFilter {
    pub mask: EventKind,
}

impl EventFilter {
    pub const fn all() -> Self {
        Self {
            mask: EventKind::ALL,
        }
    }

    pub const fn only(mask: EventKind) -> Self {
        Self { mask }
    }

    #[inline]
    pub fn matches(&self, event: &PlotterEvent) -> bool {
        event.kinds.intersects(self.mask)
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventController
// ─────────────────────────────────────────────────────────────────────────────

struct Subscriber {
    filter: EventFilter,
    sender: Sender<PlotterEvent>,
}

struct EventCtrlInner {
    subscribers: Vec<Subscriber>,
    start_instant: std::time::Instant,
}

/// Fan-out of [`PlotterEvent`]s to channel subscribers.
///
/// Cloning yields another handle to the same subscriber list, so the
/// ingestion thread, the store and the UI can all emit through it.
#[derive(Clone)]
pub struct EventController {
    inner: Arc<Mutex<EventCtrlInner>>,
}

impl EventController {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EventCtrlInner {
                subscribers: Vec::new(),
                start_instant: std::time::Instant::now(),
            })),
        }
    }

    /// Subscribe to events whose kinds intersect `filter`.
    pub fn subscribe(&self, filter: EventFilter) -> Receiver<PlotterEvent> {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.subscribers.push(Subscriber { filter, sender: tx });
        rx
    }

    pub fn subscribe_all(&self) -> Receiver<PlotterEvent> {
        self.subscribe(EventFilter::all())
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }

    /// Deliver `event` to every matching subscriber.
    ///
    /// Subscribers whose receiver was dropped are removed the next time an
    /// event matches them.
    pub fn emit(&self, mut event: PlotterEvent) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        event.timestamp = inner.start_instant.elapsed().as_secs_f64();
        inner.subscribers.retain(|sub| {
            if sub.filter.matches(&event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                true
            }
        });
    }
}

impl Default for EventController {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────────────────────────
