//! serial-liveplot: live plotting of tagged values read from a serial port.
//!
//! A device prints lines such as `>temp: 21.5 >hum: 60`; every `>label: value`
//! pair becomes a sample in a per-label rolling series, and the desktop UI
//! redraws the trailing time window on a fixed period.
//!
//! Modules:
//! - `parser`: wire grammars turning a line into `(label, value)` pairs
//! - `serial`: connection parameters and the `Connector` seam
//! - `ingest`: reader thread feeding the store
//! - `store`: shared, bounded per-label sample history
//! - `render`: frame building and the periodic render loop
//! - `session`: the object behind every UI action
//! - `events`: typed events for observers
//! - `config`, `color_scheme`, `error`: ambient plumbing
//! - `app`: the egui/eframe front end

pub mod app;
pub mod color_scheme;
pub mod config;
pub mod error;
pub mod events;
pub mod ingest;
pub mod parser;
pub mod render;
pub mod serial;
pub mod session;
pub mod store;

// Public re-exports for a compact external API
pub use app::{run_app, PlotterApp};
pub use color_scheme::{ColorScheme, Palette};
pub use config::{BoundPolicy, PlotterConfig, XAxisMode};
pub use error::{ConfigError, ConnectionError};
pub use events::{EventController, EventFilter, EventKind, PlotterEvent};
pub use ingest::Ingestion;
pub use parser::{Grammar, LineParser, ParsedSample};
pub use render::{build_frame, Frame, RenderLoop, RenderSettings};
pub use serial::{ConnectionConfig, Connector, SerialLink, SerialPortConnector};
pub use session::Session;
pub use store::{Sample, SeriesSnapshot, SeriesStore};
