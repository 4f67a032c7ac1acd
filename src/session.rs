//! Session: the application object behind the UI.
//!
//! Owns one [`SeriesStore`], one [`EventController`] and at most one running
//! [`Ingestion`]. Every UI action goes through here, so the front end never
//! touches the serial link directly.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::color_scheme::{ColorScheme, Palette};
use crate::config::PlotterConfig;
use crate::error::ConnectionError;
use crate::events::{EventController, EventKind, PlotterEvent};
use crate::ingest::{IngestContext, Ingestion};
use crate::parser::LineParser;
use crate::serial::{ConnectionConfig, Connector, SerialPortConnector};
use crate::store::{now_secs, SeriesStore};

/// The link that is currently being read.
struct ActiveLink {
    config: ConnectionConfig,
    ingestion: Ingestion,
    /// Wall-clock seconds when the port was opened.
    connected_at: f64,
}

pub struct Session {
    config: PlotterConfig,
    connector: Arc<dyn Connector>,
    store: SeriesStore,
    events: EventController,
    parser: LineParser,
    active: Option<ActiveLink>,
    /// Thread closing a link handed off by [`Session::begin_disconnect`].
    closing: Option<JoinHandle<()>>,
    /// Start of the last successful connection; survives disconnect so the
    /// x axis keeps its origin while the data is still shown.
    connected_at: Option<f64>,
}

impl Session {
    /// Session talking to real serial devices.
    pub fn new(config: PlotterConfig) -> Self {
        Self::with_connector(config, Arc::new(SerialPortConnector))
    }

    pub fn with_connector(config: PlotterConfig, connector: Arc<dyn Connector>) -> Self {
        let events = EventController::new();
        let palette = Palette::from(&config.color_scheme);
        let store = SeriesStore::new(config.bound, palette).with_events(events.clone());
        let parser = LineParser::new(config.grammar);
        Self {
            config,
            connector,
            store,
            events,
            parser,
            active: None,
            closing: None,
            connected_at: None,
        }
    }

    pub fn config(&self) -> &PlotterConfig {
        &self.config
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    pub fn events(&self) -> &EventController {
        &self.events
    }

    // ─── Connection ──────────────────────────────────────────────────────────

    /// Open `config` and start ingesting from it.
    ///
    /// Any previous connection is closed first. On success the store is
    /// cleared so the new device starts from an empty plot. On failure the
    /// error is also emitted as `ERROR` and nothing is left running.
    pub fn connect(&mut self, config: ConnectionConfig) -> Result<(), ConnectionError> {
        self.disconnect()?;

        let link = match self.connector.open(&config, self.config.read_timeout()) {
            Ok(link) => link,
            Err(e) => {
                tracing::error!(port = %config.port, error = %e, "failed to open serial port");
                self.events.emit(PlotterEvent::error(e.to_string()));
                return Err(e);
            }
        };

        self.store.reset();
        let ctx = IngestContext {
            parser: self.parser,
            store: self.store.clone(),
            events: Some(self.events.clone()),
            read_timeout: self.config.read_timeout(),
        };
        let ingestion = match Ingestion::spawn(link, config.port.clone(), ctx) {
            Ok(ingestion) => ingestion,
            Err(e) => {
                tracing::error!(port = %config.port, error = %e, "failed to start serial reader");
                self.events.emit(PlotterEvent::error(e.to_string()));
                return Err(e);
            }
        };

        let connected_at = now_secs();
        tracing::info!(connection = %config, "connected");
        let mut evt = PlotterEvent::new(EventKind::CONNECTED);
        evt.connection = Some(config.clone());
        self.events.emit(evt);

        self.connected_at = Some(connected_at);
        self.active = Some(ActiveLink {
            config,
            ingestion,
            connected_at,
        });
        Ok(())
    }

    /// Stop ingestion and close the port. No-op when not connected.
    ///
    /// Returns once the port is closed; collected data stays in the store.
    pub fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.finish_closing();
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        let result = active.ingestion.stop();
        emit_disconnected(&self.events, active.config, &result);
        result
    }

    /// Like [`Session::disconnect`], but the reader is joined on a helper
    /// thread so the caller never waits on the read timeout.
    ///
    /// `DISCONNECTED` is emitted once the port is actually closed; until
    /// then [`Session::is_disconnecting`] is `true`.
    pub fn begin_disconnect(&mut self) -> Result<(), ConnectionError> {
        self.finish_closing();
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        active.ingestion.request_stop();
        let config = active.config.clone();
        let events = self.events.clone();
        let closer = std::thread::Builder::new()
            .name(format!("serial-closer {}", config.port))
            .spawn(move || {
                let result = active.ingestion.stop();
                emit_disconnected(&events, active.config, &result);
            });
        match closer {
            Ok(handle) => {
                self.closing = Some(handle);
                Ok(())
            }
            // The closure was dropped, and with it the ingestion, which
            // joins the reader on drop.
            Err(e) => {
                let result = Err(ConnectionError::Spawn(e));
                emit_disconnected(&self.events, config, &result);
                result
            }
        }
    }

    /// `true` while a link handed to [`Session::begin_disconnect`] is still open.
    pub fn is_disconnecting(&self) -> bool {
        self.closing.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn finish_closing(&mut self) {
        if let Some(handle) = self.closing.take() {
            if handle.join().is_err() {
                tracing::error!("serial closer thread panicked");
            }
        }
    }

    /// `true` while the reader thread is alive.
    ///
    /// Turns `false` on its own when the device goes away; the matching
    /// `DISCONNECTED | ERROR` event tells the UI why.
    pub fn is_connected(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.ingestion.is_running())
    }

    /// Parameters of the current connection, if any.
    pub fn connection(&self) -> Option<&ConnectionConfig> {
        self.active.as_ref().map(|a| &a.config)
    }

    /// Wall-clock start of the most recent connection.
    pub fn connected_at(&self) -> Option<f64> {
        self.active
            .as_ref()
            .map(|a| a.connected_at)
            .or(self.connected_at)
    }

    pub fn refresh_available_ports(&self) -> Result<Vec<String>, ConnectionError> {
        let ports = self.connector.available_ports().map_err(|e| {
            tracing::warn!(error = %e, "port enumeration failed");
            e
        })?;
        tracing::debug!(count = ports.len(), "serial ports enumerated");
        Ok(ports)
    }

    // ─── Series ──────────────────────────────────────────────────────────────

    pub fn toggle(&self, label: &str) -> Option<bool> {
        self.store.toggle(label)
    }

    pub fn set_visible(&self, label: &str, visible: bool) -> bool {
        self.store.set_visible(label, visible)
    }

    /// Drop all collected series; ingestion keeps running.
    pub fn reset(&self) {
        self.store.reset();
    }

    /// Colours for series created after a theme change.
    pub fn set_color_scheme(&self, scheme: &ColorScheme) {
        self.store.set_palette(Palette::from(scheme));
    }
}

fn emit_disconnected(
    events: &EventController,
    config: ConnectionConfig,
    result: &Result<(), ConnectionError>,
) {
    tracing::info!(port = %config.port, "disconnected");
    let mut evt = PlotterEvent::new(EventKind::DISCONNECTED);
    evt.connection = Some(config);
    if let Err(e) = result {
        evt.kinds |= EventKind::ERROR;
        evt.message = Some(e.to_string());
    }
    events.emit(evt);
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            tracing::error!(error = %e, "error while closing serial port");
        }
    }
}
