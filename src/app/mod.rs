//! Desktop front end.
//!
//! | Sub-module  | Responsibility |
//! | ----------- | -------------- |
//! | [`panels`]  | Serial config sidebar, series checkboxes, view options and the central plot |
//! | [`run`]     | [`run_app()`] entry point and window icon loading |
//!
//! [`PlotterApp`] is a thin shell around a [`Session`]: it forwards button
//! presses to the session, drains session events into its status line, and
//! drives the [`RenderLoop`] from the egui update.

mod panels;
mod run;

pub use run::run_app;

use std::sync::mpsc::Receiver;
use std::time::Instant;

use chrono::{DateTime, Local};
use eframe::egui;

use crate::color_scheme::ColorScheme;
use crate::config::{PlotterConfig, XAxisMode};
use crate::events::{EventFilter, EventKind, PlotterEvent};
use crate::render::RenderLoop;
use crate::serial::ConnectionConfig;
use crate::session::Session;
use crate::store::now_secs;

/// What the status line shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Disconnected,
    /// Port handed to the closer thread, not yet released.
    Disconnecting,
    Connected(String),
    Error(String),
}

impl ConnectionStatus {
    pub fn text(&self) -> String {
        match self {
            ConnectionStatus::Disconnected => "Disconnected".to_string(),
            ConnectionStatus::Disconnecting => "Disconnecting…".to_string(),
            ConnectionStatus::Connected(what) => format!("Connected: {what}"),
            ConnectionStatus::Error(msg) => format!("Error: {msg}"),
        }
    }
}

pub struct PlotterApp {
    session: Session,
    render: RenderLoop,
    events: Receiver<PlotterEvent>,
    /// Connection settings as edited in the sidebar.
    form: ConnectionConfig,
    ports: Vec<String>,
    status: ConnectionStatus,
    color_scheme: ColorScheme,
    color_scheme_applied: bool,
    x_axis: XAxisMode,
}

impl PlotterApp {
    pub fn new(config: PlotterConfig) -> Self {
        Self::with_session(Session::new(config))
    }

    pub fn with_session(session: Session) -> Self {
        let config = session.config().clone();
        let events = session.events().subscribe(EventFilter::only(
            EventKind::CONNECTED
                | EventKind::DISCONNECTED
                | EventKind::ERROR
                | EventKind::DATA_CLEARED,
        ));
        let render = RenderLoop::from_config(&config).with_events(session.events().clone());
        let mut app = Self {
            session,
            render,
            events,
            form: config.serial.clone(),
            ports: Vec::new(),
            status: ConnectionStatus::Disconnected,
            color_scheme: config.color_scheme.clone(),
            color_scheme_applied: false,
            x_axis: config.x_axis,
        };
        app.refresh_ports();
        app
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub(crate) fn refresh_ports(&mut self) {
        match self.session.refresh_available_ports() {
            Ok(ports) => {
                if self.form.port.is_empty() {
                    if let Some(first) = ports.first() {
                        self.form.port = first.clone();
                    }
                }
                self.ports = ports;
            }
            Err(e) => self.status = ConnectionStatus::Error(e.to_string()),
        }
    }

    /// Connect with the settings currently in the form.
    ///
    /// Failures land in the status line through the `ERROR` event.
    pub(crate) fn connect(&mut self) {
        let _ = self.session.connect(self.form.clone());
        self.drain_events();
    }

    /// Stop reading without blocking the UI; the status line shows
    /// `Disconnecting…` until the port is released.
    pub(crate) fn disconnect(&mut self) {
        if !self.session.is_connected() {
            let _ = self.session.disconnect();
        } else if self.session.begin_disconnect().is_ok() {
            self.status = ConnectionStatus::Disconnecting;
        }
        self.drain_events();
    }

    /// Whether the Connect button may be pressed.
    pub(crate) fn can_connect(&self) -> bool {
        !self.session.is_connected() && !self.session.is_disconnecting()
    }

    pub(crate) fn set_color_scheme(&mut self, ctx: &egui::Context, scheme: ColorScheme) {
        scheme.apply(ctx);
        self.session.set_color_scheme(&scheme);
        self.color_scheme = scheme;
    }

    pub(crate) fn drain_events(&mut self) {
        while let Ok(evt) = self.events.try_recv() {
            self.handle_event(&evt);
        }
    }

    fn handle_event(&mut self, evt: &PlotterEvent) {
        if evt.kinds.contains(EventKind::DATA_CLEARED) {
            self.render.invalidate();
        }
        if evt.kinds.contains(EventKind::ERROR) {
            let msg = evt.message.clone().unwrap_or_else(|| "unknown error".into());
            self.status = ConnectionStatus::Error(msg);
        } else if evt.kinds.contains(EventKind::CONNECTED) {
            let what = evt
                .connection
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_default();
            self.status = ConnectionStatus::Connected(what);
        } else if evt.kinds.contains(EventKind::DISCONNECTED) {
            self.status = ConnectionStatus::Disconnected;
        }
    }

    /// Origin for `SinceConnect` tick labels.
    fn x_origin(&self) -> Option<f64> {
        match self.x_axis {
            XAxisMode::SinceConnect => self.session.connected_at(),
            XAxisMode::WallClock => None,
        }
    }
}

/// Tick label for X position `t` (seconds since the Unix epoch).
///
/// With an `origin`, labels are seconds relative to it; otherwise local
/// wall-clock time.
pub fn format_x_tick(t: f64, origin: Option<f64>) -> String {
    if let Some(t0) = origin {
        return format!("{:.1} s", t - t0);
    }
    let secs = t.floor();
    let nanos = ((t - secs) * 1e9) as u32;
    match DateTime::from_timestamp(secs as i64, nanos) {
        Some(dt) => dt.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => String::new(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// eframe integration
// ─────────────────────────────────────────────────────────────────────────────

impl eframe::App for PlotterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.color_scheme_applied {
            self.color_scheme.apply(ctx);
            self.color_scheme_applied = true;
        }


        self.drain_events();

        // Closing the window releases the port before eframe tears down.
        if ctx.input(|i| i.viewport().close_requested()) {
            let _ = self.session.disconnect();
        }

        let frame = self
            .render
            .poll(self.session.store(), Instant::now(), now_secs())
            .or_else(|| self.render.last_frame());

        egui::SidePanel::left("serial_sidebar")
            .resizable(false)
            .default_width(220.0)
            .show(ctx, |ui| {
                self.serial_config_ui(ui);
                ui.separator();
                self.series_ui(ui);
                ui.separator();
                self.view_ui(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.plot_ui(ui, frame.as_deref());
        });

        ctx.request_repaint_after(self.render.period());
    }
}
