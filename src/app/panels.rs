//! Sidebar and plot rendering for [`PlotterApp`].

use eframe::egui::{self, Color32, RichText, Ui};
use egui_phosphor::regular::{ARROWS_CLOCKWISE, BROOM, PLUGS, PLUGS_CONNECTED};
use egui_plot::{Legend, Line, Plot};

use super::{format_x_tick, ConnectionStatus, PlotterApp};
use crate::color_scheme::ColorScheme;
use crate::config::XAxisMode;
use crate::render::Frame;
use crate::serial::{DataBits, Parity, StopBits, BAUD_RATES};

impl PlotterApp {
    pub(super) fn serial_config_ui(&mut self, ui: &mut Ui) {
        ui.heading("Serial Config");
        let connected = self.session.is_connected();
        let can_connect = self.can_connect();

        ui.add_enabled_ui(can_connect, |ui| {
            ui.horizontal(|ui| {
                let selected = if self.form.port.is_empty() {
                    "<none>".to_string()
                } else {
                    self.form.port.clone()
                };
                egui::ComboBox::from_id_salt("serial_port")
                    .selected_text(selected)
                    .width(150.0)
                    .show_ui(ui, |ui| {
                        for port in &self.ports {
                            ui.selectable_value(&mut self.form.port, port.clone(), port);
                        }
                    });
                if ui
                    .button(ARROWS_CLOCKWISE)
                    .on_hover_text("Refresh port list")
                    .clicked()
                {
                    self.refresh_ports();
                }
            });
            ui.add(
                egui::TextEdit::singleline(&mut self.form.port)
                    .hint_text("or type a device path"),
            );

            egui::Grid::new("serial_params")
                .num_columns(2)
                .spacing([8.0, 4.0])
                .show(ui, |ui| {
                    ui.label("Baud");
                    egui::ComboBox::from_id_salt("baud")
                        .selected_text(self.form.baud_rate.to_string())
                        .show_ui(ui, |ui| {
                            for rate in BAUD_RATES {
                                ui.selectable_value(&mut self.form.baud_rate, rate, rate.to_string());
                            }
                        });
                    ui.end_row();

                    ui.label("Parity");
                    egui::ComboBox::from_id_salt("parity")
                        .selected_text(self.form.parity.to_string())
                        .show_ui(ui, |ui| {
                            for p in Parity::ALL {
                                ui.selectable_value(&mut self.form.parity, p, p.to_string());
                            }
                        });
                    ui.end_row();

                    ui.label("Data bits");
                    egui::ComboBox::from_id_salt("data_bits")
                        .selected_text(self.form.data_bits.to_string())
                        .show_ui(ui, |ui| {
                            for bits in DataBits::ALL {
                                ui.selectable_value(&mut self.form.data_bits, bits, bits.to_string());
                            }
                        });
                    ui.end_row();

                    ui.label("Stop bits");
                    egui::ComboBox::from_id_salt("stop_bits")
                        .selected_text(self.form.stop_bits.to_string())
                        .show_ui(ui, |ui| {
                            for bits in StopBits::ALL {
                                ui.selectable_value(&mut self.form.stop_bits, bits, bits.to_string());
                            }
                        });
                    ui.end_row();
                });
        });

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            if ui
                .add_enabled(can_connect, egui::Button::new(format!("{PLUGS_CONNECTED} Connect")))
                .clicked()
            {
                self.connect();
            }
            if ui
                .add_enabled(connected, egui::Button::new(format!("{PLUGS} Disconnect")))
                .clicked()
            {
                self.disconnect();
            }
            if ui
                .button(format!("{BROOM} Clear"))
                .on_hover_text("Remove all series")
                .clicked()
            {
                self.session.reset();
            }
        });

        let color = match self.status {
            ConnectionStatus::Connected(_) => Color32::from_rgb(80, 200, 120),
            ConnectionStatus::Error(_) => Color32::from_rgb(230, 80, 80),
            ConnectionStatus::Disconnected | ConnectionStatus::Disconnecting => {
                ui.visuals().weak_text_color()
            }
        };
        ui.label(RichText::new(self.status.text()).color(color));
    }

    pub(super) fn series_ui(&mut self, ui: &mut Ui) {
        ui.heading("Series");
        let series = self.session.store().series_info();
        if series.is_empty() {
            ui.label(RichText::new("No data yet").weak());
            return;
        }
        egui::ScrollArea::vertical().max_height(240.0).show(ui, |ui| {
            for meta in series {
                let mut visible = meta.visible;
                let text = RichText::new(&meta.label).color(meta.color);
                if ui.checkbox(&mut visible, text).changed() {
                    self.session.toggle(&meta.label);
                }
            }
        });
    }

    pub(super) fn view_ui(&mut self, ui: &mut Ui) {
        ui.heading("View");
        egui::Grid::new("view_options").num_columns(2).show(ui, |ui| {
            ui.label("Theme");
            let mut selected = self.color_scheme.clone();
            egui::ComboBox::from_id_salt("color_scheme")
                .selected_text(selected.label())
                .show_ui(ui, |ui| {
                    for scheme in ColorScheme::all() {
                        ui.selectable_value(&mut selected, scheme.clone(), scheme.label());
                    }
                });
            if selected != self.color_scheme {
                self.set_color_scheme(ui.ctx(), selected);
            }
            ui.end_row();

            ui.label("X axis");
            egui::ComboBox::from_id_salt("x_axis_mode")
                .selected_text(x_axis_label(self.x_axis))
                .show_ui(ui, |ui| {
                    for mode in [XAxisMode::WallClock, XAxisMode::SinceConnect] {
                        ui.selectable_value(&mut self.x_axis, mode, x_axis_label(mode));
                    }
                });
            ui.end_row();
        });
    }

    pub(super) fn plot_ui(&mut self, ui: &mut Ui, frame: Option<&Frame>) {
        let origin = self.x_origin();
        let plot = Plot::new("serial_plot")
            .legend(Legend::default())
            .allow_scroll(false)
            .allow_zoom(false)
            .allow_drag(false)
            .allow_boxed_zoom(false)
            .x_axis_label("Time")
            .x_axis_formatter(move |mark, _range| format_x_tick(mark.value, origin));

        plot.show(ui, |plot_ui| {
            let Some(frame) = frame else {
                return;
            };
            plot_ui.set_plot_bounds_x(frame.x_range.0..=frame.x_range.1);
            plot_ui.set_plot_bounds_y(frame.y_range.0..=frame.y_range.1);
            for series in &frame.series {
                let line = Line::new(series.label.as_str(), series.points.clone())
                    .color(series.color)
                    .width(1.5);
                plot_ui.line(line);
            }
        });
    }
}

fn x_axis_label(mode: XAxisMode) -> &'static str {
    match mode {
        XAxisMode::WallClock => "Wall clock",
        XAxisMode::SinceConnect => "Since connect",
    }
}
