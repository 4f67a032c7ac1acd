//! Native window entry point.

use eframe::egui;

use super::PlotterApp;
use crate::config::PlotterConfig;

/// Open the plotter in a native window and block until it is closed.
///
/// The serial port, if any, is closed before this returns.
pub fn run_app(config: PlotterConfig) -> eframe::Result<()> {
    let title = config.title.clone();
    let app = PlotterApp::new(config);

    let mut viewport = egui::ViewportBuilder::default().with_inner_size(egui::vec2(1200.0, 720.0));
    match load_app_icon_svg() {
        Some(icon) => viewport = viewport.with_icon(icon),
        None => tracing::debug!("window icon not available"),
    }
    let opts = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        &title,
        opts,
        Box::new(|cc| {
            let mut fonts = egui::FontDefinitions::default();
            egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
            cc.egui_ctx.set_fonts(fonts);
            Ok(Box::new(app))
        }),
    )
}

/// Render `icon.svg` from the crate root into an [`egui::IconData`].
fn load_app_icon_svg() -> Option<egui::IconData> {
    let svg_path = concat!(env!("CARGO_MANIFEST_DIR"), "/icon.svg");
    let data = std::fs::read(svg_path).ok()?;
    svg_to_icon(&data)
}

fn svg_to_icon(data: &[u8]) -> Option<egui::IconData> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default()).ok()?;
    let size = tree.size().to_int_size();
    if size.width() == 0 || size.height() == 0 {
        return None;
    }
    let mut pixmap = tiny_skia::Pixmap::new(size.width(), size.height())?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
    Some(egui::IconData {
        rgba: pixmap.take(),
        width: size.width(),
        height: size.height(),
    })
}
