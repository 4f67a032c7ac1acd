//! Visual themes and the series colour palette.
//!
//! Series colours are handed out in first-seen order by [`Palette`], cycling
//! when there are more series than colours. The palette belongs to the store
//! of one session; there is no process-wide palette.

use egui::{Color32, Context, Visuals};
use serde::{Deserialize, Serialize};

/// Visual theme for the plotter window.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorScheme {
    #[default]
    Dark,
    Light,
    SolarizedDark,
    SolarizedLight,
    /// Blue-grey dark theme.
    Nord,
    Dracula,
    GruvboxDark,
    /// Pure-black background with saturated colours.
    HighContrast,
}

/// Dark or light base visuals with the panel, window and text colours replaced.
fn themed(mut v: Visuals, panel: Color32, window: Color32, text: Color32) -> Visuals {
    v.panel_fill = panel;
    v.window_fill = window;
    v.extreme_bg_color = panel;
    v.faint_bg_color = window;
    v.override_text_color = Some(text);
    v.widgets.noninteractive.bg_fill = window;
    v.widgets.noninteractive.fg_stroke.color = text;
    v
}

impl ColorScheme {
    /// All built-in schemes, for combo boxes.
    pub fn all() -> &'static [ColorScheme] {
        &[
            ColorScheme::Dark,
            ColorScheme::Light,
            ColorScheme::SolarizedDark,
            ColorScheme::SolarizedLight,
            ColorScheme::Nord,
            ColorScheme::Dracula,
            ColorScheme::GruvboxDark,
            ColorScheme::HighContrast,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ColorScheme::Dark => "Dark",
            ColorScheme::Light => "Light",
            ColorScheme::SolarizedDark => "Solarized Dark",
            ColorScheme::SolarizedLight => "Solarized Light",
            ColorScheme::Nord => "Nord",
            ColorScheme::Dracula => "Dracula",
            ColorScheme::GruvboxDark => "Gruvbox Dark",
            ColorScheme::HighContrast => "High Contrast",
        }
    }

    /// egui visuals for this scheme.
    pub fn visuals(&self) -> Visuals {
        match self {
            ColorScheme::Dark => Visuals::dark(),
            ColorScheme::Light => Visuals::light(),
            ColorScheme::SolarizedDark => themed(
                Visuals::dark(),
                Color32::from_rgb(0, 43, 54),
                Color32::from_rgb(7, 54, 66),
                Color32::from_rgb(131, 148, 150),
            ),
            ColorScheme::SolarizedLight => themed(
                Visuals::light(),
                Color32::from_rgb(253, 246, 227),
                Color32::from_rgb(238, 232, 213),
                Color32::from_rgb(101, 123, 131),
            ),
            ColorScheme::Nord => themed(
                Visuals::dark(),
                Color32::from_rgb(46, 52, 64),
                Color32::from_rgb(59, 66, 82),
                Color32::from_rgb(216, 222, 233),
            ),
            ColorScheme::Dracula => themed(
                Visuals::dark(),
                Color32::from_rgb(40, 42, 54),
                Color32::from_rgb(68, 71, 90),
                Color32::from_rgb(248, 248, 242),
            ),
            ColorScheme::GruvboxDark => themed(
                Visuals::dark(),
                Color32::from_rgb(40, 40, 40),
                Color32::from_rgb(60, 56, 54),
                Color32::from_rgb(235, 219, 178),
            ),
            ColorScheme::HighContrast => themed(
                Visuals::dark(),
                Color32::BLACK,
                Color32::from_rgb(10, 10, 10),
                Color32::WHITE,
            ),
        }
    }

    /// Apply this scheme's visuals to an egui context.
    pub fn apply(&self, ctx: &Context) {
        ctx.set_visuals(self.visuals());
    }

    /// Series colours for this scheme, in assignment order.
    pub fn trace_colors(&self) -> Vec<Color32> {
        match self {
            ColorScheme::Dark | ColorScheme::HighContrast => vec![
                Color32::from_rgb(31, 119, 180),
                Color32::from_rgb(255, 127, 14),
                Color32::from_rgb(44, 160, 44),
                Color32::from_rgb(214, 39, 40),
                Color32::from_rgb(148, 103, 189),
                Color32::from_rgb(140, 86, 75),
                Color32::from_rgb(227, 119, 194),
                Color32::from_rgb(127, 127, 127),
            ],
            ColorScheme::Light => vec![
                Color32::from_rgb(228, 26, 28),
                Color32::from_rgb(55, 126, 184),
                Color32::from_rgb(77, 175, 74),
                Color32::from_rgb(152, 78, 163),
                Color32::from_rgb(255, 127, 0),
                Color32::from_rgb(166, 86, 40),
                Color32::from_rgb(247, 129, 191),
                Color32::from_rgb(153, 153, 153),
            ],
            ColorScheme::SolarizedDark | ColorScheme::SolarizedLight => vec![
                Color32::from_rgb(181, 137, 0),
                Color32::from_rgb(203, 75, 22),
                Color32::from_rgb(220, 50, 47),
                Color32::from_rgb(211, 54, 130),
                Color32::from_rgb(108, 113, 196),
                Color32::from_rgb(38, 139, 210),
                Color32::from_rgb(42, 161, 152),
                Color32::from_rgb(133, 153, 0),
            ],
            ColorScheme::Nord => vec![
                Color32::from_rgb(136, 192, 208),
                Color32::from_rgb(191, 97, 106),
                Color32::from_rgb(163, 190, 140),
                Color32::from_rgb(235, 203, 139),
                Color32::from_rgb(180, 142, 173),
                Color32::from_rgb(208, 135, 112),
                Color32::from_rgb(129, 161, 193),
                Color32::from_rgb(94, 129, 172),
            ],
            ColorScheme::Dracula => vec![
                Color32::from_rgb(139, 233, 253),
                Color32::from_rgb(80, 250, 123),
                Color32::from_rgb(255, 184, 108),
                Color32::from_rgb(255, 121, 198),
                Color32::from_rgb(189, 147, 249),
                Color32::from_rgb(255, 85, 85),
                Color32::from_rgb(241, 250, 140),
                Color32::from_rgb(248, 248, 242),
            ],
            ColorScheme::GruvboxDark => vec![
                Color32::from_rgb(251, 73, 52),
                Color32::from_rgb(184, 187, 38),
                Color32::from_rgb(250, 189, 47),
                Color32::from_rgb(131, 165, 152),
                Color32::from_rgb(211, 134, 155),
                Color32::from_rgb(142, 192, 124),
                Color32::from_rgb(254, 128, 25),
                Color32::from_rgb(168, 153, 132),
            ],
        }
    }
}

/// Fixed list of colours assigned by index, cycling past the end.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    colors: Vec<Color32>,
}

impl Palette {
    /// An empty list falls back to a single grey.
    pub fn new(colors: Vec<Color32>) -> Self {
        if colors.is_empty() {
            Self {
                colors: vec![Color32::GRAY],
            }
        } else {
            Self { colors }
        }
    }

    /// Colour for the `index`-th series ever created.
    pub fn color_for(&self, index: usize) -> Color32 {
        self.colors[index % self.colors.len()]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(ColorScheme::default().trace_colors())
    }
}

impl From<&ColorScheme> for Palette {
    fn from(scheme: &ColorScheme) -> Self {
        Self::new(scheme.trace_colors())
    }
}
