// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::path::Path;
use std::sync::OnceLock;

use ab_glyph::{FontVec, PxScale};
use canonical_error::{CanonicalError, failed_precondition_error,
                      invalid_argument_error};
use image::{Rgb, RgbImage};
use image::imageops;
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};
use log::warn;

use crate::cutout::ImageData;

pub const PANEL_WIDTH: u32 = 500;
pub const PANEL_HEIGHT: u32 = 500;

// Strip above the image area where the panel title is drawn.
pub const TITLE_STRIP_HEIGHT: u32 = 28;

const TITLE_SCALE: f32 = 18.0;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const TITLE_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Named mapping from normalized sample values to display colors.
#[derive(Debug)]
pub struct Colormap {
    gradient: colorous::Gradient,
    reversed: bool,
}

impl Colormap {
    /// Looks up a colormap by its matplotlib-style name. A "_r" suffix
    /// reverses the map.
    pub fn by_name(name: &str) -> Result<Self, CanonicalError> {
        let lower = name.to_ascii_lowercase();
        let (base, reversed) = match lower.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (lower.as_str(), false),
        };
        let (gradient, flip) = match base {
            // colorous::GREYS runs light to dark; sky images are displayed
            // with a dark background, so flip it.
            "gray" | "grey" | "greys" => (colorous::GREYS, true),
            "viridis" => (colorous::VIRIDIS, false),
            "plasma" => (colorous::PLASMA, false),
            "magma" => (colorous::MAGMA, false),
            "inferno" => (colorous::INFERNO, false),
            "cividis" => (colorous::CIVIDIS, false),
            "turbo" => (colorous::TURBO, false),
            _ => {
                return Err(invalid_argument_error(
                    format!("Unknown colormap '{}'", name).as_str()));
            },
        };
        Ok(Colormap{gradient, reversed: reversed ^ flip})
    }

    fn lut(&self) -> [[u8; 3]; 256] {
        let mut lut = [[0_u8; 3]; 256];
        for (n, entry) in lut.iter_mut().enumerate() {
            let mut t = n as f64 / 255.0;
            if self.reversed {
                t = 1.0 - t;
            }
            let color = self.gradient.eval_continuous(t);
            *entry = [color.r, color.g, color.b];
        }
        lut
    }
}

// Display range over the finite samples only; blank (NaN) pixels render at
// the low end.
fn finite_range(samples: &[f32]) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &sample in samples {
        if sample.is_finite() {
            min = min.min(sample);
            max = max.max(sample);
        }
    }
    if min > max {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

/// Renders one titled panel: sample buffer mapped through the colormap with
/// a min/max display stretch, sky-image origin at the lower left.
pub fn render_panel(data: &ImageData, colormap: &Colormap, title: &str)
                    -> RgbImage {
    let lut = colormap.lut();
    let (min, max) = finite_range(&data.samples);
    let scale = if max > min { 255.0 / (max - min) } else { 0.0 };

    let mut panel = RgbImage::from_pixel(
        PANEL_WIDTH, TITLE_STRIP_HEIGHT + PANEL_HEIGHT, BACKGROUND);
    for y in 0..PANEL_HEIGHT {
        // Row 0 of the sample buffer is the bottom of the sky image; canvas
        // row 0 is the top.
        let data_y = (PANEL_HEIGHT - 1 - y) as usize * data.height /
            PANEL_HEIGHT as usize;
        for x in 0..PANEL_WIDTH {
            let data_x = x as usize * data.width / PANEL_WIDTH as usize;
            let sample = data.sample(data_x, data_y);
            let index = if sample.is_finite() && scale > 0.0 {
                (((sample - min) * scale).round() as i32).clamp(0, 255) as usize
            } else {
                0
            };
            panel.put_pixel(x, TITLE_STRIP_HEIGHT + y, Rgb(lut[index]));
        }
    }
    draw_title(&mut panel, title);
    panel
}

/// Stand-in panel for a survey whose fetch failed.
pub fn placeholder_panel(title: &str) -> RgbImage {
    let mut panel = RgbImage::from_pixel(
        PANEL_WIDTH, TITLE_STRIP_HEIGHT + PANEL_HEIGHT, BACKGROUND);
    let fill = Rgb([224_u8, 224, 224]);
    for y in 0..PANEL_HEIGHT {
        for x in 0..PANEL_WIDTH {
            panel.put_pixel(x, TITLE_STRIP_HEIGHT + y, fill);
        }
    }
    let stroke = Rgb([128_u8, 128, 128]);
    let top = TITLE_STRIP_HEIGHT as f32;
    let bottom = (TITLE_STRIP_HEIGHT + PANEL_HEIGHT - 1) as f32;
    let right = (PANEL_WIDTH - 1) as f32;
    draw_line_segment_mut(&mut panel, (0.0, top), (right, bottom), stroke);
    draw_line_segment_mut(&mut panel, (0.0, bottom), (right, top), stroke);
    draw_title(&mut panel, title);
    panel
}

/// Composes panels into a single 1xN figure, left to right.
pub fn compose_row(panels: &[RgbImage]) -> RgbImage {
    assert!(!panels.is_empty());
    let width: u32 = panels.iter().map(|p| p.width()).sum();
    let height = panels.iter().map(|p| p.height()).max().unwrap();
    let mut figure = RgbImage::from_pixel(width, height, BACKGROUND);
    let mut x_offset: i64 = 0;
    for panel in panels {
        imageops::replace(&mut figure, panel, x_offset, 0);
        x_offset += panel.width() as i64;
    }
    figure
}

pub fn save_figure(figure: &RgbImage, path: &Path) -> Result<(), CanonicalError> {
    figure.save(path).map_err(
        |e| failed_precondition_error(
            format!("Could not write {}: {}", path.display(), e).as_str()))
}

fn draw_title(panel: &mut RgbImage, title: &str) {
    if let Some(font) = title_font() {
        draw_text_mut(panel, TITLE_COLOR, 6, 5, PxScale::from(TITLE_SCALE),
                      font, title);
    }
}

fn title_font() -> Option<&'static FontVec> {
    static FONT: OnceLock<Option<FontVec>> = OnceLock::new();
    FONT.get_or_init(load_font).as_ref()
}

// Fontless systems still get a figure, just without titles.
fn load_font() -> Option<FontVec> {
    let mut candidates = Vec::new();
    if let Ok(path) = std::env::var("HIPSCUT_FONT") {
        candidates.push(std::path::PathBuf::from(path));
    }
    for path in [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
    ] {
        candidates.push(std::path::PathBuf::from(path));
    }
    for path in candidates {
        if let Ok(bytes) = std::fs::read(&path) {
            if let Ok(font) = FontVec::try_from_vec(bytes) {
                return Some(font);
            }
        }
    }
    warn!("No usable font found; figure titles will be omitted");
    None
}

// mod tests.
