use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.70, 0.50);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

/// Green when a value meets its target, red otherwise.
pub fn target_color(meets_target: bool) -> Color32 {
    if meets_target {
        Color32::from_rgb(46, 160, 67)
    } else {
        Color32::from_rgb(214, 69, 65)
    }
}

// ---------------------------------------------------------------------------
// Color mapping: entity name → Color32
// ---------------------------------------------------------------------------

/// Assigns each entity of a table a stable colour, so an entity keeps its
/// colour across pages and filter changes.
#[derive(Debug, Clone, Default)]
pub struct ColorMap {
    mapping: BTreeMap<String, Color32>,
}

impl ColorMap {
    pub fn new(entities: &BTreeSet<String>) -> Self {
        let mapping = entities
            .iter()
            .cloned()
            .zip(generate_palette(entities.len()))
            .collect();
        ColorMap { mapping }
    }

    pub fn color_for(&self, entity: &str) -> Color32 {
        self.mapping.get(entity).copied().unwrap_or(Color32::GRAY)
    }
}
