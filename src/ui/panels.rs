use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use water_dash::data::metric::Aggregation;
use water_dash::data::synthetic::Preset;
use water_dash::nav::{NavAction, View};

use crate::state::{AppState, Dimension};

// ---------------------------------------------------------------------------
// Left side panel – dataset and filter widgets
// ---------------------------------------------------------------------------

fn aggregation_label(mode: Aggregation) -> &'static str {
    match mode {
        Aggregation::MeanOfRatios => "Mean of entity ratios",
        Aggregation::RatioOfSums => "Ratio of totals",
    }
}

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Dataset");
    ui.separator();

    let current = state.config.preset;
    egui::ComboBox::from_id_salt("preset")
        .selected_text(current.label())
        .show_ui(ui, |ui: &mut Ui| {
            for preset in Preset::ALL {
                if ui.selectable_label(preset == current, preset.label()).clicked() {
                    state.load_preset(preset);
                }
            }
        });

    let mode = state.config.aggregation;
    egui::ComboBox::from_id_salt("aggregation")
        .selected_text(aggregation_label(mode))
        .show_ui(ui, |ui: &mut Ui| {
            for option in [Aggregation::MeanOfRatios, Aggregation::RatioOfSums] {
                ui.selectable_value(&mut state.config.aggregation, option, aggregation_label(option));
            }
        });
    ui.add_space(8.0);

    ui.heading("Filters");
    ui.separator();

    if state.table.is_empty() {
        ui.label("No observations loaded.");
        return;
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for dim in Dimension::ALL {
                let values = state.domain(dim);
                let header_text = format!(
                    "{}  ({}/{})",
                    dim.label(),
                    state.selected_count(dim),
                    values.len()
                );

                egui::CollapsingHeader::new(RichText::new(header_text).strong())
                    .id_salt(dim.label())
                    .default_open(dim != Dimension::Entity)
                    .show(ui, |ui: &mut Ui| {
                        ui.horizontal(|ui: &mut Ui| {
                            if ui.small_button("All").clicked() {
                                state.select_all(dim);
                            }
                            if ui.small_button("None").clicked() {
                                state.select_none(dim);
                            }
                        });

                        for value in &values {
                            let mut text = RichText::new(value);
                            if dim == Dimension::Entity {
                                text = text.color(state.color_map.color_for(value));
                            }
                            let mut checked = state.is_selected(dim, value);
                            if ui.checkbox(&mut checked, text).changed() {
                                state.toggle_filter_value(dim, value);
                            }
                        }
                    });
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            let has_rows = !state.visible_indices.is_empty();
            if ui
                .add_enabled(has_rows, egui::Button::new("Export filtered…"))
                .clicked()
            {
                export_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if ui
            .selectable_label(state.view == View::Overview, "Overview")
            .clicked()
        {
            state.navigate(NavAction::BackToOverview);
        }
        if let View::Detail(metric) = state.view {
            ui.label(format!("› {}", metric.label()));
        }

        ui.separator();

        ui.label(format!(
            "{}: {} observations, {} visible",
            state.source,
            state.table.len(),
            state.visible_indices.len()
        ));

        if let Some(msg) = &state.status_message {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open observations")
        .add_filter("Supported files", &["csv", "json"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .pick_file();

    if let Some(path) = file {
        state.open_file(&path);
    }
}

pub fn export_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Export filtered observations")
        .add_filter("CSV", &["csv"])
        .set_file_name("filtered_data.csv")
        .save_file();

    if let Some(path) = file {
        state.export_visible(&path);
    }
}
