use eframe::egui::{self, RichText, Ui};
use egui_extras::{Column, TableBuilder};
use water_dash::data::insight::leader;
use water_dash::data::metric::{Aggregation, Metric};
use water_dash::data::model::RawObservation;
use water_dash::nav::NavAction;

use crate::color::target_color;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// KPI cards
// ---------------------------------------------------------------------------

/// A headline KPI on the overview page.
#[derive(Debug, Clone, Copy)]
pub struct KpiCard {
    pub metric: Metric,
    pub target: f64,
    /// NRW improves as it falls.
    pub lower_is_better: bool,
    /// Value that fills the progress bar.
    pub scale_max: f64,
}

const fn card(metric: Metric, target: f64, scale_max: f64) -> KpiCard {
    KpiCard {
        metric,
        target,
        lower_is_better: false,
        scale_max,
    }
}

pub const CARDS: [KpiCard; 8] = [
    card(Metric::SafelyManagedWater, 65.0, 100.0),
    card(Metric::SafelyManagedSanitation, 45.0, 100.0),
    card(Metric::ServiceHours, 12.0, 24.0),
    card(Metric::CustomerSatisfaction, 75.0, 100.0),
    KpiCard {
        metric: Metric::NonRevenueWater,
        target: 42.0,
        lower_is_better: true,
        scale_max: 100.0,
    },
    card(Metric::OperatingCostCoverage, 95.0, 150.0),
    card(Metric::WaterQualityCompliance, 88.0, 100.0),
    card(Metric::CollectionEfficiency, 85.0, 100.0),
];

impl KpiCard {
    pub fn meets_target(&self, value: f64) -> bool {
        if self.lower_is_better {
            value <= self.target
        } else {
            value >= self.target
        }
    }

    /// Signed distance from target, positive when better than target.
    pub fn delta(&self, value: f64) -> f64 {
        if self.lower_is_better {
            self.target - value
        } else {
            value - self.target
        }
    }

    pub fn progress(&self, value: f64) -> f32 {
        (value / self.scale_max).clamp(0.0, 1.0) as f32
    }
}

pub fn format_value(metric: Metric, value: f64) -> String {
    format!("{value:.1}{}", metric.unit().suffix())
}

fn show_card(ui: &mut Ui, card: &KpiCard, value: Option<f64>) -> Option<NavAction> {
    let mut action = None;
    egui::Frame::group(ui.style()).show(ui, |ui: &mut Ui| {
        ui.set_min_width(200.0);
        ui.label(RichText::new(card.metric.label()).strong());
        match value {
            Some(value) => {
                ui.label(RichText::new(format_value(card.metric, value)).size(24.0));
                let delta = card.delta(value);
                ui.label(
                    RichText::new(format!(
                        "{delta:+.1} vs target {}",
                        format_value(card.metric, card.target)
                    ))
                    .color(target_color(card.meets_target(value))),
                );
                ui.add(egui::ProgressBar::new(card.progress(value)).desired_width(180.0));
            }
            None => {
                ui.label(RichText::new("n/a").size(24.0).weak());
            }
        }
        if ui.small_button("View details").clicked() {
            action = Some(NavAction::ShowDetail(card.metric));
        }
    });
    action
}

// ---------------------------------------------------------------------------
// Overview page (central panel)
// ---------------------------------------------------------------------------

pub fn overview_page(ui: &mut Ui, state: &mut AppState) {
    let view = state.visible();
    if view.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("No data for the current selection");
        });
        return;
    }
    let rows: Vec<&RawObservation> = view.rows().collect();
    let mode = state.config.aggregation;

    ui.heading("Water Sector Performance Overview");
    ui.label(format!(
        "{} entities, {} observations",
        state.visible_entities().len(),
        rows.len()
    ));
    ui.add_space(8.0);

    let mut action = None;
    egui::Grid::new("kpi_cards")
        .num_columns(4)
        .spacing([12.0, 12.0])
        .show(ui, |ui: &mut Ui| {
            for (i, card) in CARDS.iter().enumerate() {
                let value = card.metric.aggregate(rows.iter().copied(), mode).ok();
                if let Some(a) = show_card(ui, card, value) {
                    action = Some(a);
                }
                if i % 4 == 3 {
                    ui.end_row();
                }
            }
        });

    ui.add_space(12.0);
    insights(ui, &rows);

    ui.add_space(12.0);
    ui.heading("All indicators");
    indicator_table(ui, &rows, mode);

    if let Some(action) = action {
        state.navigate(action);
    }
}

fn insights(ui: &mut Ui, rows: &[&RawObservation]) {
    ui.heading("Key insights");
    let lines = [
        ("Best performer", Metric::SafelyManagedWater),
        ("Needs attention", Metric::NonRevenueWater),
        ("Financial leader", Metric::OperatingCostCoverage),
    ];
    ui.horizontal_wrapped(|ui: &mut Ui| {
        for (title, metric) in lines {
            egui::Frame::group(ui.style()).show(ui, |ui: &mut Ui| {
                ui.label(RichText::new(title).strong());
                match leader(metric, rows.iter().copied()) {
                    Ok(Some((entity, value))) => {
                        ui.label(format!("{entity}: {} {}", format_value(metric, value), metric.label()));
                    }
                    Ok(None) => {
                        ui.label("No data");
                    }
                    Err(e) => {
                        ui.label(RichText::new(e.to_string()).weak());
                    }
                }
            });
        }
    });
}

fn indicator_table(ui: &mut Ui, rows: &[&RawObservation], mode: Aggregation) {
    TableBuilder::new(ui)
        .id_salt("indicators")
        .striped(true)
        .column(Column::auto().at_least(220.0))
        .column(Column::auto().at_least(90.0))
        .column(Column::remainder())
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("Indicator");
            });
            header.col(|ui| {
                ui.strong("Value");
            });
            header.col(|ui| {
                ui.strong("Key");
            });
        })
        .body(|mut body| {
            for metric in Metric::ALL {
                let value = metric.aggregate(rows.iter().copied(), mode);
                body.row(18.0, |mut row| {
                    row.col(|ui| {
                        ui.label(metric.label());
                    });
                    row.col(|ui| match &value {
                        Ok(v) => {
                            ui.label(format_value(metric, *v));
                        }
                        Err(e) => {
                            ui.label("n/a").on_hover_text(e.to_string());
                        }
                    });
                    row.col(|ui| {
                        ui.monospace(metric.key());
                    });
                });
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nrw_card_is_inverse() {
        let nrw = CARDS
            .iter()
            .find(|c| c.metric == Metric::NonRevenueWater)
            .unwrap();
        assert!(nrw.meets_target(35.0));
        assert!(!nrw.meets_target(50.0));
        assert_eq!(nrw.delta(35.0), 7.0);
    }

    #[test]
    fn test_progress_is_clamped() {
        let occr = CARDS
            .iter()
            .find(|c| c.metric == Metric::OperatingCostCoverage)
            .unwrap();
        assert_eq!(occr.progress(75.0), 0.5);
        assert_eq!(occr.progress(300.0), 1.0);
        assert_eq!(occr.progress(-5.0), 0.0);
    }

    #[test]
    fn test_format_value_uses_unit() {
        assert_eq!(format_value(Metric::ServiceHours, 12.345), "12.3 hrs");
        assert_eq!(format_value(Metric::NonRevenueWater, 20.0), "20.0%");
    }
}
