use eframe::egui::{Color32, RichText, Ui};
use egui_extras::{Column, TableBuilder};
use egui_plot::{HLine, Line, Plot, PlotPoints};
use water_dash::data::insight::{
    nrw_reduction_potential, rank_entities, BudgetSplit, NrwComponents, NrwOpportunity,
    StaffCostVerdict,
};
use water_dash::data::metric::{entity_series, group_aggregate, GroupBy, GroupKey, Metric};
use water_dash::data::model::{Period, RawObservation};
use water_dash::nav::NavAction;

use crate::color::target_color;
use crate::state::AppState;
use crate::ui::overview::{format_value, CARDS};

/// Above this many entities the trend shows the mean line only.
const MAX_TREND_LINES: usize = 4;

/// Horizontal reference lines drawn on a metric's trend plot.
pub fn reference_lines(metric: Metric) -> Vec<(&'static str, f64)> {
    match metric {
        Metric::SafelyManagedWater => vec![("SDG target", 80.0)],
        Metric::NonRevenueWater => vec![("Good practice", 25.0)],
        Metric::OperatingCostCoverage => vec![("Break-even", 100.0), ("Sustainable", 120.0)],
        Metric::WaterQualityCompliance => vec![("National standard", 95.0)],
        Metric::StaffCostShare => vec![
            ("Huge", StaffCostVerdict::HUGE_PCT),
            ("Very huge", StaffCostVerdict::VERY_HUGE_PCT),
        ],
        other => CARDS
            .iter()
            .find(|c| c.metric == other)
            .map(|c| vec![("Target", c.target)])
            .unwrap_or_default(),
    }
}

/// Plot x coordinate of a period, in fractional years.
fn period_x(period: Period) -> f64 {
    let month = period.month().map_or(0.0, |m| f64::from(m - 1) / 12.0);
    f64::from(period.year()) + month
}

// ---------------------------------------------------------------------------
// Detail page (central panel)
// ---------------------------------------------------------------------------

pub fn detail_page(ui: &mut Ui, state: &mut AppState, metric: Metric) {
    if ui.button("← Back to overview").clicked() {
        state.navigate(NavAction::BackToOverview);
        return;
    }
    ui.heading(metric.label());

    let view = state.visible();
    if view.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("No data for the current selection");
        });
        return;
    }
    let rows: Vec<&RawObservation> = view.rows().collect();
    let mode = state.config.aggregation;

    match metric.aggregate(rows.iter().copied(), mode) {
        Ok(value) => {
            ui.label(RichText::new(format_value(metric, value)).size(28.0));
            metric_insights(ui, metric, value, &rows);
        }
        Err(e) => {
            ui.label(RichText::new(e.to_string()).color(Color32::RED));
            return;
        }
    }
    ui.separator();

    ui.columns(2, |columns| {
        trend_plot(&mut columns[0], state, metric, &rows);
        entity_table(&mut columns[1], state, metric, &rows);
    });
}

fn metric_insights(ui: &mut Ui, metric: Metric, value: f64, rows: &[&RawObservation]) {
    match metric {
        Metric::NonRevenueWater => {
            let opportunity = NrwOpportunity::classify(value);
            ui.label(
                RichText::new(format!("Reduction opportunity: {}", opportunity.label()))
                    .color(target_color(opportunity == NrwOpportunity::Low)),
            );
            ui.label(format!(
                "Reduction potential: {:.1} points above good practice",
                nrw_reduction_potential(value)
            ));
            let c = NrwComponents::estimate(value);
            ui.label(format!(
                "Estimated losses: physical {:.1}%, commercial {:.1}%, unauthorised {:.1}%",
                c.physical, c.commercial, c.unauthorised
            ));
        }
        Metric::StaffCostShare => {
            let verdict = StaffCostVerdict::classify(value);
            ui.label(
                RichText::new(format!("Staff costs are huge: {}", verdict.label()))
                    .color(target_color(verdict == StaffCostVerdict::NotConfirmed)),
            );
            budget_lines(ui, &BudgetSplit::total(rows.iter().copied()));
        }
        Metric::OperatingCostCoverage => {
            let text = if value >= 120.0 {
                "Sustainable: revenue covers costs with a margin"
            } else if value >= 100.0 {
                "Break-even: revenue covers operating costs"
            } else {
                "Below break-even: operating costs exceed revenue"
            };
            ui.label(RichText::new(text).color(target_color(value >= 100.0)));
        }
        _ => {}
    }
}

fn budget_lines(ui: &mut Ui, split: &BudgetSplit) {
    let Some(budget) = split.budget else {
        return;
    };
    ui.label(format!("Total budget: {:.2} bn", budget / 1e9));
    for (label, line) in [
        ("Staff", split.staff),
        ("SAN", split.sanitation),
        ("WAT", split.water),
    ] {
        if let (Some(amount), Some(share)) = (line, split.share_pct(line)) {
            ui.label(format!("{label}: {:.2} bn ({share:.1}% of budget)", amount / 1e9));
        }
    }
}

fn trend_plot(ui: &mut Ui, state: &AppState, metric: Metric, rows: &[&RawObservation]) {
    ui.strong("Trend");

    let series = match entity_series(metric, rows.iter().copied()) {
        Ok(series) => series,
        Err(e) => {
            ui.label(RichText::new(e.to_string()).color(Color32::RED));
            return;
        }
    };
    let mean = group_aggregate(metric, rows.iter().copied(), GroupBy::Period, state.config.aggregation)
        .unwrap_or_default();

    Plot::new(("detail_trend", metric.key()))
        .legend(egui_plot::Legend::default())
        .x_axis_label("Year")
        .y_axis_label(metric.unit().suffix().trim())
        .height(ui.available_height().max(240.0))
        .show(ui, |plot_ui| {
            if (1..=MAX_TREND_LINES).contains(&series.len()) {
                for (entity, points) in &series {
                    let points: PlotPoints =
                        points.iter().map(|(p, v)| [period_x(*p), *v]).collect();
                    plot_ui.line(
                        Line::new(points)
                            .name(entity)
                            .color(state.color_map.color_for(entity))
                            .width(1.5),
                    );
                }
            }

            let points: PlotPoints = mean
                .iter()
                .filter_map(|(key, v)| match key {
                    GroupKey::Period(p) => Some([period_x(*p), *v]),
                    _ => None,
                })
                .collect();
            plot_ui.line(
                Line::new(points)
                    .name("Average")
                    .color(Color32::WHITE)
                    .width(2.5),
            );

            for (label, y) in reference_lines(metric) {
                plot_ui.hline(HLine::new(y).name(label).color(Color32::GOLD));
            }
        });
}

fn entity_table(ui: &mut Ui, state: &AppState, metric: Metric, rows: &[&RawObservation]) {
    ui.strong("By entity");

    let ranked = match rank_entities(metric, rows.iter().copied()) {
        Ok(ranked) => ranked,
        Err(e) => {
            ui.label(RichText::new(e.to_string()).color(Color32::RED));
            return;
        }
    };

    let show_class = matches!(metric, Metric::NonRevenueWater | Metric::StaffCostShare);
    let mut table = TableBuilder::new(ui)
        .id_salt(("detail_table", metric.key()))
        .striped(true)
        .column(Column::exact(32.0))
        .column(Column::auto().at_least(120.0))
        .column(Column::auto().at_least(80.0));
    if show_class {
        table = table.column(Column::remainder());
    }

    table
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("#");
            });
            header.col(|ui| {
                ui.strong("Entity");
            });
            header.col(|ui| {
                ui.strong("Mean");
            });
            if show_class {
                header.col(|ui| {
                    ui.strong("Assessment");
                });
            }
        })
        .body(|mut body| {
            for (rank, (entity, value)) in ranked.iter().enumerate() {
                body.row(18.0, |mut row| {
                    row.col(|ui| {
                        ui.label(format!("{}", rank + 1));
                    });
                    row.col(|ui| {
                        ui.label(RichText::new(entity).color(state.color_map.color_for(entity)));
                    });
                    row.col(|ui| {
                        ui.label(format_value(metric, *value));
                    });
                    if show_class {
                        row.col(|ui| {
                            let text = match metric {
                                Metric::NonRevenueWater => NrwOpportunity::classify(*value).label(),
                                _ => StaffCostVerdict::classify(*value).label(),
                            };
                            ui.label(text);
                        });
                    }
                });
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_x() {
        assert_eq!(period_x(Period::from_year(2022)), 2022.0);
        let march = Period::from_ym_opt(2022, 3).unwrap();
        assert!((period_x(march) - (2022.0 + 2.0 / 12.0)).abs() < 1e-12);
    }

    #[test]
    fn test_reference_lines() {
        assert_eq!(reference_lines(Metric::SafelyManagedWater), vec![("SDG target", 80.0)]);
        assert_eq!(reference_lines(Metric::ServiceHours), vec![("Target", 12.0)]);
        assert!(reference_lines(Metric::SludgeTreated).is_empty());
    }
}
