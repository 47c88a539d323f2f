//! Data layer: observation model, KPI formulas, generation, and filtering.
//!
//! Architecture:
//! ```text
//!   seed + entities + range          .csv / .json
//!        │                                │
//!        ▼                                ▼
//!   ┌───────────┐                  ┌──────────┐
//!   │ synthetic  │  seeded rows    │  loader   │  parse file
//!   └───────────┘                  └──────────┘
//!        │                                │
//!        └──────────────┬─────────────────┘
//!                       ▼
//!              ┌──────────────────┐
//!              │ ObservationTable  │  rows keyed by (entity, period)
//!              └──────────────────┘
//!                       │
//!                       ▼
//!                 ┌──────────┐
//!                 │  filter   │  region / entity / year sets → view
//!                 └──────────┘
//!                       │
//!                       ▼
//!                 ┌──────────┐
//!                 │  metric   │  ratios with 0.0 on zero denominators
//!                 └──────────┘
//!                       │
//!                       ▼
//!                 ┌──────────┐
//!                 │ insight   │  thresholds, rankings
//!                 └──────────┘
//! ```

pub mod error;
pub mod filter;
pub mod insight;
pub mod loader;
pub mod metric;
pub mod model;
pub mod synthetic;

pub use error::{KpiError, KpiResult};
pub use filter::{filter, filter_all, FilterSelection, FilteredView};
pub use metric::{Aggregation, Metric};
pub use model::{Entity, Field, ObservationTable, Period, RawObservation, TimeRange};
pub use synthetic::{generate, DatasetCache, Preset};

/// Resolve `metric_name` through the catalog and average it over `rows`.
///
/// An unknown name is an error; an empty `rows` gives `0.0`.
pub fn compute<'a, I>(metric_name: &str, rows: I) -> KpiResult<f64>
where
    I: IntoIterator<Item = &'a RawObservation>,
{
    let metric: Metric = metric_name.parse()?;
    metric.aggregate(rows, Aggregation::MeanOfRatios)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_by_name() {
        let rows = vec![
            RawObservation::new("R", "A", Period::from_year(2022))
                .with(Field::WaterSupplied, 1000.0)
                .with(Field::TotalConsumption, 800.0),
            RawObservation::new("R", "B", Period::from_year(2022))
                .with(Field::WaterSupplied, 0.0)
                .with(Field::TotalConsumption, 0.0),
        ];
        assert!((compute("nrw_pct", &rows[..1]).unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(compute("nrw_pct", &rows[1..]).unwrap(), 0.0);
        assert!((compute("NRW", &rows).unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_compute_unknown_metric() {
        assert_eq!(
            compute("pressure_bar", &Vec::<RawObservation>::new()),
            Err(KpiError::UnknownMetric("pressure_bar".to_string()))
        );
    }

    #[test]
    fn test_facade_pipeline() {
        let preset = Preset::MalawiDistricts;
        let table = generate(preset.seed(), &preset.entities(), &preset.range());
        let selection = FilterSelection::default().with_entities(["Zomba"]);
        let view = filter(&table, &selection);
        assert_eq!(view.len(), 38);
        let value = compute("service_hours", view.rows()).unwrap();
        assert!((0.0..=24.0).contains(&value));
    }
}
