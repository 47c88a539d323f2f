//! Property-based tests for the KPI layer: generation, formulas, filtering.

use std::collections::BTreeSet;

use proptest::prelude::*;
use water_dash::data::filter::{filter, FilterSelection};
use water_dash::data::metric::{safe_ratio, Aggregation, Metric};
use water_dash::data::model::{Entity, Field, Period, RawObservation, TimeRange};
use water_dash::data::synthetic::{generate, Preset};
use water_dash::data::{compute, ObservationTable};

fn malawi() -> Vec<Entity> {
    Preset::MalawiDistricts.entities()
}

prop_compose! {
    fn entity_subset()(mask in prop::collection::vec(any::<bool>(), 12)) -> Vec<Entity> {
        malawi()
            .into_iter()
            .zip(mask)
            .filter_map(|(e, keep)| keep.then_some(e))
            .collect()
    }
}

prop_compose! {
    fn small_range()(start in 2018i32..2024, years in 0i32..3, monthly in any::<bool>()) -> TimeRange {
        if monthly {
            TimeRange::monthly((start, 1), (start + years, 6))
        } else {
            TimeRange::yearly(start, start + years)
        }
    }
}

prop_compose! {
    fn any_row()(values in prop::collection::vec(0.0f64..1e6, Field::ALL.len())) -> RawObservation {
        Field::ALL
            .iter()
            .zip(values)
            .fold(
                RawObservation::new("Southern Region", "Zomba", Period::from_year(2022)),
                |row, (field, value)| row.with(*field, value),
            )
    }
}

fn table(seed: u64) -> ObservationTable {
    generate(seed, &malawi(), &TimeRange::yearly(2021, 2023))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_generation_is_deterministic(
        seed in any::<u64>(),
        entities in entity_subset(),
        range in small_range(),
    ) {
        let a = generate(seed, &entities, &range);
        let b = generate(seed, &entities, &range);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_one_row_per_entity_and_period(entities in entity_subset(), range in small_range()) {
        let t = generate(42, &entities, &range);
        prop_assert_eq!(t.len(), entities.len() * range.periods().count());
    }

    #[test]
    fn prop_clipped_metrics_stay_in_bounds(row in any_row()) {
        for metric in Metric::ALL {
            let Some((lo, hi)) = metric.definition().clip else { continue };
            let value = metric.compute(&row).unwrap();
            prop_assert!((lo..=hi).contains(&value), "{} = {}", metric, value);
        }
    }

    #[test]
    fn prop_generated_metrics_are_finite_and_clipped(seed in any::<u64>()) {
        let t = table(seed);
        for metric in Metric::ALL {
            let clip = metric.definition().clip;
            for row in t.rows() {
                let value = metric.compute(row).unwrap();
                prop_assert!(value.is_finite());
                if let Some((lo, hi)) = clip {
                    prop_assert!((lo..=hi).contains(&value), "{} = {}", metric, value);
                }
            }
        }
    }

    #[test]
    fn prop_zero_denominator_is_zero(numerator in -1e9f64..1e9) {
        prop_assert_eq!(safe_ratio(numerator, 0.0), 0.0);

        let row = RawObservation::new("R", "E", Period::from_year(2022))
            .with(Field::WaterSupplied, 0.0)
            .with(Field::TotalConsumption, numerator.abs())
            .with(Field::WaterRevenue, numerator.abs())
            .with(Field::SewerRevenue, 0.0)
            .with(Field::Opex, 0.0);
        prop_assert_eq!(Metric::NonRevenueWater.compute(&row).unwrap(), 0.0);
        prop_assert_eq!(Metric::OperatingCostCoverage.compute(&row).unwrap(), 0.0);
    }

    #[test]
    fn prop_empty_entity_selection_selects_nothing(seed in any::<u64>()) {
        let t = table(seed);
        let selection = FilterSelection::full_domain(&t).with_entities(Vec::<String>::new());
        prop_assert!(filter(&t, &selection).is_empty());
    }

    #[test]
    fn prop_full_domain_is_identity(seed in any::<u64>()) {
        let t = table(seed);
        prop_assert_eq!(filter(&t, &FilterSelection::full_domain(&t)).to_table(), t);
    }

    #[test]
    fn prop_filter_keeps_exactly_matching_rows(
        entities in entity_subset(),
        years in prop::collection::btree_set(2021i32..=2023, 0..=3),
    ) {
        let t = table(42);
        let names: BTreeSet<String> = entities.iter().map(|e| e.name.clone()).collect();
        let selection = FilterSelection::default()
            .with_entities(names.clone())
            .with_years(years.clone());
        let view = filter(&t, &selection);

        let expected: Vec<usize> = t
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, r)| names.contains(&r.entity) && years.contains(&r.period.year()))
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(view.indices(), expected.as_slice());
    }
}

#[test]
fn test_nrw_worked_example() {
    let a = RawObservation::new("R", "A", Period::from_year(2022))
        .with(Field::WaterSupplied, 1000.0)
        .with(Field::TotalConsumption, 800.0);
    let b = RawObservation::new("R", "B", Period::from_year(2022))
        .with(Field::WaterSupplied, 0.0)
        .with(Field::TotalConsumption, 0.0);

    assert!((compute("nrw_pct", [&a]).unwrap() - 20.0).abs() < 1e-9);
    assert_eq!(compute("nrw_pct", [&b]).unwrap(), 0.0);
    assert!(
        (Metric::NonRevenueWater
            .aggregate([&a, &b], Aggregation::RatioOfSums)
            .unwrap()
            - 20.0)
            .abs()
            < 1e-9
    );
}

#[test]
fn test_compliance_without_tests_is_zero() {
    let row = RawObservation::new("R", "A", Period::from_year(2022))
        .with(Field::TestsConductedChlorine, 0.0)
        .with(Field::TestsPassedChlorine, 0.0)
        .with(Field::TestsConductedEcoli, 0.0)
        .with(Field::TestsPassedEcoli, 0.0);
    assert_eq!(Metric::WaterQualityCompliance.compute(&row).unwrap(), 0.0);
}

#[test]
fn test_presets_cover_expected_shape() {
    let t = generate(
        Preset::CountryComparison.seed(),
        &Preset::CountryComparison.entities(),
        &Preset::CountryComparison.range(),
    );
    assert_eq!(t.entities().len(), 4);
    assert_eq!(t.years().iter().copied().collect::<Vec<_>>(), (2020..=2025).collect::<Vec<_>>());
    assert_eq!(t.len(), 4 * 72);
}
