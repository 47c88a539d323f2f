use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::model::{Entity, Field, ObservationTable, Period, RawObservation, TimeRange};

// ---------------------------------------------------------------------------
// Random draws
// ---------------------------------------------------------------------------

/// Box-Muller transform for normal distribution
fn gauss(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1 = rng.gen::<f64>().max(1e-15);
    let u2 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

fn clipped_normal(rng: &mut StdRng, mean: f64, std_dev: f64, lo: f64, hi: f64) -> f64 {
    gauss(rng, mean, std_dev).clamp(lo, hi)
}

/// Uniform integer in `lo..hi` (upper bound exclusive), as `f64`.
fn uniform_int(rng: &mut StdRng, lo: i64, hi: i64) -> f64 {
    rng.gen_range(lo..hi) as f64
}

// ---------------------------------------------------------------------------
// Per-entity baseline
// ---------------------------------------------------------------------------

/// Long-run performance level of one entity; every period is drawn around it.
#[derive(Debug, Clone)]
struct Baseline {
    water_coverage: f64,
    sanitation_coverage: f64,
    nrw_pct: f64,
    occr_pct: f64,
    service_hours: f64,
    collection_efficiency: f64,
    water_quality: f64,
    metering: f64,
    satisfaction: f64,
    sewer_share: f64,
    staff_share: f64,
}

impl Baseline {
    fn draw(rng: &mut StdRng) -> Self {
        Baseline {
            water_coverage: uniform_int(rng, 55, 85),
            sanitation_coverage: uniform_int(rng, 25, 65),
            nrw_pct: uniform_int(rng, 35, 70),
            occr_pct: uniform_int(rng, 45, 110),
            service_hours: uniform_int(rng, 6, 18),
            collection_efficiency: uniform_int(rng, 65, 95),
            water_quality: uniform_int(rng, 70, 98),
            metering: uniform_int(rng, 50, 90),
            satisfaction: uniform_int(rng, 60, 90),
            sewer_share: uniform_int(rng, 5, 40),
            staff_share: uniform_int(rng, 30, 65),
        }
    }
}

fn draw_row(
    rng: &mut StdRng,
    entity: &Entity,
    base: &Baseline,
    period: Period,
    progress: f64,
) -> RawObservation {
    // Supply and losses
    let supplied = clipped_normal(rng, 22_000.0, 3_000.0, 8_000.0, 35_000.0);
    let nrw_target = (base.nrw_pct - progress * 8.0).max(20.0) / 100.0;
    let loss_share = clipped_normal(rng, nrw_target, 0.02, 0.0, 1.0);
    let consumption = supplied * (1.0 - loss_share);
    let metered = consumption * clipped_normal(rng, base.metering / 100.0, 0.03, 0.0, 1.0);

    // Billing and collection
    let water_billed = clipped_normal(rng, 95_000.0, 15_000.0, 30_000.0, 180_000.0);
    let sewer_billed = clipped_normal(rng, 42_000.0, 8_000.0, 10_000.0, 90_000.0);
    let collection = base.collection_efficiency / 100.0;
    let water_revenue = water_billed * clipped_normal(rng, collection, 0.03, 0.3, 1.05);
    let sewer_revenue = sewer_billed * clipped_normal(rng, collection, 0.04, 0.3, 1.05);
    let coverage_ratio = clipped_normal(rng, base.occr_pct / 100.0 + progress * 0.12, 0.05, 0.3, 1.4);
    let opex = (water_revenue + sewer_revenue) / coverage_ratio;

    // Water quality testing
    let quality = clipped_normal(rng, base.water_quality / 100.0 + progress * 0.05, 0.02, 0.0, 1.0);
    let chlorine_tests = uniform_int(rng, 200, 300);
    let ecoli_tests = uniform_int(rng, 180, 260);
    let chlorine_passed = (chlorine_tests * quality).floor();
    let ecoli_passed = (ecoli_tests * clipped_normal(rng, quality, 0.02, 0.0, 1.0)).floor();

    // Sanitation
    let households = clipped_normal(rng, 120_000.0, 10_000.0, 60_000.0, 200_000.0).round();
    let sewer_share = clipped_normal(rng, base.sewer_share / 100.0, 0.05, 0.05, 0.8);
    let sewer_connections = (households * sewer_share).round().clamp(1.0, households);
    let ww_collected = clipped_normal(rng, 85_000.0, 12_000.0, 30_000.0, 160_000.0);
    let ww_treated = ww_collected * clipped_normal(rng, 0.7, 0.12, 0.2, 0.98);
    let complaints = clipped_normal(rng, 1_000.0, 250.0, 100.0, 5_000.0).round();
    let resolved = (complaints * clipped_normal(rng, 0.88, 0.07, 0.4, 0.99)).floor();
    let emptied = clipped_normal(rng, 3_000.0, 600.0, 500.0, 12_000.0).round();
    let sludge_treated = clipped_normal(rng, emptied * 0.6, emptied * 0.15, 100.0, emptied * 1.2);

    // Budget
    let budget = clipped_normal(rng, 2.5e9, 4.0e8, 1.0e9, 5.0e9);
    let staff_cost = budget * clipped_normal(rng, base.staff_share / 100.0, 0.04, 0.1, 0.9);
    let san_allocation = budget * clipped_normal(rng, 0.3, 0.05, 0.1, 0.5);
    let wat_allocation = budget * clipped_normal(rng, 0.45, 0.05, 0.2, 0.6);

    // Service indicators
    let service_hours = clipped_normal(rng, base.service_hours, 1.0, 0.0, 24.0);
    let water_coverage =
        clipped_normal(rng, base.water_coverage + progress * 10.0, 4.0, 40.0, 95.0);
    let sanitation_coverage =
        clipped_normal(rng, base.sanitation_coverage + progress * 6.0, 5.0, 20.0, 90.0);
    let satisfaction = clipped_normal(rng, base.satisfaction, 3.0, 0.0, 100.0);

    RawObservation::new(entity.region.clone(), entity.name.clone(), period)
        .with(Field::WaterSupplied, supplied)
        .with(Field::TotalConsumption, consumption)
        .with(Field::MeteredConsumption, metered)
        .with(Field::WaterBilled, water_billed)
        .with(Field::SewerBilled, sewer_billed)
        .with(Field::WaterRevenue, water_revenue)
        .with(Field::SewerRevenue, sewer_revenue)
        .with(Field::Opex, opex)
        .with(Field::TestsConductedChlorine, chlorine_tests)
        .with(Field::TestsPassedChlorine, chlorine_passed)
        .with(Field::TestsConductedEcoli, ecoli_tests)
        .with(Field::TestsPassedEcoli, ecoli_passed)
        .with(Field::Households, households)
        .with(Field::SewerConnections, sewer_connections)
        .with(Field::WastewaterCollected, ww_collected)
        .with(Field::WastewaterTreated, ww_treated)
        .with(Field::Complaints, complaints)
        .with(Field::ComplaintsResolved, resolved)
        .with(Field::HouseholdsEmptied, emptied)
        .with(Field::SludgeTreated, sludge_treated)
        .with(Field::StaffCost, staff_cost)
        .with(Field::BudgetAllocated, budget)
        .with(Field::SanitationAllocation, san_allocation)
        .with(Field::WaterAllocation, wat_allocation)
        .with(Field::ServiceHours, service_hours)
        .with(Field::SafelyManagedWater, water_coverage)
        .with(Field::SafelyManagedSanitation, sanitation_coverage)
        .with(Field::CustomerSatisfaction, satisfaction)
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Generate one observation per (entity, period).
///
/// Rows are ordered period-major, entities in input order. Each entity draws
/// its baseline first, then every period is drawn around it with a yearly
/// improvement of `0.1 * (year - start year)`. Rows are keyed by entity
/// name, so a repeated name is generated once, under its first region. The
/// output depends only on the arguments.
pub fn generate(seed: u64, entities: &[Entity], range: &TimeRange) -> ObservationTable {
    let mut seen = HashSet::new();
    let entities: Vec<&Entity> = entities
        .iter()
        .filter(|e| seen.insert(e.name.as_str()))
        .collect();
    let periods: Vec<Period> = range.periods().collect();

    if entities.is_empty() || periods.is_empty() {
        log::debug!("nothing to generate for seed {seed}");
        return ObservationTable::default();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let baselines: Vec<Baseline> = entities.iter().map(|_| Baseline::draw(&mut rng)).collect();
    let start_year = range.start().year();

    let mut rows = Vec::with_capacity(entities.len() * periods.len());
    for period in &periods {
        let progress = f64::from(period.year() - start_year) * 0.1;
        for (entity, base) in entities.iter().zip(&baselines) {
            rows.push(draw_row(&mut rng, entity, base, *period, progress));
        }
    }

    log::info!(
        "generated {} rows ({} entities × {} periods, seed {seed})",
        rows.len(),
        entities.len(),
        periods.len()
    );
    ObservationTable::from_rows(rows)
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// Ready-made entity sets and ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Twelve Malawi districts, monthly from January 2021 to February 2024.
    #[default]
    MalawiDistricts,
    /// Four countries, monthly from January 2020 to December 2025.
    CountryComparison,
}

const MALAWI_DISTRICTS: [(&str, &str); 12] = [
    ("Southern Region", "Blantyre"),
    ("Central Region", "Lilongwe"),
    ("Northern Region", "Mzuzu"),
    ("Southern Region", "Zomba"),
    ("Central Region", "Kasungu"),
    ("Southern Region", "Mangochi"),
    ("Central Region", "Salima"),
    ("Northern Region", "Karonga"),
    ("Northern Region", "Mzimba"),
    ("Southern Region", "Balaka"),
    ("Southern Region", "Mulanje"),
    ("Southern Region", "Thyolo"),
];

const COUNTRIES: [(&str, &str); 4] = [
    ("Southern Africa", "Lesotho"),
    ("Southern Africa", "Malawi"),
    ("East Africa", "Uganda"),
    ("Central Africa", "Cameroon"),
];

impl Preset {
    pub const ALL: [Preset; 2] = [Preset::MalawiDistricts, Preset::CountryComparison];

    pub fn label(self) -> &'static str {
        match self {
            Preset::MalawiDistricts => "Malawi districts",
            Preset::CountryComparison => "Country comparison",
        }
    }

    pub fn seed(self) -> u64 {
        match self {
            Preset::MalawiDistricts => 42,
            Preset::CountryComparison => 7,
        }
    }

    pub fn entities(self) -> Vec<Entity> {
        let list: &[(&str, &str)] = match self {
            Preset::MalawiDistricts => &MALAWI_DISTRICTS,
            Preset::CountryComparison => &COUNTRIES,
        };
        list.iter()
            .map(|(region, name)| Entity::new(*region, *name))
            .collect()
    }

    pub fn range(self) -> TimeRange {
        match self {
            Preset::MalawiDistricts => TimeRange::monthly((2021, 1), (2024, 2)),
            Preset::CountryComparison => TimeRange::monthly((2020, 1), (2025, 12)),
        }
    }
}

// ---------------------------------------------------------------------------
// Memoisation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    seed: u64,
    entities: u64,
    range: TimeRange,
}

fn fingerprint(entities: &[Entity]) -> u64 {
    let mut hasher = DefaultHasher::new();
    entities.hash(&mut hasher);
    hasher.finish()
}

/// Generated tables keyed by (seed, entity-set fingerprint, range).
///
/// Tables are handed out as `Arc`s and never modified after insertion.
#[derive(Debug, Default)]
pub struct DatasetCache {
    tables: HashMap<CacheKey, Arc<ObservationTable>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_generate(
        &mut self,
        seed: u64,
        entities: &[Entity],
        range: &TimeRange,
    ) -> Arc<ObservationTable> {
        let key = CacheKey {
            seed,
            entities: fingerprint(entities),
            range: *range,
        };
        if let Some(table) = self.tables.get(&key) {
            log::debug!("dataset cache hit for seed {seed}");
            return Arc::clone(table);
        }
        log::debug!("dataset cache miss for seed {seed}");
        let table = Arc::new(generate(seed, entities, range));
        self.tables.insert(key, Arc::clone(&table));
        table
    }

    /// Generate (or reuse) a preset, optionally with a different seed.
    pub fn preset(&mut self, preset: Preset, seed: Option<u64>) -> Arc<ObservationTable> {
        let seed = seed.unwrap_or_else(|| preset.seed());
        self.get_or_generate(seed, &preset.entities(), &preset.range())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::metric::Metric;

    fn districts() -> Vec<Entity> {
        vec![
            Entity::new("Northern Region", "Mzuzu"),
            Entity::new("Southern Region", "Zomba"),
        ]
    }

    #[test]
    fn test_one_row_per_entity_and_period() {
        let range = TimeRange::monthly((2021, 1), (2021, 6));
        let table = generate(42, &districts(), &range);
        assert_eq!(table.len(), 12);
        assert_eq!(table.entities().len(), 2);
        assert_eq!(table.periods().len(), 6);
        for row in table.rows() {
            assert_eq!(row.values().count(), Field::ALL.len());
        }
    }

    #[test]
    fn test_rows_are_period_major() {
        let table = generate(1, &districts(), &TimeRange::yearly(2020, 2021));
        let keys: Vec<(String, i32)> = table
            .rows()
            .iter()
            .map(|r| (r.entity.clone(), r.period.year()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Mzuzu".to_string(), 2020),
                ("Zomba".to_string(), 2020),
                ("Mzuzu".to_string(), 2021),
                ("Zomba".to_string(), 2021),
            ]
        );
    }

    #[test]
    fn test_same_seed_same_table() {
        let range = TimeRange::monthly((2021, 1), (2022, 12));
        assert_eq!(generate(7, &districts(), &range), generate(7, &districts(), &range));
        assert_ne!(generate(7, &districts(), &range), generate(8, &districts(), &range));
    }

    #[test]
    fn test_empty_inputs_give_empty_table() {
        assert!(generate(42, &[], &TimeRange::yearly(2020, 2025)).is_empty());
        assert!(generate(42, &districts(), &TimeRange::yearly(2025, 2020)).is_empty());
    }

    #[test]
    fn test_duplicate_entities_generated_once() {
        let mut entities = districts();
        entities.push(entities[0].clone());
        let table = generate(3, &entities, &TimeRange::yearly(2020, 2020));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_same_name_in_two_regions_keeps_first() {
        let entities = vec![Entity::new("North", "Lake"), Entity::new("South", "Lake")];
        let table = generate(1, &entities, &TimeRange::yearly(2020, 2021));
        assert_eq!(table.len(), 2);
        assert!(table.rows().iter().all(|r| r.region == "North"));
        assert!(table.get("Lake", Period::from_year(2020)).is_some());
    }

    #[test]
    fn test_allocations_within_budget() {
        let table = generate(5, &districts(), &TimeRange::yearly(2020, 2022));
        for row in table.rows() {
            let budget = row.get(Field::BudgetAllocated).unwrap();
            let split = row.get(Field::SanitationAllocation).unwrap()
                + row.get(Field::WaterAllocation).unwrap();
            assert!(split <= budget);
        }
    }

    #[test]
    fn test_values_respect_domain_bounds() {
        let table = Preset::MalawiDistricts.entities();
        let table = generate(42, &table, &Preset::MalawiDistricts.range());
        for row in table.rows() {
            for (field, value) in row.values() {
                assert!(value >= 0.0, "{field} negative: {value}");
            }
            let coverage = row.get(Field::SafelyManagedWater).unwrap();
            assert!((0.0..=100.0).contains(&coverage));
            assert!(row.get(Field::TotalConsumption) <= row.get(Field::WaterSupplied));
            assert!(row.get(Field::SewerConnections) <= row.get(Field::Households));
            let quality = Metric::WaterQualityCompliance.compute(row).unwrap();
            assert!((0.0..=100.0).contains(&quality));
        }
    }

    #[test]
    fn test_malawi_preset_shape() {
        let preset = Preset::MalawiDistricts;
        assert_eq!(preset.entities().len(), 12);
        // January 2021 through February 2024.
        assert_eq!(preset.range().periods().count(), 38);
    }

    #[test]
    fn test_cache_reuses_tables() {
        let mut cache = DatasetCache::new();
        let first = cache.preset(Preset::CountryComparison, None);
        let second = cache.preset(Preset::CountryComparison, None);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let reseeded = cache.preset(Preset::CountryComparison, Some(99));
        assert!(!Arc::ptr_eq(&first, &reseeded));
        assert_eq!(cache.len(), 2);
    }
}
