use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{KpiError, KpiResult};
use super::model::{Field, Period, RawObservation};

// ---------------------------------------------------------------------------
// Ratio helpers
// ---------------------------------------------------------------------------

/// `numerator / denominator`, or `0.0` when the denominator is zero or the
/// quotient is not finite.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// Arithmetic mean; `0.0` for an empty slice.
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

// ---------------------------------------------------------------------------
// Formula building blocks
// ---------------------------------------------------------------------------

/// One side of a metric formula, evaluated against a single row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Term {
    /// Sum of the listed fields.
    Sum(&'static [Field]),
    /// `minuend - subtrahend`.
    Difference(Field, Field),
    /// `max(minuend - subtrahend, floor)`.
    FlooredDifference(Field, Field, f64),
    /// Constant one; used by pass-through indicators.
    Unit,
}

impl Term {
    fn eval(&self, metric: Metric, row: &RawObservation) -> KpiResult<f64> {
        let need = |field: Field| {
            row.get(field).ok_or_else(|| KpiError::MissingField {
                metric: metric.key(),
                field,
                entity: row.entity.clone(),
                period: row.period,
            })
        };
        match *self {
            Term::Sum(fields) => fields.iter().map(|f| need(*f)).sum(),
            Term::Difference(a, b) => Ok(need(a)? - need(b)?),
            Term::FlooredDifference(a, b, floor) => Ok((need(a)? - need(b)?).max(floor)),
            Term::Unit => Ok(1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Percent,
    HoursPerDay,
}

impl Unit {
    pub fn suffix(self) -> &'static str {
        match self {
            Unit::Percent => "%",
            Unit::HoursPerDay => " hrs",
        }
    }
}

/// Static description of a metric: `clip((numerator / denominator) * scale)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricDef {
    pub key: &'static str,
    pub label: &'static str,
    pub unit: Unit,
    pub numerator: Term,
    pub denominator: Term,
    pub scale: f64,
    pub clip: Option<(f64, f64)>,
}

// ---------------------------------------------------------------------------
// Metric catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    NonRevenueWater,
    OperatingCostCoverage,
    CollectionEfficiency,
    WaterQualityCompliance,
    MeteringRatio,
    SewerCoverage,
    StaffCostShare,
    WastewaterTreated,
    ComplaintResolution,
    SludgeEmptied,
    SludgeTreated,
    ServiceHours,
    SafelyManagedWater,
    SafelyManagedSanitation,
    CustomerSatisfaction,
}

const REVENUE: &[Field] = &[Field::WaterRevenue, Field::SewerRevenue];
const BILLED: &[Field] = &[Field::WaterBilled, Field::SewerBilled];
const TESTS_PASSED: &[Field] = &[Field::TestsPassedChlorine, Field::TestsPassedEcoli];
const TESTS_CONDUCTED: &[Field] = &[Field::TestsConductedChlorine, Field::TestsConductedEcoli];

const PERCENT_BOUNDS: Option<(f64, f64)> = Some((0.0, 100.0));

fn percent(
    key: &'static str,
    label: &'static str,
    numerator: Term,
    denominator: Term,
    clip: Option<(f64, f64)>,
) -> MetricDef {
    MetricDef {
        key,
        label,
        unit: Unit::Percent,
        numerator,
        denominator,
        scale: 100.0,
        clip,
    }
}

fn direct(
    key: &'static str,
    label: &'static str,
    field: &'static [Field],
    unit: Unit,
    clip: Option<(f64, f64)>,
) -> MetricDef {
    MetricDef {
        key,
        label,
        unit,
        numerator: Term::Sum(field),
        denominator: Term::Unit,
        scale: 1.0,
        clip,
    }
}

impl Metric {
    pub const ALL: [Metric; 15] = [
        Metric::NonRevenueWater,
        Metric::OperatingCostCoverage,
        Metric::CollectionEfficiency,
        Metric::WaterQualityCompliance,
        Metric::MeteringRatio,
        Metric::SewerCoverage,
        Metric::StaffCostShare,
        Metric::WastewaterTreated,
        Metric::ComplaintResolution,
        Metric::SludgeEmptied,
        Metric::SludgeTreated,
        Metric::ServiceHours,
        Metric::SafelyManagedWater,
        Metric::SafelyManagedSanitation,
        Metric::CustomerSatisfaction,
    ];

    pub fn definition(self) -> MetricDef {
        match self {
            // NRW and cost coverage stay unclipped: values outside 0..=100
            // point at inconsistent input and are shown as they are.
            Metric::NonRevenueWater => percent(
                "nrw_pct",
                "Non-Revenue Water",
                Term::Difference(Field::WaterSupplied, Field::TotalConsumption),
                Term::Sum(&[Field::WaterSupplied]),
                None,
            ),
            Metric::OperatingCostCoverage => percent(
                "occr_pct",
                "Operating Cost Coverage",
                Term::Sum(REVENUE),
                Term::Sum(&[Field::Opex]),
                None,
            ),
            Metric::CollectionEfficiency => percent(
                "collection_efficiency_pct",
                "Collection Efficiency",
                Term::Sum(REVENUE),
                Term::Sum(BILLED),
                None,
            ),
            Metric::WaterQualityCompliance => percent(
                "water_quality_compliance_pct",
                "Water Quality Compliance",
                Term::Sum(TESTS_PASSED),
                Term::Sum(TESTS_CONDUCTED),
                PERCENT_BOUNDS,
            ),
            Metric::MeteringRatio => percent(
                "metering_ratio_pct",
                "Metering Ratio",
                Term::Sum(&[Field::MeteredConsumption]),
                Term::Sum(&[Field::TotalConsumption]),
                None,
            ),
            Metric::SewerCoverage => percent(
                "sewer_coverage_pct",
                "Sewer Coverage",
                Term::Sum(&[Field::SewerConnections]),
                Term::Sum(&[Field::Households]),
                PERCENT_BOUNDS,
            ),
            Metric::StaffCostShare => percent(
                "staff_cost_pct",
                "Staff Cost % of Budget",
                Term::Sum(&[Field::StaffCost]),
                Term::Sum(&[Field::BudgetAllocated]),
                None,
            ),
            Metric::WastewaterTreated => percent(
                "ww_treated_pct",
                "Wastewater Safely Treated",
                Term::Sum(&[Field::WastewaterTreated]),
                Term::Sum(&[Field::WastewaterCollected]),
                PERCENT_BOUNDS,
            ),
            Metric::ComplaintResolution => percent(
                "complaint_resolution_pct",
                "Complaint Resolution",
                Term::Sum(&[Field::ComplaintsResolved]),
                Term::Sum(&[Field::Complaints]),
                PERCENT_BOUNDS,
            ),
            Metric::SludgeEmptied => percent(
                "fs_emptied_pct",
                "Fecal Sludge Emptied",
                Term::Sum(&[Field::HouseholdsEmptied]),
                Term::FlooredDifference(Field::Households, Field::SewerConnections, 1.0),
                None,
            ),
            Metric::SludgeTreated => percent(
                "fs_treated_pct",
                "Fecal Sludge Treated",
                Term::Sum(&[Field::SludgeTreated]),
                Term::Sum(&[Field::HouseholdsEmptied]),
                Some((0.0, 200.0)),
            ),
            Metric::ServiceHours => direct(
                "service_hours",
                "Service Hours",
                &[Field::ServiceHours],
                Unit::HoursPerDay,
                Some((0.0, 24.0)),
            ),
            Metric::SafelyManagedWater => direct(
                "safely_managed_water_pct",
                "Safely Managed Water",
                &[Field::SafelyManagedWater],
                Unit::Percent,
                PERCENT_BOUNDS,
            ),
            Metric::SafelyManagedSanitation => direct(
                "safely_managed_sanitation_pct",
                "Safely Managed Sanitation",
                &[Field::SafelyManagedSanitation],
                Unit::Percent,
                PERCENT_BOUNDS,
            ),
            Metric::CustomerSatisfaction => direct(
                "customer_satisfaction_pct",
                "Customer Satisfaction",
                &[Field::CustomerSatisfaction],
                Unit::Percent,
                PERCENT_BOUNDS,
            ),
        }
    }

    pub fn key(self) -> &'static str {
        self.definition().key
    }

    pub fn label(self) -> &'static str {
        self.definition().label
    }

    pub fn unit(self) -> Unit {
        self.definition().unit
    }

    /// Value of this metric for a single row.
    pub fn compute(self, row: &RawObservation) -> KpiResult<f64> {
        let def = self.definition();
        let numerator = def.numerator.eval(self, row)?;
        let denominator = def.denominator.eval(self, row)?;
        Ok(def.finish(numerator, denominator))
    }

    /// Aggregate this metric over several rows.
    ///
    /// An empty input gives `0.0`.
    pub fn aggregate<'a, I>(self, rows: I, mode: Aggregation) -> KpiResult<f64>
    where
        I: IntoIterator<Item = &'a RawObservation>,
    {
        match mode {
            Aggregation::MeanOfRatios => {
                let values = rows
                    .into_iter()
                    .map(|row| self.compute(row))
                    .collect::<KpiResult<Vec<f64>>>()?;
                Ok(average(&values))
            }
            Aggregation::RatioOfSums => {
                let def = self.definition();
                let (mut numerator, mut denominator) = (0.0, 0.0);
                for row in rows {
                    numerator += def.numerator.eval(self, row)?;
                    denominator += def.denominator.eval(self, row)?;
                }
                Ok(def.finish(numerator, denominator))
            }
        }
    }
}

impl MetricDef {
    fn finish(&self, numerator: f64, denominator: f64) -> f64 {
        let value = safe_ratio(numerator, denominator) * self.scale;
        match self.clip {
            Some((lo, hi)) => value.clamp(lo, hi),
            None => value,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = KpiError;

    /// Accepts catalog keys (`nrw_pct`) and the dashboard's KPI page keys
    /// (`NRW`, `COST_RECOVERY`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        let alias = match key {
            "NRW" => Some(Metric::NonRevenueWater),
            "COST_RECOVERY" => Some(Metric::OperatingCostCoverage),
            "COLLECTION_EFFICIENCY" => Some(Metric::CollectionEfficiency),
            "WATER_QUALITY" => Some(Metric::WaterQualityCompliance),
            "WATER_COVERAGE" => Some(Metric::SafelyManagedWater),
            "SANITATION_COVERAGE" => Some(Metric::SafelyManagedSanitation),
            "SERVICE_HOURS" => Some(Metric::ServiceHours),
            "CUSTOMER_SATISFACTION" => Some(Metric::CustomerSatisfaction),
            _ => None,
        };
        alias
            .or_else(|| Metric::ALL.iter().copied().find(|m| m.key() == key))
            .ok_or_else(|| KpiError::UnknownMetric(key.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Aggregation across rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Mean of the per-row metric values.
    #[default]
    MeanOfRatios,
    /// Pooled numerator over pooled denominator.
    RatioOfSums,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Region,
    Entity,
    Year,
    Period,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    Region(String),
    Entity(String),
    Year(i32),
    Period(Period),
}

impl GroupKey {
    fn of(row: &RawObservation, by: GroupBy) -> Self {
        match by {
            GroupBy::Region => GroupKey::Region(row.region.clone()),
            GroupBy::Entity => GroupKey::Entity(row.entity.clone()),
            GroupBy::Year => GroupKey::Year(row.period.year()),
            GroupBy::Period => GroupKey::Period(row.period),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Region(s) | GroupKey::Entity(s) => f.write_str(s),
            GroupKey::Year(y) => write!(f, "{y}"),
            GroupKey::Period(p) => write!(f, "{p}"),
        }
    }
}

/// Aggregate `metric` separately for each group of rows.
pub fn group_aggregate<'a, I>(
    metric: Metric,
    rows: I,
    by: GroupBy,
    mode: Aggregation,
) -> KpiResult<BTreeMap<GroupKey, f64>>
where
    I: IntoIterator<Item = &'a RawObservation>,
{
    let mut groups: BTreeMap<GroupKey, Vec<&RawObservation>> = BTreeMap::new();
    for row in rows {
        groups.entry(GroupKey::of(row, by)).or_default().push(row);
    }
    groups
        .into_iter()
        .map(|(key, members)| Ok((key, metric.aggregate(members, mode)?)))
        .collect()
}

/// Group mean of the per-row values.
pub fn group_mean<'a, I>(metric: Metric, rows: I, by: GroupBy) -> KpiResult<BTreeMap<GroupKey, f64>>
where
    I: IntoIterator<Item = &'a RawObservation>,
{
    group_aggregate(metric, rows, by, Aggregation::MeanOfRatios)
}

/// Per-entity time series of `metric`, each sorted by period.
pub fn entity_series<'a, I>(metric: Metric, rows: I) -> KpiResult<BTreeMap<String, Vec<(Period, f64)>>>
where
    I: IntoIterator<Item = &'a RawObservation>,
{
    let mut series: BTreeMap<String, Vec<(Period, f64)>> = BTreeMap::new();
    for row in rows {
        let value = metric.compute(row)?;
        series
            .entry(row.entity.clone())
            .or_default()
            .push((row.period, value));
    }
    for points in series.values_mut() {
        points.sort_by_key(|(period, _)| *period);
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(entity: &str) -> RawObservation {
        RawObservation::new("Southern Region", entity, Period::from_year(2023))
    }

    #[test]
    fn test_nrw_example_and_zero_supply() {
        let a = row("A")
            .with(Field::WaterSupplied, 1000.0)
            .with(Field::TotalConsumption, 800.0);
        let b = row("B")
            .with(Field::WaterSupplied, 0.0)
            .with(Field::TotalConsumption, 0.0);
        assert_eq!(Metric::NonRevenueWater.compute(&a), Ok(20.0));
        assert_eq!(Metric::NonRevenueWater.compute(&b), Ok(0.0));
    }

    #[test]
    fn test_nrw_is_not_clipped() {
        let r = row("A")
            .with(Field::WaterSupplied, 100.0)
            .with(Field::TotalConsumption, 150.0);
        assert_eq!(Metric::NonRevenueWater.compute(&r), Ok(-50.0));
    }

    #[test]
    fn test_quality_compliance_zero_tests() {
        let r = row("A")
            .with(Field::TestsConductedChlorine, 0.0)
            .with(Field::TestsPassedChlorine, 0.0)
            .with(Field::TestsConductedEcoli, 0.0)
            .with(Field::TestsPassedEcoli, 0.0);
        assert_eq!(Metric::WaterQualityCompliance.compute(&r), Ok(0.0));
    }

    #[test]
    fn test_quality_compliance_is_clipped() {
        let r = row("A")
            .with(Field::TestsConductedChlorine, 10.0)
            .with(Field::TestsPassedChlorine, 30.0)
            .with(Field::TestsConductedEcoli, 10.0)
            .with(Field::TestsPassedEcoli, 10.0);
        assert_eq!(Metric::WaterQualityCompliance.compute(&r), Ok(100.0));
    }

    #[test]
    fn test_financial_ratios_sum_revenue_streams() {
        let r = row("A")
            .with(Field::WaterRevenue, 90.0)
            .with(Field::SewerRevenue, 30.0)
            .with(Field::WaterBilled, 100.0)
            .with(Field::SewerBilled, 50.0)
            .with(Field::Opex, 100.0);
        assert_eq!(Metric::OperatingCostCoverage.compute(&r), Ok(120.0));
        assert_eq!(Metric::CollectionEfficiency.compute(&r), Ok(80.0));
    }

    #[test]
    fn test_sludge_emptied_floors_non_sewered_households() {
        let r = row("A")
            .with(Field::Households, 100.0)
            .with(Field::SewerConnections, 100.0)
            .with(Field::HouseholdsEmptied, 3.0);
        assert_eq!(Metric::SludgeEmptied.compute(&r), Ok(300.0));
    }

    #[test]
    fn test_missing_field_is_reported() {
        let r = row("A").with(Field::WaterSupplied, 10.0);
        let err = Metric::NonRevenueWater.compute(&r).unwrap_err();
        assert_eq!(
            err,
            KpiError::MissingField {
                metric: "nrw_pct",
                field: Field::TotalConsumption,
                entity: "A".to_string(),
                period: Period::from_year(2023),
            }
        );
    }

    #[test]
    fn test_compute_does_not_mutate_row() {
        let r = row("A")
            .with(Field::StaffCost, 40.0)
            .with(Field::BudgetAllocated, 100.0);
        let before = r.clone();
        assert_eq!(Metric::StaffCostShare.compute(&r), Ok(40.0));
        assert_eq!(r, before);
    }

    #[test]
    fn test_aggregation_modes_differ() {
        let rows = vec![
            row("A")
                .with(Field::StaffCost, 10.0)
                .with(Field::BudgetAllocated, 100.0),
            row("B")
                .with(Field::StaffCost, 90.0)
                .with(Field::BudgetAllocated, 100.0),
            row("C")
                .with(Field::StaffCost, 100.0)
                .with(Field::BudgetAllocated, 800.0),
        ];
        let mean = Metric::StaffCostShare
            .aggregate(&rows, Aggregation::MeanOfRatios)
            .unwrap();
        let pooled = Metric::StaffCostShare
            .aggregate(&rows, Aggregation::RatioOfSums)
            .unwrap();
        assert!((mean - 37.5).abs() < 1e-9);
        assert!((pooled - 20.0).abs() < 1e-9);
        assert_eq!(
            Metric::StaffCostShare.aggregate(&Vec::<RawObservation>::new(), Aggregation::RatioOfSums),
            Ok(0.0)
        );
    }

    #[test]
    fn test_metric_keys_and_aliases() {
        for metric in Metric::ALL {
            assert_eq!(metric.key().parse::<Metric>(), Ok(metric));
        }
        assert_eq!("NRW".parse::<Metric>(), Ok(Metric::NonRevenueWater));
        assert_eq!("COST_RECOVERY".parse::<Metric>(), Ok(Metric::OperatingCostCoverage));
        assert!(matches!(
            "bogus".parse::<Metric>(),
            Err(KpiError::UnknownMetric(_))
        ));
    }

    #[test]
    fn test_group_mean_by_region() {
        let rows = vec![
            RawObservation::new("North", "Mzuzu", Period::from_year(2022))
                .with(Field::ServiceHours, 10.0),
            RawObservation::new("North", "Karonga", Period::from_year(2022))
                .with(Field::ServiceHours, 14.0),
            RawObservation::new("South", "Zomba", Period::from_year(2022))
                .with(Field::ServiceHours, 20.0),
        ];
        let means = group_mean(Metric::ServiceHours, &rows, GroupBy::Region).unwrap();
        assert_eq!(means.get(&GroupKey::Region("North".into())), Some(&12.0));
        assert_eq!(means.get(&GroupKey::Region("South".into())), Some(&20.0));
    }

    #[test]
    fn test_entity_series_sorted_by_period() {
        let rows = vec![
            RawObservation::new("North", "Mzuzu", Period::from_year(2023))
                .with(Field::ServiceHours, 12.0),
            RawObservation::new("North", "Mzuzu", Period::from_year(2021))
                .with(Field::ServiceHours, 8.0),
        ];
        let series = entity_series(Metric::ServiceHours, &rows).unwrap();
        let points = &series["Mzuzu"];
        assert_eq!(points[0], (Period::from_year(2021), 8.0));
        assert_eq!(points[1], (Period::from_year(2023), 12.0));
    }
}
