use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use super::error::KpiError;

// ---------------------------------------------------------------------------
// Field – the closed set of raw numeric columns
// ---------------------------------------------------------------------------

/// A raw numeric column of an observation.
///
/// The string form is the column name used by CSV / JSON input and by the
/// sample exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    WaterSupplied,
    TotalConsumption,
    MeteredConsumption,
    WaterBilled,
    SewerBilled,
    WaterRevenue,
    SewerRevenue,
    Opex,
    TestsConductedChlorine,
    TestsPassedChlorine,
    TestsConductedEcoli,
    TestsPassedEcoli,
    Households,
    SewerConnections,
    WastewaterCollected,
    WastewaterTreated,
    Complaints,
    ComplaintsResolved,
    HouseholdsEmptied,
    SludgeTreated,
    StaffCost,
    BudgetAllocated,
    SanitationAllocation,
    WaterAllocation,
    ServiceHours,
    SafelyManagedWater,
    SafelyManagedSanitation,
    CustomerSatisfaction,
}

impl Field {
    pub const ALL: [Field; 28] = [
        Field::WaterSupplied,
        Field::TotalConsumption,
        Field::MeteredConsumption,
        Field::WaterBilled,
        Field::SewerBilled,
        Field::WaterRevenue,
        Field::SewerRevenue,
        Field::Opex,
        Field::TestsConductedChlorine,
        Field::TestsPassedChlorine,
        Field::TestsConductedEcoli,
        Field::TestsPassedEcoli,
        Field::Households,
        Field::SewerConnections,
        Field::WastewaterCollected,
        Field::WastewaterTreated,
        Field::Complaints,
        Field::ComplaintsResolved,
        Field::HouseholdsEmptied,
        Field::SludgeTreated,
        Field::StaffCost,
        Field::BudgetAllocated,
        Field::SanitationAllocation,
        Field::WaterAllocation,
        Field::ServiceHours,
        Field::SafelyManagedWater,
        Field::SafelyManagedSanitation,
        Field::CustomerSatisfaction,
    ];

    /// Column name as it appears in input files.
    pub fn column_name(self) -> &'static str {
        match self {
            Field::WaterSupplied => "w_supplied",
            Field::TotalConsumption => "total_consumption",
            Field::MeteredConsumption => "metered",
            Field::WaterBilled => "water_billed",
            Field::SewerBilled => "sewer_billed",
            Field::WaterRevenue => "water_revenue",
            Field::SewerRevenue => "sewer_revenue",
            Field::Opex => "opex",
            Field::TestsConductedChlorine => "tests_conducted_chlorine",
            Field::TestsPassedChlorine => "tests_passed_chlorine",
            Field::TestsConductedEcoli => "tests_conducted_ecoli",
            Field::TestsPassedEcoli => "tests_passed_ecoli",
            Field::Households => "households",
            Field::SewerConnections => "sewer_connections",
            Field::WastewaterCollected => "ww_collected",
            Field::WastewaterTreated => "ww_treated",
            Field::Complaints => "complaints",
            Field::ComplaintsResolved => "resolved",
            Field::HouseholdsEmptied => "hh_emptied",
            Field::SludgeTreated => "fs_treated",
            Field::StaffCost => "staff_cost",
            Field::BudgetAllocated => "budget_allocated",
            Field::SanitationAllocation => "san_allocation",
            Field::WaterAllocation => "wat_allocation",
            Field::ServiceHours => "service_hours",
            Field::SafelyManagedWater => "safely_managed_water_pct",
            Field::SafelyManagedSanitation => "safely_managed_sanitation_pct",
            Field::CustomerSatisfaction => "customer_satisfaction_pct",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for Field {
    type Err = KpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.column_name() == name)
            .ok_or_else(|| KpiError::UnknownField(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Period – the time key of an observation
// ---------------------------------------------------------------------------

/// A calendar year, or a calendar month within a year.
///
/// Ordering is chronological; a whole-year period sorts before the months of
/// the same year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: Option<u32>,
}

impl Period {
    pub fn from_year(year: i32) -> Self {
        Period { year, month: None }
    }

    /// `None` unless `month` is within 1..=12.
    pub fn from_ym_opt(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Period {
            year,
            month: Some(month),
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> Option<u32> {
        self.month
    }

    /// First day of the period.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), 1)
    }

    /// The following period at the same granularity, `None` past `i32::MAX`.
    pub fn succ(&self) -> Option<Self> {
        match self.month {
            None => self.year.checked_add(1).map(Period::from_year),
            Some(12) => self.year.checked_add(1).map(|year| Period {
                year,
                month: Some(1),
            }),
            Some(m) => Some(Period {
                year: self.year,
                month: Some(m + 1),
            }),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.month {
            Some(m) => write!(f, "{}-{m:02}", self.year),
            None => write!(f, "{}", self.year),
        }
    }
}

impl From<NaiveDate> for Period {
    fn from(date: NaiveDate) -> Self {
        Period {
            year: date.year(),
            month: Some(date.month()),
        }
    }
}

impl FromStr for Period {
    type Err = KpiError;

    /// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD` and a trailing time part
    /// (`YYYY-MM-DD hh:mm:ss`), which is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || KpiError::InvalidPeriod(text.to_string());
        let date_part = text.split([' ', 'T']).next().unwrap_or("");

        if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
            return Ok(Period::from(date));
        }
        let mut parts = date_part.split('-');
        let year: i32 = parts
            .next()
            .filter(|y| !y.is_empty())
            .and_then(|y| y.parse().ok())
            .ok_or_else(invalid)?;
        match (parts.next(), parts.next()) {
            (None, _) => Ok(Period::from_year(year)),
            (Some(m), None) => {
                let month: u32 = m.parse().map_err(|_| invalid())?;
                Period::from_ym_opt(year, month).ok_or_else(invalid)
            }
            _ => Err(invalid()),
        }
    }
}

// ---------------------------------------------------------------------------
// TimeRange – inclusive range of periods at one granularity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Monthly,
    Yearly,
}

/// Inclusive range of periods. A start after the end gives an empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    start: Period,
    end: Period,
    granularity: Granularity,
}

impl TimeRange {
    pub fn yearly(start_year: i32, end_year: i32) -> Self {
        TimeRange {
            start: Period::from_year(start_year),
            end: Period::from_year(end_year),
            granularity: Granularity::Yearly,
        }
    }

    /// Monthly range from `(year, month)` to `(year, month)` inclusive.
    ///
    /// An out-of-range month on either end yields an empty range.
    pub fn monthly(start: (i32, u32), end: (i32, u32)) -> Self {
        match (
            Period::from_ym_opt(start.0, start.1),
            Period::from_ym_opt(end.0, end.1),
        ) {
            (Some(start), Some(end)) => TimeRange {
                start,
                end,
                granularity: Granularity::Monthly,
            },
            _ => {
                log::warn!("invalid monthly range {start:?}..={end:?}, treating as empty");
                TimeRange::empty()
            }
        }
    }

    pub fn empty() -> Self {
        // 1..=12 is valid, start > end makes the iterator yield nothing.
        TimeRange {
            start: Period {
                year: 1,
                month: Some(1),
            },
            end: Period {
                year: 0,
                month: Some(12),
            },
            granularity: Granularity::Monthly,
        }
    }

    pub fn start(&self) -> Period {
        self.start
    }

    pub fn end(&self) -> Period {
        self.end
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn periods(&self) -> Periods {
        Periods {
            next: Some(self.start),
            end: self.end,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

/// Iterator over the periods of a [`TimeRange`].
#[derive(Debug, Clone)]
pub struct Periods {
    next: Option<Period>,
    end: Period,
}

impl Iterator for Periods {
    type Item = Period;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.filter(|p| *p <= self.end)?;
        self.next = current.succ();
        Some(current)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A district, city or country together with the region it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    pub region: String,
    pub name: String,
}

impl Entity {
    pub fn new(region: impl Into<String>, name: impl Into<String>) -> Self {
        Entity {
            region: region.into(),
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RawObservation – one row: (entity, period) → raw fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub region: String,
    pub entity: String,
    pub period: Period,
    values: BTreeMap<Field, f64>,
}

impl RawObservation {
    pub fn new(region: impl Into<String>, entity: impl Into<String>, period: Period) -> Self {
        RawObservation {
            region: region.into(),
            entity: entity.into(),
            period,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style setter used while a row is being assembled.
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.values.insert(field, value);
        self
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.values.get(&field).copied()
    }

    /// Fields present on this row, in `Field` order.
    pub fn values(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        self.values.iter().map(|(f, v)| (*f, *v))
    }
}

// ---------------------------------------------------------------------------
// ObservationTable – rows plus the domain of every filter dimension
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObservationTable {
    rows: Vec<RawObservation>,
    regions: BTreeSet<String>,
    entities: BTreeSet<String>,
    years: BTreeSet<i32>,
    periods: BTreeSet<Period>,
}

impl ObservationTable {
    /// Build the dimension indices from the rows, keeping row order.
    pub fn from_rows(rows: Vec<RawObservation>) -> Self {
        let mut regions = BTreeSet::new();
        let mut entities = BTreeSet::new();
        let mut years = BTreeSet::new();
        let mut periods = BTreeSet::new();

        for row in &rows {
            regions.insert(row.region.clone());
            entities.insert(row.entity.clone());
            years.insert(row.period.year());
            periods.insert(row.period);
        }
        ObservationTable {
            rows,
            regions,
            entities,
            years,
            periods,
        }
    }

    pub fn rows(&self) -> &[RawObservation] {
        &self.rows
    }

    pub fn regions(&self) -> &BTreeSet<String> {
        &self.regions
    }

    pub fn entities(&self) -> &BTreeSet<String> {
        &self.entities
    }

    pub fn years(&self) -> &BTreeSet<i32> {
        &self.years
    }

    pub fn periods(&self) -> &BTreeSet<Period> {
        &self.periods
    }

    /// Look up the row for an (entity, period) key.
    pub fn get(&self, entity: &str, period: Period) -> Option<&RawObservation> {
        self.rows
            .iter()
            .find(|row| row.entity == entity && row.period == period)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
