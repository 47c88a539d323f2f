//! Classification rules layered on top of the metric values.

use std::cmp::Ordering;

use super::error::KpiResult;
use super::metric::{group_mean, safe_ratio, GroupBy, GroupKey, Metric};
use super::model::{Field, RawObservation};

/// NRW level considered good practice; reduction potential is measured
/// against it.
pub const NRW_GOOD_PRACTICE_PCT: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NrwOpportunity {
    Low,
    Medium,
    High,
}

impl NrwOpportunity {
    pub fn classify(nrw_pct: f64) -> Self {
        if nrw_pct > 40.0 {
            NrwOpportunity::High
        } else if nrw_pct > 30.0 {
            NrwOpportunity::Medium
        } else {
            NrwOpportunity::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NrwOpportunity::High => "High - Urgent Action Needed",
            NrwOpportunity::Medium => "Medium - Improvement Needed",
            NrwOpportunity::Low => "Low - Good Performance",
        }
    }
}

/// Percentage points of NRW above good practice.
pub fn nrw_reduction_potential(nrw_pct: f64) -> f64 {
    (nrw_pct - NRW_GOOD_PRACTICE_PCT).max(0.0)
}

/// Estimated split of NRW into loss types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NrwComponents {
    pub physical: f64,
    pub commercial: f64,
    pub unauthorised: f64,
}

impl NrwComponents {
    pub fn estimate(nrw_pct: f64) -> Self {
        NrwComponents {
            physical: nrw_pct * 0.6,
            commercial: nrw_pct * 0.3,
            unauthorised: nrw_pct * 0.1,
        }
    }
}

/// How heavily staff costs weigh on the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaffCostVerdict {
    NotConfirmed,
    Confirmed,
    StronglyConfirmed,
}

impl StaffCostVerdict {
    pub const HUGE_PCT: f64 = 40.0;
    pub const VERY_HUGE_PCT: f64 = 60.0;

    pub fn classify(staff_pct: f64) -> Self {
        if staff_pct >= Self::VERY_HUGE_PCT {
            StaffCostVerdict::StronglyConfirmed
        } else if staff_pct >= Self::HUGE_PCT {
            StaffCostVerdict::Confirmed
        } else {
            StaffCostVerdict::NotConfirmed
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StaffCostVerdict::StronglyConfirmed => "STRONGLY CONFIRMED",
            StaffCostVerdict::Confirmed => "CONFIRMED",
            StaffCostVerdict::NotConfirmed => "NOT CONFIRMED",
        }
    }
}

/// Budget lines summed over a set of rows. A line is `None` when no row
/// reports it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BudgetSplit {
    pub budget: Option<f64>,
    pub staff: Option<f64>,
    pub sanitation: Option<f64>,
    pub water: Option<f64>,
}

fn sum_field(rows: &[&RawObservation], field: Field) -> Option<f64> {
    rows.iter()
        .filter_map(|row| row.get(field))
        .fold(None, |total, v| Some(total.unwrap_or(0.0) + v))
}

impl BudgetSplit {
    pub fn total<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a RawObservation>,
    {
        let rows: Vec<&RawObservation> = rows.into_iter().collect();
        BudgetSplit {
            budget: sum_field(&rows, Field::BudgetAllocated),
            staff: sum_field(&rows, Field::StaffCost),
            sanitation: sum_field(&rows, Field::SanitationAllocation),
            water: sum_field(&rows, Field::WaterAllocation),
        }
    }

    /// `line` as a percentage of the allocated budget.
    pub fn share_pct(&self, line: Option<f64>) -> Option<f64> {
        Some(safe_ratio(line?, self.budget?) * 100.0)
    }
}

/// Entities ordered by their mean `metric` value, highest first. Ties keep
/// entity name order.
pub fn rank_entities<'a, I>(metric: Metric, rows: I) -> KpiResult<Vec<(String, f64)>>
where
    I: IntoIterator<Item = &'a RawObservation>,
{
    let mut ranked: Vec<(String, f64)> = group_mean(metric, rows, GroupBy::Entity)?
        .into_iter()
        .filter_map(|(key, value)| match key {
            GroupKey::Entity(name) => Some((name, value)),
            _ => None,
        })
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    Ok(ranked)
}

/// Entity with the highest mean value, if any rows were given.
pub fn leader<'a, I>(metric: Metric, rows: I) -> KpiResult<Option<(String, f64)>>
where
    I: IntoIterator<Item = &'a RawObservation>,
{
    Ok(rank_entities(metric, rows)?.into_iter().next())
}

/// Entity with the lowest mean value, if any rows were given.
pub fn laggard<'a, I>(metric: Metric, rows: I) -> KpiResult<Option<(String, f64)>>
where
    I: IntoIterator<Item = &'a RawObservation>,
{
    Ok(rank_entities(metric, rows)?.pop())
}
