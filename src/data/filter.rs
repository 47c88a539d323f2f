use std::collections::BTreeSet;

use super::model::{ObservationTable, Period, RawObservation};

// ---------------------------------------------------------------------------
// Filter selection: which values are selected per dimension
// ---------------------------------------------------------------------------

/// Per-dimension selection sets.
///
/// A dimension set to `None` is unconstrained. `Some` of an empty set selects
/// nothing, so every row fails. Region and entity constraints combine with
/// AND, as do the year and period constraints.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSelection {
    pub regions: Option<BTreeSet<String>>,
    pub entities: Option<BTreeSet<String>>,
    pub years: Option<BTreeSet<i32>>,
    pub periods: Option<BTreeSet<Period>>,
}

impl FilterSelection {
    /// Every value of every dimension of `table` selected (i.e., show everything).
    pub fn full_domain(table: &ObservationTable) -> Self {
        FilterSelection {
            regions: Some(table.regions().clone()),
            entities: Some(table.entities().clone()),
            years: Some(table.years().clone()),
            periods: Some(table.periods().clone()),
        }
    }

    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = Some(regions.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = Some(entities.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_years(mut self, years: impl IntoIterator<Item = i32>) -> Self {
        self.years = Some(years.into_iter().collect());
        self
    }

    pub fn with_periods(mut self, periods: impl IntoIterator<Item = Period>) -> Self {
        self.periods = Some(periods.into_iter().collect());
        self
    }

    /// Whether any constrained dimension has nothing selected.
    pub fn selects_nothing(&self) -> bool {
        self.regions.as_ref().is_some_and(BTreeSet::is_empty)
            || self.entities.as_ref().is_some_and(BTreeSet::is_empty)
            || self.years.as_ref().is_some_and(BTreeSet::is_empty)
            || self.periods.as_ref().is_some_and(BTreeSet::is_empty)
    }
}

/// Narrow a dimension down to the constraint that actually filters.
///
/// A selection covering the whole domain behaves like no constraint.
fn effective<'a, T: Ord>(
    selected: &'a Option<BTreeSet<T>>,
    domain: &BTreeSet<T>,
) -> Option<&'a BTreeSet<T>> {
    match selected {
        Some(set) if !set.is_empty() && domain.is_subset(set) => None,
        other => other.as_ref(),
    }
}

/// Indices of the rows of `table` that pass `selection`, in table order.
///
/// A row passes a dimension when:
/// * the dimension is unconstrained → passes
/// * the selected set is empty → nothing selected → fails
/// * the row's value is in the selected set → passes
pub fn filtered_indices(table: &ObservationTable, selection: &FilterSelection) -> Vec<usize> {
    if selection.selects_nothing() {
        return Vec::new();
    }
    let regions = effective(&selection.regions, table.regions());
    let entities = effective(&selection.entities, table.entities());
    let years = effective(&selection.years, table.years());
    let periods = effective(&selection.periods, table.periods());

    table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            regions.map_or(true, |set| set.contains(&row.region))
                && entities.map_or(true, |set| set.contains(&row.entity))
                && years.map_or(true, |set| set.contains(&row.period.year()))
                && periods.map_or(true, |set| set.contains(&row.period))
        })
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// FilteredView – the rows of one table that match a selection
// ---------------------------------------------------------------------------

/// Read-only view of the matching rows of a table.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    source: &'a ObservationTable,
    indices: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    pub fn from_indices(source: &'a ObservationTable, indices: Vec<usize>) -> Self {
        FilteredView { source, indices }
    }

    pub fn rows(&self) -> impl Iterator<Item = &'a RawObservation> + '_ {
        let rows = self.source.rows();
        self.indices.iter().map(move |&i| &rows[i])
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Copy the matching rows into a standalone table.
    pub fn to_table(&self) -> ObservationTable {
        ObservationTable::from_rows(self.rows().cloned().collect())
    }
}

/// Filter one table.
pub fn filter<'a>(table: &'a ObservationTable, selection: &FilterSelection) -> FilteredView<'a> {
    let indices = filtered_indices(table, selection);
    log::debug!("filter kept {} of {} rows", indices.len(), table.len());
    FilteredView::from_indices(table, indices)
}

/// Filter several tables independently with the same selection, so joins on
/// the entity key stay consistent.
pub fn filter_all<'a>(
    tables: &[&'a ObservationTable],
    selection: &FilterSelection,
) -> Vec<FilteredView<'a>> {
    tables.iter().map(|table| filter(table, selection)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Field;

    fn table() -> ObservationTable {
        let mut rows = Vec::new();
        for year in [2021, 2022] {
            for (region, entity) in [
                ("Northern Region", "Mzuzu"),
                ("Central Region", "Lilongwe"),
                ("Southern Region", "Zomba"),
            ] {
                rows.push(
                    RawObservation::new(region, entity, Period::from_year(year))
                        .with(Field::ServiceHours, f64::from(year - 2000)),
                );
            }
        }
        ObservationTable::from_rows(rows)
    }

    #[test]
    fn test_unconstrained_selection_keeps_everything() {
        let t = table();
        assert_eq!(filter(&t, &FilterSelection::default()).len(), t.len());
    }

    #[test]
    fn test_full_domain_is_identity() {
        let t = table();
        let view = filter(&t, &FilterSelection::full_domain(&t));
        assert_eq!(view.to_table(), t);
    }

    #[test]
    fn test_empty_entity_set_selects_nothing() {
        let t = table();
        let selection = FilterSelection::default().with_entities(Vec::<String>::new());
        assert!(filter(&t, &selection).is_empty());
    }

    #[test]
    fn test_empty_year_set_selects_nothing() {
        let t = table();
        let selection = FilterSelection::full_domain(&t).with_years([]);
        assert!(filter(&t, &selection).is_empty());
    }

    #[test]
    fn test_region_and_entity_combine_with_and() {
        let t = table();
        let selection = FilterSelection::default()
            .with_regions(["Northern Region", "Southern Region"])
            .with_entities(["Zomba", "Lilongwe"]);
        let view = filter(&t, &selection);
        assert!(view.rows().all(|r| r.entity == "Zomba"));
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn test_preserves_source_order() {
        let t = table();
        let selection = FilterSelection::default()
            .with_entities(["Zomba", "Mzuzu"])
            .with_years([2022]);
        let view = filter(&t, &selection);
        assert_eq!(view.indices(), &[3, 5]);
    }

    #[test]
    fn test_unknown_values_select_nothing() {
        let t = table();
        let selection = FilterSelection::default().with_entities(["Atlantis"]);
        assert!(filter(&t, &selection).is_empty());
    }

    #[test]
    fn test_filter_all_uses_one_entity_set() {
        let a = table();
        let b = ObservationTable::from_rows(vec![
            RawObservation::new("Southern Region", "Zomba", Period::from_year(2023)),
            RawObservation::new("Northern Region", "Karonga", Period::from_year(2023)),
        ]);
        let selection = FilterSelection::default().with_entities(["Zomba"]);
        let views = filter_all(&[&a, &b], &selection);
        assert_eq!(views[0].len(), 2);
        assert_eq!(views[1].len(), 1);
        assert!(views.iter().flat_map(|v| v.rows()).all(|r| r.entity == "Zomba"));
    }
}
