use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use water_dash::config::DashboardConfig;
use water_dash::data::filter::{filtered_indices, FilterSelection, FilteredView};
use water_dash::data::loader;
use water_dash::data::model::ObservationTable;
use water_dash::data::synthetic::{DatasetCache, Preset};
use water_dash::nav::{NavAction, View};

use crate::color::ColorMap;

// ---------------------------------------------------------------------------
// Filter dimensions shown in the side panel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Region,
    Entity,
    Year,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Region, Dimension::Entity, Dimension::Year];

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Region => "Regions",
            Dimension::Entity => "Districts / countries",
            Dimension::Year => "Years",
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: DashboardConfig,

    /// Generated tables, reused when a preset is picked again.
    cache: DatasetCache,

    /// Table currently shown.
    pub table: Arc<ObservationTable>,

    /// Where `table` came from, for the top bar.
    pub source: String,

    /// Region / entity / year selection.
    pub selection: FilterSelection,

    /// Indices of rows passing the current selection (cached).
    pub visible_indices: Vec<usize>,

    pub view: View,

    pub color_map: ColorMap,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        let mut state = AppState {
            config,
            cache: DatasetCache::new(),
            table: Arc::new(ObservationTable::default()),
            source: String::new(),
            selection: FilterSelection::default(),
            visible_indices: Vec::new(),
            view: View::default(),
            color_map: ColorMap::default(),
            status_message: None,
        };

        match state.config.data_file.clone() {
            Some(path) => match loader::load_optional(&path) {
                Ok(Some(table)) => state.set_table(Arc::new(table), path.display().to_string()),
                Ok(None) => {
                    state.load_preset(state.config.preset);
                    state.status_message =
                        Some(format!("{} not found, showing synthetic data", path.display()));
                }
                Err(e) => {
                    log::error!("Failed to load {}: {e:#}", path.display());
                    state.load_preset(state.config.preset);
                    state.status_message = Some(format!("Error: {e:#}"));
                }
            },
            None => state.load_preset(state.config.preset),
        }
        state
    }

    /// Show a new table with every region, entity and year selected.
    pub fn set_table(&mut self, table: Arc<ObservationTable>, source: String) {
        self.selection = FilterSelection::full_domain(&table);
        self.visible_indices = (0..table.len()).collect();
        self.color_map = ColorMap::new(table.entities());
        self.table = table;
        self.source = source;
        self.status_message = None;
    }

    /// Switch to a synthetic preset, generating it on first use.
    pub fn load_preset(&mut self, preset: Preset) {
        self.config.preset = preset;
        let seed = self.config.seed();
        let table = self.cache.preset(preset, Some(seed));
        self.set_table(table, format!("{} (synthetic, seed {seed})", preset.label()));
    }

    /// Load observations from a file chosen by the user.
    pub fn open_file(&mut self, path: &Path) {
        match loader::load_file(path) {
            Ok(table) => self.set_table(Arc::new(table), path.display().to_string()),
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Write the rows passing the current selection as CSV.
    pub fn export_visible(&mut self, path: &Path) {
        let table = self.visible().to_table();
        match loader::write_csv(path, &table) {
            Ok(()) => {
                log::info!("exported {} rows to {}", table.len(), path.display());
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Failed to export: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Recompute `visible_indices` after a selection change.
    pub fn refilter(&mut self) {
        self.visible_indices = filtered_indices(&self.table, &self.selection);
    }

    /// Rows passing the current selection.
    pub fn visible(&self) -> FilteredView<'_> {
        FilteredView::from_indices(&self.table, self.visible_indices.clone())
    }

    /// Entities with at least one visible row.
    pub fn visible_entities(&self) -> BTreeSet<&str> {
        self.visible().rows().map(|r| r.entity.as_str()).collect()
    }

    pub fn navigate(&mut self, action: NavAction) {
        self.view = self.view.apply(action);
    }

    // ---- selection editing ----

    /// All values of a dimension in the current table, as labels.
    pub fn domain(&self, dim: Dimension) -> Vec<String> {
        match dim {
            Dimension::Region => self.table.regions().iter().cloned().collect(),
            Dimension::Entity => self.table.entities().iter().cloned().collect(),
            Dimension::Year => self.table.years().iter().map(i32::to_string).collect(),
        }
    }

    pub fn is_selected(&self, dim: Dimension, value: &str) -> bool {
        match dim {
            Dimension::Region => contains(&self.selection.regions, value),
            Dimension::Entity => contains(&self.selection.entities, value),
            Dimension::Year => match (&self.selection.years, value.parse::<i32>()) {
                (None, _) => true,
                (Some(set), Ok(year)) => set.contains(&year),
                (Some(_), Err(_)) => false,
            },
        }
    }

    pub fn selected_count(&self, dim: Dimension) -> usize {
        self.domain(dim)
            .iter()
            .filter(|v| self.is_selected(dim, v))
            .count()
    }

    /// Toggle a single value of a dimension.
    pub fn toggle_filter_value(&mut self, dim: Dimension, value: &str) {
        let on = !self.is_selected(dim, value);
        match dim {
            Dimension::Region => {
                let set = self
                    .selection
                    .regions
                    .get_or_insert_with(|| self.table.regions().clone());
                toggle(set, value.to_string(), on);
            }
            Dimension::Entity => {
                let set = self
                    .selection
                    .entities
                    .get_or_insert_with(|| self.table.entities().clone());
                toggle(set, value.to_string(), on);
            }
            Dimension::Year => {
                let Ok(year) = value.parse::<i32>() else {
                    return;
                };
                let set = self
                    .selection
                    .years
                    .get_or_insert_with(|| self.table.years().clone());
                toggle(set, year, on);
            }
        }
        self.refilter();
    }

    /// Select all values in a dimension.
    pub fn select_all(&mut self, dim: Dimension) {
        match dim {
            Dimension::Region => self.selection.regions = Some(self.table.regions().clone()),
            Dimension::Entity => self.selection.entities = Some(self.table.entities().clone()),
            Dimension::Year => self.selection.years = Some(self.table.years().clone()),
        }
        self.refilter();
    }

    /// Deselect all values in a dimension.
    pub fn select_none(&mut self, dim: Dimension) {
        match dim {
            Dimension::Region => self.selection.regions = Some(BTreeSet::new()),
            Dimension::Entity => self.selection.entities = Some(BTreeSet::new()),
            Dimension::Year => self.selection.years = Some(BTreeSet::new()),
        }
        self.refilter();
    }
}

fn contains(set: &Option<BTreeSet<String>>, value: &str) -> bool {
    set.as_ref().map_or(true, |s| s.contains(value))
}

fn toggle<T: Ord>(set: &mut BTreeSet<T>, value: T, on: bool) {
    if on {
        set.insert(value);
    } else {
        set.remove(&value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(DashboardConfig::default())
    }

    #[test]
    fn test_starts_with_everything_visible() {
        let s = state();
        assert_eq!(s.visible_indices.len(), s.table.len());
        assert_eq!(s.selected_count(Dimension::Entity), 12);
        assert_eq!(s.view, View::Overview);
    }

    #[test]
    fn test_select_none_hides_all_rows() {
        let mut s = state();
        s.select_none(Dimension::Year);
        assert!(s.visible_indices.is_empty());
        s.select_all(Dimension::Year);
        assert_eq!(s.visible_indices.len(), s.table.len());
    }

    #[test]
    fn test_toggle_entity() {
        let mut s = state();
        s.select_none(Dimension::Entity);
        s.toggle_filter_value(Dimension::Entity, "Zomba");
        assert_eq!(s.visible_entities(), BTreeSet::from(["Zomba"]));
        s.toggle_filter_value(Dimension::Entity, "Zomba");
        assert!(s.visible_entities().is_empty());
    }

    #[test]
    fn test_export_writes_only_visible_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filtered.csv");
        let mut s = state();
        s.select_none(Dimension::Entity);
        s.toggle_filter_value(Dimension::Entity, "Zomba");
        s.export_visible(&path);
        assert_eq!(s.status_message, None);

        let exported = loader::load_file(&path).unwrap();
        assert_eq!(exported.len(), s.visible_indices.len());
        assert_eq!(exported.entities().len(), 1);

        s.export_visible(&dir.path().join("missing").join("out.csv"));
        assert!(s.status_message.is_some());
    }

    #[test]
    fn test_preset_switch_resets_selection() {
        let mut s = state();
        s.select_none(Dimension::Region);
        s.load_preset(Preset::CountryComparison);
        assert_eq!(s.selected_count(Dimension::Entity), 4);
        assert_eq!(s.visible_indices.len(), s.table.len());
    }
}
