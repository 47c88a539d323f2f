use crate::data::error::KpiResult;
use crate::data::metric::Metric;

/// Which page the dashboard is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Overview,
    Detail(Metric),
}

/// A navigation request raised by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    ShowDetail(Metric),
    BackToOverview,
}

impl NavAction {
    /// Resolve a KPI page key (`NRW`, `nrw_pct`, ...) to a detail action.
    pub fn from_key(key: &str) -> KpiResult<Self> {
        Ok(NavAction::ShowDetail(key.parse()?))
    }
}

impl View {
    pub fn apply(self, action: NavAction) -> View {
        let next = match action {
            NavAction::ShowDetail(metric) => View::Detail(metric),
            NavAction::BackToOverview => View::Overview,
        };
        if next != self {
            log::debug!("navigate {self:?} -> {next:?}");
        }
        next
    }

    pub fn title(self) -> &'static str {
        match self {
            View::Overview => "Overview",
            View::Detail(metric) => metric.label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::error::KpiError;

    #[test]
    fn test_detail_and_back() {
        let view = View::default();
        assert_eq!(view, View::Overview);

        let view = view.apply(NavAction::from_key("NRW").unwrap());
        assert_eq!(view, View::Detail(Metric::NonRevenueWater));

        let view = view.apply(NavAction::ShowDetail(Metric::ServiceHours));
        assert_eq!(view, View::Detail(Metric::ServiceHours));

        assert_eq!(view.apply(NavAction::BackToOverview), View::Overview);
    }

    #[test]
    fn test_unknown_key() {
        assert_eq!(
            NavAction::from_key("PRESSURE"),
            Err(KpiError::UnknownMetric("PRESSURE".to_string()))
        );
    }
}
