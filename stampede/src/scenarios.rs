//! Built-in scenarios against the property / reservation / sensor backend.

mod app_reports;
mod property_search;
mod reservations;
mod sensor_reports;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub(crate) use app_reports::AppReports;
pub(crate) use property_search::PropertySearch;
pub(crate) use reservations::Reservations;
pub(crate) use sensor_reports::SensorReports;

pub(crate) const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8090";
pub(crate) const DEFAULT_PROPERTY_IDS: [&str; 3] = ["676", "xve9391o2j1ls5p", "eh8cnak5rgha7dp"];

/// Header carrying the API token on authenticated endpoints.
pub(crate) const AUTH_HEADER: &str = "auth";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ScenarioKind {
    /// App-submitted incident reports for random properties.
    AppReports,
    /// Register two sensors, then stream door/window readings.
    SensorReports,
    /// Paged property search with a fixed filter.
    PropertySearch,
    /// Create, find, approve, pay and remove a reservation.
    Reservations,
}

/// Values a scenario falls back to when neither CLI, env nor config set them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScenarioDefaults {
    pub vus: u64,
    pub duration: Duration,
    pub pause: Duration,
    pub thresholds: &'static [(&'static str, &'static str)],
}

impl ScenarioKind {
    pub(crate) fn description(self) -> &'static str {
        match self {
            Self::AppReports => "POST /reports/app with random report types, values and properties",
            Self::SensorReports => {
                "register sensors via POST /sensor, then POST /reports/sensor readings"
            }
            Self::PropertySearch => "GET /inmueble with page, size, hasAC and date filters",
            Self::Reservations => {
                "pay a property, then create, list, approve, pay and remove reservations"
            }
        }
    }

    pub(crate) fn defaults(self) -> ScenarioDefaults {
        match self {
            Self::AppReports => ScenarioDefaults {
                vus: 100,
                duration: Duration::from_secs(1),
                pause: Duration::from_millis(10),
                thresholds: &[],
            },
            Self::SensorReports => ScenarioDefaults {
                vus: 100,
                duration: Duration::from_secs(20),
                pause: Duration::from_millis(10),
                thresholds: &[],
            },
            Self::PropertySearch => ScenarioDefaults {
                vus: 1,
                duration: Duration::from_secs(10),
                pause: Duration::from_secs(1),
                thresholds: &[],
            },
            Self::Reservations => ScenarioDefaults {
                vus: 100,
                duration: Duration::from_secs(60),
                pause: Duration::from_secs(1),
                thresholds: &[("http_req_duration", "p(95)<2000")],
            },
        }
    }

    pub(crate) fn requires_auth(self) -> bool {
        matches!(self, Self::SensorReports | Self::Reservations)
    }
}

/// Filter sent by `property-search`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub(crate) struct SearchQuery {
    pub page: u32,
    pub size: u32,
    #[serde(rename = "hasAC")]
    pub has_ac: bool,
    pub date_from: String,
    pub date_to: String,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            page: 1,
            size: 3,
            has_ac: true,
            date_from: "2020-12-24".to_string(),
            date_to: "2021-12-24".to_string(),
        }
    }
}

impl SearchQuery {
    pub(crate) fn to_query_string(&self) -> String {
        format!(
            "page={}&size={}&hasAC={}&dateFrom={}&dateTo={}",
            self.page, self.size, self.has_ac, self.date_from, self.date_to
        )
    }
}

/// Backend coordinates shared by every scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    /// Without a trailing slash.
    pub base_url: String,
    pub auth_token: Option<String>,
    /// Never empty.
    pub property_ids: Vec<String>,
    pub search: SearchQuery,
}

impl Settings {
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub(crate) fn auth_token(&self) -> anyhow::Result<&str> {
        self.auth_token.as_deref().ok_or_else(|| {
            anyhow::anyhow!("an auth token is required (--auth-token or STAMPEDE_AUTH_TOKEN)")
        })
    }
}

/// Test card accepted by the payment endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CardInfo {
    pub card_number: &'static str,
    pub name: &'static str,
    pub cvv: &'static str,
    pub exp_date: &'static str,
}

pub(crate) const TEST_CARD: CardInfo = CardInfo {
    card_number: "1234567812345678",
    name: "Ruperto Rocanrol",
    cvv: "123",
    exp_date: "2025-06",
};

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum as _;

    #[test]
    fn scenario_names_are_kebab_case() {
        let names: Vec<String> = ScenarioKind::value_variants()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            names,
            vec![
                "app-reports",
                "sensor-reports",
                "property-search",
                "reservations"
            ]
        );
    }

    #[test]
    fn clap_and_display_names_agree() {
        for kind in ScenarioKind::value_variants() {
            let parsed = ScenarioKind::from_str(&kind.to_string(), false)
                .unwrap_or_else(|e| panic!("{kind}: {e}"));
            assert_eq!(parsed, *kind);
        }
    }

    #[test]
    fn search_query_matches_backend_parameter_names() {
        assert_eq!(
            SearchQuery::default().to_query_string(),
            "page=1&size=3&hasAC=true&dateFrom=2020-12-24&dateTo=2021-12-24"
        );
    }

    #[test]
    fn only_authenticated_scenarios_need_a_token() {
        assert!(ScenarioKind::Reservations.requires_auth());
        assert!(ScenarioKind::SensorReports.requires_auth());
        assert!(!ScenarioKind::AppReports.requires_auth());
        assert!(!ScenarioKind::PropertySearch.requires_auth());
    }
}
