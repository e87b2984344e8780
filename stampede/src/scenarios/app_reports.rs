use std::time::Duration;

use anyhow::Context as _;
use chrono::NaiveDate;
use serde::Serialize;
use stampede_core::checks::{body_not_empty, duration_below, status_is};
use stampede_core::random::{random_choice, random_date_in_range, random_padded_id};
use stampede_core::{HttpRequest, Scenario, ScenarioError, VuContext};

use super::Settings;

struct ReportType {
    kind: &'static str,
    values: &'static [&'static str],
}

const REPORT_TYPES: &[ReportType] = &[
    ReportType {
        kind: "Llaves",
        values: &["No estan", "Perdidas", "En la oficina"],
    },
    ReportType {
        kind: "Puerta",
        values: &["Abierta", "Cerrada", "Atascada"],
    },
    ReportType {
        kind: "Ventana",
        values: &["Abierta", "Cerrada", "Rota"],
    },
    ReportType {
        kind: "Luz",
        values: &["Encendida", "Apagada", "Intermitente"],
    },
    ReportType {
        kind: "Temperatura",
        values: &["Alta", "Normal", "Baja"],
    },
];

#[derive(Debug, Serialize)]
struct AppReport<'a> {
    #[serde(rename = "sensorID")]
    sensor_id: String,
    date: String,
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'static str,
    #[serde(rename = "propertyId")]
    property_id: &'a str,
}

/// Posts one randomized app report per iteration.
pub(crate) struct AppReports {
    url: String,
    property_ids: Vec<String>,
    from: NaiveDate,
    to: NaiveDate,
}

impl AppReports {
    pub(crate) fn new(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            url: settings.url("/reports/app"),
            property_ids: settings.property_ids.clone(),
            from: NaiveDate::from_ymd_opt(2024, 1, 1).context("invalid report window start")?,
            to: NaiveDate::from_ymd_opt(2024, 12, 31).context("invalid report window end")?,
        })
    }
}

impl Scenario for AppReports {
    type Context = ();

    fn name(&self) -> &str {
        "app-reports"
    }

    async fn setup(&self, _vu: &mut VuContext) -> Result<(), ScenarioError> {
        Ok(())
    }

    async fn iteration(&self, vu: &mut VuContext, _ctx: &()) -> Result<(), ScenarioError> {
        let property_id = random_choice(vu.rng(), &self.property_ids)?;
        let report_type = random_choice(vu.rng(), REPORT_TYPES)?;
        let report = AppReport {
            sensor_id: random_padded_id(vu.rng(), "APP", 4, 10_000)?,
            date: random_date_in_range(vu.rng(), self.from, self.to)?,
            kind: report_type.kind,
            value: *random_choice(vu.rng(), report_type.values)?,
            property_id,
        };

        let res = vu
            .request(HttpRequest::post(self.url.as_str()).json(&report)?)
            .await?;
        tracing::debug!(elapsed_ms = res.duration_ms(), "app report posted");

        vu.check_all(
            &res,
            &[
                ("status is 200", &status_is(200)),
                (
                    "response time is less than 1000ms",
                    &duration_below(Duration::from_millis(1000)),
                ),
                ("response body is not empty", &body_not_empty),
            ],
        );

        if res.status != 200 {
            tracing::warn!(
                property_id = %property_id,
                status = res.status,
                "failed to post app report"
            );
        }
        Ok(())
    }
}
