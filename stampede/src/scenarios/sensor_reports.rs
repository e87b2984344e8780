use std::collections::BTreeMap;
use std::time::Duration;

use rand::Rng as _;
use serde::Serialize;
use stampede_core::checks::{body_not_empty, duration_below, status_is};
use stampede_core::random::random_choice;
use stampede_core::{HttpRequest, Scenario, ScenarioError, VuContext};

use super::{AUTH_HEADER, Settings};

/// Reading date sent with every sensor report.
const REPORT_DATE: &str = "2020-10-01";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SensorDefinition {
    id: &'static str,
    description: &'static str,
    serial_number: &'static str,
    brand: &'static str,
    address: &'static str,
    report_structure: ReportStructure,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportStructure {
    reports: &'static [ReportField],
    sensor_id: &'static str,
}

#[derive(Debug, Serialize)]
struct ReportField {
    #[serde(rename = "type")]
    kind: &'static str,
    unit: &'static str,
    /// Regex the backend validates readings against.
    value: &'static str,
}

const SENSORS: &[SensorDefinition] = &[
    SensorDefinition {
        id: "1000",
        description: "Este es un sensor para la puerta",
        serial_number: "The quick brown fox jumps over the lazy dog.2",
        brand: "Insano",
        address: "QCYO",
        report_structure: ReportStructure {
            reports: &[ReportField {
                kind: "Puerta",
                unit: "",
                value: "^(Abierta|Cerrada)$",
            }],
            sensor_id: "1000",
        },
    },
    SensorDefinition {
        id: "2000",
        description: "Este es un sensor para la ventana",
        serial_number: "The quick brown fox jumps over the lazy dog.3",
        brand: "Insano",
        address: "WCYO",
        report_structure: ReportStructure {
            reports: &[ReportField {
                kind: "Ventana",
                unit: "",
                value: "^(Abierta|Cerrada|Semi-abierta)$",
            }],
            sensor_id: "2000",
        },
    },
];

#[derive(Debug, Serialize)]
struct SensorReading {
    value: &'static str,
    unit: &'static str,
}

#[derive(Debug, Serialize)]
struct SensorReport {
    #[serde(rename = "sensorID")]
    sensor_id: &'static str,
    date: &'static str,
    reports: BTreeMap<&'static str, SensorReading>,
}

impl SensorReport {
    fn open_or_closed(sensor: &'static SensorDefinition, open: bool) -> Self {
        let reading = SensorReading {
            value: if open { "Abierta" } else { "Cerrada" },
            unit: "",
        };
        let reports = sensor
            .report_structure
            .reports
            .first()
            .map(|field| (field.kind, reading))
            .into_iter()
            .collect();
        Self {
            sensor_id: sensor.id,
            date: REPORT_DATE,
            reports,
        }
    }
}

/// Registers the sensors once, then posts readings for a random sensor every iteration.
pub(crate) struct SensorReports {
    sensor_url: String,
    report_url: String,
    auth_token: String,
}

impl SensorReports {
    pub(crate) fn new(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            sensor_url: settings.url("/sensor"),
            report_url: settings.url("/reports/sensor"),
            auth_token: settings.auth_token()?.to_string(),
        })
    }
}

impl Scenario for SensorReports {
    type Context = ();

    fn name(&self) -> &str {
        "sensor-reports"
    }

    async fn setup(&self, vu: &mut VuContext) -> Result<(), ScenarioError> {
        for sensor in SENSORS {
            let req = HttpRequest::post(self.sensor_url.as_str())
                .header(AUTH_HEADER, self.auth_token.as_str())
                .json(sensor)?;
            let res = vu.request(req).await?;
            tracing::info!(
                sensor = sensor.id,
                status = res.status,
                elapsed_ms = res.duration_ms(),
                "sensor registration answered"
            );

            vu.check(
                &res,
                "response time is less than 500ms",
                duration_below(Duration::from_millis(500)),
            );
            if !(200..300).contains(&res.status) {
                return Err(ScenarioError::UnexpectedStatus {
                    request: format!("POST /sensor ({})", sensor.id),
                    status: res.status,
                });
            }
        }
        Ok(())
    }

    async fn iteration(&self, vu: &mut VuContext, _ctx: &()) -> Result<(), ScenarioError> {
        let sensor = random_choice(vu.rng(), SENSORS)?;
        let open = vu.rng().gen_bool(0.5);
        let report = SensorReport::open_or_closed(sensor, open);

        let res = vu
            .request(HttpRequest::post(self.report_url.as_str()).json(&report)?)
            .await?;
        tracing::debug!(elapsed_ms = res.duration_ms(), "sensor report posted");

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
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_definition_serializes_in_backend_shape() {
        let v = serde_json::to_value(&SENSORS[0]).unwrap_or_else(|e| panic!("{e}"));
        let field = |path: &str| v.pointer(path).and_then(|v| v.as_str()).map(str::to_string);
        assert_eq!(
            field("/serialNumber").as_deref(),
            Some("The quick brown fox jumps over the lazy dog.2")
        );
        assert_eq!(field("/reportStructure/sensorId").as_deref(), Some("1000"));
        assert_eq!(
            field("/reportStructure/reports/0/type").as_deref(),
            Some("Puerta")
        );
    }

    #[test]
    fn report_is_keyed_by_the_sensor_type() {
        let report = SensorReport::open_or_closed(&SENSORS[1], true);
        let v = serde_json::to_value(&report).unwrap_or_else(|e| panic!("{e}"));
        let field = |path: &str| v.pointer(path).and_then(|v| v.as_str()).map(str::to_string);
        assert_eq!(field("/sensorID").as_deref(), Some("2000"));
        assert_eq!(field("/reports/Ventana/value").as_deref(), Some("Abierta"));
        assert_eq!(field("/reports/Ventana/unit").as_deref(), Some(""));
    }
}
