use std::time::Duration;

use serde::{Deserialize, Serialize};
use stampede_core::checks::{duration_below, status_is};
use stampede_core::random::{random_calendar_date, random_email};
use stampede_core::{HttpRequest, HttpResponse, Scenario, ScenarioError, VuContext};

use super::{AUTH_HEADER, CardInfo, Settings, TEST_CARD};

const RESERVATION_YEARS: (i32, i32) = (2025, 9999);
const STEP_LATENCY: Duration = Duration::from_millis(500);
const LATENCY_CHECK: &str = "response time is less than 500ms";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PropertyPayment<'a> {
    property_id: &'a str,
    card_info: CardInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReservationPayment<'a> {
    reservation_id: &'a str,
    card_info: CardInfo,
}

/// Field names follow the backend's snake_case reservation model.
#[derive(Debug, Serialize)]
struct ReservationRequest<'a> {
    document: &'static str,
    name: &'static str,
    last_name: &'static str,
    email: &'a str,
    phone: &'static str,
    address: &'static str,
    nationality: &'static str,
    country: &'static str,
    adults: u32,
    minors: u32,
    property: &'a str,
    reserved_from: &'a str,
    reserved_until: &'a str,
}

impl<'a> ReservationRequest<'a> {
    fn single_night(email: &'a str, property: &'a str, day: &'a str) -> Self {
        Self {
            document: "TrustMe",
            name: "Santiago",
            last_name: "Salinas",
            email,
            phone: "+598 1234567",
            address: "Mongo 123",
            nationality: "Uy",
            country: "UY",
            adults: 1,
            minors: 0,
            property,
            reserved_from: day,
            reserved_until: day,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReservationRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    property: String,
}

fn find_reservation_id(res: &HttpResponse, email: &str, property: &str) -> Option<String> {
    let records: Vec<ReservationRecord> = match res.json() {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(
                status = res.status,
                error = %err,
                "reservation listing is not a JSON array"
            );
            return None;
        }
    };
    records
        .into_iter()
        .find(|r| r.email == email && r.property == property && !r.id.is_empty())
        .map(|r| r.id)
}

/// Full reservation lifecycle for one property: create, look up, approve, pay, remove.
pub(crate) struct Reservations {
    base_url: String,
    auth_token: String,
    property_id: String,
}

impl Reservations {
    pub(crate) fn new(settings: &Settings) -> anyhow::Result<Self> {
        let property_id = settings
            .property_ids
            .first()
            .ok_or_else(|| anyhow::anyhow!("reservations needs a property id"))?;
        Ok(Self {
            base_url: settings.base_url.clone(),
            auth_token: settings.auth_token()?.to_string(),
            property_id: property_id.clone(),
        })
    }

    fn post(&self, path: &str) -> HttpRequest {
        HttpRequest::post(format!("{}{path}", self.base_url))
            .header(AUTH_HEADER, self.auth_token.as_str())
    }

    fn check_step(vu: &VuContext, res: &HttpResponse, status_check: &str, status: u16) {
        vu.check_all(
            res,
            &[
                (status_check, &status_is(status)),
                (LATENCY_CHECK, &duration_below(STEP_LATENCY)),
            ],
        );
    }
}

impl Scenario for Reservations {
    /// The property every reservation targets.
    type Context = String;

    fn name(&self) -> &str {
        "reservations"
    }

    async fn setup(&self, vu: &mut VuContext) -> Result<String, ScenarioError> {
        let payment = PropertyPayment {
            property_id: &self.property_id,
            card_info: TEST_CARD,
        };
        let res = vu.request(self.post("/property/pay").json(&payment)?).await?;

        // An already paid property is rejected; the run can still go ahead.
        if !(200..300).contains(&res.status) {
            tracing::warn!(
                property_id = %self.property_id,
                status = res.status,
                "property payment was not accepted"
            );
        }
        Ok(self.property_id.clone())
    }

    async fn iteration(&self, vu: &mut VuContext, property: &String) -> Result<(), ScenarioError> {
        let email = random_email(vu.rng());
        let day = random_calendar_date(vu.rng(), RESERVATION_YEARS.0, RESERVATION_YEARS.1)?
            .to_string();

        let reservation = ReservationRequest::single_night(&email, property, &day);
        let res = vu
            .request(
                self.post("/reservations")
                    .name("POST /reservations")
                    .json(&reservation)?,
            )
            .await?;
        Self::check_step(vu, &res, "reservation status is 201", 201);

        let listing = vu
            .request(
                HttpRequest::get(format!("{}/reservations?email={email}", self.base_url))
                    .header(AUTH_HEADER, self.auth_token.as_str())
                    .name("GET /reservations"),
            )
            .await?;
        let Some(reservation_id) = find_reservation_id(&listing, &email, property) else {
            return Err(ScenarioError::Aborted(format!(
                "no reservation found for {email} on property {property}"
            )));
        };
        tracing::debug!(%reservation_id, "reservation found");

        let res = vu
            .request(
                self.post(&format!("/reservations/{reservation_id}/approve"))
                    .name("POST /reservations/{id}/approve"),
            )
            .await?;
        Self::check_step(vu, &res, "reservation approval status is 200", 200);

        let payment = ReservationPayment {
            reservation_id: &reservation_id,
            card_info: TEST_CARD,
        };
        let res = vu
            .request(
                self.post("/reservations/pay")
                    .name("POST /reservations/pay")
                    .json(&payment)?,
            )
            .await?;
        Self::check_step(vu, &res, "reservation payment status is 201", 201);

        let res = vu
            .request(
                self.post(&format!("/reservations/{reservation_id}/remove"))
                    .name("POST /reservations/{id}/remove"),
            )
            .await?;
        Self::check_step(vu, &res, "reservation remove status is 200", 200);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.as_bytes().to_vec().into(),
            headers: Vec::new(),
            duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn finds_the_reservation_for_email_and_property() {
        let body = r#"[
            {"id":"r1","email":"a@x.com","property":"other"},
            {"id":"r2","email":"a@x.com","property":"p1","status":"pending"}
        ]"#;
        let res = response(201, body);
        assert_eq!(
            find_reservation_id(&res, "a@x.com", "p1").as_deref(),
            Some("r2")
        );
        assert_eq!(find_reservation_id(&res, "b@x.com", "p1"), None);
    }

    #[test]
    fn non_array_listing_finds_nothing() {
        let res = response(406, r#"{"message":"failed to read auth token"}"#);
        assert_eq!(find_reservation_id(&res, "a@x.com", "p1"), None);
    }

    #[test]
    fn reservation_request_uses_snake_case_fields() {
        let req = ReservationRequest::single_night("a@x.com", "p1", "2031-02-28");
        let v = serde_json::to_value(&req).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(v["last_name"], "Salinas");
        assert_eq!(v["reserved_from"], "2031-02-28");
        assert_eq!(v["reserved_until"], "2031-02-28");
        assert_eq!(v["adults"], 1);
    }

    #[test]
    fn payment_uses_camel_case_card_fields() {
        let payment = ReservationPayment {
            reservation_id: "r9",
            card_info: TEST_CARD,
        };
        let v = serde_json::to_value(&payment).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(v["reservationId"], "r9");
        assert_eq!(v["cardInfo"]["cardNumber"], "1234567812345678");
        assert_eq!(v["cardInfo"]["expDate"], "2025-06");
    }
}
