use std::time::Duration;

use stampede_core::checks::{body_not_empty, duration_below, status_is};
use stampede_core::{HttpRequest, Scenario, ScenarioError, VuContext};

use super::Settings;

pub(crate) struct PropertySearch {
    url: String,
}

impl PropertySearch {
    pub(crate) fn new(settings: &Settings) -> Self {
        Self {
            url: format!(
                "{}?{}",
                settings.url("/inmueble"),
                settings.search.to_query_string()
            ),
        }
    }
}

impl Scenario for PropertySearch {
    type Context = ();

    fn name(&self) -> &str {
        "property-search"
    }

    async fn setup(&self, _vu: &mut VuContext) -> Result<(), ScenarioError> {
        Ok(())
    }

    async fn iteration(&self, vu: &mut VuContext, _ctx: &()) -> Result<(), ScenarioError> {
        let res = vu.request(HttpRequest::get(self.url.as_str())).await?;
        tracing::debug!(elapsed_ms = res.duration_ms(), "property search answered");

        vu.check_all(
            &res,
            &[
                ("status is 200", &status_is(200)),
                (
                    "response time is less than 500ms",
                    &duration_below(Duration::from_millis(500)),
                ),
                ("response body is not empty", &body_not_empty),
            ],
        );
        Ok(())
    }
}
