use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
    /// Response headers (lowercased header names). Multiple values are joined with ", ".
    pub headers: Vec<(String, String)>,
    /// Time from sending the request until the body was fully read.
    pub duration: Duration,
}

impl HttpResponse {
    pub fn body_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: http::Method,
    pub url: String,
    /// Groups latency in the summary. Defaults to `METHOD path` when unset.
    pub name: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: http::Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            name: None,
            headers: Vec::new(),
            body: Bytes::new(),
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(http::Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(http::Method::POST, url)
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serializes `value` as the body and sets `content-type: application/json`.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .header("content-type", "application/json")
            .body(body))
    }

    /// The name used to group this request in summaries.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let path = url::Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| self.url.clone());
        format!("{} {}", self.method, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_sets_body_and_content_type() {
        #[derive(Serialize)]
        struct Payload {
            id: u32,
        }

        let req = HttpRequest::post("http://localhost/x")
            .json(&Payload { id: 7 })
            .unwrap_or_else(|e| panic!("encode failed: {e}"));
        assert_eq!(&req.body[..], br#"{"id":7}"#);
        assert!(
            req.headers
                .iter()
                .any(|(k, v)| k == "content-type" && v == "application/json")
        );
    }

    #[test]
    fn display_name_drops_query_string() {
        let req = HttpRequest::get("http://localhost:8080/inmueble?page=1&size=3");
        assert_eq!(req.display_name(), "GET /inmueble");
        assert_eq!(req.name("search").display_name(), "search");
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let res = HttpResponse {
            status: 200,
            body: Bytes::from_static(b"{\"ok\":true}"),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            duration: Duration::from_millis(3),
        };
        assert_eq!(res.header("Content-Type"), Some("application/json"));
        assert_eq!(res.body_utf8(), Some("{\"ok\":true}"));
        let v: serde_json::Value = res.json().unwrap_or_default();
        assert_eq!(v["ok"], serde_json::Value::Bool(true));
    }
}
