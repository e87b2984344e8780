use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::{Error, HttpRequest, HttpResponse, Result};

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl Default for HttpClient {
    fn default() -> Self {
        // OS-level connect timeouts can run for tens of seconds against unreachable hosts.
        Self::new(Some(Duration::from_secs(3)))
    }
}

impl HttpClient {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);
        http_connector.set_connect_timeout(connect_timeout);

        let https_connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let inner = Client::builder(TokioExecutor::new()).build(https_connector);

        Self { inner }
    }

    /// Sends one request and reads the whole body. Never retries.
    ///
    /// `duration` on the response covers send plus body read only.
    pub async fn execute(&self, req: HttpRequest) -> Result<HttpResponse> {
        let method = req.method.clone();
        let url = req.url.clone();
        let timeout = req.timeout;

        let request = build_request(req)?;

        let started = Instant::now();
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.send(request)).await {
                Ok(res) => res,
                Err(_) => Err(Error::Timeout(limit)),
            },
            None => self.send(request).await,
        };
        let duration = started.elapsed();
        let elapsed_ms = duration.as_secs_f64() * 1000.0;

        match outcome {
            Ok((status, headers, body)) => {
                tracing::debug!(%method, %url, status, elapsed_ms, "http request");
                Ok(HttpResponse {
                    status,
                    body,
                    headers,
                    duration,
                })
            }
            Err(err) => {
                tracing::debug!(%method, %url, kind = %err.kind(), elapsed_ms, error = %err, "http request failed");
                Err(err)
            }
        }
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.execute(HttpRequest::get(url)).await
    }

    async fn send(
        &self,
        req: Request<Full<Bytes>>,
    ) -> Result<(u16, Vec<(String, String)>, Bytes)> {
        let res = self.inner.request(req).await?;
        let (parts, body) = res.into_parts();

        let body = body.collect().await?.to_bytes();
        Ok((parts.status.as_u16(), flatten_headers(&parts.headers), body))
    }
}

/// One entry per header name; repeated values are joined with ", ".
fn flatten_headers(map: &http::HeaderMap) -> Vec<(String, String)> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes());
        let slot = out.entry(name.as_str().to_string()).or_default();
        if !slot.is_empty() {
            slot.push_str(", ");
        }
        slot.push_str(&value);
    }
    out.into_iter().collect()
}

fn build_request(req: HttpRequest) -> Result<Request<Full<Bytes>>> {
    match url::Url::parse(&req.url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(_) => return Err(Error::UnsupportedScheme(req.url)),
        Err(_) => return Err(Error::InvalidUrl(req.url)),
    }

    let uri: hyper::Uri = req
        .url
        .parse()
        .map_err(|_| Error::InvalidUrl(req.url.clone()))?;

    let mut builder = Request::builder().method(req.method).uri(uri);
    for (k, v) in req.headers {
        let name = http::header::HeaderName::from_bytes(k.as_bytes())?;
        let value = http::header::HeaderValue::from_str(&v)?;
        builder = builder.header(name, value);
    }

    Ok(builder.body(Full::new(req.body))?)
}
