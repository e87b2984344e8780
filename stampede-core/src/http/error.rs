use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TransportErrorKind {
    InvalidUrl,
    UnsupportedScheme,
    RequestBuild,
    HeaderName,
    HeaderValue,
    Encode,
    Connect,
    Request,
    Timeout,
    BodyRead,
}

/// A request that never produced a complete response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("only http:// and https:// URLs are supported: {0}")]
    UnsupportedScheme(String),

    #[error("http request build failed: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("invalid http header name: {0}")]
    HeaderName(#[from] http::header::InvalidHeaderName),

    #[error("invalid http header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("http request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("http request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read response body: {0}")]
    BodyRead(#[from] hyper::Error),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::InvalidUrl(_) => TransportErrorKind::InvalidUrl,
            Self::UnsupportedScheme(_) => TransportErrorKind::UnsupportedScheme,
            Self::RequestBuild(_) => TransportErrorKind::RequestBuild,
            Self::HeaderName(_) => TransportErrorKind::HeaderName,
            Self::HeaderValue(_) => TransportErrorKind::HeaderValue,
            Self::Encode(_) => TransportErrorKind::Encode,
            Self::Request(e) if e.is_connect() => TransportErrorKind::Connect,
            Self::Request(_) => TransportErrorKind::Request,
            Self::Timeout(_) => TransportErrorKind::Timeout,
            Self::BodyRead(_) => TransportErrorKind::BodyRead,
        }
    }
}
