//! Network access: the transport capability and its `ureq`-backed implementation.

use url::Url;

use crate::error::Error;

/// Why a fetch did not produce a body.
#[derive(Debug, thiserror::Error)]
pub enum FetchFailure {
    /// The URL could not be parsed or mapped to a file.
    #[error("bad url: {0}")]
    BadUrl(String),
    /// The server answered with a non-success status.
    #[error("http status {0}")]
    Status(u16),
    /// Connection, TLS, or read failure.
    #[error("{0}")]
    Transport(String),
}

impl From<ureq::Error> for FetchFailure {
    fn from(err: ureq::Error) -> Self {
        return match err {
            ureq::Error::StatusCode(code) => Self::Status(code),
            other => Self::Transport(other.to_string()),
        };
    }
}

/// Source of remote documents. The only suspension points of initialization
/// go through this trait, so tests substitute an in-memory implementation.
pub trait Transport {
    /// Fetch the body at `url`, asking for JSON.
    ///
    /// # Errors
    ///
    /// Returns a `FetchFailure` describing why no body was produced.
    fn fetch(&self, url: &str) -> Result<String, FetchFailure>;
}

/// Blocking HTTP client. `file://` URLs are read from disk so a saved index
/// can stand in for a remote one.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpTransport;

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        let parsed = Url::parse(url).map_err(|e| return FetchFailure::BadUrl(e.to_string()))?;
        if parsed.scheme() == "file" {
            let path = parsed
                .to_file_path()
                .map_err(|()| return FetchFailure::BadUrl(format!("not a local path: {url}")))?;
            return std::fs::read_to_string(path).map_err(|e| return FetchFailure::Transport(e.to_string()));
        }

        log::debug!("GET {url}");
        let mut response = ureq::get(url).header("Accept", "application/json").call()?;
        let body = response.body_mut().read_to_string()?;
        return Ok(body);
    }
}

/// Search endpoint URL for a query: `<base>/<repository>/search?q=<query>`.
///
/// # Errors
///
/// Returns `FetchFailure::BadUrl` if the base URL does not parse.
pub fn search_url(base_url: &str, repository: &str, query: &str) -> Result<String, FetchFailure> {
    let endpoint = format!("{}/{repository}/search", base_url.trim_end_matches('/'));
    let url = Url::parse_with_params(&endpoint, &[("q", query)])
        .map_err(|e| return FetchFailure::BadUrl(e.to_string()))?;
    return Ok(url.to_string());
}

/// Fetch an index document and decode it as JSON.
///
/// # Errors
///
/// Returns `Error::IndexFetch` on transport failure or non-success status,
/// or `Error::Json` if the body is not JSON.
pub fn fetch_index_json(transport: &impl Transport, url: &str) -> Result<serde_json::Value, Error> {
    let body = transport.fetch(url).map_err(|reason| {
        return Error::IndexFetch {
            reason,
            url: url.to_string(),
        };
    })?;
    return Ok(serde_json::from_str(&body)?);
}

/// In-memory transport for tests: URL to body or status code.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct StubTransport {
    /// Canned responses keyed by exact URL.
    pub responses: std::collections::HashMap<String, Result<String, u16>>,
    /// URLs requested, in order.
    pub requests: std::cell::RefCell<Vec<String>>,
}

#[cfg(test)]
impl StubTransport {
    /// Register a successful response.
    pub fn with_body(mut self, url: &str, body: &str) -> Self {
        self.responses.insert(url.to_string(), Ok(body.to_string()));
        return self;
    }

    /// Register a failing status.
    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(url.to_string(), Err(status));
        return self;
    }
}

#[cfg(test)]
impl Transport for StubTransport {
    fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        self.requests.borrow_mut().push(url.to_string());
        return match self.responses.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(FetchFailure::Status(*status)),
            None => Err(FetchFailure::Status(404)),
        };
    }
}
