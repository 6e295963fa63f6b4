//! HTTP client used by the console's `http` command.

use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;
use url::Url;

use remotectl_hub_log::{EventSink, LogEvent, LogKind};
use remotectl_hub_servers::Endpoint;

const JSON: &str = "application/json";

/// Errors from a one-shot request.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid HTTP method {0:?}")]
    Method(String),
}

/// Status and decoded body of a response. Non-2xx statuses are not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Thin wrapper over a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    http: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `method` to `path` under `base`.
    ///
    /// The body goes out as JSON only when it is non-empty and the method
    /// is not GET.
    pub async fn request(
        &self,
        base: &Url,
        path: &str,
        method: &str,
        body: &str,
    ) -> Result<HttpResponse, HttpError> {
        let method = parse_method(method)?;
        let url = join_path(base, path);
        debug!(%method, %url, "HTTP request");

        let mut req = self
            .http
            .request(method.clone(), url)
            .header(ACCEPT, JSON);
        if !body.is_empty() && method != Method::GET {
            req = req.header(CONTENT_TYPE, JSON).body(body.to_string());
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(HttpResponse { status, body })
    }

    /// Sends the same request to each target in turn, logging the request
    /// and its outcome per target. A failing target does not stop the rest.
    pub async fn send_all(
        &self,
        sink: &dyn EventSink,
        targets: &[Endpoint],
        method: &str,
        path: &str,
        body: &str,
    ) {
        let method = method.trim().to_uppercase();
        let body = if carries_body(&method) { body } else { "" };

        for endpoint in targets {
            let name = Some(endpoint.name.as_str());
            sink.add(LogEvent::new(
                name,
                LogKind::HttpRequest,
                format!("HTTP → {method} {path}"),
                body,
            ));

            match self
                .request(&endpoint.request_address, path, &method, body)
                .await
            {
                Ok(resp) => sink.add(LogEvent::new(
                    name,
                    LogKind::HttpResponse,
                    format!("HTTP ← {}", resp.status),
                    resp.body,
                )),
                Err(e) => sink.add(LogEvent::new(
                    name,
                    LogKind::Error,
                    "HTTP error",
                    e.to_string(),
                )),
            }
        }
    }
}

/// Appends `path` (minus one leading `/`) to the path of `base`.
pub fn join_path(base: &Url, path: &str) -> Url {
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return base.clone();
    }
    let mut url = base.clone();
    let joined = format!("{}/{}", base.path().trim_end_matches('/'), path);
    url.set_path(&joined);
    url
}

fn parse_method(method: &str) -> Result<Method, HttpError> {
    let upper = method.trim().to_uppercase();
    if upper.is_empty() {
        return Err(HttpError::Method(method.to_string()));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| HttpError::Method(method.to_string()))
}

fn carries_body(method: &str) -> bool {
    method != "GET" && method != "DELETE"
}
