//! Infrastructure implementation of the `ServerTransport` port over `ureq`.
//!
//! Each call is one blocking attempt with short timeouts; callers decide what
//! a failure means. HTTP error statuses come back as responses so the
//! services can tell "server has no record" (404) from "server unreachable".

use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::application::ports::{HttpResponse, ServerTransport};
use crate::domain::config::ServerSettings;

/// TCP connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(3050);
/// Read timeout for queries.
pub const GET_TIMEOUT: Duration = Duration::from_secs(4);
/// Read timeout for submissions, which carry larger bodies.
pub const POST_TIMEOUT: Duration = Duration::from_secs(8);
/// Basic-auth user name the server expects.
pub const AUTH_USER: &str = "sal";

const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Blocking HTTP client bound to one server.
pub struct UreqTransport {
    agent: ureq::Agent,
    base_url: String,
    authorization: Option<String>,
}

impl UreqTransport {
    #[must_use]
    pub fn new(settings: &ServerSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .user_agent(concat!("sal-submit/", env!("CARGO_PKG_VERSION")))
            .build();
        let authorization = settings.basic_auth.then(|| {
            let credentials = STANDARD.encode(format!("{AUTH_USER}:{}", settings.key));
            format!("Basic {credentials}")
        });
        Self {
            agent,
            base_url: settings.url.clone(),
            authorization,
        }
    }

    /// Full URL for an endpoint path.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        build_url(&self.base_url, path)
    }

    fn request(&self, method: &str, path: &str, timeout: Duration) -> ureq::Request {
        let request = self.agent.request(method, &self.url_for(path)).timeout(timeout);
        match &self.authorization {
            Some(value) => request.set("Authorization", value),
            None => request,
        }
    }
}

impl ServerTransport for UreqTransport {
    fn get(&self, path: &str) -> Result<HttpResponse> {
        finish(path, self.request("GET", path, GET_TIMEOUT).call())
    }

    fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<HttpResponse> {
        finish(path, self.request("POST", path, POST_TIMEOUT).send_form(fields))
    }

    fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<HttpResponse> {
        let bytes = serde_json::to_vec(body).context("serializing request body")?;
        let result = self
            .request("POST", path, POST_TIMEOUT)
            .set("Content-Type", "application/json")
            .send_bytes(&bytes);
        finish(path, result)
    }
}

/// Join `base` and `path` with single slashes and a trailing `/`.
#[must_use]
pub fn build_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_matches('/');
    if path.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{path}/")
    }
}

fn finish(path: &str, result: Result<ureq::Response, ureq::Error>) -> Result<HttpResponse> {
    let response = match result {
        Ok(response) | Err(ureq::Error::Status(_, response)) => response,
        Err(ureq::Error::Transport(e)) => {
            return Err(anyhow::Error::new(e).context(format!("request to {path} failed")));
        }
    };
    let status = response.status();
    let mut body = Vec::new();
    response
        .into_reader()
        .take(MAX_BODY_BYTES)
        .read_to_end(&mut body)
        .with_context(|| format!("reading response from {path}"))?;
    debug!(status, bytes = body.len(), "{path} responded");
    Ok(HttpResponse { status, body })
}
