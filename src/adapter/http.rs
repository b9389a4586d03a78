//! HTTP fetch primitive
//!
//! Uses a blocking `ureq` agent moved onto tokio's blocking pool, so the
//! worker's async tasks never block on socket IO.

use crate::adapter::{Fetcher, Method, Request, Response};
use crate::error::{WorkerError, WorkerResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Fetcher talking to a real origin over HTTP(S)
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
    origin: String,
}

impl HttpFetcher {
    /// Create a fetcher resolving relative URLs against `origin`
    pub fn new(origin: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            origin: origin.into().trim_end_matches('/').to_string(),
        }
    }

    /// Absolute URL for a request
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.origin, url)
        } else {
            format!("{}/{}", self.origin, url)
        }
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    request: &Request,
) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn perform(agent: &ureq::Agent, url: &str, request: &Request) -> WorkerResult<Response> {
    let body = request.body.as_slice();
    let result = match request.method {
        Method::Get => with_headers(agent.get(url), request).call(),
        Method::Head => with_headers(agent.head(url), request).call(),
        Method::Delete => with_headers(agent.delete(url), request).call(),
        Method::Options => with_headers(agent.options(url), request).call(),
        Method::Post => with_headers(agent.post(url), request).send(body),
        Method::Put => with_headers(agent.put(url), request).send(body),
        Method::Patch => with_headers(agent.patch(url), request).send(body),
    };
    let mut incoming = result.map_err(|e| WorkerError::network(url, e.to_string()))?;

    let status = incoming.status().as_u16();
    let headers: BTreeMap<String, String> = incoming
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();
    let body = incoming
        .body_mut()
        .read_to_vec()
        .map_err(|e| WorkerError::network(url, e.to_string()))?;

    Ok(Response {
        status,
        headers,
        body,
    })
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> WorkerResult<Response> {
        let url = self.resolve(&request.url);
        let agent = self.agent.clone();
        let request = request.clone();

        debug!("{} {}", request.method, url);
        tokio::task::spawn_blocking(move || perform(&agent, &url, &request))
            .await
            .map_err(|e| WorkerError::Internal(format!("fetch task aborted: {}", e)))?
    }
}
