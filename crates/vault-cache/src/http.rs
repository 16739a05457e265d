//! Injectable HTTP transport capability (spec.md §9, "the core does not own
//! transport details").
//!
//! The vault backend never talks to `reqwest` directly; it talks to this
//! trait, so its login/retry/403 state machine can be exercised against a
//! fake without a live server.

use async_trait::async_trait;

/// Outcome of a transport call that reached the server.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// A minimal HTTP capability: POST with a JSON body, GET with headers.
///
/// Errors are transport-level failures (DNS, connect, timeout) — anything
/// that got an HTTP status at all is an `Ok(HttpResponse)`, even a 403 or
/// 500, so the backend's retry/login logic can inspect the status itself.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        json_body: serde_json::Value,
    ) -> Result<HttpResponse, String>;

    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, String>;
}

/// Production transport backed by a shared [`reqwest::Client`].
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with the given connect and overall-request
    /// timeouts. `reqwest` does not distinguish read/write timeouts from
    /// the total request timeout, so a vault's configured `readTimeout`
    /// and `writeTimeout` (spec.md §6) are both folded into `request_timeout`
    /// by the caller, which picks the larger of the two.
    #[must_use]
    pub fn new(connect_timeout: std::time::Duration, request_timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        json_body: serde_json::Value,
    ) -> Result<HttpResponse, String> {
        let mut req = self.client.post(url).json(&json_body);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req.send().await.map_err(|e| e.to_string())?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| e.to_string())?.to_vec();
        Ok(HttpResponse { status, body })
    }

    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, String> {
        let mut req = self.client.get(url);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req.send().await.map_err(|e| e.to_string())?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| e.to_string())?.to_vec();
        Ok(HttpResponse { status, body })
    }
}
