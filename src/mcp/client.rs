// src/mcp/client.rs

use super::{sse, JsonRpcRequest};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::io::BufReader;
use std::time::Duration;
use url::Url;

/// Blocking JSON-RPC client for the query-execution service.
pub struct McpClient {
    http: Client,
    endpoint: Url,
}

impl McpClient {
    /// `base_url` is the service root, e.g. `http://127.0.0.1:8080`; requests go to `<base>/mcp/`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(&format!("{}/mcp/", base_url.trim_end_matches('/')))
            .with_context(|| format!("parsing service URL {}", base_url))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send one request and return the first response envelope.
    ///
    /// Event-stream replies are read only up to the first `data:` line; `Ok(None)` means the
    /// stream ended without one. Plain JSON replies are decoded whole.
    pub fn call(&self, request: &JsonRpcRequest) -> Result<Option<Value>> {
        let resp = self
            .http
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json, text/event-stream")
            .json(request)
            .send()
            .with_context(|| format!("POST {}", self.endpoint))?
            .error_for_status()?;

        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |ct| ct.starts_with("application/json"));
        if is_json {
            let body: Value = resp.json().context("decoding JSON response")?;
            return Ok(Some(body));
        }

        match sse::first_data_payload(BufReader::new(resp)).context("reading event stream")? {
            Some(payload) => Ok(Some(
                serde_json::from_str(&payload).context("decoding event-stream payload")?,
            )),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_gets_mcp_suffix() {
        let timeout = Duration::from_secs(1);
        let c = McpClient::new("http://127.0.0.1:8080", timeout).unwrap();
        assert_eq!(c.endpoint().as_str(), "http://127.0.0.1:8080/mcp/");
        let c = McpClient::new("http://localhost:9000/", timeout).unwrap();
        assert_eq!(c.endpoint().as_str(), "http://localhost:9000/mcp/");
    }

    #[test]
    fn rejects_garbage_url() {
        assert!(McpClient::new("not a url", Duration::from_secs(1)).is_err());
    }
}
