// Device HTTP client
//
// Wraps `reqwest::Client` with device URL construction and the status and
// body handling shared by every endpoint. Each method is exactly one HTTP
// exchange; retries are layered on top by `crate::retry`.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::StatePatch;
use crate::transport::TransportConfig;

/// Full device status (`state`, `info`, `effects`, ...).
pub const STATUS_PATH: &str = "/json";
/// Saved presets keyed by string-encoded preset number.
pub const PRESETS_PATH: &str = "/presets.json";
/// Partial state updates.
pub const STATE_PATH: &str = "/json/state";

/// Raw HTTP client for one or many devices.
///
/// Cheap to clone: clones share the same connection pool, which is how a
/// single fan-out call shares one pool across its per-device tasks.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
}

impl DeviceClient {
    /// Create a client with its own connection pool.
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build the URL for `path` on the device at `address`.
    ///
    /// `address` is normally a bare host or `host:port`; plain `http://`
    /// is assumed. An address that already carries a scheme is used as is.
    pub fn device_url(address: &str, path: &str) -> Result<Url, Error> {
        let address = address.trim().trim_end_matches('/');
        let full = if address.contains("://") {
            format!("{address}{path}")
        } else {
            format!("http://{address}{path}")
        };
        Ok(Url::parse(&full)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET `path` and decode the body as JSON.
    ///
    /// Statuses >= 400 come back as [`Error::Status`]; a 2xx body that
    /// does not parse comes back as [`Error::InvalidJson`].
    pub async fn get_json(&self, address: &str, path: &str) -> Result<Value, Error> {
        let url = Self::device_url(address, path)?;
        debug!("GET {}", url);

        let resp = self.http.get(url.clone()).send().await?;
        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::InvalidJson {
            url: url.to_string(),
            message: e.to_string(),
            body,
        })
    }

    /// POST a JSON body to `path`, returning the response status.
    ///
    /// The response body is not inspected.
    pub async fn post_json(
        &self,
        address: &str,
        path: &str,
        body: &impl Serialize,
    ) -> Result<StatusCode, Error> {
        let url = Self::device_url(address, path)?;
        debug!("POST {}", url);

        let resp = self.http.post(url.clone()).json(body).send().await?;
        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(status)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /json`
    pub async fn status(&self, address: &str) -> Result<Value, Error> {
        self.get_json(address, STATUS_PATH).await
    }

    /// `GET /presets.json`
    pub async fn presets(&self, address: &str) -> Result<Value, Error> {
        self.get_json(address, PRESETS_PATH).await
    }

    /// `POST /json/state`
    pub async fn apply_state(&self, address: &str, patch: &StatePatch) -> Result<StatusCode, Error> {
        self.post_json(address, STATE_PATH, patch).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn device_url_prefixes_http() {
        let url = DeviceClient::device_url("192.168.1.40", STATUS_PATH).unwrap();
        assert_eq!(url.as_str(), "http://192.168.1.40/json");
    }

    #[test]
    fn device_url_keeps_port_and_scheme() {
        let url = DeviceClient::device_url("http://127.0.0.1:8080/", PRESETS_PATH).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/presets.json");

        let url = DeviceClient::device_url("wled-desk.local:81", STATE_PATH).unwrap();
        assert_eq!(url.as_str(), "http://wled-desk.local:81/json/state");
    }

    #[test]
    fn device_url_rejects_garbage() {
        let err = DeviceClient::device_url("bad host name", STATUS_PATH).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
