//! Signed REST client with rate-limit detection.

use reqwest::{header, Client, Response, StatusCode};
use sirocco_core::error::NetworkError;
use tracing::debug;

use super::config::RestConfig;
use super::signer::{build_query_string, timestamp_ms, RequestSigner};

const TEAPOT: u16 = 418;

/// REST client for authenticated and public GET requests.
///
/// Signed calls attach the API-key header, append `timestamp` and
/// `recvWindow`, sign the canonical query string with HMAC-SHA256 and
/// append the hex digest as `signature`.
///
/// # Example
///
/// ```ignore
/// use sirocco_gateway::rest::{RestConfig, SignedRequestClient};
///
/// let client = SignedRequestClient::new(RestConfig::default())?;
/// let tickers = client
///     .get("https://fapi.binance.com/fapi/v1/ticker/24hr", &[], false)
///     .await?;
/// ```
pub struct SignedRequestClient {
    config: RestConfig,
    http: Client,
    signer: Option<RequestSigner>,
}

impl SignedRequestClient {
    /// Creates a new client from the configuration.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::Connection` if the HTTP client cannot be built.
    pub fn new(config: RestConfig) -> Result<Self, NetworkError> {
        let mut headers = header::HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            headers.insert(
                "X-MBX-APIKEY",
                api_key.parse().map_err(|_| NetworkError::Connection {
                    reason: "invalid API key header value".to_string(),
                })?,
            );
        }

        let http = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| NetworkError::Connection {
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        let signer = config.api_secret.as_ref().map(RequestSigner::new);

        Ok(Self {
            config,
            http,
            signer,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    /// Issues a GET request and parses the response body as JSON.
    ///
    /// Unsigned calls pass `params` through directly. Signed calls append
    /// `timestamp` and `recvWindow` and the computed `signature`.
    ///
    /// # Errors
    ///
    /// - `NetworkError::RateLimited` on HTTP 429/418, with the wait taken
    ///   from `Retry-After` when present
    /// - `NetworkError::Api` on any other non-2xx status
    /// - `NetworkError::Connection` / `NetworkError::Timeout` on transport
    ///   failures
    /// - `NetworkError::Signing` when signing is requested without a secret
    pub async fn get(
        &self,
        url: &str,
        params: &[(&str, String)],
        signed: bool,
    ) -> Result<serde_json::Value, NetworkError> {
        let query = self.build_query(params, signed)?;
        let full_url = if query.is_empty() {
            url.to_string()
        } else {
            format!("{url}?{query}")
        };

        debug!(url = %url, signed, "sending request");

        let response = self
            .http
            .get(&full_url)
            .send()
            .await
            .map_err(|e| self.classify_send_error(&e))?;

        self.check_status(response).await
    }

    fn build_query(&self, params: &[(&str, String)], signed: bool) -> Result<String, NetworkError> {
        if !signed {
            return Ok(build_query_string(params));
        }

        let signer = self.signer.as_ref().ok_or_else(|| NetworkError::Signing {
            reason: "signed request without configured API secret".to_string(),
        })?;

        let mut all: Vec<(&str, String)> = params.to_vec();
        let timestamp = timestamp_ms().to_string();
        let recv_window = self.config.recv_window_ms.to_string();
        all.push(("timestamp", timestamp));
        all.push(("recvWindow", recv_window));

        signer.sign_query(&build_query_string(&all))
    }

    fn classify_send_error(&self, error: &reqwest::Error) -> NetworkError {
        if error.is_timeout() {
            NetworkError::Timeout {
                timeout_ms: self.config.timeout_ms,
            }
        } else {
            NetworkError::Connection {
                reason: error.to_string(),
            }
        }
    }

    async fn check_status(&self, response: Response) -> Result<serde_json::Value, NetworkError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == TEAPOT {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(self.config.default_retry_after_secs);
            return Err(NetworkError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::Api {
                status_code: status.as_u16(),
                body,
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| NetworkError::Parse {
                reason: format!("failed to parse response: {e}"),
            })
    }
}
