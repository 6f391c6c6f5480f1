use crate::error::GatewayError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Thin JSON-over-HTTP helper shared by the gateway adapters.
///
/// Maps every failure onto [`GatewayError`]: transport errors and 5xx are
/// `Unavailable`, 404 is `Unsupported`, other 4xx are `Rejected`, and bodies
/// that do not decode are `Malformed`.
#[derive(Clone, Debug)]
pub struct JsonClient {
    base_url: Url,
    client: Client,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl JsonClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: normalize(base_url),
            client: Client::new(),
            headers: HeaderMap::new(),
            timeout: None,
        }
    }

    /// Sends `name: value` with every request. Invalid header values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(HeaderName::from_static(name), value);
            }
            Err(e) => debug!(header = name, error = %e, "Skipping invalid header value"),
        }
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves `path` (no leading slash) against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::Malformed(format!("invalid endpoint {path}: {e}")))
    }

    pub async fn get_json<R>(&self, url: Url, context: &'static str) -> Result<R, GatewayError>
    where
        R: DeserializeOwned,
    {
        let mut req = self.client.get(url);
        for (key, value) in &self.headers {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let response = req.send().await.map_err(|e| self.transport(context, e))?;
        self.decode(context, response).await
    }

    pub async fn post_json<T, R>(
        &self,
        url: Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, GatewayError>
    where
        T: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let mut req = self.client.post(url).json(payload);
        for (key, value) in &self.headers {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let response = req.send().await.map_err(|e| self.transport(context, e))?;
        self.decode(context, response).await
    }

    fn transport(&self, context: &'static str, error: reqwest::Error) -> GatewayError {
        if error.is_timeout() {
            GatewayError::Timeout(self.timeout.unwrap_or_default())
        } else {
            GatewayError::Unavailable(format!("{context}: {error}"))
        }
    }

    async fn decode<R>(
        &self,
        context: &'static str,
        response: reqwest::Response,
    ) -> Result<R, GatewayError>
    where
        R: DeserializeOwned,
    {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<R>()
                .await
                .map_err(|e| GatewayError::Malformed(format!("{context}: {e}")));
        }

        let body = response.text().await.unwrap_or_default();
        debug!(context, %status, %body, "Gateway returned an error status");
        let message = format!("{context}: {status} {body}");
        Err(match status {
            StatusCode::NOT_FOUND => GatewayError::Unsupported(message),
            s if s.is_client_error() => GatewayError::Rejected(message),
            _ => GatewayError::Unavailable(message),
        })
    }
}

/// Ensures the base URL ends with a slash so relative joins keep its path.
fn normalize(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
