//! HTTP access to the platform.
//!
//! [`PlatformApi`] is the seam between the provisioning logic and the wire:
//! one method per outbound call. [`HttpPlatformClient`] is the `reqwest`
//! implementation; tests substitute their own.

use crate::auth::{Credentials, TokenResult, UserInfo};
use crate::config::{ConfigError, HttpConfig};
use crate::error::PlatformError;
use crate::soap::{SoapAction, SoapResponse};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, error, instrument};

const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";
const SOAP_ACTION_HEADER: &str = "SOAPAction";

/// Successful REST response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestResponse {
    pub status: u16,
    pub raw_body: String,
}

/// Outbound platform calls used by a provisioning run.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Exchanges credentials for an access token.
    async fn post_oauth(&self, credentials: &Credentials) -> Result<TokenResult, PlatformError>;

    /// Resolves member id and instance URLs for `access_token`.
    async fn get_userinfo(&self, access_token: &str) -> Result<UserInfo, PlatformError>;

    /// Posts a rendered SOAP envelope. A SOAP fault is reported as an error.
    async fn post_soap(
        &self,
        url: &str,
        action: SoapAction,
        envelope: String,
    ) -> Result<SoapResponse, PlatformError>;

    /// Posts one JSON row to a rowset endpoint.
    async fn post_rowset(
        &self,
        url: &str,
        access_token: &str,
        row: &Value,
    ) -> Result<RestResponse, PlatformError>;
}

/// Extracts a human-readable message from an error body.
///
/// Tries the JSON `error_description` and `message` fields, then a SOAP
/// fault string, then falls back to the raw body.
fn extract_error_description(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(desc) = json.get("error_description").and_then(|v| v.as_str()) {
            return desc.to_string();
        }
        if let Some(msg) = json.get("message").and_then(|v| v.as_str()) {
            return msg.to_string();
        }
    }
    if let Ok(response) = SoapResponse::parse(body) {
        if let Some(fault) = response.fault() {
            return fault;
        }
    }
    body.trim().to_string()
}

/// `reqwest` implementation of [`PlatformApi`].
#[derive(Debug, Clone)]
pub struct HttpPlatformClient {
    client: Client,
    auth_base_url: String,
}

impl HttpPlatformClient {
    /// Builds a client with the timeout and user agent from `config`.
    pub fn with_config(config: &HttpConfig, auth_base_url: &str) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ConfigError::HttpClient {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            auth_base_url: auth_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/{path}", self.auth_base_url)
    }

    /// Returns the body of a 2xx response, or an [`PlatformError::Http`].
    async fn check_response(
        &self,
        url: &str,
        response: Response,
    ) -> Result<(u16, String), PlatformError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, url))?;

        if status.is_success() {
            return Ok((status.as_u16(), body));
        }

        let message = extract_error_description(&body);
        error!(url, status = status.as_u16(), %message, "Platform call failed");
        Err(PlatformError::Http {
            url: url.to_string(),
            status: status.as_u16(),
            message,
            raw_body: body,
        })
    }
}

fn map_reqwest_error(error: reqwest::Error, url: &str) -> PlatformError {
    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| url.to_string());

    let message = if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    };
    error!(%url, %message, "Platform request did not complete");
    PlatformError::Transport { url, message }
}

fn parse_error(url: &str, message: impl Into<String>, raw_body: String) -> PlatformError {
    PlatformError::Parse {
        url: url.to_string(),
        message: message.into(),
        raw_body,
    }
}

#[async_trait]
impl PlatformApi for HttpPlatformClient {
    #[instrument(skip_all, fields(client_id = credentials.client_id()))]
    async fn post_oauth(&self, credentials: &Credentials) -> Result<TokenResult, PlatformError> {
        let url = self.auth_url("v2/token");
        debug!(%url, "Requesting access token");

        let response = self
            .client
            .post(&url)
            .json(&credentials.request_body())
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, &url))?;
        let (_, body) = self.check_response(&url, response).await?;

        serde_json::from_str(&body).map_err(|e| parse_error(&url, e.to_string(), body))
    }

    #[instrument(skip_all)]
    async fn get_userinfo(&self, access_token: &str) -> Result<UserInfo, PlatformError> {
        let url = self.auth_url("v2/userinfo");
        debug!(%url, "Fetching user info");

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, &url))?;
        let (_, body) = self.check_response(&url, response).await?;

        let json: Value = match serde_json::from_str(&body) {
            Ok(json) => json,
            Err(e) => return Err(parse_error(&url, e.to_string(), body)),
        };
        UserInfo::from_json(&json).map_err(|message| parse_error(&url, message, body))
    }

    #[instrument(skip(self, envelope))]
    async fn post_soap(
        &self,
        url: &str,
        action: SoapAction,
        envelope: String,
    ) -> Result<SoapResponse, PlatformError> {
        debug!(bytes = envelope.len(), "Posting SOAP envelope");

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .header(SOAP_ACTION_HEADER, action.as_str())
            .body(envelope)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, url))?;
        let (status, body) = self.check_response(url, response).await?;

        let parsed = match SoapResponse::parse(body.as_str()) {
            Ok(parsed) => parsed,
            Err(e) => return Err(parse_error(url, e.to_string(), body)),
        };
        if let Some(fault) = parsed.fault() {
            error!(url, %fault, "SOAP fault");
            return Err(PlatformError::Http {
                url: url.to_string(),
                status,
                message: fault,
                raw_body: body,
            });
        }
        Ok(parsed)
    }

    #[instrument(skip(self, access_token, row))]
    async fn post_rowset(
        &self,
        url: &str,
        access_token: &str,
        row: &Value,
    ) -> Result<RestResponse, PlatformError> {
        debug!("Posting rowset");

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .json(row)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, url))?;
        let (status, raw_body) = self.check_response(url, response).await?;
        Ok(RestResponse { status, raw_body })
    }
}
