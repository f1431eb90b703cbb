//! Token exchange and tenant discovery.
//!
//! Authentication is two calls: a token request, then a user-info call
//! telling us which member we act as and where the tenant's REST and SOAP
//! endpoints live. The result is an immutable [`AuthContext`] threaded through
//! the rest of the run.

use crate::client::PlatformApi;
use crate::error::{PlatformError, ProvisionError, Stage};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, info};

const SOAP_SERVICE_PATH: &str = "Service.asmx";

/// Credentials for the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Server-to-server client-credentials grant
    ClientCredentials {
        client_id: String,
        client_secret: String,
        account_id: Option<String>,
    },
    /// Legacy refresh-token grant
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

impl Credentials {
    pub fn client_id(&self) -> &str {
        match self {
            Credentials::ClientCredentials { client_id, .. }
            | Credentials::RefreshToken { client_id, .. } => client_id,
        }
    }

    /// JSON body posted to the token endpoint.
    pub fn request_body(&self) -> Value {
        match self {
            Credentials::ClientCredentials {
                client_id,
                client_secret,
                account_id,
            } => {
                let mut body = json!({
                    "grant_type": "client_credentials",
                    "client_id": client_id,
                    "client_secret": client_secret,
                });
                if let (Some(account_id), Some(map)) = (account_id, body.as_object_mut()) {
                    map.insert("account_id".to_string(), Value::String(account_id.clone()));
                }
                body
            }
            Credentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => json!({
                "clientId": client_id,
                "clientSecret": client_secret,
                "refreshToken": refresh_token,
            }),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ClientCredentials {
                client_id,
                account_id,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .field("client_secret", &"***")
                .field("account_id", account_id)
                .finish(),
            Credentials::RefreshToken { client_id, .. } => f
                .debug_struct("RefreshToken")
                .field("client_id", client_id)
                .field("client_secret", &"***")
                .field("refresh_token", &"***")
                .finish(),
        }
    }
}

/// Token endpoint response. Both the snake_case and the legacy camelCase
/// spellings are accepted.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResult {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default, alias = "expiresIn")]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for TokenResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResult")
            .field("access_token", &"***")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Fields we need from the user-info response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub member_id: String,
    pub rest_base_url: String,
    pub soap_base_url: String,
}

impl UserInfo {
    /// Extracts member id and instance URLs from a user-info document.
    ///
    /// `member_id` may be a number or a string.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let member_id = match value.pointer("/organization/member_id") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => return Err("missing organization.member_id".to_string()),
        };
        let url_at = |pointer: &str| {
            value
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    format!("missing {}", pointer.trim_start_matches('/').replace('/', "."))
                })
        };
        Ok(Self {
            member_id,
            rest_base_url: url_at("/rest/rest_instance_url")?,
            soap_base_url: url_at("/rest/soap_instance_url")?,
        })
    }
}

/// Authenticated session facts for one run.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    access_token: String,
    member_id: String,
    rest_base_url: String,
    soap_base_url: String,
}

impl AuthContext {
    pub fn new(token: TokenResult, info: UserInfo) -> Self {
        Self {
            access_token: token.access_token,
            member_id: info.member_id,
            rest_base_url: info.rest_base_url,
            soap_base_url: info.soap_base_url,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    pub fn rest_base_url(&self) -> &str {
        &self.rest_base_url
    }

    /// SOAP service URL: `{soap_base}/Service.asmx`.
    pub fn soap_endpoint(&self) -> String {
        format!("{}/{SOAP_SERVICE_PATH}", self.soap_base_url.trim_end_matches('/'))
    }

    /// Rowset URL for the Data Extension with external key `key`.
    pub fn rowset_endpoint(&self, key: &str) -> String {
        format!(
            "{}/hub/v1/dataevents/key:{}/rowset",
            self.rest_base_url.trim_end_matches('/'),
            urlencoding::encode(key)
        )
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("access_token", &"***")
            .field("member_id", &self.member_id)
            .field("rest_base_url", &self.rest_base_url)
            .field("soap_base_url", &self.soap_base_url)
            .finish()
    }
}

/// Exchanges `credentials` for a token and resolves the tenant endpoints.
///
/// Any failure is an [`ProvisionError::Auth`]; nothing is retried.
pub async fn authenticate(
    api: &dyn PlatformApi,
    credentials: &Credentials,
) -> Result<AuthContext, ProvisionError> {
    debug!(client_id = credentials.client_id(), "Requesting access token");
    let token = api.post_oauth(credentials).await.map_err(auth_error)?;
    let info = api
        .get_userinfo(&token.access_token)
        .await
        .map_err(auth_error)?;

    info!(member_id = %info.member_id, "Authenticated");
    Ok(AuthContext::new(token, info))
}

fn auth_error(error: PlatformError) -> ProvisionError {
    error.at_stage(Stage::Authenticate, |source| ProvisionError::Auth { source })
}
