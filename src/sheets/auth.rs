//! Bearer tokens for the Sheets API.
//!
//! Either a ready access token, or an authorized-user file (the format the
//! Google client libraries write after the consent flow) whose refresh token
//! is exchanged for short-lived access tokens as the run needs them.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::sheets::error::{StoreError, StoreResult};

/// Google OAuth token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Contents of an authorized-user credentials file.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthorizedUser {
    /// Credential type; only `authorized_user` is accepted when present.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
}

impl AuthorizedUser {
    /// Parse and check an authorized-user document.
    ///
    /// # Errors
    /// Returns an error if the JSON is invalid or describes another credential type.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let user: Self = serde_json::from_str(json)?;
        match user.kind.as_deref() {
            None | Some("authorized_user") => Ok(user),
            Some(other) => Err(StoreError::Credentials(format!(
                "unsupported credential type: {other}"
            ))),
        }
    }

    /// Read an authorized-user file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|err| {
            StoreError::Credentials(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

/// Access token issued by the token endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct IssuedToken {
    /// Bearer token value.
    pub access_token: String,
    /// Lifetime in seconds, when the endpoint reports one.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Exchange a refresh token for an access token.
///
/// # Errors
/// Returns an error if the token endpoint rejects the request.
pub async fn refresh_access_token(
    client: &reqwest::Client,
    token_url: &str,
    user: &AuthorizedUser,
) -> StoreResult<IssuedToken> {
    let response = client
        .post(token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", user.client_id.as_str()),
            ("client_secret", user.client_secret.as_str()),
            ("refresh_token", user.refresh_token.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(StoreError::Credentials(format!(
            "token refresh returned {status}: {}",
            response.text().await.unwrap_or_default()
        )));
    }

    let token: IssuedToken = response.json().await?;
    debug!(expires_in = ?token.expires_in, "Refreshed Sheets access token");
    Ok(token)
}
