//! Google Sheets v4 values API.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::config::{CredentialsSource, SheetConfig};
use crate::sheets::address::CellAddress;
use crate::sheets::auth::{AuthorizedUser, IssuedToken, refresh_access_token};
use crate::sheets::error::{StoreError, StoreResult};
use crate::sheets::{RecordStore, StoreFuture};

/// Renew an access token this long before the endpoint says it expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueUpdate<'a> {
    range: &'a str,
    major_dimension: &'a str,
    values: [[&'a str; 1]; 1],
}

/// Current bearer token and the instant it should be renewed.
#[derive(Debug)]
struct BearerToken {
    value: String,
    renew_at: Option<Instant>,
}

impl BearerToken {
    /// Empty token that is renewed on first use.
    fn pending() -> Self {
        Self {
            value: String::new(),
            renew_at: Some(Instant::now()),
        }
    }

    fn issued(token: IssuedToken) -> Self {
        let renew_at = token
            .expires_in
            .map(|secs| Instant::now() + Duration::from_secs(secs).saturating_sub(EXPIRY_MARGIN));
        Self {
            value: token.access_token,
            renew_at,
        }
    }

    fn is_stale(&self) -> bool {
        self.renew_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Refresh-token credentials and the endpoint that exchanges them.
#[derive(Debug)]
struct Refresher {
    user: AuthorizedUser,
    token_url: String,
}

/// Record store backed by a Google spreadsheet.
pub struct GoogleSheetsStore {
    client: Client,
    base_url: Url,
    refresher: Option<Refresher>,
    token: RwLock<BearerToken>,
}

impl GoogleSheetsStore {
    /// Create a store with a fixed bearer token that is never renewed.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn new(base_url: &str, access_token: impl Into<String>) -> StoreResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|err| StoreError::InvalidUrl(format!("{base_url}: {err}")))?;
        Ok(Self {
            client: Client::builder().build()?,
            base_url,
            refresher: None,
            token: RwLock::new(BearerToken {
                value: access_token.into(),
                renew_at: None,
            }),
        })
    }

    /// Create a store that obtains and renews access tokens from `token_url`.
    ///
    /// No request is made until the first store operation.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn with_authorized_user(
        base_url: &str,
        token_url: impl Into<String>,
        user: AuthorizedUser,
    ) -> StoreResult<Self> {
        let mut store = Self::new(base_url, String::new())?;
        store.refresher = Some(Refresher {
            user,
            token_url: token_url.into(),
        });
        store.token = RwLock::new(BearerToken::pending());
        Ok(store)
    }

    /// Resolve the configured credentials and create a store.
    ///
    /// # Errors
    /// Returns an error if the credentials cannot be read or refreshed.
    pub async fn connect(config: &SheetConfig) -> StoreResult<Self> {
        match &config.credentials {
            CredentialsSource::AccessToken { token } => Self::new(&config.api_base_url, token.clone()),
            CredentialsSource::AuthorizedUserFile { path } => {
                let user = AuthorizedUser::from_file(path)?;
                let store = Self::with_authorized_user(&config.api_base_url, &config.token_url, user)?;
                store.bearer().await?;
                Ok(store)
            }
        }
    }

    /// URL of `.../spreadsheets/{id}/values/{range}`, with the range percent-encoded.
    fn values_url(&self, sheet_id: &str, range: &str) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["spreadsheets", sheet_id, "values", range]);
        Ok(url)
    }

    /// Token to send with the next request, renewed first when it is stale.
    async fn bearer(&self) -> StoreResult<String> {
        {
            let token = self.token.read().await;
            if !token.is_stale() {
                return Ok(token.value.clone());
            }
        }
        self.renew(None).await
    }

    /// Renew the access token unless a concurrent request already did.
    ///
    /// `rejected` is the token the API just refused; without it the token is
    /// only renewed when stale.
    async fn renew(&self, rejected: Option<&str>) -> StoreResult<String> {
        let mut token = self.token.write().await;
        let Some(refresher) = &self.refresher else {
            return Ok(token.value.clone());
        };
        let current = match rejected {
            Some(rejected) => token.value != rejected,
            None => !token.is_stale(),
        };
        if current {
            return Ok(token.value.clone());
        }

        let issued = refresh_access_token(&self.client, &refresher.token_url, &refresher.user).await?;
        *token = BearerToken::issued(issued);
        Ok(token.value.clone())
    }

    /// Send an authenticated request, renewing the token and retrying once on 401.
    async fn send_authorized<F>(&self, build: F) -> StoreResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let bearer = self.bearer().await?;
        let response = build(&bearer).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED || self.refresher.is_none() {
            return Ok(response);
        }

        debug!("Sheets rejected the access token, renewing");
        let bearer = self.renew(Some(&bearer)).await?;
        Ok(build(&bearer).send().await?)
    }

    async fn get_values(&self, sheet_id: String, range: String) -> StoreResult<Vec<Vec<String>>> {
        let url = self.values_url(&sheet_id, &range)?;
        let response = self
            .send_authorized(|token| self.client.get(url.clone()).bearer_auth(token))
            .await?;
        let response = ensure_success(response).await?;

        let body: ValueRange = response.json().await?;
        Ok(body.values)
    }

    async fn put_value(&self, sheet_id: String, range: String, value: String) -> StoreResult<()> {
        let mut url = self.values_url(&sheet_id, &range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let body = ValueUpdate {
            range: &range,
            major_dimension: "ROWS",
            values: [[value.as_str()]],
        };

        let response = self
            .send_authorized(|token| self.client.put(url.clone()).bearer_auth(token).json(&body))
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(StoreError::Api {
        status: status.as_u16(),
        message: response.text().await.unwrap_or_default(),
    })
}

impl RecordStore for GoogleSheetsStore {
    fn read_range(&self, sheet_id: &str, range: &str) -> StoreFuture<'_, StoreResult<Vec<Vec<String>>>> {
        let sheet_id = sheet_id.to_string();
        let range = range.to_string();
        Box::pin(async move { self.get_values(sheet_id, range).await })
    }

    fn write_cell(
        &self,
        sheet_id: &str,
        address: &CellAddress,
        value: &str,
    ) -> StoreFuture<'_, StoreResult<()>> {
        let sheet_id = sheet_id.to_string();
        let range = address.to_string();
        let value = value.to_string();
        Box::pin(async move { self.put_value(sheet_id, range, value).await })
    }
}
