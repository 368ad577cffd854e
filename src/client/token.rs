//! Token acquisition, caching, and renewal.

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::pipeline;
use crate::core::{KsefCredentials, KsefError, Result, TokenRequest, TokenResponse};

/// Tokens expiring within this margin are refreshed early, so a call never
/// goes out with a token about to be rejected mid-flight.
const REFRESH_MARGIN_SECS: i64 = 30;

/// Owns the single live token of one client instance.
///
/// Acquisition is serialized by holding the cache lock across the refresh
/// call: when several operations find the cache empty or expired at the same
/// time, exactly one acquisition request is made and every waiter observes
/// its result.
pub(crate) struct TokenManager {
    credentials: KsefCredentials,
    cached: Mutex<Option<TokenResponse>>,
}

impl TokenManager {
    pub(crate) fn new(credentials: KsefCredentials) -> Self {
        Self { credentials, cached: Mutex::new(None) }
    }

    /// Bearer string of a currently valid token, refreshing if needed.
    pub(crate) async fn bearer(&self, http: &reqwest::Client, base_url: &str) -> Result<String> {
        Ok(self.current(http, base_url).await?.token)
    }

    /// A currently valid token, refreshing if needed.
    pub(crate) async fn current(
        &self,
        http: &reqwest::Client,
        base_url: &str,
    ) -> Result<TokenResponse> {
        let mut guard = self.cached.lock().await;

        if let Some(token) = guard.as_ref() {
            if token.is_valid_at(Utc::now(), Duration::seconds(REFRESH_MARGIN_SECS)) {
                return Ok(token.clone());
            }
            debug!("cached token expired, re-acquiring");
        }

        let fresh = self.acquire(http, base_url).await?;
        *guard = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the cached token. The next call acquires a fresh one.
    pub(crate) async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    /// `POST /v1/auth/token`. Any non-2xx outcome is an authentication
    /// failure carrying the response status and structured error body.
    async fn acquire(&self, http: &reqwest::Client, base_url: &str) -> Result<TokenResponse> {
        let request = TokenRequest {
            nip: self.credentials.nip().to_string(),
            environment: self.credentials.environment().as_str().to_string(),
        };

        debug!(nip = %request.nip, environment = %request.environment, "acquiring token");

        let response = http
            .post(format!("{base_url}/v1/auth/token"))
            .json(&request)
            .send()
            .await
            .map_err(pipeline::transport_error)?;

        if !response.status().is_success() {
            let (status, detail) = pipeline::read_failure(response).await;
            return Err(KsefError::Authentication { status: Some(status), detail });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(pipeline::malformed_response)
    }
}
