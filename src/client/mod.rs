//! KSeF client: authentication, invoice submission, status polling, download.
//!
//! One [`KsefClient`] instance owns one cached token and one lazily-created
//! transport handle. Dropping the client (or calling [`KsefClient::close`])
//! releases both; the next call after a close re-acquires transport and
//! token. The blocking variant in [`blocking`] drives the same async code on
//! an internal runtime.
//!
//! # Example
//!
//! ```ignore
//! use ksef::client::KsefClient;
//! use ksef::core::{InvoiceFormat, KsefEnvironment};
//!
//! let client = KsefClient::new("1234567890", KsefEnvironment::Test)?;
//! let number = client.send_invoice(xml, None).await?;
//! let status = client.get_status(&number).await?;
//! client.download(&number, InvoiceFormat::Xml, "invoice.xml").await?;
//! ```

pub mod blocking;
mod pipeline;
mod token;

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

use self::token::TokenManager;
use crate::core::{
    InvoiceFormat, InvoiceSendRequest, InvoiceSendResponse, InvoiceStatus, InvoiceStatusResponse,
    KsefConfig, KsefCredentials, KsefEnvironment, KsefError, Result, TokenResponse,
};

/// Asynchronous KSeF client.
pub struct KsefClient {
    credentials: KsefCredentials,
    config: KsefConfig,
    tokens: TokenManager,
    http: Mutex<Option<reqwest::Client>>,
}

impl KsefClient {
    /// Build a client for `environment` with its default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KsefError::Validation`] for a NIP not reducing to 10 digits
    /// or an invalid configured URL.
    pub fn new(nip: &str, environment: KsefEnvironment) -> Result<Self> {
        let credentials = KsefCredentials::new(nip, environment)?;
        let config = KsefConfig::for_environment(environment)?;
        Ok(Self::with_config(credentials, config))
    }

    /// Build a client with explicit configuration (e.g. pointed at a stub
    /// server).
    pub fn with_config(credentials: KsefCredentials, config: KsefConfig) -> Self {
        let tokens = TokenManager::new(credentials.clone());
        Self { credentials, config, tokens, http: Mutex::new(None) }
    }

    /// Credentials this client authenticates with.
    pub fn credentials(&self) -> &KsefCredentials {
        &self.credentials
    }

    /// Active endpoint configuration.
    pub fn config(&self) -> &KsefConfig {
        &self.config
    }

    /// Explicitly acquire (or return the still-valid cached) token.
    ///
    /// Every operation does this implicitly; the method exists for callers
    /// that want the expiry or session identifier.
    pub async fn authenticate(&self) -> Result<TokenResponse> {
        let http = self.transport().await?;
        self.tokens.current(&http, &self.config.base_url).await
    }

    /// Submit an invoice XML document. Returns the assigned KSeF number.
    pub async fn send_invoice(&self, xml_content: &str, filename: Option<&str>) -> Result<String> {
        let http = self.transport().await?;
        let bearer = self.tokens.bearer(&http, &self.config.base_url).await?;

        let body = InvoiceSendRequest {
            xml_content: xml_content.to_string(),
            filename: filename.map(str::to_string),
        };

        debug!(filename = ?body.filename, "sending invoice");

        let response = pipeline::send(
            http.post(format!("{}/v1/invoices/send", self.config.base_url))
                .bearer_auth(&bearer)
                .json(&body),
        )
        .await?;

        let payload: InvoiceSendResponse =
            response.json().await.map_err(pipeline::malformed_response)?;
        Ok(payload.ksef_number)
    }

    /// Query the processing status of a submitted invoice.
    ///
    /// # Errors
    ///
    /// [`KsefError::NotFound`] for an unregistered number;
    /// [`KsefError::Validation`] if the platform returns a status string
    /// outside the documented set.
    pub async fn get_status(&self, ksef_number: &str) -> Result<InvoiceStatus> {
        let http = self.transport().await?;
        let bearer = self.tokens.bearer(&http, &self.config.base_url).await?;

        let response = pipeline::send(
            http.get(format!(
                "{}/v1/invoices/{}/status",
                self.config.base_url,
                urlencoding::encode(ksef_number)
            ))
            .bearer_auth(&bearer),
        )
        .await?;

        let payload: InvoiceStatusResponse =
            response.json().await.map_err(pipeline::malformed_response)?;
        payload.status.parse()
    }

    /// Download a processed invoice in the requested format and write the
    /// raw bytes to `output_path`. Parent directories are created if absent.
    /// Returns the output path.
    pub async fn download(
        &self,
        ksef_number: &str,
        format: InvoiceFormat,
        output_path: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let http = self.transport().await?;
        let bearer = self.tokens.bearer(&http, &self.config.base_url).await?;

        let response = pipeline::send(
            http.get(format!(
                "{}/v1/invoices/{}/download",
                self.config.base_url,
                urlencoding::encode(ksef_number)
            ))
            .query(&[("format", format.as_str())])
            .bearer_auth(&bearer),
        )
        .await?;

        let bytes = response.bytes().await.map_err(pipeline::transport_error)?;

        let path = output_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, &bytes).await?;

        debug!(path = %path.display(), bytes = bytes.len(), "invoice written");
        Ok(path.to_path_buf())
    }

    /// Release the transport handle and clear all token state.
    ///
    /// The client remains usable: the next operation re-acquires both.
    /// Dropping the client releases the same resources implicitly.
    pub async fn close(&self) {
        *self.http.lock().await = None;
        self.tokens.invalidate().await;
    }

    /// Transport handle, created on first use with the configured timeout.
    async fn transport(&self) -> Result<reqwest::Client> {
        let mut guard = self.http.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| KsefError::Internal(format!("failed to build HTTP client: {e}")))?;

        debug!(timeout = ?self.config.timeout, "transport created");
        *guard = Some(client.clone());
        Ok(client)
    }
}
