//! Blocking entry points.
//!
//! [`KsefClient`] here wraps the async client and drives it to completion on
//! an internal current-thread runtime. Classification, token caching, and
//! lifecycle behavior are the async implementation's — nothing is duplicated.
//!
//! Must not be used from within an async context; use
//! [`crate::client::KsefClient`] there instead.

use std::path::{Path, PathBuf};

use crate::core::{
    InvoiceFormat, InvoiceStatus, KsefConfig, KsefCredentials, KsefEnvironment, KsefError, Result,
    TokenResponse,
};

/// Blocking KSeF client.
pub struct KsefClient {
    inner: super::KsefClient,
    runtime: tokio::runtime::Runtime,
}

impl KsefClient {
    /// Build a blocking client for `environment` with default configuration.
    pub fn new(nip: &str, environment: KsefEnvironment) -> Result<Self> {
        Self::wrap(super::KsefClient::new(nip, environment)?)
    }

    /// Build a blocking client with explicit configuration.
    pub fn with_config(credentials: KsefCredentials, config: KsefConfig) -> Result<Self> {
        Self::wrap(super::KsefClient::with_config(credentials, config))
    }

    fn wrap(inner: super::KsefClient) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| KsefError::Internal(format!("failed to build runtime: {e}")))?;
        Ok(Self { inner, runtime })
    }

    /// See [`crate::client::KsefClient::authenticate`].
    pub fn authenticate(&self) -> Result<TokenResponse> {
        self.runtime.block_on(self.inner.authenticate())
    }

    /// See [`crate::client::KsefClient::send_invoice`].
    pub fn send_invoice(&self, xml_content: &str, filename: Option<&str>) -> Result<String> {
        self.runtime.block_on(self.inner.send_invoice(xml_content, filename))
    }

    /// See [`crate::client::KsefClient::get_status`].
    pub fn get_status(&self, ksef_number: &str) -> Result<InvoiceStatus> {
        self.runtime.block_on(self.inner.get_status(ksef_number))
    }

    /// See [`crate::client::KsefClient::download`].
    pub fn download(
        &self,
        ksef_number: &str,
        format: InvoiceFormat,
        output_path: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        self.runtime.block_on(self.inner.download(ksef_number, format, output_path))
    }

    /// See [`crate::client::KsefClient::close`].
    pub fn close(&self) {
        self.runtime.block_on(self.inner.close());
    }

    /// Credentials this client authenticates with.
    pub fn credentials(&self) -> &KsefCredentials {
        self.inner.credentials()
    }

    /// Active endpoint configuration.
    pub fn config(&self) -> &KsefConfig {
        self.inner.config()
    }
}
