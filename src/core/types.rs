use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::KsefError;

/// Target KSeF environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KsefEnvironment {
    /// Test environment (ksef-test.mf.gov.pl).
    Test,
    /// Production environment (ksef.mf.gov.pl).
    Prod,
}

impl KsefEnvironment {
    /// Default REST API base URL for this environment.
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Test => "https://ksef-test.mf.gov.pl/api",
            Self::Prod => "https://ksef.mf.gov.pl/api",
        }
    }

    /// Default SOAP endpoint base URL for this environment.
    pub fn soap_url(self) -> &'static str {
        match self {
            Self::Test => "https://ksef-test.mf.gov.pl/services",
            Self::Prod => "https://ksef.mf.gov.pl/services",
        }
    }

    /// Wire name ("test" / "prod").
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Prod => "prod",
        }
    }
}

impl FromStr for KsefEnvironment {
    type Err = KsefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "test" => Ok(Self::Test),
            "prod" => Ok(Self::Prod),
            other => Err(KsefError::validation(format!(
                "unknown environment '{other}' — expected 'test' or 'prod'"
            ))),
        }
    }
}

impl fmt::Display for KsefEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Taxpayer credentials: NIP plus target environment. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KsefCredentials {
    nip: String,
    environment: KsefEnvironment,
}

impl KsefCredentials {
    /// Build credentials from a NIP and environment.
    ///
    /// Formatting characters (dashes, spaces) are stripped before validation;
    /// the remainder must be exactly 10 ASCII digits.
    ///
    /// # Errors
    ///
    /// Returns [`KsefError::Validation`] if the NIP does not reduce to
    /// exactly 10 digits.
    pub fn new(nip: &str, environment: KsefEnvironment) -> Result<Self, KsefError> {
        let cleaned = clean_nip(nip)?;
        Ok(Self { nip: cleaned, environment })
    }

    /// Cleaned 10-digit NIP.
    pub fn nip(&self) -> &str {
        &self.nip
    }

    /// Target environment.
    pub fn environment(&self) -> KsefEnvironment {
        self.environment
    }
}

/// Strip `-` and whitespace, then require exactly 10 ASCII digits.
pub fn clean_nip(nip: &str) -> Result<String, KsefError> {
    let cleaned: String = nip
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();

    if cleaned.len() != 10 || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(KsefError::validation(format!(
            "NIP must contain exactly 10 digits, got '{nip}'"
        )));
    }

    Ok(cleaned)
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Endpoint and transport configuration for one client instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KsefConfig {
    /// REST API base URL, no trailing slash.
    pub base_url: String,
    /// SOAP endpoint base URL, no trailing slash.
    pub soap_url: String,
    /// Bound on every outbound transport call.
    pub timeout: Duration,
    /// Retry budget advertised to callers. The pipeline itself never retries.
    pub max_retries: u32,
}

impl KsefConfig {
    /// Build a configuration from explicit URLs.
    ///
    /// URLs must be absolute (`http://` or `https://`) and are normalized by
    /// stripping trailing slashes.
    ///
    /// # Errors
    ///
    /// Returns [`KsefError::Validation`] for a URL with any other scheme.
    pub fn new(base_url: &str, soap_url: &str) -> Result<Self, KsefError> {
        Ok(Self {
            base_url: normalize_url(base_url)?,
            soap_url: normalize_url(soap_url)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Default configuration for an environment, honouring the
    /// `KSEF_BASE_URL` and `KSEF_TIMEOUT_SECS` environment overrides.
    pub fn for_environment(environment: KsefEnvironment) -> Result<Self, KsefError> {
        let base = std::env::var("KSEF_BASE_URL")
            .unwrap_or_else(|_| environment.base_url().to_string());
        let mut config = Self::new(&base, environment.soap_url())?;

        if let Ok(secs) = std::env::var("KSEF_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                KsefError::validation(format!("KSEF_TIMEOUT_SECS must be an integer, got '{secs}'"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Replace the transport timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn normalize_url(url: &str) -> Result<String, KsefError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(KsefError::validation(format!(
            "URLs must start with http:// or https://, got '{url}'"
        )));
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Bearer token issued by the authentication endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Opaque bearer string.
    pub token: String,
    /// Absolute expiry instant. The token is valid while `now < expires_at`.
    pub expires_at: DateTime<Utc>,
    /// Server-side session identifier, when the platform issues one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl TokenResponse {
    /// Whether the token is still valid at `now`, with a conservative margin.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        now + margin < self.expires_at
    }
}

/// Processing status of a submitted invoice.
///
/// The real platform may produce any of the four; the stub server only ever
/// assigns [`InvoiceStatus::Accepted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Accepted,
    Rejected,
    Pending,
    Error,
}

impl InvoiceStatus {
    /// Wire name, matching the platform's status strings exactly.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::Rejected => "Rejected",
            Self::Pending => "Pending",
            Self::Error => "Error",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = KsefError;

    /// Fixed string table; anything else is a malformed remote response.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Accepted" => Ok(Self::Accepted),
            "Rejected" => Ok(Self::Rejected),
            "Pending" => Ok(Self::Pending),
            "Error" => Ok(Self::Error),
            other => Err(KsefError::validation(format!(
                "unknown invoice status '{other}' in response"
            ))),
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Download format for a processed invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceFormat {
    Xml,
    Pdf,
}

impl InvoiceFormat {
    /// Query-parameter value ("xml" / "pdf").
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Pdf => "pdf",
        }
    }

    /// Media type of the downloaded content.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Xml => "application/xml",
            Self::Pdf => "application/pdf",
        }
    }
}

impl FromStr for InvoiceFormat {
    type Err = KsefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xml" => Ok(Self::Xml),
            "pdf" => Ok(Self::Pdf),
            other => Err(KsefError::validation(format!(
                "unsupported format '{other}' — expected 'xml' or 'pdf'"
            ))),
        }
    }
}

impl fmt::Display for InvoiceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of `POST /v1/auth/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    /// 10-digit taxpayer NIP.
    pub nip: String,
    /// Target environment name ("test" / "prod").
    pub environment: String,
}

/// Body of `POST /v1/invoices/send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSendRequest {
    /// Raw invoice XML.
    pub xml_content: String,
    /// Original filename, if the caller has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Success body of `POST /v1/invoices/send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSendResponse {
    /// Assigned identifier, `KSEF:<year>:<country>/<nip>/<suffix>`.
    pub ksef_number: String,
}

/// Success body of `GET /v1/invoices/{number}/status`.
///
/// `status` stays a plain string here so an unknown value can be reported as
/// a validation failure instead of a deserialization error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceStatusResponse {
    pub ksef_number: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Error body returned by the platform on 4xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
