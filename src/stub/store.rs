//! In-memory lifecycle store backing the stub server.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::core::{InvoiceFormat, InvoiceStatus, KsefEnvironment, TokenResponse, clean_nip, xml};

/// Issued tokens live this long.
const TOKEN_TTL_SECS: i64 = 3600;

/// Protocol-level rejection reported by the simulated remote side.
///
/// Never a client-side error type: the server layer maps these to HTTP
/// status codes, exactly as the real platform would respond.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubRejection {
    /// HTTP 400 equivalent — invalid NIP, environment, XML, or format.
    BadRequest(String),
    /// HTTP 401 equivalent — missing, unknown, or expired bearer token.
    Unauthorized(String),
    /// HTTP 404 equivalent — unknown KSeF number.
    NotFound(String),
}

impl fmt::Display for StubRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(m) => write!(f, "bad request: {m}"),
            Self::Unauthorized(m) => write!(f, "unauthorized: {m}"),
            Self::NotFound(m) => write!(f, "not found: {m}"),
        }
    }
}

impl std::error::Error for StubRejection {}

/// Session metadata stored per issued token.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer string the session is keyed by.
    pub token: String,
    /// Cleaned 10-digit NIP the token was issued for.
    pub nip: String,
    /// Environment named in the token request.
    pub environment: KsefEnvironment,
    /// Expiry instant (issue time + 1 h).
    pub expires_at: DateTime<Utc>,
    /// Session identifier returned alongside the token.
    pub session_token: String,
}

/// One stored invoice.
#[derive(Debug, Clone)]
pub struct InvoiceRecord {
    /// Assigned `KSEF:<year>:PL/<nip>/<suffix>` identifier.
    pub ksef_number: String,
    /// Raw submitted content.
    pub content: Vec<u8>,
    /// Filename from the submission, if any.
    pub filename: Option<String>,
    /// Assigned status. The stub only ever assigns `Accepted`; the
    /// remaining statuses exist in the real protocol but are intentionally
    /// unreachable here.
    pub status: InvoiceStatus,
    /// Submission instant.
    pub received_at: DateTime<Utc>,
    /// Session that submitted the invoice.
    pub session_token: String,
}

/// Stateful invoice lifecycle emulation.
///
/// An explicit object with injectable lifetime — no process-wide state.
/// Tests hold their own instance and call [`StubStore::clear`] for
/// isolation; multiple isolated stores can run concurrently. Maps support
/// concurrent reads with exclusive writes; new numbers are inserted
/// if-absent so a partially-written record is never observable.
#[derive(Debug, Default)]
pub struct StubStore {
    sessions: RwLock<HashMap<String, Session>>,
    invoices: RwLock<HashMap<String, InvoiceRecord>>,
    counter: AtomicU64,
}

impl StubStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the request and issue a bearer token valid for one hour.
    pub fn issue_token(
        &self,
        nip: &str,
        environment: &str,
    ) -> Result<TokenResponse, StubRejection> {
        let nip = clean_nip(nip).map_err(reject_bad_request)?;
        let environment: KsefEnvironment = environment.parse().map_err(reject_bad_request)?;

        let token = format!("mock.jwt.token.{}", Uuid::new_v4().simple());
        let session_token = format!("session_{}", Uuid::new_v4().simple());
        let expires_at = Utc::now() + Duration::seconds(TOKEN_TTL_SECS);

        let session = Session {
            token: token.clone(),
            nip,
            environment,
            expires_at,
            session_token: session_token.clone(),
        };

        debug!(token = %token, nip = %session.nip, "token issued");
        self.sessions
            .write()
            .expect("sessions lock poisoned")
            .insert(token.clone(), session);

        Ok(TokenResponse { token, expires_at, session_token: Some(session_token) })
    }

    /// Store a submitted invoice and assign it a unique KSeF number.
    /// The record is created with status `Accepted` — terminal in this
    /// simulation.
    pub fn receive_invoice(
        &self,
        token: &str,
        xml_content: &str,
        filename: Option<&str>,
    ) -> Result<String, StubRejection> {
        let session = self.session_for(token)?;

        xml::check_well_formed(xml_content).map_err(reject_bad_request)?;

        let year = Utc::now().format("%Y");
        let mut invoices = self.invoices.write().expect("invoices lock poisoned");

        loop {
            let suffix = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            let number = format!("KSEF:{year}:PL/{}/{suffix:06}", session.nip);

            match invoices.entry(number.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(InvoiceRecord {
                        ksef_number: number.clone(),
                        content: xml_content.as_bytes().to_vec(),
                        filename: filename.map(str::to_string),
                        status: InvoiceStatus::Accepted,
                        received_at: Utc::now(),
                        session_token: session.session_token.clone(),
                    });
                    debug!(ksef_number = %number, "invoice stored");
                    return Ok(number);
                }
            }
        }
    }

    /// Stored status plus submission timestamp of an invoice.
    pub fn invoice_status(
        &self,
        token: &str,
        ksef_number: &str,
    ) -> Result<(InvoiceStatus, DateTime<Utc>), StubRejection> {
        self.session_for(token)?;

        let invoices = self.invoices.read().expect("invoices lock poisoned");
        let record = invoices
            .get(ksef_number)
            .ok_or_else(|| StubRejection::NotFound(format!("unknown KSeF number '{ksef_number}'")))?;

        Ok((record.status, record.received_at))
    }

    /// Invoice content in the requested format, with its media type.
    ///
    /// `xml` returns the original submitted bytes; `pdf` a synthesized
    /// placeholder — no real rendering is performed.
    pub fn download_invoice(
        &self,
        token: &str,
        ksef_number: &str,
        format: &str,
    ) -> Result<(&'static str, Vec<u8>), StubRejection> {
        self.session_for(token)?;

        let invoices = self.invoices.read().expect("invoices lock poisoned");
        let record = invoices
            .get(ksef_number)
            .ok_or_else(|| StubRejection::NotFound(format!("unknown KSeF number '{ksef_number}'")))?;

        let format: InvoiceFormat = format.parse().map_err(reject_bad_request)?;

        let content = match format {
            InvoiceFormat::Xml => record.content.clone(),
            InvoiceFormat::Pdf => placeholder_pdf(&record.ksef_number),
        };

        Ok((format.content_type(), content))
    }

    /// Reset the store to empty. Used for test isolation.
    pub fn clear(&self) {
        self.sessions.write().expect("sessions lock poisoned").clear();
        self.invoices.write().expect("invoices lock poisoned").clear();
    }

    /// Number of currently issued tokens.
    pub fn session_count(&self) -> usize {
        self.sessions.read().expect("sessions lock poisoned").len()
    }

    /// Number of stored invoices.
    pub fn invoice_count(&self) -> usize {
        self.invoices.read().expect("invoices lock poisoned").len()
    }

    fn session_for(&self, token: &str) -> Result<Session, StubRejection> {
        let sessions = self.sessions.read().expect("sessions lock poisoned");
        let session = sessions
            .get(token)
            .ok_or_else(|| StubRejection::Unauthorized("unrecognized bearer token".into()))?;

        if session.expires_at <= Utc::now() {
            return Err(StubRejection::Unauthorized("bearer token expired".into()));
        }

        Ok(session.clone())
    }
}

fn reject_bad_request(err: crate::core::KsefError) -> StubRejection {
    StubRejection::BadRequest(err.detail().unwrap_or("invalid request").to_string())
}

/// Minimal but structurally plausible PDF bytes.
fn placeholder_pdf(ksef_number: &str) -> Vec<u8> {
    format!(
        "%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n% Stub invoice {ksef_number}\n%%EOF\n"
    )
    .into_bytes()
}
