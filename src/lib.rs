//! # ksef
//!
//! SDK for KSeF (Krajowy System e-Faktur), the Polish national e-invoicing
//! platform: token-based authentication, invoice XML submission, status
//! polling, and download in XML or PDF form.
//!
//! The crate also ships a stateful stub server that emulates the remote
//! platform for offline testing, and a thin CLI binary over the SDK.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ksef::client::KsefClient;
//! use ksef::core::{InvoiceFormat, KsefEnvironment};
//!
//! let client = KsefClient::new("123-456-78-90", KsefEnvironment::Test)?;
//!
//! let number = client.send_invoice(xml, Some("invoice.xml")).await?;
//! let status = client.get_status(&number).await?;
//! let path = client.download(&number, InvoiceFormat::Pdf, "out/invoice.pdf").await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `client` (default) | Async + blocking KSeF client over reqwest |
//! | `stub-server` | In-memory KSeF emulation service (axum) |
//! | `cli` | `ksef` command-line binary |
//! | `all` | Everything |

pub mod core;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "stub-server")]
pub mod stub;

// Re-export core types at crate root for convenience
pub use crate::core::*;
