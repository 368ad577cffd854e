//! Stateful KSeF platform emulation for offline testing.
//!
//! The stub issues tokens, accepts invoice submissions, assigns statuses,
//! and serves downloads over the same wire protocol as the real platform.
//! Every accepted invoice immediately reaches the terminal `Accepted`
//! status; the real platform's Pending/Rejected/Error outcomes are
//! intentionally never simulated.
//!
//! # Example
//!
//! ```ignore
//! use ksef::stub::StubServer;
//!
//! let server = StubServer::start("127.0.0.1:0".parse()?).await?;
//! let base_url = server.base_url();
//! // ... point a KsefClient at base_url ...
//! server.shutdown().await?;
//! ```

mod server;
mod store;

pub use server::{StubServer, router, serve};
pub use store::{InvoiceRecord, Session, StubRejection, StubStore};
