//! Core KSeF types: credentials, configuration, statuses, wire model,
//! the error taxonomy, and XML well-formedness checking.
//!
//! Everything the client and the stub server share lives here.

mod error;
mod types;
pub mod xml;

pub use error::*;
pub use types::*;
pub use xml::{check_well_formed, is_well_formed};
