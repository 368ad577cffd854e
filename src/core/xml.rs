//! Invoice XML well-formedness checking.
//!
//! No schema validation is performed here — the platform rejects invalid
//! documents on its side. This check only guards against content that is not
//! XML at all, mirroring what the stub intake and the CLI `validate` command
//! need.

use quick_xml::Reader;
use quick_xml::events::Event;

use super::error::KsefError;

/// Check that `xml` parses as well-formed XML with at least one element.
///
/// # Errors
///
/// Returns [`KsefError::Validation`] with the parser's message on malformed
/// input, or when the document contains no element at all.
pub fn check_well_formed(xml: &str) -> Result<(), KsefError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut saw_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) | Ok(Event::Empty(_)) => saw_element = true,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(KsefError::validation(format!("malformed XML: {e}")));
            }
        }
    }

    if !saw_element {
        return Err(KsefError::validation("document contains no XML element"));
    }

    Ok(())
}

/// Well-formedness as a plain boolean, for call sites that only branch.
pub fn is_well_formed(xml: &str) -> bool {
    check_well_formed(xml).is_ok()
}
