//! Outcome classification shared by every outbound call.
//!
//! One async core maps transport results onto the error taxonomy; the
//! blocking client drives the same code, so the two entry styles can never
//! diverge in behavior. The pipeline performs no retries — retry policy
//! belongs to the caller.

use reqwest::{RequestBuilder, Response};
use tracing::debug;

use crate::core::{ErrorBody, KsefError, Result};

/// Issue a prepared request and classify the outcome.
///
/// 2xx responses are returned for the caller to decode; everything else is
/// translated into the matching [`KsefError`] variant.
pub(crate) async fn send(builder: RequestBuilder) -> Result<Response> {
    let response = builder.send().await.map_err(transport_error)?;
    let status = response.status();
    debug!(%status, url = %response.url(), "received response");

    if status.is_success() {
        return Ok(response);
    }

    let (code, detail) = read_failure(response).await;
    Err(classify(code, detail))
}

/// Map an HTTP failure status to the error taxonomy.
pub(crate) fn classify(status: u16, detail: Option<String>) -> KsefError {
    match status {
        400 => KsefError::Validation { status: Some(status), detail },
        401 | 403 => KsefError::Authentication { status: Some(status), detail },
        404 => KsefError::NotFound { status: Some(status), detail },
        _ => KsefError::Transport { status: Some(status), detail, source: None },
    }
}

/// Drain a failed response into its status code and a detail payload.
///
/// Prefers the platform's structured `{error}` body; falls back to a raw
/// body fragment.
pub(crate) async fn read_failure(response: Response) -> (u16, Option<String>) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let detail = if body.is_empty() {
        None
    } else {
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => Some(parsed.error),
            Err(_) => Some(truncate(&body)),
        }
    };

    (status, detail)
}

/// Network-level failure: connect error, timeout, or body read failure.
/// No HTTP status is available.
pub(crate) fn transport_error(err: reqwest::Error) -> KsefError {
    let detail = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    };

    KsefError::Transport {
        status: None,
        detail: Some(detail),
        source: Some(Box::new(err)),
    }
}

/// A 2xx response whose body does not decode is a malformed remote response.
pub(crate) fn malformed_response(err: reqwest::Error) -> KsefError {
    KsefError::Validation {
        status: None,
        detail: Some(format!("malformed response from server: {err}")),
    }
}

const DETAIL_LIMIT: usize = 512;

fn truncate(body: &str) -> String {
    if body.len() <= DETAIL_LIMIT {
        return body.to_string();
    }
    let mut end = DETAIL_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_400_as_validation() {
        let err = classify(400, Some("Invalid XML".into()));
        assert!(matches!(err, KsefError::Validation { status: Some(400), .. }));
    }

    #[test]
    fn classify_401_and_403_as_authentication() {
        assert!(matches!(classify(401, None), KsefError::Authentication { status: Some(401), .. }));
        assert!(matches!(classify(403, None), KsefError::Authentication { status: Some(403), .. }));
    }

    #[test]
    fn classify_404_as_not_found() {
        assert!(matches!(classify(404, None), KsefError::NotFound { status: Some(404), .. }));
    }

    #[test]
    fn classify_other_as_transport_with_status() {
        assert!(matches!(classify(500, None), KsefError::Transport { status: Some(500), .. }));
        assert!(matches!(classify(502, None), KsefError::Transport { status: Some(502), .. }));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let body = "ą".repeat(DETAIL_LIMIT);
        let cut = truncate(&body);
        assert!(cut.len() <= DETAIL_LIMIT);
        assert!(cut.chars().all(|c| c == 'ą'));
    }
}
