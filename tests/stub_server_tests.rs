#![cfg(feature = "stub-server")]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use ksef::core::{InvoiceStatusResponse, TokenResponse};
use ksef::stub::{StubStore, router};
use serde_json::{Value, json};
use tower::ServiceExt;

const SAMPLE_XML: &str = "<?xml version='1.0'?><invoice>test</invoice>";

fn app(store: &Arc<StubStore>) -> Router {
    router(store.clone())
}

/// KSeF numbers contain `:` and `/` and must travel percent-encoded in paths.
fn encode(number: &str) -> String {
    number.replace(':', "%3A").replace('/', "%2F")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn issue_token(store: &Arc<StubStore>) -> String {
    let response = app(store)
        .oneshot(
            Request::post("/v1/auth/token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"nip": "1234567890", "environment": "test"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let token: TokenResponse = serde_json::from_slice(&bytes).unwrap();
    token.token
}

async fn send_invoice(store: &Arc<StubStore>, token: &str, xml: &str) -> String {
    let response = app(store)
        .oneshot(
            Request::post("/v1/invoices/send")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(json!({"xml_content": xml}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    body_json(response).await["ksef_number"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn root_endpoint_reports_service_info() {
    let store = Arc::new(StubStore::new());
    let response =
        app(&store).oneshot(Request::get("/").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let info = body_json(response).await;
    assert_eq!(info["name"], "KSeF Stub Server");
    assert!(info["endpoints"].is_object());
}

#[tokio::test]
async fn health_endpoint() {
    let store = Arc::new(StubStore::new());
    let response =
        app(&store).oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health = body_json(response).await;
    assert_eq!(health["status"], "healthy");
    assert!(health["timestamp"].is_string());
}

#[tokio::test]
async fn token_issued_for_valid_request() {
    let store = Arc::new(StubStore::new());
    let token = issue_token(&store).await;
    assert!(token.starts_with("mock.jwt.token"));
    assert_eq!(store.session_count(), 1);
}

#[tokio::test]
async fn token_rejected_for_short_nip() {
    let store = Arc::new(StubStore::new());
    let response = app(&store)
        .oneshot(
            Request::post("/v1/auth/token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"nip": "123", "environment": "test"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].as_str().unwrap().contains("10 digits"));
}

#[tokio::test]
async fn token_rejected_for_unknown_environment() {
    let store = Arc::new(StubStore::new());
    let response = app(&store)
        .oneshot(
            Request::post("/v1/auth/token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"nip": "1234567890", "environment": "invalid"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invoice_accepted_and_numbered() {
    let store = Arc::new(StubStore::new());
    let token = issue_token(&store).await;
    let number = send_invoice(&store, &token, SAMPLE_XML).await;
    assert!(number.starts_with("KSEF:"));
    assert!(number.contains(":PL/1234567890/"));
}

#[tokio::test]
async fn invoice_rejected_without_bearer() {
    let store = Arc::new(StubStore::new());
    let response = app(&store)
        .oneshot(
            Request::post("/v1/invoices/send")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"xml_content": SAMPLE_XML}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invoice_rejected_for_unknown_token() {
    let store = Arc::new(StubStore::new());
    let response = app(&store)
        .oneshot(
            Request::post("/v1/invoices/send")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, "Bearer invalid.token")
                .body(Body::from(json!({"xml_content": SAMPLE_XML}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invoice_rejected_for_malformed_xml() {
    let store = Arc::new(StubStore::new());
    let token = issue_token(&store).await;
    let response = app(&store)
        .oneshot(
            Request::post("/v1/invoices/send")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(json!({"xml_content": "not xml content"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.invoice_count(), 0);
}

#[tokio::test]
async fn status_returns_accepted() {
    let store = Arc::new(StubStore::new());
    let token = issue_token(&store).await;
    let number = send_invoice(&store, &token, SAMPLE_XML).await;

    let response = app(&store)
        .oneshot(
            Request::get(format!("/v1/invoices/{}/status", encode(&number)))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let status: InvoiceStatusResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status.ksef_number, number);
    assert_eq!(status.status, "Accepted");
}

#[tokio::test]
async fn status_of_unknown_number_is_404() {
    let store = Arc::new(StubStore::new());
    let token = issue_token(&store).await;

    let response = app(&store)
        .oneshot(
            Request::get("/v1/invoices/NONEXISTENT/status")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_xml_returns_original_bytes() {
    let store = Arc::new(StubStore::new());
    let token = issue_token(&store).await;
    let number = send_invoice(&store, &token, SAMPLE_XML).await;

    let response = app(&store)
        .oneshot(
            Request::get(format!("/v1/invoices/{}/download?format=xml", encode(&number)))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xml");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], SAMPLE_XML.as_bytes());
}

#[tokio::test]
async fn download_pdf_returns_placeholder() {
    let store = Arc::new(StubStore::new());
    let token = issue_token(&store).await;
    let number = send_invoice(&store, &token, SAMPLE_XML).await;

    let response = app(&store)
        .oneshot(
            Request::get(format!("/v1/invoices/{}/download?format=pdf", encode(&number)))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(!bytes.is_empty());
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn download_rejects_unsupported_format() {
    let store = Arc::new(StubStore::new());
    let token = issue_token(&store).await;
    let number = send_invoice(&store, &token, SAMPLE_XML).await;

    let response = app(&store)
        .oneshot(
            Request::get(format!("/v1/invoices/{}/download?format=invalid", encode(&number)))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn clear_isolates_state() {
    let store = Arc::new(StubStore::new());
    let token = issue_token(&store).await;
    send_invoice(&store, &token, SAMPLE_XML).await;

    store.clear();

    // Old token no longer recognized after reset
    let response = app(&store)
        .oneshot(
            Request::post("/v1/invoices/send")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(json!({"xml_content": SAMPLE_XML}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
