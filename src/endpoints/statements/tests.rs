use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bytes::Bytes;
use chrono_tz::Tz;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::{
    app,
    config::{Config, S3Config, UploadPolicy},
    state::AppState,
    storage::Storage,
};

const BOUNDARY: &str = "statement-boundary";

fn test_config(upload_policy: UploadPolicy) -> Config {
    Config {
        s3: S3Config {
            bucket: "statements".to_owned(),
            region: "eu-central-1".to_owned(),
            endpoint: None,
            access_key: String::new(),
            secret_key: String::new(),
        },
        upload_policy,
        upload_timezone: Tz::UTC,
        max_upload_bytes: 64 * 1024,
        front_base_url: None,
        port: 0,
        otel_exporter_otlp_endpoint: None,
    }
}

fn setup_test_app(upload_policy: UploadPolicy) -> (Router, Storage) {
    let storage = Storage::in_memory();
    let state = AppState {
        config: Arc::new(test_config(upload_policy)),
        storage: storage.clone(),
    };

    (app(state).unwrap(), storage)
}

fn upload_request(part_headers: &str, body: &str) -> Request<Body> {
    let payload = format!(
        "--{BOUNDARY}\r\n{part_headers}\r\n\r\n{body}\r\n--{BOUNDARY}--\r\n"
    );

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Body::from(payload))
        .unwrap()
}

fn file_upload(file_name: &str, body: &str) -> Request<Body> {
    upload_request(
        &format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: text/csv"
        ),
        body,
    )
}

fn get_latest(query: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/api/upload{query}"))
        .body(Body::empty())
        .unwrap()
}

async fn get_body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn stored_keys(storage: &Storage) -> Vec<String> {
    let mut keys = storage
        .list("")
        .await
        .unwrap()
        .into_iter()
        .map(|object| object.key)
        .collect::<Vec<_>>();
    keys.sort();
    keys
}

#[tokio::test]
async fn test_latest_without_statements() {
    let (app, _) = setup_test_app(UploadPolicy::AccountPrefix);

    let response = app.oneshot(get_latest("")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "No CSV files found" })
    );
}

#[tokio::test]
async fn test_upload_then_latest() {
    let (app, _) = setup_test_app(UploadPolicy::AccountPrefix);

    let response = app
        .clone()
        .oneshot(file_upload(
            "ABC123_statement.csv",
            "Datum;Bedrag;Valuta Rekening;Mededeling;Rekening\n2024-01-01;10,00;EUR;Coffee;BE01",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await, json!({ "success": true }));

    let response = app.oneshot(get_latest("")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        get_body_json(response).await,
        json!({
            "data": [
                {
                    "Date": "2024-01-01",
                    "Amount": "10,00",
                    "Currency": "EUR",
                    "Description": "Coffee"
                }
            ]
        })
    );
}

#[tokio::test]
async fn test_upload_replaces_account_statement() {
    let (app, storage) = setup_test_app(UploadPolicy::AccountPrefix);

    for file_name in ["ABC123_statement.csv", "ABC123_other.csv"] {
        let response = app
            .clone()
            .oneshot(file_upload(file_name, "Datum\n2024-01-01"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(stored_keys(&storage).await, vec!["ABC123_other.csv"]);
}

#[tokio::test]
async fn test_upload_rejects_non_csv() {
    let (app, storage) = setup_test_app(UploadPolicy::AccountPrefix);

    let response = app.oneshot(file_upload("data.txt", "hello")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "Only .csv files are allowed" })
    );
    assert!(stored_keys(&storage).await.is_empty());
}

#[tokio::test]
async fn test_upload_without_file() {
    let (app, _) = setup_test_app(UploadPolicy::AccountPrefix);

    let response = app
        .clone()
        .oneshot(upload_request(
            "Content-Disposition: form-data; name=\"file\"",
            "just text",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "No file uploaded" })
    );

    let response = app
        .clone()
        .oneshot(upload_request(
            "Content-Disposition: form-data; name=\"other\"; filename=\"a.csv\"",
            "Datum",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/upload")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "No file uploaded" })
    );
}

#[tokio::test]
async fn test_upload_too_large() {
    let (app, storage) = setup_test_app(UploadPolicy::AccountPrefix);

    let response = app
        .oneshot(file_upload("ABC_big.csv", &"x".repeat(128 * 1024)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "File is too large" })
    );
    assert!(stored_keys(&storage).await.is_empty());
}

#[tokio::test]
async fn test_upload_too_large_without_content_length() {
    let (app, storage) = setup_test_app(UploadPolicy::AccountPrefix);

    let mut request = file_upload("ABC_big.csv", &"x".repeat(128 * 1024));
    request.headers_mut().remove(header::CONTENT_LENGTH);

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "File is too large" })
    );
    assert!(stored_keys(&storage).await.is_empty());
}

#[tokio::test]
async fn test_latest_malformed_csv() {
    let (app, storage) = setup_test_app(UploadPolicy::AccountPrefix);

    storage
        .put(
            "ABC_broken.csv",
            Bytes::from_static(b"Datum;Bedrag\n2024-01-01;1,00;extra\n"),
            "text/csv",
        )
        .await
        .unwrap();

    let response = app.oneshot(get_latest("")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "Failed to parse CSV" })
    );
}

#[tokio::test]
async fn test_latest_unclosed_quote() {
    let (app, storage) = setup_test_app(UploadPolicy::AccountPrefix);

    storage
        .put(
            "ABC_broken.csv",
            Bytes::from_static(b"Datum;Mededeling\n2024-01-01;\"Coffee\n"),
            "text/csv",
        )
        .await
        .unwrap();

    let response = app.oneshot(get_latest("")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        get_body_json(response).await,
        json!({ "error": "Failed to parse CSV" })
    );
}

#[tokio::test]
async fn test_latest_by_account() {
    let (app, _) = setup_test_app(UploadPolicy::AccountPrefix);

    for (file_name, body) in [
        ("ABC_jan.csv", "Datum\n2024-01-31"),
        ("XYZ_jan.csv", "Datum\n2024-01-30"),
    ] {
        let response = app
            .clone()
            .oneshot(file_upload(file_name, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(get_latest("?account=ABC")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        get_body_json(response).await,
        json!({ "data": [{ "Date": "2024-01-31" }] })
    );

    let response = app.clone().oneshot(get_latest("?account=")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get_latest("?account=NONE")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get_latest("?account=A-B")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_and_openapi() {
    let (app, _) = setup_test_app(UploadPolicy::AccountPrefix);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc = get_body_json(response).await;
    assert!(doc["paths"]["/upload"]["get"].is_object());
    assert!(doc["paths"]["/upload"]["post"].is_object());

    let file = &doc["components"]["schemas"]["UploadForm"]["properties"]["file"];
    assert_eq!(file["type"], "string");
    assert_eq!(file["format"], "binary");
}
