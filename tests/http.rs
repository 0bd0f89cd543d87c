//! HTTP API tests against a server bound to an ephemeral port.

#![cfg(feature = "server")]

mod common;

use common::*;
use pitchdeck_classifier::server;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

struct TestServer {
    base: String,
    client: reqwest::Client,
    _harness: Harness,
    _task: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start(h: Harness) -> Self {
        let analyzer = Arc::new(h.analyzer());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let task = tokio::spawn(server::serve_on(listener, analyzer));
        Self {
            base,
            client: reqwest::Client::new(),
            _harness: h,
            _task: task,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.delete(self.url(path)).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }
}

fn multipart_pdf(boundary: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn analyze_returns_overview_and_detailed_analysis() {
    let h = Harness::local_only(ScriptedCompleter::new(OVERVIEW_JSON, ROUND_ONE_JSON));
    h.put_local_pdf("uploads", "acme.pdf");
    let srv = TestServer::start(h).await;

    let (status, body) = srv.post("/api/analyze", json!({ "filename": "acme.pdf" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Overview"]["Geography"], "Europe");
    assert_eq!(body["Overview"]["OverallScore"], 7);
    assert_eq!(body["DetailedAnalysis"]["Team"][0]["Score"], 8);
    assert_eq!(body["ParseMisses"], json!([]));

    let (status, names) = srv.get("/api/analyses").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names, json!(["acme_analysis.json"]));

    let (_, doc) = srv.get("/api/overviews/acme_overview.json").await;
    assert_eq!(doc["Overview"]["Stage"], "Pre-Seed");
}

#[tokio::test]
async fn analyze_error_statuses() {
    let h = Harness::local_only(ScriptedCompleter::failing_overview("quota exceeded"));
    h.put_local_pdf("uploads", "acme.pdf");
    let srv = TestServer::start(h).await;

    let (status, body) = srv.post("/api/analyze", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Filename is required"));

    let (status, body) = srv.post("/api/analyze", json!({ "filename": "ghost.pdf" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["step"], "fetch_pdf");

    let (status, body) = srv.post("/api/analyze", json!({ "filename": "acme.pdf" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["step"], "request_overview");

    let (status, _) = srv
        .post("/api/round_two_analysis", json!({ "filename": "ghost.pdf" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn round_two_route_omits_overview() {
    let h = Harness::local_only(ScriptedCompleter::new(OVERVIEW_JSON, ROUND_TWO_TABLE));
    h.put_local_pdf("r1_successful_pitchdecks", "acme.pdf");
    let srv = TestServer::start(h).await;

    let (status, body) = srv
        .post("/api/round_two_analysis", json!({ "filename": "acme.pdf" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("Overview").is_none());
    assert_eq!(body["DetailedAnalysis"]["Market"][0]["Score"], 9);

    let (_, names) = srv.get("/api/r2_analyses").await;
    assert_eq!(names, json!(["acme_r2_analysis.json"]));
}

#[tokio::test]
async fn upload_list_download_and_delete() {
    let srv = TestServer::start(Harness::local_only(ScriptedCompleter::new(
        OVERVIEW_JSON,
        ROUND_ONE_JSON,
    )))
    .await;

    let boundary = "deckboundary";
    let resp = srv
        .client
        .post(srv.url("/api/upload"))
        .header(
            reqwest::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(multipart_pdf(boundary, "acme.pdf", b"%PDF-1.7 body"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["filename"], "acme.pdf");
    assert_eq!(body["persistence"]["local"]["status"], "saved");
    assert_eq!(body["persistence"]["remote"]["status"], "skipped");

    let (_, listing) = srv.get("/api/local-uploads").await;
    assert_eq!(listing, json!([{ "filename": "acme.pdf" }]));

    let resp = srv.client.get(srv.url("/uploads/acme.pdf")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[reqwest::header::CONTENT_TYPE], "application/pdf");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"%PDF-1.7 body");

    let (status, _) = srv.delete("/api/delete/acme.pdf").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = srv.delete("/api/delete/acme.pdf").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_rejects_non_pdf() {
    let srv = TestServer::start(Harness::local_only(ScriptedCompleter::new(
        OVERVIEW_JSON,
        ROUND_ONE_JSON,
    )))
    .await;

    let resp = srv
        .client
        .post(srv.url("/api/upload"))
        .header(reqwest::header::CONTENT_TYPE, "multipart/form-data; boundary=b")
        .body(multipart_pdf("b", "notes.pdf", b"hello world"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn copy_and_list_successful_pitchdecks() {
    let h = Harness::local_only(ScriptedCompleter::new(OVERVIEW_JSON, ROUND_ONE_JSON));
    h.put_local_pdf("uploads", "acme.pdf");
    let srv = TestServer::start(h).await;

    let (status, _) = srv
        .post("/api/copy_successful_pitchdecks", json!({ "filenames": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = srv
        .post(
            "/api/copy_successful_pitchdecks",
            json!({ "filenames": ["acme.pdf", "ghost.pdf"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["copied"], json!(["acme.pdf"]));
    assert_eq!(body["skipped"], json!(["ghost.pdf"]));
    assert_eq!(body["failed"], json!([]));
    assert_eq!(body["persistence"][0]["name"], "acme.pdf");

    let (_, body) = srv.get("/api/successful_pitchdecks").await;
    assert_eq!(body, json!({ "filenames": ["acme.pdf"] }));
}

#[tokio::test]
async fn collection_delete_and_bad_names() {
    let h = Harness::local_only(ScriptedCompleter::new(OVERVIEW_JSON, ROUND_ONE_JSON));
    h.put_local_pdf("uploads", "acme.pdf");
    let srv = TestServer::start(h).await;
    srv.post("/api/analyze", json!({ "filename": "acme.pdf" })).await;

    let (status, _) = srv.get("/api/responses/missing.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = srv.get("/api/responses/..%2Fsecret.json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = srv.delete("/api/responses").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 1);
    assert_eq!(body["failures"], json!([]));
    let (_, names) = srv.get("/api/responses").await;
    assert_eq!(names, json!([]));
}

#[tokio::test]
async fn sync_check_and_health() {
    let srv = TestServer::start(Harness::with_remote(ScriptedCompleter::new(
        OVERVIEW_JSON,
        ROUND_ONE_JSON,
    )))
    .await;

    let (status, body) = srv.get("/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = srv.get("/api/sync_check").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remote_configured"], true);
    assert_eq!(body["discrepancies"]["overviews"], json!([]));
}
