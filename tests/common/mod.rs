#![allow(dead_code)]

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use turath_library::config::LibraryConfig;
use turath_library::db::init_schema;
use turath_library::LibraryService;

pub const SCENARIO_A_ROOT: &str =
    "علوم القرآن/مسائل نافع بن الأزرق عن ابن عباس - ت الدالي - ط الجفان والجابي";

pub struct TestLibrary {
    pub dir: tempfile::TempDir,
    pub db_path: PathBuf,
}

impl TestLibrary {
    pub fn seeded() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("turath_metadata.db");
        let conn = init_schema(&db_path).expect("schema");
        conn.execute_batch(
            "INSERT INTO cats (id, name) VALUES (4, 'علوم القرآن'), (9, 'Fiqih');
             INSERT INTO authors (id, name, death, death_inexact_label)
                VALUES (263, 'ابن عباس', 68, NULL);
             INSERT INTO books (id, name, author_id, cat_id, info_long, printed, size)
                VALUES (23622, 'مسائل نافع بن الأزرق', 263, 4, 'info', 1, 1.5);
             INSERT INTO books (id, name, author_id, cat_id, pdf_links, has_pdf)
                VALUES (2, 'Kitab Dua', NULL, 9, '{\"files\":[\"old.pdf\"],\"root\":\"old\"}', 1);
             INSERT INTO books (id, name) VALUES (7, 'X');",
        )
        .expect("seed");
        Self { dir, db_path }
    }

    pub fn service(&self, api_base_url: &str) -> LibraryService {
        service_for(api_base_url, &self.db_path)
    }

    pub fn pdf_state(&self, book_id: i64) -> (Option<String>, bool) {
        let conn = rusqlite::Connection::open(&self.db_path).expect("open");
        conn.query_row(
            "SELECT pdf_links, has_pdf FROM books WHERE id = ?1",
            [book_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("row")
    }

    pub fn all_pdf_state(&self) -> Vec<(i64, Option<String>, bool)> {
        let conn = rusqlite::Connection::open(&self.db_path).expect("open");
        let mut stmt = conn
            .prepare("SELECT id, pdf_links, has_pdf FROM books ORDER BY id")
            .expect("prepare");
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .expect("query");
        rows.map(|row| row.expect("row")).collect()
    }
}

pub fn service_for(api_base_url: &str, db_path: &Path) -> LibraryService {
    service_with_timeout(api_base_url, db_path, LibraryConfig::default().http_timeout)
}

pub fn service_with_timeout(
    api_base_url: &str,
    db_path: &Path,
    http_timeout: Duration,
) -> LibraryService {
    let config = LibraryConfig {
        api_base_url: api_base_url.to_string(),
        db_path: db_path.to_path_buf(),
        http_timeout,
        ..LibraryConfig::default()
    };
    LibraryService::from_config(&config).expect("service")
}

async fn book(Query(params): Query<HashMap<String, String>>) -> Response {
    let id = params.get("id").cloned().unwrap_or_default();
    match id.as_str() {
        "23622" => Json(json!({
            "id": 23622,
            "name": "مسائل نافع بن الأزرق = غريب القرآن في شعر العرب",
            "meta": {
                "id": 23622,
                "author_id": 263,
                "cat_id": 4,
                "pdf_links": {"files": ["mnaia.pdf"], "root": SCENARIO_A_ROOT}
            },
            "include": params.get("include"),
            "ver": params.get("ver"),
        }))
        .into_response(),
        "2" | "7" | "404404" => Json(json!({
            "id": id.parse::<i64>().unwrap_or_default(),
            "meta": {"name": "remote name"}
        }))
        .into_response(),
        "500" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        "777" => (StatusCode::OK, "this is not json").into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"detail": "no such book"}))).into_response(),
    }
}

async fn page(Query(params): Query<HashMap<String, String>>) -> Response {
    Json(json!({
        "book_id": params.get("book_id"),
        "pg": params.get("pg"),
        "ver": params.get("ver"),
        "text": "بسم الله الرحمن الرحيم",
    }))
    .into_response()
}

async fn author(Query(params): Query<HashMap<String, String>>) -> Response {
    match params.get("id").map(String::as_str) {
        Some("263") => Json(json!({"id": 263, "info": "remote bio"})).into_response(),
        Some("999") => Json(json!({"id": 999, "info": "only remote"})).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn search(Query(params): Query<HashMap<String, String>>) -> Response {
    if params.get("q").map(String::as_str) == Some("boom") {
        return (StatusCode::BAD_GATEWAY, "search backend down").into_response();
    }
    Json(json!({
        "count": 3,
        "params": params,
        "data": [
            {"book_id": 7, "text": "...", "meta": "{\"vol\": 2, \"page\": 15, \"page_id\": 99}"},
            {"book_id": 23622, "text": "...", "meta": "{\"page\": 3, \"page_id\": 40}"},
            {"book_id": 31337, "text": "...", "meta": "{not json"}
        ]
    }))
    .into_response()
}

/// Serves a fake catalog API on an ephemeral port and returns its base URL.
pub async fn spawn_catalog() -> String {
    let app = Router::new()
        .route("/book", get(book))
        .route("/page", get(page))
        .route("/author", get(author))
        .route("/search", get(search));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{}", addr)
}

/// Answers every request with `200` headers and the first byte of a JSON
/// body, then stalls without sending the rest.
pub async fn spawn_stalled_catalog(stall: Duration) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let head = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{";
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.flush().await;
                tokio::time::sleep(stall).await;
            });
        }
    });
    format!("http://{}", addr)
}

/// A base URL nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{}", addr)
}

pub fn object(value: &Value) -> &serde_json::Map<String, Value> {
    value.as_object().expect("expected JSON object")
}
