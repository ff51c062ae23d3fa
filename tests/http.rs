//! Drives the service routes in-process, plus one request over a real socket.

use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{header, Method, Request, Response, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use html_docx::service::{route, start, AppState, ServerConfig};

const BOUNDARY: &str = "----html-docx-test";

fn setup() -> (tempfile::TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::with_root(dir.path());
    config.bind = "127.0.0.1:0".parse().unwrap();
    config.prepare_dirs().unwrap();
    (dir, AppState::new(config))
}

fn multipart(uri: &str, field: &str, file_name: &str, content: &[u8]) -> Request<Full<Bytes>> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: text/html\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn get(uri: &str) -> Request<Full<Bytes>> {
    Request::builder().uri(uri).body(Full::default()).unwrap()
}

async fn body_bytes(resp: Response<Full<Bytes>>) -> Bytes {
    resp.into_body().collect().await.unwrap().to_bytes()
}

async fn body_json(resp: Response<Full<Bytes>>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

async fn wait_for_finish(state: &AppState, job_id: &str) -> serde_json::Value {
    for _ in 0..250 {
        let resp = route(get(&format!("/api/status/{job_id}")), state.clone()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let job = body_json(resp).await;
        if job["status"] == "completed" || job["status"] == "error" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} did not finish");
}

#[tokio::test]
async fn upload_poll_download() {
    let (_dir, state) = setup();

    let resp = route(
        multipart("/api/upload", "file", "page.html", b"<h1>Report</h1><p>Body</p>"),
        state.clone(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let job_id = body_json(resp).await["jobId"].as_str().unwrap().to_string();

    let job = wait_for_finish(&state, &job_id).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress"], 100);
    let url = job["downloadUrl"].as_str().unwrap().to_string();
    assert_eq!(url, format!("/api/download/{job_id}.docx"));
    assert!(!state.config.input_path(&job_id).exists());

    let resp = route(get(&url), state.clone()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], html_docx::DOCX_MIME);
    let docx = body_bytes(resp).await;

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(docx.to_vec())).unwrap();
    let mut xml = String::new();
    std::io::Read::read_to_string(&mut archive.by_name("word/document.xml").unwrap(), &mut xml)
        .unwrap();
    assert!(xml.contains("Report"));
    assert!(xml.contains("Heading1"));
}

#[tokio::test]
async fn failing_conversion_is_reported_in_status() {
    let (_dir, state) = setup();
    let resp = route(
        multipart(
            "/api/upload",
            "file",
            "bad.html",
            br#"<p style="font-size: huge">x</p>"#,
        ),
        state.clone(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let job_id = body_json(resp).await["jobId"].as_str().unwrap().to_string();

    let job = wait_for_finish(&state, &job_id).await;
    assert_eq!(job["status"], "error");
    assert!(job["error"].as_str().unwrap().contains("Invalid font-size value"));
    assert!(job["downloadUrl"].is_null());

    let resp = route(get(&format!("/api/download/{job_id}.docx")), state).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_validation_errors() {
    let (_dir, state) = setup();

    let resp = route(multipart("/api/upload", "file", "", b""), state.clone()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "No selected file");

    let resp = route(
        multipart("/api/upload", "file", "a.html", b"\xff\xfe\x00"),
        state.clone(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "Invalid HTML file");

    assert!(state.jobs.is_empty());
}

#[tokio::test]
async fn synchronous_convert() {
    let (_dir, state) = setup();

    let resp = route(
        multipart("/api/convert", "htmlFile", "x.html", b"<ul><li>a</li></ul>"),
        state.clone(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"converted.docx\""
    );
    assert!(body_bytes(resp).await.starts_with(b"PK"));

    let resp = route(
        multipart("/api/convert", "file", "x.html", b"<p>x</p>"),
        state.clone(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(&body_bytes(resp).await[..], b"No file part");
}

#[tokio::test]
async fn deeply_nested_upload_leaves_the_service_working() {
    let (_dir, state) = setup();
    let deep = format!("{}x", "<span>".repeat(10_000));

    let resp = route(
        multipart("/api/convert", "htmlFile", "deep.html", deep.as_bytes()),
        state.clone(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = route(
        multipart("/api/upload", "file", "deep.html", deep.as_bytes()),
        state.clone(),
    )
    .await;
    let deep_id = body_json(resp).await["jobId"].as_str().unwrap().to_string();

    let resp = route(
        multipart("/api/upload", "file", "ok.html", b"<p>still alive</p>"),
        state.clone(),
    )
    .await;
    let ok_id = body_json(resp).await["jobId"].as_str().unwrap().to_string();

    assert_eq!(wait_for_finish(&state, &deep_id).await["status"], "completed");
    assert_eq!(wait_for_finish(&state, &ok_id).await["status"], "completed");
}

#[tokio::test]
async fn missing_download() {
    let (_dir, state) = setup();
    let resp = route(get("/api/download/nothing.docx"), state).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "File not found");
}

#[tokio::test]
async fn serves_over_tcp_and_shuts_down() {
    let (_dir, state) = setup();
    let server = start(state).await.unwrap();

    let mut stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /api/status/unknown HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    assert!(raw.starts_with("HTTP/1.1 404"));
    assert!(raw.contains("Job not found"));

    server.shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(15), server.join)
        .await
        .unwrap()
        .unwrap();
}
