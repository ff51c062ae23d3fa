//! HTTP front of the conversion service.
//!
//! | route                         | purpose                               |
//! |-------------------------------|---------------------------------------|
//! | `POST /api/upload`            | queue a conversion, answer `{jobId}`  |
//! | `GET /api/status/<jobId>`     | job snapshot                          |
//! | `GET /api/download/<file>`    | converted document                    |
//! | `POST /api/convert`           | synchronous conversion                |
//!
//! Every response allows any origin.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{self, HeaderValue};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::graceful::GracefulShutdown;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use super::config::ServerConfig;
use super::jobs::JobRegistry;
use super::multipart;
use super::worker;
use crate::ConvertError;

type Server = hyper_util::server::conn::auto::Builder<TokioExecutor>;

/// Shared by every request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub jobs: JobRegistry,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            jobs: JobRegistry::new(),
        }
    }
}

/// created by [`start`]
pub struct HttpServer {
    /// The address the server is listening on.
    pub addr: SocketAddr,
    /// Starts the graceful shutdown.
    pub shutdown_tx: oneshot::Sender<()>,
    pub join: tokio::task::JoinHandle<()>,
}

/// Binds `state.config.bind` and serves until `shutdown_tx` fires.
pub async fn start(state: AppState) -> anyhow::Result<HttpServer> {
    state
        .config
        .prepare_dirs()
        .context("cannot create upload/output directories")?;
    let listener = TcpListener::bind(state.config.bind)
        .await
        .with_context(|| format!("cannot bind {}", state.config.bind))?;
    let addr = listener.local_addr()?;
    log::info!("conversion service listening on http://{addr}");

    let sweeper = state
        .config
        .retention
        .map(|_| tokio::spawn(worker::run_sweeper(state.jobs.clone(), state.config.clone())));

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let graceful = GracefulShutdown::new();

    let join = tokio::spawn(async move {
        let mut signal = std::pin::pin!(shutdown_rx);
        let server = Server::new(TokioExecutor::new());

        loop {
            tokio::select! {
                conn = listener.accept() => {
                    let (stream, peer) = match conn {
                        Ok(conn) => conn,
                        Err(e) => {
                            log::error!("accept error: {e}");
                            continue;
                        }
                    };
                    let state = state.clone();
                    let service = service_fn(move |req: Request<Incoming>| {
                        let state = state.clone();
                        async move { Ok::<_, Infallible>(route(req, state).await) }
                    });
                    let conn = server.serve_connection(TokioIo::new(stream), service);
                    let conn = graceful.watch(conn.into_owned());
                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            log::debug!("connection from {peer} closed with error: {e}");
                        }
                    });
                }
                _ = &mut signal => {
                    log::info!("graceful shutdown signal received");
                    break;
                }
            }
        }

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        tokio::select! {
            _ = graceful.shutdown() => {
                log::info!("all connections closed");
            },
            _ = tokio::time::sleep(std::time::Duration::from_secs(10)) => {
                log::warn!("waited 10 seconds for open connections, aborting");
            }
        }
    });

    Ok(HttpServer {
        addr,
        shutdown_tx,
        join,
    })
}

/// Dispatches one request. Generic over the body so it can be driven
/// without a socket.
pub async fn route<B>(req: Request<B>, state: AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    log::debug!("{method} {path}");

    let mut resp = if method == Method::OPTIONS {
        preflight()
    } else if method == Method::POST && path == "/api/upload" {
        upload(req, &state).await
    } else if method == Method::POST && path == "/api/convert" {
        convert(req, &state).await
    } else if let (&Method::GET, Some(id)) = (&method, path.strip_prefix("/api/status/")) {
        status(id, &state)
    } else if let (&Method::GET, Some(name)) = (&method, path.strip_prefix("/api/download/")) {
        download(name, &state).await
    } else {
        json_error(StatusCode::NOT_FOUND, "Not found")
    };

    resp.headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    resp
}

fn preflight() -> Response<Full<Bytes>> {
    let mut resp = empty(StatusCode::NO_CONTENT);
    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    resp
}

async fn upload<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (content_type, body) = match read_body(req, state.config.max_upload_bytes).await {
        Ok(parts) => parts,
        Err(resp) => return resp,
    };
    let file = match multipart::read_file_field(content_type.as_deref(), body, "file").await {
        Ok(file) => file,
        Err(err) => return json_error(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    let bytes = file.bytes.clone();
    match tokio::task::spawn_blocking(move || validate_html(&bytes)).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => return json_error(StatusCode::BAD_REQUEST, "Invalid HTML file"),
        Err(err) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }

    let job = state.jobs.create();
    let input = state.config.input_path(&job.job_id);
    if let Err(err) = tokio::fs::write(&input, &file.bytes).await {
        log::error!("cannot store upload {}: {err}", input.display());
        state.jobs.remove(&job.job_id);
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Cannot store upload");
    }
    log::info!("job {} queued for {:?}", job.job_id, file.file_name);

    worker::spawn_job(state.jobs.clone(), state.config.clone(), job.job_id.clone());
    json_response(StatusCode::OK, &json!({ "jobId": job.job_id }))
}

fn validate_html(bytes: &[u8]) -> crate::Result<()> {
    let html = crate::dom::decode_html(bytes)?;
    crate::parse_html(html).map(|_| ())
}

fn status(job_id: &str, state: &AppState) -> Response<Full<Bytes>> {
    match state.jobs.get(job_id) {
        Some(job) => json_response(StatusCode::OK, &job),
        None => json_error(StatusCode::NOT_FOUND, "Job not found"),
    }
}

async fn download(name: &str, state: &AppState) -> Response<Full<Bytes>> {
    if !is_plain_file_name(name) {
        return json_error(StatusCode::NOT_FOUND, "File not found");
    }
    let path = state.config.output_dir.join(name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => attachment(bytes, name),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            json_error(StatusCode::NOT_FOUND, "File not found")
        }
        Err(err) => {
            log::error!("cannot read {}: {err}", path.display());
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\']) && !name.contains("..")
}

async fn convert<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (content_type, body) = match read_body(req, state.config.max_upload_bytes).await {
        Ok(parts) => parts,
        Err(resp) => return resp,
    };
    let file = match multipart::read_file_field(content_type.as_deref(), body, "htmlFile").await {
        Ok(file) => file,
        Err(err) => return text(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    match tokio::task::spawn_blocking(move || crate::convert_bytes(&file.bytes)).await {
        Ok(Ok(docx)) => attachment(docx, "converted.docx"),
        Ok(Err(err)) => conversion_failed(err),
        Err(err) => text(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

fn conversion_failed(err: ConvertError) -> Response<Full<Bytes>> {
    if err.is_input_error() {
        text(StatusCode::BAD_REQUEST, &err.to_string())
    } else {
        log::warn!("conversion failed: {err}");
        text(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
    }
}

/// Collects the body under `limit` bytes together with its content type.
async fn read_body<B>(
    req: Request<B>,
    limit: usize,
) -> Result<(Option<String>, Bytes), Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok((content_type, collected.to_bytes())),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(json_error(StatusCode::PAYLOAD_TOO_LARGE, "File too large"))
        }
        Err(err) => Err(json_error(StatusCode::BAD_REQUEST, &err.to_string())),
    }
}

fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::default());
    *resp.status_mut() = status;
    resp
}

fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = match serde_json::to_vec(value) {
        Ok(body) => body,
        Err(err) => return text(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    };
    let mut resp = Response::new(Full::new(Bytes::from(body)));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

fn json_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &json!({ "error": message }))
}

fn text(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(message.to_owned())));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

fn attachment(bytes: Vec<u8>, name: &str) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(bytes)));
    let headers = resp.headers_mut();
    let mime = if name.ends_with(".docx") {
        crate::DOCX_MIME
    } else {
        "application/octet-stream"
    };
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{name}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    resp
}
