//! Job-based conversion service: uploads are queued, converted on the
//! blocking pool and fetched back by job id.

pub mod config;
pub mod http;
pub mod jobs;
pub mod multipart;
pub mod worker;

pub use config::ServerConfig;
pub use http::{route, start, AppState, HttpServer};
pub use jobs::{Job, JobRegistry, JobStatus};
