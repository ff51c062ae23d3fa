use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Runtime settings of the conversion service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Uploaded HTML waiting for conversion, named `<jobId>.html`.
    pub upload_dir: PathBuf,
    /// Converted documents, named `<jobId>.docx`.
    pub output_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// How long finished jobs and their output are kept. `None` keeps them
    /// until the process exits.
    pub retention: Option<Duration>,
    pub sweep_interval: Duration,
}

impl ServerConfig {
    /// Default settings with both directories under `root`.
    pub fn with_root(root: &Path) -> Self {
        Self {
            upload_dir: root.join("uploads"),
            output_dir: root.join("converted"),
            ..Self::default()
        }
    }

    pub fn prepare_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::create_dir_all(&self.output_dir)
    }

    pub fn input_path(&self, job_id: &str) -> PathBuf {
        self.upload_dir.join(format!("{job_id}.html"))
    }

    pub fn output_path(&self, job_id: &str) -> PathBuf {
        self.output_dir.join(output_name(job_id))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("converted"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            retention: None,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

pub fn output_name(job_id: &str) -> String {
    format!("{job_id}.docx")
}

pub fn download_url(job_id: &str) -> String {
    format!("/api/download/{}", output_name(job_id))
}
