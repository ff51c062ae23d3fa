use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use html_docx::service::{self, AppState, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert HTML documents into Word (.docx) files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP conversion service.
    Serve(ServeArgs),
    /// Convert one file and exit.
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "HTML_DOCX_BIND", default_value = "127.0.0.1:5000")]
    bind: SocketAddr,

    /// Where uploads wait for conversion.
    #[arg(long, env = "HTML_DOCX_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Where converted documents are kept for download.
    #[arg(long, env = "HTML_DOCX_OUTPUT_DIR", default_value = "converted")]
    output_dir: PathBuf,

    #[arg(long, env = "HTML_DOCX_MAX_UPLOAD_BYTES", default_value_t = service::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Seconds a finished job is kept; 0 keeps it until exit.
    #[arg(long, env = "HTML_DOCX_RETENTION_SECS", default_value_t = 0)]
    retention_secs: u64,

    #[arg(long, env = "HTML_DOCX_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    sweep_interval_secs: u64,
}

impl From<ServeArgs> for ServerConfig {
    fn from(args: ServeArgs) -> Self {
        ServerConfig {
            bind: args.bind,
            upload_dir: args.upload_dir,
            output_dir: args.output_dir,
            max_upload_bytes: args.max_upload_bytes,
            retention: (args.retention_secs > 0).then(|| Duration::from_secs(args.retention_secs)),
            sweep_interval: Duration::from_secs(args.sweep_interval_secs.max(1)),
        }
    }
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Input HTML file (any fragment or full document).
    #[arg(long)]
    html_file: PathBuf,

    /// Output .docx path.
    #[arg(long)]
    out: PathBuf,

    /// Accepted and ignored.
    #[arg(long)]
    title: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("html_docx=info"))
        .try_init();

    match Cli::parse().command {
        Command::Serve(args) => serve(args.into()).await,
        Command::Convert(args) => convert(&args),
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    let server = service::start(AppState::new(config)).await?;

    tokio::signal::ctrl_c()
        .await
        .context("cannot listen for shutdown signal")?;
    let _ = server.shutdown_tx.send(());
    server.join.await.context("server task panicked")?;
    Ok(())
}

fn convert(args: &ConvertArgs) -> Result<()> {
    let bytes = std::fs::read(&args.html_file)
        .with_context(|| format!("read {}", args.html_file.display()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        bail!("empty html");
    }
    if let Some(title) = &args.title {
        log::debug!("ignoring --title {title:?}");
    }

    let docx = html_docx::convert_bytes(&bytes)
        .with_context(|| format!("convert {}", args.html_file.display()))?;
    service::worker::write_atomically(&args.out, &docx)
        .with_context(|| format!("write {}", args.out.display()))?;
    log::info!("wrote {}", args.out.display());
    Ok(())
}
