use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, str::FromStr};

/// Which object-store backend holds the file bytes. A deployment-time
/// choice, never a per-request decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Bytes live on local disk under `storage_dir`.
    Local,
    /// Bytes live in a remote object store; this service relays them.
    Remote,
    /// Bytes live in a remote object store; clients upload directly and the
    /// server-mediated transfer endpoint refuses payloads.
    RemoteDirect,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(BackendKind::Local),
            "remote" => Ok(BackendKind::Remote),
            "remote-direct" => Ok(BackendKind::RemoteDirect),
            other => bail!("unknown storage backend `{}` (expected local, remote, remote-direct)", other),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub storage_dir: String,
    pub backend: BackendKind,
    pub remote_endpoint: Option<String>,
    pub remote_bucket: String,
    pub remote_token: Option<String>,
    /// Ceiling for a single negotiated upload, in bytes.
    pub max_upload_size: i64,
    /// Width of one data-plane chunk, in bytes.
    pub chunk_size: u64,
    /// Files larger than this are streamed on retrieval instead of buffered.
    pub stream_threshold: i64,
}

const DEFAULT_MAX_UPLOAD_SIZE: i64 = 500 * 1024 * 1024;
const DEFAULT_CHUNK_SIZE: u64 = 6 * 1024 * 1024;
const DEFAULT_STREAM_THRESHOLD: i64 = 10 * 1024 * 1024;

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Project file store with a negotiated upload pipeline")]
pub struct Args {
    /// Host to bind to (overrides FILEDOCK_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILEDOCK_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides FILEDOCK_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory for the local backend's objects (overrides FILEDOCK_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Storage backend: local, remote or remote-direct (overrides FILEDOCK_BACKEND)
    #[arg(long)]
    pub backend: Option<String>,

    /// Remote object-store base URL (overrides FILEDOCK_REMOTE_ENDPOINT)
    #[arg(long)]
    pub remote_endpoint: Option<String>,

    /// Remote bucket name (overrides FILEDOCK_REMOTE_BUCKET)
    #[arg(long)]
    pub remote_bucket: Option<String>,

    /// Maximum upload size in bytes (overrides FILEDOCK_MAX_UPLOAD_SIZE)
    #[arg(long)]
    pub max_upload_size: Option<i64>,

    /// Chunk size in bytes for the transfer engine (overrides FILEDOCK_CHUNK_SIZE)
    #[arg(long)]
    pub chunk_size: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("FILEDOCK_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("FILEDOCK_PORT", 3000u16)?;
        let env_db = env::var("FILEDOCK_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/filedock.db".into());
        let env_storage =
            env::var("FILEDOCK_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_backend = env::var("FILEDOCK_BACKEND").unwrap_or_else(|_| "local".into());
        let env_max = parse_env("FILEDOCK_MAX_UPLOAD_SIZE", DEFAULT_MAX_UPLOAD_SIZE)?;
        let env_chunk = parse_env("FILEDOCK_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let env_threshold = parse_env("FILEDOCK_STREAM_THRESHOLD", DEFAULT_STREAM_THRESHOLD)?;

        // --- Merge ---
        let backend: BackendKind = args.backend.unwrap_or(env_backend).parse()?;
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            backend,
            remote_endpoint: args
                .remote_endpoint
                .or_else(|| env::var("FILEDOCK_REMOTE_ENDPOINT").ok()),
            remote_bucket: args
                .remote_bucket
                .or_else(|| env::var("FILEDOCK_REMOTE_BUCKET").ok())
                .unwrap_or_else(|| "files".into()),
            remote_token: env::var("FILEDOCK_REMOTE_TOKEN").ok(),
            max_upload_size: args.max_upload_size.unwrap_or(env_max),
            chunk_size: args.chunk_size.unwrap_or(env_chunk),
            stream_threshold: env_threshold,
        };

        if cfg.max_upload_size <= 0 {
            bail!("max_upload_size must be positive");
        }
        if cfg.chunk_size == 0 {
            bail!("chunk_size must be positive");
        }
        if cfg.backend != BackendKind::Local && cfg.remote_endpoint.is_none() {
            bail!("remote backends require FILEDOCK_REMOTE_ENDPOINT");
        }

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
