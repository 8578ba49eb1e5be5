//! Object-store abstraction over the byte backends.
//!
//! One capability set — put_object, put_chunk, delete_object, public_url,
//! exists, get — implemented by a local-filesystem backend and a remote HTTP
//! backend. The variant is chosen once from configuration; nothing else in
//! the crate branches on the backend.

use crate::config::{AppConfig, BackendKind};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use reqwest::StatusCode;
use std::{
    io::{self, ErrorKind, SeekFrom},
    ops::Range,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("object `{0}` not found in store")]
    MissingObject(String),
    #[error("remote store returned status {status} for `{key}`")]
    UnexpectedStatus { status: u16, key: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Basic key validation to avoid trivial path traversal vectors.
///
/// Rejects empty or oversized keys, keys that begin with `/` or contain
/// `..`, and keys with control characters or backslashes.
fn ensure_key_safe(key: &str) -> StoreResult<()> {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(StoreError::InvalidObjectKey);
    }
    if key.starts_with('/') || key.contains("..") {
        return Err(StoreError::InvalidObjectKey);
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(StoreError::InvalidObjectKey);
    }
    Ok(())
}

/// An opened object ready to be read out, either from disk or from the
/// remote store's response body.
pub enum ObjectReader {
    File(File),
    Remote(reqwest::Response),
}

impl ObjectReader {
    /// Read the whole object into memory. Used for small objects only.
    pub async fn buffered(self) -> StoreResult<Bytes> {
        match self {
            ObjectReader::File(mut file) => {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
            ObjectReader::Remote(resp) => Ok(resp.bytes().await?),
        }
    }

    /// Turn the reader into a byte stream for large objects, so responses
    /// never buffer the full payload.
    pub fn into_stream(self) -> BoxStream<'static, io::Result<Bytes>> {
        match self {
            ObjectReader::File(file) => ReaderStream::new(file).boxed(),
            ObjectReader::Remote(resp) => resp
                .bytes_stream()
                .map_err(|err| io::Error::new(ErrorKind::Other, err))
                .boxed(),
        }
    }
}

/// The configured byte backend.
#[derive(Clone)]
pub enum ObjectStore {
    LocalFs(LocalFsStore),
    Remote(RemoteStore),
}

impl ObjectStore {
    /// Build the store the deployment configured. `remote` and
    /// `remote-direct` share the same plumbing; the direct variant only
    /// changes whether the mediated transfer route accepts bytes.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        match cfg.backend {
            BackendKind::Local => Ok(ObjectStore::LocalFs(LocalFsStore::new(&cfg.storage_dir))),
            BackendKind::Remote | BackendKind::RemoteDirect => {
                let endpoint = cfg
                    .remote_endpoint
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("remote backend requires an endpoint"))?;
                Ok(ObjectStore::Remote(RemoteStore::new(
                    endpoint,
                    cfg.remote_bucket.clone(),
                    cfg.remote_token.clone(),
                )?))
            }
        }
    }

    /// Upload a whole object in one call. Returns the backend locator.
    pub async fn put_object(&self, key: &str, bytes: Bytes) -> StoreResult<String> {
        ensure_key_safe(key)?;
        match self {
            ObjectStore::LocalFs(s) => s.put_object(key, bytes).await,
            ObjectStore::Remote(s) => s.put_object(key, bytes).await,
        }
    }

    /// Upload one chunk of a larger object. `is_first` creates the object;
    /// later chunks continue it in place at `range.start`.
    pub async fn put_chunk(
        &self,
        key: &str,
        bytes: Bytes,
        range: Range<u64>,
        is_first: bool,
    ) -> StoreResult<()> {
        ensure_key_safe(key)?;
        match self {
            ObjectStore::LocalFs(s) => s.put_chunk(key, bytes, range, is_first).await,
            ObjectStore::Remote(s) => s.put_chunk(key, bytes, range, is_first).await,
        }
    }

    /// Delete an object. An already-absent key is not an error.
    pub async fn delete_object(&self, key: &str) -> StoreResult<()> {
        ensure_key_safe(key)?;
        match self {
            ObjectStore::LocalFs(s) => s.delete_object(key).await,
            ObjectStore::Remote(s) => s.delete_object(key).await,
        }
    }

    /// Backend-specific public locator for a key.
    pub fn public_url(&self, key: &str) -> String {
        match self {
            ObjectStore::LocalFs(s) => s.public_url(key),
            ObjectStore::Remote(s) => s.public_url(key),
        }
    }

    pub async fn exists(&self, key: &str) -> StoreResult<bool> {
        ensure_key_safe(key)?;
        match self {
            ObjectStore::LocalFs(s) => s.exists(key).await,
            ObjectStore::Remote(s) => s.exists(key).await,
        }
    }

    /// Open an object for reading. `MissingObject` when the backend does not
    /// hold the key.
    pub async fn get(&self, key: &str) -> StoreResult<ObjectReader> {
        ensure_key_safe(key)?;
        match self {
            ObjectStore::LocalFs(s) => s.get(key).await,
            ObjectStore::Remote(s) => s.get(key).await,
        }
    }

    /// Readiness probe used by `/readyz`: a cheap round trip that proves the
    /// backend is reachable and writable (local) or responsive (remote).
    pub async fn check_ready(&self) -> StoreResult<()> {
        match self {
            ObjectStore::LocalFs(s) => s.check_ready().await,
            ObjectStore::Remote(s) => {
                s.exists(".readyz-probe").await?;
                Ok(())
            }
        }
    }
}

/// Object payloads on local disk, laid out as `base/{projectId}/{file}`.
/// The locator for a local object is its logical serving path, so links
/// survive a move to a remote backend.
#[derive(Clone)]
pub struct LocalFsStore {
    base: PathBuf,
}

impl LocalFsStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let mut path = self.base.clone();
        for part in key.split('/') {
            path.push(part);
        }
        path
    }

    async fn put_object(&self, key: &str, bytes: Bytes) -> StoreResult<String> {
        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;

        // Write to a temp file and rename so readers never observe a torn
        // whole-object write.
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = write_durably(&mut file, &bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        Ok(self.public_url(key))
    }

    async fn put_chunk(
        &self,
        key: &str,
        bytes: Bytes,
        range: Range<u64>,
        is_first: bool,
    ) -> StoreResult<()> {
        let file_path = self.object_path(key);
        let mut file = if is_first {
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            File::create(&file_path).await?
        } else {
            // A continuation chunk must address an object the first chunk
            // already created.
            OpenOptions::new()
                .write(true)
                .open(&file_path)
                .await
                .map_err(|err| {
                    if err.kind() == ErrorKind::NotFound {
                        StoreError::MissingObject(key.to_string())
                    } else {
                        StoreError::Io(err)
                    }
                })?
        };

        file.seek(SeekFrom::Start(range.start)).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StoreResult<()> {
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed object file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("object file {} already missing", file_path.display());
            }
            Err(err) => return Err(StoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("/api/storage/{}", key)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        match fs::metadata(self.object_path(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<ObjectReader> {
        let file = File::open(self.object_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::MissingObject(key.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        Ok(ObjectReader::File(file))
    }

    async fn check_ready(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.base).await?;
        let probe = self.base.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let bytes = fs::read(&probe).await?;
        let _ = fs::remove_file(&probe).await;
        if bytes != b"readyz" {
            return Err(StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "probe content mismatch",
            )));
        }
        Ok(())
    }

    /// Remove now-empty directories above a deleted object, up to the base.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base) && current != self.base {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Object payloads in a remote HTTP object store, addressed as
/// `{endpoint}/{bucket}/{key}`. Chunk continuations are signaled with a
/// `Content-Range` header plus `x-append: true`.
#[derive(Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

impl RemoteStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        token: Option<String>,
    ) -> anyhow::Result<Self> {
        let endpoint = endpoint.into();
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            token,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn put_object(&self, key: &str, bytes: Bytes) -> StoreResult<String> {
        let resp = self
            .authorized(self.client.put(self.object_url(key)))
            .body(bytes)
            .send()
            .await?;
        self.expect_success(key, resp.status())?;
        Ok(self.public_url(key))
    }

    async fn put_chunk(
        &self,
        key: &str,
        bytes: Bytes,
        range: Range<u64>,
        is_first: bool,
    ) -> StoreResult<()> {
        let content_range = format!("bytes {}-{}/*", range.start, range.end.saturating_sub(1));
        let mut req = self
            .authorized(self.client.put(self.object_url(key)))
            .header("content-range", content_range);
        if !is_first {
            req = req.header("x-append", "true");
        }
        let resp = req.body(bytes).send().await?;
        self.expect_success(key, resp.status())
    }

    async fn delete_object(&self, key: &str) -> StoreResult<()> {
        let resp = self
            .authorized(self.client.delete(self.object_url(key)))
            .send()
            .await?;
        let status = resp.status();
        // Absent objects are fine; the caller wanted it gone either way.
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(());
        }
        self.expect_success(key, status)
    }

    fn public_url(&self, key: &str) -> String {
        self.object_url(key)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let resp = self
            .authorized(self.client.head(self.object_url(key)))
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            Ok(true)
        } else if status == StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(StoreError::UnexpectedStatus {
                status: status.as_u16(),
                key: key.to_string(),
            })
        }
    }

    async fn get(&self, key: &str) -> StoreResult<ObjectReader> {
        let resp = self
            .authorized(self.client.get(self.object_url(key)))
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::MissingObject(key.to_string()));
        }
        self.expect_success(key, status)?;
        Ok(ObjectReader::Remote(resp))
    }

    fn expect_success(&self, key: &str, status: StatusCode) -> StoreResult<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::UnexpectedStatus {
                status: status.as_u16(),
                key: key.to_string(),
            })
        }
    }
}

async fn write_durably(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn local_store(dir: &tempfile::TempDir) -> ObjectStore {
        ObjectStore::LocalFs(LocalFsStore::new(dir.path()))
    }

    #[test]
    fn rejects_unsafe_keys() {
        assert!(ensure_key_safe("p1/123-abc.png").is_ok());
        assert!(ensure_key_safe("").is_err());
        assert!(ensure_key_safe("/etc/passwd").is_err());
        assert!(ensure_key_safe("p1/../../secret").is_err());
        assert!(ensure_key_safe("p1\\x").is_err());
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = local_store(&dir);

        let url = store
            .put_object("p1/1-abcdefg.bin", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(url, "/api/storage/p1/1-abcdefg.bin");
        assert!(store.exists("p1/1-abcdefg.bin").await.unwrap());

        let body = store
            .get("p1/1-abcdefg.bin")
            .await
            .unwrap()
            .buffered()
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn delete_tolerates_absent_objects() {
        let dir = tempdir().unwrap();
        let store = local_store(&dir);

        store
            .put_object("p1/1-abcdefg.bin", Bytes::from_static(b"x"))
            .await
            .unwrap();
        store.delete_object("p1/1-abcdefg.bin").await.unwrap();
        assert!(!store.exists("p1/1-abcdefg.bin").await.unwrap());

        // second delete, and a delete of a never-written key, both succeed
        store.delete_object("p1/1-abcdefg.bin").await.unwrap();
        store.delete_object("p1/никогда.bin").await.unwrap();
    }

    #[tokio::test]
    async fn chunk_continuation_requires_first_chunk() {
        let dir = tempdir().unwrap();
        let store = local_store(&dir);

        let err = store
            .put_chunk("p1/2-abcdefg.bin", Bytes::from_static(b"late"), 4..8, false)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingObject(_)));
    }

    #[tokio::test]
    async fn chunks_assemble_in_place() {
        let dir = tempdir().unwrap();
        let store = local_store(&dir);
        let key = "p1/3-abcdefg.bin";

        store
            .put_chunk(key, Bytes::from_static(b"hell"), 0..4, true)
            .await
            .unwrap();
        store
            .put_chunk(key, Bytes::from_static(b"o wo"), 4..8, false)
            .await
            .unwrap();
        store
            .put_chunk(key, Bytes::from_static(b"rld"), 8..11, false)
            .await
            .unwrap();

        let body = store.get(key).await.unwrap().buffered().await.unwrap();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn delete_prunes_empty_project_dirs() {
        let dir = tempdir().unwrap();
        let store = local_store(&dir);

        store
            .put_object("p9/1-abcdefg.bin", Bytes::from_static(b"x"))
            .await
            .unwrap();
        store.delete_object("p9/1-abcdefg.bin").await.unwrap();
        assert!(!dir.path().join("p9").exists());
    }
}
