//! Shared application state handed to every handler.

use crate::{
    config::{AppConfig, BackendKind},
    services::{
        auth::Authorizer, lifecycle::FileLifecycleManager, object_store::ObjectStore,
        projects::ProjectService, transfer::ChunkTransferEngine, upload::UploadService,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub authorizer: Authorizer,
    pub uploads: UploadService,
    pub projects: ProjectService,
    pub lifecycle: FileLifecycleManager,
    pub store: ObjectStore,
    pub engine: ChunkTransferEngine,
    /// Retrieval responses above this many bytes stream instead of buffering.
    pub stream_threshold: i64,
    /// Under `remote-direct` the mediated transfer route refuses payloads.
    pub direct_upload: bool,
}

impl AppState {
    /// Wire every service to the pool and the configured store. All
    /// backend parameters come in through `cfg`; nothing here reads the
    /// environment.
    pub fn new(db: Arc<SqlitePool>, cfg: &AppConfig) -> anyhow::Result<Self> {
        let store = ObjectStore::from_config(cfg)?;
        Ok(Self {
            authorizer: Authorizer::new(db.clone()),
            uploads: UploadService::new(db.clone(), cfg.max_upload_size),
            projects: ProjectService::new(db.clone()),
            lifecycle: FileLifecycleManager::new(db.clone(), store.clone()),
            engine: ChunkTransferEngine::new(cfg.chunk_size),
            stream_threshold: cfg.stream_threshold,
            direct_upload: cfg.backend == BackendKind::RemoteDirect,
            store,
            db,
        })
    }
}
