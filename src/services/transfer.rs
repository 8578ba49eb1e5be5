//! Chunked data-plane transfer.
//!
//! Moves a payload into the object store under a fixed byte budget per
//! backend call. One explicit loop over offset ranges, strictly in order,
//! each chunk issued only after the previous one is acknowledged.

use crate::services::object_store::{ObjectStore, StoreResult};
use bytes::Bytes;

/// Drives a single file's transfer into the store.
///
/// Payloads at or under `chunk_size` go up as one whole object; larger
/// payloads are split into `chunk_size`-wide ranges. Progress is reported
/// after every acknowledged chunk as a fraction in `[0, 1]`. The first
/// failed chunk aborts the rest; chunks already written stay in the store.
#[derive(Clone, Copy, Debug)]
pub struct ChunkTransferEngine {
    chunk_size: u64,
}

impl ChunkTransferEngine {
    pub fn new(chunk_size: u64) -> Self {
        assert!(chunk_size > 0, "chunk_size must be positive");
        Self { chunk_size }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Transfer `data` to `key`, reporting progress through `on_progress`.
    /// Returns the backend's public locator for the completed object.
    pub async fn transfer(
        &self,
        store: &ObjectStore,
        key: &str,
        data: Bytes,
        mut on_progress: impl FnMut(f64),
    ) -> StoreResult<String> {
        let total = data.len() as u64;
        if total <= self.chunk_size {
            let locator = store.put_object(key, data).await?;
            on_progress(1.0);
            return Ok(locator);
        }

        let total_chunks = total.div_ceil(self.chunk_size);
        let mut completed = 0u64;
        let mut start = 0u64;
        while start < total {
            let end = (start + self.chunk_size).min(total);
            let chunk = data.slice(start as usize..end as usize);
            store.put_chunk(key, chunk, start..end, start == 0).await?;
            completed += 1;
            on_progress(completed as f64 / total_chunks as f64);
            start = end;
        }

        Ok(store.public_url(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::object_store::LocalFsStore;
    use tempfile::tempdir;

    const MIB: u64 = 1024 * 1024;

    fn local_store(dir: &tempfile::TempDir) -> ObjectStore {
        ObjectStore::LocalFs(LocalFsStore::new(dir.path()))
    }

    fn payload(len: usize) -> Bytes {
        let mut data = Vec::with_capacity(len);
        for i in 0..len {
            data.push((i % 251) as u8);
        }
        Bytes::from(data)
    }

    #[tokio::test]
    async fn small_payload_is_one_whole_object() {
        let dir = tempdir().unwrap();
        let store = local_store(&dir);
        let engine = ChunkTransferEngine::new(6 * MIB);
        let data = payload(2_000_000);

        let mut progress = Vec::new();
        let locator = engine
            .transfer(&store, "p1/1-aaaaaaa.bin", data.clone(), |p| {
                progress.push(p)
            })
            .await
            .unwrap();

        assert_eq!(locator, "/api/storage/p1/1-aaaaaaa.bin");
        assert_eq!(progress, vec![1.0]);
        let stored = store
            .get("p1/1-aaaaaaa.bin")
            .await
            .unwrap()
            .buffered()
            .await
            .unwrap();
        assert_eq!(stored, data);
    }

    #[tokio::test]
    async fn twenty_mib_in_six_mib_chunks_is_four_calls() {
        let dir = tempdir().unwrap();
        let store = local_store(&dir);
        let engine = ChunkTransferEngine::new(6 * MIB);
        let data = payload(20 * MIB as usize);

        let mut progress = Vec::new();
        engine
            .transfer(&store, "p1/2-aaaaaaa.bin", data.clone(), |p| {
                progress.push(p)
            })
            .await
            .unwrap();

        // 3 full chunks of 6 MiB, last chunk 2 MiB wide
        assert_eq!(progress, vec![0.25, 0.5, 0.75, 1.0]);
        let stored = store
            .get("p1/2-aaaaaaa.bin")
            .await
            .unwrap()
            .buffered()
            .await
            .unwrap();
        assert_eq!(stored, data);
    }

    #[tokio::test]
    async fn chunked_and_whole_transfers_store_identical_bytes() {
        let dir = tempdir().unwrap();
        let store = local_store(&dir);
        let data = payload(20 * MIB as usize);

        ChunkTransferEngine::new(6 * MIB)
            .transfer(&store, "p1/3-aaaaaaa.bin", data.clone(), |_| {})
            .await
            .unwrap();
        ChunkTransferEngine::new(64 * MIB)
            .transfer(&store, "p1/4-aaaaaaa.bin", data.clone(), |_| {})
            .await
            .unwrap();

        let chunked = store
            .get("p1/3-aaaaaaa.bin")
            .await
            .unwrap()
            .buffered()
            .await
            .unwrap();
        let whole = store
            .get("p1/4-aaaaaaa.bin")
            .await
            .unwrap()
            .buffered()
            .await
            .unwrap();
        assert_eq!(chunked, whole);
    }

    #[tokio::test]
    async fn exact_multiple_of_chunk_size_has_no_short_tail() {
        let dir = tempdir().unwrap();
        let store = local_store(&dir);
        let engine = ChunkTransferEngine::new(6 * MIB);
        let data = payload(12 * MIB as usize);

        let mut progress = Vec::new();
        engine
            .transfer(&store, "p1/5-aaaaaaa.bin", data.clone(), |p| {
                progress.push(p)
            })
            .await
            .unwrap();

        assert_eq!(progress, vec![0.5, 1.0]);
        let stored = store
            .get("p1/5-aaaaaaa.bin")
            .await
            .unwrap()
            .buffered()
            .await
            .unwrap();
        assert_eq!(stored.len(), data.len());
    }

    #[tokio::test]
    async fn empty_payload_uploads_as_whole_object() {
        let dir = tempdir().unwrap();
        let store = local_store(&dir);
        let engine = ChunkTransferEngine::new(6 * MIB);

        let mut progress = Vec::new();
        engine
            .transfer(&store, "p1/6-aaaaaaa.bin", Bytes::new(), |p| progress.push(p))
            .await
            .unwrap();
        assert_eq!(progress, vec![1.0]);
        assert!(store.exists("p1/6-aaaaaaa.bin").await.unwrap());
    }
}
