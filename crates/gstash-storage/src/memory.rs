//! In-memory object store.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::error::{StorageError, StorageResult};
use crate::metadata::{split_metadata, ObjectMetadata, CACHE_CONTROL_KEY, CONTENT_TYPE_KEY};
use crate::store::{ObjectInfo, ObjectStore};

#[derive(Clone)]
struct MemoryObject {
    content: Vec<u8>,
    info: ObjectInfo,
}

/// Process-local implementation of [`ObjectStore`], used by tests and for
/// running without a bucket.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<String, MemoryObject>>>,
    generation: Arc<std::sync::atomic::AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys in lexical order.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Stored object info, if present.
    pub fn info(&self, key: &str) -> Option<ObjectInfo> {
        self.objects
            .read()
            .expect("lock poisoned")
            .get(key)
            .map(|o| o.info.clone())
    }

    /// Insert bytes directly, bypassing the file-based upload path.
    pub fn insert(&self, key: &str, content: impl Into<Vec<u8>>) {
        let content = content.into();
        let info = ObjectInfo {
            key: key.to_string(),
            size: content.len() as u64,
            generation: Some(self.next_generation()),
            ..Default::default()
        };
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(key.to_string(), MemoryObject { content, info });
    }

    fn next_generation(&self) -> String {
        let n = self
            .generation
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        (n + 1).to_string()
    }
}

impl ObjectStore for MemoryStore {
    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<ObjectInfo> {
        let content = tokio::fs::read(path).await?;
        let split = split_metadata(metadata);

        let info = ObjectInfo {
            key: key.to_string(),
            size: content.len() as u64,
            content_type: split.resource_str(CONTENT_TYPE_KEY),
            cache_control: split.resource_str(CACHE_CONTROL_KEY),
            generation: Some(self.next_generation()),
            updated: None,
            metadata: split.custom,
        };

        self.objects.write().expect("lock poisoned").insert(
            key.to_string(),
            MemoryObject {
                content,
                info: info.clone(),
            },
        );
        Ok(info)
    }

    async fn download(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let objects = self.objects.read().expect("lock poisoned");
        Ok(objects.get(key).map(|o| o.content.clone()))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let objects = self.objects.read().expect("lock poisoned");
        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, o)| o.info.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut objects = self.objects.write().expect("lock poisoned");
        Ok(objects.remove(key).is_some())
    }

    async fn copy(&self, src: &str, dest: &str) -> StorageResult<ObjectInfo> {
        let generation = self.next_generation();
        let mut objects = self.objects.write().expect("lock poisoned");
        let source = objects
            .get(src)
            .cloned()
            .ok_or_else(|| StorageError::not_found(src))?;

        let mut info = source.info;
        info.key = dest.to_string();
        info.generation = Some(generation);

        objects.insert(
            dest.to_string(),
            MemoryObject {
                content: source.content,
                info: info.clone(),
            },
        );
        Ok(info)
    }
}
