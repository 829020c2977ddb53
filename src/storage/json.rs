//! JSON file storage implementation.
//!
//! One directory per normalized topic under a root directory, each holding a
//! `papers_info.json` file with the pretty-printed `id -> PaperRecord` map.
//! Writes go to a temporary sibling file which is then renamed over the
//! partition, so readers never observe a half-written partition.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::{PaperStore, StorageError, StorageResult};
use crate::models::{normalize_topic, PaperRecord, TopicSummary};

/// File name of a partition inside its topic directory.
pub const PARTITION_FILE: &str = "papers_info.json";

/// `id -> record` in insertion order; re-inserting an id keeps its position.
type Partition = Map<String, Value>;

/// Outcome of reading one partition file.
enum PartitionRead {
    Missing,
    Corrupt(String),
    Loaded(Partition),
}

/// File-backed paper store rooted at a directory.
pub struct JsonFileStore {
    /// Root directory holding one subdirectory per topic
    root: PathBuf,

    /// Per-topic write guards
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl JsonFileStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the partition file for an already normalized topic.
    pub fn partition_path(&self, partition: &str) -> PathBuf {
        self.root.join(partition).join(PARTITION_FILE)
    }

    fn topic_lock(&self, partition: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(partition.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    async fn read_partition(path: &Path) -> StorageResult<PartitionRead> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PartitionRead::Missing)
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut partition = match serde_json::from_slice::<Partition>(&bytes) {
            Ok(partition) => partition,
            Err(e) => return Ok(PartitionRead::Corrupt(e.to_string())),
        };

        for (id, value) in partition.iter_mut() {
            let mut record = match PaperRecord::deserialize(&*value) {
                Ok(record) => record,
                Err(e) => return Ok(PartitionRead::Corrupt(format!("record {}: {}", id, e))),
            };
            // Older partitions keyed records by id without repeating it
            if record.id.is_empty() {
                record.id = id.clone();
                *value = to_value(&record)?;
            }
        }
        Ok(PartitionRead::Loaded(partition))
    }

    async fn write_partition(&self, partition: &str, data: &Partition) -> StorageResult<()> {
        let dir = self.root.join(partition);
        tokio::fs::create_dir_all(&dir).await?;

        let body = serde_json::to_string_pretty(data)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let target = dir.join(PARTITION_FILE);
        let tmp = dir.join(format!("{}.tmp", PARTITION_FILE));
        tokio::fs::write(&tmp, body.as_bytes()).await?;
        tokio::fs::rename(&tmp, &target).await?;
        Ok(())
    }

    /// Topic directories under the root, sorted by name.
    async fn partition_names(&self) -> StorageResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn to_value(record: &PaperRecord) -> StorageResult<Value> {
    serde_json::to_value(record).map_err(|e| StorageError::SerializationError(e.to_string()))
}

/// `normalize_topic` keeps keys to one directory level; refuse anything else.
fn is_single_component(partition: &str) -> bool {
    let mut components = Path::new(partition).components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    )
}

#[async_trait]
impl PaperStore for JsonFileStore {
    async fn upsert_from_search(
        &self,
        topic: &str,
        records: &[PaperRecord],
    ) -> StorageResult<Vec<String>> {
        let partition = normalize_topic(topic);
        if !is_single_component(&partition) {
            return Err(StorageError::InvalidTopic(topic.to_string()));
        }

        let lock = self.topic_lock(&partition);
        let _guard = lock.lock().await;

        let path = self.partition_path(&partition);
        let mut data = match Self::read_partition(&path).await? {
            PartitionRead::Loaded(data) => data,
            PartitionRead::Missing => Partition::new(),
            PartitionRead::Corrupt(reason) => {
                warn!("Partition {} is corrupt, starting from empty: {}", path.display(), reason);
                Partition::new()
            }
        };

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(record.id.clone());
            data.insert(record.id.clone(), to_value(record)?);
        }

        self.write_partition(&partition, &data).await?;
        info!(
            "Saved {} search results to {} ({} papers in partition)",
            records.len(),
            path.display(),
            data.len()
        );

        Ok(ids)
    }

    async fn lookup(&self, paper_id: &str) -> StorageResult<Option<PaperRecord>> {
        for partition in self.partition_names().await? {
            let path = self.partition_path(&partition);
            match Self::read_partition(&path).await {
                Ok(PartitionRead::Loaded(mut data)) => {
                    if let Some(value) = data.remove(paper_id) {
                        debug!("Found paper {} in partition {}", paper_id, partition);
                        let record = PaperRecord::deserialize(value)
                            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
                        return Ok(Some(record));
                    }
                }
                Ok(PartitionRead::Missing) => {}
                Ok(PartitionRead::Corrupt(reason)) => {
                    warn!("Skipping corrupt partition {}: {}", path.display(), reason);
                }
                Err(e) => {
                    warn!("Skipping unreadable partition {}: {}", path.display(), e);
                }
            }
        }
        Ok(None)
    }

    async fn topics(&self) -> StorageResult<Vec<TopicSummary>> {
        let mut summaries = Vec::new();
        for partition in self.partition_names().await? {
            let path = self.partition_path(&partition);
            let paper_count = match Self::read_partition(&path).await {
                Ok(PartitionRead::Loaded(data)) => data.len(),
                Ok(PartitionRead::Missing) => continue,
                Ok(PartitionRead::Corrupt(_)) | Err(_) => 0,
            };
            summaries.push(TopicSummary {
                topic: partition,
                paper_count,
            });
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paper(id: &str, title: &str) -> PaperRecord {
        PaperRecord {
            id: id.to_string(),
            title: title.to_string(),
            authors: vec!["Ada Lovelace".to_string(), "Alan Turing".to_string()],
            summary: format!("Abstract of {}", title),
            pdf_url: format!("http://arxiv.org/pdf/{}v1", id),
            published: "2024-03-01".to_string(),
        }
    }

    async fn read_raw(store: &JsonFileStore, topic: &str) -> Partition {
        let path = store.partition_path(&normalize_topic(topic));
        let bytes = tokio::fs::read(path).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_creates_partition_under_normalized_topic() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());

        let ids = store
            .upsert_from_search("Quantum Computing", &[paper("2401.00001", "Qubits")])
            .await
            .unwrap();

        assert_eq!(ids, vec!["2401.00001"]);
        assert!(dir.path().join("quantum_computing").join(PARTITION_FILE).exists());
    }

    #[tokio::test]
    async fn test_partition_file_is_pretty_printed_with_two_spaces() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        store
            .upsert_from_search("physics", &[paper("1", "One")])
            .await
            .unwrap();

        let text = std::fs::read_to_string(store.partition_path("physics")).unwrap();
        assert!(text.starts_with("{\n  \"1\": {\n    \"id\": \"1\""));
    }

    #[tokio::test]
    async fn test_idempotent_upsert_with_overlapping_results() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());

        store
            .upsert_from_search("ml", &[paper("a", "A old"), paper("b", "B")])
            .await
            .unwrap();
        store
            .upsert_from_search("ml", &[paper("b", "B"), paper("a", "A new"), paper("c", "C")])
            .await
            .unwrap();

        let data = read_raw(&store, "ml").await;
        assert_eq!(data.len(), 3);
        assert_eq!(data["a"]["title"], "A new");
    }

    #[tokio::test]
    async fn test_upsert_returns_ids_in_search_order() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        store
            .upsert_from_search("ml", &[paper("m", "M")])
            .await
            .unwrap();

        let ids = store
            .upsert_from_search("ml", &[paper("z", "Z"), paper("m", "M"), paper("b", "B")])
            .await
            .unwrap();

        assert_eq!(ids, vec!["z", "m", "b"]);
    }

    #[tokio::test]
    async fn test_empty_search_keeps_prior_content() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        store
            .upsert_from_search("ml", &[paper("a", "A")])
            .await
            .unwrap();

        let ids = store.upsert_from_search("ml", &[]).await.unwrap();

        assert!(ids.is_empty());
        assert_eq!(read_raw(&store, "ml").await.len(), 1);
    }

    #[tokio::test]
    async fn test_cross_topic_lookup() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        store
            .upsert_from_search("biology", &[paper("bio-1", "Cells")])
            .await
            .unwrap();
        store
            .upsert_from_search("chemistry", &[paper("chem-1", "Bonds")])
            .await
            .unwrap();

        let found = store.lookup("bio-1").await.unwrap().unwrap();
        assert_eq!(found.title, "Cells");
        let found = store.lookup("chem-1").await.unwrap().unwrap();
        assert_eq!(found.title, "Bonds");
    }

    #[tokio::test]
    async fn test_lookup_unknown_id_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        store
            .upsert_from_search("biology", &[paper("bio-1", "Cells")])
            .await
            .unwrap();

        assert!(store.lookup("nonexistent-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_with_missing_root_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("never-created"));
        assert!(store.lookup("anything").await.unwrap().is_none());
        assert!(store.topics().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_partition_is_replaced_by_new_results() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("ml")).unwrap();
        std::fs::write(store.partition_path("ml"), "{ not json").unwrap();

        let ids = store
            .upsert_from_search("ml", &[paper("new", "New")])
            .await
            .unwrap();

        assert_eq!(ids, vec!["new"]);
        let data = read_raw(&store, "ml").await;
        assert_eq!(data.len(), 1);
        assert!(data.contains_key("new"));
    }

    #[tokio::test]
    async fn test_lookup_skips_corrupt_partition() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        // "aaa" sorts before "zzz", so the corrupt partition is scanned first
        std::fs::create_dir_all(dir.path().join("aaa")).unwrap();
        std::fs::write(store.partition_path("aaa"), "[1, 2").unwrap();
        store
            .upsert_from_search("zzz", &[paper("target", "Target")])
            .await
            .unwrap();

        let found = store.lookup("target").await.unwrap();
        assert_eq!(found.map(|p| p.title), Some("Target".to_string()));
    }

    #[tokio::test]
    async fn test_legacy_records_without_id_are_keyed_by_map_key() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("legacy")).unwrap();
        std::fs::write(
            store.partition_path("legacy"),
            r#"{"old-1": {"title": "Old", "authors": [], "summary": "", "pdf_url": "", "published": "2020-01-01"}}"#,
        )
        .unwrap();

        let found = store.lookup("old-1").await.unwrap().unwrap();
        assert_eq!(found.id, "old-1");
    }

    #[tokio::test]
    async fn test_topics_lists_partitions_with_counts() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        store
            .upsert_from_search("Deep Learning", &[paper("a", "A"), paper("b", "B")])
            .await
            .unwrap();
        store
            .upsert_from_search("biology", &[paper("c", "C")])
            .await
            .unwrap();

        let topics = store.topics().await.unwrap();
        assert_eq!(
            topics,
            vec![
                TopicSummary { topic: "biology".to_string(), paper_count: 1 },
                TopicSummary { topic: "deep_learning".to_string(), paper_count: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn test_topics_with_path_separators_stay_under_root() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());

        let ids = store
            .upsert_from_search("TCP/IP congestion control", &[paper("tcp-1", "Reno")])
            .await
            .unwrap();
        store
            .upsert_from_search("..", &[paper("dots-1", "Dots")])
            .await
            .unwrap();

        assert_eq!(ids, vec!["tcp-1"]);
        assert!(dir
            .path()
            .join("tcp_ip_congestion_control")
            .join(PARTITION_FILE)
            .exists());
        assert!(dir.path().join("untitled").join(PARTITION_FILE).exists());
        let found = store.lookup("tcp-1").await.unwrap().unwrap();
        assert_eq!(found.title, "Reno");
    }

    #[test]
    fn test_partition_names_must_be_one_directory() {
        assert!(is_single_component("tcp_ip"));
        assert!(!is_single_component(""));
        assert!(!is_single_component(".."));
        assert!(!is_single_component("a/b"));
        assert!(!is_single_component("/abs"));
    }

    #[tokio::test]
    async fn test_empty_search_creates_missing_partition() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());

        let ids = store.upsert_from_search("fresh", &[]).await.unwrap();

        assert!(ids.is_empty());
        let path = dir.path().join("fresh").join(PARTITION_FILE);
        assert!(path.exists());
        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_topics_reports_corrupt_partition_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("broken")).unwrap();
        std::fs::write(store.partition_path("broken"), "{ not json").unwrap();
        store
            .upsert_from_search("fine", &[paper("a", "A")])
            .await
            .unwrap();

        let topics = store.topics().await.unwrap();
        assert_eq!(
            topics,
            vec![
                TopicSummary { topic: "broken".to_string(), paper_count: 0 },
                TopicSummary { topic: "fine".to_string(), paper_count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_partition_keeps_insertion_order() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        store
            .upsert_from_search("ml", &[paper("z", "Z"), paper("a", "A")])
            .await
            .unwrap();
        store
            .upsert_from_search("ml", &[paper("m", "M"), paper("z", "Z new")])
            .await
            .unwrap();

        let data = read_raw(&store, "ml").await;
        let keys: Vec<&String> = data.keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(data["z"]["title"], "Z new");
    }

    #[tokio::test]
    async fn test_concurrent_upserts_to_same_topic_keep_all_records() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let id = format!("p{}", i);
                store.upsert_from_search("shared", &[paper(&id, &id)]).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(read_raw(&store, "shared").await.len(), 8);
    }
}
