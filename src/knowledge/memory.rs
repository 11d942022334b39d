//! In-memory Vector Store - 전수 코사인 검색 + JSON 스냅샷
//!
//! 쓰기는 copy-and-swap 방식입니다. 새 스냅샷을 만든 뒤 포인터만 교체하므로
//! 진행 중인 검색은 항상 완전한 이전 스냅샷이나 새 스냅샷 중 하나만 봅니다.
//!
//! 저장 위치: <data_dir>/index.json

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{IndexedChunk, ScoredChunk};

use super::vector::{cosine_similarity, rank_by_score, VectorStore};

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    next_seq: u64,
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    /// 삽입 순번 (동점 정렬용)
    seq: u64,
    chunk: IndexedChunk,
}

impl Snapshot {
    /// 청크 병합 (같은 chunk_id는 덮어씀)
    ///
    /// `retired`에 있는 chunk_id는 이전 순번을 다시 씁니다.
    fn merge(&mut self, chunks: Vec<IndexedChunk>, retired: &HashMap<String, u64>) -> usize {
        let mut positions: HashMap<String, usize> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.chunk.chunk_id.clone(), i))
            .collect();

        let count = chunks.len();
        for chunk in chunks {
            match positions.get(&chunk.chunk_id) {
                Some(&i) => self.entries[i].chunk = chunk,
                None => {
                    let seq = match retired.get(&chunk.chunk_id) {
                        Some(&seq) => seq,
                        None => {
                            let seq = self.next_seq;
                            self.next_seq += 1;
                            seq
                        }
                    };
                    positions.insert(chunk.chunk_id.clone(), self.entries.len());
                    self.entries.push(StoredEntry { seq, chunk });
                }
            }
        }
        count
    }

    /// 주어진 문서의 청크를 뺀 스냅샷과, 빠진 chunk_id별 순번
    fn without_documents(&self, document_ids: &[String]) -> (Snapshot, HashMap<String, u64>) {
        let targets: HashSet<&str> = document_ids.iter().map(String::as_str).collect();
        let mut retired = HashMap::new();
        let mut entries = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            if targets.contains(entry.chunk.metadata.document_id.as_str()) {
                retired.insert(entry.chunk.chunk_id.clone(), entry.seq);
            } else {
                entries.push(entry.clone());
            }
        }

        let next = Snapshot {
            next_seq: self.next_seq,
            entries,
        };
        (next, retired)
    }
}

// ============================================================================
// MemoryVectorStore
// ============================================================================

/// 메모리 벡터 저장소
pub struct MemoryVectorStore {
    current: RwLock<Arc<Snapshot>>,
    /// 쓰기 직렬화
    write_lock: Mutex<()>,
    path: Option<PathBuf>,
}

impl MemoryVectorStore {
    /// 영속화 없는 저장소 생성
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::default())),
            write_lock: Mutex::new(()),
            path: None,
        }
    }

    /// 스냅샷 파일에서 열기 (없으면 빈 저장소)
    ///
    /// # Arguments
    /// * `path` - JSON 스냅샷 경로
    pub fn open(path: &Path) -> Result<Self> {
        let snapshot = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read index snapshot: {:?}", path))?;
            let snapshot: Snapshot = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse index snapshot: {:?}", path))?;
            tracing::info!(
                "Loaded vector index from {:?} ({} chunks)",
                path,
                snapshot.entries.len()
            );
            snapshot
        } else {
            tracing::debug!("No index snapshot at {:?}, starting empty", path);
            Snapshot::default()
        };

        Ok(Self {
            current: RwLock::new(Arc::new(snapshot)),
            write_lock: Mutex::new(()),
            path: Some(path.to_path_buf()),
        })
    }

    /// 현재 스냅샷을 디스크에 저장 (임시 파일 후 rename)
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create index directory")?;
            }
        }

        let snapshot = self.snapshot()?;
        let json = serde_json::to_string(snapshot.as_ref())
            .context("Failed to serialize index snapshot")?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write index snapshot: {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace index snapshot: {:?}", path))?;

        tracing::debug!("Persisted {} chunks to {:?}", snapshot.entries.len(), path);
        Ok(())
    }

    fn snapshot(&self) -> Result<Arc<Snapshot>> {
        let guard = self
            .current
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(Arc::clone(&guard))
    }

    fn swap(&self, next: Snapshot) -> Result<()> {
        let mut guard = self
            .current
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        *guard = Arc::new(next);
        Ok(())
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, chunks: Vec<IndexedChunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let _writer = self
            .write_lock
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut next = (*self.snapshot()?).clone();
        let count = next.merge(chunks, &HashMap::new());

        self.swap(next)?;
        Ok(count)
    }

    async fn delete_by_document(&self, document_ids: &[String]) -> Result<usize> {
        if document_ids.is_empty() {
            return Ok(0);
        }

        let _writer = self
            .write_lock
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let (next, retired) = self.snapshot()?.without_documents(document_ids);
        self.swap(next)?;
        Ok(retired.len())
    }

    /// 삭제와 삽입을 한 번의 스냅샷 교체로 처리
    async fn replace_documents(
        &self,
        document_ids: &[String],
        chunks: Vec<IndexedChunk>,
    ) -> Result<usize> {
        let _writer = self
            .write_lock
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let (mut next, retired) = self.snapshot()?.without_documents(document_ids);
        let count = next.merge(chunks, &retired);

        tracing::debug!(
            "Replaced {} documents: {} chunks removed, {} inserted",
            document_ids.len(),
            retired.len(),
            count
        );

        self.swap(next)?;
        Ok(count)
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let snapshot = self.snapshot()?;

        let scored = snapshot
            .entries
            .iter()
            .map(|e| {
                let score = cosine_similarity(query_embedding, &e.chunk.embedding);
                (e.seq, e.chunk.clone(), score)
            })
            .collect();

        Ok(rank_by_score(scored, limit))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.snapshot()?.entries.len())
    }

    async fn clear(&self) -> Result<()> {
        let _writer = self
            .write_lock
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        self.swap(Snapshot::default())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Tests
// ============================================================================
