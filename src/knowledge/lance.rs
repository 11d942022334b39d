//! LanceDB Vector Store - 디스크 기반 벡터 검색 (feature = "lance")
//!
//! ANN 검색으로 큰 코퍼스에서도 빠르게 검색합니다.
//! ref: https://lancedb.github.io/lancedb/
//!
//! 덮어쓰기와 문서 교체는 삭제 후 추가 두 단계로 처리되어 원자적이지 않습니다.
//! 그 사이 실행된 검색은 교체 중인 청크를 보지 못할 수 있으므로,
//! 질의를 받는 중에 재인덱싱해야 한다면 메모리 저장소(스냅샷 교체)를 사용하세요.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use crate::models::{ChunkMetadata, IndexedChunk, ScoredChunk};

use super::vector::{rank_by_score, VectorStore, EMBEDDING_DIMENSION};

/// 벡터 테이블 이름
const TABLE_NAME: &str = "chunks";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
///
/// 같은 chunk_id는 삭제 후 다시 추가하며, 이때 삽입 순번은 새로 부여됩니다.
pub struct LanceVectorStore {
    db: Connection,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self { db })
    }

    /// 테이블 스키마
    fn create_schema() -> Schema {
        Schema::new(vec![
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("order_index", DataType::Int32, false),
            Field::new("seq", DataType::Int64, false),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIMENSION,
                ),
                false,
            ),
        ])
    }

    /// 청크들을 Arrow RecordBatch로 변환
    fn chunks_to_batch(chunks: &[IndexedChunk], base_seq: i64) -> Result<RecordBatch> {
        if chunks.is_empty() {
            anyhow::bail!("Cannot create batch from empty chunks");
        }

        if let Some(bad) = chunks
            .iter()
            .find(|c| c.embedding.len() != EMBEDDING_DIMENSION as usize)
        {
            anyhow::bail!(
                "Embedding dimension mismatch for {}: expected {}, got {}",
                bad.chunk_id,
                EMBEDDING_DIMENSION,
                bad.embedding.len()
            );
        }

        let chunk_ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        let document_ids: Vec<&str> = chunks
            .iter()
            .map(|c| c.metadata.document_id.as_str())
            .collect();
        let sources: Vec<&str> = chunks.iter().map(|c| c.metadata.source.as_str()).collect();
        let order_indices: Vec<i32> = chunks
            .iter()
            .map(|c| c.metadata.order_index as i32)
            .collect();
        let seqs: Vec<i64> = (0..chunks.len() as i64).map(|i| base_seq + i).collect();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

        // 임베딩을 FixedSizeList로 변환
        let embeddings_flat: Vec<f32> = chunks
            .iter()
            .flat_map(|c| c.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            EMBEDDING_DIMENSION,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema()),
            vec![
                Arc::new(StringArray::from(chunk_ids)),
                Arc::new(StringArray::from(document_ids)),
                Arc::new(StringArray::from(sources)),
                Arc::new(Int32Array::from(order_indices)),
                Arc::new(Int64Array::from(seqs)),
                Arc::new(StringArray::from(texts)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.contains(&TABLE_NAME.to_string()))
            .unwrap_or(false)
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table")
    }
}

/// 문자열 목록을 SQL IN 필터로 변환 (작은따옴표 이스케이프)
fn in_filter<'a>(column: &str, values: impl Iterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = values
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect();
    format!("{} IN ({})", column, quoted.join(", "))
}

fn chunk_id_filter(chunks: &[IndexedChunk]) -> String {
    in_filter("chunk_id", chunks.iter().map(|c| c.chunk_id.as_str()))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn upsert(&self, chunks: Vec<IndexedChunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let base_seq = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let batch = Self::chunks_to_batch(&chunks, base_seq)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await {
            let table = self.open_table().await?;

            // 같은 chunk_id 먼저 삭제
            table
                .delete(&chunk_id_filter(&chunks))
                .await
                .context("Failed to delete existing chunks")?;

            table
                .add(batches)
                .execute()
                .await
                .context("Failed to add chunks to table")?;
        } else {
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .context("Failed to create table")?;
        }

        Ok(chunks.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        if !self.table_exists().await {
            return Ok(vec![]);
        }

        let table = self.open_table().await?;

        let results = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        use futures::TryStreamExt;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        let mut scored = Vec::new();

        for batch in batches {
            let column = |name: &str| {
                batch
                    .column_by_name(name)
                    .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
            };

            let chunk_ids = column("chunk_id")?
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| anyhow::anyhow!("Bad chunk_id column"))?;
            let document_ids = column("document_id")?
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| anyhow::anyhow!("Bad document_id column"))?;
            let sources = column("source")?
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| anyhow::anyhow!("Bad source column"))?;
            let order_indices = column("order_index")?
                .as_any()
                .downcast_ref::<Int32Array>()
                .ok_or_else(|| anyhow::anyhow!("Bad order_index column"))?;
            let seqs = column("seq")?
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| anyhow::anyhow!("Bad seq column"))?;
            let texts = column("chunk_text")?
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| anyhow::anyhow!("Bad chunk_text column"))?;
            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = column("_distance")?
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| anyhow::anyhow!("Bad _distance column"))?;

            for i in 0..batch.num_rows() {
                // L2 거리 -> 유사도
                let similarity = 1.0 / (1.0 + distances.value(i));

                let chunk = IndexedChunk {
                    chunk_id: chunk_ids.value(i).to_string(),
                    // 검색 결과에는 임베딩을 싣지 않음
                    embedding: Vec::new(),
                    text: texts.value(i).to_string(),
                    metadata: ChunkMetadata {
                        document_id: document_ids.value(i).to_string(),
                        source: sources.value(i).to_string(),
                        order_index: order_indices.value(i).max(0) as usize,
                    },
                };

                scored.push((seqs.value(i).max(0) as u64, chunk, similarity));
            }
        }

        Ok(rank_by_score(scored, limit))
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }

    async fn delete_by_document(&self, document_ids: &[String]) -> Result<usize> {
        if document_ids.is_empty() || !self.table_exists().await {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let filter = in_filter("document_id", document_ids.iter().map(String::as_str));

        let count = table
            .count_rows(Some(filter.clone()))
            .await
            .context("Failed to count rows for document")?;
        if count > 0 {
            table
                .delete(&filter)
                .await
                .context("Failed to delete document chunks")?;
        }

        Ok(count)
    }

    async fn clear(&self) -> Result<()> {
        if self.table_exists().await {
            self.db
                .drop_table(TABLE_NAME)
                .await
                .context("Failed to drop table")?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "lancedb"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_chunk(document_id: &str, order_index: usize, value: f32) -> IndexedChunk {
        IndexedChunk {
            chunk_id: format!("{}#{}", document_id, order_index),
            embedding: vec![value; EMBEDDING_DIMENSION as usize],
            text: format!("Test chunk {} for {}", order_index, document_id),
            metadata: ChunkMetadata {
                document_id: document_id.to_string(),
                source: document_id.to_string(),
                order_index,
            },
        }
    }

    #[tokio::test]
    async fn test_lance_store_basic() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("test.lance"))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 0);

        let chunks = vec![create_test_chunk("a.txt", 0, 0.1), create_test_chunk("a.txt", 1, 0.2)];
        assert_eq!(store.upsert(chunks).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lance_upsert_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("upsert.lance"))
            .await
            .unwrap();

        store.upsert(vec![create_test_chunk("a.txt", 0, 0.1)]).await.unwrap();
        store.upsert(vec![create_test_chunk("a.txt", 0, 0.3)]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lance_search() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("search.lance"))
            .await
            .unwrap();

        store
            .upsert(vec![
                create_test_chunk("a.txt", 0, 0.1),
                create_test_chunk("b.txt", 0, 0.5),
                create_test_chunk("c.txt", 0, 0.9),
            ])
            .await
            .unwrap();

        let query = vec![0.1; EMBEDDING_DIMENSION as usize];
        let results = store.search(&query, 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_id, "a.txt#0");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_lance_replace_documents() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("replace.lance"))
            .await
            .unwrap();

        store
            .upsert(vec![
                create_test_chunk("a.txt", 0, 0.1),
                create_test_chunk("a.txt", 1, 0.1),
                create_test_chunk("b.txt", 0, 0.5),
            ])
            .await
            .unwrap();

        store
            .replace_documents(&["a.txt".to_string()], vec![create_test_chunk("a.txt", 0, 0.2)])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        assert_eq!(store.delete_by_document(&["b.txt".to_string()]).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[test]
    fn test_in_filter_escapes_quotes() {
        let filter = in_filter("document_id", ["a.txt", "it's.md"].into_iter());
        assert_eq!(filter, "document_id IN ('a.txt', 'it''s.md')");
    }

    #[tokio::test]
    async fn test_lance_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("clear.lance"))
            .await
            .unwrap();

        store.upsert(vec![create_test_chunk("a.txt", 0, 0.1)]).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
