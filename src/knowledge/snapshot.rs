//! 인덱스 스냅샷 - JSON 내보내기/가져오기
//!
//! 청크 저장소와 임베딩 저장소를 청크 ID 키의 평행 맵으로 직렬화합니다.
//! 복원은 `InMemoryVectorStore::add`를 거치므로 저장소 불변식이 그대로 유지됩니다.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::DocumentChunk;
use super::vector::InMemoryVectorStore;
use crate::error::{RagError, Result};

/// 현재 스냅샷 포맷 버전
pub const SNAPSHOT_VERSION: u32 = 1;

/// 인덱스 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub version: u32,
    pub chunks: BTreeMap<String, DocumentChunk>,
    pub embeddings: BTreeMap<String, Vec<f32>>,
}

impl IndexSnapshot {
    /// 저장소 상태 캡처
    pub fn capture(store: &InMemoryVectorStore) -> Self {
        let chunks = store
            .chunks()
            .map(|chunk| {
                let mut chunk = DocumentChunk::clone(chunk);
                // 벡터는 embeddings 맵에만 기록
                chunk.embedding = None;
                (chunk.id.clone(), chunk)
            })
            .collect();

        Self {
            version: SNAPSHOT_VERSION,
            chunks,
            embeddings: store.embeddings().clone(),
        }
    }

    /// 저장소를 비우고 스냅샷 내용으로 채움
    ///
    /// 대응하는 청크가 없는 임베딩은 무시됩니다.
    pub fn restore_into(self, store: &mut InMemoryVectorStore) -> Result<usize> {
        if self.version != SNAPSHOT_VERSION {
            return Err(RagError::SnapshotVersion(self.version));
        }

        let mut embeddings = self.embeddings;
        let mut chunks = Vec::with_capacity(self.chunks.len());
        let mut vectors = Vec::with_capacity(self.chunks.len());

        for (id, chunk) in self.chunks {
            vectors.push(embeddings.remove(&id).unwrap_or_default());
            chunks.push(chunk);
        }

        if !embeddings.is_empty() {
            tracing::warn!("Ignoring {} orphaned embeddings in snapshot", embeddings.len());
        }

        let count = chunks.len();
        store.clear();
        store.add(chunks, Some(&vectors));
        Ok(count)
    }

    /// JSON 파일로 저장 (부모 디렉토리 자동 생성)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        tracing::debug!("Saved snapshot with {} chunks to {:?}", self.chunks.len(), path);
        Ok(())
    }

    /// JSON 파일에서 로드
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
