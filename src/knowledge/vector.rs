//! Vector Store - 인메모리 청크/임베딩 저장소
//!
//! 키워드 검색, 코사인 유사도 검색, 가중합 하이브리드 검색을 제공합니다.
//! 임베딩 키 집합은 항상 청크 키 집합의 부분집합입니다.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::types::DocumentChunk;

// ============================================================================
// Types
// ============================================================================

/// 검색 방법
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMethod {
    /// 임베딩 코사인 유사도
    Semantic,
    /// 키워드 매칭 비율
    Keyword,
    /// 가중합 통합
    Hybrid,
}

impl SearchMethod {
    pub fn label(&self) -> &'static str {
        match self {
            SearchMethod::Semantic => "SEM",
            SearchMethod::Keyword => "KW",
            SearchMethod::Hybrid => "HYB",
        }
    }
}

/// 검색 결과
///
/// 스코어 스케일은 검색 방법마다 다르므로 방법 간 비교는 의미가 없습니다.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// 저장소와 공유하는 청크
    pub chunk: Arc<DocumentChunk>,
    /// 높을수록 관련성 높음
    pub score: f32,
    /// 원본 파일명
    pub source_document: String,
    pub method: SearchMethod,
}

impl RetrievalResult {
    fn new(chunk: Arc<DocumentChunk>, score: f32, method: SearchMethod) -> Self {
        let source_document = chunk.filename().to_string();
        Self {
            chunk,
            score,
            source_document,
            method,
        }
    }
}

// ============================================================================
// InMemoryVectorStore
// ============================================================================

/// 인메모리 벡터 저장소
///
/// 정렬 맵을 사용하므로 동점 결과의 순서가 실행 간에도 일정합니다.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    chunks: BTreeMap<String, Arc<DocumentChunk>>,
    embeddings: BTreeMap<String, Vec<f32>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 청크 추가 (ID 기준 upsert, 나중 값 우선)
    ///
    /// `embeddings`는 `chunks`와 위치 정렬되어야 합니다.
    /// 임베딩이 없거나 빈 벡터인 청크는 키워드 검색만 가능합니다.
    /// 같은 ID(= 같은 콘텐츠)에 이미 저장된 임베딩은 유지됩니다.
    pub fn add(&mut self, chunks: Vec<DocumentChunk>, embeddings: Option<&[Vec<f32>]>) {
        for (i, mut chunk) in chunks.into_iter().enumerate() {
            let embedding = embeddings
                .and_then(|e| e.get(i))
                .filter(|v| !v.is_empty())
                .cloned()
                .or_else(|| chunk.embedding.clone().filter(|v| !v.is_empty()))
                .or_else(|| self.embeddings.get(&chunk.id).cloned());

            if let Some(ref embedding) = embedding {
                self.embeddings.insert(chunk.id.clone(), embedding.clone());
                chunk.embedding = Some(embedding.clone());
            }

            self.chunks.insert(chunk.id.clone(), Arc::new(chunk));
        }
    }

    /// 코사인 유사도 검색
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Vec<RetrievalResult> {
        if self.embeddings.is_empty() || query_embedding.is_empty() {
            return vec![];
        }

        let results = self
            .embeddings
            .iter()
            .filter_map(|(id, embedding)| {
                let chunk = self.chunks.get(id)?;
                let score = cosine_similarity(query_embedding, embedding);
                Some(RetrievalResult::new(
                    Arc::clone(chunk),
                    score,
                    SearchMethod::Semantic,
                ))
            })
            .collect();

        rank(results, top_k)
    }

    /// 키워드 검색
    ///
    /// 스코어 = 청크에 부분 문자열로 등장하는 쿼리 단어 수 / 쿼리 단어 수
    pub fn keyword_search(&self, query: &str, top_k: usize) -> Vec<RetrievalResult> {
        let query = query.to_lowercase();
        let terms: Vec<&str> = query.split_whitespace().collect();
        if terms.is_empty() {
            return vec![];
        }

        let results = self
            .chunks
            .values()
            .filter_map(|chunk| {
                let content = chunk.content.to_lowercase();
                let hits = terms.iter().filter(|t| content.contains(*t)).count();
                if hits == 0 {
                    return None;
                }
                let score = hits as f32 / terms.len() as f32;
                Some(RetrievalResult::new(
                    Arc::clone(chunk),
                    score,
                    SearchMethod::Keyword,
                ))
            })
            .collect();

        rank(results, top_k)
    }

    /// 하이브리드 검색 (가중합)
    ///
    /// fused = (1 - alpha) * keyword + alpha * semantic
    ///
    /// 각 검색에서 `2 * top_k` 후보를 가져와 합칩니다. 가중치가 0인 쪽은
    /// 후보를 내지 않습니다. 저장된 임베딩이 없거나 쿼리 임베딩이 비어 있으면
    /// 키워드 검색 결과를 그대로 반환합니다.
    pub fn hybrid_search(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        top_k: usize,
        alpha: f32,
    ) -> Vec<RetrievalResult> {
        if self.embeddings.is_empty() || query_embedding.is_empty() {
            tracing::debug!("No embeddings available, hybrid search falls back to keyword");
            return self.keyword_search(query_text, top_k);
        }

        let alpha = alpha.clamp(0.0, 1.0);
        let candidates = top_k.saturating_mul(2);

        let keyword_results = if alpha < 1.0 {
            self.keyword_search(query_text, candidates)
        } else {
            vec![]
        };
        let semantic_results = if alpha > 0.0 {
            self.search(query_embedding, candidates)
        } else {
            vec![]
        };

        // 삽입 순서 유지 (키워드 → 시맨틱) 후 안정 정렬
        let mut order: Vec<String> = Vec::new();
        let mut fused: HashMap<String, (Arc<DocumentChunk>, f32)> = HashMap::new();

        let weighted = [(keyword_results, 1.0 - alpha), (semantic_results, alpha)];
        for (results, weight) in weighted {
            for result in results {
                let entry = fused.entry(result.chunk.id.clone()).or_insert_with(|| {
                    order.push(result.chunk.id.clone());
                    (Arc::clone(&result.chunk), 0.0)
                });
                entry.1 += weight * result.score;
            }
        }

        let results = order
            .into_iter()
            .filter_map(|id| fused.remove(&id))
            .map(|(chunk, score)| RetrievalResult::new(chunk, score, SearchMethod::Hybrid))
            .collect();

        rank(results, top_k)
    }

    /// ID로 청크 삭제 (없는 ID는 무시)
    pub fn delete(&mut self, ids: &[String]) -> usize {
        let mut removed = 0;
        for id in ids {
            if self.chunks.remove(id).is_some() {
                removed += 1;
            }
            self.embeddings.remove(id);
        }
        removed
    }

    /// 파일명으로 청크 삭제
    pub fn delete_by_filename(&mut self, filename: &str) -> usize {
        let ids: Vec<String> = self
            .chunks
            .values()
            .filter(|chunk| chunk.filename() == filename)
            .map(|chunk| chunk.id.clone())
            .collect();

        self.delete(&ids)
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.embeddings.clear();
    }

    pub fn get(&self, id: &str) -> Option<Arc<DocumentChunk>> {
        self.chunks.get(id).cloned()
    }

    /// 저장된 청크 (ID 순)
    pub fn chunks(&self) -> impl Iterator<Item = &Arc<DocumentChunk>> {
        self.chunks.values()
    }

    pub(crate) fn embeddings(&self) -> &BTreeMap<String, Vec<f32>> {
        &self.embeddings
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn embedding_count(&self) -> usize {
        self.embeddings.len()
    }

    pub fn has_embeddings(&self) -> bool {
        !self.embeddings.is_empty()
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다.
/// 길이가 다르거나, 비어 있거나, 노름이 0이면 0.0을 반환합니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// 스코어 내림차순 안정 정렬 후 top_k
fn rank(mut results: Vec<RetrievalResult>, top_k: usize) -> Vec<RetrievalResult> {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_k);
    results
}

// ============================================================================
// Tests
// ============================================================================
