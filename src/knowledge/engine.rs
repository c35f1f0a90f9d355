//! RAG 엔진 - 인덱싱/검색/컨텍스트 생성
//!
//! 문서 처리기, 벡터 저장소, 선택적 임베딩 프로바이더를 묶습니다.
//! 임베딩 호출은 락 밖에서 수행하고, 락 가드는 `.await`를 넘지 않습니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let engine = RagEngine::from_settings(&settings, create_embedder(&settings.embedding)?);
//! engine.index_document(&text, "pojk-40.txt", None).await?;
//! let context = engine.generate_context("NPL ratio", 5).await?;
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use super::chunker::ChunkConfig;
use super::processor::DocumentProcessor;
use super::snapshot::IndexSnapshot;
use super::types::{Metadata, ProcessedDocument};
use super::vector::{InMemoryVectorStore, RetrievalResult};
use crate::config::Settings;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// 검색 결과가 없을 때의 컨텍스트
pub const NO_RESULTS_CONTEXT: &str = "No relevant documents found.";

/// 컨텍스트 블록 구분자
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

// ============================================================================
// Types
// ============================================================================

/// 검색 기본값
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// 하이브리드 가중치 (0 = 키워드만, 1 = 시맨틱만)
    pub alpha: f32,
    pub use_hybrid: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            alpha: 0.5,
            use_hybrid: true,
        }
    }
}

/// 인덱스 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RagStats {
    pub total_chunks: usize,
    pub embedded_chunks: usize,
    pub has_embeddings: bool,
    /// 서로 다른 파일명 수
    pub document_count: usize,
    /// 카테고리별 청크 수 (청크 하나가 여러 카테고리에 집계됨)
    pub categories: BTreeMap<String, usize>,
}

// ============================================================================
// RagEngine
// ============================================================================

/// RAG 엔진
///
/// `Arc<RagEngine>`으로 여러 태스크에서 공유합니다.
pub struct RagEngine {
    processor: DocumentProcessor,
    store: RwLock<InMemoryVectorStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    settings: RetrievalSettings,
}

impl RagEngine {
    /// 새 엔진 생성
    ///
    /// # Arguments
    /// * `chunk_config` - 청킹 설정
    /// * `settings` - 검색 기본값
    /// * `embedder` - 임베딩 프로바이더 (None이면 키워드 검색 전용)
    pub fn new(
        chunk_config: ChunkConfig,
        settings: RetrievalSettings,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        Self {
            processor: DocumentProcessor::new(chunk_config),
            store: RwLock::new(InMemoryVectorStore::new()),
            embedder,
            settings,
        }
    }

    /// 전체 설정에서 생성
    pub fn from_settings(settings: &Settings, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self::new(settings.rag.chunk_config(), settings.rag.retrieval(), embedder)
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    pub fn top_k(&self) -> usize {
        self.settings.top_k
    }

    pub fn use_hybrid(&self) -> bool {
        self.settings.use_hybrid
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    pub fn chunker_name(&self) -> &'static str {
        self.processor.chunker_name()
    }

    fn read_store(&self) -> Result<RwLockReadGuard<'_, InMemoryVectorStore>> {
        self.store.read().map_err(|_| RagError::LockPoisoned)
    }

    fn write_store(&self) -> Result<RwLockWriteGuard<'_, InMemoryVectorStore>> {
        self.store.write().map_err(|_| RagError::LockPoisoned)
    }

    // ------------------------------------------------------------------------
    // Indexing
    // ------------------------------------------------------------------------

    /// 문서 인덱싱 (추가 전용)
    ///
    /// 같은 파일명의 이전 청크는 남아 있습니다. 교체가 필요하면
    /// `replace_document`를 사용하세요.
    pub async fn index_document(
        &self,
        content: &str,
        filename: &str,
        metadata: Option<Metadata>,
    ) -> Result<ProcessedDocument> {
        let doc = self.prepare(content, filename, metadata).await;

        {
            let mut store = self.write_store()?;
            store.add(doc.chunks.clone(), None);
        }

        tracing::info!("Indexed '{}' ({} chunks)", filename, doc.chunk_count());
        Ok(doc)
    }

    /// 문서 교체 인덱싱
    ///
    /// 하나의 쓰기 락 안에서 같은 파일명의 청크를 모두 지우고 새 청크를 추가합니다.
    pub async fn replace_document(
        &self,
        content: &str,
        filename: &str,
        metadata: Option<Metadata>,
    ) -> Result<ProcessedDocument> {
        let doc = self.prepare(content, filename, metadata).await;

        let removed = {
            let mut store = self.write_store()?;
            let removed = store.delete_by_filename(filename);
            store.add(doc.chunks.clone(), None);
            removed
        };

        tracing::info!(
            "Replaced '{}' ({} stale chunks removed, {} chunks indexed)",
            filename,
            removed,
            doc.chunk_count()
        );
        Ok(doc)
    }

    /// 처리 + 임베딩 (락 없음)
    async fn prepare(
        &self,
        content: &str,
        filename: &str,
        metadata: Option<Metadata>,
    ) -> ProcessedDocument {
        let mut doc = self.processor.process(content, filename, metadata);

        if let Some(embeddings) = self.embed_chunks(&doc).await {
            for (chunk, embedding) in doc.chunks.iter_mut().zip(embeddings) {
                if !embedding.is_empty() {
                    chunk.embedding = Some(embedding);
                }
            }
        }

        doc
    }

    async fn embed_chunks(&self, doc: &ProcessedDocument) -> Option<Vec<Vec<f32>>> {
        let embedder = self.embedder.as_ref()?;
        if doc.chunks.is_empty() {
            return None;
        }

        let texts: Vec<String> = doc.chunks.iter().map(|c| c.content.clone()).collect();
        match embedder.embed(&texts).await {
            Ok(embeddings) if !embeddings.is_empty() => Some(embeddings),
            Ok(_) => {
                tracing::warn!(
                    "Embedding provider {} returned no vectors, '{}' is keyword-searchable only",
                    embedder.name(),
                    doc.filename
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Embedding failed for '{}', indexing for keyword search only: {:#}",
                    doc.filename,
                    e
                );
                None
            }
        }
    }

    // ------------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------------

    /// 관련 청크 검색
    ///
    /// 쿼리 임베딩이 있으면 하이브리드(또는 시맨틱), 없으면 키워드 검색입니다.
    /// 저장된 임베딩이 하나도 없을 때도 키워드 검색으로 동작합니다.
    pub async fn query(
        &self,
        query_text: &str,
        top_k: usize,
        use_hybrid: bool,
    ) -> Result<Vec<RetrievalResult>> {
        let query_embedding = self.embed_query(query_text).await;

        let store = self.read_store()?;
        let results = match query_embedding {
            Some(embedding) if use_hybrid => {
                store.hybrid_search(query_text, &embedding, top_k, self.settings.alpha)
            }
            Some(embedding) if store.has_embeddings() => store.search(&embedding, top_k),
            _ => {
                tracing::debug!("Using keyword search for '{}'", query_text);
                store.keyword_search(query_text, top_k)
            }
        };

        Ok(results)
    }

    /// 키워드 검색만 수행 (임베딩 프로바이더를 호출하지 않음)
    pub fn keyword_query(&self, query_text: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        Ok(self.read_store()?.keyword_search(query_text, top_k))
    }

    async fn embed_query(&self, query_text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed_query(query_text).await {
            Ok(embedding) if !embedding.is_empty() => Some(embedding),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Query embedding failed, using keyword search: {:#}", e);
                None
            }
        }
    }

    /// LLM 프롬프트용 컨텍스트 생성
    pub async fn generate_context(&self, query_text: &str, top_k: usize) -> Result<String> {
        let results = self.query(query_text, top_k, self.settings.use_hybrid).await?;
        Ok(render_context(&results))
    }

    // ------------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------------

    pub fn get_stats(&self) -> Result<RagStats> {
        let store = self.read_store()?;

        let mut categories: BTreeMap<String, usize> = BTreeMap::new();
        let mut filenames: BTreeSet<&str> = BTreeSet::new();
        for chunk in store.chunks() {
            filenames.insert(chunk.filename());
            for category in chunk.categories() {
                *categories.entry(category.clone()).or_insert(0) += 1;
            }
        }

        Ok(RagStats {
            total_chunks: store.len(),
            embedded_chunks: store.embedding_count(),
            has_embeddings: store.has_embeddings(),
            document_count: filenames.len(),
            categories,
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.write_store()?.clear();
        tracing::info!("Cleared index");
        Ok(())
    }

    /// ID로 청크 삭제 (삭제된 수 반환)
    pub fn delete_chunks(&self, ids: &[String]) -> Result<usize> {
        let removed = self.write_store()?.delete(ids);
        tracing::info!("Deleted {} chunks", removed);
        Ok(removed)
    }

    /// 파일명으로 문서 삭제
    pub fn delete_document(&self, filename: &str) -> Result<usize> {
        let removed = self.write_store()?.delete_by_filename(filename);
        tracing::info!("Deleted '{}' ({} chunks)", filename, removed);
        Ok(removed)
    }

    pub fn snapshot(&self) -> Result<IndexSnapshot> {
        let store = self.read_store()?;
        Ok(IndexSnapshot::capture(&store))
    }

    /// 스냅샷으로 인덱스 교체 (복원된 청크 수 반환)
    pub fn restore(&self, snapshot: IndexSnapshot) -> Result<usize> {
        let mut store = self.write_store()?;
        let count = snapshot.restore_into(&mut store)?;
        tracing::info!("Restored {} chunks from snapshot", count);
        Ok(count)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 검색 결과를 출처 표기 블록으로 렌더링
pub fn render_context(results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS_CONTEXT.to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "[Source {}: {}]\n{}\n[Relevance: {:.2}]",
                i + 1,
                result.source_document,
                result.chunk.content,
                result.score
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::vector::SearchMethod;
    use async_trait::async_trait;

    /// 고정 어휘 기반 결정적 임베딩
    struct VocabEmbedding;

    const VOCAB: &[&str] = &["npl", "kredit", "credit", "fraud", "governance", "board", "control"];

    fn vocab_vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = VOCAB
            .iter()
            .map(|term| lower.matches(term).count() as f32)
            .collect();
        // 영벡터 방지
        vector.push(0.1);
        vector
    }

    #[async_trait]
    impl EmbeddingProvider for VocabEmbedding {
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vocab_vector(t)).collect())
        }

        fn name(&self) -> &str {
            "vocab"
        }
    }

    struct FailingEmbedding;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedding {
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("connection refused")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    const CREDIT_DOC: &str = "Bank wajib menjaga rasio NPL tidak melebihi 5%. \
                              POJK No. 40/POJK.03/2019 mengatur hal ini.";
    const FRAUD_DOC: &str = "Fraud finding at branch office. Weak control over cash handling.";
    const GCG_DOC: &str = "Board governance charter is reviewed annually by the commissioners.";

    fn keyword_engine() -> RagEngine {
        RagEngine::new(ChunkConfig::default(), RetrievalSettings::default(), None)
    }

    fn vocab_engine() -> RagEngine {
        RagEngine::new(
            ChunkConfig::default(),
            RetrievalSettings::default(),
            Some(Arc::new(VocabEmbedding)),
        )
    }

    async fn index_all(engine: &RagEngine) {
        engine.index_document(CREDIT_DOC, "credit.txt", None).await.unwrap();
        engine.index_document(FRAUD_DOC, "fraud.txt", None).await.unwrap();
        engine.index_document(GCG_DOC, "gcg.txt", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_index_and_keyword_query_without_embedder() {
        let engine = keyword_engine();
        index_all(&engine).await;

        let results = engine.query("NPL ratio", 5, true).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_document, "credit.txt");
        assert_eq!(results[0].method, SearchMethod::Keyword);

        let stats = engine.get_stats().unwrap();
        assert!(!stats.has_embeddings);
        assert_eq!(stats.embedded_chunks, 0);
    }

    #[tokio::test]
    async fn test_reindex_is_idempotent() {
        let engine = keyword_engine();
        engine.index_document(CREDIT_DOC, "credit.txt", None).await.unwrap();
        let before = engine.get_stats().unwrap().total_chunks;

        engine.index_document(CREDIT_DOC, "credit.txt", None).await.unwrap();
        assert_eq!(engine.get_stats().unwrap().total_chunks, before);
    }

    #[tokio::test]
    async fn test_hybrid_query_with_embedder() {
        let engine = vocab_engine();
        index_all(&engine).await;

        let stats = engine.get_stats().unwrap();
        assert!(stats.has_embeddings);
        assert_eq!(stats.embedded_chunks, stats.total_chunks);

        let results = engine.query("board governance", 2, true).await.unwrap();
        assert_eq!(results[0].source_document, "gcg.txt");
        assert_eq!(results[0].method, SearchMethod::Hybrid);

        let semantic = engine.query("fraud control", 1, false).await.unwrap();
        assert_eq!(semantic[0].source_document, "fraud.txt");
        assert_eq!(semantic[0].method, SearchMethod::Semantic);
    }

    #[tokio::test]
    async fn test_keyword_query_ignores_embedder() {
        let engine = vocab_engine();
        index_all(&engine).await;

        let results = engine.keyword_query("fraud control", 3).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].source_document, "fraud.txt");
        assert!(results.iter().all(|r| r.method == SearchMethod::Keyword));
    }

    #[tokio::test]
    async fn test_index_returns_embedded_chunks() {
        let engine = vocab_engine();
        let doc = engine.index_document(FRAUD_DOC, "fraud.txt", None).await.unwrap();
        assert!(doc.chunks.iter().all(|c| c.embedding.is_some()));
    }

    #[tokio::test]
    async fn test_embedder_failure_degrades_to_keyword() {
        let engine = RagEngine::new(
            ChunkConfig::default(),
            RetrievalSettings::default(),
            Some(Arc::new(FailingEmbedding)),
        );
        let doc = engine.index_document(FRAUD_DOC, "fraud.txt", None).await.unwrap();
        assert_eq!(doc.chunk_count(), 1);

        let stats = engine.get_stats().unwrap();
        assert_eq!(stats.total_chunks, 1);
        assert!(!stats.has_embeddings);

        let results = engine.query("fraud", 5, true).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].method, SearchMethod::Keyword);

        let semantic = engine.query("fraud", 5, false).await.unwrap();
        assert_eq!(semantic.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_chunk_decreases_count() {
        let engine = keyword_engine();
        index_all(&engine).await;

        let before = engine.get_stats().unwrap().total_chunks;
        let id = engine.query("NPL", 1, false).await.unwrap()[0].chunk.id.clone();

        assert_eq!(engine.delete_chunks(&[id.clone()]).unwrap(), 1);
        assert_eq!(engine.get_stats().unwrap().total_chunks, before - 1);
        assert!(engine
            .query("NPL", 5, false)
            .await
            .unwrap()
            .iter()
            .all(|r| r.chunk.id != id));
    }

    #[tokio::test]
    async fn test_index_document_is_additive() {
        let engine = keyword_engine();
        engine.index_document(FRAUD_DOC, "report.txt", None).await.unwrap();
        engine.index_document(GCG_DOC, "report.txt", None).await.unwrap();

        let stats = engine.get_stats().unwrap();
        assert_eq!(stats.total_chunks, 2);
        assert_eq!(stats.document_count, 1);
    }

    #[tokio::test]
    async fn test_replace_document_removes_stale_chunks() {
        let engine = keyword_engine();
        engine.index_document(FRAUD_DOC, "report.txt", None).await.unwrap();
        engine.index_document(CREDIT_DOC, "credit.txt", None).await.unwrap();

        engine.replace_document(GCG_DOC, "report.txt", None).await.unwrap();

        let stats = engine.get_stats().unwrap();
        assert_eq!(stats.total_chunks, 2);
        assert!(engine.query("fraud", 5, false).await.unwrap().is_empty());
        assert_eq!(engine.query("governance", 5, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_document() {
        let engine = keyword_engine();
        index_all(&engine).await;

        assert_eq!(engine.delete_document("fraud.txt").unwrap(), 1);
        assert_eq!(engine.delete_document("fraud.txt").unwrap(), 0);
        assert_eq!(engine.get_stats().unwrap().document_count, 2);
    }

    #[tokio::test]
    async fn test_stats_category_histogram() {
        let engine = keyword_engine();
        index_all(&engine).await;

        let stats = engine.get_stats().unwrap();
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.document_count, 3);
        assert_eq!(stats.categories.get("credit"), Some(&1));
        assert_eq!(stats.categories.get("compliance"), Some(&1));
        // 다중 카테고리 청크 때문에 합계가 청크 수 이상
        assert!(stats.categories.values().sum::<usize>() >= stats.total_chunks);
    }

    #[tokio::test]
    async fn test_generate_context_format() {
        let engine = keyword_engine();
        index_all(&engine).await;

        let context = engine.generate_context("NPL", 5).await.unwrap();
        assert!(context.starts_with("[Source 1: credit.txt]\n"));
        assert!(context.contains("POJK No. 40/POJK.03/2019"));
        assert!(context.ends_with("[Relevance: 1.00]"));
        assert!(!context.contains(CONTEXT_SEPARATOR));

        let multi = engine.generate_context("board fraud", 5).await.unwrap();
        assert_eq!(multi.matches(CONTEXT_SEPARATOR).count(), 1);
        assert!(multi.contains("[Source 2: "));
    }

    #[tokio::test]
    async fn test_generate_context_no_results() {
        let engine = keyword_engine();
        let context = engine.generate_context("anything", 5).await.unwrap();
        assert_eq!(context, NO_RESULTS_CONTEXT);
    }

    #[tokio::test]
    async fn test_clear() {
        let engine = vocab_engine();
        index_all(&engine).await;

        engine.clear().unwrap();
        let stats = engine.get_stats().unwrap();
        assert_eq!(stats, RagStats::default());
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_between_engines() {
        let source = vocab_engine();
        index_all(&source).await;
        let snapshot = source.snapshot().unwrap();

        let target = vocab_engine();
        target.index_document("Unrelated memo.", "memo.txt", None).await.unwrap();
        assert_eq!(target.restore(snapshot).unwrap(), 3);

        assert_eq!(target.get_stats().unwrap(), source.get_stats().unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_index_and_query() {
        let engine = Arc::new(vocab_engine());

        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let text = format!("Control test number {} for credit review.", i);
                engine
                    .index_document(&text, &format!("doc-{}.txt", i), None)
                    .await
                    .unwrap();
                engine.query("credit control", 3, true).await.unwrap()
            }));
        }

        for handle in handles {
            let results = handle.await.unwrap();
            assert!(!results.is_empty());
        }

        assert_eq!(engine.get_stats().unwrap().total_chunks, 8);
    }

    #[test]
    fn test_accessors() {
        let engine = RagEngine::from_settings(&Settings::default(), None);
        assert_eq!(engine.top_k(), 5);
        assert!(engine.use_hybrid());
        assert!(!engine.has_embedder());
        assert_eq!(engine.settings().alpha, 0.5);
        assert_eq!(engine.chunker_name(), "SentenceChunker");
    }
}
