//! audit-rag - 감사 문서 RAG 검색 엔진
//!
//! 인도네시아 은행 감사 문서(OJK/BI 규정, SOP, 감사 보고서)를 청킹/분류하고
//! 키워드 + 임베딩 하이브리드 검색으로 LLM 프롬프트 컨텍스트를 만듭니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod knowledge;

// Re-exports
pub use config::{get_data_dir, Settings};
pub use embedding::{create_embedder, EmbeddingProvider, OllamaEmbedding};
pub use error::{RagError, Result};
pub use knowledge::{
    AuditRagHelper, ChunkConfig, DocumentChunk, DocumentProcessor, InMemoryVectorStore,
    IndexSnapshot, ProcessedDocument, RagEngine, RagStats, RetrievalResult, RetrievalSettings,
    SearchMethod,
};
