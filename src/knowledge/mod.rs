//! Knowledge 모듈 - 감사 문서 RAG 지식 저장소
//!
//! - Chunker: 문장 경계 인식 텍스트 분할 (오버랩 포함)
//! - Classifier: 카테고리/규정 인용/리스크 지표/언어 추출
//! - Vector: 인메모리 키워드 + 코사인 + 가중합 하이브리드 검색
//! - Engine: 인덱싱/검색/컨텍스트 생성
//! - Audit: 감사 도메인 쿼리 헬퍼

mod audit;
mod chunker;
pub mod classifier;
mod engine;
mod processor;
mod snapshot;
mod types;
mod vector;

// Re-exports
pub use audit::{
    AuditRagHelper, ControlDescription, RegulatoryReference, RiskIndicatorHit, RiskLevel,
    DEFAULT_HELPER_TOP_K,
};
pub use chunker::{sentence_chunker, split_sentences, ChunkConfig, Chunker, SentenceChunker};
pub use engine::{render_context, RagEngine, RagStats, RetrievalSettings, NO_RESULTS_CONTEXT};
pub use processor::{chunk_id, document_id, DocumentProcessor};
pub use snapshot::{IndexSnapshot, SNAPSHOT_VERSION};
pub use types::{
    ChunkMetadata, DocumentChunk, DocumentMetadata, Language, Metadata, ProcessedDocument,
    RiskIndicators,
};
pub use vector::{cosine_similarity, InMemoryVectorStore, RetrievalResult, SearchMethod};
