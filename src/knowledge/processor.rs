//! 문서 처리 - 청킹 + 메타데이터 추출
//!
//! 원문 텍스트를 메타데이터가 붙은 청크 목록으로 변환합니다.
//! 어떤 입력에도 실패하지 않습니다 (빈 텍스트 → 빈 청크 목록).

use chrono::Utc;
use sha2::{Digest, Sha256};

use super::chunker::{sentence_chunker, ChunkConfig, Chunker};
use super::classifier;
use super::types::{ChunkMetadata, DocumentChunk, DocumentMetadata, Metadata, ProcessedDocument};

/// 문서 ID 길이 (hex)
const DOC_ID_LEN: usize = 16;
/// 청크 ID 길이 (hex)
const CHUNK_ID_LEN: usize = 12;
/// 문서 ID 계산에 쓰는 본문 앞부분 길이 (문자 수)
const DOC_ID_PREFIX_CHARS: usize = 1000;

/// 문서 처리기
pub struct DocumentProcessor {
    chunker: Box<dyn Chunker>,
}

impl DocumentProcessor {
    /// 청킹 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self::with_chunker(sentence_chunker(config))
    }

    /// 다른 청킹 전략 주입
    pub fn with_chunker(chunker: Box<dyn Chunker>) -> Self {
        Self { chunker }
    }

    pub fn chunker_name(&self) -> &'static str {
        self.chunker.name()
    }

    /// 문서 처리
    ///
    /// # Arguments
    /// * `content` - 원문
    /// * `filename` - 원본 파일명 (식별자)
    /// * `extra` - 호출자 메타데이터 (충돌 시 우선)
    pub fn process(
        &self,
        content: &str,
        filename: &str,
        extra: Option<Metadata>,
    ) -> ProcessedDocument {
        let id = document_id(content, filename);

        let mut metadata = extract_metadata(content, filename);
        if let Some(extra) = extra {
            metadata.merge_extra(extra);
        }

        let chunks = self
            .chunker
            .chunk(content)
            .into_iter()
            .enumerate()
            .map(|(index, text)| build_chunk(text, &metadata, index))
            .collect();

        ProcessedDocument {
            id,
            filename: filename.to_string(),
            chunks,
            processed_at: metadata.processed_at,
            metadata,
        }
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new(ChunkConfig::default())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn extract_metadata(content: &str, filename: &str) -> DocumentMetadata {
    DocumentMetadata {
        filename: filename.to_string(),
        processed_at: Utc::now(),
        word_count: content.split_whitespace().count(),
        char_count: content.chars().count(),
        language: classifier::detect_language(content),
        categories: classifier::classify_categories(content),
        regulations_mentioned: classifier::extract_regulations(content),
        risk_indicators: classifier::extract_risk_indicators(content),
        extra: Metadata::new(),
    }
}

fn build_chunk(content: String, document: &DocumentMetadata, index: usize) -> DocumentChunk {
    DocumentChunk {
        id: chunk_id(&content),
        metadata: ChunkMetadata {
            document: document.clone(),
            chunk_index: index,
            chunk_keywords: classifier::extract_keywords(&content),
        },
        content,
        embedding: None,
    }
}

/// SHA-256 hex 앞부분
fn fingerprint(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..len].to_string()
}

/// 문서 ID = hash(filename + 본문 앞 1000자)
pub fn document_id(content: &str, filename: &str) -> String {
    let prefix: String = content.chars().take(DOC_ID_PREFIX_CHARS).collect();
    fingerprint(&format!("{}:{}", filename, prefix), DOC_ID_LEN)
}

/// 청크 ID = hash(청크 텍스트)
pub fn chunk_id(content: &str) -> String {
    fingerprint(content, CHUNK_ID_LEN)
}

// ============================================================================
// Tests
// ============================================================================
