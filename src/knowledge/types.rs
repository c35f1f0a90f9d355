//! 문서/청크 데이터 모델
//!
//! 청크는 생성 시점에 메타데이터가 고정되며 이후 변경되지 않습니다.
//! 메타데이터는 잘 알려진 필드(타입 지정) + 호출자 확장 영역(`extra`)으로 구성됩니다.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 호출자 제공 메타데이터 (자유 형식)
pub type Metadata = BTreeMap<String, serde_json::Value>;

// ============================================================================
// Language / Risk Indicators
// ============================================================================

/// 문서 언어 (휴리스틱 판정)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "id")]
    Indonesian,
    #[serde(rename = "en")]
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Indonesian => "id",
            Language::English => "en",
        }
    }
}

/// 리스크 지표 버킷별 매칭 키워드
///
/// 비어있는 버킷은 직렬화 시 생략됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskIndicators {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub high_risk: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub control_weakness: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finding: Vec<String>,
}

impl RiskIndicators {
    pub fn is_empty(&self) -> bool {
        self.high_risk.is_empty() && self.control_weakness.is_empty() && self.finding.is_empty()
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// 문서 단위 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: String,
    pub processed_at: DateTime<Utc>,
    pub word_count: usize,
    pub char_count: usize,
    pub language: Language,
    pub categories: Vec<String>,
    pub regulations_mentioned: Vec<String>,
    #[serde(default, skip_serializing_if = "RiskIndicators::is_empty")]
    pub risk_indicators: RiskIndicators,
    /// 호출자 제공 필드
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Metadata,
}

impl DocumentMetadata {
    /// 호출자 메타데이터 병합 (호출자 값 우선)
    ///
    /// 잘 알려진 필드 이름이고 타입이 맞으면 감지된 값을 덮어씁니다.
    /// 나머지(타입 불일치 포함)는 `extra`에 저장됩니다.
    /// `filename`은 문서 식별자이므로 덮어쓰지 않습니다.
    pub fn merge_extra(&mut self, extra: Metadata) {
        for (key, value) in extra {
            let applied = match key.as_str() {
                "language" => serde_json::from_value(value.clone())
                    .map(|v| self.language = v)
                    .is_ok(),
                "categories" => serde_json::from_value(value.clone())
                    .map(|v| self.categories = v)
                    .is_ok(),
                "regulations_mentioned" => serde_json::from_value(value.clone())
                    .map(|v| self.regulations_mentioned = v)
                    .is_ok(),
                "risk_indicators" => serde_json::from_value(value.clone())
                    .map(|v| self.risk_indicators = v)
                    .is_ok(),
                _ => false,
            };

            if !applied {
                self.extra.insert(key, value);
            }
        }
    }
}

/// 청크 메타데이터 = 문서 메타데이터 + 청크 고유 필드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(flatten)]
    pub document: DocumentMetadata,
    /// 문서 내 순번 (0-based)
    pub chunk_index: usize,
    pub chunk_keywords: Vec<String>,
}

// ============================================================================
// DocumentChunk / ProcessedDocument
// ============================================================================

/// 검색 단위 청크
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// 콘텐츠 기반 지문 (동일 콘텐츠 = 동일 ID)
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl DocumentChunk {
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    pub fn filename(&self) -> &str {
        &self.metadata.document.filename
    }

    pub fn categories(&self) -> &[String] {
        &self.metadata.document.categories
    }

    pub fn risk_indicators(&self) -> &RiskIndicators {
        &self.metadata.document.risk_indicators
    }

    pub fn regulations(&self) -> &[String] {
        &self.metadata.document.regulations_mentioned
    }
}

/// 문서 처리 결과
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub id: String,
    pub filename: String,
    /// 원문 순서
    pub chunks: Vec<DocumentChunk>,
    pub metadata: DocumentMetadata,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedDocument {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_words(&self) -> usize {
        self.chunks.iter().map(DocumentChunk::word_count).sum()
    }
}

// ============================================================================
// Tests
// ============================================================================
