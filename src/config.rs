//! 설정 로더
//!
//! Figment로 `기본값` + `audit-rag.toml` + `AUDIT_RAG_*` 환경변수를 병합합니다.
//! 중첩 키는 `__`로 구분합니다 (예: `AUDIT_RAG_RAG__CHUNK_SIZE=800`).

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::knowledge::{ChunkConfig, RetrievalSettings};

/// 기본 설정 파일 이름 (작업 디렉토리 기준, 없어도 됨)
pub const DEFAULT_CONFIG_FILE: &str = "audit-rag.toml";

/// 환경변수 접두사
pub const ENV_PREFIX: &str = "AUDIT_RAG_";

/// 임베딩 재시도 상한
pub const MAX_EMBEDDING_RETRIES: u32 = 10;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.audit-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".audit-rag")
}

// ============================================================================
// Settings
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rag: RagSettings,
    pub embedding: EmbeddingSettings,
    pub storage: StorageSettings,
}

/// RAG 엔진 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// 청크 최대 크기 (문자 수)
    pub chunk_size: usize,
    /// 청크 간 오버랩 문장 수
    pub overlap_sentences: usize,
    /// 기본 검색 결과 수
    pub top_k: usize,
    /// 하이브리드 가중치 (0 = 키워드만, 1 = 시맨틱만)
    pub hybrid_alpha: f32,
    pub use_hybrid_search: bool,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap_sentences: 2,
            top_k: 5,
            hybrid_alpha: 0.5,
            use_hybrid_search: true,
        }
    }
}

impl RagSettings {
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            overlap_sentences: self.overlap_sentences,
        }
    }

    pub fn retrieval(&self) -> RetrievalSettings {
        RetrievalSettings {
            top_k: self.top_k,
            alpha: self.hybrid_alpha,
            use_hybrid: self.use_hybrid_search,
        }
    }
}

/// 임베딩 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// 임베딩 없음 (키워드 검색만)
    None,
    /// Ollama `/api/embed`
    Ollama,
}

/// 임베딩 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::None,
            base_url: "http://localhost:11434".to_string(),
            model: "all-minilm".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// 스냅샷 저장 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// 인덱스 스냅샷 경로 (미지정 시 데이터 디렉토리의 index.json)
    pub snapshot_path: Option<PathBuf>,
}

impl StorageSettings {
    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshot_path
            .clone()
            .unwrap_or_else(|| get_data_dir().join("index.json"))
    }
}

impl Settings {
    /// 설정 로드
    ///
    /// # Arguments
    /// * `config_file` - TOML 파일 경로 (None이면 `audit-rag.toml`)
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        Self::from_figment(build_figment(config_file, ENV_PREFIX))
    }

    /// Figment에서 추출 + 검증
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment.extract().map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rag.chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "rag.chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.rag.top_k == 0 {
            return Err(RagError::InvalidConfig(
                "rag.top_k must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.rag.hybrid_alpha) {
            return Err(RagError::InvalidConfig(format!(
                "rag.hybrid_alpha must be within [0, 1], got {}",
                self.rag.hybrid_alpha
            )));
        }
        if self.embedding.backend != EmbeddingBackend::None && self.embedding.model.is_empty() {
            return Err(RagError::InvalidConfig(
                "embedding.model is required when a backend is enabled".to_string(),
            ));
        }
        if self.embedding.max_retries > MAX_EMBEDDING_RETRIES {
            return Err(RagError::InvalidConfig(format!(
                "embedding.max_retries must be at most {}, got {}",
                MAX_EMBEDDING_RETRIES, self.embedding.max_retries
            )));
        }
        Ok(())
    }
}

fn build_figment(config_file: Option<&Path>, env_prefix: &str) -> Figment {
    let file = config_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    Figment::from(Serialized::defaults(Settings::default()))
        .merge(Toml::file(file))
        .merge(Env::prefixed(env_prefix).split("__"))
}

// ============================================================================
// Tests
// ============================================================================
