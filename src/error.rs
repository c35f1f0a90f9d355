//! 에러 타입
//!
//! 검색 품질 저하(빈 결과, 임베딩 없음)는 에러가 아닙니다.
//! 여기 있는 것은 설정, 스냅샷 I/O, 락 오염처럼 진짜 실패뿐입니다.

use thiserror::Error;

/// audit-rag 라이브러리 에러
#[derive(Debug, Error)]
pub enum RagError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported snapshot version: {0}")]
    SnapshotVersion(u32),

    #[error("Vector index lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, RagError>;
