//! 임베딩 모듈 - 텍스트 벡터화 프로바이더
//!
//! 엔진은 `EmbeddingProvider` 트레이트 객체만 알고 있습니다.
//! 프로바이더가 없거나 실패하면 엔진은 키워드 검색으로 동작합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OllamaEmbedding::from_settings(&settings.embedding)?;
//! let vectors = embedder.embed(&["NPL ratio".to_string()]).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingBackend, EmbeddingSettings};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 빈 결과는 "사용 불가"를 뜻합니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 배치 임베딩 (입력 순서대로 텍스트당 벡터 하나)
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// 쿼리 임베딩 (기본 구현: 단건 배치)
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        Ok(vectors.pop().unwrap_or_default())
    }

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Ollama Embedding
// ============================================================================

/// 429/5xx/전송 실패 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;

/// Ollama 임베딩 구현체
///
/// ref: https://github.com/ollama/ollama/blob/main/docs/api.md#generate-embeddings
#[derive(Debug)]
pub struct OllamaEmbedding {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_retries: u32,
}

impl OllamaEmbedding {
    /// 새 Ollama 임베딩 인스턴스 생성
    ///
    /// # Arguments
    /// * `base_url` - Ollama 서버 주소 (예: http://localhost:11434)
    /// * `model` - 임베딩 모델 이름
    /// * `timeout` - 요청 타임아웃
    /// * `max_retries` - 재시도 가능한 실패 시 최대 재시도 횟수
    pub fn new(base_url: &str, model: &str, timeout: Duration, max_retries: u32) -> Result<Self> {
        if base_url.trim().is_empty() {
            anyhow::bail!("Ollama base URL must not be empty");
        }
        if model.trim().is_empty() {
            anyhow::bail!("Embedding model name must not be empty");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model: model.to_string(),
            max_retries,
        })
    }

    /// 설정에서 생성
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        Self::new(
            &settings.base_url,
            &settings.model,
            Duration::from_secs(settings.timeout_secs),
            settings.max_retries,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Ollama API 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Ollama API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama API 에러 응답
#[derive(Debug, Deserialize)]
struct OllamaError {
    error: String,
}

fn backoff_delay(attempt: u32) -> Duration {
    let millis = INITIAL_BACKOFF_MS
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(MAX_BACKOFF_MS);
    Duration::from_millis(millis)
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=self.max_retries {
            let response = match self.client.post(&self.endpoint).json(&request).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < self.max_retries {
                        let backoff = backoff_delay(attempt);
                        tracing::warn!(
                            "Embedding request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            self.max_retries
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let parsed: EmbedResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;
                if parsed.embeddings.len() != texts.len() {
                    anyhow::bail!(
                        "Ollama returned {} embeddings for {} inputs",
                        parsed.embeddings.len(),
                        texts.len()
                    );
                }
                tracing::debug!("Embedded {} texts with {}", texts.len(), self.model);
                return Ok(parsed.embeddings);
            }

            // 429 / 5xx - 재시도
            if status.as_u16() == 429 || status.is_server_error() {
                last_error = Some(anyhow::anyhow!("Ollama API error ({})", status));
                if attempt < self.max_retries {
                    let backoff = backoff_delay(attempt);
                    tracing::warn!(
                        "Ollama returned {}, backing off {:?} (attempt {}/{})",
                        status,
                        backoff,
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                if let Ok(error) = serde_json::from_str::<OllamaError>(&body) {
                    anyhow::bail!("Ollama API error ({}): {}", status, error.error);
                }
                anyhow::bail!("Ollama API error ({}): {}", status, body);
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!("Embedding failed after {} retries", self.max_retries)
        }))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 맞는 임베딩 프로바이더 생성
///
/// `backend = "none"`이면 `None`을 반환합니다 (키워드 검색 전용).
pub fn create_embedder(settings: &EmbeddingSettings) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    match settings.backend {
        EmbeddingBackend::None => {
            tracing::info!("Embedding backend disabled, using keyword search only");
            Ok(None)
        }
        EmbeddingBackend::Ollama => {
            let embedder = OllamaEmbedding::from_settings(settings)?;
            tracing::info!(
                "Using Ollama embedding (model: {}, endpoint: {})",
                settings.model,
                embedder.endpoint()
            );
            Ok(Some(Arc::new(embedder)))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
