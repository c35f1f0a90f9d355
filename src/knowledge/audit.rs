//! 감사 도메인 검색 헬퍼
//!
//! 엔진 검색 위에 감사 업무용 쿼리 템플릿과 결과 필터를 얹습니다.
//! 모든 쿼리는 엔진의 기본 검색 방식(하이브리드 여부)을 따릅니다.

use std::sync::Arc;

use serde::Serialize;

use super::engine::RagEngine;
use super::types::RiskIndicators;
use super::vector::RetrievalResult;
use crate::error::Result;

/// 도메인 헬퍼 기본 검색 결과 수
pub const DEFAULT_HELPER_TOP_K: usize = 10;

/// 리스크 발췌 길이 (문자 수)
const EXCERPT_CHARS: usize = 300;

/// 통제 기술로 인정하는 용어
const CONTROL_TERMS: &[&str] = &[
    "control", "kontrol", "prosedur", "procedure", "verifikasi", "approval",
];

// ============================================================================
// Types
// ============================================================================

/// 리스크 수준
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
}

impl RiskLevel {
    fn from_indicators(indicators: &RiskIndicators) -> Self {
        if indicators.high_risk.is_empty() {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// 리스크 지표가 있는 청크
#[derive(Debug, Clone, Serialize)]
pub struct RiskIndicatorHit {
    pub source: String,
    /// 본문 앞 300자
    pub excerpt: String,
    pub score: f32,
    pub risk_level: RiskLevel,
    pub indicators: RiskIndicators,
}

/// 규정 인용 청크
#[derive(Debug, Clone, Serialize)]
pub struct RegulatoryReference {
    pub source: String,
    pub content: String,
    pub score: f32,
    /// 청크가 속한 문서에서 추출된 전체 인용 목록
    pub regulations: Vec<String>,
}

/// 통제 기술 청크
#[derive(Debug, Clone, Serialize)]
pub struct ControlDescription {
    pub source: String,
    pub description: String,
    pub score: f32,
}

// ============================================================================
// AuditRagHelper
// ============================================================================

/// 감사 도메인 검색 헬퍼
pub struct AuditRagHelper {
    engine: Arc<RagEngine>,
}

impl AuditRagHelper {
    pub fn new(engine: Arc<RagEngine>) -> Self {
        Self { engine }
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        self.engine.query(query, top_k, self.engine.use_hybrid()).await
    }

    /// 감사 영역의 리스크 지표 검색
    pub async fn find_risk_indicators(
        &self,
        audit_area: &str,
        top_k: usize,
    ) -> Result<Vec<RiskIndicatorHit>> {
        let query = format!("risk indicators problems issues findings {}", audit_area);
        let results = self.search(&query, top_k).await?;

        let hits = results
            .into_iter()
            .filter(|r| !r.chunk.risk_indicators().is_empty())
            .map(|r| {
                let indicators = r.chunk.risk_indicators().clone();
                RiskIndicatorHit {
                    excerpt: r.chunk.content.chars().take(EXCERPT_CHARS).collect(),
                    risk_level: RiskLevel::from_indicators(&indicators),
                    indicators,
                    score: r.score,
                    source: r.source_document,
                }
            })
            .collect();

        Ok(hits)
    }

    /// 특정 규정을 인용하는 청크 검색
    ///
    /// 본문에 인용 문자열이 (대소문자 무시) 포함된 결과만 남깁니다.
    pub async fn find_regulatory_references(
        &self,
        regulation: &str,
        top_k: usize,
    ) -> Result<Vec<RegulatoryReference>> {
        let results = self.search(regulation, top_k).await?;
        let needle = regulation.to_uppercase();

        let references = results
            .into_iter()
            .filter(|r| r.chunk.content.to_uppercase().contains(&needle))
            .map(|r| RegulatoryReference {
                content: r.chunk.content.clone(),
                regulations: r.chunk.regulations().to_vec(),
                score: r.score,
                source: r.source_document,
            })
            .collect();

        Ok(references)
    }

    /// 프로세스의 통제 기술 검색
    pub async fn find_control_descriptions(
        &self,
        process_name: &str,
        top_k: usize,
    ) -> Result<Vec<ControlDescription>> {
        let query = format!(
            "control procedure {} verification approval authorization",
            process_name
        );
        let results = self.search(&query, top_k).await?;

        let controls = results
            .into_iter()
            .filter(|r| {
                let content = r.chunk.content.to_lowercase();
                CONTROL_TERMS.iter().any(|term| content.contains(term))
            })
            .map(|r| ControlDescription {
                description: r.chunk.content.clone(),
                score: r.score,
                source: r.source_document,
            })
            .collect();

        Ok(controls)
    }

    /// 감사 계획용 종합 컨텍스트
    ///
    /// 배경 → 리스크 → 기존 통제 → 중점 영역 순서이며, 결과가 없는 섹션은 생략합니다.
    pub async fn generate_audit_context(
        &self,
        audit_area: &str,
        focus_areas: &[String],
    ) -> Result<String> {
        let mut sections: Vec<(String, String, usize)> = vec![
            ("## Background Information".to_string(), audit_area.to_string(), 3),
            (
                "## Risk Indicators".to_string(),
                format!("{} risk issues problems", audit_area),
                3,
            ),
            (
                "## Existing Controls".to_string(),
                format!("{} control procedure", audit_area),
                3,
            ),
        ];
        for focus in focus_areas {
            sections.push((format!("## Focus: {}", focus), format!("{} {}", audit_area, focus), 2));
        }

        let mut parts: Vec<String> = Vec::new();
        for (header, query, top_k) in sections {
            let results = self.search(&query, top_k).await?;
            if results.is_empty() {
                continue;
            }

            // 첫 섹션 이후 헤더 앞에 빈 줄 하나 추가
            if parts.is_empty() {
                parts.push(header);
            } else {
                parts.push(format!("\n{}", header));
            }
            parts.extend(
                results
                    .iter()
                    .map(|r| format!("From {}:\n{}", r.source_document, r.chunk.content)),
            );
        }

        tracing::debug!(
            "Built audit context for '{}' with {} focus areas",
            audit_area,
            focus_areas.len()
        );
        Ok(parts.join("\n\n"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::chunker::ChunkConfig;
    use crate::knowledge::engine::RetrievalSettings;

    const CREDIT_DOC: &str = "Bank wajib menjaga rasio NPL tidak melebihi 5%. \
                              POJK No. 40/POJK.03/2019 mengatur hal ini.";
    const FRAUD_DOC: &str = "Fraud finding in credit disbursement at the branch office.";
    const PROCEDURE_DOC: &str =
        "Credit approval procedure requires dual verification by the risk unit.";
    const MEMO_DOC: &str = "The credit committee meets every Monday.";

    async fn helper() -> AuditRagHelper {
        let engine = Arc::new(RagEngine::new(
            ChunkConfig::default(),
            RetrievalSettings::default(),
            None,
        ));
        engine.index_document(CREDIT_DOC, "pojk.txt", None).await.unwrap();
        engine.index_document(FRAUD_DOC, "finding.txt", None).await.unwrap();
        engine.index_document(PROCEDURE_DOC, "sop.txt", None).await.unwrap();
        engine.index_document(MEMO_DOC, "memo.txt", None).await.unwrap();
        AuditRagHelper::new(engine)
    }

    #[tokio::test]
    async fn test_find_risk_indicators() {
        let helper = helper().await;
        let hits = helper.find_risk_indicators("credit", 10).await.unwrap();

        let fraud = hits.iter().find(|h| h.source == "finding.txt").unwrap();
        assert_eq!(fraud.risk_level, RiskLevel::High);
        assert!(fraud.indicators.high_risk.contains(&"fraud".to_string()));
        assert_eq!(fraud.excerpt, FRAUD_DOC);

        // 리스크 지표 없는 청크는 제외
        assert!(hits.iter().all(|h| h.source != "memo.txt"));
    }

    #[tokio::test]
    async fn test_risk_excerpt_is_truncated() {
        let engine = Arc::new(RagEngine::new(
            ChunkConfig::default(),
            RetrievalSettings::default(),
            None,
        ));
        let long = format!("Temuan audit kredit {}", "x".repeat(400));
        engine.index_document(&long, "long.txt", None).await.unwrap();

        let hits = AuditRagHelper::new(engine)
            .find_risk_indicators("kredit", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].excerpt.chars().count(), 300);
        assert_eq!(hits[0].risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_find_regulatory_references() {
        let helper = helper().await;
        let refs = helper
            .find_regulatory_references("pojk no. 40/pojk.03/2019", 10)
            .await
            .unwrap();

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].source, "pojk.txt");
        assert!(refs[0]
            .regulations
            .iter()
            .any(|r| r.eq_ignore_ascii_case("POJK No. 40/POJK.03/2019")));
    }

    #[tokio::test]
    async fn test_find_control_descriptions() {
        let helper = helper().await;
        let controls = helper.find_control_descriptions("credit", 10).await.unwrap();

        assert!(controls.iter().any(|c| c.source == "sop.txt"));
        assert!(controls.iter().all(|c| {
            let lower = c.description.to_lowercase();
            CONTROL_TERMS.iter().any(|t| lower.contains(t))
        }));
        assert!(controls.iter().all(|c| c.source != "memo.txt"));
    }

    #[tokio::test]
    async fn test_generate_audit_context_sections() {
        let helper = helper().await;
        let focus = vec!["fraud".to_string()];
        let context = helper.generate_audit_context("credit", &focus).await.unwrap();

        let background = context.find("## Background Information").unwrap();
        let risks = context.find("## Risk Indicators").unwrap();
        let controls = context.find("## Existing Controls").unwrap();
        let focus_at = context.find("## Focus: fraud").unwrap();

        assert_eq!(background, 0);
        assert!(background < risks && risks < controls && controls < focus_at);
        assert!(context.contains("From sop.txt:\n"));
        assert!(context.contains("\n\n\n## Risk Indicators"));
    }

    #[tokio::test]
    async fn test_generate_audit_context_empty_index() {
        let engine = Arc::new(RagEngine::new(
            ChunkConfig::default(),
            RetrievalSettings::default(),
            None,
        ));
        let context = AuditRagHelper::new(engine)
            .generate_audit_context("treasury", &[])
            .await
            .unwrap();
        assert!(context.is_empty());
    }
}
