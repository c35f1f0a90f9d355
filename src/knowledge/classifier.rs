//! 문서 분류 및 메타데이터 추출
//!
//! 인도네시아 금융 감독 문서(OJK, BI)를 대상으로 하는 규칙 기반 분류기입니다.
//! 키워드/패턴 테이블은 데이터로 취급합니다. 알고리즘을 건드리지 않고 확장할 수 있습니다.

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use super::types::{Language, RiskIndicators};

// ============================================================================
// Tables
// ============================================================================

/// 분류 결과가 없을 때 사용하는 카테고리
pub const GENERAL_CATEGORY: &str = "general";

/// 카테고리 → 키워드 (대소문자 무시 부분 문자열 매칭)
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "risk_management",
        &["risiko", "risk", "rcsa", "kri", "risk appetite", "manajemen risiko"],
    ),
    (
        "governance",
        &["tata kelola", "governance", "dewan", "komisaris", "direksi", "gcg"],
    ),
    (
        "compliance",
        &["kepatuhan", "compliance", "regulasi", "pojk", "pbi", "seojk"],
    ),
    (
        "credit",
        &["kredit", "credit", "pinjaman", "pembiayaan", "npl", "kolektibilitas"],
    ),
    (
        "operational",
        &["operasional", "operational", "proses", "prosedur", "sop"],
    ),
    (
        "it_audit",
        &["sistem informasi", "it control", "cybersecurity", "akses", "teknologi"],
    ),
    (
        "aml",
        &["apu", "ppt", "money laundering", "cdd", "kyc", "str", "ppatk"],
    ),
    (
        "financial",
        &["keuangan", "financial", "laporan", "akuntansi", "neraca"],
    ),
];

/// 인용 패턴 테이블 버전 (패턴 변경 시 증가)
pub const CITATION_PATTERNS_VERSION: u32 = 1;

/// 규정 인용 패턴
#[derive(Debug, Clone, Copy)]
pub struct CitationPattern {
    /// 발행 기관/표준 종류
    pub kind: &'static str,
    pub pattern: &'static str,
}

pub const CITATION_PATTERNS: &[CitationPattern] = &[
    CitationPattern {
        kind: "POJK",
        pattern: r"POJK\s*(?:No\.?)?\s*\d+[/\-](?:POJK\.\d+[/\-])?\d+",
    },
    CitationPattern {
        kind: "SEOJK",
        pattern: r"SEOJK\s*(?:No\.?)?\s*\d+[/\-]\d+",
    },
    CitationPattern {
        kind: "PBI",
        pattern: r"PBI\s*(?:No\.?)?\s*\d+[/\-]\d+",
    },
    CitationPattern {
        kind: "PP",
        pattern: r"PP\s*(?:No\.?)?\s*\d+[/\-]\d+",
    },
    CitationPattern {
        kind: "UU",
        pattern: r"UU\s*(?:No\.?)?\s*\d+[/\-]\d+",
    },
    CitationPattern {
        kind: "ISO",
        pattern: r"ISO\s*\d+[:\-]\d+",
    },
    CitationPattern {
        kind: "PSAK",
        pattern: r"PSAK\s*\d+",
    },
];

const HIGH_RISK_TERMS: &[&str] = &[
    "fraud", "penipuan", "kecurangan", "pelanggaran", "material", "critical",
];
const CONTROL_WEAKNESS_TERMS: &[&str] = &[
    "kelemahan", "weakness", "gap", "deficiency", "kurang", "tidak memadai",
];
const FINDING_TERMS: &[&str] = &[
    "temuan", "finding", "observasi", "catatan", "rekomendasi", "issue",
];

/// 인도네시아어 기능어
const INDONESIAN_FUNCTION_WORDS: &[&str] = &[
    "yang", "dan", "untuk", "dengan", "dari", "pada", "dalam", "adalah", "ini", "itu",
];

/// 인도네시아어 판정 임계값 (서로 다른 기능어 개수)
const INDONESIAN_THRESHOLD: usize = 3;

const MIN_KEYWORD_CHARS: usize = 3;
const MAX_CHUNK_KEYWORDS: usize = 20;

// ============================================================================
// Extraction
// ============================================================================

/// 언어 감지
///
/// 알파벳 토큰 중 인도네시아어 기능어가 몇 종류 나오는지 셉니다.
pub fn detect_language(text: &str) -> Language {
    let lower = text.to_lowercase();
    let tokens: HashSet<&str> = lower
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
        .collect();

    let hits = INDONESIAN_FUNCTION_WORDS
        .iter()
        .filter(|word| tokens.contains(*word))
        .count();

    if hits >= INDONESIAN_THRESHOLD {
        Language::Indonesian
    } else {
        Language::English
    }
}

/// 감사 카테고리 분류 (다중 라벨)
pub fn classify_categories(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();

    let categories: Vec<String> = CATEGORY_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(category, _)| category.to_string())
        .collect();

    if categories.is_empty() {
        vec![GENERAL_CATEGORY.to_string()]
    } else {
        categories
    }
}

fn citation_regexes() -> &'static [Regex] {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        CITATION_PATTERNS
            .iter()
            .filter_map(|p| {
                RegexBuilder::new(p.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| tracing::warn!("Invalid citation pattern {}: {}", p.kind, e))
                    .ok()
            })
            .collect()
    })
}

/// 규정 인용 추출 (중복 제거, 정렬)
pub fn extract_regulations(text: &str) -> Vec<String> {
    let found: BTreeSet<String> = citation_regexes()
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| m.as_str().to_string()))
        .collect();

    found.into_iter().collect()
}

/// 리스크 지표 추출
pub fn extract_risk_indicators(text: &str) -> RiskIndicators {
    let lower = text.to_lowercase();
    let matches = |terms: &[&str]| -> Vec<String> {
        terms
            .iter()
            .filter(|t| lower.contains(*t))
            .map(|t| t.to_string())
            .collect()
    };

    RiskIndicators {
        high_risk: matches(HIGH_RISK_TERMS),
        control_weakness: matches(CONTROL_WEAKNESS_TERMS),
        finding: matches(FINDING_TERMS),
    }
}

/// 감사 도메인 용어 집합 (모든 카테고리 키워드의 합집합, 소문자)
pub fn domain_terms() -> &'static HashSet<String> {
    static TERMS: OnceLock<HashSet<String>> = OnceLock::new();
    TERMS.get_or_init(|| {
        CATEGORY_KEYWORDS
            .iter()
            .flat_map(|(_, keywords)| keywords.iter().map(|kw| kw.to_lowercase()))
            .collect()
    })
}

/// 청크 키워드 추출
///
/// 구두점을 제거한 토큰 중 3자 이상이면서 대문자로 시작하거나
/// 도메인 용어인 것. 첫 등장 순서 유지, 최대 20개.
pub fn extract_keywords(content: &str) -> Vec<String> {
    let terms = domain_terms();
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for word in content.split_whitespace() {
        let clean: String = word
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect();

        if clean.chars().count() < MIN_KEYWORD_CHARS {
            continue;
        }

        let starts_upper = clean.chars().next().is_some_and(char::is_uppercase);
        if !starts_upper && !terms.contains(&clean.to_lowercase()) {
            continue;
        }

        if seen.insert(clean.clone()) {
            keywords.push(clean);
            if keywords.len() == MAX_CHUNK_KEYWORDS {
                break;
            }
        }
    }

    keywords
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language_indonesian() {
        let text = "Bank yang sehat wajib menjaga likuiditas dan permodalan untuk nasabah.";
        assert_eq!(detect_language(text), Language::Indonesian);
    }

    #[test]
    fn test_detect_language_english() {
        let text = "The bank must maintain adequate liquidity and capital.";
        assert_eq!(detect_language(text), Language::English);
    }

    #[test]
    fn test_detect_language_counts_distinct_words() {
        // 같은 기능어 반복은 한 번만 셈
        let text = "yang yang yang yang";
        assert_eq!(detect_language(text), Language::English);
    }

    #[test]
    fn test_categories_are_not_exclusive() {
        let categories = classify_categories("Evaluasi risiko atas portofolio kredit");
        assert!(categories.contains(&"risk_management".to_string()));
        assert!(categories.contains(&"credit".to_string()));
    }

    #[test]
    fn test_general_category_fallback() {
        assert_eq!(classify_categories("Hello world"), vec!["general".to_string()]);
        assert_eq!(classify_categories(""), vec!["general".to_string()]);
    }

    #[test]
    fn test_extract_pojk_citation() {
        let text = "POJK No. 40/POJK.03/2019 mengatur hal ini.";
        let regs = extract_regulations(text);
        assert_eq!(regs, vec!["POJK No. 40/POJK.03/2019".to_string()]);
    }

    #[test]
    fn test_extract_citations_case_insensitive_and_deduplicated() {
        let text = "Lihat pbi 23/2021 dan PBI 23/2021, juga ISO 27001:2013 serta PSAK 71.";
        let regs = extract_regulations(text);
        assert_eq!(regs.len(), 4);
        assert!(regs.contains(&"pbi 23/2021".to_string()));
        assert!(regs.contains(&"PBI 23/2021".to_string()));
        assert!(regs.contains(&"ISO 27001:2013".to_string()));
        assert!(regs.contains(&"PSAK 71".to_string()));
    }

    #[test]
    fn test_all_citation_patterns_compile() {
        assert_eq!(citation_regexes().len(), CITATION_PATTERNS.len());
    }

    #[test]
    fn test_risk_indicators() {
        let indicators =
            extract_risk_indicators("Temuan audit: terdapat Fraud dan kontrol tidak memadai.");
        assert_eq!(indicators.high_risk, vec!["fraud".to_string()]);
        assert_eq!(indicators.control_weakness, vec!["tidak memadai".to_string()]);
        assert_eq!(indicators.finding, vec!["temuan".to_string()]);

        assert!(extract_risk_indicators("nothing to see").is_empty());
    }

    #[test]
    fn test_extract_keywords() {
        let keywords = extract_keywords("The Bank reviewed npl, kredit and an ok item. Bank again.");
        assert!(keywords.contains(&"The".to_string()));
        assert!(keywords.contains(&"Bank".to_string()));
        assert!(keywords.contains(&"npl".to_string()));
        assert!(keywords.contains(&"kredit".to_string()));
        assert!(!keywords.contains(&"ok".to_string()));
        assert!(!keywords.contains(&"reviewed".to_string()));
        assert_eq!(keywords.iter().filter(|k| *k == "Bank").count(), 1);
    }

    #[test]
    fn test_extract_keywords_capped() {
        let text: String = (0..50).map(|i| format!("Term{} ", i)).collect();
        assert_eq!(extract_keywords(&text).len(), 20);
    }
}
