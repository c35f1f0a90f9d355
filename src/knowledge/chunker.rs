//! Text Chunking Module
//!
//! 문장 경계를 존중하는 오버랩 청킹을 제공합니다.
//! 청크 크기는 소프트 상한입니다. 문장 중간에서 자르지 않습니다.

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 청크 최대 크기 (문자 수)
    pub chunk_size: usize,
    /// 다음 청크로 이어지는 마지막 문장 수
    pub overlap_sentences: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap_sentences: 2,
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// SentenceChunker
// ============================================================================

/// 문장 단위 그리디 청커
///
/// - 공백/줄바꿈 정규화 후 `.`, `!`, `?` + 공백에서 문장 분리
/// - 크기 예산 안에서 문장을 누적
/// - 넘치면 청크를 닫고, 마지막 N개 문장을 다음 청크 앞에 이어붙임
pub struct SentenceChunker {
    config: ChunkConfig,
}

impl SentenceChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 다음 청크에 이어붙일 오버랩 문장
    ///
    /// 트리거 문장과 합쳐 예산을 넘기면 앞쪽 문장부터 버립니다.
    fn overlap_window<'a>(&self, closing: &[&'a str], next_len: usize) -> Vec<&'a str> {
        let take = self.config.overlap_sentences.min(closing.len());
        let mut window = closing[closing.len() - take..].to_vec();

        while !window.is_empty() && joined_len(&window) + 1 + next_len > self.config.chunk_size {
            window.remove(0);
        }

        window
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return vec![];
        }

        let mut chunks = Vec::new();
        let mut buffer: Vec<&str> = Vec::new();
        let mut buffer_len = 0;

        for sentence in &sentences {
            let len = char_len(sentence);

            if buffer.is_empty() {
                buffer.push(sentence);
                buffer_len = len;
                continue;
            }

            if buffer_len + 1 + len <= self.config.chunk_size {
                buffer.push(sentence);
                buffer_len += 1 + len;
                continue;
            }

            // 예산 초과: 현재 청크를 닫고 오버랩으로 새 버퍼 시작
            chunks.push(buffer.join(" "));

            buffer = self.overlap_window(&buffer, len);
            buffer.push(sentence);
            buffer_len = joined_len(&buffer);
        }

        if !buffer.is_empty() {
            chunks.push(buffer.join(" "));
        }

        chunks
    }

    fn name(&self) -> &'static str {
        "SentenceChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 문장 분리
///
/// 연속 공백(줄바꿈 포함)을 공백 하나로 정규화한 뒤
/// 문장 종결 부호 뒤 공백에서 자릅니다.
pub fn split_sentences(text: &str) -> Vec<String> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = normalized.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace());

        if at_boundary {
            let end = i + c.len_utf8();
            let sentence = normalized[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = end;
        }
    }

    let tail = normalized[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 공백 하나로 이었을 때의 길이
fn joined_len(parts: &[&str]) -> usize {
    if parts.is_empty() {
        return 0;
    }
    parts.iter().map(|p| char_len(p)).sum::<usize>() + parts.len() - 1
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 문장 청커 생성 (설정 지정)
pub fn sentence_chunker(config: ChunkConfig) -> Box<dyn Chunker> {
    Box::new(SentenceChunker::new(config))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_text(count: usize, width: usize) -> String {
        (0..count)
            .map(|i| {
                let body = format!("Sentence {} ", i);
                let padding = "x".repeat(width.saturating_sub(body.len() + 1));
                format!("{}{}.", body, padding)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_chunker_empty() {
        let chunker = SentenceChunker::with_defaults();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\t  ").is_empty());
    }

    #[test]
    fn test_split_sentences_normalizes_whitespace() {
        let sentences = split_sentences("First line.\n\nSecond   line!  Third?\nTail without stop");
        assert_eq!(
            sentences,
            vec!["First line.", "Second line!", "Third?", "Tail without stop"]
        );
    }

    #[test]
    fn test_split_sentences_keeps_inline_punctuation() {
        // 공백이 뒤따르지 않는 마침표는 경계가 아님
        let sentences = split_sentences("POJK No.40/POJK.03/2019 berlaku. Selesai.");
        assert_eq!(sentences, vec!["POJK No.40/POJK.03/2019 berlaku.", "Selesai."]);
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunker = SentenceChunker::with_defaults();
        let chunks = chunker.chunk("One. Two. Three.");
        assert_eq!(chunks, vec!["One. Two. Three."]);
    }

    #[test]
    fn test_chunk_size_bound() {
        let config = ChunkConfig {
            chunk_size: 200,
            overlap_sentences: 2,
        };
        let chunker = SentenceChunker::new(config);
        let chunks = chunker.chunk(&numbered_text(40, 60));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_oversized_sentence_kept_whole() {
        let config = ChunkConfig {
            chunk_size: 50,
            overlap_sentences: 2,
        };
        let chunker = SentenceChunker::new(config);
        let long = format!("{}.", "a".repeat(120));
        let text = format!("Short one. {} Short two.", long);

        let chunks = chunker.chunk(&text);

        assert!(chunks.contains(&long));
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50 || *chunk == long);
        }
    }

    #[test]
    fn test_overlap_carries_last_sentences() {
        let config = ChunkConfig {
            chunk_size: 200,
            overlap_sentences: 2,
        };
        let chunker = SentenceChunker::new(config);
        let chunks = chunker.chunk(&numbered_text(20, 40));
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let prev = split_sentences(&pair[0]);
            let tail = prev[prev.len().saturating_sub(2)..].join(" ");
            assert!(
                pair[1].starts_with(&tail),
                "next chunk should start with {:?}",
                tail
            );
        }
    }

    #[test]
    fn test_no_overlap_config() {
        let config = ChunkConfig {
            chunk_size: 100,
            overlap_sentences: 0,
        };
        let chunker = SentenceChunker::new(config);
        let chunks = chunker.chunk(&numbered_text(10, 40));

        let rejoined = chunks.join(" ");
        assert_eq!(rejoined, numbered_text(10, 40));
    }

    #[test]
    fn test_unicode_lengths_counted_in_chars() {
        let config = ChunkConfig {
            chunk_size: 10,
            overlap_sentences: 0,
        };
        let chunker = SentenceChunker::new(config);
        // 문장당 6글자(멀티바이트), 합치면 13글자 > 10
        let chunks = chunker.chunk("안녕하세요. 반갑습니다.");
        assert_eq!(chunks, vec!["안녕하세요.", "반갑습니다."]);
    }

    #[test]
    fn test_default_config() {
        let default = ChunkConfig::default();
        assert_eq!(default.chunk_size, 1000);
        assert_eq!(default.overlap_sentences, 2);
    }
}
