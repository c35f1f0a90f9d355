//! 파일 수집 모듈
//!
//! 로컬 감사 문서(텍스트 계열)를 수집하여 인덱스에 추가할 수 있게 합니다.
//! .gitignore 패턴을 존중하고, 지원하는 확장자만 수집합니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use scraper::Html;

// ============================================================================
// Document Formats
// ============================================================================

/// 지원하는 문서 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DocumentFormat {
    PlainText,
    Markdown,
    Csv,
    Json,
    /// HTML/XML (태그 제거 후 인덱싱)
    Markup,
    Log,
}

impl DocumentFormat {
    /// 확장자로 형식 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        match ext.as_str() {
            "txt" => Some(DocumentFormat::PlainText),
            "md" | "markdown" => Some(DocumentFormat::Markdown),
            "csv" => Some(DocumentFormat::Csv),
            "json" => Some(DocumentFormat::Json),
            "html" | "htm" | "xml" => Some(DocumentFormat::Markup),
            "log" => Some(DocumentFormat::Log),
            _ => None,
        }
    }

    /// 파일 경로에서 형식 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentFormat::PlainText => "text",
            DocumentFormat::Markdown => "markdown",
            DocumentFormat::Csv => "csv",
            DocumentFormat::Json => "json",
            DocumentFormat::Markup => "markup",
            DocumentFormat::Log => "log",
        }
    }
}

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 파일 정보
#[derive(Debug, Clone)]
pub struct CollectedFile {
    /// 파일 절대 경로
    pub path: PathBuf,
    /// 인덱스에 쓰는 문서 이름 (수집 루트 기준 상대 경로, `/` 구분)
    pub name: String,
    pub format: DocumentFormat,
    /// 파일 크기 (바이트)
    pub size: u64,
    pub modified_at: Option<SystemTime>,
}

impl CollectedFile {
    /// 경로에서 생성 (지원하지 않는 확장자는 None)
    ///
    /// # Arguments
    /// * `path` - 파일 절대 경로
    /// * `root` - 수집 루트 (문서 이름 계산 기준)
    pub fn from_path(path: PathBuf, root: &Path) -> Result<Option<Self>> {
        let format = match DocumentFormat::from_path(&path) {
            Some(format) => format,
            None => return Ok(None),
        };

        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Self {
            name: relative_name(&path, root),
            path,
            format,
            size: metadata.len(),
            modified_at: metadata.modified().ok(),
        }))
    }

    /// 본문 읽기
    ///
    /// UTF-8이 아닌 바이트는 대체 문자로 바꾸고, 마크업은 텍스트 노드만 남깁니다.
    pub fn read_text(&self) -> Result<String> {
        let bytes =
            std::fs::read(&self.path).with_context(|| format!("Failed to read {:?}", self.path))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        Ok(match self.format {
            DocumentFormat::Markup => markup_to_text(&text),
            _ => text,
        })
    }
}

/// 수집 루트 기준 상대 경로 (루트 밖이면 파일명)
fn relative_name(path: &Path, root: &Path) -> String {
    let relative: Vec<String> = path
        .strip_prefix(root)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();

    if relative.is_empty() {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned())
    } else {
        relative.join("/")
    }
}

/// HTML/XML에서 텍스트 추출 (스크립트/스타일/주석 제외, 엔티티 디코딩)
fn markup_to_text(markup: &str) -> String {
    let document = Html::parse_document(markup);
    let mut text = String::new();

    for node in document.root_element().descendants() {
        let content = match node.value().as_text() {
            Some(content) => content,
            None => continue,
        };

        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|el| el.name()))
            .map(|name| SKIPPED_ELEMENTS.contains(&name))
            .unwrap_or(false);
        if hidden {
            continue;
        }

        let trimmed = content.trim();
        if !trimmed.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(trimmed);
        }
    }

    // 연속 공백 정리
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 텍스트를 버리는 요소
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

// ============================================================================
// File Collector
// ============================================================================

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
    /// 특정 확장자만 수집 (비어있으면 모든 지원 확장자)
    pub extensions: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 10 * 1024 * 1024, // 10MB
            extensions: vec![],
        }
    }
}

/// 파일 수집기
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 단일 파일 수집
    pub fn collect_file(&self, path: &Path) -> Result<Option<CollectedFile>> {
        let abs_path = absolute(path)?;

        if !abs_path.exists() {
            anyhow::bail!("File not found: {:?}", abs_path);
        }
        if !abs_path.is_file() {
            anyhow::bail!("Not a file: {:?}", abs_path);
        }

        let root = abs_path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(CollectedFile::from_path(abs_path, &root)?.filter(|file| self.should_include(file)))
    }

    /// 폴더 재귀 수집 (경로 순 정렬)
    pub fn collect_directory(&self, path: &Path) -> Result<Vec<CollectedFile>> {
        let abs_path = absolute(path)?;

        if !abs_path.exists() {
            anyhow::bail!("Directory not found: {:?}", abs_path);
        }
        if !abs_path.is_dir() {
            anyhow::bail!("Not a directory: {:?}", abs_path);
        }

        let walker = WalkBuilder::new(&abs_path)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .require_git(false)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            match CollectedFile::from_path(entry.path().to_path_buf(), &abs_path) {
                Ok(Some(file)) if self.should_include(&file) => files.push(file),
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to collect file: {:#}", e),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::info!("Collected {} documents from {:?}", files.len(), abs_path);
        Ok(files)
    }

    fn should_include(&self, file: &CollectedFile) -> bool {
        if self.config.max_file_size > 0 && file.size > self.config.max_file_size {
            tracing::debug!("Skipping large file: {:?} ({} bytes)", file.path, file.size);
            return false;
        }

        if self.config.extensions.is_empty() {
            return true;
        }

        file.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.config.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// 수집 통계
#[derive(Debug, Default)]
pub struct CollectionStats {
    pub total_files: usize,
    pub total_size: u64,
    pub by_format: BTreeMap<DocumentFormat, usize>,
}

impl CollectionStats {
    pub fn from_files(files: &[CollectedFile]) -> Self {
        let mut stats = Self::default();

        for file in files {
            stats.total_files += 1;
            stats.total_size += file.size;
            *stats.by_format.entry(file.format).or_insert(0) += 1;
        }

        stats
    }
}

// ============================================================================
// Tests
// ============================================================================
