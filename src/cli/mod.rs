//! CLI 모듈
//!
//! audit-rag CLI 명령어 정의 및 구현.
//! 매 실행마다 스냅샷을 로드하고, 인덱스를 변경한 명령은 다시 저장합니다.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::collector::{CollectedFile, CollectionStats, CollectorConfig, FileCollector};
use crate::config::{get_data_dir, Settings};
use crate::embedding::create_embedder;
use crate::knowledge::classifier::CITATION_PATTERNS_VERSION;
use crate::knowledge::{
    AuditRagHelper, IndexSnapshot, Metadata, RagEngine, RetrievalResult, DEFAULT_HELPER_TOP_K,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "audit-rag")]
#[command(version, about = "감사 문서 RAG 검색 도구", long_about = None)]
pub struct Cli {
    /// 설정 파일 경로 (기본: ./audit-rag.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 파일 또는 폴더를 인덱스에 추가
    Ingest {
        /// 수집할 파일 경로
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// 수집할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 같은 파일명의 기존 청크를 교체
        #[arg(long)]
        replace: bool,
    },

    /// 인덱스 검색
    Query {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 (기본: 설정값)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// 임베딩을 쓰지 않고 키워드 검색만 사용
        #[arg(long)]
        keyword_only: bool,
    },

    /// LLM 프롬프트용 컨텍스트 출력
    Context {
        query: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// 감사 영역의 리스크 지표 검색
    Risks {
        area: String,

        #[arg(short = 'k', long, default_value_t = DEFAULT_HELPER_TOP_K)]
        top_k: usize,
    },

    /// 규정 인용 검색 (예: "POJK No. 40/POJK.03/2019")
    Regulation {
        citation: String,

        #[arg(short = 'k', long, default_value_t = DEFAULT_HELPER_TOP_K)]
        top_k: usize,
    },

    /// 프로세스의 통제 기술 검색
    Controls {
        process: String,

        #[arg(short = 'k', long, default_value_t = DEFAULT_HELPER_TOP_K)]
        top_k: usize,
    },

    /// 감사 계획용 종합 컨텍스트 출력
    Audit {
        area: String,

        /// 중점 영역 (여러 번 지정 가능)
        #[arg(short, long)]
        focus: Vec<String>,
    },

    /// 문서 또는 청크 삭제
    Delete {
        /// 삭제할 문서 파일명
        #[arg(short, long)]
        filename: Option<String>,

        /// 삭제할 청크 ID
        #[arg(short, long, num_args = 1..)]
        id: Vec<String>,
    },

    /// 인덱스 전체 삭제
    Clear,

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let workspace = Workspace::open(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { file, dir, replace } => cmd_ingest(&workspace, file, dir, replace).await,
        Commands::Query {
            query,
            top_k,
            keyword_only,
        } => cmd_query(&workspace, &query, top_k, keyword_only).await,
        Commands::Context { query, top_k } => cmd_context(&workspace, &query, top_k).await,
        Commands::Risks { area, top_k } => cmd_risks(&workspace, &area, top_k).await,
        Commands::Regulation { citation, top_k } => {
            cmd_regulation(&workspace, &citation, top_k).await
        }
        Commands::Controls { process, top_k } => cmd_controls(&workspace, &process, top_k).await,
        Commands::Audit { area, focus } => cmd_audit(&workspace, &area, &focus).await,
        Commands::Delete { filename, id } => cmd_delete(&workspace, filename, id),
        Commands::Clear => cmd_clear(&workspace),
        Commands::Status => cmd_status(&workspace),
    }
}

// ============================================================================
// Workspace
// ============================================================================

/// 설정 + 엔진 + 스냅샷 경로
struct Workspace {
    settings: Settings,
    engine: Arc<RagEngine>,
    snapshot_path: PathBuf,
}

impl Workspace {
    fn open(config_file: Option<&Path>) -> Result<Self> {
        let settings = Settings::load(config_file).context("설정 로드 실패")?;
        let embedder = create_embedder(&settings.embedding).context("임베딩 프로바이더 생성 실패")?;
        let engine = Arc::new(RagEngine::from_settings(&settings, embedder));
        let snapshot_path = settings.storage.snapshot_path();

        if snapshot_path.exists() {
            let snapshot = IndexSnapshot::load(&snapshot_path)
                .with_context(|| format!("스냅샷 로드 실패: {:?}", snapshot_path))?;
            engine.restore(snapshot).context("스냅샷 복원 실패")?;
        } else {
            tracing::debug!("No snapshot at {:?}, starting with an empty index", snapshot_path);
        }

        Ok(Self {
            settings,
            engine,
            snapshot_path,
        })
    }

    fn save(&self) -> Result<()> {
        self.engine
            .snapshot()
            .and_then(|snapshot| snapshot.save(&self.snapshot_path))
            .with_context(|| format!("스냅샷 저장 실패: {:?}", self.snapshot_path))
    }

    fn helper(&self) -> AuditRagHelper {
        AuditRagHelper::new(Arc::clone(&self.engine))
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 문서 수집 명령어 (ingest)
async fn cmd_ingest(
    workspace: &Workspace,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    replace: bool,
) -> Result<()> {
    let collector = FileCollector::new(CollectorConfig::default());

    let files = if let Some(ref file_path) = file {
        match collector.collect_file(file_path)? {
            Some(f) => vec![f],
            None => {
                println!("[!] 지원하지 않는 파일 형식: {:?}", file_path);
                return Ok(());
            }
        }
    } else if let Some(ref dir_path) = dir {
        collector.collect_directory(dir_path)?
    } else {
        bail!("--file 또는 --dir를 지정해야 합니다");
    };

    if files.is_empty() {
        println!("[!] 수집할 파일이 없습니다.");
        return Ok(());
    }

    let stats = CollectionStats::from_files(&files);
    println!("[*] 수집 대상: {} 파일", stats.total_files);
    let formats: Vec<String> = stats
        .by_format
        .iter()
        .map(|(format, count)| format!("{}: {}", format.label(), count))
        .collect();
    println!("    {}", formats.join(", "));
    println!("    총 크기: {}", format_bytes(stats.total_size as usize));
    println!();

    let mut success_count = 0;
    let mut error_count = 0;

    for (i, collected) in files.iter().enumerate() {
        print!("[{}/{}] {}... ", i + 1, files.len(), collected.name);
        // 진행 표시가 결과보다 먼저 보이도록
        let _ = std::io::stdout().flush();

        match ingest_file(&workspace.engine, collected, replace).await {
            Ok(chunks) => {
                println!("완료 ({} 청크)", chunks);
                success_count += 1;
            }
            Err(e) => {
                println!("실패: {:#}", e);
                error_count += 1;
            }
        }
    }

    workspace.save()?;

    println!();
    println!("[OK] 완료: 성공 {}, 실패 {}", success_count, error_count);
    Ok(())
}

async fn ingest_file(
    engine: &RagEngine,
    collected: &CollectedFile,
    replace: bool,
) -> Result<usize> {
    let text = collected.read_text()?;

    let mut metadata = Metadata::new();
    metadata.insert(
        "source_path".to_string(),
        serde_json::Value::String(collected.path.display().to_string()),
    );
    metadata.insert(
        "format".to_string(),
        serde_json::Value::String(collected.format.label().to_string()),
    );

    let name = &collected.name;
    let doc = if replace {
        engine.replace_document(&text, name, Some(metadata)).await?
    } else {
        engine.index_document(&text, name, Some(metadata)).await?
    };

    Ok(doc.chunk_count())
}

/// 검색 명령어 (query)
async fn cmd_query(
    workspace: &Workspace,
    query: &str,
    top_k: Option<usize>,
    keyword_only: bool,
) -> Result<()> {
    let engine = &workspace.engine;
    let top_k = top_k.unwrap_or_else(|| engine.top_k());

    println!("[*] 검색 중: \"{}\"", query);

    let results = search(engine, query, top_k, keyword_only)
        .await
        .context("검색 실패")?;

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{}] [점수: {:.4}] {}",
            i + 1,
            result.method.label(),
            result.score,
            result.source_document
        );
        println!("   청크: {}", result.chunk.id);
        println!(
            "   분류: {} | 언어: {}",
            result.chunk.categories().join(", "),
            result.chunk.metadata.document.language.code()
        );
        println!("   내용: {}", truncate_text(&result.chunk.content, 200));
        println!();
    }

    Ok(())
}

/// `--keyword-only`면 임베딩 설정과 무관하게 키워드 검색
async fn search(
    engine: &RagEngine,
    query: &str,
    top_k: usize,
    keyword_only: bool,
) -> crate::error::Result<Vec<RetrievalResult>> {
    if keyword_only {
        engine.keyword_query(query, top_k)
    } else {
        engine.query(query, top_k, engine.use_hybrid()).await
    }
}

/// 컨텍스트 명령어 (context)
async fn cmd_context(workspace: &Workspace, query: &str, top_k: Option<usize>) -> Result<()> {
    let top_k = top_k.unwrap_or_else(|| workspace.engine.top_k());
    let context = workspace
        .engine
        .generate_context(query, top_k)
        .await
        .context("컨텍스트 생성 실패")?;

    println!("{}", context);
    Ok(())
}

/// 리스크 지표 명령어 (risks)
async fn cmd_risks(workspace: &Workspace, area: &str, top_k: usize) -> Result<()> {
    let hits = workspace
        .helper()
        .find_risk_indicators(area, top_k)
        .await
        .context("리스크 지표 검색 실패")?;

    if hits.is_empty() {
        println!("[!] '{}' 영역의 리스크 지표가 없습니다.", area);
        return Ok(());
    }

    println!("[OK] 리스크 지표 ({} 건):\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let level = match hit.risk_level {
            crate::knowledge::RiskLevel::High => "HIGH",
            crate::knowledge::RiskLevel::Medium => "MEDIUM",
        };
        println!("{}. [{}] [점수: {:.4}] {}", i + 1, level, hit.score, hit.source);

        let indicators = &hit.indicators;
        for (label, terms) in [
            ("high_risk", &indicators.high_risk),
            ("control_weakness", &indicators.control_weakness),
            ("finding", &indicators.finding),
        ] {
            if !terms.is_empty() {
                println!("   {}: {}", label, terms.join(", "));
            }
        }
        println!("   발췌: {}", truncate_text(&hit.excerpt, 200));
        println!();
    }

    Ok(())
}

/// 규정 인용 명령어 (regulation)
async fn cmd_regulation(workspace: &Workspace, citation: &str, top_k: usize) -> Result<()> {
    let references = workspace
        .helper()
        .find_regulatory_references(citation, top_k)
        .await
        .context("규정 인용 검색 실패")?;

    if references.is_empty() {
        println!("[!] '{}'를 인용한 문서가 없습니다.", citation);
        return Ok(());
    }

    println!("[OK] 규정 인용 ({} 건):\n", references.len());
    for (i, reference) in references.iter().enumerate() {
        println!("{}. [점수: {:.4}] {}", i + 1, reference.score, reference.source);
        if !reference.regulations.is_empty() {
            println!("   관련 규정: {}", reference.regulations.join(", "));
        }
        println!("   내용: {}", truncate_text(&reference.content, 200));
        println!();
    }

    Ok(())
}

/// 통제 기술 명령어 (controls)
async fn cmd_controls(workspace: &Workspace, process: &str, top_k: usize) -> Result<()> {
    let controls = workspace
        .helper()
        .find_control_descriptions(process, top_k)
        .await
        .context("통제 기술 검색 실패")?;

    if controls.is_empty() {
        println!("[!] '{}' 프로세스의 통제 기술이 없습니다.", process);
        return Ok(());
    }

    println!("[OK] 통제 기술 ({} 건):\n", controls.len());
    for (i, control) in controls.iter().enumerate() {
        println!("{}. [점수: {:.4}] {}", i + 1, control.score, control.source);
        println!("   {}", truncate_text(&control.description, 200));
        println!();
    }

    Ok(())
}

/// 감사 컨텍스트 명령어 (audit)
async fn cmd_audit(workspace: &Workspace, area: &str, focus: &[String]) -> Result<()> {
    let context = workspace
        .helper()
        .generate_audit_context(area, focus)
        .await
        .context("감사 컨텍스트 생성 실패")?;

    if context.is_empty() {
        println!("[!] '{}' 영역의 관련 문서가 없습니다.", area);
    } else {
        println!("{}", context);
    }
    Ok(())
}

/// 삭제 명령어 (delete)
fn cmd_delete(workspace: &Workspace, filename: Option<String>, ids: Vec<String>) -> Result<()> {
    let removed = if let Some(ref name) = filename {
        workspace
            .engine
            .delete_document(name)
            .context("문서 삭제 실패")?
    } else if !ids.is_empty() {
        workspace
            .engine
            .delete_chunks(&ids)
            .context("청크 삭제 실패")?
    } else {
        bail!("--filename 또는 --id 중 하나를 지정해야 합니다");
    };

    if removed == 0 {
        println!("[!] 삭제할 청크를 찾을 수 없습니다");
        return Ok(());
    }

    workspace.save()?;
    println!("[OK] {} 청크 삭제됨", removed);
    Ok(())
}

/// 전체 삭제 명령어 (clear)
fn cmd_clear(workspace: &Workspace) -> Result<()> {
    workspace.engine.clear().context("인덱스 초기화 실패")?;
    workspace.save()?;
    println!("[OK] 인덱스를 비웠습니다");
    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(workspace: &Workspace) -> Result<()> {
    let settings = &workspace.settings;

    println!("audit-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", get_data_dir().display());
    println!("[*] 스냅샷: {}", workspace.snapshot_path.display());
    println!(
        "[*] 청킹: {} ({} 문자, 오버랩 {} 문장)",
        workspace.engine.chunker_name(),
        settings.rag.chunk_size,
        settings.rag.overlap_sentences
    );
    println!("[*] 규정 인용 패턴: v{}", CITATION_PATTERNS_VERSION);
    println!(
        "[*] 검색: top_k {}, hybrid {} (alpha {:.2})",
        settings.rag.top_k, settings.rag.use_hybrid_search, settings.rag.hybrid_alpha
    );

    if workspace.engine.has_embedder() {
        println!(
            "[OK] 임베딩: {} ({})",
            settings.embedding.model, settings.embedding.base_url
        );
    } else {
        println!("[!] 임베딩: 비활성 (키워드 검색 전용)");
    }

    let stats = workspace.engine.get_stats().context("통계 조회 실패")?;
    println!(
        "[OK] 인덱스: 문서 {} 건, 청크 {} 개 (임베딩 {} 개)",
        stats.document_count, stats.total_chunks, stats.embedded_chunks
    );

    if !stats.categories.is_empty() {
        println!("     카테고리:");
        for (category, count) in &stats.categories {
            println!("       {:<16} {}", category, count);
        }
    }

    if workspace.snapshot_path.exists() {
        if let Ok(metadata) = std::fs::metadata(&workspace.snapshot_path) {
            println!(
                "     스냅샷 크기: {}",
                format_bytes(metadata.len() as usize)
            );
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
