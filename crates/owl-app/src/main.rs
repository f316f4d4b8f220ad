//! # owl
//!
//! OWL 화면 샘플러 바이너리 진입점.
//! 설정 로드, 로깅 초기화, 어댑터 DI 와이어링, 포커스 감시와 샘플러 실행.

mod alert;
mod focus_watcher;
mod lifecycle;
mod navigation_bridge;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use owl_core::config::{AnalysisConfig, AnalysisProvider, AppConfig, NavigationConfig};
use owl_core::config_manager::ConfigManager;
use owl_core::models::history::{AnalysisOutcome, HistoryEntry};
use owl_core::ports::analysis::AnalysisForwarder;
use owl_core::ports::capture::{CaptureProvider, ExclusionListProvider, UrlHintSink};
use owl_core::ports::history::HistoryStore;
use owl_core::ports::notifier::AlertNotifier;
use owl_network::cloud_client::CloudAnalysisClient;
use owl_network::gemini_client::GeminiAnalysisClient;
use owl_storage::memory::MemoryHistoryStore;
use owl_storage::sqlite::SqliteHistoryStore;
use owl_vision::capture::XcapCaptureProvider;
use owl_vision::sampler::{self, Sampler, SamplerDeps, SamplerHandle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::alert::{LogAlertNotifier, OfflineForwarder};
use crate::focus_watcher::{FocusWatcher, XcapFocusSource};
use crate::lifecycle::LifecycleManager;
use crate::navigation_bridge::NavigationBridge;

/// OWL 화면 샘플러
///
/// 포커스된 화면을 주기적으로 캡처하고, 의미 있는 변화가 있을 때만
/// 아동 안전 분석기로 전송한다.
#[derive(Parser, Debug)]
#[command(name = "owl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 주기 캡처 간격 (밀리초), 설정 파일 값보다 우선
    #[arg(long)]
    interval: Option<u64>,

    /// 전송 임계값 (0.0~1.0), 설정 파일 값보다 우선
    #[arg(long)]
    threshold: Option<f32>,

    /// 오프라인 모드 (분석 요청 없이 로그만 남김)
    #[arg(long, short = 'o')]
    offline: bool,

    /// 표준 입력에서 탐색 이벤트(줄 단위 JSON) 수신
    #[arg(long)]
    nav_stdin: bool,

    /// 신뢰 도메인 추가 후 종료
    #[arg(long, value_name = "DOMAIN")]
    trust_domain: Vec<String>,

    /// 신뢰 도메인 제거 후 종료
    #[arg(long, value_name = "DOMAIN")]
    untrust_domain: Vec<String>,

    /// 저장된 이력 출력 후 종료 (기본 20건)
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "20")]
    show_history: Option<usize>,
}

const CRATES: [&str; 5] = ["owl", "owl_core", "owl_vision", "owl_network", "owl_storage"];

fn init_tracing(log_level: &str) {
    let log_filter = CRATES
        .iter()
        .map(|c| format!("{c}={log_level}"))
        .collect::<Vec<_>>()
        .join(",");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();
}

fn open_config(path: Option<PathBuf>) -> Result<ConfigManager> {
    let manager = match path {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    }
    .context("설정 관리자 초기화 실패")?;
    info!("설정 파일: {}", manager.config_path().display());
    Ok(manager)
}

/// CLI 인자로 설정 오버라이드 (파일에는 저장하지 않음)
fn apply_overrides(mut config: AppConfig, args: &Args) -> AppConfig {
    if let Some(interval) = args.interval {
        config.sampler.interval_ms = interval;
    }
    if let Some(threshold) = args.threshold {
        config.sampler.change_threshold = threshold;
    }
    config.sampler = config.sampler.sanitized();
    config
}

/// 신뢰 도메인 편집 명령 처리
fn handle_domain_commands(manager: &ConfigManager, args: &Args) -> Result<()> {
    for domain in &args.trust_domain {
        if manager.trust_domain(domain)? {
            println!("✅ 신뢰 도메인 추가: {domain}");
        } else {
            println!("ℹ️  이미 등록된 도메인: {domain}");
        }
    }
    for domain in &args.untrust_domain {
        if manager.untrust_domain(domain)? {
            println!("✅ 신뢰 도메인 제거: {domain}");
        } else {
            println!("ℹ️  등록되지 않은 도메인: {domain}");
        }
    }

    let list = manager.exclusion_list();
    println!("신뢰 도메인 {}개", list.len());
    for domain in list.iter() {
        println!("  - {domain}");
    }
    Ok(())
}

fn format_entry(entry: &HistoryEntry, image: Option<&str>) -> String {
    let time = entry
        .captured_at
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M:%S");
    let target = entry.url.as_deref().unwrap_or(entry.title.as_str());
    let image = image.unwrap_or("이미지 없음");
    match &entry.outcome {
        AnalysisOutcome::Analyzed { analysis } => format!(
            "{time}  [{:?}] {:>5.1}  {target}  ({image})\n    {}",
            analysis.risk_level, analysis.commercial_pressure_score, analysis.summary_for_parent
        ),
        AnalysisOutcome::Failed { error } => {
            format!("{time}  [실패]         {target}  ({image})\n    {error}")
        }
    }
}

/// 최근 이력을 출력용 문자열로 (첫 줄은 요약)
async fn render_history(store: &SqliteHistoryStore, limit: usize) -> Result<Vec<String>> {
    let entries = store.recent(limit).await?;
    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(format!("이력 {}건 / 저장 {}건", entries.len(), store.count()?));

    for entry in &entries {
        let image = store
            .load_image(&entry.snapshot_id)?
            .map(|(mime, bytes)| format!("{mime}, {} bytes", bytes.len()));
        lines.push(format_entry(entry, image.as_deref()));
    }
    Ok(lines)
}

async fn show_history(manager: &ConfigManager, limit: usize) -> Result<()> {
    let db_path = manager.history_db_path()?;
    let config = manager.get();
    let store = SqliteHistoryStore::open(&db_path, config.history.max_entries)?;

    println!("{}", db_path.display());
    for line in render_history(&store, limit).await? {
        println!("{line}");
    }
    Ok(())
}

fn open_history(manager: &ConfigManager, max_entries: usize) -> Arc<dyn HistoryStore> {
    let opened = manager
        .history_db_path()
        .and_then(|path| SqliteHistoryStore::open(&path, max_entries).map(|s| (path, s)));

    match opened {
        Ok((path, store)) => {
            info!("이력 저장소: {}", path.display());
            Arc::new(store)
        }
        Err(e) => {
            warn!("이력 저장소 열기 실패, 메모리 저장소 사용: {e}");
            Arc::new(MemoryHistoryStore::new(max_entries))
        }
    }
}

/// 설정된 분석 전송기 생성. 실패 시 오프라인 전송기로 대체
fn build_forwarder(config: &AnalysisConfig, offline: bool) -> Arc<dyn AnalysisForwarder> {
    if offline {
        info!("오프라인 모드: 분석 요청 비활성화");
        return Arc::new(OfflineForwarder);
    }

    let forwarder: Result<Arc<dyn AnalysisForwarder>, _> = match config.provider {
        AnalysisProvider::Cloud => {
            CloudAnalysisClient::new(config).map(|c| Arc::new(c) as Arc<dyn AnalysisForwarder>)
        }
        AnalysisProvider::Gemini => {
            GeminiAnalysisClient::new(config).map(|c| Arc::new(c) as Arc<dyn AnalysisForwarder>)
        }
    };

    match forwarder {
        Ok(forwarder) => {
            info!(forwarder = forwarder.name(), "분석 전송기 준비");
            forwarder
        }
        Err(e) => {
            warn!("분석 전송기 생성 실패: {e}");
            warn!("analysis 설정을 확인하거나 --offline 모드를 사용하세요. 오프라인으로 계속합니다.");
            Arc::new(OfflineForwarder)
        }
    }
}

/// 탐색 브리지 수신 주소 파싱 (잘못된 값이면 경고 후 비활성)
fn navigation_addr(config: &NavigationConfig) -> Option<SocketAddr> {
    let raw = config.listen_addr.as_deref()?.trim();
    match raw.parse() {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!("탐색 브리지 주소 무시 ({raw}): {e}");
            None
        }
    }
}

/// 설정된 탐색 이벤트 소스 시작
fn spawn_navigation(
    hints: Arc<dyn UrlHintSink>,
    handle: SamplerHandle,
    config: &NavigationConfig,
    from_stdin: bool,
    lifecycle: &LifecycleManager,
) -> Vec<tokio::task::JoinHandle<()>> {
    let bridge = Arc::new(NavigationBridge::new(hints, handle));
    let mut tasks = Vec::new();

    if let Some(addr) = navigation_addr(config) {
        let bridge = Arc::clone(&bridge);
        let rx = lifecycle.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = bridge.serve(addr, rx).await {
                error!("탐색 브리지 시작 실패: {e}");
            }
        }));
    }
    if from_stdin {
        tasks.push(tokio::spawn(bridge.run_stdin(lifecycle.subscribe())));
    }
    if tasks.is_empty() {
        info!("탐색 이벤트 소스 없음: URL을 모르는 창은 제외 목록 검사 없이 캡처됨");
    }
    tasks
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let manager = Arc::new(open_config(args.config.clone())?);

    if !args.trust_domain.is_empty() || !args.untrust_domain.is_empty() {
        return handle_domain_commands(&manager, &args);
    }
    if let Some(limit) = args.show_history {
        return show_history(&manager, limit).await;
    }

    let config = apply_overrides(manager.get(), &args);
    info!(
        interval_ms = config.sampler.interval_ms,
        threshold = config.sampler.change_threshold,
        trusted = config.exclusion.trusted_domains.len(),
        "OWL 샘플러 시작"
    );

    // ── 어댑터 생성 (DI 와이어링) ──

    // 1. 캡처
    let xcap = Arc::new(XcapCaptureProvider::from_config(&config.sampler));
    let capture: Arc<dyn CaptureProvider> = xcap.clone();

    // 2. 제외 목록 (설정 관리자에서 매 캡처 직전 조회)
    let exclusion: Arc<dyn ExclusionListProvider> = manager.clone();

    // 3. 분석 전송기
    let forwarder = build_forwarder(&config.analysis, args.offline);

    // 4. 이력 저장소 (SQLite 실패 시 메모리)
    let history = open_history(&manager, config.history.max_entries);

    // 5. 알림
    let notifier: Arc<dyn AlertNotifier> = Arc::new(LogAlertNotifier::default());

    // 6. 라이프사이클
    let lifecycle = LifecycleManager::new();

    // ── 태스크 시작 ──

    let (handle, rx) = sampler::channel(config.sampler.queue_capacity);
    let sampler = Sampler::new(
        &config.sampler,
        SamplerDeps {
            capture,
            exclusion,
            forwarder,
            history,
            notifier,
        },
        &handle,
    );
    let stats = sampler.stats();
    let sampler_task = tokio::spawn(sampler.run(rx));

    let watcher = FocusWatcher::new(
        Arc::new(XcapFocusSource),
        config.focus.poll_interval(),
        handle.clone(),
    );
    let watcher_task = tokio::spawn(watcher.run(lifecycle.subscribe()));

    let navigation_tasks = spawn_navigation(
        xcap,
        handle.clone(),
        &config.navigation,
        args.nav_stdin,
        &lifecycle,
    );

    info!("OWL 실행 중 (Ctrl+C로 종료)");

    if let Err(e) = lifecycle.wait_for_signal().await {
        error!("시그널 핸들러 등록 실패: {e}");
        lifecycle.shutdown();
    }

    if let Err(e) = watcher_task.await {
        warn!("포커스 감시 태스크 비정상 종료: {e}");
    }
    for task in navigation_tasks {
        if let Err(e) = task.await {
            warn!("탐색 브리지 태스크 비정상 종료: {e}");
        }
    }
    if let Err(e) = handle.shutdown().await {
        warn!("샘플러 종료 요청 실패: {e}");
    }
    if let Err(e) = sampler_task.await {
        warn!("샘플러 태스크 비정상 종료: {e}");
    }

    info!(stats = ?stats.snapshot(), "OWL 종료");
    Ok(())
}
