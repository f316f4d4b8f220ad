//! 변화 감지 샘플러.
//!
//! 포커스/탐색/타이머 이벤트를 단일 큐로 직렬화하여 처리한다.
//!
//! ```text
//! FocusChanged / NavigationCompleted ─▶ 강제 캡처 ─▶ 타이머 재시작 (Sampling)
//! Tick(현재 세대)                     ─▶ 일반 캡처 ─▶ 게이트 판정
//! FocusLost                          ─▶ 타이머 해제 (Idle)
//! ```
//!
//! 전송이 결정된 스냅샷은 별도 태스크로 분석기에 넘기며, 이벤트 루프는
//! 분석 결과를 기다리지 않는다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use owl_core::config::SamplerConfig;
use owl_core::error::CoreError;
use owl_core::models::history::HistoryEntry;
use owl_core::models::snapshot::Snapshot;
use owl_core::models::surface::{SurfaceAddress, SurfaceId};
use owl_core::ports::analysis::AnalysisForwarder;
use owl_core::ports::capture::{CaptureProvider, ExclusionListProvider};
use owl_core::ports::history::HistoryStore;
use owl_core::ports::notifier::AlertNotifier;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::change_detector::ChangeDetector;
use crate::gate::{ChangeGate, ForwardReason, GateDecision};

// ============================================================
// 이벤트 / 상태
// ============================================================

/// 샘플러 입력 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum SamplerEvent {
    /// 다른 서피스로 포커스 이동
    FocusChanged(SurfaceId),
    /// 포커스된 서피스의 탐색(페이지 로드) 완료
    NavigationCompleted(SurfaceId),
    /// 포커스된 서피스 없음
    FocusLost,
    /// 주기 타이머 틱
    Tick { generation: u64 },
    /// 이벤트 루프 종료
    Shutdown,
}

/// 샘플러 상태
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SamplerState {
    #[default]
    Idle,
    Sampling { surface: SurfaceId },
}

/// 캡처 1회 결과
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// 신뢰 도메인
    Excluded,
    /// 브라우저 내부 페이지 등 캡처 불가 주소
    Unsupported,
    /// 서피스 해석/캡처 실패
    Failed,
    /// 변화 미미
    Suppressed { fraction: f32 },
    /// 분석기로 전송
    Forwarded { reason: ForwardReason },
}

// ============================================================
// 통계
// ============================================================

/// 진단용 카운터
#[derive(Debug, Default)]
pub struct SamplerStats {
    captures: AtomicU64,
    forwarded: AtomicU64,
    suppressed: AtomicU64,
    excluded: AtomicU64,
    unsupported: AtomicU64,
    failures: AtomicU64,
    analysis_errors: AtomicU64,
}

/// 카운터 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStatsSnapshot {
    pub captures: u64,
    pub forwarded: u64,
    pub suppressed: u64,
    pub excluded: u64,
    pub unsupported: u64,
    pub failures: u64,
    pub analysis_errors: u64,
}

impl SamplerStats {
    pub fn snapshot(&self) -> SamplerStatsSnapshot {
        SamplerStatsSnapshot {
            captures: self.captures.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            excluded: self.excluded.load(Ordering::Relaxed),
            unsupported: self.unsupported.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            analysis_errors: self.analysis_errors.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================
// 핸들
// ============================================================

/// 샘플러 큐 송신 핸들 (복제 가능)
#[derive(Debug, Clone)]
pub struct SamplerHandle {
    tx: mpsc::Sender<SamplerEvent>,
}

/// 샘플러 이벤트 큐 생성
pub fn channel(capacity: usize) -> (SamplerHandle, mpsc::Receiver<SamplerEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (SamplerHandle { tx }, rx)
}

impl SamplerHandle {
    pub async fn send(&self, event: SamplerEvent) -> Result<(), CoreError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| CoreError::Internal("샘플러 이벤트 루프 종료됨".to_string()))
    }

    pub async fn focus_changed(&self, surface: SurfaceId) -> Result<(), CoreError> {
        self.send(SamplerEvent::FocusChanged(surface)).await
    }

    pub async fn navigation_completed(&self, surface: SurfaceId) -> Result<(), CoreError> {
        self.send(SamplerEvent::NavigationCompleted(surface)).await
    }

    pub async fn focus_lost(&self) -> Result<(), CoreError> {
        self.send(SamplerEvent::FocusLost).await
    }

    pub async fn shutdown(&self) -> Result<(), CoreError> {
        self.send(SamplerEvent::Shutdown).await
    }
}

// ============================================================
// 주기 타이머
// ============================================================

/// 샘플러 큐에 `Tick`을 보내는 단일 타이머.
///
/// `arm`은 기존 태스크를 중단하고 세대를 올린다. 세대가 다른 틱은
/// 샘플러가 버리므로 해제된 타이머의 틱은 처리되지 않는다.
pub struct IntervalTimer {
    tx: mpsc::Sender<SamplerEvent>,
    period: Duration,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl IntervalTimer {
    pub fn new(tx: mpsc::Sender<SamplerEvent>, period: Duration) -> Self {
        Self {
            tx,
            period,
            generation: 0,
            task: None,
        }
    }

    /// 타이머 (재)시작. 첫 틱은 한 주기 뒤
    pub fn arm(&mut self) -> u64 {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let period = self.period;
        let tx = self.tx.clone();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match tx.try_send(SamplerEvent::Tick { generation }) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        trace!(generation, "샘플러 큐 가득 참, 틱 생략");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        }));
        generation
    }

    /// 타이머 해제
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 현재 활성 세대의 틱인지
    pub fn is_current(&self, generation: u64) -> bool {
        self.is_armed() && generation == self.generation
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================
// 샘플러
// ============================================================

/// 샘플러가 사용하는 포트 묶음
#[derive(Clone)]
pub struct SamplerDeps {
    pub capture: Arc<dyn CaptureProvider>,
    pub exclusion: Arc<dyn ExclusionListProvider>,
    pub forwarder: Arc<dyn AnalysisForwarder>,
    pub history: Arc<dyn HistoryStore>,
    pub notifier: Arc<dyn AlertNotifier>,
}

/// 변화 감지 샘플러 상태 기계
pub struct Sampler {
    deps: SamplerDeps,
    gate: ChangeGate,
    timer: IntervalTimer,
    state: SamplerState,
    stats: Arc<SamplerStats>,
}

impl Sampler {
    pub fn new(config: &SamplerConfig, deps: SamplerDeps, handle: &SamplerHandle) -> Self {
        let config = config.clone().sanitized();
        let detector = ChangeDetector::new(config.pixel_threshold, config.diff_size);
        Self {
            deps,
            gate: ChangeGate::new(detector, config.change_threshold),
            timer: IntervalTimer::new(handle.tx.clone(), config.interval()),
            state: SamplerState::Idle,
            stats: Arc::new(SamplerStats::default()),
        }
    }

    pub fn state(&self) -> &SamplerState {
        &self.state
    }

    pub fn stats(&self) -> Arc<SamplerStats> {
        Arc::clone(&self.stats)
    }

    pub fn timer(&self) -> &IntervalTimer {
        &self.timer
    }

    /// 이벤트 루프. `Shutdown` 또는 큐 종료 시 반환
    pub async fn run(mut self, mut rx: mpsc::Receiver<SamplerEvent>) {
        info!("샘플러 시작");
        while let Some(event) = rx.recv().await {
            if !self.handle(event).await {
                break;
            }
        }
        self.stop();
        info!(stats = ?self.stats.snapshot(), "샘플러 종료");
    }

    /// 이벤트 1건 처리. 루프를 계속하면 true
    pub async fn handle(&mut self, event: SamplerEvent) -> bool {
        match event {
            SamplerEvent::FocusChanged(surface) | SamplerEvent::NavigationCompleted(surface) => {
                self.capture(&surface, true).await;
                self.restart(surface);
            }
            SamplerEvent::Tick { generation } => {
                if !self.timer.is_current(generation) {
                    trace!(generation, current = self.timer.generation(), "이전 세대 틱 무시");
                    return true;
                }
                if let SamplerState::Sampling { surface } = &self.state {
                    let surface = surface.clone();
                    self.capture(&surface, false).await;
                }
            }
            SamplerEvent::FocusLost => self.stop(),
            SamplerEvent::Shutdown => {
                self.stop();
                return false;
            }
        }
        true
    }

    /// 대상 서피스로 주기 캡처 (재)시작
    pub fn restart(&mut self, surface: SurfaceId) {
        let generation = self.timer.arm();
        debug!(%surface, generation, "주기 캡처 시작");
        self.state = SamplerState::Sampling { surface };
    }

    /// 주기 캡처 중지
    pub fn stop(&mut self) {
        self.timer.cancel();
        if self.state != SamplerState::Idle {
            debug!("주기 캡처 중지");
        }
        self.state = SamplerState::Idle;
    }

    /// 캡처 → 제외 검사 → 게이트 판정 → (전송)
    pub async fn capture(&mut self, surface: &SurfaceId, forced: bool) -> CaptureOutcome {
        let info = match self.deps.capture.resolve(surface).await {
            Ok(info) => info,
            Err(e) => {
                warn!(%surface, "서피스 해석 실패: {e}");
                SamplerStats::bump(&self.stats.failures);
                return CaptureOutcome::Failed;
            }
        };

        match info.address() {
            SurfaceAddress::Internal => {
                debug!(%surface, url = ?info.url, "캡처 불가 주소");
                SamplerStats::bump(&self.stats.unsupported);
                return CaptureOutcome::Unsupported;
            }
            SurfaceAddress::Host(host) if self.deps.exclusion.exclusion_list().matches(&host) => {
                debug!(%surface, %host, "신뢰 도메인, 캡처 생략");
                SamplerStats::bump(&self.stats.excluded);
                return CaptureOutcome::Excluded;
            }
            _ => {}
        }

        let bytes = match self.deps.capture.capture(&info).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%surface, "캡처 실패: {e}");
                SamplerStats::bump(&self.stats.failures);
                return CaptureOutcome::Failed;
            }
        };
        SamplerStats::bump(&self.stats.captures);

        let snapshot = Snapshot::capture(&info, bytes, self.deps.capture.mime());
        match self.gate.evaluate(&snapshot, forced) {
            GateDecision::Suppress { fraction } => {
                SamplerStats::bump(&self.stats.suppressed);
                CaptureOutcome::Suppressed { fraction }
            }
            GateDecision::Forward { reason } => {
                SamplerStats::bump(&self.stats.forwarded);
                debug!(snapshot = %snapshot.id, ?reason, bytes = snapshot.image_len(), "분석 전송");
                self.spawn_forward(snapshot);
                CaptureOutcome::Forwarded { reason }
            }
        }
    }

    fn spawn_forward(&self, snapshot: Snapshot) {
        let deps = self.deps.clone();
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            forward_snapshot(snapshot, deps, stats).await;
        });
    }
}

/// 분석 요청 → 이력 기록 → 고위험 알림
async fn forward_snapshot(snapshot: Snapshot, deps: SamplerDeps, stats: Arc<SamplerStats>) {
    let analysis = match deps.forwarder.analyze(&snapshot).await {
        Ok(analysis) => analysis.normalized(),
        Err(e) => {
            warn!(snapshot = %snapshot.id, forwarder = deps.forwarder.name(), "분석 실패: {e}");
            SamplerStats::bump(&stats.analysis_errors);
            if let Err(e) = deps.history.record_failure(&snapshot, &e.to_string()).await {
                warn!("실패 이력 기록 실패: {e}");
            }
            return;
        }
    };

    info!(
        snapshot = %snapshot.id,
        risk = ?analysis.risk_level,
        score = analysis.commercial_pressure_score,
        "분석 완료"
    );

    let high_risk = analysis.is_high_risk();
    let entry = match deps.history.record_analysis(&snapshot, analysis.clone()).await {
        Ok(entry) => entry,
        Err(e) => {
            warn!("분석 이력 기록 실패: {e}");
            HistoryEntry::analyzed(&snapshot, analysis)
        }
    };

    if high_risk {
        if let Err(e) = deps.notifier.notify_high_risk(&entry).await {
            warn!("고위험 알림 실패: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rearm_leaves_single_active_timer() {
        let (handle, mut rx) = channel(16);
        let mut timer = IntervalTimer::new(handle.tx.clone(), Duration::from_millis(100));

        let first = timer.arm();
        let second = timer.arm();
        assert_eq!(second, first + 1);
        assert!(timer.is_current(second));
        assert!(!timer.is_current(first));

        tokio::time::sleep(Duration::from_millis(350)).await;

        let mut ticks = 0;
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event, SamplerEvent::Tick { generation: second });
            ticks += 1;
        }
        assert!((2..=3).contains(&ticks), "ticks = {ticks}");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (handle, mut rx) = channel(16);
        let mut timer = IntervalTimer::new(handle.tx.clone(), Duration::from_millis(100));

        let generation = timer.arm();
        timer.cancel();
        assert!(!timer.is_armed());
        assert!(!timer.is_current(generation));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_after_one_period() {
        let (handle, mut rx) = channel(16);
        let mut timer = IntervalTimer::new(handle.tx.clone(), Duration::from_millis(2000));
        timer.arm();

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(matches!(rx.try_recv(), Ok(SamplerEvent::Tick { .. })));
    }

    #[test]
    fn stats_snapshot_starts_at_zero() {
        let stats = SamplerStats::default();
        SamplerStats::bump(&stats.captures);
        let snap = stats.snapshot();
        assert_eq!(snap.captures, 1);
        assert_eq!(snap.forwarded, 0);
    }
}
