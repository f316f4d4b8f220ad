//! 포커스 감시자.
//!
//! 포커스된 창을 주기적으로 조회하여 변화가 있을 때만 샘플러에 알린다.
//!
//! ```text
//! None    → Some(a) : FocusChanged(a)
//! Some(a) → Some(b) : FocusChanged(b)
//! Some(a) → None    : FocusLost
//! 그 외             : 이벤트 없음
//! ```

use std::sync::Arc;
use std::time::Duration;

use owl_core::error::CoreError;
use owl_core::models::surface::SurfaceId;
use owl_vision::capture::XcapCaptureProvider;
use owl_vision::sampler::{SamplerEvent, SamplerHandle};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// 포커스된 서피스 조회 (블로킹 호출 허용)
pub trait FocusSource: Send + Sync + 'static {
    fn focused(&self) -> Result<Option<SurfaceId>, CoreError>;
}

/// xcap 최상위 창 포커스 조회
pub struct XcapFocusSource;

impl FocusSource for XcapFocusSource {
    fn focused(&self) -> Result<Option<SurfaceId>, CoreError> {
        XcapCaptureProvider::focused_window()
    }
}

/// 이전/현재 포커스로부터 보낼 이벤트 결정
pub fn transition(prev: Option<&SurfaceId>, next: Option<&SurfaceId>) -> Option<SamplerEvent> {
    match (prev, next) {
        (_, Some(next)) if prev != Some(next) => Some(SamplerEvent::FocusChanged(next.clone())),
        (Some(_), None) => Some(SamplerEvent::FocusLost),
        _ => None,
    }
}

/// 포커스 감시자
pub struct FocusWatcher {
    source: Arc<dyn FocusSource>,
    poll_interval: Duration,
    handle: SamplerHandle,
}

impl FocusWatcher {
    pub fn new(source: Arc<dyn FocusSource>, poll_interval: Duration, handle: SamplerHandle) -> Self {
        Self {
            source,
            poll_interval,
            handle,
        }
    }

    /// 종료 신호까지 폴링. 샘플러 큐가 닫혀도 반환
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(interval_ms = self.poll_interval.as_millis() as u64, "포커스 감시 시작");

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut current: Option<SurfaceId> = None;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let next = match self.poll().await {
                        Ok(next) => next,
                        Err(e) => {
                            // 조회 실패는 상태 변화로 보지 않는다
                            warn!("포커스 조회 실패: {e}");
                            continue;
                        }
                    };

                    if let Some(event) = transition(current.as_ref(), next.as_ref()) {
                        debug!(?event, "포커스 변화");
                        if let Err(e) = self.handle.send(event).await {
                            warn!("샘플러 큐 닫힘, 포커스 감시 종료: {e}");
                            break;
                        }
                    }
                    current = next;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("포커스 감시 종료");
    }

    async fn poll(&self) -> Result<Option<SurfaceId>, CoreError> {
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || source.focused())
            .await
            .map_err(|e| CoreError::Internal(format!("포커스 조회 태스크 실패: {e}")))?
    }
}
