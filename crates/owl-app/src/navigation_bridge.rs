//! 탐색 이벤트 브리지.
//!
//! 브라우저 확장의 네이티브 메시징 호스트가 한 줄에 JSON 메시지 하나씩 보낸다.
//!
//! ```text
//! {"surface": 4711, "url": "https://example.com/a", "event": "completed"}
//! {"surface": "4711", "event": "closed"}
//! ```
//!
//! `completed`는 URL 힌트를 등록한 뒤 `NavigationCompleted`를 보내고,
//! `closed`는 힌트만 해제한다. 힌트가 먼저 등록되어야 샘플러가
//! 강제 캡처 직전에 신뢰 도메인 여부를 판정할 수 있다.

use std::net::SocketAddr;
use std::sync::Arc;

use owl_core::error::CoreError;
use owl_core::models::surface::SurfaceId;
use owl_core::ports::capture::UrlHintSink;
use owl_vision::sampler::SamplerHandle;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 서피스 식별자: 창 ID 숫자 또는 문자열
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SurfaceRef {
    Numeric(u32),
    Text(String),
}

impl From<SurfaceRef> for SurfaceId {
    fn from(value: SurfaceRef) -> Self {
        match value {
            SurfaceRef::Numeric(id) => SurfaceId::from(id),
            SurfaceRef::Text(id) => SurfaceId::new(id),
        }
    }
}

/// 메시지 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationKind {
    /// 페이지 로드 완료
    #[default]
    Completed,
    /// 탭/창 닫힘
    Closed,
}

/// 브리지 메시지 1건
#[derive(Debug, Clone, Deserialize)]
pub struct NavigationMessage {
    surface: SurfaceRef,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    event: NavigationKind,
}

impl NavigationMessage {
    pub fn surface(&self) -> SurfaceId {
        self.surface.clone().into()
    }
}

/// 탐색 이벤트 브리지
pub struct NavigationBridge {
    hints: Arc<dyn UrlHintSink>,
    handle: SamplerHandle,
}

impl NavigationBridge {
    pub fn new(hints: Arc<dyn UrlHintSink>, handle: SamplerHandle) -> Self {
        Self { hints, handle }
    }

    /// 메시지 1건 반영. 샘플러 큐가 닫혔으면 에러
    pub async fn apply(&self, message: NavigationMessage) -> Result<(), CoreError> {
        let surface = message.surface();
        match message.event {
            NavigationKind::Completed => {
                let url = message.url.filter(|u| !u.trim().is_empty());
                debug!(%surface, url = url.as_deref().unwrap_or("-"), "탐색 완료");
                self.hints.set_url_hint(&surface, url);
                self.handle.navigation_completed(surface).await
            }
            NavigationKind::Closed => {
                debug!(%surface, "서피스 닫힘");
                self.hints.set_url_hint(&surface, None);
                Ok(())
            }
        }
    }

    /// 줄 단위 JSON 스트림 처리. EOF, 종료 신호, 샘플러 큐 종료 시 반환.
    /// 파싱 실패한 줄은 경고 후 건너뛴다.
    pub async fn run_reader<R>(&self, reader: R, mut shutdown_rx: watch::Receiver<bool>)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line,
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("탐색 메시지 읽기 실패: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let message = match serde_json::from_str::<NavigationMessage>(&line) {
                Ok(message) => message,
                Err(e) => {
                    warn!("잘못된 탐색 메시지 무시: {e}");
                    continue;
                }
            };
            if let Err(e) = self.apply(message).await {
                warn!("샘플러 큐 닫힘, 탐색 브리지 종료: {e}");
                break;
            }
        }
    }

    /// 표준 입력에서 메시지 수신.
    /// 진행 중인 stdin 읽기는 취소되지 않아 런타임 종료가 입력 종료까지 늦어질 수 있다.
    pub async fn run_stdin(self: Arc<Self>, shutdown_rx: watch::Receiver<bool>) {
        info!("탐색 브리지: 표준 입력 대기");
        self.run_reader(BufReader::new(tokio::io::stdin()), shutdown_rx)
            .await;
        info!("탐색 브리지 (표준 입력) 종료");
    }

    /// TCP 수신. 연결마다 별도 태스크로 처리한다
    pub async fn serve(
        self: Arc<Self>,
        addr: SocketAddr,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), CoreError> {
        let listener = TcpListener::bind(addr).await?;
        info!("탐색 브리지 수신 시작: {}", listener.local_addr()?);
        self.accept_loop(listener, &mut shutdown_rx).await;
        info!("탐색 브리지 종료");
        Ok(())
    }

    async fn accept_loop(
        self: &Arc<Self>,
        listener: TcpListener,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "탐색 브리지 연결");
                        let bridge = Arc::clone(self);
                        let rx = shutdown_rx.clone();
                        tokio::spawn(async move {
                            bridge.run_reader(BufReader::new(stream), rx).await;
                        });
                    }
                    Err(e) => warn!("탐색 브리지 연결 수락 실패: {e}"),
                },
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
