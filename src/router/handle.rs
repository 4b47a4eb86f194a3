//! Backend Handle
//!
//! 백엔드 하나에 대한 지연 생성 연결 슬롯
//!
//! 연결은 처음 사용할 때 만들어지며, 연결 장애가 감지되면 버려져서
//! 다음 사용 시 다시 만들어집니다.

use std::fmt;

use parking_lot::Mutex;

use super::backend::{Connection, Connector, Operation, Outcome};
use super::clock::Clock;
use super::config::Endpoint;
use super::error::{BackendError, BackendResult};

// ============================================================================
// Role - 백엔드 역할
// ============================================================================

/// 백엔드 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// 프라이머리
    Primary,
    /// 레플리카 (설정 순서 인덱스)
    Replica(usize),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Replica(index) => write!(f, "replica[{}]", index),
        }
    }
}

/// 백엔드 호출 실패
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Failure {
    /// 연결 장애 (연결 실패 포함). 슬롯은 이미 비워졌습니다.
    Connectivity(BackendError),
    /// 그 외 구문 에러
    Statement(BackendError),
}

// ============================================================================
// BackendHandle - 백엔드 핸들
// ============================================================================

/// 백엔드 핸들
pub(crate) struct BackendHandle<C: Connector> {
    /// 엔드포인트
    endpoint: Endpoint,
    /// 역할
    role: Role,
    /// 연결 슬롯
    slot: tokio::sync::Mutex<Option<C::Connection>>,
    /// 이 백엔드가 재생했다고 확인된 가장 높은 클럭
    last_seen: Mutex<Option<Clock>>,
}

impl<C: Connector> BackendHandle<C> {
    pub(crate) fn new(endpoint: Endpoint, role: Role) -> Self {
        Self {
            endpoint,
            role,
            slot: tokio::sync::Mutex::new(None),
            last_seen: Mutex::new(None),
        }
    }

    pub(crate) fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub(crate) fn role(&self) -> Role {
        self.role
    }

    /// 연결을 보장하고 연산 실행
    pub(crate) async fn run(&self, connector: &C, op: &Operation) -> Result<Outcome, Failure> {
        let mut slot = self.slot.lock().await;

        if slot.is_none() {
            tracing::debug!(backend = %self.role, endpoint = %self.endpoint, "connecting");
            let conn = connector
                .connect(&self.endpoint)
                .await
                .map_err(Failure::Connectivity)?;
            *slot = Some(conn);
        }

        let Some(conn) = slot.as_mut() else {
            return Err(Failure::Connectivity(BackendError::without_code("connection slot is empty")));
        };

        match op.run(conn).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if connector.is_connection_error(&e) => {
                *slot = None;
                Err(Failure::Connectivity(e))
            }
            Err(e) => Err(Failure::Statement(e)),
        }
    }

    /// 연결을 미리 생성
    pub(crate) async fn ensure_connected(&self, connector: &C) -> BackendResult<()> {
        let mut slot = self.slot.lock().await;
        if slot.is_none() {
            *slot = Some(connector.connect(&self.endpoint).await?);
        }
        Ok(())
    }

    /// 연결 생성 여부
    pub(crate) async fn is_instantiated(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// 열린 트랜잭션 수 (연결이 없으면 0)
    pub(crate) async fn open_transactions(&self) -> usize {
        self.slot
            .lock()
            .await
            .as_ref()
            .map(|conn| conn.open_transactions())
            .unwrap_or(0)
    }

    /// 연결 활성 여부 (연결이 없으면 `None`)
    pub(crate) async fn is_active(&self) -> Option<bool> {
        let mut slot = self.slot.lock().await;
        match slot.as_mut() {
            Some(conn) => Some(conn.is_active().await),
            None => None,
        }
    }

    pub(crate) async fn reconnect(&self) -> BackendResult<()> {
        match self.slot.lock().await.as_mut() {
            Some(conn) => conn.reconnect().await,
            None => Ok(()),
        }
    }

    /// 연결 종료 후 슬롯 비우기
    pub(crate) async fn disconnect(&self) -> BackendResult<()> {
        match self.slot.lock().await.take() {
            Some(mut conn) => conn.disconnect().await,
            None => Ok(()),
        }
    }

    pub(crate) async fn reset(&self) -> BackendResult<()> {
        match self.slot.lock().await.as_mut() {
            Some(conn) => conn.reset().await,
            None => Ok(()),
        }
    }

    pub(crate) async fn clear_query_cache(&self) {
        if let Some(conn) = self.slot.lock().await.as_mut() {
            conn.clear_query_cache();
        }
    }

    /// 기억해 둔 클럭
    pub(crate) fn last_seen(&self) -> Option<Clock> {
        self.last_seen.lock().clone()
    }

    /// 관측한 클럭 기록 (감소하지 않음)
    pub(crate) fn observe(&self, clock: &Clock) {
        let mut last_seen = self.last_seen.lock();
        match last_seen.as_ref() {
            Some(seen) if seen >= clock => {}
            _ => *last_seen = Some(clock.clone()),
        }
    }
}

impl<C: Connector> fmt::Debug for BackendHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendHandle")
            .field("role", &self.role)
            .field("endpoint", &self.endpoint)
            .field("last_seen", &self.last_seen())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
