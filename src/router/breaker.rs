//! Circuit Breaker
//!
//! 프라이머리 장애 시 반복 호출을 막는 서킷 브레이커
//!
//! ```text
//! Closed ──(failure_count >= threshold)──▶ Open
//! Open ──(timeout 경과 후 조회)──▶ HalfOpen
//! HalfOpen ──(success)──▶ Closed
//! HalfOpen ──(failure)──▶ Open
//! ```
//!
//! `Open`에서 `HalfOpen`으로의 전이는 [`CircuitBreaker::is_tripped`] 조회가 일으킵니다.
//! `HalfOpen`에서는 프로브 하나만 트립되지 않은 것으로 보고되고, 프로브 결과가
//! 기록될 때까지 나머지 조회는 트립된 것으로 보고됩니다.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// ============================================================================
// BreakerState - 브레이커 상태
// ============================================================================

/// 브레이커 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BreakerState {
    /// 정상 (초기 상태)
    #[default]
    Closed,
    /// 차단
    Open,
    /// 복구 프로브 허용
    HalfOpen,
}

impl BreakerState {
    /// 상태 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// BreakerConfig - 브레이커 설정
// ============================================================================

/// 서킷 브레이커 설정
///
/// | 필드 | 기본값 | 설명 |
/// |------|--------|------|
/// | `failure_threshold` | 5 | 차단까지의 실패 횟수 |
/// | `timeout` | 30초 | 차단 후 프로브 허용까지의 시간 |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// 차단까지의 실패 횟수
    pub failure_threshold: u32,
    /// 차단 유지 시간
    pub timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

impl BreakerConfig {
    /// 새 설정 생성
    pub fn new(failure_threshold: u32, timeout: Duration) -> Self {
        Self {
            failure_threshold,
            timeout,
        }
    }
}

/// 호출 허용 판정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// `Closed`: 통과
    Allowed,
    /// `HalfOpen`: 이 호출이 프로브
    Trial,
    /// 트립됨
    Rejected,
}

/// 상태 전이 관찰자
pub type TransitionObserver = Arc<dyn Fn(BreakerState) + Send + Sync>;

#[derive(Debug, Default)]
struct Inner {
    state: BreakerState,
    failure_count: u32,
    opened_at: Option<Instant>,
    /// `HalfOpen`에서 프로브가 나가 있는지 여부
    trial_in_flight: bool,
}

// ============================================================================
// CircuitBreaker - 서킷 브레이커
// ============================================================================

/// 서킷 브레이커
///
/// 라우터 인스턴스당 하나이며 모든 세션이 공유합니다.
/// 상태 전이는 내부 뮤텍스로 직렬화됩니다.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
    observer: Option<TransitionObserver>,
}

impl CircuitBreaker {
    /// 새 브레이커 생성
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
            observer: None,
        }
    }

    /// 상태 전이 관찰자 설정
    pub fn with_observer(mut self, observer: impl Fn(BreakerState) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// 브레이커 설정
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// 현재 상태
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// 누적 실패 횟수
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// 트립 여부 조회
    ///
    /// `Open` 상태에서 타임아웃이 지났으면 먼저 `HalfOpen`으로 전이합니다.
    pub fn is_tripped(&self) -> bool {
        self.is_tripped_at(Instant::now())
    }

    /// 실패 기록
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now())
    }

    /// 성공 기록
    ///
    /// `HalfOpen`에서만 `Closed`로 전이합니다. `Open`은 타임아웃으로만 벗어납니다.
    pub fn record_success(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            if inner.state != BreakerState::HalfOpen {
                None
            } else {
                inner.failure_count = 0;
                inner.opened_at = None;
                inner.trial_in_flight = false;
                inner.state = BreakerState::Closed;
                Some(BreakerState::Closed)
            }
        };

        self.notify(transition);
    }

    /// 프로브 슬롯 반납
    ///
    /// 프로브가 성공도 실패도 기록하지 않고 끝났을 때(구문 에러, 취소) 다음 호출이
    /// 다시 프로브가 되게 합니다. `HalfOpen`이 아니면 아무 일도 하지 않습니다.
    pub fn release_trial(&self) {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    pub(crate) fn is_tripped_at(&self, now: Instant) -> bool {
        self.admit_at(now) == Admission::Rejected
    }

    /// 호출 허용 여부 판정
    pub(crate) fn admit(&self) -> Admission {
        self.admit_at(Instant::now())
    }

    pub(crate) fn admit_at(&self, now: Instant) -> Admission {
        let (admission, transition) = {
            let mut inner = self.inner.lock();
            let mut transition = None;

            if inner.state == BreakerState::Open {
                let elapsed = inner
                    .opened_at
                    .map(|opened_at| now.saturating_duration_since(opened_at))
                    .unwrap_or_default();
                if elapsed >= self.config.timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = false;
                    transition = Some(BreakerState::HalfOpen);
                }
            }

            let admission = match inner.state {
                BreakerState::Closed => Admission::Allowed,
                BreakerState::Open => Admission::Rejected,
                BreakerState::HalfOpen if inner.trial_in_flight => Admission::Rejected,
                BreakerState::HalfOpen => {
                    inner.trial_in_flight = true;
                    Admission::Trial
                }
            };
            (admission, transition)
        };

        self.notify(transition);
        admission
    }

    pub(crate) fn record_failure_at(&self, now: Instant) {
        let transition = {
            let mut inner = self.inner.lock();
            inner.failure_count = inner.failure_count.saturating_add(1);
            inner.trial_in_flight = false;

            if inner.state != BreakerState::Open
                && inner.failure_count >= self.config.failure_threshold
            {
                inner.opened_at = Some(now);
                inner.state = BreakerState::Open;
                Some(BreakerState::Open)
            } else {
                None
            }
        };

        self.notify(transition);
    }

    fn notify(&self, transition: Option<BreakerState>) {
        if let Some(state) = transition {
            tracing::warn!(state = %state, "circuit is now {}", state);
            if let Some(observer) = &self.observer {
                observer(state);
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .field("trial_in_flight", &inner.trial_in_flight)
            .field("config", &self.config)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
