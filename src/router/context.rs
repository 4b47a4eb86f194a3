//! Execution Context
//!
//! 세션별 라우팅 지시 스택
//!
//! 스코프에 들어갈 때 프레임을 push하고 나올 때 pop합니다 (LIFO).
//! 스택 맨 위의 지시가 읽기 라우팅을 결정하며, `Pending` 지시는
//! 클럭 비교에 결정을 맡깁니다.

use std::fmt;

use super::clock::Clock;

// ============================================================================
// Directive - 라우팅 지시
// ============================================================================

/// 라우팅 지시 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// 프라이머리 강제
    Master,
    /// 레플리카 강제
    Slave,
    /// 주어진 클럭 이상을 재생한 백엔드로 라우팅
    Pending(Clock),
}

impl Directive {
    /// 지시 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Slave => "slave",
            Self::Pending(_) => "pending",
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(clock) => write!(f, "pending({})", clock),
            other => f.write_str(other.as_str()),
        }
    }
}

/// 스코프 진입 시점의 스택 깊이
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScopeMark {
    directives: usize,
    clocks: usize,
}

// ============================================================================
// ExecutionContext - 실행 컨텍스트
// ============================================================================

/// 세션별 실행 컨텍스트
///
/// 동시에 실행되는 세션끼리 공유하면 안 됩니다.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// 지시 스택
    directives: Vec<Directive>,
    /// `Pending` 지시가 요청한 일관성 목표 클럭 스택
    clocks: Vec<Clock>,
    /// 가장 최근에 확정된 일관성 클럭
    current_clock: Option<Clock>,
}

impl ExecutionContext {
    /// 새 컨텍스트 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 지시 스택 깊이
    pub fn depth(&self) -> usize {
        self.directives.len()
    }

    /// 스택 맨 위 지시
    pub fn top(&self) -> Option<&Directive> {
        self.directives.last()
    }

    /// 가장 안쪽 일관성 목표 클럭
    pub fn consistency_target(&self) -> Option<&Clock> {
        self.clocks.last()
    }

    /// 현재 일관성 클럭
    pub fn current_clock(&self) -> Option<&Clock> {
        self.current_clock.as_ref()
    }

    /// 지시 목록 (바깥쪽부터)
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub(crate) fn mark(&self) -> ScopeMark {
        ScopeMark {
            directives: self.directives.len(),
            clocks: self.clocks.len(),
        }
    }

    pub(crate) fn push(&mut self, directive: Directive) -> ScopeMark {
        let mark = self.mark();
        if let Directive::Pending(clock) = &directive {
            self.clocks.push(clock.clone());
        }
        self.directives.push(directive);
        mark
    }

    /// 스코프 진입 전 상태로 복원
    pub(crate) fn restore(&mut self, mark: ScopeMark) {
        self.directives.truncate(mark.directives);
        self.clocks.truncate(mark.clocks);
    }

    /// 열린 모든 프레임을 `Master`로 고정
    ///
    /// 쓰기 직후의 읽기가 아직 복제되지 않은 레플리카로 가지 않도록 합니다.
    pub(crate) fn pin_to_master(&mut self) {
        for directive in &mut self.directives {
            *directive = Directive::Master;
        }
    }

    /// 현재 클럭을 단조 증가 방식으로 갱신
    pub(crate) fn advance_clock(&mut self, clock: Clock) -> &Clock {
        let advanced = match self.current_clock.take() {
            Some(current) if current >= clock => current,
            _ => clock,
        };
        self.current_clock.insert(advanced)
    }

    /// 모든 상태 초기화
    pub fn reset(&mut self) {
        self.directives.clear();
        self.clocks.clear();
        self.current_clock = None;
    }
}

// ============================================================================
// Tests
// ============================================================================
