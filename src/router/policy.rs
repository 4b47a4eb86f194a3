//! 레플리카 선택 정책
//!
//! 호출마다 레플리카 하나를 고릅니다. 참조 투명하지 않으므로 같은 스코프 안의
//! 두 호출이 서로 다른 레플리카를 받을 수 있습니다.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// 선택 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// 균등 랜덤 (기본값)
    #[default]
    Random,
    /// 라운드 로빈
    RoundRobin,
}

/// 레플리카 선택기
#[derive(Debug)]
pub struct ReplicaSelector {
    /// 선택 정책
    policy: SelectionPolicy,
    /// 라운드 로빈 인덱스
    round_robin_index: AtomicUsize,
}

impl ReplicaSelector {
    /// 새 선택기 생성
    pub fn new(policy: SelectionPolicy) -> Self {
        Self {
            policy,
            round_robin_index: AtomicUsize::new(0),
        }
    }

    /// 랜덤 선택기
    pub fn random() -> Self {
        Self::new(SelectionPolicy::Random)
    }

    /// 라운드 로빈 선택기
    pub fn round_robin() -> Self {
        Self::new(SelectionPolicy::RoundRobin)
    }

    /// `count`개 레플리카 중 하나의 인덱스 선택
    pub fn select(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }

        match self.policy {
            SelectionPolicy::Random => Some(rand::thread_rng().gen_range(0..count)),
            SelectionPolicy::RoundRobin => {
                let index = self.round_robin_index.fetch_add(1, Ordering::Relaxed);
                Some(index % count)
            }
        }
    }

    /// 현재 정책 조회
    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }
}

impl Default for ReplicaSelector {
    fn default() -> Self {
        Self::random()
    }
}
