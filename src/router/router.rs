//! Router Core
//!
//! 프라이머리/레플리카 라우터
//!
//! 설정, 백엔드 핸들, 서킷 브레이커, 레플리카 선택기를 소유하며 모든 세션이 공유합니다.
//! 세션별 라우팅 상태는 [`Session`]이 가집니다.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::backend::{Connector, ExecResult, Operation, Outcome};
use super::breaker::{Admission, BreakerState, CircuitBreaker};
use super::clock::Clock;
use super::config::{Endpoint, RouterConfig};
use super::context::{Directive, ExecutionContext};
use super::error::{BackendError, RouterError, RouterResult};
use super::handle::{BackendHandle, Failure, Role};
use super::policy::ReplicaSelector;
use super::record::Record;
use super::session::Session;

// ============================================================================
// RouterMetrics - 라우터 메트릭
// ============================================================================

/// 라우터 메트릭
#[derive(Debug, Clone, Default)]
pub struct RouterMetrics {
    /// 프라이머리로 간 읽기 수
    pub primary_reads: u64,
    /// 레플리카로 간 읽기 수
    pub replica_reads: u64,
    /// 쓰기 수
    pub writes: u64,
    /// 스키마 연산 수
    pub schema_ops: u64,
    /// 레플리카 일관성 판정 수
    pub consistency_checks: u64,
    /// 상태 조회 없이 기억된 클럭으로 판정한 수
    pub memo_hits: u64,
    /// `PrimaryUnavailable`로 실패한 호출 수
    pub primary_unavailable: u64,
    /// 현재 브레이커 상태
    pub breaker_state: BreakerState,
}

#[derive(Debug, Default)]
struct Counters {
    primary_reads: AtomicU64,
    replica_reads: AtomicU64,
    writes: AtomicU64,
    schema_ops: AtomicU64,
    consistency_checks: AtomicU64,
    memo_hits: AtomicU64,
    primary_unavailable: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct TrialSlot<'a> {
    breaker: Option<&'a CircuitBreaker>,
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        if let Some(breaker) = self.breaker {
            breaker.release_trial();
        }
    }
}

// ============================================================================
// Router - 라우터
// ============================================================================

/// 프라이머리/레플리카 라우터
pub struct Router<C: Connector> {
    /// 설정
    config: RouterConfig,
    /// 연결 생성기
    connector: C,
    /// 프라이머리 핸들
    primary: BackendHandle<C>,
    /// 레플리카 핸들 (설정 순서)
    replicas: Vec<BackendHandle<C>>,
    /// 프라이머리 서킷 브레이커
    breaker: CircuitBreaker,
    /// 레플리카 선택기
    selector: ReplicaSelector,
    /// 카운터
    counters: Counters,
}

impl<C: Connector> Router<C> {
    /// 새 라우터 생성
    ///
    /// 연결은 처음 사용할 때 만들어집니다.
    pub fn new(config: RouterConfig, connector: C) -> RouterResult<Self> {
        config.validate()?;

        let primary = BackendHandle::new(config.primary.clone(), Role::Primary);
        let replicas = config
            .replicas
            .iter()
            .enumerate()
            .map(|(index, endpoint)| BackendHandle::new(endpoint.clone(), Role::Replica(index)))
            .collect();

        Ok(Self {
            breaker: CircuitBreaker::new(config.breaker.clone()),
            selector: ReplicaSelector::new(config.selection_policy),
            config,
            connector,
            primary,
            replicas,
            counters: Counters::default(),
        })
    }

    /// 라우터 생성 후 공유 핸들 반환
    ///
    /// `eager_load_connections`가 켜져 있으면 모든 연결을 미리 엽니다.
    pub async fn connect(config: RouterConfig, connector: C) -> RouterResult<Arc<Self>> {
        let router = Arc::new(Self::new(config, connector)?);
        if router.config.eager_load_connections {
            router.connect_all().await?;
        }
        Ok(router)
    }

    /// 브레이커 상태 전이 관찰자 설정
    pub fn with_breaker_observer(mut self, observer: impl Fn(BreakerState) + Send + Sync + 'static) -> Self {
        let breaker = std::mem::take(&mut self.breaker);
        self.breaker = breaker.with_observer(observer);
        self
    }

    /// 새 세션 생성
    pub fn session(self: &Arc<Self>) -> Session<C> {
        Session::new(Arc::clone(self))
    }

    /// 라우터 설정
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// 서킷 브레이커
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// 레플리카 수
    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// 백엔드 엔드포인트
    pub fn endpoint(&self, role: Role) -> Option<&Endpoint> {
        match role {
            Role::Primary => Some(self.primary.endpoint()),
            Role::Replica(index) => self.replicas.get(index).map(BackendHandle::endpoint),
        }
    }

    /// 백엔드 연결이 생성되어 있는지 여부
    pub async fn is_connected(&self, role: Role) -> bool {
        match role {
            Role::Primary => self.primary.is_instantiated().await,
            Role::Replica(index) => match self.replicas.get(index) {
                Some(handle) => handle.is_instantiated().await,
                None => false,
            },
        }
    }

    /// 레플리카가 재생했다고 확인된 가장 높은 클럭
    pub fn last_seen_replica_clock(&self, index: usize) -> Option<Clock> {
        self.replicas.get(index).and_then(BackendHandle::last_seen)
    }

    /// 메트릭 조회
    pub fn metrics(&self) -> RouterMetrics {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        RouterMetrics {
            primary_reads: load(&self.counters.primary_reads),
            replica_reads: load(&self.counters.replica_reads),
            writes: load(&self.counters.writes),
            schema_ops: load(&self.counters.schema_ops),
            consistency_checks: load(&self.counters.consistency_checks),
            memo_hits: load(&self.counters.memo_hits),
            primary_unavailable: load(&self.counters.primary_unavailable),
            breaker_state: self.breaker.state(),
        }
    }

    // ========================================================================
    // 백엔드 호출
    // ========================================================================

    /// 프라이머리에서 연산 실행
    ///
    /// 브레이커가 트립되어 있으면 백엔드를 호출하지 않고 실패합니다.
    /// `HalfOpen`에서는 프로브 하나만 통과하고 나머지는 같은 방식으로 실패합니다.
    /// 연결 장애는 브레이커에 기록되고 `PrimaryUnavailable`로 바뀝니다.
    pub async fn on_primary(&self, op: &Operation) -> RouterResult<Outcome> {
        let admission = self.breaker.admit();
        if admission == Admission::Rejected {
            Counters::bump(&self.counters.primary_unavailable);
            return Err(RouterError::primary_unavailable(format!(
                "circuit is open for {}",
                self.primary.endpoint()
            )));
        }
        // 구문 에러나 취소로 끝난 프로브는 drop 시 슬롯을 반납합니다.
        let _trial = TrialSlot {
            breaker: (admission == Admission::Trial).then_some(&self.breaker),
        };

        match self.primary.run(&self.connector, op).await {
            Ok(outcome) => {
                self.breaker.record_success();
                Ok(outcome)
            }
            Err(Failure::Connectivity(e)) => Err(self.primary_failed(e)),
            Err(Failure::Statement(e)) => Err(RouterError::Statement(e)),
        }
    }

    /// 레플리카에서 연산 실행
    ///
    /// 브레이커를 거치지 않으며 모든 백엔드 에러를 그대로 전달합니다.
    pub async fn on_replica(&self, index: usize, op: &Operation) -> RouterResult<Outcome> {
        let handle = self
            .replicas
            .get(index)
            .ok_or_else(|| RouterError::invalid_argument(format!("No replica at index {}", index)))?;

        handle.run(&self.connector, op).await.map_err(|failure| match failure {
            Failure::Connectivity(e) | Failure::Statement(e) => RouterError::Statement(e),
        })
    }

    /// 지정한 백엔드에서 연산 실행
    pub async fn on_backend(&self, role: Role, op: &Operation) -> RouterResult<Outcome> {
        match role {
            Role::Primary => self.on_primary(op).await,
            Role::Replica(index) => self.on_replica(index, op).await,
        }
    }

    fn primary_failed(&self, error: BackendError) -> RouterError {
        self.breaker.record_failure();
        Counters::bump(&self.counters.primary_unavailable);
        tracing::warn!(
            endpoint = %self.primary.endpoint(),
            error = %error,
            "primary connection failed"
        );
        RouterError::primary_unavailable(error.to_string())
    }

    // ========================================================================
    // 복제 클럭
    // ========================================================================

    /// 프라이머리의 현재 복제 위치
    ///
    /// 상태를 읽을 수 없으면 `infinity`, 프라이머리를 사용할 수 없으면 `zero`입니다.
    pub async fn primary_clock(&self) -> Clock {
        let queries = &self.config.replication;
        let op = Operation::query(queries.primary_status.as_str());

        match self.on_primary(&op).await.and_then(Outcome::into_rows) {
            Ok(rows) => rows
                .first()
                .and_then(|row| {
                    Clock::from_status(row, &queries.primary_file_column, &queries.primary_position_column)
                })
                .unwrap_or_else(Clock::infinity),
            Err(e) if e.is_primary_unavailable() => Clock::zero(),
            Err(e) => {
                tracing::debug!(error = %e, "primary status unavailable");
                Clock::infinity()
            }
        }
    }

    /// 레플리카가 재생한 복제 위치
    ///
    /// 상태 행이 없으면 `zero`, 조회 자체가 실패하면 `None`입니다.
    pub async fn replica_clock(&self, index: usize) -> Option<Clock> {
        let queries = &self.config.replication;
        let op = Operation::query(queries.replica_status.as_str());

        match self.on_replica(index, &op).await.and_then(Outcome::into_rows) {
            Ok(rows) => Some(
                rows.first()
                    .and_then(|row| {
                        Clock::from_status(row, &queries.replica_file_column, &queries.replica_position_column)
                    })
                    .unwrap_or_else(Clock::zero),
            ),
            Err(e) => {
                tracing::debug!(replica = index, error = %e, "replica status unavailable");
                None
            }
        }
    }

    /// 레플리카가 `required` 이상을 재생했는지 판정
    pub(crate) async fn slave_consistent(&self, index: usize, required: &Clock) -> bool {
        let Some(handle) = self.replicas.get(index) else {
            return false;
        };
        Counters::bump(&self.counters.consistency_checks);

        if handle.last_seen().is_some_and(|seen| seen >= *required) {
            Counters::bump(&self.counters.memo_hits);
            return true;
        }

        match self.replica_clock(index).await {
            Some(clock) => {
                handle.observe(&clock);
                tracing::debug!(replica = index, clock = %clock, required = %required, "replica clock");
                clock >= *required
            }
            None => false,
        }
    }

    /// 프라이머리에 열린 트랜잭션 수
    pub async fn primary_open_transactions(&self) -> usize {
        self.primary.open_transactions().await
    }

    // ========================================================================
    // 라우팅
    // ========================================================================

    fn select_replica(&self) -> RouterResult<usize> {
        self.selector
            .select(self.replicas.len())
            .ok_or_else(|| RouterError::configuration("No replicas configured"))
    }

    /// 읽기를 처리할 백엔드 결정
    ///
    /// 1. 프라이머리에 열린 트랜잭션이 있으면 프라이머리
    /// 2. 스택 맨 위가 `Master`/`Slave`이면 그 백엔드
    /// 3. `Pending(clock)`이면 선택된 레플리카가 `clock`을 재생했을 때만 레플리카
    /// 4. 지시가 없으면 레플리카
    pub async fn connection_for_read(&self, context: &ExecutionContext) -> RouterResult<Role> {
        if self.primary_open_transactions().await > 0 {
            return Ok(Role::Primary);
        }

        match context.top() {
            Some(Directive::Master) => Ok(Role::Primary),
            Some(Directive::Slave) | None => self.select_replica().map(Role::Replica),
            Some(Directive::Pending(required)) => {
                let index = self.select_replica()?;
                if self.slave_consistent(index, required).await {
                    Ok(Role::Replica(index))
                } else {
                    Ok(Role::Primary)
                }
            }
        }
    }

    pub(crate) async fn read(&self, context: &ExecutionContext, sql: &str) -> RouterResult<Vec<Record>> {
        let role = self.connection_for_read(context).await?;
        tracing::debug!(backend = %role, sql, "read");

        match role {
            Role::Primary => Counters::bump(&self.counters.primary_reads),
            Role::Replica(_) => Counters::bump(&self.counters.replica_reads),
        }

        self.on_backend(role, &Operation::query(sql)).await?.into_rows()
    }

    pub(crate) async fn write(&self, op: &Operation) -> RouterResult<Outcome> {
        Counters::bump(&self.counters.writes);
        tracing::debug!(op = op.kind(), "write");
        self.on_primary(op).await
    }

    pub(crate) async fn schema(&self, sql: &str) -> RouterResult<ExecResult> {
        Counters::bump(&self.counters.schema_ops);
        tracing::debug!(sql, "schema");
        self.on_primary(&Operation::execute(sql)).await?.into_exec()
    }

    pub(crate) async fn unsupported(&self, name: &str, sql: &str) -> RouterResult<ExecResult> {
        tracing::warn!(operation = name, "unsupported operation");
        if self.config.reject_unsupported {
            return Err(RouterError::unsupported(name));
        }
        self.on_primary(&Operation::execute(sql)).await?.into_exec()
    }

    // ========================================================================
    // 연결 수명 주기
    // ========================================================================

    fn handles(&self) -> impl Iterator<Item = &BackendHandle<C>> {
        std::iter::once(&self.primary).chain(self.replicas.iter())
    }

    /// 모든 백엔드 연결을 미리 생성
    pub async fn connect_all(&self) -> RouterResult<()> {
        if let Err(e) = self.primary.ensure_connected(&self.connector).await {
            return Err(self.primary_failed(e));
        }
        for replica in &self.replicas {
            replica.ensure_connected(&self.connector).await?;
        }
        Ok(())
    }

    /// 생성된 모든 연결 재연결
    pub async fn reconnect(&self) -> RouterResult<()> {
        let mut first_error = None;
        for handle in self.handles() {
            if let Err(e) = handle.reconnect().await {
                tracing::warn!(backend = %handle.role(), error = %e, "reconnect failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), |e| Err(e.into()))
    }

    /// 생성된 모든 연결 종료
    ///
    /// 다음 사용 시 연결이 다시 만들어집니다.
    pub async fn disconnect(&self) -> RouterResult<()> {
        let mut first_error = None;
        for handle in self.handles() {
            if let Err(e) = handle.disconnect().await {
                tracing::warn!(backend = %handle.role(), error = %e, "disconnect failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), |e| Err(e.into()))
    }

    /// 생성된 모든 연결의 세션 상태 초기화
    pub async fn reset(&self) -> RouterResult<()> {
        let mut first_error = None;
        for handle in self.handles() {
            if let Err(e) = handle.reset().await {
                tracing::warn!(backend = %handle.role(), error = %e, "reset failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), |e| Err(e.into()))
    }

    /// 생성된 모든 연결의 쿼리 캐시 비우기
    pub async fn clear_query_cache(&self) {
        for handle in self.handles() {
            handle.clear_query_cache().await;
        }
    }

    /// 연결 상태 확인
    ///
    /// `disable_connection_test`가 켜져 있으면 백엔드를 확인하지 않고 `true`입니다.
    pub async fn health_check(&self) -> bool {
        if self.config.disable_connection_test {
            return true;
        }

        for handle in self.handles() {
            if handle.is_active().await == Some(false) {
                tracing::debug!(backend = %handle.role(), "connection is not active");
                return false;
            }
        }
        true
    }
}

impl<C: Connector> fmt::Debug for Router<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("primary", &self.primary)
            .field("replicas", &self.replicas)
            .field("breaker", &self.breaker)
            .field("selection_policy", &self.selector.policy())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use parking_lot::Mutex;

    use crate::router::mock::{self, MockConnector, MockScript, PRIMARY};

    fn setup(replicas: usize) -> (MockScript, Arc<Router<MockConnector>>) {
        let script = MockScript::new();
        let router = mock::router(&script, mock::config(replicas));
        (script, router)
    }

    #[test]
    fn test_router_requires_replica() {
        let result = Router::new(mock::config(0), MockConnector::new(MockScript::new()));
        assert!(matches!(result, Err(RouterError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_connect_is_lazy_by_default() {
        let script = MockScript::new();
        let _router = Router::connect(mock::config(2), MockConnector::new(script.clone()))
            .await
            .unwrap();

        assert_eq!(script.connect_count(PRIMARY), 0);
        assert_eq!(script.connect_count("replica-1"), 0);
    }

    #[tokio::test]
    async fn test_connect_eager_loads_all() {
        let script = MockScript::new();
        let mut config = mock::config(2);
        config.eager_load_connections = true;

        Router::connect(config, MockConnector::new(script.clone())).await.unwrap();

        assert_eq!(script.connect_count(PRIMARY), 1);
        assert_eq!(script.connect_count("replica-1"), 1);
        assert_eq!(script.connect_count("replica-2"), 1);
    }

    #[tokio::test]
    async fn test_is_connected_tracks_slot() {
        let (script, router) = setup(2);
        assert!(!router.is_connected(Role::Primary).await);

        router.on_replica(1, &Operation::query("SELECT 1")).await.unwrap();
        assert!(router.is_connected(Role::Replica(1)).await);
        assert!(!router.is_connected(Role::Replica(0)).await);
        assert!(!router.is_connected(Role::Replica(9)).await);

        router.disconnect().await.unwrap();
        assert!(!router.is_connected(Role::Replica(1)).await);
        assert_eq!(script.disconnect_count("replica-2"), 1);
    }

    #[tokio::test]
    async fn test_eager_load_primary_failure_is_unavailable() {
        let script = MockScript::new();
        script.set_down(PRIMARY, true);
        let mut config = mock::config(1);
        config.eager_load_connections = true;

        let err = Router::connect(config, MockConnector::new(script.clone())).await.unwrap_err();
        assert!(err.is_primary_unavailable());
    }

    #[tokio::test]
    async fn test_on_primary_statement_error_passes_through() {
        let (script, router) = setup(1);

        script.fail_next(PRIMARY, BackendError::new(1062, "Duplicate entry"));
        let err = router.on_primary(&Operation::execute("INSERT 1")).await.unwrap_err();

        assert_eq!(err.backend_error(), Some(&BackendError::new(1062, "Duplicate entry")));
        assert_eq!(router.breaker().failure_count(), 0);
    }

    #[tokio::test]
    async fn test_on_primary_connection_error_trips_breaker() {
        let script = MockScript::new();
        let mut config = mock::config(1);
        config.breaker.failure_threshold = 2;
        let router = mock::router(&script, config);

        for _ in 0..2 {
            script.fail_next(PRIMARY, BackendError::new(2006, "MySQL server has gone away"));
            let err = router.on_primary(&Operation::execute("INSERT 1")).await.unwrap_err();
            assert!(err.is_primary_unavailable());
        }
        assert_eq!(router.breaker().state(), BreakerState::Open);

        // 트립된 동안에는 백엔드를 호출하지 않습니다.
        let before = script.statements(PRIMARY).len();
        let err = router.on_primary(&Operation::execute("INSERT 2")).await.unwrap_err();
        assert!(err.is_primary_unavailable());
        assert_eq!(script.statements(PRIMARY).len(), before);
        assert_eq!(router.metrics().primary_unavailable, 3);
    }

    #[tokio::test]
    async fn test_on_primary_discards_connection_after_failure() {
        let (script, router) = setup(1);

        router.on_primary(&Operation::query("SELECT 1")).await.unwrap();
        script.fail_next(PRIMARY, BackendError::new(2013, "Lost connection"));
        router.on_primary(&Operation::query("SELECT 1")).await.unwrap_err();
        router.on_primary(&Operation::query("SELECT 1")).await.unwrap();

        assert_eq!(script.connect_count(PRIMARY), 2);
    }

    #[tokio::test]
    async fn test_replica_errors_skip_breaker() {
        let (script, router) = setup(1);

        script.fail_next("replica-1", BackendError::new(2006, "MySQL server has gone away"));
        let err = router.on_replica(0, &Operation::query("SELECT 1")).await.unwrap_err();

        assert!(matches!(err, RouterError::Statement(_)));
        assert_eq!(router.breaker().failure_count(), 0);
        assert!(router.on_replica(5, &Operation::query("SELECT 1")).await.is_err());
    }

    #[tokio::test]
    async fn test_primary_clock_fallbacks() {
        let (script, router) = setup(1);

        script.set_primary_clock(PRIMARY, &Clock::new("mysql-bin.000003", 120));
        assert_eq!(router.primary_clock().await, Clock::new("mysql-bin.000003", 120));

        // 행이 없으면 infinity
        script.clear_status(PRIMARY);
        assert!(router.primary_clock().await.is_infinity());

        // 구문 에러도 infinity
        script.fail_next(PRIMARY, BackendError::new(1227, "Access denied"));
        assert!(router.primary_clock().await.is_infinity());

        // 프라이머리 장애는 zero
        script.fail_next(PRIMARY, BackendError::new(2006, "MySQL server has gone away"));
        assert!(router.primary_clock().await.is_zero());
    }

    #[tokio::test]
    async fn test_replica_clock_fallbacks() {
        let (script, router) = setup(1);

        script.set_replica_clock("replica-1", &Clock::new("mysql-bin.000003", 99));
        assert_eq!(router.replica_clock(0).await, Some(Clock::new("mysql-bin.000003", 99)));

        script.clear_status("replica-1");
        assert_eq!(router.replica_clock(0).await, Some(Clock::zero()));

        script.fail_status("replica-1", BackendError::new(1227, "Access denied"));
        assert_eq!(router.replica_clock(0).await, None);
    }

    #[tokio::test]
    async fn test_slave_consistent_uses_memo() {
        let (script, router) = setup(1);
        script.set_replica_clock("replica-1", &Clock::new("bin.1", 50));

        assert!(router.slave_consistent(0, &Clock::new("bin.1", 40)).await);
        assert_eq!(router.last_seen_replica_clock(0), Some(Clock::new("bin.1", 50)));

        // 이미 본 클럭보다 낮은 요구는 상태 조회 없이 판정합니다.
        let status_queries = script.statements("replica-1").len();
        assert!(router.slave_consistent(0, &Clock::new("bin.1", 45)).await);
        assert_eq!(script.statements("replica-1").len(), status_queries);

        // 더 높은 요구는 다시 조회합니다.
        assert!(!router.slave_consistent(0, &Clock::new("bin.1", 60)).await);
        assert_eq!(script.statements("replica-1").len(), status_queries + 1);

        let metrics = router.metrics();
        assert_eq!(metrics.consistency_checks, 3);
        assert_eq!(metrics.memo_hits, 1);
    }

    #[tokio::test]
    async fn test_memo_never_decreases() {
        let (script, router) = setup(1);

        script.set_replica_clock("replica-1", &Clock::new("bin.2", 10));
        assert!(!router.slave_consistent(0, &Clock::new("bin.3", 0)).await);

        script.set_replica_clock("replica-1", &Clock::new("bin.1", 999));
        assert!(!router.slave_consistent(0, &Clock::new("bin.3", 0)).await);
        assert_eq!(router.last_seen_replica_clock(0), Some(Clock::new("bin.2", 10)));
    }

    #[tokio::test]
    async fn test_connection_for_read_directives() {
        let (_script, router) = setup(1);
        let mut context = ExecutionContext::new();

        assert_eq!(router.connection_for_read(&context).await.unwrap(), Role::Replica(0));

        context.push(Directive::Master);
        assert_eq!(router.connection_for_read(&context).await.unwrap(), Role::Primary);

        context.push(Directive::Slave);
        assert_eq!(router.connection_for_read(&context).await.unwrap(), Role::Replica(0));
    }

    #[tokio::test]
    async fn test_open_transaction_wins_over_slave_directive() {
        let (_script, router) = setup(1);
        let mut context = ExecutionContext::new();
        context.push(Directive::Slave);

        router.on_primary(&Operation::Begin).await.unwrap();
        assert_eq!(router.primary_open_transactions().await, 1);
        assert_eq!(router.connection_for_read(&context).await.unwrap(), Role::Primary);

        router.on_primary(&Operation::Commit).await.unwrap();
        assert_eq!(router.connection_for_read(&context).await.unwrap(), Role::Replica(0));
    }

    #[tokio::test]
    async fn test_unsupported_operation() {
        let (script, router) = setup(1);

        let result = router.unsupported("optimize_table", "OPTIMIZE TABLE users").await.unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(script.served_by("OPTIMIZE TABLE users"), vec![PRIMARY]);

        let mut config = mock::config(1);
        config.reject_unsupported = true;
        let strict = mock::router(&script, config);
        let err = strict.unsupported("optimize_table", "OPTIMIZE TABLE users").await.unwrap_err();
        assert!(matches!(err, RouterError::UnsupportedOperation(_)));
    }

    #[tokio::test]
    async fn test_lifecycle_fans_out_to_instantiated() {
        let (script, router) = setup(2);

        router.on_primary(&Operation::query("SELECT 1")).await.unwrap();
        router.on_replica(1, &Operation::query("SELECT 1")).await.unwrap();

        router.reconnect().await.unwrap();
        router.reset().await.unwrap();
        router.clear_query_cache().await;

        for host in [PRIMARY, "replica-2"] {
            assert_eq!(script.reconnect_count(host), 1);
            assert_eq!(script.reset_count(host), 1);
            assert_eq!(script.cache_clear_count(host), 1);
        }
        assert_eq!(script.reconnect_count("replica-1"), 0);

        router.disconnect().await.unwrap();
        assert_eq!(script.disconnect_count(PRIMARY), 1);
        assert_eq!(script.disconnect_count("replica-2"), 1);
        assert_eq!(script.disconnect_count("replica-1"), 0);
    }

    #[tokio::test]
    async fn test_lifecycle_attempts_all_and_returns_first_error() {
        let (script, router) = setup(1);

        router.on_primary(&Operation::query("SELECT 1")).await.unwrap();
        router.on_replica(0, &Operation::query("SELECT 1")).await.unwrap();
        script.set_down(PRIMARY, true);

        let err = router.reset().await.unwrap_err();
        assert_eq!(err.backend_error().map(|e| e.code), Some(2006));
        assert_eq!(script.reset_count("replica-1"), 1);
    }

    #[tokio::test]
    async fn test_health_check() {
        let (script, router) = setup(1);
        assert!(router.health_check().await);

        router.on_primary(&Operation::query("SELECT 1")).await.unwrap();
        assert!(router.health_check().await);

        script.set_down(PRIMARY, true);
        assert!(!router.health_check().await);

        let mut config = mock::config(1);
        config.disable_connection_test = true;
        let untested = mock::router(&script, config);
        untested.on_replica(0, &Operation::query("SELECT 1")).await.unwrap();
        script.set_down("replica-1", true);
        assert!(untested.health_check().await);
    }

    #[tokio::test]
    async fn test_statement_error_during_trial_releases_slot() {
        let script = MockScript::new();
        let mut config = mock::config(1);
        config.breaker.failure_threshold = 1;
        config.breaker.timeout = Duration::from_millis(20);
        let router = mock::router(&script, config);

        script.fail_next(PRIMARY, BackendError::new(2006, "MySQL server has gone away"));
        router.on_primary(&Operation::execute("INSERT 1")).await.unwrap_err();
        tokio::time::sleep(Duration::from_millis(30)).await;

        script.fail_next(PRIMARY, BackendError::new(1062, "Duplicate entry"));
        let err = router.on_primary(&Operation::execute("INSERT 2")).await.unwrap_err();
        assert!(matches!(err, RouterError::Statement(_)));
        assert_eq!(router.breaker().state(), BreakerState::HalfOpen);

        // 다음 호출이 새 프로브가 되어 브레이커를 닫습니다.
        router.on_primary(&Operation::execute("INSERT 3")).await.unwrap();
        assert_eq!(router.breaker().state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_breaker_observer_sees_primary_outage() {
        let script = MockScript::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut config = mock::config(1);
        config.breaker.failure_threshold = 1;
        config.breaker.timeout = Duration::from_millis(20);
        let router = Router::new(config, MockConnector::new(script.clone()))
            .unwrap()
            .with_breaker_observer(move |state| sink.lock().push(state));

        script.set_down(PRIMARY, true);
        router.on_primary(&Operation::query("SELECT 1")).await.unwrap_err();
        tokio::time::sleep(Duration::from_millis(30)).await;
        script.set_down(PRIMARY, false);
        router.on_primary(&Operation::query("SELECT 1")).await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec![BreakerState::Open, BreakerState::HalfOpen, BreakerState::Closed]
        );
    }
}
