//! Session
//!
//! 논리 세션별 라우팅 상태와 호출 표면
//!
//! 세션은 자신의 [`ExecutionContext`]와 트랜잭션 콜백 큐를 가집니다.
//! 동시에 실행되는 호출 흐름마다 별도의 세션을 사용해야 합니다.
//!
//! # 스코프
//!
//! ```rust,ignore
//! let mut session = router.session();
//!
//! // 클로저 형태
//! let clock = session
//!     .with_consistency(Some(clock), |s| Box::pin(async move {
//!         s.select_all("SELECT * FROM orders").await?;
//!         Ok(())
//!     }))
//!     .await?;
//!
//! // 가드 형태
//! let mut scope = session.master_scope();
//! scope.select_one("SELECT * FROM users WHERE id = 1").await?;
//! drop(scope);
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use super::backend::{Connector, ExecResult, Operation, Outcome};
use super::clock::Clock;
use super::context::{Directive, ExecutionContext, ScopeMark};
use super::error::{RouterError, RouterResult};
use super::record::Record;
use super::router::Router;
use super::types::Value;

/// 커밋 콜백 (커밋 후 일관성 클럭을 받음)
pub type CommitCallback = Box<dyn FnOnce(&Clock) + Send>;

/// 롤백 콜백
pub type RollbackCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Callbacks {
    on_commit: Vec<CommitCallback>,
    on_rollback: Vec<RollbackCallback>,
}

// ============================================================================
// Session - 세션
// ============================================================================

/// 라우팅 세션
pub struct Session<C: Connector> {
    /// 공유 라우터
    router: Arc<Router<C>>,
    /// 실행 컨텍스트
    context: ExecutionContext,
    /// 트랜잭션 콜백
    callbacks: Mutex<Callbacks>,
}

impl<C: Connector> Session<C> {
    pub(crate) fn new(router: Arc<Router<C>>) -> Self {
        Self {
            router,
            context: ExecutionContext::new(),
            callbacks: Mutex::new(Callbacks::default()),
        }
    }

    /// 공유 라우터
    pub fn router(&self) -> &Arc<Router<C>> {
        &self.router
    }

    /// 실행 컨텍스트
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// 현재 일관성 클럭
    pub fn current_clock(&self) -> Option<&Clock> {
        self.context.current_clock()
    }

    /// 지시 스택 깊이
    pub fn depth(&self) -> usize {
        self.context.depth()
    }

    /// 세션 상태 초기화
    ///
    /// 지시 스택, 클럭, 콜백 큐를 모두 비웁니다.
    pub fn reset(&mut self) {
        self.context.reset();
        let callbacks = self.callbacks.get_mut();
        callbacks.on_commit.clear();
        callbacks.on_rollback.clear();
    }

    // ========================================================================
    // 스코프
    // ========================================================================

    fn enter(&mut self, directive: Directive) -> Scope<'_, C> {
        let target = match &directive {
            Directive::Pending(clock) => Some(clock.clone()),
            _ => None,
        };
        let mark = self.context.push(directive);
        Scope {
            session: self,
            mark,
            target,
        }
    }

    /// 프라이머리 강제 스코프
    pub fn master_scope(&mut self) -> Scope<'_, C> {
        self.enter(Directive::Master)
    }

    /// 레플리카 강제 스코프
    pub fn slave_scope(&mut self) -> Scope<'_, C> {
        self.enter(Directive::Slave)
    }

    /// 일관성 스코프
    ///
    /// `clock`이 `None`이면 스택을 건드리지 않고 `InvalidArgument`로 실패합니다.
    pub fn consistency_scope(&mut self, clock: Option<Clock>) -> RouterResult<Scope<'_, C>> {
        let clock = clock.ok_or_else(|| RouterError::invalid_argument("consistency clock is required"))?;
        Ok(self.enter(Directive::Pending(clock)))
    }

    /// 프라이머리에서 `body` 실행
    pub async fn with_master<T, F>(&mut self, body: F) -> RouterResult<T>
    where
        F: for<'s> FnOnce(&'s mut Session<C>) -> BoxFuture<'s, RouterResult<T>>,
    {
        let mut scope = self.master_scope();
        body(&mut *scope).await
    }

    /// 레플리카에서 `body` 실행
    pub async fn with_slave<T, F>(&mut self, body: F) -> RouterResult<T>
    where
        F: for<'s> FnOnce(&'s mut Session<C>) -> BoxFuture<'s, RouterResult<T>>,
    {
        let mut scope = self.slave_scope();
        body(&mut *scope).await
    }

    /// `clock` 이상을 재생한 백엔드에서 `body` 실행
    ///
    /// 스코프를 닫을 때의 일관성 클럭을 반환합니다. 안에서 쓰기가 있었다면
    /// 프라이머리의 쓰기 후 위치로 앞당겨집니다.
    pub async fn with_consistency<F>(&mut self, clock: Option<Clock>, body: F) -> RouterResult<Clock>
    where
        F: for<'s> FnOnce(&'s mut Session<C>) -> BoxFuture<'s, RouterResult<()>>,
    {
        let mut scope = self.consistency_scope(clock)?;
        body(&mut *scope).await?;
        Ok(scope.finish())
    }

    // ========================================================================
    // 읽기
    // ========================================================================

    /// 모든 결과 행
    pub async fn select_all(&self, sql: &str) -> RouterResult<Vec<Record>> {
        self.router.read(&self.context, sql).await
    }

    /// 첫 번째 행
    pub async fn select_one(&self, sql: &str) -> RouterResult<Option<Record>> {
        Ok(self.select_all(sql).await?.into_iter().next())
    }

    /// 값 배열로 된 행들
    pub async fn select_rows(&self, sql: &str) -> RouterResult<Vec<Vec<Value>>> {
        Ok(self
            .select_all(sql)
            .await?
            .into_iter()
            .map(Record::into_values)
            .collect())
    }

    /// 첫 번째 행의 첫 번째 값
    pub async fn select_value(&self, sql: &str) -> RouterResult<Option<Value>> {
        Ok(self
            .select_one(sql)
            .await?
            .and_then(|record| record.into_values().into_iter().next()))
    }

    /// 각 행의 첫 번째 값
    pub async fn select_values(&self, sql: &str) -> RouterResult<Vec<Value>> {
        Ok(self
            .select_all(sql)
            .await?
            .into_iter()
            .filter_map(|record| record.into_values().into_iter().next())
            .collect())
    }

    // ========================================================================
    // 쓰기
    // ========================================================================

    /// 프라이머리에서 쓰기 실행
    ///
    /// 열린 트랜잭션이 없으면 일관성 클럭을 프라이머리 위치로 앞당기고
    /// 열린 모든 스코프를 프라이머리로 고정합니다.
    async fn on_write(&mut self, op: Operation) -> RouterResult<Outcome> {
        let outcome = self.router.write(&op).await?;

        if self.router.primary_open_transactions().await == 0 {
            let clock = self.router.primary_clock().await;
            let current = self.context.advance_clock(clock);
            tracing::debug!(clock = %current, "consistency clock advanced");
            self.context.pin_to_master();
        }

        Ok(outcome)
    }

    /// 삽입 후 마지막 삽입 ID 반환
    pub async fn insert(&mut self, sql: &str) -> RouterResult<Option<i64>> {
        Ok(self.execute(sql).await?.last_insert_id)
    }

    /// 갱신 후 영향받은 행 수 반환
    pub async fn update(&mut self, sql: &str) -> RouterResult<u64> {
        Ok(self.execute(sql).await?.rows_affected)
    }

    /// 삭제 후 영향받은 행 수 반환
    pub async fn delete(&mut self, sql: &str) -> RouterResult<u64> {
        Ok(self.execute(sql).await?.rows_affected)
    }

    /// 임의 구문 실행 (쓰기로 취급)
    pub async fn execute(&mut self, sql: &str) -> RouterResult<ExecResult> {
        self.on_write(Operation::execute(sql)).await?.into_exec()
    }

    /// 스키마 구문 실행
    ///
    /// 항상 프라이머리로 가며 클럭 갱신이나 고정을 하지 않습니다.
    pub async fn execute_schema(&self, sql: &str) -> RouterResult<ExecResult> {
        self.router.schema(sql).await
    }

    /// 라우터가 알지 못하는 연산
    ///
    /// 경고를 남기고 프라이머리에서 실행합니다. `reject_unsupported` 설정 시 거부합니다.
    pub async fn call_unsupported(&self, name: &str, sql: &str) -> RouterResult<ExecResult> {
        self.router.unsupported(name, sql).await
    }

    // ========================================================================
    // 트랜잭션
    // ========================================================================

    /// 트랜잭션 시작
    pub async fn begin_transaction(&mut self) -> RouterResult<()> {
        self.router.on_primary(&Operation::Begin).await.map(|_| ())
    }

    /// 트랜잭션 커밋
    ///
    /// 성공하면 커밋 콜백을 등록 순서대로 호출하고 롤백 콜백은 버립니다.
    pub async fn commit_transaction(&mut self) -> RouterResult<()> {
        self.on_write(Operation::Commit).await?;

        let clock = self.current_clock().cloned().unwrap_or_else(Clock::zero);
        let callbacks = self.callbacks.get_mut();
        callbacks.on_rollback.clear();
        for callback in callbacks.on_commit.drain(..) {
            callback(&clock);
        }
        Ok(())
    }

    /// 트랜잭션 롤백
    ///
    /// 커밋 콜백은 버리고, 성공하면 롤백 콜백을 등록 순서대로 호출합니다.
    pub async fn rollback_transaction(&mut self) -> RouterResult<()> {
        self.callbacks.get_mut().on_commit.clear();
        self.router.on_primary(&Operation::Rollback).await?;

        for callback in self.callbacks.get_mut().on_rollback.drain(..) {
            callback();
        }
        Ok(())
    }

    /// 트랜잭션 안에서 `body` 실행
    ///
    /// `Ok`이면 커밋, `Err`이면 롤백 후 `body`의 에러를 반환합니다.
    pub async fn transaction<T, F>(&mut self, body: F) -> RouterResult<T>
    where
        F: for<'s> FnOnce(&'s mut Session<C>) -> BoxFuture<'s, RouterResult<T>>,
    {
        self.begin_transaction().await?;

        match body(&mut *self).await {
            Ok(value) => {
                self.commit_transaction().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_error) = self.rollback_transaction().await {
                    tracing::warn!(error = %rollback_error, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// 커밋 콜백 등록
    pub fn on_commit(&mut self, callback: impl FnOnce(&Clock) + Send + 'static) {
        self.callbacks.get_mut().on_commit.push(Box::new(callback));
    }

    /// 롤백 콜백 등록
    pub fn on_rollback(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.callbacks.get_mut().on_rollback.push(Box::new(callback));
    }
}

impl<C: Connector> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let callbacks = self.callbacks.lock();
        f.debug_struct("Session")
            .field("context", &self.context)
            .field("on_commit", &callbacks.on_commit.len())
            .field("on_rollback", &callbacks.on_rollback.len())
            .finish()
    }
}

// ============================================================================
// Scope - 스코프 가드
// ============================================================================

/// 스코프 가드
///
/// 살아 있는 동안 지시 프레임을 유지하고, drop될 때 진입 전 상태로 되돌립니다.
/// 에러 반환, 패닉, 퓨처 취소 시에도 스택이 복원됩니다.
pub struct Scope<'a, C: Connector> {
    session: &'a mut Session<C>,
    mark: ScopeMark,
    target: Option<Clock>,
}

impl<C: Connector> Scope<'_, C> {
    /// 스코프를 닫고 일관성 클럭 반환
    ///
    /// 일관성 스코프는 요청 클럭과 세션 클럭 중 큰 값을 세션 클럭으로 확정합니다.
    pub fn finish(mut self) -> Clock {
        if let Some(target) = self.target.take() {
            self.session.context.advance_clock(target);
        }
        self.session.current_clock().cloned().unwrap_or_else(Clock::zero)
    }
}

impl<C: Connector> Deref for Scope<'_, C> {
    type Target = Session<C>;

    fn deref(&self) -> &Session<C> {
        self.session
    }
}

impl<C: Connector> DerefMut for Scope<'_, C> {
    fn deref_mut(&mut self) -> &mut Session<C> {
        self.session
    }
}

impl<C: Connector> Drop for Scope<'_, C> {
    fn drop(&mut self) {
        self.session.context.restore(self.mark);
    }
}

// ============================================================================
// Tests
// ============================================================================
