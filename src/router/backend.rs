//! Backend Capability
//!
//! 라우터가 백엔드에 요구하는 연산의 닫힌 집합
//!
//! 실제 드라이버는 [`Connector`]와 [`Connection`]을 구현해 주입합니다.
//! 라우터는 [`Operation`]만을 백엔드로 보내며, 백엔드 고유 에러 코드는
//! [`Connector::is_connection_error`]에서만 해석합니다.

use std::fmt;
use std::future::Future;

use super::config::Endpoint;
use super::error::{BackendError, BackendResult, RouterError, RouterResult};
use super::mysql;
use super::record::Record;

// ============================================================================
// ExecResult - 실행 결과
// ============================================================================

/// 쓰기 실행 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// 영향받은 행 수
    pub rows_affected: u64,
    /// 마지막 삽입 ID
    pub last_insert_id: Option<i64>,
}

impl ExecResult {
    /// 새 결과 생성
    pub fn new(rows_affected: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }
}

// ============================================================================
// Connection / Connector - 백엔드 트레이트
// ============================================================================

/// 단일 백엔드 연결
pub trait Connection: Send + 'static {
    /// 결과 행을 돌려주는 쿼리 실행
    fn query(&mut self, sql: &str) -> impl Future<Output = BackendResult<Vec<Record>>> + Send;

    /// 쓰기 구문 실행
    fn execute(&mut self, sql: &str) -> impl Future<Output = BackendResult<ExecResult>> + Send;

    /// 트랜잭션 시작
    fn begin_transaction(&mut self) -> impl Future<Output = BackendResult<()>> + Send;

    /// 트랜잭션 커밋
    fn commit_transaction(&mut self) -> impl Future<Output = BackendResult<()>> + Send;

    /// 트랜잭션 롤백
    fn rollback_transaction(&mut self) -> impl Future<Output = BackendResult<()>> + Send;

    /// 열린 트랜잭션 수
    fn open_transactions(&self) -> usize;

    /// 연결 활성 여부
    fn is_active(&mut self) -> impl Future<Output = bool> + Send;

    /// 재연결
    fn reconnect(&mut self) -> impl Future<Output = BackendResult<()>> + Send;

    /// 연결 종료
    fn disconnect(&mut self) -> impl Future<Output = BackendResult<()>> + Send;

    /// 세션 상태 초기화
    fn reset(&mut self) -> impl Future<Output = BackendResult<()>> + Send;

    /// 쿼리 캐시 비우기
    fn clear_query_cache(&mut self) {}
}

/// 백엔드 연결 생성기
pub trait Connector: Send + Sync + 'static {
    /// 연결 타입
    type Connection: Connection;

    /// 엔드포인트에 연결
    fn connect(&self, endpoint: &Endpoint) -> impl Future<Output = BackendResult<Self::Connection>> + Send;

    /// 연결 장애 에러 여부
    ///
    /// 기본 구현은 MySQL 클라이언트 에러 코드를 사용합니다.
    fn is_connection_error(&self, error: &BackendError) -> bool {
        mysql::is_connection_error(error)
    }
}

// ============================================================================
// Operation / Outcome - 백엔드 연산
// ============================================================================

/// 백엔드로 보내는 연산
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// 읽기 쿼리
    Query(String),
    /// 쓰기 구문
    Execute(String),
    /// 트랜잭션 시작
    Begin,
    /// 트랜잭션 커밋
    Commit,
    /// 트랜잭션 롤백
    Rollback,
}

impl Operation {
    /// 읽기 쿼리 생성
    pub fn query(sql: impl Into<String>) -> Self {
        Self::Query(sql.into())
    }

    /// 쓰기 구문 생성
    pub fn execute(sql: impl Into<String>) -> Self {
        Self::Execute(sql.into())
    }

    /// 연산 이름
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Query(_) => "query",
            Self::Execute(_) => "execute",
            Self::Begin => "begin",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
        }
    }

    /// 연결에서 실행
    pub(crate) async fn run<T: Connection>(&self, conn: &mut T) -> BackendResult<Outcome> {
        match self {
            Self::Query(sql) => conn.query(sql).await.map(Outcome::Rows),
            Self::Execute(sql) => conn.execute(sql).await.map(Outcome::Executed),
            Self::Begin => conn.begin_transaction().await.map(|_| Outcome::Done),
            Self::Commit => conn.commit_transaction().await.map(|_| Outcome::Done),
            Self::Rollback => conn.rollback_transaction().await.map(|_| Outcome::Done),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(sql) | Self::Execute(sql) => f.write_str(sql),
            other => f.write_str(&other.kind().to_uppercase()),
        }
    }
}

/// 연산 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 결과 행
    Rows(Vec<Record>),
    /// 쓰기 결과
    Executed(ExecResult),
    /// 결과 없음
    Done,
}

impl Outcome {
    /// 결과 행으로 변환
    pub fn into_rows(self) -> RouterResult<Vec<Record>> {
        match self {
            Self::Rows(rows) => Ok(rows),
            other => Err(RouterError::internal(format!("Expected rows, got {:?}", other))),
        }
    }

    /// 쓰기 결과로 변환
    pub fn into_exec(self) -> RouterResult<ExecResult> {
        match self {
            Self::Executed(result) => Ok(result),
            other => Err(RouterError::internal(format!("Expected exec result, got {:?}", other))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
