//! Router Module
//!
//! 프라이머리/레플리카 라우팅 엔진
//!
//! # 구성
//!
//! - 복제 클럭 (Clock)
//! - 서킷 브레이커 (CircuitBreaker, BreakerConfig)
//! - 레플리카 선택 (ReplicaSelector, SelectionPolicy)
//! - 실행 컨텍스트 (ExecutionContext, Directive)
//! - 라우터와 세션 (Router, Session, Scope)
//! - 백엔드 트레이트 (Connector, Connection)
//!
//! # Example
//!
//! ```ignore
//! use replica_router::router::{Endpoint, Router, RouterConfig};
//!
//! let config = RouterConfig::builder(Endpoint::from_uri("mysql://primary:3306/app")?)
//!     .with_replica(Endpoint::from_uri("mysql://replica-1:3306/app")?)
//!     .with_replica(Endpoint::from_uri("mysql://replica-2:3306/app")?)
//!     .build();
//!
//! let router = Router::connect(config, MyConnector::new()).await?;
//! let mut session = router.session();
//!
//! // 쓰기는 프라이머리로, 세션 클럭이 프라이머리 위치로 앞당겨집니다.
//! session.insert("INSERT INTO users (name) VALUES ('alice')").await?;
//! let clock = session.current_clock().cloned();
//!
//! // 다른 요청에서 같은 클럭을 요구하면 따라잡은 레플리카나 프라이머리에서 읽습니다.
//! let mut other = router.session();
//! other
//!     .with_consistency(clock, |s| Box::pin(async move {
//!         s.select_all("SELECT * FROM users").await?;
//!         Ok(())
//!     }))
//!     .await?;
//! ```

pub mod mysql;
mod backend;
mod breaker;
mod clock;
mod config;
mod context;
mod error;
mod handle;
mod policy;
mod record;
mod router;
mod session;
mod types;

#[cfg(test)]
pub(crate) mod mock;

// Re-exports
pub use backend::{Connection, Connector, ExecResult, Operation, Outcome};
pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker, TransitionObserver};
pub use clock::Clock;
pub use config::{Endpoint, ReplicationQueries, RouterConfig, RouterConfigBuilder, DEFAULT_PORT};
pub use context::{Directive, ExecutionContext};
pub use error::{BackendError, BackendResult, RouterError, RouterResult};
pub use handle::Role;
pub use policy::{ReplicaSelector, SelectionPolicy};
pub use record::Record;
pub use router::{Router, RouterMetrics};
pub use session::{CommitCallback, RollbackCallback, Scope, Session};
pub use types::Value;
