//! # Replica Router
//!
//! A primary/replica routing layer for databases connected by asynchronous
//! replication.
//!
//! ## Features
//!
//! - **Read/Write Split** - Writes go to the primary, ordinary reads go to a replica
//! - **Replication Clocks** - Reads that must observe a write are served by a replica that has replayed it, or by the primary
//! - **Scoped Directives** - Nestable `with_master`, `with_slave` and `with_consistency` scopes per session
//! - **Circuit Breaker** - Fails fast with `PrimaryUnavailable` while the primary is down; replicas keep serving reads
//! - **Async/Await** - Built on Tokio; the backend driver is plugged in through the [`Connector`] trait
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! replica-router = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## Basic Usage
//!
//! ```rust,ignore
//! use replica_router::{Endpoint, Router, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RouterConfig::builder(Endpoint::from_uri("mysql://primary:3306/app")?)
//!         .with_replica(Endpoint::from_uri("mysql://replica-1:3306/app")?)
//!         .build();
//!
//!     // `MyConnector` implements `Connector` for the database driver in use.
//!     let router = Router::connect(config, MyConnector::default()).await?;
//!     let mut session = router.session();
//!
//!     // Goes to a replica
//!     let users = session.select_all("SELECT * FROM users").await?;
//!
//!     // Goes to the primary and advances the session clock
//!     session.insert("INSERT INTO users (name) VALUES ('bob')").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Consistency Scopes
//!
//! ```rust,ignore
//! let clock = session.current_clock().cloned();
//!
//! let clock = other_session
//!     .with_consistency(clock, |s| Box::pin(async move {
//!         // Served by a replica only if it has replayed `clock`
//!         s.select_all("SELECT * FROM users").await?;
//!         Ok(())
//!     }))
//!     .await?;
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`RouterResult`]:
//!
//! ```rust,ignore
//! match session.insert("INSERT INTO t VALUES (1)").await {
//!     Ok(id) => println!("inserted {:?}", id),
//!     Err(RouterError::PrimaryUnavailable(msg)) => eprintln!("read-only mode: {}", msg),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```
//!
//! ## Modules
//!
//! - [`router`] - Router, session, clock, circuit breaker and backend traits
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod router;

// Re-exports for convenience
pub use router::{
    Router, RouterConfig, RouterConfigBuilder, RouterMetrics,
    Session, Scope,
    Clock, Directive, ExecutionContext,
    CircuitBreaker, BreakerConfig, BreakerState,
    ReplicaSelector, SelectionPolicy,
    Connector, Connection, Operation, Outcome, ExecResult,
    Endpoint, ReplicationQueries, Role,
    Record, Value,
    RouterError, RouterResult, BackendError, BackendResult,
};

/// Config alias for convenience
pub type Config = RouterConfig;
