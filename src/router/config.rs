//! Router Configuration
//!
//! 라우터 설정 및 엔드포인트 정의

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::breaker::BreakerConfig;
use super::error::{RouterError, RouterResult};
use super::mysql;
use super::policy::SelectionPolicy;

/// MySQL 기본 포트
pub const DEFAULT_PORT: u16 = 3306;

// ============================================================================
// Endpoint - 백엔드 주소
// ============================================================================

/// 백엔드 엔드포인트
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// 호스트
    pub host: String,
    /// 포트
    #[serde(default = "default_port")]
    pub port: u16,
    /// 데이터베이스 이름
    #[serde(default)]
    pub database: Option<String>,
    /// 로그용 이름
    #[serde(default)]
    pub name: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Endpoint {
    /// 새 엔드포인트 생성
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            database: None,
            name: None,
        }
    }

    /// 데이터베이스 설정
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// 이름 설정
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// URI에서 파싱
    ///
    /// `mysql://host[:port][/database]` 형식을 받습니다. 스킴은 생략할 수 있습니다.
    pub fn from_uri(uri: &str) -> RouterResult<Self> {
        let rest = uri.trim_start_matches("mysql://");
        let (address, database) = match rest.split_once('/') {
            Some((address, db)) if !db.is_empty() => (address, Some(db)),
            Some((address, _)) => (address, None),
            None => (rest, None),
        };

        if address.is_empty() {
            return Err(RouterError::configuration(format!("Missing host in '{}'", uri)));
        }

        let parts: Vec<&str> = address.split(':').collect();
        let endpoint = match parts.as_slice() {
            [host] => Self::new(*host, DEFAULT_PORT),
            [host, port] => {
                let port = port
                    .parse()
                    .map_err(|_| RouterError::configuration(format!("Invalid port in '{}'", uri)))?;
                Self::new(*host, port)
            }
            _ => return Err(RouterError::configuration(format!("Invalid address '{}'", uri))),
        };

        Ok(match database {
            Some(db) => endpoint.with_database(db),
            None => endpoint,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            return f.write_str(name);
        }
        write!(f, "{}:{}", self.host, self.port)?;
        if let Some(db) = &self.database {
            write!(f, "/{}", db)?;
        }
        Ok(())
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

// ============================================================================
// ReplicationQueries - 복제 상태 조회 전략
// ============================================================================

/// 복제 상태 조회 전략
///
/// 백엔드마다 상태 쿼리와 컬럼 이름이 다르므로 설정으로 주입합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationQueries {
    /// 프라이머리 상태 쿼리
    pub primary_status: String,
    /// 프라이머리 로그 파일 컬럼
    pub primary_file_column: String,
    /// 프라이머리 위치 컬럼
    pub primary_position_column: String,
    /// 레플리카 상태 쿼리
    pub replica_status: String,
    /// 레플리카가 재생한 로그 파일 컬럼
    pub replica_file_column: String,
    /// 레플리카가 재생한 위치 컬럼
    pub replica_position_column: String,
}

impl ReplicationQueries {
    /// MySQL 바이너리 로그 기반 조회
    pub fn mysql() -> Self {
        Self {
            primary_status: mysql::PRIMARY_STATUS_QUERY.to_string(),
            primary_file_column: "File".to_string(),
            primary_position_column: "Position".to_string(),
            replica_status: mysql::REPLICA_STATUS_QUERY.to_string(),
            replica_file_column: "Relay_Master_Log_File".to_string(),
            replica_position_column: "Exec_Master_Log_Pos".to_string(),
        }
    }
}

impl Default for ReplicationQueries {
    fn default() -> Self {
        Self::mysql()
    }
}

// ============================================================================
// RouterConfig - 라우터 설정
// ============================================================================

/// 라우터 설정
///
/// | 필드 | 기본값 | 설명 |
/// |------|--------|------|
/// | `disable_connection_test` | false | `health_check`를 항상 성공으로 처리 |
/// | `eager_load_connections` | false | 생성 시 모든 연결을 미리 엶 |
/// | `reject_unsupported` | false | 지원하지 않는 연산을 프라이머리로 보내지 않고 거부 |
/// | `selection_policy` | Random | 레플리카 선택 정책 |
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// 프라이머리
    pub primary: Endpoint,
    /// 레플리카 목록
    pub replicas: Vec<Endpoint>,
    /// 연결 테스트 비활성화
    pub disable_connection_test: bool,
    /// 연결 즉시 생성
    pub eager_load_connections: bool,
    /// 지원하지 않는 연산 거부
    pub reject_unsupported: bool,
    /// 레플리카 선택 정책
    pub selection_policy: SelectionPolicy,
    /// 서킷 브레이커 설정
    pub breaker: BreakerConfig,
    /// 복제 상태 조회 전략
    pub replication: ReplicationQueries,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            primary: Endpoint::default(),
            replicas: Vec::new(),
            disable_connection_test: false,
            eager_load_connections: false,
            reject_unsupported: false,
            selection_policy: SelectionPolicy::default(),
            breaker: BreakerConfig::default(),
            replication: ReplicationQueries::default(),
        }
    }
}

impl RouterConfig {
    /// 새 설정 생성
    pub fn new(primary: Endpoint, replicas: Vec<Endpoint>) -> Self {
        Self {
            primary,
            replicas,
            ..Default::default()
        }
    }

    /// 빌더 시작
    pub fn builder(primary: Endpoint) -> RouterConfigBuilder {
        RouterConfigBuilder {
            config: Self::new(primary, Vec::new()),
        }
    }

    /// 설정 검증
    pub fn validate(&self) -> RouterResult<()> {
        if self.replicas.is_empty() {
            return Err(RouterError::configuration("At least one replica is required"));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(RouterError::configuration("Breaker failure_threshold must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// RouterConfigBuilder - 설정 빌더
// ============================================================================

/// 라우터 설정 빌더
#[derive(Debug, Clone)]
pub struct RouterConfigBuilder {
    config: RouterConfig,
}

impl RouterConfigBuilder {
    /// 레플리카 추가
    pub fn with_replica(mut self, replica: Endpoint) -> Self {
        self.config.replicas.push(replica);
        self
    }

    /// 레플리카 목록 설정
    pub fn with_replicas(mut self, replicas: impl IntoIterator<Item = Endpoint>) -> Self {
        self.config.replicas = replicas.into_iter().collect();
        self
    }

    /// 연결 테스트 비활성화 설정
    pub fn with_disable_connection_test(mut self, disable: bool) -> Self {
        self.config.disable_connection_test = disable;
        self
    }

    /// 연결 즉시 생성 설정
    pub fn with_eager_load_connections(mut self, eager: bool) -> Self {
        self.config.eager_load_connections = eager;
        self
    }

    /// 지원하지 않는 연산 거부 설정
    pub fn with_reject_unsupported(mut self, reject: bool) -> Self {
        self.config.reject_unsupported = reject;
        self
    }

    /// 레플리카 선택 정책 설정
    pub fn with_selection_policy(mut self, policy: SelectionPolicy) -> Self {
        self.config.selection_policy = policy;
        self
    }

    /// 서킷 브레이커 설정
    pub fn with_breaker(mut self, failure_threshold: u32, timeout: Duration) -> Self {
        self.config.breaker = BreakerConfig::new(failure_threshold, timeout);
        self
    }

    /// 복제 상태 조회 전략 설정
    pub fn with_replication(mut self, replication: ReplicationQueries) -> Self {
        self.config.replication = replication;
        self
    }

    /// 빌드
    pub fn build(self) -> RouterConfig {
        self.config
    }
}

// ============================================================================
// Tests
// ============================================================================
