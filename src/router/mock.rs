//! 테스트용 스크립트 가능한 백엔드
//!
//! 호스트 이름으로 백엔드를 구분하며, 어떤 백엔드가 어떤 구문을 처리했는지 기록합니다.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::backend::{Connection, Connector, ExecResult};
use super::clock::Clock;
use super::config::{Endpoint, RouterConfig};
use super::error::{BackendError, BackendResult};
use super::record::Record;
use super::router::Router;
use super::types::Value;

pub(crate) const PRIMARY: &str = "primary";

#[derive(Debug, Default)]
struct ScriptState {
    log: Vec<(String, String)>,
    down: HashSet<String>,
    failures: HashMap<String, VecDeque<BackendError>>,
    status: HashMap<String, Record>,
    status_errors: HashMap<String, BackendError>,
    delays: HashMap<String, Duration>,
    connects: HashMap<String, usize>,
    disconnects: HashMap<String, usize>,
    reconnects: HashMap<String, usize>,
    resets: HashMap<String, usize>,
    cache_clears: HashMap<String, usize>,
    next_insert_id: i64,
}

/// 공유 스크립트
#[derive(Debug, Clone, Default)]
pub(crate) struct MockScript {
    state: Arc<Mutex<ScriptState>>,
}

impl MockScript {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 백엔드 다운 설정 (연결 실패, 기존 연결의 모든 연산 실패)
    pub(crate) fn set_down(&self, host: &str, down: bool) {
        let mut state = self.state.lock();
        if down {
            state.down.insert(host.to_string());
        } else {
            state.down.remove(host);
        }
    }

    /// 다음 연산 하나를 실패시킴
    pub(crate) fn fail_next(&self, host: &str, error: BackendError) {
        self.state
            .lock()
            .failures
            .entry(host.to_string())
            .or_default()
            .push_back(error);
    }

    pub(crate) fn set_primary_clock(&self, host: &str, clock: &Clock) {
        let row = Record::from_pairs([
            ("File", Value::from(clock.file())),
            ("Position", Value::Integer(clock.position() as i64)),
        ]);
        self.state.lock().status.insert(host.to_string(), row);
    }

    pub(crate) fn set_replica_clock(&self, host: &str, clock: &Clock) {
        let row = Record::from_pairs([
            ("Relay_Master_Log_File", Value::from(clock.file())),
            ("Exec_Master_Log_Pos", Value::from(clock.position().to_string())),
        ]);
        self.state.lock().status.insert(host.to_string(), row);
    }

    /// 호스트의 쿼리와 실행을 지연시킴
    pub(crate) fn set_delay(&self, host: &str, delay: Duration) {
        self.state.lock().delays.insert(host.to_string(), delay);
    }

    async fn pause(&self, host: &str) {
        let delay = self.state.lock().delays.get(host).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// 상태 쿼리가 행을 돌려주지 않게 함
    pub(crate) fn clear_status(&self, host: &str) {
        self.state.lock().status.remove(host);
    }

    /// 상태 쿼리가 계속 실패하게 함
    pub(crate) fn fail_status(&self, host: &str, error: BackendError) {
        self.state.lock().status_errors.insert(host.to_string(), error);
    }

    /// 호스트가 처리한 구문 목록
    pub(crate) fn statements(&self, host: &str) -> Vec<String> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, sql)| sql.clone())
            .collect()
    }

    /// 구문을 처리한 호스트 목록
    pub(crate) fn served_by(&self, sql: &str) -> Vec<String> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|(_, s)| s == sql)
            .map(|(host, _)| host.clone())
            .collect()
    }

    pub(crate) fn connect_count(&self, host: &str) -> usize {
        self.state.lock().connects.get(host).copied().unwrap_or(0)
    }

    pub(crate) fn disconnect_count(&self, host: &str) -> usize {
        self.state.lock().disconnects.get(host).copied().unwrap_or(0)
    }

    pub(crate) fn reconnect_count(&self, host: &str) -> usize {
        self.state.lock().reconnects.get(host).copied().unwrap_or(0)
    }

    pub(crate) fn reset_count(&self, host: &str) -> usize {
        self.state.lock().resets.get(host).copied().unwrap_or(0)
    }

    pub(crate) fn cache_clear_count(&self, host: &str) -> usize {
        self.state.lock().cache_clears.get(host).copied().unwrap_or(0)
    }

    fn record(&self, host: &str, statement: &str) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.log.push((host.to_string(), statement.to_string()));

        if state.down.contains(host) {
            return Err(BackendError::new(2013, "Lost connection to MySQL server during query"));
        }
        match state.failures.get_mut(host).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn bump(counter: &mut HashMap<String, usize>, host: &str) {
        *counter.entry(host.to_string()).or_default() += 1;
    }
}

/// 테스트 커넥터
#[derive(Debug, Clone)]
pub(crate) struct MockConnector {
    script: MockScript,
}

impl MockConnector {
    pub(crate) fn new(script: MockScript) -> Self {
        Self { script }
    }
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self, endpoint: &Endpoint) -> BackendResult<MockConnection> {
        let mut state = self.script.state.lock();
        if state.down.contains(&endpoint.host) {
            return Err(BackendError::new(
                2003,
                format!("Can't connect to MySQL server on '{}'", endpoint.host),
            ));
        }
        MockScript::bump(&mut state.connects, &endpoint.host);

        Ok(MockConnection {
            host: endpoint.host.clone(),
            script: self.script.clone(),
            open_transactions: 0,
        })
    }
}

/// 테스트 연결
#[derive(Debug)]
pub(crate) struct MockConnection {
    host: String,
    script: MockScript,
    open_transactions: usize,
}

impl Connection for MockConnection {
    async fn query(&mut self, sql: &str) -> BackendResult<Vec<Record>> {
        self.script.pause(&self.host).await;
        self.script.record(&self.host, sql)?;

        if sql.starts_with("SHOW ") {
            let state = self.script.state.lock();
            if let Some(error) = state.status_errors.get(&self.host) {
                return Err(error.clone());
            }
            return Ok(state.status.get(&self.host).cloned().into_iter().collect());
        }

        Ok(vec![Record::from_pairs([
            ("backend", self.host.as_str()),
            ("sql", sql),
        ])])
    }

    async fn execute(&mut self, sql: &str) -> BackendResult<ExecResult> {
        self.script.pause(&self.host).await;
        self.script.record(&self.host, sql)?;

        let mut state = self.script.state.lock();
        state.next_insert_id += 1;
        Ok(ExecResult::new(1, Some(state.next_insert_id)))
    }

    async fn begin_transaction(&mut self) -> BackendResult<()> {
        self.script.record(&self.host, "BEGIN")?;
        self.open_transactions += 1;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> BackendResult<()> {
        self.script.record(&self.host, "COMMIT")?;
        self.open_transactions = self.open_transactions.saturating_sub(1);
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> BackendResult<()> {
        self.script.record(&self.host, "ROLLBACK")?;
        self.open_transactions = self.open_transactions.saturating_sub(1);
        Ok(())
    }

    fn open_transactions(&self) -> usize {
        self.open_transactions
    }

    async fn is_active(&mut self) -> bool {
        !self.script.state.lock().down.contains(&self.host)
    }

    async fn reconnect(&mut self) -> BackendResult<()> {
        let mut state = self.script.state.lock();
        MockScript::bump(&mut state.reconnects, &self.host);
        self.open_transactions = 0;
        Ok(())
    }

    async fn disconnect(&mut self) -> BackendResult<()> {
        let mut state = self.script.state.lock();
        MockScript::bump(&mut state.disconnects, &self.host);
        Ok(())
    }

    async fn reset(&mut self) -> BackendResult<()> {
        let mut state = self.script.state.lock();
        MockScript::bump(&mut state.resets, &self.host);
        if state.down.contains(&self.host) {
            return Err(BackendError::new(2006, "MySQL server has gone away"));
        }
        Ok(())
    }

    fn clear_query_cache(&mut self) {
        let mut state = self.script.state.lock();
        MockScript::bump(&mut state.cache_clears, &self.host);
    }
}

/// `primary`와 `replica-1` .. `replica-N`으로 구성된 설정
pub(crate) fn config(replicas: usize) -> RouterConfig {
    RouterConfig::builder(Endpoint::new(PRIMARY, 3306))
        .with_replicas((1..=replicas).map(|i| Endpoint::new(format!("replica-{}", i), 3306)))
        .with_breaker(5, Duration::from_secs(30))
        .build()
}

pub(crate) fn router(script: &MockScript, config: RouterConfig) -> Arc<Router<MockConnector>> {
    Arc::new(Router::new(config, MockConnector::new(script.clone())).unwrap())
}
