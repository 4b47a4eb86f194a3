//! MySQL 전용 판정 로직
//!
//! 연결 장애 에러 코드와 복제 상태 쿼리

use super::error::BackendError;

/// 프라이머리 바이너리 로그 위치 조회
pub const PRIMARY_STATUS_QUERY: &str = "SHOW MASTER STATUS";

/// 레플리카 재생 위치 조회
pub const REPLICA_STATUS_QUERY: &str = "SHOW SLAVE STATUS";

/// 연결 장애로 분류되는 (코드, 메시지 접두사) 목록
pub const CONNECTION_ERRORS: &[(i32, &str)] = &[
    // CR_CONNECTION_ERROR
    (2002, "query: not connected"),
    // CR_CONN_HOST_ERROR
    (2003, "Can't connect to MySQL server on"),
    // CR_SERVER_GONE_ERROR
    (2006, "MySQL server has gone away"),
    // CR_SERVER_LOST
    (2013, "Lost connection to MySQL server during query"),
    // 드라이버가 닫힌 연결에 대해 보고
    (-1, "closed MySQL connection"),
];

/// 연결 장애 여부
///
/// 코드가 일치하거나, 코드가 없는 에러의 메시지가 알려진 접두사로 시작하면 장애로 봅니다.
pub fn is_connection_error(error: &BackendError) -> bool {
    CONNECTION_ERRORS.iter().any(|(code, description)| {
        error.code == *code || (error.code == 0 && error.message.starts_with(description))
    })
}
