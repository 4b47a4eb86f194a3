//! Router Error Types
//!
//! 라우터 에러 정의

use thiserror::Error;

// ============================================================================
// RouterError - 라우터 에러
// ============================================================================

/// 라우터 에러
#[derive(Error, Debug)]
pub enum RouterError {
    /// 잘못된 인자 (예: `with_consistency(None, ..)`)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 프라이머리 사용 불가 (서킷 브레이커 개방 또는 연결 장애)
    #[error("Primary unavailable: {0}")]
    PrimaryUnavailable(String),

    /// 백엔드 구문 에러 (원본 에러를 그대로 전달)
    #[error("Statement error: {0}")]
    Statement(#[from] BackendError),

    /// 지원하지 않는 연산
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 타입 변환 에러
    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// 내부 에러
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RouterError {
    /// 잘못된 인자 에러 생성
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// 프라이머리 사용 불가 에러 생성
    pub fn primary_unavailable(msg: impl Into<String>) -> Self {
        Self::PrimaryUnavailable(msg.into())
    }

    /// 지원하지 않는 연산 에러 생성
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 타입 변환 에러 생성
    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    /// 내부 에러 생성
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 상위 계층에서 재시도 가능한지 여부
    ///
    /// 라우터 내부에서는 재시도하지 않습니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PrimaryUnavailable(_))
    }

    /// 클라이언트 에러 여부
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::Configuration(_)
                | Self::UnsupportedOperation(_)
                | Self::TypeConversion(_)
        )
    }

    /// 프라이머리 사용 불가 여부
    pub fn is_primary_unavailable(&self) -> bool {
        matches!(self, Self::PrimaryUnavailable(_))
    }

    /// 백엔드 에러 참조
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::Statement(err) => Some(err),
            _ => None,
        }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 라우터 결과 타입
pub type RouterResult<T> = Result<T, RouterError>;

/// 백엔드 결과 타입
pub type BackendResult<T> = Result<T, BackendError>;

// ============================================================================
// BackendError - 백엔드 에러
// ============================================================================

/// 백엔드(드라이버)가 보고한 에러
///
/// 코드의 의미는 드라이버마다 다릅니다. 연결 장애 여부는
/// [`Connector::is_connection_error`](super::Connector::is_connection_error)
/// 만이 판정합니다.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BackendError {
    /// 에러 코드
    pub code: i32,
    /// 에러 메시지
    pub message: String,
}

impl BackendError {
    /// 새 에러 생성
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// 코드 없는 에러 생성
    pub fn without_code(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }
}


// ============================================================================
// Tests
// ============================================================================
