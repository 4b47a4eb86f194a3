//! Column Values
//!
//! 결과 행의 컬럼 값
//!
//! MySQL 프로토콜이 구분하는 정도만 구분합니다. `BOOLEAN`은 `TINYINT(1)`로,
//! `BIGINT UNSIGNED`는 [`Value::Unsigned`]로 들어옵니다.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{RouterError, RouterResult};

// ============================================================================
// Value - 컬럼 값
// ============================================================================

/// 컬럼 값
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`
    #[default]
    Null,
    /// 부호 있는 정수
    Integer(i64),
    /// 부호 없는 정수
    Unsigned(u64),
    /// 부동소수점
    Float(f64),
    /// 텍스트
    String(String),
    /// 바이너리
    Bytes(Vec<u8>),
}

impl Value {
    /// `NULL` 여부
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 텍스트로 읽기
    ///
    /// 텍스트 프로토콜은 문자열 컬럼을 바이트로 보내는 경우가 있어 UTF-8 바이트도 허용합니다.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// 음이 아닌 정수로 읽기 (숫자 텍스트 포함)
    pub fn to_u64(&self) -> Option<u64> {
        match self {
            Self::Integer(i) => u64::try_from(*i).ok(),
            Self::Unsigned(u) => Some(*u),
            Self::String(_) | Self::Bytes(_) => self.as_text()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// 값 종류
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Unsigned(_) => "UNSIGNED",
            Self::Float(_) => "FLOAT",
            Self::String(_) => "TEXT",
            Self::Bytes(_) => "BLOB",
        }
    }
}

/// 로그와 디버깅용 출력
///
/// 텍스트는 그대로, 바이너리는 `0x` 16진수로 씁니다. SQL 구문에 넣을 수 있는 형태가 아닙니다.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Unsigned(u) => write!(f, "{}", u),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => f.write_str(s),
            Self::Bytes(bytes) => {
                f.write_str("0x")?;
                bytes.iter().try_for_each(|byte| write!(f, "{:02x}", byte))
            }
        }
    }
}

// ============================================================================
// 변환
// ============================================================================

macro_rules! value_from {
    ($variant:ident: $($source:ty),+) => {
        $(
            impl From<$source> for Value {
                fn from(v: $source) -> Self {
                    Self::$variant(v.into())
                }
            }
        )+
    };
}

value_from!(Integer: i8, i16, i32, i64, u8, u16, u32);
value_from!(Unsigned: u64);
value_from!(Float: f32, f64);
value_from!(String: String, &str);
value_from!(Bytes: Vec<u8>, &[u8]);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Integer(i64::from(b))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

fn mismatch(target: &str, value: &Value) -> RouterError {
    RouterError::type_conversion(format!("cannot read {} as {}", value.kind(), target))
}

impl TryFrom<Value> for i64 {
    type Error = RouterError;

    fn try_from(value: Value) -> RouterResult<Self> {
        match value {
            Value::Integer(i) => Ok(i),
            Value::Unsigned(u) => i64::try_from(u).map_err(|_| mismatch("i64", &value)),
            other => Err(mismatch("i64", &other)),
        }
    }
}

impl TryFrom<Value> for u64 {
    type Error = RouterError;

    fn try_from(value: Value) -> RouterResult<Self> {
        value.to_u64().ok_or_else(|| mismatch("u64", &value))
    }
}

impl TryFrom<Value> for bool {
    type Error = RouterError;

    fn try_from(value: Value) -> RouterResult<Self> {
        match value {
            Value::Integer(i) => Ok(i != 0),
            Value::Unsigned(u) => Ok(u != 0),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = RouterError;

    fn try_from(value: Value) -> RouterResult<Self> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Integer(i) => Ok(i as f64),
            Value::Unsigned(u) => Ok(u as f64),
            other => Err(mismatch("f64", &other)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = RouterError;

    fn try_from(value: Value) -> RouterResult<Self> {
        match value {
            Value::String(s) => Ok(s),
            Value::Bytes(b) => String::from_utf8(b).map_err(|e| mismatch("String", &Value::Bytes(e.into_bytes()))),
            other => Err(mismatch("String", &other)),
        }
    }
}
