//! Result Rows
//!
//! 백엔드가 돌려주는 결과 행
//!
//! 같은 결과 집합의 행들은 컬럼 이름 목록을 공유합니다.
//! 컬럼 이름 조회는 MySQL과 같이 대소문자를 구분하지 않습니다.

use std::fmt;
use std::sync::Arc;

use super::error::{RouterError, RouterResult};
use super::types::Value;

/// 결과 행
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    /// 컬럼 이름과 값으로 행 생성
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self::with_columns(columns.into(), values)
    }

    /// 공유 컬럼 목록으로 행 생성
    ///
    /// 드라이버가 결과 집합 하나의 모든 행에 같은 목록을 넘기는 용도입니다.
    pub fn with_columns(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// (컬럼, 값) 쌍에서 생성
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(columns, values)
    }

    /// 컬럼 이름 목록
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 값 목록
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// 값 목록으로 변환
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// 컬럼 수
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 컬럼이 없는 행인지 여부
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(column))
    }

    /// 컬럼 이름으로 값 조회
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(self.index_of(column)?)
    }

    /// 위치로 값 조회
    pub fn get_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// 컬럼 값을 원하는 타입으로 변환
    pub fn get_as<T>(&self, column: &str) -> RouterResult<T>
    where
        T: TryFrom<Value, Error = RouterError>,
    {
        match self.get(column) {
            Some(value) => T::try_from(value.clone()),
            None => Err(RouterError::type_conversion(format!("no column named '{}'", column))),
        }
    }

    /// `NULL`을 `None`으로 읽는 변환
    pub fn get_opt<T>(&self, column: &str) -> RouterResult<Option<T>>
    where
        T: TryFrom<Value, Error = RouterError>,
    {
        match self.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::try_from(value.clone()).map(Some),
        }
    }

    /// (컬럼, 값) 순회
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(&self.values)
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, (column, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", column, value)?;
        }
        f.write_str(")")
    }
}
