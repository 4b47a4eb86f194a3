//! Replication Clock
//!
//! 복제 로그 위치(로그 파일 + 파일 내 오프셋)를 비교 가능한 값으로 표현합니다.
//!
//! 두 클럭은 파일 이름으로 먼저 비교하고, 파일이 같으면 위치로 비교합니다.
//! [`Clock::zero`]는 가능한 가장 작은 클럭, [`Clock::infinity`]는 가장 큰 클럭입니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::RouterError;
use super::record::Record;

/// `infinity` 클럭의 문자열 표현
const INFINITY_LITERAL: &str = "infinity";

// ============================================================================
// Clock - 복제 클럭
// ============================================================================

/// 복제 위치 클럭
///
/// 불변 값 타입입니다. 상태 조회 결과나 `"file@position"` 문자열에서 만들어집니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Clock {
    repr: Repr,
}

// 변형 선언 순서가 곧 정렬 순서입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Repr {
    At { file: String, position: u64 },
    Infinity,
}

impl Clock {
    /// 새 클럭 생성
    pub fn new(file: impl Into<String>, position: u64) -> Self {
        Self {
            repr: Repr::At {
                file: file.into(),
                position,
            },
        }
    }

    /// 가장 작은 클럭 (`file=""`, `position=0`)
    pub fn zero() -> Self {
        Self::new("", 0)
    }

    /// 가장 큰 클럭
    pub fn infinity() -> Self {
        Self {
            repr: Repr::Infinity,
        }
    }

    /// `"<file>@<position>"` 파싱
    ///
    /// 위치는 마지막 `@` 뒤의 값이므로 파일 이름에 `@`가 있어도 됩니다.
    /// 형식이 잘못되면 `None`을 반환합니다 (패닉하지 않음).
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text == INFINITY_LITERAL {
            return Some(Self::infinity());
        }

        let (file, position) = text.rsplit_once('@')?;
        let position = position.parse::<u64>().ok()?;
        Some(Self::new(file, position))
    }

    /// 복제 상태 레코드에서 클럭 생성
    ///
    /// 위치 컬럼은 정수 또는 숫자 문자열을 허용합니다.
    pub fn from_status(record: &Record, file_column: &str, position_column: &str) -> Option<Self> {
        let file = record.get(file_column)?.as_text()?;
        let position = record.get(position_column)?.to_u64()?;
        Some(Self::new(file, position))
    }

    /// 로그 파일 식별자 (`infinity`는 빈 문자열)
    pub fn file(&self) -> &str {
        match &self.repr {
            Repr::At { file, .. } => file,
            Repr::Infinity => "",
        }
    }

    /// 파일 내 위치 (`infinity`는 `u64::MAX`)
    pub fn position(&self) -> u64 {
        match &self.repr {
            Repr::At { position, .. } => *position,
            Repr::Infinity => u64::MAX,
        }
    }

    /// `zero` 여부
    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// `infinity` 여부
    pub fn is_infinity(&self) -> bool {
        matches!(self.repr, Repr::Infinity)
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::At { file, position } => write!(f, "{}@{}", file, position),
            Repr::Infinity => f.write_str(INFINITY_LITERAL),
        }
    }
}

impl FromStr for Clock {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| RouterError::invalid_argument(format!("malformed clock '{}'", s)))
    }
}

impl TryFrom<String> for Clock {
    type Error = RouterError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Clock> for String {
    fn from(clock: Clock) -> Self {
        clock.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    use crate::router::types::Value;

    fn samples() -> Vec<Clock> {
        vec![
            Clock::zero(),
            Clock::new("", 7),
            Clock::new("mysql-bin.000001", 0),
            Clock::new("mysql-bin.000001", 4),
            Clock::new("mysql-bin.000001", 120),
            Clock::new("mysql-bin.000002", 4),
            Clock::new("mysql-bin.000010", 1),
            Clock::infinity(),
        ]
    }

    #[test]
    fn test_clock_compares_file_then_position() {
        let a = Clock::new("mysql-bin.000001", 500);
        let b = Clock::new("mysql-bin.000002", 4);
        let c = Clock::new("mysql-bin.000002", 10);

        assert!(a < b);
        assert!(b < c);
        assert_eq!(b.cmp(&Clock::new("mysql-bin.000002", 4)), Ordering::Equal);
    }

    #[test]
    fn test_clock_total_order() {
        let clocks = samples();

        for a in &clocks {
            assert_eq!(a.cmp(a), Ordering::Equal);
            for b in &clocks {
                assert_eq!(a.cmp(b), b.cmp(a).reverse());
                for c in &clocks {
                    if a <= b && b <= c {
                        assert!(a <= c, "{} <= {} <= {} must imply {} <= {}", a, b, c, a, c);
                    }
                }
            }
        }
    }

    #[test]
    fn test_clock_bounds() {
        for clock in samples() {
            assert!(Clock::zero() <= clock);
            assert!(clock <= Clock::infinity());
        }

        assert!(Clock::new("zzz", u64::MAX) < Clock::infinity());
    }

    #[test]
    fn test_clock_parse() {
        let clock = Clock::parse("mysql-bin.000042@1337").unwrap();
        assert_eq!(clock.file(), "mysql-bin.000042");
        assert_eq!(clock.position(), 1337);

        assert_eq!(Clock::parse("@0"), Some(Clock::zero()));
        assert_eq!(Clock::parse("infinity"), Some(Clock::infinity()));
    }

    #[test]
    fn test_clock_parse_malformed() {
        assert_eq!(Clock::parse(""), None);
        assert_eq!(Clock::parse("mysql-bin.000001"), None);
        assert_eq!(Clock::parse("mysql-bin.000001@"), None);
        assert_eq!(Clock::parse("mysql-bin.000001@abc"), None);
        assert_eq!(Clock::parse("mysql-bin.000001@-4"), None);
        assert_eq!(Clock::parse("a@1@x"), None);
    }

    #[test]
    fn test_clock_file_with_at_sign_round_trips() {
        let clock = Clock::new("a@b", 1);
        assert_eq!(clock.to_string(), "a@b@1");
        assert_eq!(Clock::parse(&clock.to_string()), Some(clock.clone()));
        assert_eq!(Clock::parse("a@1@2"), Some(Clock::new("a@1", 2)));
    }

    #[test]
    fn test_clock_display() {
        assert_eq!(Clock::new("mysql-bin.000001", 4).to_string(), "mysql-bin.000001@4");
        assert_eq!(Clock::zero().to_string(), "@0");
        assert_eq!(Clock::infinity().to_string(), "infinity");
    }

    #[test]
    fn test_clock_from_str() {
        let clock: Clock = "bin.7@99".parse().unwrap();
        assert_eq!(clock, Clock::new("bin.7", 99));

        let err = "garbage".parse::<Clock>().unwrap_err();
        assert!(matches!(err, RouterError::InvalidArgument(_)));
    }

    #[test]
    fn test_clock_from_status() {
        let record = Record::new(
            vec!["File".into(), "Position".into()],
            vec![Value::String("mysql-bin.000003".into()), Value::Integer(154)],
        );
        assert_eq!(
            Clock::from_status(&record, "File", "Position"),
            Some(Clock::new("mysql-bin.000003", 154))
        );

        let textual = Record::new(
            vec!["Relay_Master_Log_File".into(), "Exec_Master_Log_Pos".into()],
            vec![Value::String("mysql-bin.000003".into()), Value::String("154".into())],
        );
        assert_eq!(
            Clock::from_status(&textual, "Relay_Master_Log_File", "Exec_Master_Log_Pos"),
            Some(Clock::new("mysql-bin.000003", 154))
        );

        let incomplete = Record::new(vec!["File".into()], vec![Value::String("x".into())]);
        assert_eq!(Clock::from_status(&incomplete, "File", "Position"), None);

        let null = Record::new(
            vec!["File".into(), "Position".into()],
            vec![Value::Null, Value::Null],
        );
        assert_eq!(Clock::from_status(&null, "File", "Position"), None);
    }

    #[test]
    fn test_clock_predicates() {
        assert!(Clock::zero().is_zero());
        assert!(!Clock::zero().is_infinity());
        assert!(Clock::infinity().is_infinity());
        assert_eq!(Clock::infinity().position(), u64::MAX);
    }

    #[test]
    fn test_clock_string_round_trip() {
        let clock = Clock::new("mysql-bin.000009", 77);
        let text: String = clock.clone().into();
        assert_eq!(Clock::try_from(text).unwrap(), clock);
    }
}
