//! 共有値オブジェクト
//!
//! 複数の集約で使用される共通の値オブジェクトを定義

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// タイムスタンプを表す値オブジェクト
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub epoch_millis: u64,
}

impl Timestamp {
    /// 現在時刻のタイムスタンプを作成
    pub fn now() -> Self {
        Self {
            epoch_millis: Utc::now().timestamp_millis().max(0) as u64,
        }
    }

    /// エポック時刻（ミリ秒）から作成
    pub fn from_millis(millis: u64) -> Self {
        Self {
            epoch_millis: millis,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.epoch_millis)
    }
}

impl FromStr for Timestamp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let millis = s
            .parse::<u64>()
            .map_err(|_| "Invalid timestamp format".to_string())?;
        Ok(Self::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ordering() {
        let ts1 = Timestamp::from_millis(1_000);
        let ts2 = Timestamp::from_millis(2_000);
        assert!(ts1 < ts2);
        assert_eq!("2000".parse::<Timestamp>().unwrap(), ts2);
        assert!("abc".parse::<Timestamp>().is_err());
    }

    #[test]
    fn test_now_is_after_epoch() {
        let before = Timestamp::now();
        let after = Timestamp::now();
        assert!(before.epoch_millis > 0);
        assert!(before <= after);
    }
}
