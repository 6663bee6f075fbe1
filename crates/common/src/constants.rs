/// 行情服务常量与枚举

use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP 接口地址
pub const BASE_URL: &str = "https://api.qos.hk";

/// WebSocket 接口地址
pub const WS_URL: &str = "wss://api.qos.hk/ws";

/// 单次订阅允许的最大品种数
pub const MAX_SUB_CODES: usize = 10;

/// 单次请求逐笔成交的最大条数
pub const MAX_TRADE_COUNT: u32 = 50;

/// 请求 ID 取模基数
pub const REQID_MODULUS: u32 = 10000;

/// 市场
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Market {
    /// 美股
    US,
    /// 港股
    HK,
    /// 沪市
    SH,
    /// 深市
    SZ,
    /// 加密货币
    CF,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::US => "US",
            Self::HK => "HK",
            Self::SH => "SH",
            Self::SZ => "SZ",
            Self::CF => "CF",
        }
    }

    /// 从品种代码后缀解析市场，例如 `AAPL.US`
    pub fn from_code(code: &str) -> Option<Self> {
        match code.rsplit_once('.')?.1 {
            "US" => Some(Self::US),
            "HK" => Some(Self::HK),
            "SH" => Some(Self::SH),
            "SZ" => Some(Self::SZ),
            "CF" => Some(Self::CF),
            _ => None,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// K线周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KLineType {
    Min1,
    Min5,
    Min15,
    Min30,
    Hour1,
    Hour2,
    Hour4,
    Day,
    Week,
    Month,
    Year,
}

impl KLineType {
    /// 协议中的数值
    pub fn as_u32(&self) -> u32 {
        match self {
            Self::Min1 => 1,
            Self::Min5 => 5,
            Self::Min15 => 15,
            Self::Min30 => 30,
            Self::Hour1 => 60,
            Self::Hour2 => 120,
            Self::Hour4 => 240,
            Self::Day => 1001,
            Self::Week => 1007,
            Self::Month => 1030,
            Self::Year => 2001,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        let ktype = match value {
            1 => Self::Min1,
            5 => Self::Min5,
            15 => Self::Min15,
            30 => Self::Min30,
            60 => Self::Hour1,
            120 => Self::Hour2,
            240 => Self::Hour4,
            1001 => Self::Day,
            1007 => Self::Week,
            1030 => Self::Month,
            2001 => Self::Year,
            _ => return None,
        };
        Some(ktype)
    }
}

impl fmt::Display for KLineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// 成交方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDirection {
    Unknown,
    Buy,
    Sell,
}

impl From<i32> for TradeDirection {
    fn from(value: i32) -> Self {
        match value {
            1 => Self::Buy,
            2 => Self::Sell,
            _ => Self::Unknown,
        }
    }
}

/// 美股交易时段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum USSessionType {
    Unknown,
    /// 夜盘
    Night,
    /// 盘前
    PreMarket,
    /// 盘中
    Intraday,
    /// 盘后
    AfterHours,
}

impl From<i32> for USSessionType {
    fn from(value: i32) -> Self {
        match value {
            1 => Self::Night,
            2 => Self::PreMarket,
            3 => Self::Intraday,
            4 => Self::AfterHours,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kline_type_roundtrip_values() {
        for value in [1, 5, 15, 30, 60, 120, 240, 1001, 1007, 1030, 2001] {
            let ktype = KLineType::from_u32(value).unwrap();
            assert_eq!(ktype.as_u32(), value);
        }
        assert!(KLineType::from_u32(2).is_none());
    }

    #[test]
    fn test_market_from_code() {
        assert_eq!(Market::from_code("AAPL.US"), Some(Market::US));
        assert_eq!(Market::from_code("700.HK"), Some(Market::HK));
        assert_eq!(Market::from_code("AAPL"), None);
        assert_eq!(Market::from_code("X.JP"), None);
    }

    #[test]
    fn test_int_enums() {
        assert_eq!(TradeDirection::from(1), TradeDirection::Buy);
        assert_eq!(TradeDirection::from(9), TradeDirection::Unknown);
        assert_eq!(USSessionType::from(2), USSessionType::PreMarket);
    }
}
