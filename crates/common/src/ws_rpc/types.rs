/// 推送类型与推送数据
///
/// 推送类型集合固定为 快照 / 逐笔 / 盘口 / K线

use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::{Error, Result};
use crate::models::{KLine, MarketDepth, QuoteSnapshot, TradeTick};

/// 推送类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PushCategory {
    Snapshot,
    Trade,
    Depth,
    KLine,
}

impl PushCategory {
    pub const ALL: [PushCategory; 4] = [
        PushCategory::Snapshot,
        PushCategory::Trade,
        PushCategory::Depth,
        PushCategory::KLine,
    ];

    /// 推送帧中的 `tp` 标签
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Snapshot => "S",
            Self::Trade => "T",
            Self::Depth => "D",
            Self::KLine => "K",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "S" => Some(Self::Snapshot),
            "T" => Some(Self::Trade),
            "D" => Some(Self::Depth),
            "K" => Some(Self::KLine),
            _ => None,
        }
    }
}

impl fmt::Display for PushCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Snapshot => "snapshot",
            Self::Trade => "trade",
            Self::Depth => "depth",
            Self::KLine => "kline",
        };
        write!(f, "{}", name)
    }
}

/// 同时接受协议标签（`S`）和名称（`snapshot`）
impl FromStr for PushCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(category) = Self::from_tag(s) {
            return Ok(category);
        }
        match s.to_ascii_lowercase().as_str() {
            "snapshot" => Ok(Self::Snapshot),
            "trade" | "trades" => Ok(Self::Trade),
            "depth" => Ok(Self::Depth),
            "kline" => Ok(Self::KLine),
            _ => Err(Error::UnsupportedCategory(s.to_string())),
        }
    }
}

/// 解码后的推送数据
#[derive(Debug, Clone, PartialEq)]
pub enum PushData {
    Snapshot(QuoteSnapshot),
    Trade(TradeTick),
    Depth(MarketDepth),
    KLine(KLine),
}

impl PushData {
    /// 按推送类型将原始映射转换为对应的数据模型
    pub fn from_raw(category: PushCategory, raw: Value) -> Result<Self> {
        let data = match category {
            PushCategory::Snapshot => PushData::Snapshot(serde_json::from_value(raw)?),
            PushCategory::Trade => PushData::Trade(serde_json::from_value(raw)?),
            PushCategory::Depth => PushData::Depth(serde_json::from_value(raw)?),
            PushCategory::KLine => PushData::KLine(serde_json::from_value(raw)?),
        };
        Ok(data)
    }

    pub fn category(&self) -> PushCategory {
        match self {
            Self::Snapshot(_) => PushCategory::Snapshot,
            Self::Trade(_) => PushCategory::Trade,
            Self::Depth(_) => PushCategory::Depth,
            Self::KLine(_) => PushCategory::KLine,
        }
    }

    /// 品种代码
    pub fn code(&self) -> &str {
        match self {
            Self::Snapshot(s) => &s.code,
            Self::Trade(t) => &t.code,
            Self::Depth(d) => &d.code,
            Self::KLine(k) => &k.code,
        }
    }

    pub fn as_snapshot(&self) -> Option<&QuoteSnapshot> {
        match self {
            Self::Snapshot(s) => Some(s),
            _ => None,
        }
    }
}
