/// 行情数据模型
///
/// 字段名沿用服务端的短字段名，价格和数量保持服务端下发的字符串形式

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{KLineType, Market, TradeDirection, USSessionType};

/// 秒级时间戳转换为 UTC 时间
fn to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

/// 品种基础信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentInfo {
    /// 品种代码
    #[serde(rename = "c")]
    pub code: String,

    /// 交易所
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,

    /// 交易币种
    #[serde(rename = "tc", default, skip_serializing_if = "Option::is_none")]
    pub trade_currency: Option<String>,

    /// 中文名
    #[serde(rename = "nc", default, skip_serializing_if = "Option::is_none")]
    pub name_cn: Option<String>,

    /// 英文名
    #[serde(rename = "ne", default, skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,

    /// 最小交易单位
    #[serde(rename = "ls", default, skip_serializing_if = "Option::is_none")]
    pub lot_size: Option<i64>,

    /// 总股本
    #[serde(rename = "ts", default, skip_serializing_if = "Option::is_none")]
    pub total_shares: Option<i64>,

    /// 流通股本
    #[serde(rename = "os", default, skip_serializing_if = "Option::is_none")]
    pub outstanding_shares: Option<i64>,

    /// 每股盈利
    #[serde(rename = "ep", default, skip_serializing_if = "Option::is_none")]
    pub eps: Option<String>,

    /// 每股净资产
    #[serde(rename = "na", default, skip_serializing_if = "Option::is_none")]
    pub net_assets: Option<String>,

    /// 股息率
    #[serde(rename = "dy", default, skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<String>,
}

impl InstrumentInfo {
    pub fn market(&self) -> Option<Market> {
        Market::from_code(&self.code)
    }
}

/// 分时段行情（盘前 / 盘后 / 夜盘）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodQuote {
    #[serde(rename = "lp")]
    pub last_price: String,
    #[serde(rename = "yp")]
    pub prev_close: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "ts")]
    pub timestamp: i64,
    #[serde(rename = "v")]
    pub volume: String,
    #[serde(rename = "t")]
    pub turnover: String,
}

/// 实时行情快照
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuoteSnapshot {
    /// 品种代码
    #[serde(rename = "c")]
    pub code: String,

    /// 最新价
    #[serde(rename = "lp")]
    pub last_price: String,

    /// 昨收价
    #[serde(rename = "yp", default, skip_serializing_if = "Option::is_none")]
    pub prev_close: Option<String>,

    /// 开盘价
    #[serde(rename = "o")]
    pub open: String,

    /// 最高价
    #[serde(rename = "h")]
    pub high: String,

    /// 最低价
    #[serde(rename = "l")]
    pub low: String,

    /// 时间戳（秒）
    #[serde(rename = "ts")]
    pub timestamp: i64,

    /// 成交量
    #[serde(rename = "v")]
    pub volume: String,

    /// 成交额
    #[serde(rename = "t")]
    pub turnover: String,

    /// 停牌状态
    #[serde(rename = "s")]
    pub suspended: i32,

    /// 美股交易时段
    #[serde(rename = "tt", default, skip_serializing_if = "Option::is_none")]
    pub session: Option<i32>,

    /// 盘前数据
    #[serde(rename = "pq", default, skip_serializing_if = "Option::is_none")]
    pub pre_market: Option<PeriodQuote>,

    /// 盘后数据
    #[serde(rename = "aq", default, skip_serializing_if = "Option::is_none")]
    pub after_hours: Option<PeriodQuote>,

    /// 夜盘数据
    #[serde(rename = "nq", default, skip_serializing_if = "Option::is_none")]
    pub night: Option<PeriodQuote>,
}

impl QuoteSnapshot {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        to_datetime(self.timestamp)
    }

    pub fn session_type(&self) -> USSessionType {
        self.session.map(USSessionType::from).unwrap_or(USSessionType::Unknown)
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended != 0
    }
}

/// 盘口档位
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepthLevel {
    /// 价格
    #[serde(rename = "p")]
    pub price: String,
    /// 数量
    #[serde(rename = "v")]
    pub volume: String,
}

/// 盘口深度
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketDepth {
    #[serde(rename = "c")]
    pub code: String,

    /// 买盘
    #[serde(rename = "b", default)]
    pub bids: Vec<DepthLevel>,

    /// 卖盘
    #[serde(rename = "a", default)]
    pub asks: Vec<DepthLevel>,

    #[serde(rename = "ts")]
    pub timestamp: i64,
}

impl MarketDepth {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        to_datetime(self.timestamp)
    }

    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.first()
    }
}

/// 逐笔成交
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeTick {
    #[serde(rename = "c")]
    pub code: String,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "v")]
    pub volume: String,
    #[serde(rename = "ts")]
    pub timestamp: i64,
    /// 成交方向
    #[serde(rename = "d")]
    pub direction: i32,
}

impl TradeTick {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        to_datetime(self.timestamp)
    }

    pub fn trade_direction(&self) -> TradeDirection {
        TradeDirection::from(self.direction)
    }
}

/// K线
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KLine {
    /// 品种代码（部分响应中由外层 `KLineSeries` 携带）
    #[serde(rename = "c", default)]
    pub code: String,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "cl")]
    pub close: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "v")]
    pub volume: String,
    #[serde(rename = "ts")]
    pub timestamp: i64,
    #[serde(rename = "kt")]
    pub ktype: u32,
}

impl KLine {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        to_datetime(self.timestamp)
    }

    pub fn kline_type(&self) -> Option<KLineType> {
        KLineType::from_u32(self.ktype)
    }
}

/// 单个品种的 K线序列（请求 K线 / 历史 K线的响应单元）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KLineSeries {
    #[serde(rename = "c")]
    pub code: String,
    #[serde(rename = "k", default)]
    pub klines: Vec<KLine>,
}

impl KLineSeries {
    /// 展开为 K线列表，缺失的品种代码用外层代码补齐
    pub fn into_klines(self) -> Vec<KLine> {
        let code = self.code;
        self.klines
            .into_iter()
            .map(|mut k| {
                if k.code.is_empty() {
                    k.code = code.clone();
                }
                k
            })
            .collect()
    }
}
