/// WebSocket 消息定义
///
/// 出站请求 `WsRequest`、入站响应 `WsResponse`、推送 `PushFrame`，
/// 以及解码后的入站帧 `Frame`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{KLineType, MAX_TRADE_COUNT};
use crate::errors::{Error, Result};

/// 请求类型（协议中的 `type` 字段）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// 订阅快照
    #[serde(rename = "S")]
    Snapshot,
    #[serde(rename = "SC")]
    SnapshotCancel,
    /// 订阅逐笔
    #[serde(rename = "T")]
    Trade,
    #[serde(rename = "TC")]
    TradeCancel,
    /// 订阅盘口
    #[serde(rename = "D")]
    Depth,
    #[serde(rename = "DC")]
    DepthCancel,
    /// 订阅K线
    #[serde(rename = "K")]
    KLine,
    #[serde(rename = "KC")]
    KLineCancel,
    /// 请求快照
    #[serde(rename = "RS")]
    ReqSnapshot,
    /// 请求逐笔
    #[serde(rename = "RT")]
    ReqTrade,
    /// 请求盘口
    #[serde(rename = "RD")]
    ReqDepth,
    /// 请求K线
    #[serde(rename = "RK")]
    ReqKLine,
    /// 请求历史K线
    #[serde(rename = "RH")]
    ReqHistory,
    /// 请求基础信息
    #[serde(rename = "RI")]
    ReqInfo,
    /// 心跳
    #[serde(rename = "H")]
    Heartbeat,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "S",
            Self::SnapshotCancel => "SC",
            Self::Trade => "T",
            Self::TradeCancel => "TC",
            Self::Depth => "D",
            Self::DepthCancel => "DC",
            Self::KLine => "K",
            Self::KLineCancel => "KC",
            Self::ReqSnapshot => "RS",
            Self::ReqTrade => "RT",
            Self::ReqDepth => "RD",
            Self::ReqKLine => "RK",
            Self::ReqHistory => "RH",
            Self::ReqInfo => "RI",
            Self::Heartbeat => "H",
        }
    }

    /// 是否为订阅类请求（受单次订阅品种数限制）
    pub fn is_subscribe(&self) -> bool {
        matches!(self, Self::Snapshot | Self::Trade | Self::Depth | Self::KLine)
    }

    /// 订阅请求对应的取消请求
    pub fn cancel_kind(&self) -> Option<Self> {
        match self {
            Self::Snapshot => Some(Self::SnapshotCancel),
            Self::Trade => Some(Self::TradeCancel),
            Self::Depth => Some(Self::DepthCancel),
            Self::KLine => Some(Self::KLineCancel),
            _ => None,
        }
    }
}

/// K线请求参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KLineRequest {
    /// 品种代码
    pub c: String,
    /// K线类型
    pub kt: u32,
    /// 结束时间（仅历史K线）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<i64>,
    /// 数量
    pub co: u32,
    /// 复权类型（0: 不复权, 1: 前复权）
    pub a: u32,
}

/// 出站请求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WsRequest {
    #[serde(rename = "type")]
    pub kind: RequestKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub codes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kline_reqs: Option<Vec<KLineRequest>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kt: Option<u32>,

    /// 关联 ID，由请求关联器在发送前填入
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reqid: Option<u32>,
}

impl WsRequest {
    fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            codes: None,
            kline_reqs: None,
            count: None,
            kt: None,
            reqid: None,
        }
    }

    /// 心跳消息
    pub fn heartbeat() -> Self {
        Self::new(RequestKind::Heartbeat)
    }

    /// 仅携带品种代码的请求（订阅 / 取消订阅 / 快照 / 盘口 / 基础信息）
    pub fn with_codes(kind: RequestKind, codes: &[String]) -> Self {
        let mut req = Self::new(kind);
        req.codes = Some(codes.to_vec());
        req
    }

    /// K线订阅 / 取消订阅
    pub fn kline_subscription(kind: RequestKind, codes: &[String], ktype: KLineType) -> Self {
        let mut req = Self::with_codes(kind, codes);
        req.kt = Some(ktype.as_u32());
        req
    }

    /// 请求逐笔成交，条数上限为 `MAX_TRADE_COUNT`
    pub fn trades(codes: &[String], count: u32) -> Self {
        let mut req = Self::with_codes(RequestKind::ReqTrade, codes);
        req.count = Some(count.min(MAX_TRADE_COUNT));
        req
    }

    /// 请求K线
    pub fn kline(codes: &[String], ktype: KLineType, count: u32) -> Self {
        let mut req = Self::new(RequestKind::ReqKLine);
        req.kline_reqs = Some(Self::kline_reqs(codes, ktype, None, count));
        req
    }

    /// 请求历史K线
    pub fn history_kline(codes: &[String], ktype: KLineType, end_time: i64, count: u32) -> Self {
        let mut req = Self::new(RequestKind::ReqHistory);
        req.kline_reqs = Some(Self::kline_reqs(codes, ktype, Some(end_time), count));
        req
    }

    fn kline_reqs(
        codes: &[String],
        ktype: KLineType,
        end_time: Option<i64>,
        count: u32,
    ) -> Vec<KLineRequest> {
        codes
            .iter()
            .map(|code| KLineRequest {
                c: code.clone(),
                kt: ktype.as_u32(),
                e: end_time,
                co: count,
                a: 0,
            })
            .collect()
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn default_msg() -> String {
    "OK".to_string()
}

/// 关联请求的响应
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WsResponse {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    pub reqid: u32,

    #[serde(default = "default_msg")]
    pub msg: String,

    #[serde(default)]
    pub code: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl WsResponse {
    /// 从原始消息构造响应
    ///
    /// 状态字段缺失或类型不符时取默认值，`msg` 默认为 `"OK"`
    pub fn from_value(reqid: u32, value: &Value) -> Self {
        Self {
            kind: value.get("type").and_then(Value::as_str).map(str::to_string),
            reqid,
            msg: value
                .get("msg")
                .and_then(Value::as_str)
                .map_or_else(default_msg, str::to_string),
            code: value.get("code").and_then(as_integer).unwrap_or_default(),
            time: value.get("time").and_then(as_integer),
            data: value.get("data").filter(|data| !data.is_null()).cloned(),
        }
    }

    /// 判断是否是成功响应
    pub fn is_success(&self) -> bool {
        self.msg == "OK"
    }

    /// 取出响应数据，非 OK 响应转换为 `Error::Api`
    pub fn into_data(self) -> Result<Option<Value>> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(Error::Api {
                code: self.code,
                message: self.msg,
            })
        }
    }
}

/// 服务端推送
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushFrame {
    /// 推送类型标签
    pub tp: String,

    #[serde(default)]
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

impl PushFrame {
    /// 从原始消息提取推送，没有字符串 `tp` 时原样返回消息
    pub fn from_value(mut value: Value) -> std::result::Result<Self, Value> {
        let Some(tp) = value.get("tp").and_then(Value::as_str).map(str::to_string) else {
            return Err(value);
        };
        let time = value.get("time").and_then(as_integer);
        let data = value.get_mut("data").map(Value::take).unwrap_or_default();
        Ok(Self { tp, data, time })
    }
}

/// 整数字段，兼容浮点数与数字字符串
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 解码后的入站帧
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// 心跳响应
    HeartbeatAck,
    /// 携带 `reqid` 的消息
    ///
    /// 只有匹配到待响应请求时才是响应，否则按推送或未知消息处理
    Correlated { reqid: u32, value: Value },
    /// 数据推送
    Push(PushFrame),
    /// 无法识别的消息，原样保留
    Unknown(Value),
}

impl Frame {
    /// 从原始 JSON 映射识别帧类型
    pub fn from_value(value: Value) -> Self {
        if value.get("type").and_then(Value::as_str) == Some(RequestKind::Heartbeat.as_str()) {
            return Frame::HeartbeatAck;
        }

        let reqid = value
            .get("reqid")
            .and_then(Value::as_u64)
            .and_then(|id| u32::try_from(id).ok());
        if let Some(reqid) = reqid {
            return Frame::Correlated { reqid, value };
        }

        Self::uncorrelated(value)
    }

    /// 不考虑 `reqid`，按 `tp` 识别推送
    pub fn uncorrelated(value: Value) -> Self {
        PushFrame::from_value(value).map_or_else(Frame::Unknown, Frame::Push)
    }

    /// 从 JSON 字符串反序列化
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::from_value(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_heartbeat_message() {
        let json = WsRequest::heartbeat().to_json().unwrap();
        assert_eq!(json, r#"{"type":"H"}"#);
    }

    #[test]
    fn test_subscribe_request_shape() {
        let mut req = WsRequest::with_codes(RequestKind::Snapshot, &codes(&["AAPL.US"]));
        req.reqid = Some(7);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value, json!({"type": "S", "codes": ["AAPL.US"], "reqid": 7}));
    }

    #[test]
    fn test_trades_count_capped() {
        let req = WsRequest::trades(&codes(&["AAPL.US"]), 500);
        assert_eq!(req.count, Some(MAX_TRADE_COUNT));
        assert_eq!(req.kind, RequestKind::ReqTrade);
    }

    #[test]
    fn test_history_kline_request_shape() {
        let req = WsRequest::history_kline(
            &codes(&["AAPL.US", "TSLA.US"]),
            KLineType::Day,
            1700000000,
            5,
        );
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "RH",
                "kline_reqs": [
                    {"c": "AAPL.US", "kt": 1001, "e": 1700000000, "co": 5, "a": 0},
                    {"c": "TSLA.US", "kt": 1001, "e": 1700000000, "co": 5, "a": 0}
                ]
            })
        );
    }

    #[test]
    fn test_kline_request_omits_end_time() {
        let req = WsRequest::kline(&codes(&["AAPL.US"]), KLineType::Min1, 10);
        let value = serde_json::to_value(&req).unwrap();
        assert!(value["kline_reqs"][0].get("e").is_none());
    }

    #[test]
    fn test_frame_classification() {
        assert_eq!(Frame::from_json(r#"{"type":"H"}"#).unwrap(), Frame::HeartbeatAck);

        let response = r#"{"type":"RS","reqid":1,"msg":"OK","code":0,"data":[]}"#;
        match Frame::from_json(response).unwrap() {
            Frame::Correlated { reqid, value } => {
                assert_eq!(reqid, 1);
                assert!(WsResponse::from_value(reqid, &value).is_success());
            }
            other => panic!("unexpected frame: {:?}", other),
        }

        match Frame::from_json(r#"{"tp":"S","data":[{"c":"AAPL.US"}],"time":1}"#).unwrap() {
            Frame::Push(push) => {
                assert_eq!(push.tp, "S");
                assert_eq!(push.time, Some(1));
                assert_eq!(push.data, json!([{"c": "AAPL.US"}]));
            }
            other => panic!("unexpected frame: {:?}", other),
        }

        assert!(matches!(
            Frame::from_json(r#"{"event":"news"}"#).unwrap(),
            Frame::Unknown(_)
        ));
        // 非数字的 reqid 不参与关联
        assert!(matches!(
            Frame::from_json(r#"{"reqid":"x","tp":"T","data":[]}"#).unwrap(),
            Frame::Push(_)
        ));
        assert!(Frame::from_json("not json").is_err());
    }

    #[test]
    fn test_push_with_reqid_falls_back_to_tp() {
        let frame = Frame::from_json(r#"{"tp":"S","reqid":77,"data":[],"time":1}"#).unwrap();
        let Frame::Correlated { reqid, value } = frame else {
            panic!("expected correlated frame");
        };
        assert_eq!(reqid, 77);
        match Frame::uncorrelated(value) {
            Frame::Push(push) => assert_eq!(push.tp, "S"),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_response_from_loosely_typed_value() {
        let value = json!({
            "type": "RS",
            "reqid": 1,
            "msg": null,
            "code": "0",
            "time": 1700000000.5,
            "data": [{"c": "AAPL.US"}]
        });
        let resp = WsResponse::from_value(1, &value);
        assert_eq!(resp.kind.as_deref(), Some("RS"));
        assert_eq!(resp.msg, "OK");
        assert_eq!(resp.code, 0);
        assert_eq!(resp.time, Some(1700000000));
        assert_eq!(resp.into_data().unwrap(), Some(json!([{"c": "AAPL.US"}])));

        let resp = WsResponse::from_value(2, &json!({"reqid": 2, "msg": "denied", "code": 403.0}));
        assert!(matches!(resp.into_data(), Err(Error::Api { code: 403, .. })));

        let resp = WsResponse::from_value(3, &json!({"reqid": 3, "data": null}));
        assert_eq!(resp.into_data().unwrap(), None);
    }

    #[test]
    fn test_response_defaults_and_error() {
        let resp: WsResponse = serde_json::from_value(json!({"reqid": 3})).unwrap();
        assert_eq!(resp.msg, "OK");
        assert_eq!(resp.into_data().unwrap(), None);

        let resp: WsResponse =
            serde_json::from_value(json!({"reqid": 4, "msg": "invalid key", "code": 401})).unwrap();
        match resp.into_data() {
            Err(Error::Api { code, message }) => {
                assert_eq!(code, 401);
                assert_eq!(message, "invalid key");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
