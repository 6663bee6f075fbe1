/// 工具函数集合
///
/// 请求参数校验与响应数据解析

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{Error, Result};
use crate::models::{KLine, KLineSeries};

/// 校验品种代码数量与格式
pub fn validate_codes(codes: &[String], max_count: usize) -> Result<()> {
    if codes.len() > max_count {
        return Err(Error::SubscriptionLimit {
            count: codes.len(),
            max: max_count,
        });
    }
    if let Some(code) = codes.iter().find(|c| c.trim().is_empty()) {
        return Err(Error::InvalidArgument(format!("品种代码不能为空: {:?}", code)));
    }
    Ok(())
}

/// 解析记录列表，缺失的 `data` 视为空列表
pub fn parse_records<T: DeserializeOwned>(data: Option<Value>) -> Result<Vec<T>> {
    match data {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(Error::from))
            .collect(),
        Some(other) => Ok(vec![serde_json::from_value(other)?]),
    }
}

/// 解析 K线响应：`[{c, k: [...]}, ...]` 展开为 K线列表
pub fn parse_klines(data: Option<Value>) -> Result<Vec<KLine>> {
    let series: Vec<KLineSeries> = parse_records(data)?;
    Ok(series.into_iter().flat_map(KLineSeries::into_klines).collect())
}
