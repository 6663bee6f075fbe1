/// 配置管理

use client::ClientConfig;
use common::constants::WS_URL;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_key: String,
    pub ws_url: String,
    /// 逗号分隔的品种代码
    pub codes: String,
    pub heartbeat_interval: u64,
    pub request_timeout: u64,
    pub reconnect_interval: u64,
    pub log_level: String,
}

impl Config {
    /// 从 `QOS_*` 环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_source(::config::Environment::with_prefix("QOS"))
    }

    fn from_source(env: ::config::Environment) -> anyhow::Result<Self> {
        let cfg = ::config::Config::builder()
            .set_default("ws_url", WS_URL)?
            .set_default("codes", "AAPL.US,TSLA.US")?
            .set_default("heartbeat_interval", 20)?
            .set_default("request_timeout", 10)?
            .set_default("reconnect_interval", 1)?
            .set_default("log_level", "info")?
            .add_source(env)
            .build()?;

        let cfg: Self = cfg
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("加载配置失败（需要设置 QOS_API_KEY）: {}", e))?;
        if cfg.api_key.trim().is_empty() {
            anyhow::bail!("QOS_API_KEY 不能为空");
        }
        Ok(cfg)
    }

    /// 解析品种列表，忽略空项
    pub fn code_list(&self) -> Vec<String> {
        self.codes
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_key.clone())
            .with_ws_url(self.ws_url.clone())
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_interval))
            .with_request_timeout(Duration::from_secs(self.request_timeout))
            .with_reconnect_interval(Duration::from_secs(self.reconnect_interval))
    }
}
