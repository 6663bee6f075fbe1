/// 客户端配置

use common::constants::{MAX_SUB_CODES, WS_URL};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket 地址（不含 key）
    pub ws_url: String,

    /// 官网注册的 API Key，连接时以 `key` 参数附加在地址上
    pub api_key: String,

    /// 心跳间隔
    pub heartbeat_interval: Duration,

    /// 关联请求超时
    pub request_timeout: Duration,

    /// 断线后重连前的等待时间
    pub reconnect_interval: Duration,

    /// 建立连接的超时
    pub connect_timeout: Duration,

    /// 单次订阅最大品种数
    pub max_sub_codes: usize,

    /// 重连后是否自动恢复订阅
    pub resubscribe_on_reconnect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: WS_URL.to_string(),
            api_key: String::new(),
            heartbeat_interval: Duration::from_secs(20),
            request_timeout: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            max_sub_codes: MAX_SUB_CODES,
            resubscribe_on_reconnect: true,
        }
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_sub_codes(mut self, max: usize) -> Self {
        self.max_sub_codes = max;
        self
    }

    pub fn with_resubscribe_on_reconnect(mut self, enabled: bool) -> Self {
        self.resubscribe_on_reconnect = enabled;
        self
    }

    /// 带凭证的连接地址
    pub fn connect_url(&self) -> String {
        if self.api_key.is_empty() {
            return self.ws_url.clone();
        }
        let sep = if self.ws_url.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", self.ws_url, sep, self.api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ClientConfig::new("k");
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(20));
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.reconnect_interval, Duration::from_secs(1));
        assert_eq!(cfg.max_sub_codes, 10);
    }

    #[test]
    fn test_connect_url() {
        let cfg = ClientConfig::new("abc");
        assert_eq!(cfg.connect_url(), "wss://api.qos.hk/ws?key=abc");

        let cfg = ClientConfig::new("abc").with_ws_url("ws://127.0.0.1:9000/ws?v=2");
        assert_eq!(cfg.connect_url(), "ws://127.0.0.1:9000/ws?v=2&key=abc");

        let cfg = ClientConfig::default().with_ws_url("ws://localhost/ws");
        assert_eq!(cfg.connect_url(), "ws://localhost/ws");
    }
}
