use std::time::Duration;
use thiserror::Error;

/// 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    #[error("连接错误: {0}")]
    Connection(String),

    #[error("连接已关闭")]
    ConnectionClosed,

    #[error("请求超时: reqid={reqid}, timeout={timeout:?}")]
    RequestTimeout { reqid: u32, timeout: Duration },

    #[error("订阅品种数超限: {count} > {max}")]
    SubscriptionLimit { count: usize, max: usize },

    #[error("不支持的推送类型: {0}")]
    UnsupportedCategory(String),

    #[error("待响应请求已满: {0}")]
    TooManyPending(usize),

    #[error("API错误: [{code}] {message}")]
    Api { code: i64, message: String },

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Error::ConnectionClosed,
            other => Error::Connection(other.to_string()),
        }
    }
}

impl Error {
    /// 是否为连接层错误（可通过重连恢复）
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::ConnectionClosed)
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tungstenite_error_mapping() {
        let err: Error = tokio_tungstenite::tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(err, Error::ConnectionClosed));
        assert!(err.is_transport());

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: Error = tokio_tungstenite::tungstenite::Error::Io(io).into();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[test]
    fn test_display() {
        let err = Error::SubscriptionLimit { count: 11, max: 10 };
        assert_eq!(err.to_string(), "订阅品种数超限: 11 > 10");
        assert!(!err.is_transport());
    }
}
