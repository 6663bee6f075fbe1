/// QOS 行情 SDK - WebSocket 客户端
///
/// 长连接客户端：连接生命周期、请求关联、推送订阅与断线重连

pub mod config;
pub mod ws;

pub use common::{Error, PushCategory, PushData, Result};
pub use config::ClientConfig;
pub use ws::{callback, ClientState, ConnectionEvent, PushCallback, Subscription, WsClient};
