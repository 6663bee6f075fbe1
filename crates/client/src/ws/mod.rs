/// WebSocket 客户端模块
///
/// 连接管理、请求关联、推送订阅与入站帧分发

pub mod client;
pub mod connection;
pub mod dispatch;
pub mod pending;
pub mod registry;
pub mod subscriptions;

pub use client::WsClient;
pub use connection::{ClientState, ConnectionEvent, ConnectionManager};
pub use pending::{PendingRequest, PendingRequests};
pub use registry::{callback, PushCallback, SubscriptionRegistry};
pub use subscriptions::{Subscription, SubscriptionBook};
