/// WebSocket 协议模块
/// 
/// 提供行情 WebSocket 通道的消息定义、编解码与推送类型

pub mod codec;
pub mod message;
pub mod types;

pub use message::{Frame, KLineRequest, PushFrame, RequestKind, WsRequest, WsResponse};
pub use types::{PushCategory, PushData};
