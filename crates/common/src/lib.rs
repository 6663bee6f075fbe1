/// QOS 行情 SDK - 公共库
/// 
/// 提供 WebSocket 客户端共享的消息编解码、数据模型、错误处理、工具函数等

pub mod constants;
pub mod errors;
pub mod models;
pub mod utils;
pub mod ws_rpc;

// 重新导出常用类型
pub use errors::{Error, Result};
pub use ws_rpc::{Frame, PushCategory, PushData, RequestKind, WsRequest, WsResponse};
